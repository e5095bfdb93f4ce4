//! In-memory wallet backend.
//!
//! Keys are derived from a counter, signing fills each input with a
//! placeholder unlocking script, and committing moves coins: spent inputs
//! leave the coin set and outputs paying one of the wallet's keys join it.

use std::collections::{BTreeMap, BTreeSet};

use opgroup_primitives::hash::{hash160, sha256, Hash256};
use opgroup_script::{Destination, Script};
use opgroup_tokens::codec::extract_destination;
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};
use parking_lot::Mutex;

use crate::backend::{CoinCandidate, CoinSource, FeeEstimator, KeyPool, TransactionSigner};
use crate::construct::TX_SIG_SCRIPT_LEN;
use crate::WalletError;

#[derive(Debug, Default)]
struct Inner {
    coins: BTreeMap<OutPoint, CoinCandidate>,
    /// Insertion order of `coins`.
    order: Vec<OutPoint>,
    next_key: u64,
    key_limit: Option<u64>,
    reserved: BTreeSet<u64>,
    kept: BTreeSet<u64>,
    owned: BTreeSet<Destination>,
    committed: Vec<Transaction>,
    funding_counter: u64,
    reject_reason: Option<String>,
}

/// A wallet held entirely in memory.
#[derive(Debug)]
pub struct MemoryWallet {
    inner: Mutex<Inner>,
    fee_per_byte: u64,
}

fn key_destination(index: u64) -> Destination {
    Destination::KeyHash(hash160(&index.to_le_bytes()))
}

impl MemoryWallet {
    pub fn new(fee_per_byte: u64) -> Self {
        MemoryWallet { inner: Mutex::new(Inner::default()), fee_per_byte }
    }

    /// Cap the number of keys the pool will ever hand out.
    pub fn with_key_limit(self, limit: u64) -> Self {
        self.inner.lock().key_limit = Some(limit);
        self
    }

    /// A fresh key owned by the wallet, outside any reservation.
    pub fn new_destination(&self) -> Destination {
        let mut inner = self.inner.lock();
        let index = inner.next_key;
        inner.next_key += 1;
        inner.kept.insert(index);
        let dest = key_destination(index);
        inner.owned.insert(dest.clone());
        dest
    }

    /// Add an output the wallet can spend, under a made-up outpoint.
    pub fn add_coin(&self, output: TransactionOutput, depth: u32) -> CoinCandidate {
        let mut inner = self.inner.lock();
        inner.funding_counter += 1;
        let txid = Hash256::new(sha256(&inner.funding_counter.to_le_bytes()));
        let coin = CoinCandidate::new(OutPoint::new(txid, 0), output, depth);
        inner.order.push(coin.outpoint);
        inner.coins.insert(coin.outpoint, coin.clone());
        coin
    }

    /// Add a plain coin of `value` paying a fresh wallet key.
    pub fn fund(&self, value: u64) -> CoinCandidate {
        let dest = self.new_destination();
        self.add_coin(TransactionOutput::new(value, dest.locking_script()), 1)
    }

    pub fn owns(&self, dest: &Destination) -> bool {
        self.inner.lock().owned.contains(dest)
    }

    pub fn coins(&self) -> Vec<CoinCandidate> {
        let inner = self.inner.lock();
        inner.order.iter().filter_map(|op| inner.coins.get(op).cloned()).collect()
    }

    pub fn committed(&self) -> Vec<Transaction> {
        self.inner.lock().committed.clone()
    }

    /// Keys reserved and neither kept nor released yet.
    pub fn outstanding_reservations(&self) -> usize {
        self.inner.lock().reserved.len()
    }

    /// Make every later commit fail with `reason`.
    pub fn reject_commits(&self, reason: &str) {
        self.inner.lock().reject_reason = Some(reason.to_string());
    }
}

impl CoinSource for MemoryWallet {
    fn filter(&self, predicate: &dyn Fn(&CoinCandidate) -> bool) -> Vec<CoinCandidate> {
        self.coins().into_iter().filter(|c| predicate(c)).collect()
    }
}

impl KeyPool for MemoryWallet {
    fn reserve(&self) -> Result<(u64, Destination), WalletError> {
        let mut inner = self.inner.lock();
        if inner.key_limit.is_some_and(|limit| inner.next_key >= limit) {
            return Err(WalletError::KeypoolExhausted);
        }
        let index = inner.next_key;
        inner.next_key += 1;
        inner.reserved.insert(index);
        let dest = key_destination(index);
        inner.owned.insert(dest.clone());
        Ok((index, dest))
    }

    fn keep(&self, index: u64) {
        let mut inner = self.inner.lock();
        if inner.reserved.remove(&index) {
            inner.kept.insert(index);
        }
    }

    fn release(&self, index: u64) {
        let mut inner = self.inner.lock();
        if inner.reserved.remove(&index) {
            inner.owned.remove(&key_destination(index));
        }
    }
}

impl FeeEstimator for MemoryWallet {
    fn required_fee(&self, tx_size: usize) -> u64 {
        self.fee_per_byte.saturating_mul(tx_size as u64)
    }
}

impl TransactionSigner for MemoryWallet {
    fn sign(&self, tx: &mut Transaction) -> Result<(), WalletError> {
        let inner = self.inner.lock();
        for input in &mut tx.inputs {
            if !inner.coins.contains_key(&input.prevout) {
                return Err(WalletError::SigningFailed(format!("no key for {}", input.prevout)));
            }
            input.script_sig = Script::from(vec![0u8; TX_SIG_SCRIPT_LEN]);
        }
        Ok(())
    }

    fn commit(&self, tx: &Transaction) -> Result<(), WalletError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.reject_reason {
            return Err(WalletError::CommitRejected(reason.clone()));
        }
        if let Some(input) = tx.inputs.iter().find(|i| !inner.coins.contains_key(&i.prevout)) {
            return Err(WalletError::CommitRejected(format!("{} already spent", input.prevout)));
        }
        for input in &tx.inputs {
            inner.coins.remove(&input.prevout);
        }
        let txid = tx.txid();
        for (vout, output) in tx.outputs.iter().enumerate() {
            if !inner.owned.contains(&extract_destination(&output.script_pubkey)) {
                continue;
            }
            let coin = CoinCandidate::new(OutPoint::new(txid, vout as u32), output.clone(), 0);
            inner.order.push(coin.outpoint);
            inner.coins.insert(coin.outpoint, coin);
        }
        let Inner { coins, order, .. } = &mut *inner;
        order.retain(|op| coins.contains_key(op));
        inner.committed.push(tx.clone());
        Ok(())
    }
}
