//! Collaborators the wallet drives: coin source, key pool, fee estimator
//! and signer.

use opgroup_script::{Destination, Script};
use opgroup_tokens::codec::{parse_group_script, GroupParse};
use opgroup_tokens::{AuthorityFlags, GroupId};
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};

use crate::WalletError;

/// A spendable output known to the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinCandidate {
    pub outpoint: OutPoint,
    pub output: TransactionOutput,
    /// Confirmations; zero for unconfirmed.
    pub depth: u32,
}

impl CoinCandidate {
    pub fn new(outpoint: OutPoint, output: TransactionOutput, depth: u32) -> Self {
        CoinCandidate { outpoint, output, depth }
    }

    /// Native value.
    pub fn value(&self) -> u64 {
        self.output.value
    }

    pub fn script(&self) -> &Script {
        &self.output.script_pubkey
    }

    pub fn group_parse(&self) -> GroupParse {
        parse_group_script(self.script())
    }

    /// The coin's group; no group for plain and malformed scripts.
    pub fn group(&self) -> GroupId {
        self.group_parse().group()
    }

    pub fn is_authority(&self) -> bool {
        self.group_parse().is_authority()
    }

    /// Token quantity; zero for authorities and ungrouped coins.
    pub fn quantity(&self) -> i64 {
        self.group_parse().quantity()
    }

    pub fn authority_flags(&self) -> AuthorityFlags {
        self.group_parse().flags()
    }

    /// Destination the coin pays, through any group prefix.
    pub fn destination(&self) -> Destination {
        opgroup_tokens::codec::extract_destination(self.script())
    }
}

/// Source of the wallet's spendable coins.
pub trait CoinSource {
    /// Spendable coins accepted by `predicate`, in the source's order.
    fn filter(&self, predicate: &dyn Fn(&CoinCandidate) -> bool) -> Vec<CoinCandidate>;
}

/// Pool of fresh receiving keys.
///
/// A reserved key is handed out once and either kept, once the transaction
/// that uses it is committed, or released back to the pool.
pub trait KeyPool {
    /// Reserve a key.
    ///
    /// # Returns
    /// The reservation index and the key's destination, or
    /// `KeypoolExhausted`.
    fn reserve(&self) -> Result<(u64, Destination), WalletError>;

    fn keep(&self, index: u64);

    fn release(&self, index: u64);
}

pub trait FeeEstimator {
    /// Minimum fee for a transaction of `tx_size` bytes.
    fn required_fee(&self, tx_size: usize) -> u64;
}

pub trait TransactionSigner {
    fn sign(&self, tx: &mut Transaction) -> Result<(), WalletError>;

    /// Hand a signed transaction to the node.
    fn commit(&self, tx: &Transaction) -> Result<(), WalletError>;
}

/// Everything a token wallet needs from its host wallet.
pub trait WalletBackend: CoinSource + KeyPool + FeeEstimator + TransactionSigner {}

impl<T: CoinSource + KeyPool + FeeEstimator + TransactionSigner> WalletBackend for T {}

/// Keys reserved during one construction attempt.
///
/// Dropping the guard releases every key it holds; [`keep`](Self::keep)
/// marks them used instead.
pub struct KeyReservation<'a, K: KeyPool + ?Sized> {
    pool: &'a K,
    reserved: Vec<u64>,
}

impl<'a, K: KeyPool + ?Sized> KeyReservation<'a, K> {
    pub fn new(pool: &'a K) -> Self {
        KeyReservation { pool, reserved: Vec::new() }
    }

    pub fn reserve(&mut self) -> Result<Destination, WalletError> {
        let (index, dest) = self.pool.reserve()?;
        self.reserved.push(index);
        Ok(dest)
    }

    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }

    pub fn keep(mut self) {
        for index in self.reserved.drain(..) {
            self.pool.keep(index);
        }
    }
}

impl<K: KeyPool + ?Sized> Drop for KeyReservation<'_, K> {
    fn drop(&mut self) {
        for index in self.reserved.drain(..) {
            self.pool.release(index);
        }
    }
}
