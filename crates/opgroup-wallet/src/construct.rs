//! Transaction assembly.
//!
//! A flow gathers the coins it spends and the outputs it creates into a
//! [`TxPlan`]. [`construct_transaction`] then adds token change, sizes the
//! fee, tops up native value from the wallet's plain coins, adds native
//! change, signs and commits. An attempt moves through
//! [`ConstructionStage`]s and either commits or leaves nothing behind: keys
//! reserved along the way are released unless the commit succeeds.

use std::fmt;

use opgroup_tokens::codec::build_group_script;
use opgroup_tokens::registry::ManagementSlot;
use opgroup_tokens::{GroupId, GroupPayload, GroupRegistry};
use opgroup_transaction::{Transaction, TransactionOutput};
use tracing::{debug, info};

use crate::backend::{CoinCandidate, KeyPool, KeyReservation, WalletBackend};
use crate::selection::nearest_greater_coin;
use crate::WalletError;

/// Worst-case unlocking script length assumed when sizing inputs.
pub const TX_SIG_SCRIPT_LEN: usize = 72;

/// Native change is only created when the surplus exceeds this many fees.
pub const FEE_FUDGE: u64 = 2;

/// Sequence number of the input added to pay the native fee.
pub const FEE_INPUT_SEQUENCE: u32 = u32::MAX - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructionStage {
    Gathering,
    Assembling,
    Signed,
    Committed,
    Rejected,
}

impl fmt::Display for ConstructionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstructionStage::Gathering => "gathering",
            ConstructionStage::Assembling => "assembling",
            ConstructionStage::Signed => "signed",
            ConstructionStage::Committed => "committed",
            ConstructionStage::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Inputs and outputs a flow has settled on, with the balances still to be
/// reconciled.
#[derive(Clone, Debug, Default)]
pub struct TxPlan {
    /// Coins to spend, in input order.
    pub chosen: Vec<CoinCandidate>,
    pub outputs: Vec<TransactionOutput>,
    pub native_available: u64,
    pub native_needed: u64,
    /// Group whose surplus becomes token change.
    pub group: GroupId,
    pub group_available: i64,
    pub group_needed: i64,
    pub fee_token_available: i64,
    pub fee_token_needed: i64,
}

impl TxPlan {
    pub fn new(group: GroupId) -> Self {
        TxPlan { group, ..Default::default() }
    }

    /// Native value carried by the planned outputs.
    pub fn output_value(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value))
    }

    /// Native value of the chosen coins.
    pub fn input_value(&self) -> u64 {
        self.chosen.iter().fold(0u64, |acc, c| acc.saturating_add(c.value()))
    }

    /// Set native availability and need from the chosen coins and planned
    /// outputs.
    pub fn balance_native(&mut self) {
        self.native_available = self.input_value();
        self.native_needed = self.output_value();
    }
}

fn token_change<K: KeyPool + ?Sized>(
    registry: &GroupRegistry,
    group: &GroupId,
    surplus: i64,
    keys: &mut KeyReservation<'_, K>,
) -> Result<TransactionOutput, WalletError> {
    let dest = keys.reserve()?;
    let script = build_group_script(&dest, group, GroupPayload::Quantity(surplus));
    Ok(TransactionOutput::new(registry.params().grouped_dust, script))
}

/// Complete, sign and commit the transaction described by `plan`.
///
/// # Arguments
/// * `backend` - Wallet collaborators.
/// * `registry` - Supplies dust and the fee token id.
/// * `spendable` - Plain coins that may be added to pay the native fee.
/// * `plan` - Coins, outputs and balances from the calling flow.
/// * `keys` - Keys reserved so far; kept on commit, released otherwise.
///
/// # Returns
/// The committed transaction, or an error with no side effects beyond the
/// attempt itself.
pub fn construct_transaction<B: WalletBackend + ?Sized>(
    backend: &B,
    registry: &GroupRegistry,
    spendable: &[CoinCandidate],
    plan: TxPlan,
    mut keys: KeyReservation<'_, B>,
) -> Result<Transaction, WalletError> {
    debug!(stage = %ConstructionStage::Assembling, group = %plan.group, "constructing token transaction");
    let dust = registry.params().grouped_dust;
    let mut tx = Transaction::new();
    let mut approx_size = 0usize;

    for output in &plan.outputs {
        approx_size += output.serialized_size();
        tx.add_output(output.clone());
    }

    let mut input_size = 0usize;
    for coin in &plan.chosen {
        input_size = tx.add_input(coin.outpoint).serialized_size() + TX_SIG_SCRIPT_LEN;
        approx_size += input_size;
    }

    let mut native_needed = plan.native_needed;
    if plan.group_available > plan.group_needed {
        let change = token_change(registry, &plan.group, plan.group_available - plan.group_needed, &mut keys)?;
        approx_size += change.serialized_size();
        native_needed = native_needed.saturating_add(dust);
        tx.add_output(change);
    }

    if plan.fee_token_available > plan.fee_token_needed {
        let fee_group = registry
            .management_group_id(ManagementSlot::Fee)
            .cloned()
            .ok_or_else(|| WalletError::InvalidParameter("fee token group is not registered".into()))?;
        let change = token_change(
            registry,
            &fee_group,
            plan.fee_token_available - plan.fee_token_needed,
            &mut keys,
        )?;
        approx_size += change.serialized_size();
        native_needed = native_needed.saturating_add(dust);
        tx.add_output(change);
    }

    // Room for a fee input and native change.
    approx_size += input_size * 3;
    let fee = backend.required_fee(approx_size);

    let mut native_available = plan.native_available;
    let target = native_needed.saturating_add(fee);
    if native_available < target {
        let shortfall = target - native_available;
        let unused: Vec<CoinCandidate> = spendable
            .iter()
            .filter(|c| !plan.chosen.iter().any(|chosen| chosen.outpoint == c.outpoint))
            .cloned()
            .collect();
        let coin = nearest_greater_coin(&unused, shortfall).ok_or_else(|| WalletError::InsufficientFunds {
            asset: registry.params().native.ticker.clone(),
            needed: i64::try_from(target).unwrap_or(i64::MAX),
            available: i64::try_from(native_available).unwrap_or(i64::MAX),
        })?;
        tx.add_input(coin.outpoint).sequence = FEE_INPUT_SEQUENCE;
        native_available = native_available.saturating_add(coin.value());
    }

    if native_available > native_needed.saturating_add(FEE_FUDGE.saturating_mul(fee)) {
        let dest = keys.reserve()?;
        let change = native_available - native_needed - fee;
        tx.add_output(TransactionOutput::new(change, dest.locking_script()));
    }

    if let Err(e) = backend.sign(&mut tx) {
        debug!(stage = %ConstructionStage::Rejected, error = %e, "token transaction not signed");
        return Err(e);
    }
    debug!(stage = %ConstructionStage::Signed, inputs = tx.input_count(), outputs = tx.output_count(), fee);

    if let Err(e) = backend.commit(&tx) {
        debug!(stage = %ConstructionStage::Rejected, error = %e, "token transaction not committed");
        return Err(e);
    }
    keys.keep();
    info!(stage = %ConstructionStage::Committed, txid = %tx.txid(), group = %plan.group, "token transaction committed");
    Ok(tx)
}
