//! Management fees.
//!
//! Fees are paid in the fee token to the management address. The base fee
//! starts at `start_hundredths` of a fee-token coin and drops by
//! `step_hundredths` every `tier_interval` fee-token transactions, never
//! below `floor_hundredths`.

use opgroup_transaction::{Transaction, TransactionOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{build_group_script, extract_destination, parse_group_script, GroupParse, GroupPayload};
use crate::error::GroupViolation;
use crate::flags::IdFlags;
use crate::registry::{GroupRegistry, ManagementSlot};
use crate::validator::GroupBalances;

/// Multiplier applied to the base fee for creations and mints.
pub const CREATION_FEE_MULTIPLIER: i64 = 5;

/// Fee-token outputs exempt from the transfer fee on a creation or mint.
const FREE_OUTPUTS_CREATION: u32 = 2;

/// Fee-token outputs exempt from the transfer fee on a fee-token mint or melt.
const FREE_OUTPUTS_FEE_TOKEN: u32 = 1;

/// Tiered fee schedule, in hundredths of a fee-token coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub start_hundredths: u64,
    pub step_hundredths: u64,
    pub floor_hundredths: u64,
    pub tier_interval: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            start_hundredths: 10,
            step_hundredths: 1,
            floor_hundredths: 1,
            tier_interval: 100_000,
        }
    }
}

impl FeeSchedule {
    /// Fee in hundredths of a coin after `tx_count` fee-token transactions.
    pub fn hundredths(&self, tx_count: u64) -> u64 {
        let start = self.start_hundredths.max(self.floor_hundredths);
        let max_tier = (start - self.floor_hundredths)
            .checked_div(self.step_hundredths)
            .unwrap_or(0);
        let tier = tx_count.checked_div(self.tier_interval).unwrap_or(0).min(max_tier);
        start - tier * self.step_hundredths
    }

    /// Fee in raw units of a token whose coin is `coin` units.
    pub fn management_fee(&self, tx_count: u64, coin: u64) -> i64 {
        let fee = (coin as u128) * (self.hundredths(tx_count) as u128) / 100;
        i64::try_from(fee).unwrap_or(i64::MAX)
    }
}

impl GroupRegistry {
    /// Base management fee after `tx_count` fee-token transactions.
    ///
    /// # Returns
    /// `None` until the fee group exists.
    pub fn management_fee(&self, tx_count: u64) -> Option<i64> {
        let fee_group = self.management_creation(ManagementSlot::Fee)?;
        Some(self.params().fees.management_fee(tx_count, fee_group.description.coin()))
    }

    /// Verify that `tx` pays the management fees it owes.
    ///
    /// A regular group creation and every net mint of a regular group cost
    /// five base fees. Moving the fee token costs one base fee when its
    /// outputs exceed the exempt count. Only non-authority fee-token outputs
    /// paying the management address count as paid.
    ///
    /// # Arguments
    /// * `tx` - The transaction, already balance-checked.
    /// * `balances` - Per-group balances from the balance check.
    /// * `fee_counter` - Fee-token transactions seen so far on this chain.
    ///
    /// # Returns
    /// The fee owed, or `ManagementFeeUnpaid`.
    pub fn check_management_fees(
        &self,
        tx: &Transaction,
        balances: &GroupBalances,
        fee_counter: u64,
    ) -> Result<i64, GroupViolation> {
        let Some(fee) = self.management_fee(fee_counter) else {
            return Ok(0);
        };
        let payee = self.management_destination();

        let mut needed: i64 = 0;
        let mut paid: i64 = 0;
        let mut fee_outputs: u32 = 0;
        let mut free_outputs: u32 = 0;

        for (i, output) in tx.outputs.iter().enumerate() {
            let info = match parse_group_script(&output.script_pubkey) {
                GroupParse::Malformed(_) => return Err(GroupViolation::BadGroupScript(i)),
                GroupParse::Ungrouped => continue,
                GroupParse::Grouped(info) => info,
            };
            if info.is_group_creation(IdFlags::NONE) && !info.group.has_flag(IdFlags::MANAGEMENT) {
                needed = CREATION_FEE_MULTIPLIER * fee;
                free_outputs = free_outputs.max(FREE_OUTPUTS_CREATION);
            }
            if self.matches_management(ManagementSlot::Fee, &info.group) && !info.is_authority() {
                fee_outputs += 1;
                if payee.is_some_and(|p| extract_destination(&output.script_pubkey) == *p) {
                    paid = paid.saturating_add(info.quantity());
                }
            }
        }

        for (group, balance) in balances {
            let net = balance.output as i128 - balance.input as i128;
            let is_fee_group = self.matches_management(ManagementSlot::Fee, group);
            if net > 0 && !group.has_flag(IdFlags::MANAGEMENT) {
                needed = needed.saturating_add(CREATION_FEE_MULTIPLIER * fee);
                free_outputs = free_outputs.max(FREE_OUTPUTS_CREATION);
            }
            if net != 0 && is_fee_group {
                free_outputs = free_outputs.max(FREE_OUTPUTS_FEE_TOKEN);
            }
        }

        if fee_outputs > free_outputs {
            needed = needed.saturating_add(fee);
        }

        if paid >= needed {
            Ok(needed)
        } else {
            debug!(txid = %tx.txid(), needed, paid, "management fee unpaid");
            Err(GroupViolation::ManagementFeeUnpaid { needed, paid })
        }
    }

    /// Fee-token quantity paid to the management address by `outputs`.
    pub fn management_fees_paid(&self, outputs: &[TransactionOutput]) -> i64 {
        let Some(payee) = self.management_destination() else {
            return 0;
        };
        outputs
            .iter()
            .filter(|o| extract_destination(&o.script_pubkey) == *payee)
            .filter_map(|o| parse_group_script(&o.script_pubkey).into_grouped())
            .filter(|info| self.matches_management(ManagementSlot::Fee, &info.group) && !info.is_authority())
            .fold(0i64, |acc, info| acc.saturating_add(info.quantity()))
    }

    /// Make sure `outputs` pay at least `fee` to the management address.
    ///
    /// An existing fee output smaller than `fee` is raised to `fee`;
    /// otherwise a new grouped output is appended.
    ///
    /// # Returns
    /// `true` when an output was appended.
    pub fn ensure_management_fee(&self, outputs: &mut Vec<TransactionOutput>, fee: i64) -> bool {
        if fee <= 0 {
            return false;
        }
        let (Some(fee_group), Some(payee)) = (
            self.management_group_id(ManagementSlot::Fee).cloned(),
            self.management_destination().cloned(),
        ) else {
            return false;
        };

        for output in outputs.iter_mut() {
            if extract_destination(&output.script_pubkey) != payee {
                continue;
            }
            let GroupParse::Grouped(info) = parse_group_script(&output.script_pubkey) else {
                continue;
            };
            if info.group == fee_group && !info.is_authority() {
                if info.quantity() < fee {
                    output.script_pubkey = build_group_script(&payee, &fee_group, GroupPayload::Quantity(fee));
                }
                return false;
            }
        }

        let script = build_group_script(&payee, &fee_group, GroupPayload::Quantity(fee));
        outputs.push(TransactionOutput::new(self.params().grouped_dust, script));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_id::GroupId;
    use crate::registry::tests::{creation, test_params, MGT_KEY};
    use crate::validator::GroupBalance;
    use opgroup_script::Destination;

    fn registry_with_fee_group() -> (GroupRegistry, GroupId) {
        let mut reg = GroupRegistry::new(test_params());
        let fee = creation(0x20, "FEE", "Fee", 8);
        reg.add_group(fee.clone()).expect("add");
        (reg, fee.group().clone())
    }

    fn payee() -> Destination {
        Destination::KeyHash(MGT_KEY)
    }

    // -----------------------------------------------------------------------
    // Schedule
    // -----------------------------------------------------------------------

    #[test]
    fn test_schedule_tiers() {
        let s = FeeSchedule::default();
        assert_eq!(s.hundredths(0), 10);
        assert_eq!(s.hundredths(99_999), 10);
        assert_eq!(s.hundredths(100_000), 9);
        assert_eq!(s.hundredths(850_000), 2);
        assert_eq!(s.hundredths(900_000), 1);
        assert_eq!(s.hundredths(u64::MAX), 1);
        assert_eq!(s.management_fee(0, 100_000_000), 10_000_000);
    }

    #[test]
    fn test_degenerate_schedule() {
        let s = FeeSchedule { start_hundredths: 5, step_hundredths: 0, floor_hundredths: 1, tier_interval: 0 };
        assert_eq!(s.hundredths(1_000_000), 5);
    }

    #[test]
    fn test_fee_requires_fee_group() {
        let reg = GroupRegistry::new(test_params());
        assert_eq!(reg.management_fee(0), None);
        let (reg, _) = registry_with_fee_group();
        assert_eq!(reg.management_fee(0), Some(10_000_000));
    }

    // -----------------------------------------------------------------------
    // Consensus check
    // -----------------------------------------------------------------------

    #[test]
    fn test_no_fee_group_passes() {
        let reg = GroupRegistry::new(test_params());
        let tx = crate::registry::tests::creation_tx(1, "GRV", "Grav", 2);
        assert_eq!(reg.check_management_fees(&tx, &GroupBalances::new(), 0), Ok(0));
    }

    /// A regular creation owes five base fees.
    #[test]
    fn test_creation_fee() {
        let (reg, fee_group) = registry_with_fee_group();
        let mut tx = crate::registry::tests::creation_tx(1, "GRV", "Grav", 2);
        assert_eq!(
            reg.check_management_fees(&tx, &GroupBalances::new(), 0),
            Err(GroupViolation::ManagementFeeUnpaid { needed: 50_000_000, paid: 0 })
        );

        let mut outputs = std::mem::take(&mut tx.outputs);
        assert!(reg.ensure_management_fee(&mut outputs, 50_000_000));
        assert_eq!(reg.management_fees_paid(&outputs), 50_000_000);
        tx.outputs = outputs;
        assert_eq!(reg.check_management_fees(&tx, &GroupBalances::new(), 0), Ok(50_000_000));

        let last = tx.outputs.last().expect("fee output");
        assert_eq!(parse_group_script(&last.script_pubkey).group(), fee_group);
    }

    /// Moving the fee token beyond the exempt outputs costs one base fee.
    #[test]
    fn test_fee_token_transfer() {
        let (reg, fee_group) = registry_with_fee_group();
        let mut tx = Transaction::new();
        for tag in 1..=2u8 {
            tx.add_output(TransactionOutput::new(
                10_000,
                build_group_script(&Destination::KeyHash([tag; 20]), &fee_group, GroupPayload::Quantity(5)),
            ));
        }
        let balances = GroupBalances::new();
        assert!(reg.check_management_fees(&tx, &balances, 0).is_err());

        let mut outputs = tx.outputs.clone();
        reg.ensure_management_fee(&mut outputs, 10_000_000);
        tx.outputs = outputs;
        assert_eq!(reg.check_management_fees(&tx, &balances, 0), Ok(10_000_000));
    }

    #[test]
    fn test_mint_fee_per_group() {
        let (reg, _) = registry_with_fee_group();
        let mut balances = GroupBalances::new();
        balances.insert(GroupId::new(vec![0x10; 32]), GroupBalance { output: 5, ..Default::default() });
        balances.insert(GroupId::new(vec![0x30; 32]), GroupBalance { output: 7, ..Default::default() });
        assert_eq!(
            reg.check_management_fees(&Transaction::new(), &balances, 0),
            Err(GroupViolation::ManagementFeeUnpaid { needed: 100_000_000, paid: 0 })
        );
    }

    #[test]
    fn test_ensure_fee_raises_existing_output() {
        let (reg, fee_group) = registry_with_fee_group();
        let mut outputs = vec![TransactionOutput::new(
            10_000,
            build_group_script(&payee(), &fee_group, GroupPayload::Quantity(3)),
        )];
        assert!(!reg.ensure_management_fee(&mut outputs, 40));
        assert_eq!(outputs.len(), 1);
        assert_eq!(reg.management_fees_paid(&outputs), 40);
        assert!(!reg.ensure_management_fee(&mut outputs, 0));
    }
}
