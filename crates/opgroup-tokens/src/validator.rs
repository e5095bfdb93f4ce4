//! Per-transaction token-group balance validation.
//!
//! Outputs are tallied per group first, then inputs are applied. Every group
//! must balance unless the inputs carry the authority to mint or melt, and
//! authority outputs may only carry bits the inputs allow. The only way to
//! produce an authority from nothing is a group creation, whose id must
//! commit to the first spent outpoint, the description and the nonce.

use std::collections::{BTreeMap, HashMap};

use opgroup_script::Script;
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};
use tracing::debug;

use crate::codec::{parse_group_script, GroupParse, GroupPayload};
use crate::derivation::expected_group_id;
use crate::error::GroupViolation;
use crate::flags::{AuthorityFlags, IdFlags};
use crate::group_id::GroupId;
use crate::registry::GroupRegistry;

/// An unspent output and the height it was created at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    pub output: TransactionOutput,
    pub height: u32,
}

impl Coin {
    pub fn new(output: TransactionOutput, height: u32) -> Self {
        Coin { output, height }
    }
}

/// Read-only lookup of the outputs a transaction spends.
pub trait CoinsView {
    fn access_coin(&self, outpoint: &OutPoint) -> Option<Coin>;
}

impl CoinsView for BTreeMap<OutPoint, Coin> {
    fn access_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.get(outpoint).cloned()
    }
}

impl CoinsView for HashMap<OutPoint, Coin> {
    fn access_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.get(outpoint).cloned()
    }
}

/// Running totals for one group within one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupBalance {
    /// Token quantity spent.
    pub input: i64,
    /// Token quantity created.
    pub output: i64,
    /// Authority bits held by the inputs.
    pub ctrl_perms: AuthorityFlags,
    /// Bits authority outputs may carry.
    pub allowed_ctrl_output_perms: AuthorityFlags,
    /// Bits authority outputs of subgroups may carry.
    pub allowed_subgroup_ctrl_output_perms: AuthorityFlags,
    /// Bits carried by authority outputs.
    pub ctrl_output_perms: AuthorityFlags,
    pub num_outputs: u32,
    pub input_native: u64,
    pub output_native: u64,
}

impl GroupBalance {
    /// Positive for a net mint, negative for a net melt.
    pub fn net(&self) -> i128 {
        self.output as i128 - self.input as i128
    }
}

pub type GroupBalances = BTreeMap<GroupId, GroupBalance>;

/// Validate the token-group rules of `tx`.
///
/// # Arguments
/// * `tx` - The transaction to check.
/// * `view` - Lookup for the coins `tx` spends.
/// * `registry` - Supplies the activation height and management rules.
///
/// # Returns
/// Per-group balances on success (empty for coinbase and coinstake), or the
/// first violation found.
pub fn check_token_groups<V: CoinsView + ?Sized>(
    tx: &Transaction,
    view: &V,
    registry: &GroupRegistry,
) -> Result<GroupBalances, GroupViolation> {
    if tx.is_coinbase() || tx.is_coinstake() {
        return Ok(GroupBalances::new());
    }
    check_groups(tx, view, registry).inspect_err(|violation| {
        debug!(txid = %tx.txid(), reason = violation.reason(), "token group check failed");
    })
}

fn check_groups<V: CoinsView + ?Sized>(
    tx: &Transaction,
    view: &V,
    registry: &GroupRegistry,
) -> Result<GroupBalances, GroupViolation> {
    let activation_height = registry.params().activation_height;
    let mut balances = GroupBalances::new();
    let mut output_templates: BTreeMap<GroupId, Vec<Script>> = BTreeMap::new();
    let mut input_templates: BTreeMap<GroupId, Vec<Script>> = BTreeMap::new();
    let mut first_op_return: Option<&Script> = None;

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 && first_op_return.is_none() && output.script_pubkey.is_op_return() {
            first_op_return = Some(&output.script_pubkey);
        }
        let info = match parse_group_script(&output.script_pubkey) {
            GroupParse::Malformed(_) => return Err(GroupViolation::BadGroupScript(i)),
            GroupParse::Ungrouped => continue,
            GroupParse::Grouped(info) => info,
        };
        let bal = balances.entry(info.group.clone()).or_default();
        bal.num_outputs += 1;
        bal.output_native = bal.output_native.saturating_add(output.value);
        match info.payload {
            GroupPayload::Quantity(0) => return Err(GroupViolation::ZeroQuantity(i)),
            GroupPayload::Quantity(qty) => {
                bal.output = bal
                    .output
                    .checked_add(qty)
                    .ok_or_else(|| GroupViolation::TokenOverflow(info.group.clone()))?;
            }
            GroupPayload::Authority(flags) => bal.ctrl_output_perms |= flags,
        }
        output_templates.entry(info.group).or_default().push(info.template);
    }

    let mut any_management_input = false;
    for input in &tx.inputs {
        let coin = view
            .access_coin(&input.prevout)
            .ok_or(GroupViolation::MissingInput(input.prevout))?;
        if coin.height < activation_height {
            continue;
        }
        let script = &coin.output.script_pubkey;
        if registry.is_management_input(script) {
            any_management_input = true;
        }
        let GroupParse::Grouped(info) = parse_group_script(script) else {
            continue;
        };
        let bal = balances.entry(info.group.clone()).or_default();
        bal.input_native = bal.input_native.saturating_add(coin.output.value);
        match info.payload {
            GroupPayload::Authority(flags) => {
                if flags.has_flag(AuthorityFlags::CCHILD) {
                    bal.allowed_ctrl_output_perms |= flags;
                    if flags.has_flag(AuthorityFlags::SUBGROUP) {
                        bal.allowed_subgroup_ctrl_output_perms |= flags;
                    }
                }
                bal.ctrl_perms |= flags;
            }
            GroupPayload::Quantity(qty) => {
                bal.input = bal
                    .input
                    .checked_add(qty)
                    .ok_or_else(|| GroupViolation::TokenOverflow(info.group.clone()))?;
            }
        }
        input_templates.entry(info.group).or_default().push(info.template);
    }

    apply_subgroup_authorities(&mut balances);

    for (group, bal) in balances.iter_mut() {
        let mut created = false;
        if bal.ctrl_output_perms.has_flag(AuthorityFlags::CTRL) && bal.ctrl_perms == AuthorityFlags::NONE {
            let creation_id = tx.inputs.first().map(|first| {
                let description = first_op_return.cloned().unwrap_or_default();
                expected_group_id(&first.prevout, &description, bal.ctrl_output_perms)
            });
            if creation_id.as_ref() == Some(group) {
                created = true;
                bal.ctrl_perms = AuthorityFlags::ALL;
                bal.allowed_ctrl_output_perms = AuthorityFlags::ALL;
                if group.has_flag(IdFlags::MANAGEMENT) && !any_management_input {
                    return Err(GroupViolation::ManagementWithoutKey(group.clone()));
                }
            } else if bal.ctrl_output_perms.nonce() != 0 {
                return Err(GroupViolation::PermissionEscalation(group.clone()));
            }
        }

        if bal.input > bal.output && !bal.ctrl_perms.has_flag(AuthorityFlags::MELT) {
            return Err(GroupViolation::MeltWithoutAuthority(group.clone()));
        }
        if bal.input < bal.output && !bal.ctrl_perms.has_flag(AuthorityFlags::MINT) {
            return Err(GroupViolation::MintWithoutAuthority(group.clone()));
        }
        let unauthorized = bal.ctrl_output_perms & AuthorityFlags::ALL & !(bal.allowed_ctrl_output_perms & AuthorityFlags::ALL);
        if unauthorized != AuthorityFlags::NONE {
            return Err(GroupViolation::UnauthorizedAuthorities(group.clone()));
        }

        if created {
            continue;
        }
        if group.has_flag(IdFlags::SAME_SCRIPT) && !bal.ctrl_perms.allows_rescript() {
            let inputs = input_templates.get(group).map(Vec::as_slice).unwrap_or(&[]);
            let outputs = output_templates.get(group).map(Vec::as_slice).unwrap_or(&[]);
            if outputs.iter().any(|t| !inputs.contains(t)) {
                return Err(GroupViolation::ScriptMismatch(group.clone()));
            }
        }
        if group.has_flag(IdFlags::BALANCE_NATIVE) && bal.input_native != bal.output_native {
            return Err(GroupViolation::NativeImbalance {
                group: group.clone(),
                input: bal.input_native,
                output: bal.output_native,
            });
        }
    }

    Ok(balances)
}

/// Give subgroups the authorities their parent's inputs grant.
fn apply_subgroup_authorities(balances: &mut GroupBalances) {
    let parents: Vec<(GroupId, AuthorityFlags, AuthorityFlags)> = balances
        .keys()
        .filter(|g| g.is_subgroup())
        .filter_map(|g| {
            let parent = balances.get(&g.parent_group())?;
            Some((g.clone(), parent.ctrl_perms, parent.allowed_subgroup_ctrl_output_perms))
        })
        .collect();

    for (group, parent_perms, parent_subgroup_perms) in parents {
        if let Some(bal) = balances.get_mut(&group) {
            if parent_perms.has_flag(AuthorityFlags::SUBGROUP) {
                bal.ctrl_perms |= parent_perms & !AuthorityFlags::SUBGROUP;
            }
            bal.allowed_ctrl_output_perms |= parent_subgroup_perms & !AuthorityFlags::SUBGROUP;
        }
    }
}

/// Token activity of one group within one transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenTxStats {
    /// Transactions that moved the group's tokens.
    pub tx_count: u32,
    /// Output quantity minus input quantity.
    pub net_minted: i64,
}

impl TokenTxStats {
    pub fn merge(&mut self, other: TokenTxStats) {
        self.tx_count = self.tx_count.saturating_add(other.tx_count);
        self.net_minted = self.net_minted.saturating_add(other.net_minted);
    }
}

/// Count whether `tx` moves tokens of `group` and by how much it mints.
///
/// Authority outputs and coins below `activation_height` are ignored, as
/// are coinbase and coinstake transactions. Unknown inputs count as
/// ungrouped.
pub fn token_tx_stats<V: CoinsView + ?Sized>(
    tx: &Transaction,
    view: &V,
    group: &GroupId,
    activation_height: u32,
) -> TokenTxStats {
    if tx.is_coinbase() || tx.is_coinstake() {
        return TokenTxStats::default();
    }
    let quantity_of = |script: &Script| -> i64 {
        match parse_group_script(script) {
            GroupParse::Grouped(info) if info.group == *group && !info.is_authority() => info.quantity(),
            _ => 0,
        }
    };

    let value_out = tx
        .outputs
        .iter()
        .fold(0i64, |acc, o| acc.saturating_add(quantity_of(&o.script_pubkey)));
    let value_in = tx
        .inputs
        .iter()
        .filter_map(|i| view.access_coin(&i.prevout))
        .filter(|c| c.height >= activation_height)
        .fold(0i64, |acc, c| acc.saturating_add(quantity_of(&c.output.script_pubkey)));

    TokenTxStats {
        tx_count: u32::from(value_in > 0 || value_out > 0),
        net_minted: value_out.saturating_sub(value_in),
    }
}
