//! Token wallet flows.
//!
//! Every flow takes the registry read lock first and the wallet mutex
//! second, so concurrent flows never pick the same coins.

use std::collections::BTreeSet;

use opgroup_script::Destination;
use opgroup_tokens::amount::token_money_range;
use opgroup_tokens::codec::{build_group_script, parse_group_script};
use opgroup_tokens::derivation::derive_group_id;
use opgroup_tokens::description::DescriptionParams;
use opgroup_tokens::fees::CREATION_FEE_MULTIPLIER;
use opgroup_tokens::registry::ManagementSlot;
use opgroup_tokens::{
    AuthorityFlags, GroupId, GroupParse, GroupPayload, GroupRegistry, IdFlags, SharedRegistry, TokenGroupCreation,
    TokenGroupDescription, TokenGroupInfo, TokenGroupStatus,
};
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{CoinCandidate, KeyReservation, WalletBackend};
use crate::construct::{construct_transaction, ConstructionStage, TxPlan};
use crate::selection::{CoinSelector, GreedySelector, Selection};
use crate::WalletError;

/// One grouped payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub destination: Destination,
    pub amount: i64,
}

impl Recipient {
    pub fn new(destination: Destination, amount: i64) -> Self {
        Recipient { destination, amount }
    }
}

/// Outcome of a group configuration, dry run or committed.
#[derive(Clone, Debug)]
pub struct Configured {
    pub group: GroupId,
    /// The description after the registry's filters ran.
    pub description: TokenGroupDescription,
    pub status: TokenGroupStatus,
    pub fee_needed: i64,
    pub fee_available: i64,
    /// `None` for a dry run.
    pub transaction: Option<Transaction>,
}

/// Outcome of [`TokenWallet::drop_authorities`].
#[derive(Clone, Debug)]
pub struct DroppedAuthorities {
    pub former: AuthorityFlags,
    /// Flags still held; `NONE` when the authority was destroyed.
    pub kept: AuthorityFlags,
    pub transaction: Transaction,
}

#[derive(Debug, Default)]
struct WalletState {
    /// Fee-token transactions seen on chain; drives the fee tier.
    fee_counter: u64,
    /// Coins spent by committed transactions.
    spent: BTreeSet<OutPoint>,
}

/// Builds token transactions on top of a [`WalletBackend`].
pub struct TokenWallet<B: WalletBackend> {
    backend: B,
    registry: SharedRegistry,
    selector: Box<dyn CoinSelector>,
    state: Mutex<WalletState>,
}

/// Id of the subgroup of `group` named by `postfix`.
///
/// A postfix that parses as an integer is encoded as 8 little-endian bytes,
/// negative numbers in two's complement;
/// anything else is used as raw bytes.
///
/// # Returns
/// The subgroup id, or `InvalidParameter` for an empty postfix or a group
/// that is not a user group.
pub fn subgroup_id(group: &GroupId, postfix: &str) -> Result<GroupId, WalletError> {
    if !group.is_user_group() {
        return Err(WalletError::InvalidParameter(format!("{} is not a user group", group)));
    }
    if postfix.is_empty() {
        return Err(WalletError::InvalidParameter("subgroup postfix is empty".into()));
    }
    let data = match (postfix.parse::<u64>(), postfix.parse::<i64>()) {
        (Ok(n), _) => n.to_le_bytes().to_vec(),
        (_, Ok(n)) => n.to_le_bytes().to_vec(),
        _ => postfix.as_bytes().to_vec(),
    };
    let mut bytes = group.as_bytes().to_vec();
    bytes.extend_from_slice(&data);
    Ok(GroupId::new(bytes))
}

fn asset_name(registry: &GroupRegistry, group: &GroupId) -> String {
    match registry.get_creation(group) {
        Some(c) if !c.description.ticker.is_empty() && !group.is_subgroup() => c.description.ticker.clone(),
        _ => group.to_hex(),
    }
}

fn grouped_output(registry: &GroupRegistry, dest: &Destination, group: &GroupId, payload: GroupPayload) -> TransactionOutput {
    TransactionOutput::new(registry.params().grouped_dust, build_group_script(dest, group, payload))
}

/// The creation record `params` would produce, after the registry's
/// filters.
fn preview_creation(
    registry: &GroupRegistry,
    group: &GroupId,
    authority: AuthorityFlags,
    dest: &Destination,
    params: &DescriptionParams,
) -> TokenGroupCreation {
    let info = TokenGroupInfo {
        group: group.clone(),
        payload: GroupPayload::Authority(authority),
        template: dest.locking_script(),
    };
    let mut preview = TokenGroupCreation::new(Transaction::new(), info, params.to_description());
    registry.apply_filters(&mut preview);
    preview
}

/// Re-issue an authority being spent.
///
/// # Returns
/// The dust the new output carries, or zero when `authority` cannot be
/// renewed.
pub fn renew_authority<B: WalletBackend + ?Sized>(
    registry: &GroupRegistry,
    authority: &CoinCandidate,
    outputs: &mut Vec<TransactionOutput>,
    keys: &mut KeyReservation<'_, B>,
) -> Result<u64, WalletError> {
    let flags = authority.authority_flags();
    if !flags.allows_renew() {
        return Ok(0);
    }
    let dest = keys.reserve()?;
    let output = grouped_output(registry, &dest, &authority.group(), GroupPayload::Authority(flags.renewable()));
    let dust = output.value;
    outputs.push(output);
    Ok(dust)
}

impl<B: WalletBackend> TokenWallet<B> {
    pub fn new(backend: B, registry: SharedRegistry) -> Self {
        TokenWallet {
            backend,
            registry,
            selector: Box::new(GreedySelector),
            state: Mutex::new(WalletState::default()),
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn CoinSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn set_fee_counter(&self, fee_counter: u64) {
        self.state.lock().fee_counter = fee_counter;
    }

    pub fn fee_counter(&self) -> u64 {
        self.state.lock().fee_counter
    }

    /// Coins spent by transactions this wallet committed.
    pub(crate) fn spent_coins(&self) -> BTreeSet<OutPoint> {
        self.state.lock().spent.clone()
    }

    // -----------------------------------------------------------------------
    // Coin helpers
    // -----------------------------------------------------------------------

    fn coins(&self, state: &WalletState, predicate: impl Fn(&CoinCandidate) -> bool) -> Vec<CoinCandidate> {
        self.backend
            .filter(&|c: &CoinCandidate| !state.spent.contains(&c.outpoint) && predicate(c))
    }

    /// Unspent coins carrying no group.
    fn plain_coins(&self, state: &WalletState) -> Vec<CoinCandidate> {
        self.coins(state, |c| matches!(c.group_parse(), GroupParse::Ungrouped))
    }

    fn token_coins(&self, state: &WalletState, group: &GroupId) -> Vec<CoinCandidate> {
        self.coins(state, |c| !c.is_authority() && c.group() == *group)
    }

    /// First authority of `group` whose flags satisfy `wanted`.
    ///
    /// A subgroup falls back to an authority of its parent that can also
    /// renew and create subgroups.
    fn find_authority(
        &self,
        state: &WalletState,
        group: &GroupId,
        wanted: impl Fn(AuthorityFlags) -> bool,
    ) -> Option<CoinCandidate> {
        let own = self.coins(state, |c| c.is_authority() && c.group() == *group && wanted(c.authority_flags()));
        if let Some(coin) = own.into_iter().next() {
            return Some(coin);
        }
        if !group.is_subgroup() {
            return None;
        }
        let parent = group.parent_group();
        self.coins(state, |c| {
            let flags = c.authority_flags();
            c.is_authority()
                && c.group() == parent
                && flags.allows_renew()
                && flags.allows_subgroup()
                && wanted(flags)
        })
        .into_iter()
        .next()
    }

    /// Select fee-token coins for a fee of `multiplier` base fees and add
    /// the payment to `plan`.
    ///
    /// # Returns
    /// The selection; its total may fall short of the fee, which the caller
    /// reports. Empty when no fee applies.
    fn add_management_fee(
        &self,
        state: &WalletState,
        registry: &GroupRegistry,
        plan: &mut TxPlan,
        multiplier: i64,
    ) -> (i64, Selection) {
        let (Some(base), Some(fee_group), Some(_)) = (
            registry.management_fee(state.fee_counter),
            registry.management_group_id(ManagementSlot::Fee),
            registry.management_destination(),
        ) else {
            return (0, Selection::default());
        };
        let needed = base.saturating_mul(multiplier);
        if needed <= 0 {
            return (0, Selection::default());
        }
        registry.ensure_management_fee(&mut plan.outputs, needed);
        let coins = self.token_coins(state, fee_group);
        let selection = self.selector.select(&coins, needed, &CoinCandidate::quantity);
        plan.fee_token_available = selection.total;
        plan.fee_token_needed = needed;
        plan.chosen.extend(selection.coins.iter().cloned());
        (needed, selection)
    }

    fn finish(
        &self,
        state: &mut WalletState,
        registry: &GroupRegistry,
        mut plan: TxPlan,
        keys: KeyReservation<'_, B>,
    ) -> Result<Transaction, WalletError> {
        plan.balance_native();
        let spendable = self.plain_coins(state);
        let tx = construct_transaction(&self.backend, registry, &spendable, plan, keys)?;
        state.spent.extend(tx.inputs.iter().map(|i| i.prevout));
        Ok(tx)
    }

    // -----------------------------------------------------------------------
    // Group creation
    // -----------------------------------------------------------------------

    /// Create a regular token group.
    ///
    /// The smallest plain coin funds the creation and seeds the group id.
    /// Unless `params.confirmed` is set this is a dry run: the id, the
    /// filtered description and the fee are reported and nothing is signed.
    ///
    /// # Arguments
    /// * `params` - Description fields and the confirm flag.
    /// * `authority_dest` - Receiver of the creation authority; a fresh key
    ///   when `None`.
    pub fn configure(
        &self,
        params: &DescriptionParams,
        authority_dest: Option<Destination>,
    ) -> Result<Configured, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();
        debug!(stage = %ConstructionStage::Gathering, ticker = %params.ticker, "configuring token group");

        let coin = self
            .plain_coins(&state)
            .into_iter()
            .min_by_key(CoinCandidate::value)
            .ok_or_else(|| WalletError::NoCoins("no plain coin to fund the group creation".into()))?;
        let description = params.to_op_return()?;
        let (group, nonce) = derive_group_id(
            &coin.outpoint,
            &description,
            IdFlags::NONE,
            registry.params().max_derivation_iterations,
        )?;

        let mut keys = KeyReservation::new(&self.backend);
        let dest = match authority_dest {
            Some(dest) => dest,
            None => keys.reserve()?,
        };
        let authority = AuthorityFlags::ALL.with_nonce(nonce);

        let mut plan = TxPlan::new(group.clone());
        plan.chosen.push(coin);
        plan.outputs.push(TransactionOutput::new(0, description));
        plan.outputs.push(grouped_output(&registry, &dest, &group, GroupPayload::Authority(authority)));
        let (fee_needed, fee_selection) =
            self.add_management_fee(&state, &registry, &mut plan, CREATION_FEE_MULTIPLIER);

        let preview = preview_creation(&registry, &group, authority, &dest, params);

        let mut configured = Configured {
            group: group.clone(),
            description: preview.description,
            status: preview.status,
            fee_needed,
            fee_available: fee_selection.total,
            transaction: None,
        };
        if !params.confirmed {
            debug!(group = %group, "token group configuration dry run");
            return Ok(configured);
        }
        if !fee_selection.covers(fee_needed) {
            return Err(WalletError::InsufficientFunds {
                asset: registry.params().management.fee_ticker.clone(),
                needed: fee_needed,
                available: fee_selection.total,
            });
        }

        let tx = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %tx.txid(), "token group configured");
        configured.transaction = Some(tx);
        Ok(configured)
    }

    /// Create a management group.
    ///
    /// Before the bootstrap group exists the creation must spend a coin
    /// paying the management address; afterwards it spends a bootstrap token
    /// coin and returns the same quantity to its owner.
    pub fn configure_management(
        &self,
        params: &DescriptionParams,
        authority_dest: Option<Destination>,
    ) -> Result<Configured, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();

        let mut extra = Vec::new();
        let coin = match registry.management_group_id(ManagementSlot::Bootstrap) {
            Some(bootstrap) => {
                let coin = self
                    .token_coins(&state, bootstrap)
                    .into_iter()
                    .min_by_key(CoinCandidate::quantity)
                    .ok_or_else(|| WalletError::NoCoins("no bootstrap token coin in the wallet".into()))?;
                extra.push(grouped_output(
                    &registry,
                    &coin.destination(),
                    bootstrap,
                    GroupPayload::Quantity(coin.quantity()),
                ));
                coin
            }
            None => {
                let payee = registry
                    .management_destination()
                    .cloned()
                    .ok_or_else(|| WalletError::InvalidParameter("no management address configured".into()))?;
                self.plain_coins(&state)
                    .into_iter()
                    .filter(|c| c.destination() == payee)
                    .min_by_key(CoinCandidate::value)
                    .ok_or_else(|| WalletError::NoCoins("no coin paying the management address".into()))?
            }
        };

        let description = params.to_op_return()?;
        let (group, nonce) = derive_group_id(
            &coin.outpoint,
            &description,
            IdFlags::MANAGEMENT,
            registry.params().max_derivation_iterations,
        )?;
        let mut keys = KeyReservation::new(&self.backend);
        let dest = match authority_dest {
            Some(dest) => dest,
            None => keys.reserve()?,
        };
        let authority = AuthorityFlags::ALL.with_nonce(nonce);

        let mut plan = TxPlan::new(group.clone());
        plan.chosen.push(coin);
        plan.outputs.push(TransactionOutput::new(0, description));
        plan.outputs.push(grouped_output(&registry, &dest, &group, GroupPayload::Authority(authority)));
        plan.outputs.extend(extra);

        let preview = preview_creation(&registry, &group, authority, &dest, params);

        let mut configured = Configured {
            group: group.clone(),
            description: preview.description,
            status: preview.status,
            fee_needed: 0,
            fee_available: 0,
            transaction: None,
        };
        if !params.confirmed {
            return Ok(configured);
        }
        let tx = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %tx.txid(), "management token group configured");
        configured.transaction = Some(tx);
        Ok(configured)
    }

    // -----------------------------------------------------------------------
    // Supply
    // -----------------------------------------------------------------------

    /// Mint new tokens of `group` to `recipients`.
    pub fn mint(&self, group: &GroupId, recipients: &[Recipient]) -> Result<Transaction, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();
        if registry.get_creation(group).is_none() {
            return Err(WalletError::UnknownGroup(group.clone()));
        }
        check_recipients(recipients)?;

        let authority = self
            .find_authority(&state, group, AuthorityFlags::allows_mint)
            .ok_or_else(|| WalletError::NoAuthority(format!("minting {} needs an authority with mint capability", group)))?;

        let mut keys = KeyReservation::new(&self.backend);
        let mut plan = TxPlan::new(group.clone());
        for r in recipients {
            plan.outputs.push(grouped_output(&registry, &r.destination, group, GroupPayload::Quantity(r.amount)));
        }
        plan.chosen.push(authority.clone());
        renew_authority(&registry, &authority, &mut plan.outputs, &mut keys)?;

        if !group.has_flag(IdFlags::MANAGEMENT) {
            let (needed, selection) = self.add_management_fee(&state, &registry, &mut plan, CREATION_FEE_MULTIPLIER);
            if !selection.covers(needed) {
                return Err(WalletError::InsufficientFunds {
                    asset: registry.params().management.fee_ticker.clone(),
                    needed,
                    available: selection.total,
                });
            }
        }

        let tx = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %tx.txid(), recipients = recipients.len(), "tokens minted");
        Ok(tx)
    }

    /// Destroy `amount` tokens of `group` held by the wallet.
    pub fn melt(&self, group: &GroupId, amount: i64) -> Result<Transaction, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();
        if amount <= 0 {
            return Err(WalletError::InvalidParameter(format!("melt amount {} must be positive", amount)));
        }

        let authority = self
            .find_authority(&state, group, AuthorityFlags::allows_melt)
            .ok_or_else(|| WalletError::NoAuthority(format!("melting {} needs an authority with melt capability", group)))?;

        let coins = self.token_coins(&state, group);
        let selection = self.selector.select(&coins, amount, &CoinCandidate::quantity);
        if !selection.covers(amount) {
            return Err(WalletError::InsufficientFunds {
                asset: asset_name(&registry, group),
                needed: amount,
                available: selection.total,
            });
        }

        let mut keys = KeyReservation::new(&self.backend);
        let mut plan = TxPlan::new(group.clone());
        plan.group_available = selection.total - amount;
        plan.chosen = selection.coins;
        plan.chosen.push(authority.clone());
        renew_authority(&registry, &authority, &mut plan.outputs, &mut keys)?;

        let tx = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %tx.txid(), amount, "tokens melted");
        Ok(tx)
    }

    /// Transfer tokens of `group` to `recipients`.
    ///
    /// Moving the fee token pays one base management fee out of the amount
    /// selected.
    pub fn send(&self, group: &GroupId, recipients: &[Recipient]) -> Result<Transaction, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();
        if group.is_no_group() {
            return Err(WalletError::InvalidParameter("cannot send tokens of the native asset".into()));
        }
        check_recipients(recipients)?;

        let mut plan = TxPlan::new(group.clone());
        for r in recipients {
            plan.outputs.push(grouped_output(&registry, &r.destination, group, GroupPayload::Quantity(r.amount)));
        }
        if registry.matches_management(ManagementSlot::Fee, group) {
            if let Some(fee) = registry.management_fee(state.fee_counter) {
                registry.ensure_management_fee(&mut plan.outputs, fee);
            }
        }
        let needed = plan
            .outputs
            .iter()
            .map(|o| parse_group_script(&o.script_pubkey).quantity())
            .try_fold(0i64, i64::checked_add)
            .ok_or_else(|| WalletError::InvalidParameter("total send amount overflows".into()))?;

        let coins = self.token_coins(&state, group);
        let selection = self.selector.select(&coins, needed, &CoinCandidate::quantity);
        if !selection.covers(needed) {
            return Err(WalletError::InsufficientFunds {
                asset: asset_name(&registry, group),
                needed,
                available: selection.total,
            });
        }
        plan.group_available = selection.total;
        plan.group_needed = needed;
        plan.chosen = selection.coins;

        let keys = KeyReservation::new(&self.backend);
        let tx = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %tx.txid(), amount = needed, "tokens sent");
        Ok(tx)
    }

    // -----------------------------------------------------------------------
    // Authorities
    // -----------------------------------------------------------------------

    /// Issue a new authority of `group` carrying `flags` to `dest`.
    ///
    /// `CTRL` is always added. The spent authority must be renewable and
    /// hold every requested flag; it is renewed in the same transaction.
    pub fn create_authorities(
        &self,
        group: &GroupId,
        dest: &Destination,
        flags: AuthorityFlags,
    ) -> Result<Transaction, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();
        let wanted = (flags | AuthorityFlags::CTRL).renewable();

        let authority = self
            .find_authority(&state, group, |f| f.allows_renew() && f.has_flag(wanted))
            .ok_or_else(|| WalletError::NoAuthority(format!("no renewable authority of {} carries {}", group, wanted)))?;

        let mut keys = KeyReservation::new(&self.backend);
        let mut plan = TxPlan::new(group.clone());
        plan.chosen.push(authority.clone());
        renew_authority(&registry, &authority, &mut plan.outputs, &mut keys)?;
        plan.outputs.push(grouped_output(&registry, dest, group, GroupPayload::Authority(wanted)));

        let tx = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %tx.txid(), flags = %wanted, "token authority created");
        Ok(tx)
    }

    /// Remove `drop` from the authority at `outpoint`.
    ///
    /// The remaining flags go back to the same destination. When nothing
    /// beyond `CTRL` would remain, or `CTRL` itself is dropped, the
    /// authority is destroyed. An authority without `CCHILD` cannot re-emit
    /// what remains, so it can only be destroyed whole.
    pub fn drop_authorities(
        &self,
        group: &GroupId,
        outpoint: &OutPoint,
        drop: AuthorityFlags,
    ) -> Result<DroppedAuthorities, WalletError> {
        let registry = self.registry.read();
        let mut state = self.state.lock();

        let coin = self
            .coins(&state, |c| c.outpoint == *outpoint)
            .into_iter()
            .next()
            .ok_or(WalletError::CoinUnavailable(*outpoint))?;
        if !coin.is_authority() || coin.group() != *group {
            return Err(WalletError::InvalidParameter(format!("{} is not an authority of {}", outpoint, group)));
        }

        let former = coin.authority_flags();
        let mut kept = (former & !drop).renewable();
        if kept == AuthorityFlags::CTRL || !kept.has_flag(AuthorityFlags::CTRL) {
            kept = AuthorityFlags::NONE;
        }
        if kept.is_authority() && !former.allows_renew() {
            return Err(WalletError::InvalidParameter(format!(
                "authority {} ({}) lacks the child flag and can only be dropped whole",
                outpoint, former
            )));
        }

        let keys = KeyReservation::new(&self.backend);
        let mut plan = TxPlan::new(group.clone());
        if kept.is_authority() {
            plan.outputs.push(grouped_output(&registry, &coin.destination(), group, GroupPayload::Authority(kept)));
        }
        plan.chosen.push(coin);

        let transaction = self.finish(&mut state, &registry, plan, keys)?;
        info!(group = %group, txid = %transaction.txid(), kept = %kept, "token authorities dropped");
        Ok(DroppedAuthorities { former, kept, transaction })
    }
}

fn check_recipients(recipients: &[Recipient]) -> Result<(), WalletError> {
    if recipients.is_empty() {
        return Err(WalletError::InvalidParameter("no recipients".into()));
    }
    if let Some(r) = recipients.iter().find(|r| r.amount <= 0) {
        return Err(WalletError::InvalidParameter(format!("amount {} must be positive", r.amount)));
    }
    if let Some(r) = recipients.iter().find(|r| !token_money_range(r.amount)) {
        return Err(WalletError::InvalidParameter(format!("amount {} is out of range", r.amount)));
    }
    if recipients.iter().any(|r| r.destination.is_none()) {
        return Err(WalletError::InvalidParameter("recipient has no destination".into()));
    }
    Ok(())
}
