//! Group registry.
//!
//! Maps group identifiers to their creation records. One synthetic entry
//! for the native asset is always present. Three management slots
//! (bootstrap, fee, governance) are bound by reserved ticker, first writer
//! wins, and are cleared on reset.

use std::collections::BTreeMap;
use std::sync::Arc;

use opgroup_primitives::hash::Hash256;
use opgroup_script::{Destination, Script};
use opgroup_transaction::Transaction;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::amount::{amount_from_display_value, display_value_from_amount, token_money_range};
use crate::codec::{extract_destination, parse_group_script};
use crate::creation::{configuration_parameters, TokenGroupCreation};
use crate::description::{TokenGroupDescription, DEFAULT_DECIMAL_POS};
use crate::filters::{default_filters, DescriptionFilter, MSG_NAME_EXISTS, MSG_TICKER_EXISTS};
use crate::group_id::GroupId;
use crate::params::TokenParams;
use crate::TokenError;

/// Registry shared between validation and construction.
pub type SharedRegistry = Arc<RwLock<GroupRegistry>>;

/// The well-known management groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManagementSlot {
    /// Gates creation of further management groups.
    Bootstrap,
    /// The token management fees are paid in.
    Fee,
    Governance,
}

impl ManagementSlot {
    pub const ALL: [ManagementSlot; 3] =
        [ManagementSlot::Bootstrap, ManagementSlot::Fee, ManagementSlot::Governance];
}

pub struct GroupRegistry {
    params: TokenParams,
    groups: BTreeMap<GroupId, TokenGroupCreation>,
    bootstrap: Option<TokenGroupCreation>,
    fee: Option<TokenGroupCreation>,
    governance: Option<TokenGroupCreation>,
    filters: Vec<DescriptionFilter>,
}

impl GroupRegistry {
    /// Create a registry holding only the native-asset entry.
    pub fn new(params: TokenParams) -> Self {
        let mut registry = GroupRegistry {
            params,
            groups: BTreeMap::new(),
            bootstrap: None,
            fee: None,
            governance: None,
            filters: default_filters(),
        };
        registry.reset_groups();
        registry
    }

    /// Wrap in the shared lock used across validation and construction.
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn params(&self) -> &TokenParams {
        &self.params
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Clear every group and slot, then reinsert the native-asset entry.
    pub fn reset_groups(&mut self) {
        self.groups.clear();
        self.bootstrap = None;
        self.fee = None;
        self.governance = None;

        let native = &self.params.native;
        let description = TokenGroupDescription::new(
            &native.ticker,
            &native.name,
            native.decimal_pos,
            &native.document_url,
            Hash256::ZERO,
        );
        self.groups.insert(GroupId::no_group(), TokenGroupCreation::native(description));
        debug!("token group registry reset");
    }

    /// Filter and insert creations in order.
    ///
    /// Each creation is filtered against the groups already present, may
    /// claim a free management slot, and is inserted unless its id is
    /// already registered. In strict mode a duplicate id or a ticker/name
    /// collision stops processing with `RegistryConflict` instead.
    pub fn add_groups<I>(&mut self, creations: I) -> Result<(), TokenError>
    where
        I: IntoIterator<Item = TokenGroupCreation>,
    {
        for creation in creations {
            self.add_group(creation)?;
        }
        Ok(())
    }

    /// Filter and insert one creation.
    ///
    /// # Returns
    /// `true` when inserted, `false` when the id was already present.
    pub fn add_group(&mut self, mut creation: TokenGroupCreation) -> Result<bool, TokenError> {
        self.apply_filters(&mut creation);
        let id = creation.info.group.clone();
        if !creation.status.is_empty() {
            debug!(group = %id, status = %creation.status, "token group description filtered");
        }

        if self.params.strict_registry {
            if self.groups.contains_key(&id) {
                return Err(TokenError::RegistryConflict { id, reason: "duplicate group id".into() });
            }
            for msg in [MSG_TICKER_EXISTS, MSG_NAME_EXISTS] {
                if creation.status.contains(msg) {
                    return Err(TokenError::RegistryConflict { id, reason: msg.into() });
                }
            }
        }

        // A free management slot binds even when the id is already present.
        self.store_management_group(&creation);
        if self.groups.contains_key(&id) {
            warn!(group = %id, "double token creation, keeping the first record");
            return Ok(false);
        }
        debug!(group = %id, ticker = %creation.description.ticker, "token group added");
        self.groups.insert(id, creation);
        Ok(true)
    }

    /// Run the description filters against the registered groups without
    /// inserting anything.
    pub fn apply_filters(&self, creation: &mut TokenGroupCreation) {
        for filter in &self.filters {
            filter(creation, &self.groups);
        }
    }

    /// Bind `creation` to the first free slot whose reserved ticker it
    /// carries.
    fn store_management_group(&mut self, creation: &TokenGroupCreation) -> bool {
        let ticker = creation.description.ticker.as_str();
        let m = &self.params.management;
        let slot = if ticker == m.bootstrap_ticker && self.bootstrap.is_none() {
            &mut self.bootstrap
        } else if ticker == m.fee_ticker && self.fee.is_none() {
            &mut self.fee
        } else if ticker == m.governance_ticker && self.governance.is_none() {
            &mut self.governance
        } else {
            return false;
        };
        info!(group = %creation.info.group, ticker, "management token group registered");
        *slot = Some(creation.clone());
        true
    }

    /// Undo the creation defined by `tx`.
    ///
    /// # Returns
    /// The removed group id, or `None` when `tx` creates no registered group.
    pub fn remove_group(&mut self, tx: &Transaction) -> Option<GroupId> {
        let (info, _) = configuration_parameters(tx)?;
        let id = info.group;
        for slot in ManagementSlot::ALL {
            if self.matches_management(slot, &id) {
                *self.slot_mut(slot) = None;
                break;
            }
        }
        let removed = self.groups.remove(&id).map(|_| id);
        if let Some(id) = &removed {
            debug!(group = %id, "token group removed");
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Creation record for `id`; subgroups resolve to their parent.
    pub fn get_creation(&self, id: &GroupId) -> Option<&TokenGroupCreation> {
        if id.is_subgroup() {
            self.groups.get(&id.parent_group())
        } else {
            self.groups.get(id)
        }
    }

    pub fn contains(&self, id: &GroupId) -> bool {
        self.get_creation(id).is_some()
    }

    /// Case-insensitive ticker lookup.
    pub fn lookup_by_ticker(&self, ticker: &str) -> Option<&GroupId> {
        self.groups
            .iter()
            .find(|(_, c)| c.description.ticker.eq_ignore_ascii_case(ticker))
            .map(|(id, _)| id)
    }

    /// Case-insensitive name lookup.
    pub fn lookup_by_name(&self, name: &str) -> Option<&GroupId> {
        self.groups
            .iter()
            .find(|(_, c)| c.description.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupId, &TokenGroupCreation)> {
        self.groups.iter()
    }

    /// Number of entries, the native asset included.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // -----------------------------------------------------------------------
    // Management slots
    // -----------------------------------------------------------------------

    pub fn management_creation(&self, slot: ManagementSlot) -> Option<&TokenGroupCreation> {
        match slot {
            ManagementSlot::Bootstrap => self.bootstrap.as_ref(),
            ManagementSlot::Fee => self.fee.as_ref(),
            ManagementSlot::Governance => self.governance.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: ManagementSlot) -> &mut Option<TokenGroupCreation> {
        match slot {
            ManagementSlot::Bootstrap => &mut self.bootstrap,
            ManagementSlot::Fee => &mut self.fee,
            ManagementSlot::Governance => &mut self.governance,
        }
    }

    pub fn management_group_id(&self, slot: ManagementSlot) -> Option<&GroupId> {
        self.management_creation(slot).map(|c| &c.info.group)
    }

    pub fn matches_management(&self, slot: ManagementSlot, id: &GroupId) -> bool {
        self.management_group_id(slot) == Some(id)
    }

    pub fn management_created(&self, slot: ManagementSlot) -> bool {
        self.management_creation(slot).is_some()
    }

    /// Destination of the configured management address.
    pub fn management_destination(&self) -> Option<&Destination> {
        self.params.management.address.as_ref().map(|a| &a.destination)
    }

    /// Whether spending `script` grants management rights.
    ///
    /// Before the bootstrap group exists the coin must pay the management
    /// address; afterwards it must belong to the bootstrap group.
    pub fn is_management_input(&self, script: &Script) -> bool {
        match self.management_group_id(ManagementSlot::Bootstrap) {
            None => match self.management_destination() {
                Some(dest) => !dest.is_none() && extract_destination(script) == *dest,
                None => false,
            },
            Some(bootstrap) => parse_group_script(script).group() == *bootstrap,
        }
    }

    // -----------------------------------------------------------------------
    // Display conversion
    // -----------------------------------------------------------------------

    fn decimal_pos(&self, id: &GroupId) -> u8 {
        self.get_creation(id)
            .map_or(DEFAULT_DECIMAL_POS, |c| c.description.decimal_pos)
    }

    /// Parse a user-entered amount using the group's decimal position.
    ///
    /// # Returns
    /// Raw units, `InvalidGroupId` for an unknown group, or an amount error.
    pub fn amount_from_display_value(&self, value: &str, id: &GroupId) -> Result<i64, TokenError> {
        let creation = self
            .get_creation(id)
            .ok_or_else(|| TokenError::InvalidGroupId(format!("unknown group {}", id)))?;
        let amount = amount_from_display_value(value, creation.description.decimal_pos)?;
        if !token_money_range(amount) {
            return Err(TokenError::AmountOutOfRange(amount));
        }
        Ok(amount)
    }

    /// Format raw units with the group's decimal position (8 when unknown).
    pub fn display_value_from_amount(&self, amount: i64, id: &GroupId) -> String {
        display_value_from_amount(amount, self.decimal_pos(id))
    }
}
