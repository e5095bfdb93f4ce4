//! Balance and authority queries over the wallet's unspent coins.
//!
//! Balances saturate at `i64::MAX`. A destination of
//! `Destination::None` matches coins paying anywhere.

use std::collections::BTreeMap;

use opgroup_script::Destination;
use opgroup_tokens::{AuthorityFlags, GroupId};

use crate::backend::{CoinCandidate, WalletBackend};
use crate::wallet::TokenWallet;

fn pays(coin: &CoinCandidate, dest: &Destination) -> bool {
    dest.is_none() || coin.destination() == *dest
}

impl<B: WalletBackend> TokenWallet<B> {
    fn grouped_coins(&self, filter: impl Fn(&CoinCandidate) -> bool) -> Vec<CoinCandidate> {
        let spent = self.spent_coins();
        self.backend()
            .filter(&|c: &CoinCandidate| !spent.contains(&c.outpoint) && !c.group().is_no_group() && filter(c))
    }

    /// Token balance of every group the wallet holds tokens of.
    pub fn all_group_balances(&self) -> BTreeMap<GroupId, i64> {
        self.all_group_balances_and_authorities().0
    }

    /// Token balances plus the union of authority flags held per group.
    pub fn all_group_balances_and_authorities(&self) -> (BTreeMap<GroupId, i64>, BTreeMap<GroupId, AuthorityFlags>) {
        let mut balances = BTreeMap::new();
        let mut authorities = BTreeMap::new();
        for coin in self.grouped_coins(|_| true) {
            if coin.is_authority() {
                *authorities.entry(coin.group()).or_insert(AuthorityFlags::NONE) |= coin.authority_flags().renewable();
            } else {
                let balance: &mut i64 = balances.entry(coin.group()).or_insert(0);
                *balance = balance.saturating_add(coin.quantity());
            }
        }
        (balances, authorities)
    }

    /// Tokens of `group` paying `dest`.
    pub fn group_balance(&self, group: &GroupId, dest: &Destination) -> i64 {
        self.group_balance_and_authorities(group, dest).0
    }

    pub fn group_balance_and_authorities(&self, group: &GroupId, dest: &Destination) -> (i64, AuthorityFlags) {
        let mut balance = 0i64;
        let mut authorities = AuthorityFlags::NONE;
        for coin in self.grouped_coins(|c| c.group() == *group && pays(c, dest)) {
            if coin.is_authority() {
                authorities |= coin.authority_flags().renewable();
            } else {
                balance = balance.saturating_add(coin.quantity());
            }
        }
        (balance, authorities)
    }

    /// Authority coins, of one group or of all groups.
    pub fn list_authorities(&self, group: Option<&GroupId>) -> Vec<CoinCandidate> {
        self.grouped_coins(|c| c.is_authority() && group.map_or(true, |g| c.group() == *g))
    }
}
