//! Coin selection.
//!
//! Selection is greedy: candidates are taken in the order the coin source
//! lists them until the target is reached. Callers compare the returned
//! total against the target to detect a shortfall.

use crate::backend::CoinCandidate;

/// Coins picked for one asset and their combined weight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub coins: Vec<CoinCandidate>,
    pub total: i64,
}

impl Selection {
    pub fn covers(&self, target: i64) -> bool {
        self.total >= target
    }
}

/// Strategy for picking coins to cover an amount.
pub trait CoinSelector: Send + Sync {
    /// Pick coins from `coins` until their combined `weight` reaches
    /// `target`.
    ///
    /// # Arguments
    /// * `coins` - Candidates, all of the same asset.
    /// * `target` - Amount to cover; zero or less selects nothing.
    /// * `weight` - How much one candidate contributes.
    ///
    /// # Returns
    /// The picked coins. The total falls short of `target` when the
    /// candidates cannot cover it.
    fn select(&self, coins: &[CoinCandidate], target: i64, weight: &dyn Fn(&CoinCandidate) -> i64) -> Selection;
}

/// Take candidates in order until the target is reached.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedySelector;

impl CoinSelector for GreedySelector {
    fn select(&self, coins: &[CoinCandidate], target: i64, weight: &dyn Fn(&CoinCandidate) -> i64) -> Selection {
        let mut selection = Selection::default();
        for coin in coins {
            if selection.total >= target {
                break;
            }
            selection.total = selection.total.saturating_add(weight(coin));
            selection.coins.push(coin.clone());
        }
        selection
    }
}

fn native_weight(coin: &CoinCandidate) -> i64 {
    i64::try_from(coin.value()).unwrap_or(i64::MAX)
}

/// Greedy selection by native value.
pub fn coin_selection(coins: &[CoinCandidate], amount: u64) -> Selection {
    let target = i64::try_from(amount).unwrap_or(i64::MAX);
    GreedySelector.select(coins, target, &native_weight)
}

/// Greedy selection by token quantity. Authority coins weigh nothing.
pub fn group_coin_selection(coins: &[CoinCandidate], amount: i64) -> Selection {
    GreedySelector.select(coins, amount, &CoinCandidate::quantity)
}

/// The smallest coin worth strictly more than `amount`.
pub fn nearest_greater_coin(coins: &[CoinCandidate], amount: u64) -> Option<&CoinCandidate> {
    coins.iter().filter(|c| c.value() > amount).min_by_key(|c| c.value())
}

/// Total native value of `coins`.
pub fn native_total(coins: &[CoinCandidate]) -> u64 {
    coins.iter().fold(0u64, |acc, c| acc.saturating_add(c.value()))
}
