// ─────────────────────────────────────────────────────────────────
// Reward Ledger — messaging + validator reward accumulation
// ─────────────────────────────────────────────────────────────────
// user_rewards:      address → running total (additive only)
// validator_rewards: address → total + timestamped history entries
//
// Totals are monotonically non-decreasing: every operation adds,
// nothing ever subtracts. Unknown addresses read as 0.0.
// ─────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::unix_time;

/// Base reward for sending a message (DOU).
pub const BASE_MESSAGE_REWARD: f64 = 0.1;
/// Bonus per reverse-direction message counted as a "reply" (DOU).
pub const REPLY_BONUS: f64 = 0.05;

/// Stake-multiplier lookup table, keyed by EXACT locked amount.
///
/// KNOWN QUIRK (kept deliberately): the keys are the literal values
/// 0 / 1 / 1.25 / 1.5, so common stakes such as 100 match no key and
/// fall through to the 1.00 default. A range-based lookup would behave
/// differently; do not change without an explicit product decision.
const STAKE_MULTIPLIER_TABLE: [(f64, f64); 4] =
    [(0.0, 0.50), (1.0, 1.00), (1.25, 1.25), (1.50, 1.50)];

/// Maximum longevity bonus (75%).
const MAX_LONGEVITY_BONUS: f64 = 0.75;
/// Longevity bonus per year of validator age.
const LONGEVITY_BONUS_PER_YEAR: f64 = 0.25;
/// Stake multiplier ceiling.
const MAX_STAKE_MULTIPLIER: f64 = 1.50;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RewardEvent {
    pub timestamp: f64,
    pub reward: f64,
    pub multiplier: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ValidatorRewardAccount {
    pub total_rewards: f64,
    pub reward_history: Vec<RewardEvent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RewardLedger {
    user_rewards: HashMap<String, f64>,
    validator_rewards: HashMap<String, ValidatorRewardAccount>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate a messaging reward. Creates the entry on first use.
    pub fn add_message_reward(&mut self, address: &str, amount: f64) {
        *self.user_rewards.entry(address.to_string()).or_insert(0.0) += amount;
    }

    /// Reward multiplier from stake bucket and validator age.
    ///
    /// `longevity = min(0.75, age_years * 0.25)`, stake multiplier from the
    /// exact-match table above (default 1.00, clamped to 1.50), final value
    /// `stake_multiplier * (1 + longevity)`.
    #[allow(clippy::float_cmp)] // exact-key lookup, see table comment above
    pub fn calculate_validator_reward(locked_amount: f64, age_years: f64) -> f64 {
        let longevity_bonus = (age_years * LONGEVITY_BONUS_PER_YEAR).min(MAX_LONGEVITY_BONUS);

        let stake_multiplier = STAKE_MULTIPLIER_TABLE
            .iter()
            .find(|(key, _)| *key == locked_amount)
            .map(|(_, mult)| *mult)
            .unwrap_or(1.00)
            .min(MAX_STAKE_MULTIPLIER);

        stake_multiplier * (1.0 + longevity_bonus)
    }

    /// Credit `base_reward * multiplier` and append one history entry.
    pub fn add_validator_reward(&mut self, address: &str, base_reward: f64, multiplier: f64) {
        let account = self
            .validator_rewards
            .entry(address.to_string())
            .or_default();

        let total = base_reward * multiplier;
        account.total_rewards += total;
        account.reward_history.push(RewardEvent {
            timestamp: unix_time(),
            reward: total,
            multiplier,
        });
    }

    /// Total messaging rewards; 0.0 for unknown addresses.
    pub fn get_user_total_rewards(&self, address: &str) -> f64 {
        self.user_rewards.get(address).copied().unwrap_or(0.0)
    }

    /// Total validator rewards; 0.0 for unknown addresses.
    pub fn get_validator_total_rewards(&self, address: &str) -> f64 {
        self.validator_rewards
            .get(address)
            .map(|a| a.total_rewards)
            .unwrap_or(0.0)
    }

    /// Reward history for an address (empty slice when unknown).
    pub fn get_validator_history(&self, address: &str) -> &[RewardEvent] {
        self.validator_rewards
            .get(address)
            .map(|a| a.reward_history.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_reward_accumulates() {
        let mut ledger = RewardLedger::new();
        assert_eq!(ledger.get_user_total_rewards("DOU-AAA"), 0.0);

        ledger.add_message_reward("DOU-AAA", 0.1);
        ledger.add_message_reward("DOU-AAA", 0.15);
        assert!((ledger.get_user_total_rewards("DOU-AAA") - 0.25).abs() < 1e-12);

        // Other addresses are untouched.
        assert_eq!(ledger.get_user_total_rewards("DOU-BBB"), 0.0);
    }

    #[test]
    fn test_validator_reward_default_bucket() {
        // A stake of 100 matches no table key, so it takes the 1.00 default;
        // longevity for 0.5 years = 0.125 → multiplier 1.125.
        let mult = RewardLedger::calculate_validator_reward(100.0, 0.5);
        assert!((mult - 1.125).abs() < 1e-12);
    }

    #[test]
    fn test_validator_reward_exact_buckets() {
        assert_eq!(RewardLedger::calculate_validator_reward(0.0, 0.0), 0.50);
        assert_eq!(RewardLedger::calculate_validator_reward(1.0, 0.0), 1.00);
        assert_eq!(RewardLedger::calculate_validator_reward(1.25, 0.0), 1.25);
        assert_eq!(RewardLedger::calculate_validator_reward(1.50, 0.0), 1.50);
    }

    #[test]
    fn test_longevity_bonus_caps_at_75_pct() {
        // 10 years of age still gives only the 0.75 cap.
        let mult = RewardLedger::calculate_validator_reward(1.0, 10.0);
        assert!((mult - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_add_validator_reward_tracks_history() {
        let mut ledger = RewardLedger::new();
        ledger.add_validator_reward("DOU-VAL", 10.0, 1.125);
        ledger.add_validator_reward("DOU-VAL", 10.0, 1.5);

        let total = ledger.get_validator_total_rewards("DOU-VAL");
        assert!((total - (11.25 + 15.0)).abs() < 1e-9);

        let history = ledger.get_validator_history("DOU-VAL");
        assert_eq!(history.len(), 2);
        assert!((history[0].reward - 11.25).abs() < 1e-9);
        assert_eq!(history[0].multiplier, 1.125);
        assert!(history[0].timestamp > 0.0);
    }

    #[test]
    fn test_unknown_validator_reads_zero() {
        let ledger = RewardLedger::new();
        assert_eq!(ledger.get_validator_total_rewards("DOU-NOBODY"), 0.0);
        assert!(ledger.get_validator_history("DOU-NOBODY").is_empty());
    }
}
