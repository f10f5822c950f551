//! Grid tier construction
//!
//! Builds the fixed, version-pinned ladder of capital-utilization tiers from
//! the freshly read balance. All amounts are exact U256 arithmetic with
//! truncating division; a non-flash tier never exceeds safe capital.

use crate::types::GridTier;
use ethers::types::U256;

/// The seven-tier ladder: label, fraction numerator over 100, flash flag.
/// Flash tiers size beyond the wallet's own balance; the executor borrows
/// for the duration of the call instead of requiring the funds be held.
pub const LADDER: [(&str, u32, bool); 7] = [
    ("MICRO (10%)", 10, false),
    ("SMALL (25%)", 25, false),
    ("MEDIUM (50%)", 50, false),
    ("LARGE (75%)", 75, false),
    ("MAX (100%)", 100, false),
    ("LEVERAGE (10x)", 1_000, true),
    ("FLASH (100x)", 10_000, true),
];

pub struct GridPlanner {
    reserve: U256,
}

impl GridPlanner {
    pub fn new(reserve: U256) -> Self {
        Self { reserve }
    }

    /// Construct the ladder for the given balance. `overhead` is the
    /// network's moat for execution-triggered cycles, zero otherwise.
    /// Returns an empty ladder when safe capital is not positive.
    pub fn plan(&self, balance: U256, overhead: U256) -> Vec<GridTier> {
        let Some(after_reserve) = balance.checked_sub(self.reserve) else {
            return Vec::new();
        };
        let Some(safe) = after_reserve.checked_sub(overhead) else {
            return Vec::new();
        };
        if safe.is_zero() {
            return Vec::new();
        }

        LADDER
            .iter()
            .map(|&(label, pct, flash)| GridTier {
                label: label.to_string(),
                pct,
                flash,
                // Truncating division is intentional: never round up
                amount: safe * U256::from(pct) / U256::from(100u32),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_worked_example() {
        // balance 1_000_000_000, reserve 2_000_000 -> safe 998_000_000
        let planner = GridPlanner::new(wei(2_000_000));
        let tiers = planner.plan(wei(1_000_000_000), U256::zero());
        assert_eq!(tiers.len(), 7);

        let micro = &tiers[0];
        assert_eq!(micro.label, "MICRO (10%)");
        assert_eq!(micro.amount, wei(99_800_000));
        assert!(!micro.flash);

        let max = &tiers[4];
        assert_eq!(max.label, "MAX (100%)");
        assert_eq!(max.amount, wei(998_000_000));
        assert!(!max.flash);

        let leverage = &tiers[5];
        assert_eq!(leverage.label, "LEVERAGE (10x)");
        assert_eq!(leverage.amount, wei(9_980_000_000));
        assert!(leverage.flash);
    }

    #[test]
    fn test_amounts_monotonic_in_fraction() {
        let planner = GridPlanner::new(wei(1_000));
        let tiers = planner.plan(wei(123_456_789), U256::zero());
        for pair in tiers.windows(2) {
            assert!(pair[1].amount >= pair[0].amount);
        }
    }

    #[test]
    fn test_non_flash_bounded_by_safe_capital() {
        let planner = GridPlanner::new(wei(2_000_000));
        let balance = wei(1_000_000_000);
        let safe = wei(998_000_000);
        for tier in planner.plan(balance, U256::zero()) {
            if !tier.flash {
                assert!(tier.amount <= safe, "{} exceeds safe capital", tier.label);
            } else {
                assert!(tier.amount > balance);
            }
        }
    }

    #[test]
    fn test_truncating_division_never_rounds_up() {
        // safe = 999; 10% = 99.9 -> must truncate to 99
        let planner = GridPlanner::new(U256::zero());
        let tiers = planner.plan(wei(999), U256::zero());
        assert_eq!(tiers[0].amount, wei(99));
    }

    #[test]
    fn test_no_tiers_when_balance_below_reserve() {
        let planner = GridPlanner::new(wei(2_000_000));
        assert!(planner.plan(wei(1_000_000), U256::zero()).is_empty());
    }

    #[test]
    fn test_no_tiers_when_overhead_consumes_capital() {
        let planner = GridPlanner::new(wei(500));
        assert!(planner.plan(wei(1_000), wei(600)).is_empty());
        // Exactly consumed -> zero safe capital -> no tiers
        assert!(planner.plan(wei(1_000), wei(500)).is_empty());
    }

    #[test]
    fn test_overhead_reduces_safe_capital() {
        let planner = GridPlanner::new(wei(100));
        let tiers = planner.plan(wei(1_100), wei(200));
        // safe = 1100 - 100 - 200 = 800
        assert_eq!(tiers[4].amount, wei(800));
    }
}
