//! Tier selection policy
//!
//! "Maximize notional among confirmed-viable": pick the viable tier with the
//! largest computed amount, breaking ties by ladder order. No return
//! estimate exists, so there is nothing risk-adjusted to maximize.

use crate::probe::ProbeOutcome;
use crate::types::GridTier;

/// Deterministic selection from a fixed set of probe outcomes. Returns None
/// when no tier is viable; the cycle then ends with no action.
pub fn select_tier(outcomes: &[ProbeOutcome]) -> Option<GridTier> {
    outcomes
        .iter()
        .filter(|o| o.viable)
        .fold(None::<&GridTier>, |best, o| match best {
            Some(b) if o.tier.amount <= b.amount => Some(b),
            _ => Some(&o.tier),
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    fn outcome(label: &str, amount: u64, flash: bool, viable: bool) -> ProbeOutcome {
        ProbeOutcome {
            tier: GridTier {
                label: label.to_string(),
                pct: 0,
                flash,
                amount: U256::from(amount),
            },
            viable,
        }
    }

    #[test]
    fn test_no_viable_tier_returns_none() {
        let outcomes = vec![
            outcome("MICRO (10%)", 100, false, false),
            outcome("MAX (100%)", 1_000, false, false),
        ];
        assert!(select_tier(&outcomes).is_none());
    }

    #[test]
    fn test_picks_largest_viable_amount() {
        let outcomes = vec![
            outcome("MICRO (10%)", 100, false, true),
            outcome("MAX (100%)", 1_000, false, false),
            outcome("LEVERAGE (10x)", 10_000, true, true),
        ];
        let chosen = select_tier(&outcomes).unwrap();
        assert_eq!(chosen.label, "LEVERAGE (10x)");
    }

    #[test]
    fn test_ties_break_by_ladder_order() {
        let outcomes = vec![
            outcome("first", 500, false, true),
            outcome("second", 500, false, true),
        ];
        assert_eq!(select_tier(&outcomes).unwrap().label, "first");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let outcomes = vec![
            outcome("MICRO (10%)", 100, false, true),
            outcome("MEDIUM (50%)", 500, false, true),
            outcome("MAX (100%)", 1_000, false, true),
        ];
        let first = select_tier(&outcomes).unwrap();
        for _ in 0..10 {
            assert_eq!(select_tier(&outcomes).unwrap(), first);
        }
    }
}
