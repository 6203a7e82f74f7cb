//! Payout Accumulator — settled round total and in-progress feature figure

use crate::error::{EngineError, EngineResult};
use crate::symbols::Credits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureTally {
    Inactive,
    Running(Credits),
    Settled(Credits),
}

/// Owns the round's payout total
#[derive(Debug, Clone)]
pub struct PayoutAccumulator {
    round_total: Credits,
    feature: FeatureTally,
    collected: Credits,
}

impl Default for PayoutAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PayoutAccumulator {
    pub fn new() -> Self {
        Self {
            round_total: Credits::ZERO,
            feature: FeatureTally::Inactive,
            collected: Credits::ZERO,
        }
    }

    /// Reset for a new base round
    pub fn begin_round(&mut self) {
        *self = Self::new();
    }

    /// Enter a sub-game: the round total carries on from `parent_total`,
    /// the feature figure and collection start over
    pub fn begin_sub_game(&mut self, parent_total: Credits) {
        *self = Self::new();
        self.round_total = parent_total;
    }

    /// `raw * outcome_multiplier * wager_multiplier`, saturating
    pub fn settle(raw: Credits, outcome_multiplier: u32, wager_multiplier: u32) -> Credits {
        raw.times(outcome_multiplier).times(wager_multiplier)
    }

    /// Add already-settled credits to the round total; returns the displayed total
    pub fn add_settled(&mut self, credits: Credits) -> Credits {
        self.round_total += credits;
        self.displayed_total()
    }

    /// Start a feature figure at zero
    pub fn begin_feature(&mut self) {
        self.feature = FeatureTally::Running(Credits::ZERO);
    }

    pub fn is_feature_running(&self) -> bool {
        matches!(self.feature, FeatureTally::Running(_))
    }

    /// In-progress feature figure (zero when none is running)
    pub fn feature_total(&self) -> Credits {
        match self.feature {
            FeatureTally::Running(v) => v,
            _ => Credits::ZERO,
        }
    }

    /// Raise the feature figure; a lower value is rejected and nothing changes
    pub fn report_running_total(&mut self, value: Credits) -> EngineResult<Credits> {
        match self.feature {
            FeatureTally::Running(current) if value < current => {
                log::warn!(
                    "[Payout] Rejected running total {} below current {}",
                    value,
                    current
                );
                Err(EngineError::state(format!(
                    "running total {value} is below {current}"
                )))
            }
            FeatureTally::Running(_) => {
                self.feature = FeatureTally::Running(value);
                Ok(self.displayed_total())
            }
            _ => Err(EngineError::state("running total reported with no feature running")),
        }
    }

    /// Replace the feature figure with a match-count payout (may lower it)
    pub fn report_match_count_total(&mut self, value: Credits) -> EngineResult<Credits> {
        match self.feature {
            FeatureTally::Running(_) => {
                self.feature = FeatureTally::Running(value);
                Ok(self.displayed_total())
            }
            _ => Err(EngineError::state(
                "match-count total reported with no feature running",
            )),
        }
    }

    /// Add the feature figure to the round total once; later calls change nothing
    pub fn finalize(&mut self) -> Credits {
        if let FeatureTally::Running(value) = self.feature {
            self.round_total += value;
            self.feature = FeatureTally::Settled(value);
            log::debug!(
                "[Payout] Feature settled {}, round total {}",
                value,
                self.round_total
            );
        }
        self.round_total
    }

    /// Feature contribution settled by the last `finalize`
    pub fn last_feature_win(&self) -> Option<Credits> {
        match self.feature {
            FeatureTally::Settled(v) => Some(v),
            _ => None,
        }
    }

    pub fn record_collection(&mut self, value: Credits) {
        self.collected += value;
    }

    /// Value collected this round (carry-over source)
    pub fn collected(&self) -> Credits {
        self.collected
    }

    pub fn round_total(&self) -> Credits {
        self.round_total
    }

    /// Round total plus the in-progress feature figure
    pub fn displayed_total(&self) -> Credits {
        self.round_total + self.feature_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_order() {
        assert_eq!(PayoutAccumulator::settle(Credits(50), 2, 3), Credits(300));
        assert_eq!(
            PayoutAccumulator::settle(Credits(u64::MAX / 2), 3, 1),
            Credits(u64::MAX)
        );
    }

    #[test]
    fn test_finalize_idempotent() {
        let mut payout = PayoutAccumulator::new();
        payout.add_settled(Credits(40));
        payout.begin_feature();
        payout.report_match_count_total(Credits(300)).unwrap();
        assert_eq!(payout.displayed_total(), Credits(340));

        assert_eq!(payout.finalize(), Credits(340));
        assert_eq!(payout.finalize(), Credits(340));
        assert_eq!(payout.last_feature_win(), Some(Credits(300)));
        assert_eq!(payout.displayed_total(), Credits(340));
    }

    #[test]
    fn test_running_total_monotonic() {
        let mut payout = PayoutAccumulator::new();
        payout.begin_feature();
        payout.report_running_total(Credits(100)).unwrap();
        assert!(payout.report_running_total(Credits(60)).is_err());
        assert_eq!(payout.feature_total(), Credits(100));
        payout.report_running_total(Credits(100)).unwrap();
        payout.report_running_total(Credits(120)).unwrap();
        assert_eq!(payout.feature_total(), Credits(120));
    }

    #[test]
    fn test_match_count_total_may_lower() {
        let mut payout = PayoutAccumulator::new();
        payout.begin_feature();
        payout.report_match_count_total(Credits(200)).unwrap();
        payout.report_match_count_total(Credits(50)).unwrap();
        assert_eq!(payout.feature_total(), Credits(50));
    }

    #[test]
    fn test_reports_need_running_feature() {
        let mut payout = PayoutAccumulator::new();
        assert!(payout.report_running_total(Credits(1)).is_err());
        assert!(payout.report_match_count_total(Credits(1)).is_err());
        assert_eq!(payout.finalize(), Credits::ZERO);
    }

    #[test]
    fn test_begin_round_resets() {
        let mut payout = PayoutAccumulator::new();
        payout.add_settled(Credits(10));
        payout.record_collection(Credits(7));
        payout.begin_round();
        assert_eq!(payout.round_total(), Credits::ZERO);
        assert_eq!(payout.collected(), Credits::ZERO);
    }

    #[test]
    fn test_sub_game_continues_parent_total() {
        let mut payout = PayoutAccumulator::new();
        payout.record_collection(Credits(75));
        payout.begin_sub_game(Credits(75));
        assert_eq!(payout.round_total(), Credits(75));
        assert_eq!(payout.collected(), Credits::ZERO);

        payout.add_settled(Credits(30));
        assert_eq!(payout.displayed_total(), Credits(105));
    }
}
