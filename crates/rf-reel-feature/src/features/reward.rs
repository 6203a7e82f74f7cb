//! Reward Symbol — pays the ledger value of each reward symbol

use rf_stage::{FeatureKind, SpinPhase};

use crate::error::{EngineError, EngineResult};
use crate::symbols::{Cell, Credits};

use super::{FeatureId, FeatureModule, PhaseContext, PhaseView};

#[derive(Debug, Default)]
pub struct RewardModule;

impl RewardModule {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureModule for RewardModule {
    fn id(&self) -> FeatureId {
        FeatureId::new("reward_symbol")
    }

    fn name(&self) -> &str {
        "Reward Symbol"
    }

    fn category(&self) -> FeatureKind {
        FeatureKind::RewardSymbol
    }

    fn wants(&self, phase: SpinPhase, view: &PhaseView<'_>) -> bool {
        phase == SpinPhase::AfterPaylines && view.outcome.reward_symbols().next().is_some()
    }

    fn run(&mut self, phase: SpinPhase, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        if phase != SpinPhase::AfterPaylines {
            return Err(EngineError::state(format!("reward symbol cannot run in {phase}")));
        }

        let wager = cx.wager_multiplier();
        let mut total = Credits::ZERO;
        let outcome = cx.outcome;
        for reward in outcome.reward_symbols() {
            // value_of already carries the outcome multiplier
            let credits = match cx.ledger.value_of(&reward.symbol) {
                Ok(value) => value.times(wager),
                Err(e) => {
                    cx.diagnostic(&e);
                    Credits::ZERO
                }
            };
            if !credits.is_zero() {
                let ts = cx.timeline.current();
                cx.label_cell(Cell::new(reward.reel, reward.position), &reward.symbol, ts)?;
                cx.settle_credits(credits);
            }
            total += credits;
        }

        let rollup = cx.timeline.config().rollup_ms;
        cx.timeline.advance(rollup);
        cx.mark_feature_consumed(FeatureKind::RewardSymbol);
        log::info!("[Reward] Paid {} credits", total);
        Ok(())
    }
}
