//! Symbol Collection — collector labels and collected awards

use rf_stage::{FeatureKind, SpinPhase};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::payout::PayoutAccumulator;
use crate::symbols::{Cell, Symbol};

use super::{FeatureId, FeatureModule, PhaseContext, PhaseView};

/// Labels collector symbols as reels stop and settles collected awards
pub struct CollectionModule {
    collectors: Vec<Symbol>,
    collect_trigger: Option<Symbol>,
}

impl CollectionModule {
    pub fn new(collectors: Vec<Symbol>, collect_trigger: Option<Symbol>) -> Self {
        Self {
            collectors,
            collect_trigger,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.collector_symbols.clone(), config.collect_trigger.clone())
    }

    fn is_collector(&self, symbol: &Symbol) -> bool {
        self.collectors.iter().any(|c| symbol.in_family(c))
    }

    fn trigger_landed(&self, view: &PhaseView<'_>) -> bool {
        self.collect_trigger
            .as_ref()
            .is_some_and(|t| view.outcome.grid.count(t) > 0)
    }

    fn label_reel(&self, reel: u8, cx: &mut PhaseContext<'_>) {
        let cells: Vec<(Cell, Symbol)> = cx
            .outcome
            .grid
            .reel(reel)
            .iter()
            .enumerate()
            .filter(|(_, s)| self.is_collector(s))
            .map(|(row, s)| (Cell::new(reel, row as u8), s.clone()))
            .collect();

        let duration = cx.timeline.config().symbol_label_ms;
        let start = cx.timeline.current();
        let mut barrier = cx.timeline.barrier();
        for (cell, symbol) in cells {
            barrier.fire(cx.timeline, duration);
            if let Err(e) = cx.label_cell(cell, &symbol, start) {
                cx.diagnostic(&e);
            }
        }
        barrier.join(cx.timeline);
    }

    fn collect(&self, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        let awards: Vec<_> = cx.outcome.awards().cloned().collect();
        let trigger_landed = self
            .collect_trigger
            .as_ref()
            .is_some_and(|t| cx.outcome.grid.count(t) > 0);

        if trigger_landed && awards.iter().all(|a| a.total_credits_awarded.is_zero()) {
            return Err(EngineError::configuration(format!(
                "collect trigger {} landed without a credit award",
                self.collect_trigger
                    .as_ref()
                    .map(|s| s.as_str())
                    .unwrap_or_default()
            )));
        }

        let wager = cx.wager_multiplier();
        for award in &awards {
            let credits =
                PayoutAccumulator::settle(award.total_credits_awarded, cx.outcome.multiplier, wager);
            if !credits.is_zero() {
                cx.payout.record_collection(credits);
                cx.settle_credits(credits);
                let rollup = cx.timeline.config().rollup_ms;
                cx.timeline.advance(rollup);
                log::info!("[Collection] Collected {} credits", credits);
            }
            cx.grant_free_spins(award.free_spins_awarded);
        }
        if !awards.is_empty() {
            cx.mark_feature_consumed(FeatureKind::SymbolCollection);
        }
        Ok(())
    }
}

impl FeatureModule for CollectionModule {
    fn id(&self) -> FeatureId {
        FeatureId::new("symbol_collection")
    }

    fn name(&self) -> &str {
        "Symbol Collection"
    }

    fn category(&self) -> FeatureKind {
        FeatureKind::SymbolCollection
    }

    fn wants(&self, phase: SpinPhase, view: &PhaseView<'_>) -> bool {
        match phase {
            SpinPhase::ReelStopping { reel_index } => view
                .outcome
                .grid
                .reel(reel_index)
                .iter()
                .any(|s| self.is_collector(s)),
            SpinPhase::AfterPaylines => {
                view.outcome.awards().next().is_some() || self.trigger_landed(view)
            }
            _ => false,
        }
    }

    fn run(&mut self, phase: SpinPhase, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        match phase {
            SpinPhase::ReelStopping { reel_index } => {
                self.label_reel(reel_index, cx);
                Ok(())
            }
            SpinPhase::AfterPaylines => self.collect(cx),
            other => Err(EngineError::state(format!("collection cannot run in {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rf_stage::Stage;

    use super::*;
    use crate::decoder::decode_json;
    use crate::features::TestBed;
    use crate::symbols::Credits;

    fn config() -> EngineConfig {
        EngineConfig::new("buffalo")
            .with_collectors(["SC"])
            .with_collect_trigger("CL")
    }

    #[test]
    fn test_labels_collectors_on_reel_stop() {
        let outcome = decode_json(
            r#"{"reels": [["SC","A","SC_MINI"],["A","A","A"]],
                "modifier_exports": [{"type": "symbol_credit_values",
                    "symbol_payouts": [{"symbol_name": "SC", "value": 10},
                                       {"symbol_name": "SC_MINI", "value": 2}]}]}"#,
        )
        .unwrap();
        let mut bed = TestBed::new(config(), outcome);
        let mut module = CollectionModule::from_config(&bed.config);

        let reel0 = SpinPhase::ReelStopping { reel_index: 0 };
        let reel1 = SpinPhase::ReelStopping { reel_index: 1 };
        assert!(module.wants(reel0, &bed.view()));
        assert!(!module.wants(reel1, &bed.view()));

        let mut cx = bed.cx(reel0);
        module.run(reel0, &mut cx).unwrap();
        let events = cx.into_events();
        let values: Vec<u64> = events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::SymbolValueChanged { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![10, 2]);
        assert_eq!(bed.board.labels.len(), 2);
        assert_eq!(bed.timeline.current(), 250.0);
    }

    #[test]
    fn test_collect_settles_award() {
        let outcome = decode_json(
            r#"{"reels": [["SC","CL"]], "multiplier": 2, "wager_multiplier": 3,
                "reevaluations": [{"type": "symbol_landing_award_credits",
                    "symbol_payouts": [{"symbol_name": "SC", "value": 10}]},
                    {"type": "symbol_landing_award_free_spins", "free_spins": 8}]}"#,
        )
        .unwrap();
        let mut bed = TestBed::new(config(), outcome);
        let mut module = CollectionModule::from_config(&bed.config);
        assert!(module.wants(SpinPhase::AfterPaylines, &bed.view()));

        let mut cx = bed.cx(SpinPhase::AfterPaylines);
        module.run(SpinPhase::AfterPaylines, &mut cx).unwrap();
        drop(cx);

        assert_eq!(bed.payout.collected(), Credits(60));
        assert_eq!(bed.payout.round_total(), Credits(60));
        assert_eq!(bed.tally.free_spins_awarded, 8);
        assert_eq!(bed.tally.features_consumed, vec![FeatureKind::SymbolCollection]);
    }

    #[test]
    fn test_trigger_without_award_is_configuration_error() {
        let outcome = decode_json(r#"{"reels": [["SC","CL"]]}"#).unwrap();
        let mut bed = TestBed::new(config(), outcome);
        let mut module = CollectionModule::from_config(&bed.config);
        assert!(module.wants(SpinPhase::AfterPaylines, &bed.view()));

        let mut cx = bed.cx(SpinPhase::AfterPaylines);
        let err = module.run(SpinPhase::AfterPaylines, &mut cx).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
