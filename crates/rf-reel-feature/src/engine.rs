//! Feature Engine — Lifecycle dispatcher
//!
//! Drives one outcome through the spin lifecycle, asking every registered
//! module in registration order whether it wants each phase. Events a
//! handler emits reach the observer only after the handler returns.

use rf_stage::{
    FeatureKind, NullObserver, SpinPhase, Stage, StageEvent, StageObserver, Timeline, TimingConfig,
};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::decoder::decode_json;
use crate::error::{EngineError, EngineResult};
use crate::features::{
    BoxedFeatureModule, CollectionModule, ModuleRegistry, PhaseContext, PhaseView, RewardModule,
    RoundTally, SpinBoard, StickyRespinModule, UpgradeModule,
};
use crate::ledger::SymbolValueLedger;
use crate::outcome::Outcome;
use crate::paytable::PayTable;
use crate::payout::PayoutAccumulator;
use crate::round::{Diagnostic, RoundContext, RoundKind, RoundSummary};
use crate::symbols::{Credits, Grid};

const DISPATCHER: &str = "dispatcher";

/// What one spin produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinReport {
    /// Phases executed, in order
    pub phases: Vec<SpinPhase>,
    /// Round total after the spin
    pub round_total: Credits,
    /// Credits this spin added to the round
    pub spin_win: Credits,
    /// Diagnostics raised during the spin
    pub diagnostics: Vec<Diagnostic>,
    /// Features consumed for the first time this round during the spin
    pub features: Vec<FeatureKind>,
}

struct SpinState {
    outcome: Outcome,
    next: Option<SpinPhase>,
    deferred_base: Option<Credits>,
    phases: Vec<SpinPhase>,
    total_at_start: Credits,
    diagnostics_mark: usize,
    features_mark: usize,
}

/// Reel feature resolution engine
///
/// Owns the ledger, the payout accumulator and the timeline for the
/// current round. Modules see them only through a [`PhaseContext`].
pub struct FeatureEngine {
    /// Configuration
    config: EngineConfig,
    /// Read-only paytables
    paytable: PayTable,
    /// Feature modules in dispatch order
    registry: ModuleRegistry,
    /// Collector values for the round
    ledger: SymbolValueLedger,
    /// Round payout
    payout: PayoutAccumulator,
    /// Presentation pacing
    timeline: Timeline,
    /// Host callbacks
    observer: Box<dyn StageObserver + Send>,
    /// Open round, if any
    round: Option<RoundContext>,
    /// Round bookkeeping for the summary
    tally: RoundTally,
    /// Per-spin labels
    board: SpinBoard,
    /// Spin in progress
    spin: Option<SpinState>,
    /// Report of the last completed spin
    last_report: Option<SpinReport>,
}

impl FeatureEngine {
    /// Create an engine with no modules; the configuration is validated
    pub fn new(config: EngineConfig, paytable: PayTable) -> EngineResult<Self> {
        config.validate()?;
        let timeline = Timeline::new(TimingConfig::from_profile(config.timing));
        let ledger = SymbolValueLedger::new(config.collector_symbols.clone());

        log::info!(
            "[Dispatcher] Engine for {} ({} reels, {} paytables)",
            config.game_key,
            config.reel_count,
            paytable.table_names().count()
        );

        Ok(Self {
            config,
            paytable,
            registry: ModuleRegistry::new(),
            ledger,
            payout: PayoutAccumulator::new(),
            timeline,
            observer: Box::new(NullObserver),
            round: None,
            tally: RoundTally::default(),
            board: SpinBoard::default(),
            spin: None,
            last_report: None,
        })
    }

    /// Register the built-in modules the configuration asks for
    ///
    /// Order: collection, value upgrade, reward symbol, sticky respin.
    pub fn with_builtin_modules(mut self) -> EngineResult<Self> {
        self.register(Box::new(CollectionModule::from_config(&self.config)))?;
        self.register(Box::new(UpgradeModule::new()))?;
        self.register(Box::new(RewardModule::new()))?;
        if let Some(sticky) = self.config.sticky.clone() {
            self.register(Box::new(StickyRespinModule::new(sticky)))?;
        }
        Ok(self)
    }

    /// Replace the host observer
    pub fn with_observer(mut self, observer: impl StageObserver + Send + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn set_observer(&mut self, observer: impl StageObserver + Send + 'static) {
        self.observer = Box::new(observer);
    }

    /// Add a module after the ones already registered
    pub fn register(&mut self, module: BoxedFeatureModule) -> EngineResult<()> {
        if self.spin.is_some() {
            return Err(EngineError::state("module registration during a spin"));
        }
        self.registry.register(module)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn paytable(&self) -> &PayTable {
        &self.paytable
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &SymbolValueLedger {
        &self.ledger
    }

    pub fn payout(&self) -> &PayoutAccumulator {
        &self.payout
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn round(&self) -> Option<&RoundContext> {
        self.round.as_ref()
    }

    /// Outcome of the spin in progress
    pub fn outcome(&self) -> Option<&Outcome> {
        self.spin.as_ref().map(|s| &s.outcome)
    }

    /// Phase the next `advance` will execute
    pub fn next_phase(&self) -> Option<SpinPhase> {
        self.spin.as_ref().and_then(|s| s.next)
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    /// Can the host start another spin?
    pub fn is_next_spin_allowed(&self) -> bool {
        self.spin.is_none() && !self.registry.any_holding()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROUNDS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open a round, resetting the ledger and round bookkeeping
    ///
    /// The payout total resets only for a base round; a sub-game continues
    /// from its parent's total.
    pub fn begin_round(&mut self, round: RoundContext) -> EngineResult<()> {
        if self.spin.is_some() {
            return Err(self.reject(EngineError::state("begin_round during a spin")));
        }
        if self.registry.any_holding() {
            return Err(self.reject(EngineError::state("begin_round while a feature holds the gate")));
        }

        self.ledger.reset();
        match round.kind {
            RoundKind::Base => self.payout.begin_round(),
            RoundKind::SubGame => self.payout.begin_sub_game(round.parent_total),
        }
        self.tally.clear();
        self.board.clear();
        self.timeline.reset();
        self.last_report = None;
        for module in self.registry.iter_mut() {
            module.begin_round(&round);
        }

        log::info!(
            "[Dispatcher] Round {} ({:?}) opened, wager x{}, carry-over {}",
            round.round_id,
            round.kind,
            round.wager_multiplier,
            round.carry_over
        );
        self.round = Some(round);
        Ok(())
    }

    /// Close the round and summarize it
    pub fn end_round(&mut self) -> EngineResult<RoundSummary> {
        if self.spin.is_some() || self.registry.any_holding() {
            return Err(self.reject(EngineError::state("end_round before the spin resolved")));
        }
        let Some(round) = self.round.take() else {
            return Err(self.reject(EngineError::state("end_round with no round open")));
        };

        let summary = RoundSummary {
            round_id: round.round_id,
            game_key: round.game_key,
            wager_multiplier: round.wager_multiplier,
            round_total: self.payout.round_total(),
            collected_value: self.payout.collected(),
            features_consumed: self.tally.features_consumed.clone(),
            free_spins_awarded: self.tally.free_spins_awarded,
            diagnostics: self.tally.diagnostics.iter().map(Diagnostic::from).collect(),
        };
        log::info!(
            "[Dispatcher] Round {} closed: total {}, collected {}, {} diagnostics",
            summary.round_id,
            summary.round_total,
            summary.collected_value,
            summary.diagnostics.len()
        );
        Ok(summary)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SPINS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Accept the outcome of the next spin
    pub fn begin_spin(&mut self, outcome: Outcome) -> EngineResult<()> {
        if self.round.is_none() {
            return Err(self.reject(EngineError::state("begin_spin with no round open")));
        }
        if self.spin.is_some() {
            return Err(self.reject(EngineError::state("begin_spin while a spin is in progress")));
        }
        if self.registry.any_holding() {
            return Err(self.reject(EngineError::state("begin_spin while a feature holds the gate")));
        }
        let reels = outcome.grid.reel_count();
        if reels != usize::from(self.config.reel_count) {
            let error = EngineError::configuration(format!(
                "outcome has {} reels, {} expects {}",
                reels, self.config.game_key, self.config.reel_count
            ));
            return Err(self.reject(error));
        }

        self.timeline.reset();
        self.spin = Some(SpinState {
            outcome,
            next: Some(SpinPhase::PreSpin),
            deferred_base: None,
            phases: Vec::new(),
            total_at_start: self.payout.round_total(),
            diagnostics_mark: self.tally.diagnostics.len(),
            features_mark: self.tally.features_consumed.len(),
        });
        Ok(())
    }

    /// Decode a JSON payload and accept it as the next spin
    pub fn begin_spin_json(&mut self, json: &str) -> EngineResult<()> {
        match decode_json(json) {
            Ok(outcome) => self.begin_spin(outcome),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Execute the next phase; `None` once the spin is resolved
    pub fn advance(&mut self) -> EngineResult<Option<SpinPhase>> {
        let Some(phase) = self.next_phase() else {
            return Ok(None);
        };
        self.execute(phase)?;
        Ok(Some(phase))
    }

    /// Execute a named phase; it must be the next one
    pub fn dispatch(&mut self, phase: SpinPhase) -> EngineResult<()> {
        let expected = self.next_phase();
        if expected != Some(phase) {
            let expected = expected.map(|p| p.to_string()).unwrap_or_else(|| "no phase".into());
            return Err(self.reject(EngineError::state(format!(
                "{phase} dispatched out of order, expected {expected}"
            ))));
        }
        self.execute(phase)
    }

    /// Drive a whole spin to `Idle`
    pub fn run_spin(&mut self, outcome: Outcome) -> EngineResult<SpinReport> {
        self.begin_spin(outcome)?;
        while self.advance()?.is_some() {}
        self.last_report
            .take()
            .ok_or_else(|| EngineError::state("spin resolved without a report"))
    }

    /// Collapse presentation waits for the rest of the spin
    pub fn skip(&mut self) {
        log::debug!("[Dispatcher] Skip requested");
        self.timeline.skip();
    }

    /// Log, record and deliver an error raised outside any handler
    fn reject(&mut self, error: EngineError) -> EngineError {
        log::error!("[Dispatcher] {}", error);
        let event = StageEvent::new(
            Stage::Diagnostic {
                kind: error.kind(),
                message: error.to_string(),
            },
            self.timeline.current(),
        )
        .with_source(DISPATCHER);
        self.observer.on_event(&event);
        self.tally.diagnostics.push(error.clone());
        error
    }

    fn execute(&mut self, phase: SpinPhase) -> EngineResult<()> {
        let Self {
            config,
            paytable,
            registry,
            ledger,
            payout,
            timeline,
            observer,
            round,
            tally,
            board,
            spin,
            last_report,
        } = self;

        let Some(round) = round.as_ref() else {
            return Err(EngineError::state(format!("{phase} with no round open")));
        };
        let Some(state) = spin.as_mut() else {
            return Err(EngineError::state(format!("{phase} with no spin in progress")));
        };
        let outcome = &state.outcome;

        macro_rules! phase_cx {
            ($source:expr) => {
                PhaseContext {
                    phase,
                    outcome,
                    paytable: &*paytable,
                    round,
                    config: &*config,
                    ledger: &mut *ledger,
                    payout: &mut *payout,
                    timeline: &mut *timeline,
                    board: &mut *board,
                    tally: &mut *tally,
                    source: $source,
                    events: Vec::new(),
                }
            };
        }

        match phase {
            SpinPhase::ReelStopping { reel_index } => {
                timeline.reel_stop(reel_index);
            }
            SpinPhase::Idle => {
                timeline.settle_detached();
            }
            _ => {}
        }
        state.phases.push(phase);
        log::trace!("[Dispatcher] Enter {}", phase);

        let mut cx = phase_cx!(DISPATCHER.to_string());
        cx.emit(Stage::PhaseEnter { phase });
        if phase == SpinPhase::PreSpin {
            prepare_spin(&mut cx);
        }
        deliver(&mut **observer, cx.into_events());

        for module in registry.iter_mut() {
            let view = PhaseView {
                outcome,
                round,
                config: &*config,
                ledger: &*ledger,
            };
            if !module.wants(phase, &view) {
                continue;
            }

            let mut cx = phase_cx!(module.id().to_string());
            if let Err(e) = module.run(phase, &mut cx) {
                log::error!("[Dispatcher] {} failed in {}: {}", module.id(), phase, e);
                cx.diagnostic(&e);
                if e.is_fatal() {
                    module.abort(&mut cx);
                }
            }
            deliver(&mut **observer, cx.into_events());
        }

        match phase {
            SpinPhase::AfterPaylines => {
                let mut cx = phase_cx!(DISPATCHER.to_string());
                let credits = PayoutAccumulator::settle(
                    outcome.base_credits,
                    outcome.multiplier,
                    cx.wager_multiplier(),
                );
                if registry.any_holding() {
                    if !credits.is_zero() {
                        log::debug!("[Dispatcher] Deferring {} base credits to cleanup", credits);
                        state.deferred_base = Some(credits);
                    }
                } else {
                    cx.settle_credits(credits);
                }
                deliver(&mut **observer, cx.into_events());
            }
            SpinPhase::Cleanup => {
                for module in registry.iter_mut() {
                    if !module.holds_next_spin() {
                        continue;
                    }
                    let mut cx = phase_cx!(module.id().to_string());
                    let error = EngineError::state(format!(
                        "{} still held the gate at cleanup",
                        module.id()
                    ));
                    cx.diagnostic(&error);
                    module.abort(&mut cx);
                    deliver(&mut **observer, cx.into_events());
                }

                if let Some(credits) = state.deferred_base.take() {
                    let mut cx = phase_cx!(DISPATCHER.to_string());
                    cx.settle_credits(credits);
                    deliver(&mut **observer, cx.into_events());
                }
            }
            _ => {}
        }

        state.next = next_phase(
            phase,
            reel_count(&outcome.grid),
            outcome.reevaluations.len(),
            registry.any_pending_reevaluations(),
        );

        if phase == SpinPhase::Idle {
            let report = SpinReport {
                phases: std::mem::take(&mut state.phases),
                round_total: payout.round_total(),
                spin_win: Credits(
                    payout
                        .round_total()
                        .get()
                        .saturating_sub(state.total_at_start.get()),
                ),
                diagnostics: tally.diagnostics[state.diagnostics_mark..]
                    .iter()
                    .map(Diagnostic::from)
                    .collect(),
                features: tally.features_consumed[state.features_mark..].to_vec(),
            };
            log::info!(
                "[Dispatcher] Spin resolved: won {}, round total {}",
                report.spin_win,
                report.round_total
            );
            *last_report = Some(report);
            *spin = None;
        }
        Ok(())
    }
}

/// Core `PreSpin` work: decoder diagnostics and the ledger
fn prepare_spin(cx: &mut PhaseContext<'_>) {
    let outcome = cx.outcome;
    for error in &outcome.diagnostics {
        cx.diagnostic(error);
    }
    cx.board.clear();

    if cx.ledger.is_held() {
        log::debug!("[Dispatcher] Ledger held by a feature, keeping its values");
        return;
    }

    let result = if cx.ledger.is_initialized() {
        cx.ledger
            .refresh(&outcome.credit_tables, cx.round)
            .map(|changed| {
                if !changed.is_empty() {
                    log::debug!("[Dispatcher] {} collector values refreshed", changed.len());
                }
            })
    } else {
        cx.ledger.initialize(&outcome.credit_tables, cx.round)
    };
    if let Err(e) = result {
        cx.diagnostic(&e);
    }
    cx.ledger.set_multiplier(outcome.multiplier);
}

fn deliver(observer: &mut (dyn StageObserver + Send), events: Vec<StageEvent>) {
    for event in &events {
        observer.on_event(event);
    }
}

fn reel_count(grid: &Grid) -> u8 {
    u8::try_from(grid.reel_count()).unwrap_or(u8::MAX)
}

/// Phase after `phase`; `None` after `Idle`
fn next_phase(
    phase: SpinPhase,
    reel_count: u8,
    reevaluations: usize,
    pending_reevaluations: bool,
) -> Option<SpinPhase> {
    let next = match phase {
        SpinPhase::PreSpin if reel_count == 0 => SpinPhase::ReelsStopped,
        SpinPhase::PreSpin => SpinPhase::ReelStopping { reel_index: 0 },
        SpinPhase::ReelStopping { reel_index } if reel_index + 1 < reel_count => {
            SpinPhase::ReelStopping {
                reel_index: reel_index + 1,
            }
        }
        SpinPhase::ReelStopping { .. } => SpinPhase::ReelsStopped,
        SpinPhase::ReelsStopped => SpinPhase::AfterPaylines,
        SpinPhase::AfterPaylines if pending_reevaluations && reevaluations > 0 => {
            SpinPhase::ReevaluationSpin { index: 0 }
        }
        SpinPhase::AfterPaylines => SpinPhase::Cleanup,
        SpinPhase::ReevaluationSpin { index } => SpinPhase::ReevaluationStopped { index },
        SpinPhase::ReevaluationStopped { index }
            if pending_reevaluations && (index as usize + 1) < reevaluations =>
        {
            SpinPhase::ReevaluationSpin { index: index + 1 }
        }
        SpinPhase::ReevaluationStopped { .. } => SpinPhase::Cleanup,
        SpinPhase::Cleanup => SpinPhase::Idle,
        SpinPhase::Idle => return None,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FeatureEngine {
        let config = EngineConfig::new("g").with_collectors(["SC"]).with_reel_count(2);
        FeatureEngine::new(config, PayTable::new())
            .unwrap()
            .with_builtin_modules()
            .unwrap()
    }

    #[test]
    fn test_next_phase_order() {
        let mut phase = SpinPhase::PreSpin;
        let mut seen = vec![phase];
        while let Some(next) = next_phase(phase, 2, 2, true) {
            seen.push(next);
            phase = next;
        }
        assert_eq!(
            seen,
            vec![
                SpinPhase::PreSpin,
                SpinPhase::ReelStopping { reel_index: 0 },
                SpinPhase::ReelStopping { reel_index: 1 },
                SpinPhase::ReelsStopped,
                SpinPhase::AfterPaylines,
                SpinPhase::ReevaluationSpin { index: 0 },
                SpinPhase::ReevaluationStopped { index: 0 },
                SpinPhase::ReevaluationSpin { index: 1 },
                SpinPhase::ReevaluationStopped { index: 1 },
                SpinPhase::Cleanup,
                SpinPhase::Idle,
            ]
        );
    }

    #[test]
    fn test_reevaluations_skipped_without_pending_module() {
        assert_eq!(
            next_phase(SpinPhase::AfterPaylines, 5, 3, false),
            Some(SpinPhase::Cleanup)
        );
        assert_eq!(
            next_phase(SpinPhase::ReevaluationStopped { index: 0 }, 5, 3, false),
            Some(SpinPhase::Cleanup)
        );
    }

    #[test]
    fn test_spin_requires_round() {
        let mut engine = engine();
        let err = engine.begin_spin(Outcome::new(Grid::default())).unwrap_err();
        assert!(matches!(err, EngineError::StateViolation(_)));
    }

    #[test]
    fn test_run_spin_settles_base_credits() {
        let mut engine = engine();
        engine.begin_round(RoundContext::base("r", "g", 2)).unwrap();

        let mut outcome = Outcome::new(Grid::from_names(&[&["A", "B"], &["C", "D"]]));
        outcome.base_credits = Credits(15);
        outcome.multiplier = 3;
        let report = engine.run_spin(outcome).unwrap();

        assert_eq!(report.spin_win, Credits(90));
        assert_eq!(report.phases.first(), Some(&SpinPhase::PreSpin));
        assert_eq!(report.phases.last(), Some(&SpinPhase::Idle));
        assert_eq!(report.phases.len(), 7);
        assert!(engine.is_next_spin_allowed());
    }

    #[test]
    fn test_spin_rejects_wrong_reel_count() {
        let mut engine = engine();
        engine.begin_round(RoundContext::base("r", "g", 1)).unwrap();
        let err = engine
            .begin_spin(Outcome::new(Grid::from_names(&[&["A"], &["B"], &["C"]])))
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(!engine.is_spinning());

        let summary = engine.end_round().unwrap();
        assert_eq!(summary.diagnostics.len(), 1);
    }

    #[test]
    fn test_bad_payload_is_reported() {
        let mut engine = engine();
        engine.begin_round(RoundContext::base("r", "g", 1)).unwrap();
        let err = engine.begin_spin_json("{ not json").unwrap_err();
        assert!(matches!(err, EngineError::Payload(_)));
        assert!(!engine.is_spinning());

        let summary = engine.end_round().unwrap();
        assert_eq!(summary.diagnostics.len(), 1);
    }

    #[test]
    fn test_dispatch_out_of_order() {
        let mut engine = engine();
        engine.begin_round(RoundContext::base("r", "g", 1)).unwrap();
        engine
            .begin_spin(Outcome::new(Grid::from_names(&[&["A"], &["B"]])))
            .unwrap();
        engine.dispatch(SpinPhase::PreSpin).unwrap();
        let err = engine.dispatch(SpinPhase::AfterPaylines).unwrap_err();
        assert!(matches!(err, EngineError::StateViolation(_)));
        assert_eq!(
            engine.next_phase(),
            Some(SpinPhase::ReelStopping { reel_index: 0 })
        );
    }
}
