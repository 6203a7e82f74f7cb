//! Sticky Respin — hold-and-respin driven across the reevaluation phases
//!
//! Wraps a [`StickyRespinMachine`] and turns its transition events into
//! stages, labels and payout reports. The module holds the next-spin gate
//! from the trigger until restoration completes.

use rf_stage::{EffectBarrier, FeatureKind, SpinPhase, Stage};

use crate::config::StickyConfig;
use crate::error::{EngineError, EngineResult};
use crate::round::RoundContext;
use crate::sticky::{StickyEvent, StickyPhase, StickyRespinMachine};
use crate::symbols::{Cell, Symbol};

use super::{FeatureId, FeatureModule, PhaseContext, PhaseView};

pub struct StickyRespinModule {
    machine: StickyRespinMachine,
}

impl StickyRespinModule {
    pub fn new(config: StickyConfig) -> Self {
        Self {
            machine: StickyRespinMachine::new(config),
        }
    }

    pub fn machine(&self) -> &StickyRespinMachine {
        &self.machine
    }

    fn start(&mut self, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        let outcome = cx.outcome;
        let events = self.machine.trigger(outcome, cx.ledger)?;
        cx.payout.begin_feature();
        cx.emit(Stage::FeatureEnter {
            feature: FeatureKind::StickyRespin,
            total_steps: Some(outcome.reevaluations.len() as u32),
        });
        cx.timeline.feature_enter();
        self.present(events, cx);

        let events = self.machine.reveal(outcome)?;
        self.present(events, cx);

        let events = self.machine.lock(outcome)?;
        self.present(events, cx);
        self.apply_relabels(cx);

        if self.machine.counter().remaining == 0 {
            let events = self.machine.finish()?;
            self.present(events, cx);
        }
        Ok(())
    }

    fn settle_respin(&mut self, index: u32, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        self.apply_relabels(cx);

        let outcome = cx.outcome;
        let respin = outcome.reevaluation(index).ok_or_else(|| {
            EngineError::configuration(format!("reevaluation {index} missing from outcome"))
        })?;
        let wager = cx.wager_multiplier();
        let events =
            self.machine
                .evaluate_respin(index, respin, cx.paytable, outcome.multiplier, wager)?;
        self.present(events, cx);
        Ok(())
    }

    fn teardown(&mut self, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        self.apply_relabels(cx);

        if !self.machine.is_terminal() {
            match self.machine.finish() {
                Ok(events) => self.present(events, cx),
                Err(e) => {
                    cx.diagnostic(&e);
                    let events = self.machine.force_terminate();
                    self.present(events, cx);
                }
            }
        }

        let events = self.machine.restore(cx.ledger)?;
        self.present(events, cx);
        Ok(())
    }

    /// Route upgrades that hit a locked cell through the machine
    fn apply_relabels(&mut self, cx: &mut PhaseContext<'_>) {
        let mut events = Vec::new();
        for (cell, symbol) in cx.take_relabels() {
            let differs = self
                .machine
                .state()
                .get(cell)
                .is_some_and(|current| current != &symbol);
            if !differs {
                continue;
            }
            match self.machine.relabel(cell, symbol) {
                Ok(relabeled) => events.extend(relabeled),
                Err(e) => cx.diagnostic(&e),
            }
        }
        self.present(events, cx);
    }

    fn present(&mut self, events: Vec<StickyEvent>, cx: &mut PhaseContext<'_>) {
        // lock effects of one transition run together
        let mut locks: Option<EffectBarrier> = None;

        for event in events {
            let is_lock = matches!(
                event,
                StickyEvent::Locked { .. } | StickyEvent::Relabeled { .. }
            );
            if !is_lock {
                if let Some(barrier) = locks.take() {
                    barrier.join(cx.timeline);
                }
            }

            match event {
                StickyEvent::Triggered { cell, symbol } => {
                    log::debug!("[StickyRespin] {} landed at {}", symbol, cell);
                }
                StickyEvent::Revealed {
                    cell,
                    provisional,
                    final_symbol,
                    kind,
                } => {
                    log::debug!(
                        "[StickyRespin] Revealing {} ({:?}) at {}",
                        final_symbol,
                        kind,
                        cell
                    );
                    cx.emit(Stage::CycleReveal {
                        reel: cell.reel,
                        row: cell.row,
                        provisional: provisional.iter().map(|s| s.to_string()).collect(),
                        final_symbol: final_symbol.to_string(),
                    });
                    cx.timeline.cycle_reveal(provisional.len());
                }
                StickyEvent::Locked { cell, symbol } | StickyEvent::Relabeled { cell, symbol } => {
                    let duration = cx.timeline.config().lock_ms;
                    let barrier = locks.get_or_insert_with(|| cx.timeline.barrier());
                    barrier.fire(cx.timeline, duration);
                    let start = cx.timeline.current();
                    cx.emit_at(
                        Stage::StickyChanged {
                            reel: cell.reel,
                            row: cell.row,
                            symbol: Some(symbol.to_string()),
                        },
                        start,
                    );
                    if cx.config.is_collector(&symbol) {
                        if let Err(e) = cx.label_cell(cell, &symbol, start) {
                            cx.diagnostic(&e);
                        }
                    } else {
                        cx.unlabel_cell(cell);
                    }
                }
                StickyEvent::RespinStarted { index } => {
                    log::trace!("[StickyRespin] Respin {} started", index);
                }
                StickyEvent::RespinSettled {
                    index,
                    match_count,
                    credits,
                    remaining,
                } => {
                    if let Err(e) = cx.payout.report_match_count_total(credits) {
                        cx.diagnostic(&e);
                    }
                    cx.report_payout();
                    cx.emit(Stage::FeatureStep {
                        feature: FeatureKind::StickyRespin,
                        step_index: index,
                        steps_remaining: Some(remaining),
                    });
                    let rollup = cx.timeline.config().rollup_ms;
                    cx.timeline.advance(rollup);
                    log::debug!(
                        "[StickyRespin] Respin {}: {} matched, {} credits, {} left",
                        index,
                        match_count,
                        credits,
                        remaining
                    );
                }
                StickyEvent::Diagnostic(e) => cx.diagnostic(&e),
                StickyEvent::Terminated { total_win } => {
                    let round_total = cx.payout.finalize();
                    cx.emit(Stage::FeatureTerminal {
                        feature: FeatureKind::StickyRespin,
                        total_win: total_win.get(),
                    });
                    cx.mark_feature_consumed(FeatureKind::StickyRespin);
                    log::info!(
                        "[StickyRespin] Feature won {}, round total {}",
                        total_win,
                        round_total
                    );
                }
                StickyEvent::Unlocked { cell } => {
                    cx.unlabel_cell(cell);
                    cx.emit(Stage::StickyChanged {
                        reel: cell.reel,
                        row: cell.row,
                        symbol: None,
                    });
                }
                StickyEvent::Restored => {
                    cx.timeline.feature_exit();
                    self.relabel_restored_grid(cx);
                }
            }
        }

        if let Some(barrier) = locks {
            barrier.join(cx.timeline);
        }
    }

    /// Show pre-feature values on the restored grid
    fn relabel_restored_grid(&self, cx: &mut PhaseContext<'_>) {
        let cells: Vec<(Cell, Symbol)> = self
            .machine
            .grid()
            .cells()
            .filter(|(_, s)| cx.config.is_collector(s))
            .map(|(c, s)| (c, s.clone()))
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
}

impl FeatureModule for StickyRespinModule {
    fn id(&self) -> FeatureId {
        FeatureId::new("sticky_respin")
    }

    fn name(&self) -> &str {
        "Sticky Respin"
    }

    fn category(&self) -> FeatureKind {
        FeatureKind::StickyRespin
    }

    fn wants(&self, phase: SpinPhase, view: &PhaseView<'_>) -> bool {
        match phase {
            SpinPhase::AfterPaylines => {
                !self.machine.is_active()
                    && view.outcome.grid.count(&self.machine.config().trigger_symbol) > 0
            }
            SpinPhase::ReevaluationSpin { .. }
            | SpinPhase::ReevaluationStopped { .. }
            | SpinPhase::Cleanup => self.machine.is_active(),
            _ => false,
        }
    }

    fn run(&mut self, phase: SpinPhase, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        match phase {
            SpinPhase::AfterPaylines => self.start(cx),
            SpinPhase::ReevaluationSpin { index } => {
                cx.timeline.respin();
                let events = self.machine.begin_respin(index)?;
                self.present(events, cx);
                Ok(())
            }
            SpinPhase::ReevaluationStopped { index } => self.settle_respin(index, cx),
            SpinPhase::Cleanup => self.teardown(cx),
            other => Err(EngineError::state(format!("sticky respin cannot run in {other}"))),
        }
    }

    fn holds_next_spin(&self) -> bool {
        self.machine.is_active()
    }

    fn pending_reevaluations(&self) -> bool {
        matches!(
            self.machine.phase(),
            StickyPhase::Locked | StickyPhase::Respinning { .. }
        ) && self.machine.counter().remaining > 0
    }

    fn abort(&mut self, cx: &mut PhaseContext<'_>) {
        let events = self.machine.force_terminate();
        self.present(events, cx);
        if self.machine.is_terminal() {
            match self.machine.restore(cx.ledger) {
                Ok(events) => self.present(events, cx),
                Err(e) => log::error!("[StickyRespin] Restore after abort failed: {}", e),
            }
        }
    }

    fn begin_round(&mut self, _round: &RoundContext) {
        self.machine = StickyRespinMachine::new(self.machine.config().clone());
    }
}
