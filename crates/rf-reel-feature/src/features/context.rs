//! Phase context — what a module may touch while it runs

use std::collections::BTreeMap;

use rf_stage::{FeatureKind, SpinPhase, Stage, StageEvent, Timeline};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerSnapshot, SymbolValueLedger};
use crate::outcome::{Outcome, SymbolValueUpgrade};
use crate::paytable::PayTable;
use crate::payout::PayoutAccumulator;
use crate::round::RoundContext;
use crate::symbols::{Cell, Credits, Symbol};

/// Round-level bookkeeping that ends up in the round summary
#[derive(Debug, Clone, Default)]
pub struct RoundTally {
    pub features_consumed: Vec<FeatureKind>,
    pub free_spins_awarded: u32,
    pub diagnostics: Vec<EngineError>,
}

impl RoundTally {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Per-spin presentation state shared between modules
#[derive(Debug, Clone, Default)]
pub struct SpinBoard {
    /// On-grid cells currently showing a value label
    pub labels: BTreeMap<Cell, Symbol>,
    /// Upgrades that target a cell, for features holding that cell
    pub relabels: Vec<(Cell, Symbol)>,
}

impl SpinBoard {
    pub fn clear(&mut self) {
        self.labels.clear();
        self.relabels.clear();
    }
}

/// Mutable access for one handler run
///
/// Stages emitted here are buffered and reach the host only after the
/// handler returns. Timestamps come from the shared timeline at the moment
/// of emission.
pub struct PhaseContext<'a> {
    pub phase: SpinPhase,
    pub outcome: &'a Outcome,
    pub paytable: &'a PayTable,
    pub round: &'a RoundContext,
    pub config: &'a EngineConfig,
    pub ledger: &'a mut SymbolValueLedger,
    pub payout: &'a mut PayoutAccumulator,
    pub timeline: &'a mut Timeline,
    pub(crate) board: &'a mut SpinBoard,
    pub(crate) tally: &'a mut RoundTally,
    pub(crate) source: String,
    pub(crate) events: Vec<StageEvent>,
}

impl<'a> PhaseContext<'a> {
    /// Wager multiplier for this outcome, falling back to the round's
    pub fn wager_multiplier(&self) -> u32 {
        self.outcome.effective_wager(self.round.wager_multiplier)
    }

    /// Buffer a stage at the current timeline position
    pub fn emit(&mut self, stage: Stage) {
        let ts = self.timeline.current();
        self.emit_at(stage, ts);
    }

    /// Buffer a stage at an explicit timestamp
    pub fn emit_at(&mut self, stage: Stage, timestamp_ms: f64) {
        self.events
            .push(StageEvent::new(stage, timestamp_ms).with_source(self.source.clone()));
    }

    /// Report an error to the host and keep it for the round summary
    pub fn diagnostic(&mut self, error: &EngineError) {
        log::warn!("[{}] {}", self.source, error);
        self.emit(Stage::Diagnostic {
            kind: error.kind(),
            message: error.to_string(),
        });
        self.tally.diagnostics.push(error.clone());
    }

    /// Show `symbol`'s ledger value on `cell`
    pub fn label_cell(&mut self, cell: Cell, symbol: &Symbol, timestamp_ms: f64) -> EngineResult<Credits> {
        let value = self.ledger.value_of(symbol)?;
        self.board.labels.insert(cell, symbol.clone());
        self.emit_at(
            Stage::SymbolValueChanged {
                symbol: symbol.to_string(),
                value: value.get(),
                cell: Some((cell.reel, cell.row)),
            },
            timestamp_ms,
        );
        Ok(value)
    }

    /// Remove a cell's label
    pub fn unlabel_cell(&mut self, cell: Cell) -> Option<Symbol> {
        self.board.labels.remove(&cell)
    }

    pub fn labeled_cells(&self) -> impl Iterator<Item = (Cell, &Symbol)> {
        self.board.labels.iter().map(|(c, s)| (*c, s))
    }

    /// Re-read every label showing a member of `family`; all pops run together
    pub fn refresh_labels(&mut self, family: &Symbol) -> usize {
        let cells: Vec<(Cell, Symbol)> = self
            .board
            .labels
            .iter()
            .filter(|(_, s)| s.in_family(family))
            .map(|(c, s)| (*c, s.clone()))
            .collect();

        let duration = self.timeline.config().upgrade_ms;
        let mut barrier = self.timeline.barrier();
        let start = self.timeline.current();
        let mut refreshed = 0;
        for (cell, symbol) in cells {
            barrier.fire(self.timeline, duration);
            match self.label_cell(cell, &symbol, start) {
                Ok(_) => refreshed += 1,
                Err(e) => self.diagnostic(&e),
            }
        }
        barrier.join(self.timeline);
        refreshed
    }

    /// Apply a value upgrade, refresh its labels and queue a relabel of its cell
    pub fn apply_upgrade(&mut self, upgrade: &SymbolValueUpgrade) -> EngineResult<LedgerSnapshot> {
        let previous = self.ledger.apply_upgrade(upgrade)?;
        let value = self.ledger.value_of(&upgrade.symbol)?;
        self.emit(Stage::SymbolValueChanged {
            symbol: upgrade.symbol.to_string(),
            value: value.get(),
            cell: None,
        });
        self.refresh_labels(&upgrade.symbol);
        self.board
            .relabels
            .push((Cell::new(upgrade.reel, upgrade.position), upgrade.symbol.clone()));
        Ok(previous)
    }

    /// Take queued relabels
    pub fn take_relabels(&mut self) -> Vec<(Cell, Symbol)> {
        std::mem::take(&mut self.board.relabels)
    }

    /// Report the displayed total to the host
    pub fn report_payout(&mut self) {
        let credits = self.payout.displayed_total().get();
        self.emit(Stage::RunningPayoutChanged { credits });
    }

    /// Add settled credits to the round and report the new total
    pub fn settle_credits(&mut self, credits: Credits) {
        if credits.is_zero() {
            return;
        }
        self.payout.add_settled(credits);
        self.report_payout();
    }

    pub fn grant_free_spins(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.tally.free_spins_awarded = self.tally.free_spins_awarded.saturating_add(count);
        self.emit(Stage::FreeSpinsAwarded { count });
        let banner = self.timeline.config().banner_ms;
        self.timeline.fire_and_forget(banner);
    }

    pub fn mark_feature_consumed(&mut self, kind: FeatureKind) {
        if !self.tally.features_consumed.contains(&kind) {
            self.tally.features_consumed.push(kind);
        }
    }

    pub(crate) fn into_events(self) -> Vec<StageEvent> {
        self.events
    }
}

/// Owned resources for driving a module outside the dispatcher
#[cfg(test)]
pub(crate) struct TestBed {
    pub outcome: Outcome,
    pub paytable: PayTable,
    pub round: RoundContext,
    pub config: EngineConfig,
    pub ledger: SymbolValueLedger,
    pub payout: PayoutAccumulator,
    pub timeline: Timeline,
    pub board: SpinBoard,
    pub tally: RoundTally,
}

#[cfg(test)]
impl TestBed {
    pub fn new(config: EngineConfig, outcome: Outcome) -> Self {
        let round = RoundContext::base("test-round", config.game_key.clone(), 1);
        let mut ledger = SymbolValueLedger::new(config.collector_symbols.clone());
        ledger
            .initialize(&outcome.credit_tables, &round)
            .expect("ledger init");
        ledger.set_multiplier(outcome.multiplier);
        Self {
            outcome,
            paytable: PayTable::new(),
            round,
            config,
            ledger,
            payout: PayoutAccumulator::new(),
            timeline: Timeline::new(rf_stage::TimingConfig::normal()),
            board: SpinBoard::default(),
            tally: RoundTally::default(),
        }
    }

    pub fn cx(&mut self, phase: SpinPhase) -> PhaseContext<'_> {
        PhaseContext {
            phase,
            outcome: &self.outcome,
            paytable: &self.paytable,
            round: &self.round,
            config: &self.config,
            ledger: &mut self.ledger,
            payout: &mut self.payout,
            timeline: &mut self.timeline,
            board: &mut self.board,
            tally: &mut self.tally,
            source: "test".to_string(),
            events: Vec::new(),
        }
    }

    pub fn view(&self) -> super::PhaseView<'_> {
        super::PhaseView {
            outcome: &self.outcome,
            round: &self.round,
            config: &self.config,
            ledger: &self.ledger,
        }
    }
}
