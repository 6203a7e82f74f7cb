//! Sticky/Respin State Machine
//!
//! ```text
//! Idle → Triggered → CycleReveal → Locked → Respinning(n) → Terminal → Restoring → Idle
//! ```
//!
//! Every transition is a synchronous method returning the [`StickyEvent`]s
//! it produced. Pacing is the caller's concern.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rf_stage::ReplacementKind;
use serde::{Deserialize, Serialize};

use crate::config::StickyConfig;
use crate::decoder::active_replacement;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerSnapshot, SymbolValueLedger};
use crate::outcome::{Outcome, RespinOutcome};
use crate::paytable::PayTable;
use crate::payout::PayoutAccumulator;
use crate::symbols::{Cell, Credits, Grid, Symbol};

/// State machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StickyPhase {
    Idle,
    Triggered,
    CycleReveal,
    Locked,
    Respinning { remaining: u32 },
    Terminal,
    Restoring,
}

impl StickyPhase {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Locked cells; a cell absent from the map is unlocked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickyState {
    cells: BTreeMap<Cell, Symbol>,
}

impl StickyState {
    /// Lock an unlocked cell; returns false if it was already locked
    pub fn lock(&mut self, cell: Cell, symbol: Symbol) -> bool {
        if self.cells.contains_key(&cell) {
            return false;
        }
        self.cells.insert(cell, symbol);
        true
    }

    /// Change the symbol of a locked cell
    pub fn relabel(&mut self, cell: Cell, symbol: Symbol) -> EngineResult<Symbol> {
        match self.cells.get_mut(&cell) {
            Some(slot) => Ok(std::mem::replace(slot, symbol)),
            None => Err(EngineError::state(format!("relabel of unlocked cell {cell}"))),
        }
    }

    pub fn get(&self, cell: Cell) -> Option<&Symbol> {
        self.cells.get(&cell)
    }

    pub fn is_locked(&self, cell: Cell) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Locked cells, reel-major
    pub fn iter(&self) -> impl Iterator<Item = (Cell, &Symbol)> {
        self.cells.iter().map(|(c, s)| (*c, s))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn clear(&mut self) -> Vec<Cell> {
        std::mem::take(&mut self.cells).into_keys().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespinCounter {
    pub remaining: u32,
    pub total_matched: u32,
    pub last_payout: Credits,
}

/// What a transition produced
#[derive(Debug, Clone, PartialEq)]
pub enum StickyEvent {
    Triggered {
        cell: Cell,
        symbol: Symbol,
    },
    Revealed {
        cell: Cell,
        provisional: Vec<Symbol>,
        final_symbol: Symbol,
        kind: ReplacementKind,
    },
    Locked {
        cell: Cell,
        symbol: Symbol,
    },
    Relabeled {
        cell: Cell,
        symbol: Symbol,
    },
    RespinStarted {
        index: u32,
    },
    RespinSettled {
        index: u32,
        match_count: u32,
        credits: Credits,
        remaining: u32,
    },
    /// Recovered locally; still reported to the host
    Diagnostic(EngineError),
    Terminated {
        total_win: Credits,
    },
    Unlocked {
        cell: Cell,
    },
    Restored,
}

/// Result of a trigger scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerScan {
    /// First trigger cell, reel-major
    pub cell: Option<Cell>,
    /// Further trigger cells, which are ignored
    pub extra: Vec<Cell>,
}

impl TriggerScan {
    pub fn diagnostic(&self) -> Option<EngineError> {
        if self.extra.is_empty() {
            return None;
        }
        Some(EngineError::configuration(format!(
            "{} trigger symbols landed, using the first at {}",
            self.extra.len() + 1,
            self.cell.map(|c| c.to_string()).unwrap_or_default()
        )))
    }
}

/// Hold-and-respin state machine
///
/// Owns the sticky cells and the respin counter exclusively. The landed
/// grid and the ledger are snapshotted on trigger and put back on restore.
#[derive(Debug, Clone)]
pub struct StickyRespinMachine {
    config: StickyConfig,
    phase: StickyPhase,
    state: StickyState,
    counter: RespinCounter,
    trigger_cell: Option<Cell>,
    target: Option<Symbol>,
    grid: Grid,
    grid_snapshot: Option<Grid>,
    ledger_snapshot: Option<LedgerSnapshot>,
    next_index: u32,
    rng: StdRng,
}

impl StickyRespinMachine {
    pub fn new(config: StickyConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.reveal_seed);
        Self {
            config,
            phase: StickyPhase::Idle,
            state: StickyState::default(),
            counter: RespinCounter::default(),
            trigger_cell: None,
            target: None,
            grid: Grid::default(),
            grid_snapshot: None,
            ledger_snapshot: None,
            next_index: 0,
            rng,
        }
    }

    pub fn config(&self) -> &StickyConfig {
        &self.config
    }

    pub fn phase(&self) -> StickyPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == StickyPhase::Terminal
    }

    pub fn state(&self) -> &StickyState {
        &self.state
    }

    pub fn counter(&self) -> RespinCounter {
        self.counter
    }

    /// Symbol trigger cells reveal to
    pub fn target(&self) -> Option<&Symbol> {
        self.target.as_ref()
    }

    pub fn trigger_cell(&self) -> Option<Cell> {
        self.trigger_cell
    }

    /// Current composed grid (the landed grid while idle)
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Index the next `begin_respin` must use
    pub fn next_respin(&self) -> u32 {
        self.next_index
    }

    /// Find the trigger symbol, reel-major
    pub fn scan_trigger(&self, grid: &Grid) -> TriggerScan {
        let mut cells = grid.positions_of(&self.config.trigger_symbol).into_iter();
        let scan = TriggerScan {
            cell: cells.next(),
            extra: cells.collect(),
        };
        if !scan.extra.is_empty() {
            log::warn!(
                "[StickyRespin] {} extra {} symbols landed; using first",
                scan.extra.len(),
                self.config.trigger_symbol
            );
        }
        scan
    }

    fn expect_phase(&self, expected: StickyPhase, op: &str) -> EngineResult<()> {
        if self.phase != expected {
            return Err(EngineError::state(format!(
                "{op} in {:?}, expected {:?}",
                self.phase, expected
            )));
        }
        Ok(())
    }

    /// Idle → Triggered
    pub fn trigger(
        &mut self,
        outcome: &Outcome,
        ledger: &mut SymbolValueLedger,
    ) -> EngineResult<Vec<StickyEvent>> {
        if self.phase != StickyPhase::Idle {
            return Err(EngineError::AlreadyActive(format!(
                "sticky respin is {:?}",
                self.phase
            )));
        }

        let scan = self.scan_trigger(&outcome.grid);
        let Some(cell) = scan.cell else {
            return Err(EngineError::configuration(format!(
                "no {} on the landed grid",
                self.config.trigger_symbol
            )));
        };

        let mut events = Vec::new();
        if let Some(diag) = scan.diagnostic() {
            events.push(StickyEvent::Diagnostic(diag));
        }

        self.grid = outcome.grid.clone();
        self.grid_snapshot = Some(outcome.grid.clone());
        self.ledger_snapshot = Some(ledger.hold());
        self.state = StickyState::default();
        self.counter = RespinCounter::default();
        self.trigger_cell = Some(cell);
        self.target = None;
        self.next_index = 0;
        self.phase = StickyPhase::Triggered;

        log::info!("[StickyRespin] Triggered at {}", cell);
        events.push(StickyEvent::Triggered {
            cell,
            symbol: self.config.trigger_symbol.clone(),
        });
        Ok(events)
    }

    /// Triggered → CycleReveal
    pub fn reveal(&mut self, outcome: &Outcome) -> EngineResult<Vec<StickyEvent>> {
        self.expect_phase(StickyPhase::Triggered, "reveal")?;
        let Some(cell) = self.trigger_cell else {
            return Err(EngineError::state("reveal without trigger cell"));
        };

        let (final_symbol, kind) = active_replacement(outcome, &self.config.trigger_symbol)?;

        let pool = &self.config.reveal_pool;
        let provisional: Vec<Symbol> = if pool.is_empty() {
            Vec::new()
        } else {
            (0..self.config.reveal_cycle_len)
                .map(|_| pool[self.rng.random_range(0..pool.len())].clone())
                .collect()
        };

        self.target = Some(final_symbol.clone());
        self.phase = StickyPhase::CycleReveal;

        Ok(vec![StickyEvent::Revealed {
            cell,
            provisional,
            final_symbol,
            kind,
        }])
    }

    /// CycleReveal → Locked
    pub fn lock(&mut self, outcome: &Outcome) -> EngineResult<Vec<StickyEvent>> {
        self.expect_phase(StickyPhase::CycleReveal, "lock")?;
        let (Some(cell), Some(target)) = (self.trigger_cell, self.target.clone()) else {
            return Err(EngineError::state("lock without revealed target"));
        };

        self.state.lock(cell, target.clone());
        self.grid.set(cell, target.clone());
        self.counter.remaining = outcome.reevaluations.len() as u32;
        self.counter.total_matched = self.grid.count(&target);
        self.phase = StickyPhase::Locked;

        log::debug!(
            "[StickyRespin] Locked {} at {}, {} respins queued",
            target,
            cell,
            self.counter.remaining
        );
        Ok(vec![StickyEvent::Locked {
            cell,
            symbol: target,
        }])
    }

    /// Announce respin `index`; it must be the next one in arrival order
    pub fn begin_respin(&mut self, index: u32) -> EngineResult<Vec<StickyEvent>> {
        let remaining = match self.phase {
            StickyPhase::Locked | StickyPhase::Respinning { .. } => self.counter.remaining,
            other => {
                return Err(EngineError::state(format!(
                    "begin_respin({index}) in {other:?}"
                )));
            }
        };
        if remaining == 0 {
            return Err(EngineError::state(format!(
                "begin_respin({index}) with no respins remaining"
            )));
        }
        if index != self.next_index {
            return Err(EngineError::state(format!(
                "respin {index} out of order, expected {}",
                self.next_index
            )));
        }
        self.phase = StickyPhase::Respinning { remaining };
        Ok(vec![StickyEvent::RespinStarted { index }])
    }

    /// Settle respin `index`
    ///
    /// Locked cells keep their symbol, landed trigger symbols reveal to the
    /// target, and every newly landed target locks. The payout is re-derived
    /// from the match count; a paytable miss pays zero.
    pub fn evaluate_respin(
        &mut self,
        index: u32,
        respin: &RespinOutcome,
        paytable: &PayTable,
        outcome_multiplier: u32,
        wager_multiplier: u32,
    ) -> EngineResult<Vec<StickyEvent>> {
        let StickyPhase::Respinning { remaining } = self.phase else {
            return Err(EngineError::state(format!(
                "evaluate_respin({index}) in {:?}",
                self.phase
            )));
        };
        if index != self.next_index || respin.index != index {
            return Err(EngineError::state(format!(
                "respin {index} evaluated out of order, expected {}",
                self.next_index
            )));
        }
        let Some(target) = self.target.clone() else {
            return Err(EngineError::state("respin without target symbol"));
        };
        if !respin.grid.same_shape(&self.grid) {
            return Err(EngineError::configuration(format!(
                "respin {index} grid does not match the landed grid shape"
            )));
        }

        let mut events = Vec::new();
        let mut grid = respin.grid.clone();
        for (cell, symbol) in self.state.iter() {
            grid.set(cell, symbol.clone());
        }
        for cell in grid.positions_of(&self.config.trigger_symbol) {
            grid.set(cell, target.clone());
        }
        for cell in grid.positions_of(&target) {
            if self.state.lock(cell, target.clone()) {
                events.push(StickyEvent::Locked {
                    cell,
                    symbol: target.clone(),
                });
            }
        }

        let match_count = grid.count(&target);
        let name = respin
            .paytable
            .as_deref()
            .unwrap_or(self.config.paytable.as_str());
        let raw = match paytable.lookup(name, match_count) {
            Ok(credits) => credits,
            Err(e) => {
                log::warn!("[StickyRespin] {}; respin {} pays zero", e, index);
                events.push(StickyEvent::Diagnostic(e));
                Credits::ZERO
            }
        };
        let credits = PayoutAccumulator::settle(raw, outcome_multiplier, wager_multiplier);

        let remaining = remaining.saturating_sub(1);
        self.counter = RespinCounter {
            remaining,
            total_matched: match_count,
            last_payout: credits,
        };
        self.grid = grid;
        self.next_index += 1;

        events.push(StickyEvent::RespinSettled {
            index,
            match_count,
            credits,
            remaining,
        });

        if remaining == 0 {
            self.phase = StickyPhase::Terminal;
            log::info!("[StickyRespin] Terminal, total win {}", credits);
            events.push(StickyEvent::Terminated { total_win: credits });
        } else {
            self.phase = StickyPhase::Respinning { remaining };
        }
        Ok(events)
    }

    /// Enter Terminal once no respins remain
    pub fn finish(&mut self) -> EngineResult<Vec<StickyEvent>> {
        match self.phase {
            StickyPhase::Terminal => Ok(Vec::new()),
            StickyPhase::Locked | StickyPhase::Respinning { .. } if self.counter.remaining == 0 => {
                self.phase = StickyPhase::Terminal;
                Ok(vec![StickyEvent::Terminated {
                    total_win: self.counter.last_payout,
                }])
            }
            other => Err(EngineError::state(format!(
                "finish in {other:?} with {} respins remaining",
                self.counter.remaining
            ))),
        }
    }

    /// Change a locked cell's symbol through an upgrade
    pub fn relabel(&mut self, cell: Cell, symbol: Symbol) -> EngineResult<Vec<StickyEvent>> {
        if matches!(self.phase, StickyPhase::Idle | StickyPhase::Restoring) {
            return Err(EngineError::state(format!(
                "relabel of {cell} in {:?}",
                self.phase
            )));
        }
        self.state.relabel(cell, symbol.clone())?;
        self.grid.set(cell, symbol.clone());
        Ok(vec![StickyEvent::Relabeled { cell, symbol }])
    }

    /// Terminal → Restoring → Idle
    ///
    /// Puts back the pre-feature grid and ledger and clears every lock.
    pub fn restore(&mut self, ledger: &mut SymbolValueLedger) -> EngineResult<Vec<StickyEvent>> {
        self.expect_phase(StickyPhase::Terminal, "restore")?;
        self.phase = StickyPhase::Restoring;

        let mut events: Vec<StickyEvent> = self
            .state
            .clear()
            .into_iter()
            .map(|cell| StickyEvent::Unlocked { cell })
            .collect();

        if let Some(snapshot) = self.ledger_snapshot.take() {
            ledger.restore(snapshot);
        }
        if let Some(grid) = self.grid_snapshot.take() {
            self.grid = grid;
        }
        self.trigger_cell = None;
        self.target = None;
        self.next_index = 0;
        self.phase = StickyPhase::Idle;

        log::info!("[StickyRespin] Restored pre-feature state");
        events.push(StickyEvent::Restored);
        Ok(events)
    }

    /// Fail-safe path to Terminal from any active phase
    pub fn force_terminate(&mut self) -> Vec<StickyEvent> {
        match self.phase {
            StickyPhase::Idle | StickyPhase::Terminal | StickyPhase::Restoring => Vec::new(),
            other => {
                log::warn!("[StickyRespin] Forced to Terminal from {:?}", other);
                self.counter.remaining = 0;
                self.phase = StickyPhase::Terminal;
                vec![StickyEvent::Terminated {
                    total_win: self.counter.last_payout,
                }]
            }
        }
    }
}
