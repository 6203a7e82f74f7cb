//! Symbol Value Ledger — per-round credit values of collector symbols

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::outcome::{CreditTables, SymbolCreditMap, SymbolValueUpgrade};
use crate::round::{RoundContext, RoundKind};
use crate::symbols::{Credits, Symbol};

/// Modifier key holding the credit table for a round kind
pub fn modifier_key(game_key: &str, kind: RoundKind) -> String {
    match kind {
        RoundKind::Base => format!("{game_key}_base_payout"),
        RoundKind::SubGame => format!("{game_key}_freespin_payout"),
    }
}

/// Saved ledger contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    values: SymbolCreditMap,
    multiplier: u32,
}

impl LedgerSnapshot {
    pub fn values(&self) -> &SymbolCreditMap {
        &self.values
    }
}

/// Owns the symbol → credits map for the current round
#[derive(Debug, Clone)]
pub struct SymbolValueLedger {
    collectors: Vec<Symbol>,
    values: SymbolCreditMap,
    multiplier: u32,
    initialized: bool,
    snapshot_held: bool,
}

impl SymbolValueLedger {
    pub fn new(collectors: Vec<Symbol>) -> Self {
        Self {
            collectors,
            values: SymbolCreditMap::new(),
            multiplier: 1,
            initialized: false,
            snapshot_held: false,
        }
    }

    /// Clear everything for a new round
    pub fn reset(&mut self) {
        self.values.clear();
        self.multiplier = 1;
        self.initialized = false;
        self.snapshot_held = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Is a feature holding a snapshot?
    pub fn is_held(&self) -> bool {
        self.snapshot_held
    }

    pub fn collectors(&self) -> &[Symbol] {
        &self.collectors
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Multiplier applied by `value_of`
    pub fn set_multiplier(&mut self, multiplier: u32) {
        self.multiplier = multiplier;
    }

    fn table_for<'a>(tables: &'a CreditTables, ctx: &RoundContext) -> Option<&'a SymbolCreditMap> {
        let key = modifier_key(&ctx.game_key, ctx.kind);
        match ctx.kind {
            RoundKind::Base => tables.get(&key).or_else(|| tables.anonymous()),
            RoundKind::SubGame => tables.get(&key),
        }
    }

    /// Load initial values for the round
    ///
    /// A sub-game without its own table starts every collector at the
    /// carried-over value.
    pub fn initialize(&mut self, tables: &CreditTables, ctx: &RoundContext) -> EngineResult<()> {
        if self.snapshot_held {
            return Err(EngineError::state("ledger initialize while a snapshot is held"));
        }

        self.values = match Self::table_for(tables, ctx) {
            Some(table) => table.clone(),
            None if ctx.is_sub_game() => {
                log::info!(
                    "[Ledger] No {} data, carrying over {} to {} collectors",
                    modifier_key(&ctx.game_key, ctx.kind),
                    ctx.carry_over,
                    self.collectors.len()
                );
                self.collectors
                    .iter()
                    .map(|c| (c.clone(), ctx.carry_over))
                    .collect()
            }
            None => {
                log::debug!("[Ledger] No credit table for round {}", ctx.round_id);
                SymbolCreditMap::new()
            }
        };
        self.initialized = true;
        Ok(())
    }

    /// Take values from a later outcome of the same round
    ///
    /// Returns the symbols whose value changed.
    pub fn refresh(&mut self, tables: &CreditTables, ctx: &RoundContext) -> EngineResult<Vec<Symbol>> {
        if self.snapshot_held {
            return Err(EngineError::state("ledger refresh while a feature holds a snapshot"));
        }
        if !self.initialized {
            self.initialize(tables, ctx)?;
            return Ok(self.values.keys().cloned().collect());
        }

        let mut changed = Vec::new();
        if let Some(table) = Self::table_for(tables, ctx) {
            for (symbol, credits) in table {
                if self.values.insert(symbol.clone(), *credits) != Some(*credits) {
                    changed.push(symbol.clone());
                }
            }
        }
        Ok(changed)
    }

    /// Raise every member of the upgraded symbol's family
    ///
    /// Returns the snapshot from before the change.
    pub fn apply_upgrade(&mut self, upgrade: &SymbolValueUpgrade) -> EngineResult<LedgerSnapshot> {
        let after = upgrade.credits_after;
        if after < upgrade.credits_before {
            return Err(EngineError::state(format!(
                "upgrade lowers {} from {} to {}",
                upgrade.symbol, upgrade.credits_before, after
            )));
        }

        match self.values.get(&upgrade.symbol) {
            Some(current) if *current > after => {
                return Err(EngineError::state(format!(
                    "upgrade would lower {} from {} to {}",
                    upgrade.symbol, current, after
                )));
            }
            Some(current) if *current != upgrade.credits_before => {
                log::warn!(
                    "[Ledger] Upgrade of {} expected {} but ledger holds {}; using server value {}",
                    upgrade.symbol,
                    upgrade.credits_before,
                    current,
                    after
                );
            }
            _ => {}
        }

        // variants already worth more keep their value
        let family: Vec<Symbol> = self
            .values
            .iter()
            .filter(|(s, v)| s.in_family(&upgrade.symbol) && **v < after)
            .map(|(s, _)| s.clone())
            .collect();

        let previous = self.snapshot();
        for symbol in family {
            self.values.insert(symbol, after);
        }
        self.values.insert(upgrade.symbol.clone(), after);

        log::debug!("[Ledger] {} family upgraded to {}", upgrade.symbol, after);
        Ok(previous)
    }

    /// Credits of `symbol` times the active multiplier
    pub fn value_of(&self, symbol: &Symbol) -> EngineResult<Credits> {
        self.values
            .get(symbol)
            .map(|c| c.times(self.multiplier))
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.clone()))
    }

    /// Stored credits without the multiplier
    pub fn raw_value(&self, symbol: &Symbol) -> Option<Credits> {
        self.values.get(symbol).copied()
    }

    pub fn values(&self) -> &SymbolCreditMap {
        &self.values
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            values: self.values.clone(),
            multiplier: self.multiplier,
        }
    }

    /// Snapshot and block refreshes until `restore`
    pub fn hold(&mut self) -> LedgerSnapshot {
        self.snapshot_held = true;
        self.snapshot()
    }

    /// Revert to a snapshot and release any hold
    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.values = snapshot.values;
        self.multiplier = snapshot.multiplier;
        self.snapshot_held = false;
    }
}
