//! Outcome payload (wire shape) and the decoded, immutable Outcome

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::symbols::{Credits, Grid, Symbol};

fn one() -> u32 {
    1
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

/// `{symbol_name, value}` pair carried by exports and award entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSymbolPayout {
    pub symbol_name: Symbol,
    pub value: Credits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUpgrade {
    pub reel: u8,
    pub pos: u8,
    pub symbol: Symbol,
    pub before: Credits,
    pub after: Credits,
}

impl RawUpgrade {
    pub fn to_upgrade(&self) -> SymbolValueUpgrade {
        SymbolValueUpgrade {
            reel: self.reel,
            position: self.pos,
            symbol: self.symbol.clone(),
            credits_before: self.before,
            credits_after: self.after,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRewardSymbol {
    pub reel: u8,
    pub pos: u8,
    pub symbol: Symbol,
}

/// Modifier export; `symbol_credit_values` is the dedicated credit-table shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawModifierExport {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub symbol_payouts: Vec<RawSymbolPayout>,
}

/// One reevaluation entry, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawReevaluation {
    RetriggerAndMultiplyFromPickGameReevaluator {
        #[serde(default = "one")]
        multiplier: u32,
        #[serde(default)]
        free_spins: u32,
    },
    SymbolPayoutOnPayline {
        reels: Grid,
        #[serde(default)]
        paytable: Option<String>,
        #[serde(default)]
        key_name: Option<String>,
        #[serde(default)]
        symbol_payouts: Vec<RawSymbolPayout>,
        /// Upgrades landing with this respin
        #[serde(default)]
        symbol_value_upgrade: Vec<RawUpgrade>,
    },
    SymbolLandingAwardCredits {
        #[serde(default)]
        symbol_payouts: Vec<RawSymbolPayout>,
        #[serde(default)]
        total_credits: Option<Credits>,
        #[serde(default)]
        key_name: Option<String>,
    },
    SymbolLandingAwardFreeSpins {
        free_spins: u32,
        #[serde(default)]
        symbol_payouts: Vec<RawSymbolPayout>,
        #[serde(default)]
        key_name: Option<String>,
    },
    SymbolReplaceMulti {
        #[serde(default)]
        replacement_symbols: BTreeMap<Symbol, Symbol>,
        #[serde(default)]
        mega_replacement_symbols: BTreeMap<Symbol, Symbol>,
    },
}

/// Server outcome payload for one spin
///
/// Reevaluations stay untyped here so a single unsupported entry can be
/// skipped without rejecting the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub reels: Grid,
    #[serde(default = "one")]
    pub multiplier: u32,
    #[serde(default)]
    pub wager_multiplier: Option<u32>,
    #[serde(default)]
    pub base_credits: Credits,
    #[serde(default)]
    pub reevaluations: Vec<serde_json::Value>,
    #[serde(default)]
    pub modifier_exports: Vec<RawModifierExport>,
    #[serde(default)]
    pub symbol_value_upgrade: Vec<RawUpgrade>,
    #[serde(default)]
    pub reward_symbols: Vec<RawRewardSymbol>,
}

impl RawOutcome {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECODED
// ═══════════════════════════════════════════════════════════════════════════════

/// symbol → credits
pub type SymbolCreditMap = BTreeMap<Symbol, Credits>;

/// Per-symbol credit tables keyed by modifier `key_name` (`""` = anonymous)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditTables {
    tables: BTreeMap<String, SymbolCreditMap>,
}

impl CreditTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one value; a later write for the same key and symbol wins
    pub fn insert(&mut self, key: &str, symbol: Symbol, credits: Credits) {
        self.tables
            .entry(key.to_string())
            .or_default()
            .insert(symbol, credits);
    }

    pub fn with(mut self, key: &str, symbol: impl Into<Symbol>, credits: u64) -> Self {
        self.insert(key, symbol.into(), Credits(credits));
        self
    }

    pub fn get(&self, key: &str) -> Option<&SymbolCreditMap> {
        self.tables.get(key)
    }

    pub fn anonymous(&self) -> Option<&SymbolCreditMap> {
        self.get("")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementMap {
    pub normal: BTreeMap<Symbol, Symbol>,
    pub mega: BTreeMap<Symbol, Symbol>,
}

impl ReplacementMap {
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.mega.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolValueUpgrade {
    pub reel: u8,
    pub position: u8,
    pub symbol: Symbol,
    pub credits_before: Credits,
    pub credits_after: Credits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSymbol {
    pub reel: u8,
    pub position: u8,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolAward {
    pub per_symbol_credits: SymbolCreditMap,
    pub total_credits_awarded: Credits,
    pub free_spins_awarded: u32,
}

/// A change the outcome applies to grid, ledger or payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    ReplacementMap(ReplacementMap),
    SymbolValueUpgrade(SymbolValueUpgrade),
    RewardSymbol(RewardSymbol),
    SymbolAward(SymbolAward),
}

/// A server-supplied respin sub-outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespinOutcome {
    /// Arrival order, 0-based
    pub index: u32,
    pub grid: Grid,
    /// Paytable to evaluate against; `None` uses the configured default
    pub paytable: Option<String>,
    /// Value upgrades that land with this respin, in document order
    pub upgrades: Vec<SymbolValueUpgrade>,
}

/// Decoded outcome of one spin. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub grid: Grid,
    pub multiplier: u32,
    pub wager_multiplier: Option<u32>,
    /// Server-computed payline credits of the landed grid, before multipliers
    pub base_credits: Credits,
    pub mutations: Vec<Mutation>,
    pub reevaluations: Vec<RespinOutcome>,
    pub credit_tables: CreditTables,
    /// Problems found while decoding; delivered at `PreSpin`
    pub diagnostics: Vec<EngineError>,
}

impl Outcome {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            multiplier: 1,
            wager_multiplier: None,
            base_credits: Credits::ZERO,
            mutations: Vec::new(),
            reevaluations: Vec::new(),
            credit_tables: CreditTables::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Wager multiplier, falling back to the host's current one
    pub fn effective_wager(&self, host_wager_multiplier: u32) -> u32 {
        self.wager_multiplier.unwrap_or(host_wager_multiplier)
    }

    pub fn replacement_map(&self) -> Option<&ReplacementMap> {
        self.mutations.iter().find_map(|m| match m {
            Mutation::ReplacementMap(map) => Some(map),
            _ => None,
        })
    }

    /// Upgrades in document order
    pub fn upgrades(&self) -> impl Iterator<Item = &SymbolValueUpgrade> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::SymbolValueUpgrade(u) => Some(u),
            _ => None,
        })
    }

    /// Reward symbols in document order
    pub fn reward_symbols(&self) -> impl Iterator<Item = &RewardSymbol> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::RewardSymbol(r) => Some(r),
            _ => None,
        })
    }

    pub fn awards(&self) -> impl Iterator<Item = &SymbolAward> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::SymbolAward(a) => Some(a),
            _ => None,
        })
    }

    pub fn reevaluation(&self, index: u32) -> Option<&RespinOutcome> {
        self.reevaluations.get(index as usize)
    }
}
