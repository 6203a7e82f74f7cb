//! Engine configuration

use rf_stage::TimingProfile;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::symbols::Symbol;

fn default_reel_count() -> u8 {
    5
}

fn default_paytable() -> String {
    "main".to_string()
}

fn default_reveal_cycle_len() -> usize {
    8
}

/// Sticky symbol hold-and-respin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyConfig {
    /// Symbol whose landing starts the feature
    pub trigger_symbol: Symbol,

    /// Paytable used when a respin entry names none
    #[serde(default = "default_paytable")]
    pub paytable: String,

    /// Number of provisional symbols shown before the final identity
    #[serde(default = "default_reveal_cycle_len")]
    pub reveal_cycle_len: usize,

    /// Candidates for the provisional sequence (presentation only)
    #[serde(default)]
    pub reveal_pool: Vec<Symbol>,

    /// Seed for the provisional sequence
    #[serde(default)]
    pub reveal_seed: u64,
}

impl StickyConfig {
    pub fn new(trigger_symbol: impl Into<Symbol>) -> Self {
        Self {
            trigger_symbol: trigger_symbol.into(),
            paytable: default_paytable(),
            reveal_cycle_len: default_reveal_cycle_len(),
            reveal_pool: Vec::new(),
            reveal_seed: 0,
        }
    }

    pub fn with_paytable(mut self, name: impl Into<String>) -> Self {
        self.paytable = name.into();
        self
    }

    pub fn with_reveal_pool(mut self, pool: impl IntoIterator<Item = impl Into<Symbol>>) -> Self {
        self.reveal_pool = pool.into_iter().map(Into::into).collect();
        self
    }
}

/// Complete engine configuration for one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Game identifier, namespace for modifier keys
    pub game_key: String,

    /// Number of reels on the landed grid
    #[serde(default = "default_reel_count")]
    pub reel_count: u8,

    /// Symbols whose credit value the ledger tracks and labels
    #[serde(default)]
    pub collector_symbols: Vec<Symbol>,

    /// Symbol whose landing collects the credits of every collector
    #[serde(default)]
    pub collect_trigger: Option<Symbol>,

    /// Hold-and-respin feature, if the game has one
    #[serde(default)]
    pub sticky: Option<StickyConfig>,

    /// Presentation pacing
    #[serde(default)]
    pub timing: TimingProfile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game_key: String::new(),
            reel_count: default_reel_count(),
            collector_symbols: Vec::new(),
            collect_trigger: None,
            sticky: None,
            timing: TimingProfile::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(game_key: impl Into<String>) -> Self {
        Self {
            game_key: game_key.into(),
            ..Default::default()
        }
    }

    pub fn with_collectors(mut self, symbols: impl IntoIterator<Item = impl Into<Symbol>>) -> Self {
        self.collector_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collect_trigger(mut self, symbol: impl Into<Symbol>) -> Self {
        self.collect_trigger = Some(symbol.into());
        self
    }

    pub fn with_sticky(mut self, sticky: StickyConfig) -> Self {
        self.sticky = Some(sticky);
        self
    }

    pub fn with_timing(mut self, timing: TimingProfile) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_reel_count(mut self, reel_count: u8) -> Self {
        self.reel_count = reel_count;
        self
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::configuration(format!("engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> EngineResult<Self> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Is `symbol` one of the tracked collectors (or a variant of one)?
    pub fn is_collector(&self, symbol: &Symbol) -> bool {
        self.collector_symbols.iter().any(|c| symbol.in_family(c))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.game_key.trim().is_empty() {
            return Err(EngineError::configuration("game_key must not be empty"));
        }
        if self.reel_count == 0 {
            return Err(EngineError::configuration("reel_count must be at least 1"));
        }
        if self.collect_trigger.is_some() && self.collector_symbols.is_empty() {
            return Err(EngineError::configuration(
                "collect_trigger requires at least one collector symbol",
            ));
        }
        if let Some(sticky) = &self.sticky {
            if sticky.paytable.is_empty() {
                return Err(EngineError::configuration("sticky paytable name is empty"));
            }
            if self.collect_trigger.as_ref() == Some(&sticky.trigger_symbol) {
                return Err(EngineError::configuration(format!(
                    "{} cannot be both collect trigger and sticky trigger",
                    sticky.trigger_symbol
                )));
            }
        }
        Ok(())
    }
}
