//! Per-round context and summary

use rf_stage::{DiagnosticKind, FeatureKind};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::symbols::Credits;

/// Base game or a sub-game (free spins) spawned by a base round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    #[default]
    Base,
    SubGame,
}

/// Explicit context threaded through every phase of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundContext {
    pub round_id: String,
    pub game_key: String,
    pub kind: RoundKind,
    /// Host's current wager multiplier, used when an outcome carries none
    pub wager_multiplier: u32,
    /// Value collected by the parent round (zero for base rounds)
    pub carry_over: Credits,
    /// Round total the parent closed with; a sub-game keeps adding to it
    #[serde(default)]
    pub parent_total: Credits,
}

impl RoundContext {
    /// Context for a base-game round
    pub fn base(
        round_id: impl Into<String>,
        game_key: impl Into<String>,
        wager_multiplier: u32,
    ) -> Self {
        Self {
            round_id: round_id.into(),
            game_key: game_key.into(),
            kind: RoundKind::Base,
            wager_multiplier,
            carry_over: Credits::ZERO,
            parent_total: Credits::ZERO,
        }
    }

    /// Context for a sub-game spawned by `parent`; the carry-over is the
    /// value the parent collected
    pub fn sub_game(round_id: impl Into<String>, parent: &RoundSummary) -> Self {
        Self {
            round_id: round_id.into(),
            game_key: parent.game_key.clone(),
            kind: RoundKind::SubGame,
            wager_multiplier: parent.wager_multiplier,
            carry_over: parent.collected_value,
            parent_total: parent.round_total,
        }
    }

    pub fn is_sub_game(&self) -> bool {
        self.kind == RoundKind::SubGame
    }
}

/// Diagnostic as kept in a round summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl From<&EngineError> for Diagnostic {
    fn from(e: &EngineError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Result of a closed round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_id: String,
    pub game_key: String,
    pub wager_multiplier: u32,
    pub round_total: Credits,
    pub collected_value: Credits,
    pub features_consumed: Vec<FeatureKind>,
    pub free_spins_awarded: u32,
    pub diagnostics: Vec<Diagnostic>,
}

impl RoundSummary {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_game_inherits_carry_over() {
        let summary = RoundSummary {
            round_id: "r-1".into(),
            game_key: "buffalo".into(),
            wager_multiplier: 3,
            round_total: Credits(500),
            collected_value: Credits(120),
            features_consumed: vec![FeatureKind::SymbolCollection],
            free_spins_awarded: 8,
            diagnostics: Vec::new(),
        };
        let ctx = RoundContext::sub_game("r-1/fs", &summary);
        assert!(ctx.is_sub_game());
        assert_eq!(ctx.carry_over, Credits(120));
        assert_eq!(ctx.parent_total, Credits(500));
        assert_eq!(ctx.wager_multiplier, 3);
        assert_eq!(ctx.game_key, "buffalo");
    }

    #[test]
    fn test_diagnostic_from_error() {
        let d = Diagnostic::from(&EngineError::UnknownSymbol("ZZ".into()));
        assert_eq!(d.kind, DiagnosticKind::UnknownSymbol);
        assert!(d.message.contains("ZZ"));
    }
}
