//! Stage — Spin lifecycle phases and host-visible stage notifications
//!
//! A Stage is NOT an animation. It is the semantic meaning of a moment in
//! the spin: a phase was entered, a symbol value changed, a cell locked.
//! The presentation layer decides how each one looks.

use serde::{Deserialize, Serialize};

use crate::taxonomy::{DiagnosticKind, FeatureKind};

/// One phase of the spin lifecycle
///
/// Phases run in strict order:
///
/// ```text
/// PreSpin → ReelStopping(0..N) → ReelsStopped → AfterPaylines
///         → [ReevaluationSpin(k) → ReevaluationStopped(k)]* → Cleanup → Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SpinPhase {
    /// Outcome received, nothing shown yet
    PreSpin,
    /// A single reel is coming to rest
    ReelStopping {
        /// Which reel (0-indexed)
        reel_index: u8,
    },
    /// Every reel has stopped
    ReelsStopped,
    /// Payline wins of the landed grid are known
    AfterPaylines,
    /// A server-supplied reevaluation sub-spin starts
    ReevaluationSpin {
        /// Reevaluation index (0-based, arrival order)
        index: u32,
    },
    /// A reevaluation sub-spin has landed
    ReevaluationStopped {
        /// Reevaluation index (0-based, arrival order)
        index: u32,
    },
    /// Feature teardown and restoration
    Cleanup,
    /// Spin fully resolved
    Idle,
}

impl SpinPhase {
    /// Get a simple string name for this phase
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PreSpin => "pre_spin",
            Self::ReelStopping { .. } => "reel_stopping",
            Self::ReelsStopped => "reels_stopped",
            Self::AfterPaylines => "after_paylines",
            Self::ReevaluationSpin { .. } => "reevaluation_spin",
            Self::ReevaluationStopped { .. } => "reevaluation_stopped",
            Self::Cleanup => "cleanup",
            Self::Idle => "idle",
        }
    }

    /// Coarse position in the lifecycle, used for ordering checks
    pub fn rank(&self) -> u8 {
        match self {
            Self::PreSpin => 0,
            Self::ReelStopping { .. } => 1,
            Self::ReelsStopped => 2,
            Self::AfterPaylines => 3,
            Self::ReevaluationSpin { .. } | Self::ReevaluationStopped { .. } => 4,
            Self::Cleanup => 5,
            Self::Idle => 6,
        }
    }

    /// Is this a reevaluation sub-spin phase?
    pub fn is_reevaluation(&self) -> bool {
        matches!(
            self,
            Self::ReevaluationSpin { .. } | Self::ReevaluationStopped { .. }
        )
    }

    /// Reevaluation index, if this is a reevaluation phase
    pub fn reevaluation_index(&self) -> Option<u32> {
        match self {
            Self::ReevaluationSpin { index } | Self::ReevaluationStopped { index } => Some(*index),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpinPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReelStopping { reel_index } => write!(f, "reel_stopping({})", reel_index),
            Self::ReevaluationSpin { index } => write!(f, "reevaluation_spin({})", index),
            Self::ReevaluationStopped { index } => write!(f, "reevaluation_stopped({})", index),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Host-visible stage notification
///
/// These are the only points at which the presentation layer may observe
/// engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// A lifecycle phase was entered
    PhaseEnter { phase: SpinPhase },

    // ═══════════════════════════════════════════════════════════════════════
    // SYMBOLS
    // ═══════════════════════════════════════════════════════════════════════
    /// A collector symbol's displayed value changed
    SymbolValueChanged {
        symbol: String,
        value: u64,
        /// Grid cell carrying the label, if the change is cell-specific
        #[serde(default)]
        cell: Option<(u8, u8)>,
    },

    /// Provisional symbols cycled before the final identity settles
    CycleReveal {
        reel: u8,
        row: u8,
        provisional: Vec<String>,
        final_symbol: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // STICKY
    // ═══════════════════════════════════════════════════════════════════════
    /// A cell locked, relabeled, or unlocked (`symbol == None`)
    StickyChanged {
        reel: u8,
        row: u8,
        #[serde(default)]
        symbol: Option<String>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // PAYOUT
    // ═══════════════════════════════════════════════════════════════════════
    /// The round's displayed payout changed
    RunningPayoutChanged { credits: u64 },

    /// Free spins awarded by the outcome
    FreeSpinsAwarded { count: u32 },

    // ═══════════════════════════════════════════════════════════════════════
    // FEATURE
    // ═══════════════════════════════════════════════════════════════════════
    /// A feature activation began
    FeatureEnter {
        feature: FeatureKind,
        #[serde(default)]
        total_steps: Option<u32>,
    },

    /// A feature step settled
    FeatureStep {
        feature: FeatureKind,
        step_index: u32,
        #[serde(default)]
        steps_remaining: Option<u32>,
    },

    /// A feature reached its terminal state
    FeatureTerminal { feature: FeatureKind, total_win: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // DIAGNOSTICS
    // ═══════════════════════════════════════════════════════════════════════
    /// An error was raised, whether or not it was recovered locally
    Diagnostic { kind: DiagnosticKind, message: String },
}

impl Stage {
    /// Get the category of this stage
    pub fn category(&self) -> StageCategory {
        match self {
            Self::PhaseEnter { .. } => StageCategory::Lifecycle,
            Self::SymbolValueChanged { .. } | Self::CycleReveal { .. } => StageCategory::Symbol,
            Self::StickyChanged { .. } => StageCategory::Sticky,
            Self::RunningPayoutChanged { .. } | Self::FreeSpinsAwarded { .. } => {
                StageCategory::Payout
            }
            Self::FeatureEnter { .. } | Self::FeatureStep { .. } | Self::FeatureTerminal { .. } => {
                StageCategory::Feature
            }
            Self::Diagnostic { .. } => StageCategory::Diagnostic,
        }
    }

    /// Get a simple string name for this stage type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PhaseEnter { .. } => "phase_enter",
            Self::SymbolValueChanged { .. } => "symbol_value_changed",
            Self::CycleReveal { .. } => "cycle_reveal",
            Self::StickyChanged { .. } => "sticky_changed",
            Self::RunningPayoutChanged { .. } => "running_payout_changed",
            Self::FreeSpinsAwarded { .. } => "free_spins_awarded",
            Self::FeatureEnter { .. } => "feature_enter",
            Self::FeatureStep { .. } => "feature_step",
            Self::FeatureTerminal { .. } => "feature_terminal",
            Self::Diagnostic { .. } => "diagnostic",
        }
    }

    /// All stage type names
    pub fn all_type_names() -> &'static [&'static str] {
        &[
            "phase_enter",
            "symbol_value_changed",
            "cycle_reveal",
            "sticky_changed",
            "running_payout_changed",
            "free_spins_awarded",
            "feature_enter",
            "feature_step",
            "feature_terminal",
            "diagnostic",
        ]
    }

    /// Check if a type name is a known stage
    pub fn is_valid_type_name(name: &str) -> bool {
        Self::all_type_names().contains(&name)
    }
}

/// Stage category for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    Lifecycle,
    Symbol,
    Sticky,
    Payout,
    Feature,
    Diagnostic,
}

impl StageCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Lifecycle => "Spin Lifecycle",
            Self::Symbol => "Symbols",
            Self::Sticky => "Sticky Cells",
            Self::Payout => "Payout",
            Self::Feature => "Features",
            Self::Diagnostic => "Diagnostics",
        }
    }
}
