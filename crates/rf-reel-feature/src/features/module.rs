//! Feature Module trait — the interface every feature implements

use rf_stage::{FeatureKind, SpinPhase};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::SymbolValueLedger;
use crate::outcome::Outcome;
use crate::round::RoundContext;

use super::PhaseContext;

/// Unique module identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub String);

impl FeatureId {
    /// Create a new module ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view a module's predicate decides on
#[derive(Clone, Copy)]
pub struct PhaseView<'a> {
    pub outcome: &'a Outcome,
    pub round: &'a RoundContext,
    pub config: &'a EngineConfig,
    pub ledger: &'a SymbolValueLedger,
}

/// A self-contained reel feature driven by the lifecycle dispatcher.
///
/// ## Lifecycle
///
/// 1. `begin_round()`: Reset per-round state
/// 2. `wants()`: Asked once per phase, in registration order
/// 3. `run()`: Executes to completion before the next module starts
/// 4. `holds_next_spin()`: Gates the next spin while true
/// 5. `abort()`: Fail-safe after a fatal error; must release the gate
///
/// ## Example Implementation
///
/// ```rust,ignore
/// struct BonusMeter;
///
/// impl FeatureModule for BonusMeter {
///     fn id(&self) -> FeatureId {
///         FeatureId::new("bonus_meter")
///     }
///     fn wants(&self, phase: SpinPhase, _view: &PhaseView<'_>) -> bool {
///         phase == SpinPhase::AfterPaylines
///     }
///     // ... other methods
/// }
/// ```
pub trait FeatureModule: Send {
    // ═══════════════════════════════════════════════════════════════════════════
    // IDENTITY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Unique module identifier
    fn id(&self) -> FeatureId;

    /// Human-readable module name
    fn name(&self) -> &str;

    /// Feature kind reported in stages
    fn category(&self) -> FeatureKind;

    // ═══════════════════════════════════════════════════════════════════════════
    // DISPATCH
    // ═══════════════════════════════════════════════════════════════════════════

    /// Should `run` execute for this phase?
    fn wants(&self, phase: SpinPhase, view: &PhaseView<'_>) -> bool;

    /// Handle one phase
    fn run(&mut self, phase: SpinPhase, cx: &mut PhaseContext<'_>) -> EngineResult<()>;

    // ═══════════════════════════════════════════════════════════════════════════
    // GATING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Is this module keeping the next spin from starting?
    fn holds_next_spin(&self) -> bool {
        false
    }

    /// Does this module still consume reevaluation sub-spins?
    fn pending_reevaluations(&self) -> bool {
        false
    }

    /// Force the module to a terminal, gate-released state
    fn abort(&mut self, _cx: &mut PhaseContext<'_>) {}

    /// Called when a new round opens
    fn begin_round(&mut self, _round: &RoundContext) {}
}

/// Boxed module for dynamic dispatch
pub type BoxedFeatureModule = Box<dyn FeatureModule + 'static>;
