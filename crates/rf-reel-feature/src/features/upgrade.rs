//! Value Upgrade — raises collector values mid-spin

use rf_stage::{FeatureKind, SpinPhase};

use crate::error::{EngineError, EngineResult};
use crate::outcome::SymbolValueUpgrade;

use super::{FeatureId, FeatureModule, PhaseContext, PhaseView};

/// Applies `symbol_value_upgrade` entries in document order
///
/// Outcome-level upgrades apply when the reels stop; upgrades carried by a
/// respin apply when that respin lands.
#[derive(Debug, Default)]
pub struct UpgradeModule;

impl UpgradeModule {
    pub fn new() -> Self {
        Self
    }

    fn upgrades_for<'o>(phase: SpinPhase, view: &PhaseView<'o>) -> Vec<&'o SymbolValueUpgrade> {
        match phase {
            SpinPhase::ReelsStopped => view.outcome.upgrades().collect(),
            SpinPhase::ReevaluationStopped { index } => view
                .outcome
                .reevaluation(index)
                .map(|r| r.upgrades.iter().collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl FeatureModule for UpgradeModule {
    fn id(&self) -> FeatureId {
        FeatureId::new("value_upgrade")
    }

    fn name(&self) -> &str {
        "Value Upgrade"
    }

    fn category(&self) -> FeatureKind {
        FeatureKind::ValueUpgrade
    }

    fn wants(&self, phase: SpinPhase, view: &PhaseView<'_>) -> bool {
        !Self::upgrades_for(phase, view).is_empty()
    }

    fn run(&mut self, phase: SpinPhase, cx: &mut PhaseContext<'_>) -> EngineResult<()> {
        let outcome = cx.outcome;
        let upgrades: Vec<&SymbolValueUpgrade> = match phase {
            SpinPhase::ReelsStopped => outcome.upgrades().collect(),
            SpinPhase::ReevaluationStopped { index } => outcome
                .reevaluation(index)
                .map(|r| r.upgrades.iter().collect())
                .unwrap_or_default(),
            other => {
                return Err(EngineError::state(format!("value upgrade cannot run in {other}")));
            }
        };

        for upgrade in upgrades {
            cx.apply_upgrade(upgrade)?;
            log::debug!(
                "[Upgrade] {} at ({}, {}) {} -> {}",
                upgrade.symbol,
                upgrade.reel,
                upgrade.position,
                upgrade.credits_before,
                upgrade.credits_after
            );
        }
        cx.mark_feature_consumed(FeatureKind::ValueUpgrade);
        Ok(())
    }
}
