//! Module Registry — ordered storage for feature modules

use crate::error::{EngineError, EngineResult};

use super::{BoxedFeatureModule, FeatureId};

/// Registered modules in stable registration order
///
/// Dispatch visits modules in the order they were registered, so the
/// order is part of a game's behavior.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<BoxedFeatureModule>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module; a duplicate id is a configuration error
    pub fn register(&mut self, module: BoxedFeatureModule) -> EngineResult<()> {
        let id = module.id();
        if self.has(&id) {
            return Err(EngineError::configuration(format!(
                "module {id} is already registered"
            )));
        }
        log::debug!("[Registry] Registered {} ({})", id, module.name());
        self.modules.push(module);
        Ok(())
    }

    /// Check if a module is registered
    pub fn has(&self, id: &FeatureId) -> bool {
        self.modules.iter().any(|m| &m.id() == id)
    }

    /// Get number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module IDs in registration order
    pub fn list_ids(&self) -> Vec<FeatureId> {
        self.modules.iter().map(|m| m.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxedFeatureModule> {
        self.modules.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BoxedFeatureModule> {
        self.modules.iter_mut()
    }

    /// Is any module holding the next spin?
    pub fn any_holding(&self) -> bool {
        self.modules.iter().any(|m| m.holds_next_spin())
    }

    /// Does any module still consume reevaluations?
    pub fn any_pending_reevaluations(&self) -> bool {
        self.modules.iter().any(|m| m.pending_reevaluations())
    }
}

#[cfg(test)]
mod tests {
    use rf_stage::{FeatureKind, SpinPhase};

    use super::*;
    use crate::features::{FeatureModule, PhaseContext, PhaseView};

    struct Named(&'static str);

    impl FeatureModule for Named {
        fn id(&self) -> FeatureId {
            FeatureId::new(self.0)
        }
        fn name(&self) -> &str {
            self.0
        }
        fn category(&self) -> FeatureKind {
            FeatureKind::RewardSymbol
        }
        fn wants(&self, _phase: SpinPhase, _view: &PhaseView<'_>) -> bool {
            false
        }
        fn run(&mut self, _phase: SpinPhase, _cx: &mut PhaseContext<'_>) -> EngineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_order_is_stable() {
        let mut registry = ModuleRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(Box::new(Named(name))).unwrap();
        }
        let ids: Vec<_> = registry.list_ids().into_iter().map(|i| i.0).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register(Box::new(Named("a"))).unwrap();
        let err = registry.register(Box::new(Named("a"))).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_idle_modules_release_gate() {
        let mut registry = ModuleRegistry::new();
        registry.register(Box::new(Named("a"))).unwrap();
        registry.register(Box::new(Named("b"))).unwrap();
        assert!(registry.has(&FeatureId::new("b")));
        assert!(!registry.has(&FeatureId::new("z")));
        assert!(!registry.any_holding());
        assert!(!registry.any_pending_reevaluations());
    }
}
