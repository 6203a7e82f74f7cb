//! Feature System — Pluggable reel feature modules
//!
//! Each reel feature (symbol collection, value upgrade, reward symbols,
//! sticky respins) is a separate module behind the [`FeatureModule`] trait.
//! The dispatcher asks every registered module, in registration order,
//! whether it wants the current phase and runs the ones that do.
//!
//! ## Architecture
//!
//! ```text
//! ModuleRegistry
//!     │
//!     ├── CollectionModule     (ReelStopping, AfterPaylines)
//!     ├── UpgradeModule        (ReelsStopped, ReevaluationStopped)
//!     ├── RewardModule         (AfterPaylines)
//!     └── StickyRespinModule   (AfterPaylines → Reevaluation* → Cleanup)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = ModuleRegistry::new();
//! registry.register(Box::new(RewardModule::new()))?;
//!
//! if registry.any_holding() {
//!     // next spin stays blocked
//! }
//! ```

mod collection;
mod context;
mod module;
mod registry;
mod reward;
mod sticky_respin;
mod upgrade;

pub use collection::*;
pub use context::*;
pub use module::*;
pub use registry::*;
pub use reward::*;
pub use sticky_respin::*;
pub use upgrade::*;
