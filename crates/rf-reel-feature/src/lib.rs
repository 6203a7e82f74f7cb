//! # rf-reel-feature — Reel Feature Resolution Engine
//!
//! Interprets a server-computed spin outcome and drives multi-stage reel
//! features to their conclusion: symbol collection, value upgrades, reward
//! symbols and sticky hold-and-respin. Produces the final payout and an
//! ordered stream of stages for the presentation layer.
//!
//! ## Features
//!
//! - **Outcome Decoder**: Typed mutations out of loosely shaped payloads
//! - **Symbol Value Ledger**: Per-round collector values with carry-over
//! - **Sticky Respins**: Explicit state machine with snapshot/restore
//! - **Payout Accumulator**: Integer credits, settled once
//! - **Feature Modules**: Pluggable handlers in stable registration order
//!
//! ## Architecture
//!
//! ```text
//! FeatureEngine (dispatcher)
//!     │
//!     ├── Outcome ← decoder ← JSON payload
//!     ├── SymbolValueLedger
//!     ├── PayoutAccumulator
//!     ├── Timeline (rf-stage)
//!     └── ModuleRegistry
//!           │
//!           v
//!     StageEvent → StageObserver (host)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = EngineConfig::from_yaml(&yaml)?;
//! let mut engine = FeatureEngine::new(config, paytable)?
//!     .with_builtin_modules()?
//!     .with_observer(trace.clone());
//!
//! engine.begin_round(RoundContext::base("round-1", "buffalo", 1))?;
//! engine.begin_spin_json(&payload)?;
//! while let Some(phase) = engine.advance()? {
//!     // pace presentation
//! }
//! let summary = engine.end_round()?;
//! ```

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod features;
pub mod ledger;
pub mod observe;
pub mod outcome;
pub mod paytable;
pub mod payout;
pub mod round;
pub mod sticky;
pub mod symbols;

pub use config::*;
pub use decoder::*;
pub use engine::*;
pub use error::*;
pub use features::*;
pub use ledger::*;
pub use observe::*;
pub use outcome::*;
pub use paytable::*;
pub use payout::*;
pub use round::*;
pub use sticky::*;
pub use symbols::*;
