//! # rf-stage — Spin Lifecycle Stage System
//!
//! Defines the canonical phases every spin passes through and the stage
//! notifications a presentation layer observes. The rules engine never
//! decides how something looks, only which stage happened and when, and
//! with what value.
//!
//! ## Philosophy
//!
//! All reel features, whatever their shape, map onto the same phases:
//! - Outcome arrives → Reels stop → Paylines known → Reevaluations → Cleanup
//!
//! This crate defines these phases, the host callback surface and the
//! cooperative timeline used to pace stage emission.

pub mod event;
pub mod observer;
pub mod stage;
pub mod taxonomy;
pub mod timing;
pub mod trace;

pub use event::*;
pub use observer::*;
pub use stage::*;
pub use taxonomy::*;
pub use timing::*;
pub use trace::*;
