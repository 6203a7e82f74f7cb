//! StageEvent — A stage occurrence with metadata
//!
//! Wraps a Stage with its timeline position and the module that produced it.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// A stage event with full metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The canonical stage
    pub stage: Stage,

    /// Timeline position in milliseconds from the start of the round
    pub timestamp_ms: f64,

    /// Feature module (or engine component) that emitted the stage
    #[serde(default)]
    pub source: Option<String>,
}

impl StageEvent {
    /// Create a new stage event
    pub fn new(stage: Stage, timestamp_ms: f64) -> Self {
        Self {
            stage,
            timestamp_ms,
            source: None,
        }
    }

    /// Add source info
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get stage type name
    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }
}
