//! StageTrace — A complete sequence of stage events for one round
//!
//! A trace captures the full timeline of a game round as the host saw it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::StageEvent;
use crate::observer::StageObserver;
use crate::stage::{SpinPhase, Stage, StageCategory};
use crate::taxonomy::DiagnosticKind;

/// Trace (de)serialization errors
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Failed to parse trace JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// A complete trace of stage events for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// Unique identifier for this trace
    pub trace_id: String,

    /// Game identifier (modifier key namespace)
    pub game_id: String,

    /// Round identifier
    #[serde(default)]
    pub round_id: Option<String>,

    /// All events in emission order
    pub events: Vec<StageEvent>,

    /// When this trace was recorded
    pub recorded_at: DateTime<Utc>,

    /// Custom metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StageTrace {
    /// Create a new empty trace
    pub fn new(trace_id: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            game_id: game_id.into(),
            round_id: None,
            events: Vec::new(),
            recorded_at: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Add an event to the trace
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    /// Set round ID
    pub fn with_round(mut self, round_id: impl Into<String>) -> Self {
        self.round_id = Some(round_id.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Drop all recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        let first = self.events.first().map(|e| e.timestamp_ms).unwrap_or(0.0);
        let last = self.events.last().map(|e| e.timestamp_ms).unwrap_or(0.0);
        last - first
    }

    /// Get events by category
    pub fn events_by_category(&self, category: StageCategory) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.category() == category)
            .collect()
    }

    /// Check if trace contains a specific stage type
    pub fn has_stage(&self, type_name: &str) -> bool {
        self.events.iter().any(|e| e.stage.type_name() == type_name)
    }

    /// Phases in the order they were entered
    pub fn phases(&self) -> Vec<SpinPhase> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::PhaseEnter { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Every running payout figure reported, in order
    pub fn running_payouts(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::RunningPayoutChanged { credits } => Some(*credits),
                _ => None,
            })
            .collect()
    }

    /// Last running payout figure, or zero
    pub fn final_payout(&self) -> u64 {
        self.running_payouts().last().copied().unwrap_or(0)
    }

    /// Diagnostics delivered to the host
    pub fn diagnostics(&self) -> Vec<(DiagnosticKind, &str)> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::Diagnostic { kind, message } => Some((*kind, message.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Last displayed value per labeled cell
    pub fn cell_labels(&self) -> std::collections::BTreeMap<(u8, u8), (String, u64)> {
        let mut labels = std::collections::BTreeMap::new();
        for event in &self.events {
            if let Stage::SymbolValueChanged {
                symbol,
                value,
                cell: Some(cell),
            } = &event.stage
            {
                labels.insert(*cell, (symbol.clone(), *value));
            }
        }
        labels
    }

    /// Stages with timestamps stripped, for pacing-independent comparison
    pub fn stage_sequence(&self) -> Vec<Stage> {
        self.events.iter().map(|e| e.stage.clone()).collect()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, StageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, StageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Get summary of trace
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            trace_id: self.trace_id.clone(),
            game_id: self.game_id.clone(),
            event_count: self.events.len(),
            duration_ms: self.duration_ms(),
            final_payout: self.final_payout(),
            has_feature: self.has_stage("feature_enter"),
            diagnostic_count: self.events_by_category(StageCategory::Diagnostic).len(),
        }
    }
}

impl StageObserver for StageTrace {
    fn on_event(&mut self, event: &StageEvent) {
        self.push(event.clone());
    }
}

/// Summary of a trace for quick overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub game_id: String,
    pub event_count: usize,
    pub duration_ms: f64,
    pub final_payout: u64,
    pub has_feature: bool,
    pub diagnostic_count: usize,
}
