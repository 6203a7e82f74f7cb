//! Engine error taxonomy

use rf_stage::DiagnosticKind;

use crate::symbols::Symbol;

/// Errors raised by the rules engine
///
/// `Configuration`, `StateViolation` and `AlreadyActive` are fatal: the
/// active feature is forced to its terminal state. `UnknownSymbol` and
/// `LookupMiss` are recovered locally as a zero value. Every variant is
/// still reported to the host as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("State violation: {0}")]
    StateViolation(String),

    #[error("Feature already active: {0}")]
    AlreadyActive(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(Symbol),

    #[error("No paytable entry for {paytable}[{match_count}]")]
    LookupMiss { paytable: String, match_count: u32 },

    #[error("Malformed outcome payload: {0}")]
    Payload(String),
}

impl EngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::StateViolation(msg.into())
    }

    /// Diagnostic classification delivered to the host
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Configuration(_) => DiagnosticKind::Configuration,
            Self::StateViolation(_) | Self::AlreadyActive(_) => DiagnosticKind::StateViolation,
            Self::UnknownSymbol(_) => DiagnosticKind::UnknownSymbol,
            Self::LookupMiss { .. } => DiagnosticKind::LookupMiss,
            Self::Payload(_) => DiagnosticKind::Payload,
        }
    }

    /// Fatal errors force the current feature to terminate
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}

impl From<serde_yml::Error> for EngineError {
    fn from(e: serde_yml::Error) -> Self {
        Self::Configuration(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
