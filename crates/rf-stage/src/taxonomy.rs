//! Stage Taxonomy — Enums for classifying engine output
//!
//! These enums classify diagnostics, feature families and replacement
//! kinds so hosts can route stage events without parsing strings.

use serde::{Deserialize, Serialize};

/// Diagnostic classification
///
/// Mirrors the engine error taxonomy. Every error the engine raises is
/// delivered to the host with one of these kinds, including errors the
/// engine recovers from locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Missing or contradictory data the server should have supplied
    Configuration,
    /// Re-entrancy or out-of-order call
    StateViolation,
    /// Ledger queried for an unregistered symbol
    UnknownSymbol,
    /// No paytable entry for a match count
    LookupMiss,
    /// Outcome payload could not be parsed
    Payload,
}

impl DiagnosticKind {
    /// Fatal diagnostics force the active feature to terminate
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration | Self::StateViolation)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration Error",
            Self::StateViolation => "State Violation",
            Self::UnknownSymbol => "Unknown Symbol",
            Self::LookupMiss => "Lookup Miss",
            Self::Payload => "Payload Error",
        }
    }
}

/// Feature family classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Collector symbols pay their ledger value
    SymbolCollection,
    /// Collector values raised mid-round
    ValueUpgrade,
    /// Individual reward symbols pay out
    RewardSymbol,
    /// Sticky symbols hold across respins
    StickyRespin,
}

impl FeatureKind {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SymbolCollection => "Symbol Collection",
            Self::ValueUpgrade => "Value Upgrade",
            Self::RewardSymbol => "Reward Symbol",
            Self::StickyRespin => "Sticky Respin",
        }
    }
}

/// Which replacement map produced a revealed symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementKind {
    Normal,
    Mega,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(DiagnosticKind::Configuration.is_fatal());
        assert!(DiagnosticKind::StateViolation.is_fatal());
        assert!(!DiagnosticKind::UnknownSymbol.is_fatal());
        assert!(!DiagnosticKind::LookupMiss.is_fatal());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&DiagnosticKind::LookupMiss).unwrap();
        assert_eq!(json, "\"lookup_miss\"");

        let kind: FeatureKind = serde_json::from_str("\"sticky_respin\"").unwrap();
        assert_eq!(kind, FeatureKind::StickyRespin);
    }
}
