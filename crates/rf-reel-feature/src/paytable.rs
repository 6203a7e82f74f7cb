//! PayTable lookup keyed by match count

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::symbols::Credits;

/// One row of a named paytable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTableEntry {
    pub symbol_match_count: u32,
    pub credits: Credits,
}

impl PayTableEntry {
    pub fn new(symbol_match_count: u32, credits: u64) -> Self {
        Self {
            symbol_match_count,
            credits: Credits(credits),
        }
    }
}

/// Named paytables, loaded once and read-only afterwards
///
/// Source shape: `{ name: [{symbol_match_count, credits}] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayTable {
    tables: BTreeMap<String, Vec<PayTableEntry>>,
}

impl PayTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; entries are sorted by match count
    pub fn with_table(
        mut self,
        name: impl Into<String>,
        entries: impl IntoIterator<Item = PayTableEntry>,
    ) -> EngineResult<Self> {
        let name = name.into();
        let mut entries: Vec<_> = entries.into_iter().collect();
        Self::normalize(&name, &mut entries)?;
        self.tables.insert(name, entries);
        Ok(self)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::configuration(format!("paytable: {e}")))?;
        table.validated()
    }

    pub fn from_yaml(yaml: &str) -> EngineResult<Self> {
        let table: Self = serde_yml::from_str(yaml)?;
        table.validated()
    }

    fn validated(mut self) -> EngineResult<Self> {
        for (name, entries) in self.tables.iter_mut() {
            Self::normalize(name, entries)?;
        }
        Ok(self)
    }

    fn normalize(name: &str, entries: &mut [PayTableEntry]) -> EngineResult<()> {
        entries.sort_by_key(|e| e.symbol_match_count);
        if let Some(pair) = entries
            .windows(2)
            .find(|w| w[0].symbol_match_count == w[1].symbol_match_count)
        {
            return Err(EngineError::configuration(format!(
                "paytable {name} has duplicate match count {}",
                pair[0].symbol_match_count
            )));
        }
        Ok(())
    }

    /// Credits for `match_count` cells in table `name`
    pub fn lookup(&self, name: &str, match_count: u32) -> EngineResult<Credits> {
        self.tables
            .get(name)
            .and_then(|entries| {
                entries
                    .binary_search_by_key(&match_count, |e| e.symbol_match_count)
                    .ok()
                    .map(|i| entries[i].credits)
            })
            .ok_or_else(|| EngineError::LookupMiss {
                paytable: name.to_string(),
                match_count,
            })
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
