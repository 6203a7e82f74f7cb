//! Symbols, grid cells, landed grids and credits

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Symbol identity as delivered by the server (e.g. `"SC"`, `"H1"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new symbol
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the symbol name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does this symbol belong to `family`?
    ///
    /// A family is the base symbol plus its `"{base}_*"` variants
    /// (`SC`, `SC_MINI`, `SC_MEGA`).
    pub fn in_family(&self, family: &Symbol) -> bool {
        self.0 == family.0
            || (self.0.len() > family.0.len()
                && self.0.starts_with(family.0.as_str())
                && self.0.as_bytes()[family.0.len()] == b'_')
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A grid position. Ordered reel-major: lowest reel first, then lowest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub reel: u8,
    pub row: u8,
}

impl Cell {
    pub fn new(reel: u8, row: u8) -> Self {
        Self { reel, row }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.reel, self.row)
    }
}

/// Landed symbols, reel-major (`reels[reel][row]`, rows top to bottom)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    reels: Vec<Vec<Symbol>>,
}

impl Grid {
    pub fn new(reels: Vec<Vec<Symbol>>) -> Self {
        Self { reels }
    }

    /// Build from string slices (test and fixture convenience)
    pub fn from_names(reels: &[&[&str]]) -> Self {
        Self {
            reels: reels
                .iter()
                .map(|reel| reel.iter().map(|s| Symbol::from(*s)).collect())
                .collect(),
        }
    }

    pub fn reel_count(&self) -> usize {
        self.reels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reels.is_empty()
    }

    /// Same reel count and same height on every reel
    pub fn same_shape(&self, other: &Grid) -> bool {
        self.reels.len() == other.reels.len()
            && self.reels.iter().zip(&other.reels).all(|(a, b)| a.len() == b.len())
    }

    /// Symbols on one reel
    pub fn reel(&self, index: u8) -> &[Symbol] {
        self.reels
            .get(index as usize)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, cell: Cell) -> Option<&Symbol> {
        self.reels
            .get(cell.reel as usize)
            .and_then(|r| r.get(cell.row as usize))
    }

    /// Overwrite a cell; returns the previous symbol, or `None` if out of bounds
    pub fn set(&mut self, cell: Cell, symbol: Symbol) -> Option<Symbol> {
        self.reels
            .get_mut(cell.reel as usize)
            .and_then(|r| r.get_mut(cell.row as usize))
            .map(|slot| std::mem::replace(slot, symbol))
    }

    /// Iterate every cell with its symbol, reel-major
    pub fn cells(&self) -> impl Iterator<Item = (Cell, &Symbol)> + '_ {
        self.reels.iter().enumerate().flat_map(|(reel, column)| {
            column
                .iter()
                .enumerate()
                .map(move |(row, symbol)| (Cell::new(reel as u8, row as u8), symbol))
        })
    }

    /// Cells holding exactly `symbol`, reel-major
    pub fn positions_of(&self, symbol: &Symbol) -> Vec<Cell> {
        self.cells()
            .filter(|(_, s)| *s == symbol)
            .map(|(cell, _)| cell)
            .collect()
    }

    /// Number of cells holding exactly `symbol`
    pub fn count(&self, symbol: &Symbol) -> u32 {
        self.cells().filter(|(_, s)| *s == symbol).count() as u32
    }

    /// Distinct symbols on the grid
    pub fn distinct(&self) -> BTreeSet<&Symbol> {
        self.cells().map(|(_, s)| s).collect()
    }
}

/// Credits in currency minor units
///
/// All money is integral. Arithmetic saturates instead of wrapping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(pub u64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiply by an integer multiplier, saturating
    pub fn times(self, multiplier: u32) -> Self {
        Self(self.0.saturating_mul(multiplier as u64))
    }
}

impl Add for Credits {
    type Output = Credits;

    fn add(self, rhs: Credits) -> Credits {
        Credits(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Credits) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Credits {
    fn sum<I: Iterator<Item = Credits>>(iter: I) -> Self {
        iter.fold(Credits::ZERO, |acc, c| acc + c)
    }
}

impl From<u64> for Credits {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_family() {
        let sc = Symbol::from("SC");
        assert!(Symbol::from("SC").in_family(&sc));
        assert!(Symbol::from("SC_MEGA").in_family(&sc));
        assert!(!Symbol::from("SCATTER").in_family(&sc));
        assert!(!Symbol::from("H1").in_family(&sc));
    }

    #[test]
    fn test_cell_order_is_reel_major() {
        let mut cells = vec![Cell::new(1, 0), Cell::new(0, 2), Cell::new(0, 1)];
        cells.sort();
        assert_eq!(cells, vec![Cell::new(0, 1), Cell::new(0, 2), Cell::new(1, 0)]);
    }

    #[test]
    fn test_grid_queries() {
        let mut grid = Grid::from_names(&[&["A", "SC", "B"], &["SC", "A", "A"]]);
        assert_eq!(grid.reel_count(), 2);
        assert_eq!(grid.count(&"A".into()), 3);
        assert_eq!(
            grid.positions_of(&"SC".into()),
            vec![Cell::new(0, 1), Cell::new(1, 0)]
        );

        let old = grid.set(Cell::new(1, 2), "H1".into());
        assert_eq!(old, Some(Symbol::from("A")));
        assert_eq!(grid.get(Cell::new(1, 2)), Some(&Symbol::from("H1")));
        assert_eq!(grid.set(Cell::new(9, 0), "H1".into()), None);

        assert!(grid.same_shape(&Grid::from_names(&[&["X", "X", "X"], &["X", "X", "X"]])));
        assert!(!grid.same_shape(&Grid::from_names(&[&["X", "X", "X"], &["X", "X"]])));
        assert!(!grid.same_shape(&Grid::from_names(&[&["X", "X", "X"]])));
    }

    #[test]
    fn test_credits_saturate() {
        assert_eq!(Credits(50).times(6), Credits(300));
        assert_eq!(Credits(u64::MAX).times(2), Credits(u64::MAX));
        assert_eq!(Credits(u64::MAX) + Credits(1), Credits(u64::MAX));
        let total: Credits = [Credits(1), Credits(2), Credits(3)].into_iter().sum();
        assert_eq!(total, Credits(6));
    }

    #[test]
    fn test_grid_deserializes_from_nested_lists() {
        let grid: Grid = serde_json::from_str(r#"[["A","B"],["C","D"]]"#).unwrap();
        assert_eq!(grid.get(Cell::new(1, 1)), Some(&Symbol::from("D")));
    }
}
