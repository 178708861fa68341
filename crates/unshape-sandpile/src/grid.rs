//! Toroidal grid of grain counts.
//!
//! Cells are stored row-major in a single buffer. Neighbor lookups wrap on
//! both axes, so every cell has exactly four von Neumann neighbor slots.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandpileError};

/// Grain count at which a cell fires.
pub const THRESHOLD: u32 = 4;

/// Largest value a settled cell can hold.
pub const MAX_STABLE: u32 = THRESHOLD - 1;

/// Neighbor slot offsets as `(drow, dcol)`: up, down, left, right.
///
/// ```text
/// ┌───┬───┬───┐
/// │   │ 0 │   │
/// ├───┼───┼───┤
/// │ 2 │ · │ 3 │
/// ├───┼───┼───┤
/// │   │ 1 │   │
/// └───┴───┴───┘
/// ```
const NEIGHBOR_OFFSETS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Row-major snapshot of a grid used as a hashable identity.
pub type ConfigKey = Arc<[u32]>;

/// A square grid with toroidal wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid {
    /// Side length.
    size: usize,
    /// Cell values, row-major.
    cells: Vec<u32>,
}

impl Grid {
    /// Creates an empty grid.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SandpileError::InvalidSize(size));
        }
        Ok(Self {
            size,
            cells: vec![0; size * size],
        })
    }

    /// Creates a grid from row-major values.
    ///
    /// Values are taken as-is; cells at or above [`THRESHOLD`] are allowed
    /// and stay unstable until the owning sandpile topples them.
    pub fn from_cells(size: usize, cells: Vec<u32>) -> Result<Self> {
        if size == 0 {
            return Err(SandpileError::InvalidSize(size));
        }
        if cells.len() != size * size {
            return Err(SandpileError::CellCountMismatch {
                expected: size * size,
                actual: cells.len(),
            });
        }
        Ok(Self { size, cells })
    }

    /// Returns the side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; a grid has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns true if `(row, col)` addresses a cell.
    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    /// Gets the value of a cell.
    ///
    /// # Panics
    ///
    /// Panics if `(row, col)` is outside the grid.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> u32 {
        self.cells[self.index(row, col)]
    }

    /// Gets the value of a cell, or `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        self.contains(row, col).then(|| self.value(row, col))
    }

    /// Adds one grain to a cell and returns its new value.
    ///
    /// # Panics
    ///
    /// Panics if `(row, col)` is outside the grid.
    #[inline]
    pub fn increment(&mut self, row: usize, col: usize) -> u32 {
        let idx = self.index(row, col);
        self.cells[idx] += 1;
        self.cells[idx]
    }

    /// Removes [`THRESHOLD`] grains from a cell and returns its new value.
    ///
    /// The caller guarantees the cell holds at least [`THRESHOLD`] grains.
    #[inline]
    pub(crate) fn discharge(&mut self, row: usize, col: usize) -> u32 {
        let idx = self.index(row, col);
        self.cells[idx] -= THRESHOLD;
        self.cells[idx]
    }

    /// Returns the four neighbor slots of a cell: up, down, left, right.
    ///
    /// Indices wrap modulo the size. On grids of size 1 or 2 several slots
    /// address the same cell; they are kept as separate slots.
    pub fn toroidal_neighbors(&self, row: usize, col: usize) -> [(usize, usize); 4] {
        let size = self.size as i64;
        NEIGHBOR_OFFSETS.map(|(dr, dc)| {
            let r = (row as i64 + dr).rem_euclid(size) as usize;
            let c = (col as i64 + dc).rem_euclid(size) as usize;
            (r, c)
        })
    }

    /// Returns the sum of all cells.
    pub fn total_energy(&self) -> u64 {
        self.cells.iter().map(|&v| u64::from(v)).sum()
    }

    /// Largest total energy any settled configuration of this grid can hold.
    ///
    /// A closed torus has no sink, so above this bound a cascade never ends.
    pub fn max_stable_energy(&self) -> u64 {
        self.cells.len() as u64 * u64::from(MAX_STABLE)
    }

    /// Returns true if every cell is below [`THRESHOLD`].
    pub fn is_settled(&self) -> bool {
        self.cells.iter().all(|&v| v < THRESHOLD)
    }

    /// Returns the coordinates of all cells at or above [`THRESHOLD`], row-major.
    pub fn unstable_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v >= THRESHOLD)
            .map(|(idx, _)| (idx / self.size, idx % self.size))
            .collect()
    }

    /// Returns the cell values, row-major.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// Iterates over the rows of the grid.
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.cells.chunks(self.size)
    }

    /// Returns the canonical configuration key (row-major values).
    pub fn canonical_key(&self) -> ConfigKey {
        Arc::from(self.cells.as_slice())
    }

    /// Sets every cell to zero.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let mut first = true;
            for value in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{value}")?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(4).unwrap();
        assert_eq!(grid.size(), 4);
        assert_eq!(grid.len(), 16);
        assert_eq!(grid.total_energy(), 0);
        assert!(grid.is_settled());
    }

    #[test]
    fn test_grid_rejects_zero_size() {
        assert!(matches!(Grid::new(0), Err(SandpileError::InvalidSize(0))));
        assert!(matches!(
            Grid::from_cells(0, vec![]),
            Err(SandpileError::InvalidSize(0))
        ));
    }

    #[test]
    fn test_from_cells_length_mismatch() {
        let err = Grid::from_cells(2, vec![0, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            SandpileError::CellCountMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_increment_returns_new_value() {
        let mut grid = Grid::new(3).unwrap();
        assert_eq!(grid.increment(1, 2), 1);
        assert_eq!(grid.increment(1, 2), 2);
        assert_eq!(grid.value(1, 2), 2);
        assert_eq!(grid.get(1, 2), Some(2));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn test_neighbors_interior() {
        let grid = Grid::new(5).unwrap();
        assert_eq!(
            grid.toroidal_neighbors(2, 2),
            [(1, 2), (3, 2), (2, 1), (2, 3)]
        );
    }

    #[test]
    fn test_neighbors_wrap_corner() {
        let grid = Grid::new(4).unwrap();
        assert_eq!(
            grid.toroidal_neighbors(0, 0),
            [(3, 0), (1, 0), (0, 3), (0, 1)]
        );
        assert_eq!(
            grid.toroidal_neighbors(3, 3),
            [(2, 3), (0, 3), (3, 2), (3, 0)]
        );
    }

    #[test]
    fn test_neighbors_size_two_duplicates() {
        let grid = Grid::new(2).unwrap();
        let neighbors = grid.toroidal_neighbors(0, 0);
        assert_eq!(neighbors, [(1, 0), (1, 0), (0, 1), (0, 1)]);
    }

    #[test]
    fn test_neighbors_size_one() {
        let grid = Grid::new(1).unwrap();
        assert_eq!(grid.toroidal_neighbors(0, 0), [(0, 0); 4]);
    }

    #[test]
    fn test_unstable_cells() {
        let grid = Grid::from_cells(2, vec![4, 0, 3, 7]).unwrap();
        assert!(!grid.is_settled());
        assert_eq!(grid.unstable_cells(), vec![(0, 0), (1, 1)]);
        assert_eq!(grid.total_energy(), 14);
        assert_eq!(grid.max_stable_energy(), 12);
    }

    #[test]
    fn test_canonical_key_row_major() {
        let grid = Grid::from_cells(2, vec![1, 2, 3, 0]).unwrap();
        assert_eq!(&*grid.canonical_key(), &[1, 2, 3, 0]);
    }

    #[test]
    fn test_display() {
        let grid = Grid::from_cells(2, vec![1, 2, 3, 0]).unwrap();
        assert_eq!(grid.to_string(), "1 2\n3 0\n");
    }

    #[test]
    fn test_clear() {
        let mut grid = Grid::from_cells(2, vec![1, 2, 3, 0]).unwrap();
        grid.clear();
        assert_eq!(grid.cells(), &[0, 0, 0, 0]);
    }
}
