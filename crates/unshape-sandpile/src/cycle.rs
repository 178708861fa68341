//! Detection of repeated grid configurations.
//!
//! The detector remembers the iteration at which each configuration was first
//! seen. Memory is bounded: once the history holds `capacity` entries the
//! oldest inserted entry is evicted, regardless of how recently it was looked
//! up. A configuration that was evicted before it recurs is treated as new.

use std::collections::{HashMap, VecDeque};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandpileError};
use crate::grid::{ConfigKey, Grid};

/// Default number of configurations remembered.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Outcome of a single [`CycleDetector::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleCheck {
    /// True if the configuration was already in the history.
    pub detected: bool,
    /// Iterations since the first sighting, or 0 when nothing was detected.
    pub cycle_length: u64,
}

/// Most recent cycle detection.
///
/// Stays in place until a later detection overwrites it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CycleRecord {
    /// True once any cycle has been detected.
    pub detected: bool,
    /// Iteration at which the repeated configuration was first seen.
    pub cycle_start_iteration: u64,
    /// Iterations between the first sighting and the repeat.
    pub cycle_length: u64,
}

/// Bounded, insertion-ordered history of grid configurations.
#[derive(Debug, Clone)]
pub struct CycleDetector {
    /// Configuration -> iteration of first sighting.
    seen: HashMap<ConfigKey, u64>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<ConfigKey>,
    /// Maximum number of remembered configurations.
    capacity: usize,
    /// Last detection.
    record: CycleRecord,
}

impl CycleDetector {
    /// Creates a detector remembering [`DEFAULT_HISTORY_CAPACITY`] configurations.
    pub fn new() -> Self {
        Self::build(DEFAULT_HISTORY_CAPACITY)
    }

    /// Creates a detector with a custom history bound.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SandpileError::InvalidCapacity(capacity));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            seen: HashMap::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
            capacity,
            record: CycleRecord::default(),
        }
    }

    /// Checks a grid against the history, recording it if it is new.
    pub fn check(&mut self, grid: &Grid, iteration: u64) -> CycleCheck {
        self.check_key(grid.canonical_key(), iteration)
    }

    /// Checks a canonical key against the history, recording it if it is new.
    pub fn check_key(&mut self, key: ConfigKey, iteration: u64) -> CycleCheck {
        if let Some(&start) = self.seen.get(&key) {
            let cycle_length = iteration.saturating_sub(start);
            self.record = CycleRecord {
                detected: true,
                cycle_start_iteration: start,
                cycle_length,
            };
            return CycleCheck {
                detected: true,
                cycle_length,
            };
        }

        self.seen.insert(key.clone(), iteration);
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        CycleCheck {
            detected: false,
            cycle_length: 0,
        }
    }

    /// Returns the last detection.
    pub fn record(&self) -> &CycleRecord {
        &self.record
    }

    /// Returns true if the grid's configuration is currently remembered.
    pub fn contains(&self, grid: &Grid) -> bool {
        self.seen.contains_key(grid.cells())
    }

    /// Returns the iteration at which the grid's configuration was first seen.
    pub fn first_seen(&self, grid: &Grid) -> Option<u64> {
        self.seen.get(grid.cells()).copied()
    }

    /// Returns the number of remembered configurations.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the history bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets all configurations and the last detection.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
        self.record = CycleRecord::default();
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: &[u32]) -> Grid {
        Grid::from_cells(2, values.to_vec()).unwrap()
    }

    #[test]
    fn test_new_configuration_not_detected() {
        let mut detector = CycleDetector::new();
        let check = detector.check(&grid(&[0, 1, 2, 3]), 5);
        assert!(!check.detected);
        assert_eq!(check.cycle_length, 0);
        assert_eq!(detector.len(), 1);
        assert_eq!(detector.first_seen(&grid(&[0, 1, 2, 3])), Some(5));
        assert!(!detector.record().detected);
    }

    #[test]
    fn test_repeat_detected_with_length() {
        let mut detector = CycleDetector::new();
        detector.check(&grid(&[0, 1, 2, 3]), 3);
        detector.check(&grid(&[1, 1, 2, 3]), 4);
        let check = detector.check(&grid(&[0, 1, 2, 3]), 10);

        assert!(check.detected);
        assert_eq!(check.cycle_length, 7);
        assert_eq!(
            *detector.record(),
            CycleRecord {
                detected: true,
                cycle_start_iteration: 3,
                cycle_length: 7,
            }
        );
    }

    #[test]
    fn test_repeat_keeps_first_iteration() {
        let mut detector = CycleDetector::new();
        let g = grid(&[2, 2, 2, 2]);
        detector.check(&g, 1);
        detector.check(&g, 4);
        let check = detector.check(&g, 9);

        assert_eq!(check.cycle_length, 8);
        assert_eq!(detector.first_seen(&g), Some(1));
        assert_eq!(detector.len(), 1);
    }

    #[test]
    fn test_record_persists_until_next_detection() {
        let mut detector = CycleDetector::new();
        detector.check(&grid(&[0, 0, 0, 1]), 1);
        detector.check(&grid(&[0, 0, 0, 1]), 3);
        detector.check(&grid(&[0, 0, 1, 1]), 4);

        let record = *detector.record();
        assert!(record.detected);
        assert_eq!(record.cycle_start_iteration, 1);
        assert_eq!(record.cycle_length, 2);
    }

    #[test]
    fn test_eviction_is_insertion_ordered() {
        let mut detector = CycleDetector::with_capacity(3).unwrap();
        let a = grid(&[1, 0, 0, 0]);
        let b = grid(&[0, 1, 0, 0]);
        let c = grid(&[0, 0, 1, 0]);
        let d = grid(&[0, 0, 0, 1]);

        detector.check(&a, 0);
        detector.check(&b, 1);
        detector.check(&c, 2);
        // Looking up `a` does not refresh it.
        assert!(detector.check(&a, 3).detected);
        detector.check(&d, 4);

        assert_eq!(detector.len(), 3);
        assert!(!detector.contains(&a));
        assert!(detector.contains(&b));
        assert!(detector.contains(&c));
        assert!(detector.contains(&d));
    }

    #[test]
    fn test_evicted_configuration_not_detected() {
        let mut detector = CycleDetector::with_capacity(3).unwrap();
        let a = grid(&[1, 0, 0, 0]);
        detector.check(&a, 0);
        detector.check(&grid(&[0, 1, 0, 0]), 1);
        detector.check(&grid(&[0, 0, 1, 0]), 2);
        detector.check(&grid(&[0, 0, 0, 1]), 3);

        let check = detector.check(&a, 4);
        assert!(!check.detected);
        assert_eq!(detector.first_seen(&a), Some(4));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            CycleDetector::with_capacity(0),
            Err(SandpileError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_clear() {
        let mut detector = CycleDetector::new();
        let g = grid(&[3, 3, 3, 3]);
        detector.check(&g, 1);
        detector.check(&g, 2);
        detector.clear();

        assert!(detector.is_empty());
        assert_eq!(*detector.record(), CycleRecord::default());
        assert!(!detector.check(&g, 3).detected);
    }
}
