//! Grain addition and avalanche propagation.
//!
//! A [`Sandpile`] owns the grid, the firing counter, the cycle detector and
//! the explosion recorder for one session. Every grain addition runs its
//! cascade to completion before returning.

use std::collections::{HashSet, VecDeque};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::{CascadeOrder, SandpileConfig};
use crate::cycle::{CycleCheck, CycleDetector, CycleRecord};
use crate::error::{Result, SandpileError, UnsettledReason};
use crate::grid::{Grid, THRESHOLD};
use crate::recorder::{AvalancheEvent, ExplosionRecorder};

/// A single firing, as seen by a [`FiringObserver`].
#[derive(Debug, Clone, Copy)]
pub struct Firing<'a> {
    /// Row of the fired cell.
    pub row: usize,
    /// Column of the fired cell.
    pub col: usize,
    /// Value of the cell just before it fired.
    pub old_value: u32,
    /// Iteration counter after this firing.
    pub iteration: u64,
    /// Result of the cycle check made after this firing.
    pub cycle: CycleCheck,
    /// Grid after the firing.
    pub grid: &'a Grid,
}

/// Receives every firing of a cascade, e.g. to animate it.
pub trait FiringObserver {
    /// Called once per firing, after neighbors were updated and checked.
    fn on_firing(&mut self, firing: &Firing<'_>);
}

impl<F> FiringObserver for F
where
    F: FnMut(&Firing<'_>),
{
    fn on_firing(&mut self, firing: &Firing<'_>) {
        self(firing)
    }
}

/// Read-only summary for visualizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SandpileStatus {
    /// Firings since the session started.
    pub iteration: u64,
    /// Sum of all cells.
    pub energy: u64,
    /// Last cycle detection.
    pub cycle: CycleRecord,
    /// True if every cell is below the threshold.
    pub settled: bool,
    /// Avalanches recorded and not yet flushed.
    pub pending_avalanches: usize,
}

/// Abelian sandpile on a toroidal grid.
///
/// # Example
///
/// ```
/// use unshape_sandpile::Sandpile;
///
/// let mut pile = Sandpile::new(2).unwrap();
/// for _ in 0..3 {
///     assert!(pile.add_grain(0, 0).unwrap().is_none());
/// }
///
/// let avalanche = pile.add_grain(0, 0).unwrap().unwrap();
/// assert_eq!(avalanche.firings, 1);
/// assert_eq!(pile.grid().cells(), &[0, 2, 2, 0]);
/// assert_eq!(pile.iteration(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Sandpile {
    /// Cell values.
    grid: Grid,
    /// Settings fixed at construction.
    config: SandpileConfig,
    /// Firings since the session started.
    iteration: u64,
    /// History of configurations seen after each firing.
    detector: CycleDetector,
    /// Completed avalanches awaiting flush.
    recorder: ExplosionRecorder,
    /// True while the grid may hold cells at or above the threshold.
    unstable: bool,
}

impl Sandpile {
    /// Creates an empty sandpile with default settings.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(SandpileConfig::new(size))
    }

    /// Creates an empty sandpile.
    pub fn with_config(config: SandpileConfig) -> Result<Self> {
        let grid = Grid::new(config.size)?;
        Self::from_grid(grid, config)
    }

    /// Creates a sandpile from row-major cell values of a `config.size` grid.
    ///
    /// The values may include unstable cells; call [`Sandpile::stabilize`]
    /// to topple them, or let the next grain addition do it.
    pub fn from_cells(config: SandpileConfig, cells: Vec<u32>) -> Result<Self> {
        let grid = Grid::from_cells(config.size, cells)?;
        Self::from_grid(grid, config)
    }

    fn from_grid(grid: Grid, config: SandpileConfig) -> Result<Self> {
        let detector = CycleDetector::with_capacity(config.history_capacity)?;
        let unstable = !grid.is_settled();
        Ok(Self {
            grid,
            config,
            iteration: 0,
            detector,
            recorder: ExplosionRecorder::new(),
            unstable,
        })
    }

    /// Returns the grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SandpileConfig {
        &self.config
    }

    /// Returns the number of firings since the session started.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Returns the last cycle detection.
    pub fn cycle(&self) -> &CycleRecord {
        self.detector.record()
    }

    /// Returns the cycle detector.
    pub fn detector(&self) -> &CycleDetector {
        &self.detector
    }

    /// Returns the recorded avalanches.
    pub fn recorder(&self) -> &ExplosionRecorder {
        &self.recorder
    }

    /// Returns the sum of all cells.
    pub fn total_energy(&self) -> u64 {
        self.grid.total_energy()
    }

    /// Returns true if no cell is at or above the threshold.
    pub fn is_settled(&self) -> bool {
        !self.unstable
    }

    /// Returns a snapshot of the counters for display.
    pub fn status(&self) -> SandpileStatus {
        SandpileStatus {
            iteration: self.iteration,
            energy: self.grid.total_energy(),
            cycle: *self.detector.record(),
            settled: !self.unstable,
            pending_avalanches: self.recorder.len(),
        }
    }

    /// Takes all recorded avalanches, oldest first.
    pub fn flush_explosions(&mut self) -> Vec<AvalancheEvent> {
        self.recorder.flush()
    }

    /// Adds one grain to a cell and topples until the grid settles.
    ///
    /// Returns the avalanche summary if the grain started one.
    pub fn add_grain(&mut self, row: usize, col: usize) -> Result<Option<AvalancheEvent>> {
        self.add_grain_observed(row, col, &mut |_: &Firing<'_>| {})
    }

    /// Like [`Sandpile::add_grain`], reporting every firing to `observer`.
    pub fn add_grain_observed<O>(
        &mut self,
        row: usize,
        col: usize,
        observer: &mut O,
    ) -> Result<Option<AvalancheEvent>>
    where
        O: FiringObserver + ?Sized,
    {
        if !self.grid.contains(row, col) {
            return Err(SandpileError::OutOfBounds {
                row,
                col,
                size: self.grid.size(),
            });
        }

        let value = self.grid.increment(row, col);
        if self.unstable {
            // Leftovers of an abandoned cascade or of unstable initial cells.
            let seeds = self.grid.unstable_cells();
            return self.cascade(seeds, observer).map(Some);
        }
        if value < THRESHOLD {
            return Ok(None);
        }
        self.cascade(vec![(row, col)], observer).map(Some)
    }

    /// Topples every unstable cell.
    ///
    /// Returns `None` if the grid was already settled.
    pub fn stabilize(&mut self) -> Result<Option<AvalancheEvent>> {
        self.stabilize_observed(&mut |_: &Firing<'_>| {})
    }

    /// Like [`Sandpile::stabilize`], reporting every firing to `observer`.
    pub fn stabilize_observed<O>(&mut self, observer: &mut O) -> Result<Option<AvalancheEvent>>
    where
        O: FiringObserver + ?Sized,
    {
        let seeds = self.grid.unstable_cells();
        if seeds.is_empty() {
            self.unstable = false;
            return Ok(None);
        }
        self.cascade(seeds, observer).map(Some)
    }

    /// Empties the grid and the cycle history.
    ///
    /// The iteration counter and unflushed avalanches are kept.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.detector.clear();
        self.unstable = false;
    }

    fn cascade<O>(&mut self, seeds: Vec<(usize, usize)>, observer: &mut O) -> Result<AvalancheEvent>
    where
        O: FiringObserver + ?Sized,
    {
        let order = self.config.order;
        let budget = self.config.max_firings_per_cascade;
        let mut worklist: VecDeque<(usize, usize)> = seeds.into();
        let mut affected = HashSet::new();
        let mut fired = HashSet::new();
        let mut firings = 0u64;
        self.unstable = true;

        while let Some((row, col)) = pop(&mut worklist, order) {
            let old_value = self.grid.value(row, col);
            if old_value < THRESHOLD {
                continue;
            }

            if self.grid.discharge(row, col) >= THRESHOLD {
                worklist.push_back((row, col));
            }
            affected.insert((row, col));
            fired.insert((row, col));
            self.iteration += 1;
            firings += 1;

            for (nr, nc) in self.grid.toroidal_neighbors(row, col) {
                affected.insert((nr, nc));
                if self.grid.increment(nr, nc) == THRESHOLD {
                    worklist.push_back((nr, nc));
                }
            }

            let cycle = self.detector.check(&self.grid, self.iteration);
            trace!(row, col, old_value, iteration = self.iteration, "fired");
            observer.on_firing(&Firing {
                row,
                col,
                old_value,
                iteration: self.iteration,
                cycle,
                grid: &self.grid,
            });

            if cycle.detected {
                let record = *self.detector.record();
                info!(
                    iteration = self.iteration,
                    start = record.cycle_start_iteration,
                    length = record.cycle_length,
                    "configuration cycle detected"
                );
                if self.config.stop_on_cycle {
                    return Err(self.abandon(
                        firings,
                        UnsettledReason::Cycle {
                            start: record.cycle_start_iteration,
                            length: record.cycle_length,
                        },
                    ));
                }
            }

            if budget > 0 && firings >= budget && !worklist.is_empty() {
                return Err(self.abandon(firings, UnsettledReason::FiringBudget(budget)));
            }
        }

        self.unstable = false;
        let event = AvalancheEvent {
            affected: affected.len(),
            energy: self.grid.total_energy(),
            fired: fired.len(),
            firings,
        };
        debug!(
            affected = event.affected,
            fired = event.fired,
            firings = event.firings,
            energy = event.energy,
            "avalanche settled"
        );
        self.recorder.record(event);
        Ok(event)
    }

    fn abandon(&mut self, firings: u64, reason: UnsettledReason) -> SandpileError {
        warn!(
            firings,
            energy = self.grid.total_energy(),
            max_stable = self.grid.max_stable_energy(),
            %reason,
            "abandoning cascade"
        );
        SandpileError::Unsettled { firings, reason }
    }
}

fn pop(worklist: &mut VecDeque<(usize, usize)>, order: CascadeOrder) -> Option<(usize, usize)> {
    match order {
        CascadeOrder::Fifo => worklist.pop_front(),
        CascadeOrder::Lifo => worklist.pop_back(),
    }
}
