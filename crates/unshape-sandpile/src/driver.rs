//! Randomized grain driver.
//!
//! Drops grains on uniformly random cells. Stopping only prevents further
//! ticks; a cascade that has started always runs to completion.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::error::Result;
use crate::recorder::AvalancheEvent;
use crate::topple::Sandpile;

/// Summary of a [`RandomDriver::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Grains dropped.
    pub ticks: u64,
    /// Grains that started an avalanche.
    pub avalanches: u64,
}

/// Seeded driver that drops grains on random cells.
#[derive(Debug, Clone)]
pub struct RandomDriver {
    rng: StdRng,
    running: bool,
}

impl RandomDriver {
    /// Creates a stopped driver.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            running: false,
        }
    }

    /// Allows [`RandomDriver::tick`] to drop grains.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Prevents further ticks.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Returns true while started.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Picks a random cell of the pile's grid.
    pub fn pick_cell(&mut self, pile: &Sandpile) -> (usize, usize) {
        let size = pile.grid().size();
        (self.rng.random_range(0..size), self.rng.random_range(0..size))
    }

    /// Drops one grain on a random cell, whether or not the driver is running.
    pub fn single_step(&mut self, pile: &mut Sandpile) -> Result<Option<AvalancheEvent>> {
        let (row, col) = self.pick_cell(pile);
        pile.add_grain(row, col)
    }

    /// Drops one grain if the driver is running.
    ///
    /// Returns `Ok(None)` without touching the pile when stopped.
    pub fn tick(&mut self, pile: &mut Sandpile) -> Result<Option<AvalancheEvent>> {
        if !self.running {
            return Ok(None);
        }
        self.single_step(pile)
    }

    /// Ticks until stopped or `max_ticks` grains have been dropped.
    ///
    /// An error stops the driver and is returned.
    pub fn run(&mut self, pile: &mut Sandpile, max_ticks: u64) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        while self.running && summary.ticks < max_ticks {
            let outcome = self.tick(pile);
            summary.ticks += 1;
            match outcome {
                Ok(Some(_)) => summary.avalanches += 1,
                Ok(None) => {}
                Err(err) => {
                    warn!(ticks = summary.ticks, error = %err, "random driver stopped");
                    self.stop();
                    return Err(err);
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandpileError;

    #[test]
    fn test_stopped_driver_does_nothing() {
        let mut pile = Sandpile::new(4).unwrap();
        let mut driver = RandomDriver::new(7);

        assert!(!driver.is_running());
        assert!(driver.tick(&mut pile).unwrap().is_none());
        assert_eq!(driver.run(&mut pile, 100).unwrap(), RunSummary::default());
        assert_eq!(pile.total_energy(), 0);
    }

    #[test]
    fn test_single_step_ignores_run_state() {
        let mut pile = Sandpile::new(4).unwrap();
        let mut driver = RandomDriver::new(7);
        driver.single_step(&mut pile).unwrap();
        assert_eq!(pile.total_energy(), 1);
    }

    #[test]
    fn test_run_adds_grains() {
        // 16x16 torus: fewer grains than twice the cell count always settle.
        let mut pile = Sandpile::new(16).unwrap();
        let mut driver = RandomDriver::new(12345);
        driver.start();

        let summary = driver.run(&mut pile, 400).unwrap();
        assert_eq!(summary.ticks, 400);
        assert_eq!(pile.total_energy(), 400);
        assert!(pile.grid().is_settled());
        assert_eq!(summary.avalanches, pile.recorder().len() as u64);
        assert!(driver.is_running());
    }

    #[test]
    fn test_same_seed_same_history() {
        let mut a = Sandpile::new(8).unwrap();
        let mut b = Sandpile::new(8).unwrap();
        let mut da = RandomDriver::new(99);
        let mut db = RandomDriver::new(99);
        da.start();
        db.start();

        da.run(&mut a, 100).unwrap();
        db.run(&mut b, 100).unwrap();
        assert_eq!(a.grid(), b.grid());
        assert_eq!(a.recorder().events(), b.recorder().events());
    }

    #[test]
    fn test_error_stops_driver() {
        let mut pile = Sandpile::new(1).unwrap();
        let mut driver = RandomDriver::new(1);
        driver.start();

        let err = driver.run(&mut pile, 10).unwrap_err();
        assert!(matches!(err, SandpileError::Unsettled { .. }));
        assert!(!driver.is_running());
        assert_eq!(pile.total_energy(), 4);
    }
}
