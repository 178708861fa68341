//! Abelian sandpile automaton on a toroidal grid.
//!
//! Grains are dropped on cells; a cell holding four or more grains fires,
//! giving one grain to each of its four wrapped neighbors, which may fire in
//! turn. Every firing is checked against a bounded history of configurations
//! so that cascades which can never settle are recognized.
//!
//! - [`Grid`] - toroidal grid and neighbor model
//! - [`Sandpile`] - grain addition and avalanche propagation
//! - [`CycleDetector`] - bounded, insertion-ordered configuration history
//! - [`ExplosionRecorder`] - ordered log of avalanche summaries
//! - [`RandomDriver`] - seeded driver dropping grains on random cells
//!
//! # Example
//!
//! ```
//! use unshape_sandpile::{RandomDriver, Sandpile, format_run};
//!
//! let mut pile = Sandpile::new(16).unwrap();
//! let mut driver = RandomDriver::new(42);
//! driver.start();
//! driver.run(&mut pile, 200).unwrap();
//!
//! assert!(pile.grid().is_settled());
//! let line = format_run(&pile.flush_explosions());
//! assert!(line.ends_with('\n'));
//! ```

mod config;
mod cycle;
mod driver;
mod error;
mod grid;
mod recorder;
mod topple;

pub use config::{CascadeOrder, DEFAULT_MAX_FIRINGS, SandpileConfig};
pub use cycle::{CycleCheck, CycleDetector, CycleRecord, DEFAULT_HISTORY_CAPACITY};
pub use driver::{RandomDriver, RunSummary};
pub use error::{Result, SandpileError, UnsettledReason};
pub use grid::{ConfigKey, Grid, MAX_STABLE, THRESHOLD};
pub use recorder::{
    AvalancheEvent, ExplosionRecorder, LogRecord, append_run, format_run, parse_run, read_runs,
};
pub use topple::{Firing, FiringObserver, Sandpile, SandpileStatus};

// ============================================================================
// Invariant tests - properties that must hold for every reachable state
// ============================================================================
