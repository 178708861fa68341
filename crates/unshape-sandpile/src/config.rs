//! Sandpile configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cycle::DEFAULT_HISTORY_CAPACITY;

/// Default firing budget for a single cascade.
pub const DEFAULT_MAX_FIRINGS: u64 = 10_000_000;

/// Order in which pending cells are drained during a cascade.
///
/// The settled grid and the firing count do not depend on this choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CascadeOrder {
    /// Queue: oldest pending cell first.
    #[default]
    Fifo,
    /// Stack: newest pending cell first.
    Lifo,
}

/// Configuration for creating a [`Sandpile`](crate::Sandpile).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SandpileConfig {
    /// Side length of the toroidal grid.
    pub size: usize,
    /// Number of configurations the cycle detector remembers.
    pub history_capacity: usize,
    /// Worklist discipline.
    pub order: CascadeOrder,
    /// Firings after which a cascade is abandoned. 0 = unlimited.
    pub max_firings_per_cascade: u64,
    /// Abandon a cascade as soon as it revisits a configuration.
    pub stop_on_cycle: bool,
}

impl Default for SandpileConfig {
    fn default() -> Self {
        Self {
            size: 4,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            order: CascadeOrder::Fifo,
            max_firings_per_cascade: DEFAULT_MAX_FIRINGS,
            stop_on_cycle: true,
        }
    }
}

impl SandpileConfig {
    /// Creates a default config for the given grid size.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Sets the cycle history bound.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the worklist discipline.
    pub fn with_order(mut self, order: CascadeOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the per-cascade firing budget. 0 = unlimited.
    pub fn with_max_firings(mut self, max: u64) -> Self {
        self.max_firings_per_cascade = max;
        self
    }

    /// Sets whether a detected cycle abandons the cascade.
    pub fn with_stop_on_cycle(mut self, stop: bool) -> Self {
        self.stop_on_cycle = stop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandpileConfig::default();
        assert_eq!(config.size, 4);
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.order, CascadeOrder::Fifo);
        assert!(config.stop_on_cycle);
    }

    #[test]
    fn test_builder() {
        let config = SandpileConfig::new(8)
            .with_history_capacity(3)
            .with_order(CascadeOrder::Lifo)
            .with_max_firings(0)
            .with_stop_on_cycle(false);
        assert_eq!(config.size, 8);
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.order, CascadeOrder::Lifo);
        assert_eq!(config.max_firings_per_cascade, 0);
        assert!(!config.stop_on_cycle);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_partial_config() {
        let config: SandpileConfig = serde_json::from_str(r#"{"size": 16}"#).unwrap();
        assert_eq!(config, SandpileConfig::new(16));
    }
}
