//! Avalanche summaries and the explosion log format.
//!
//! A run's avalanches are persisted as a single line of space-separated
//! `affected,energy` tokens. Each token is followed by a space and the line
//! ends with a newline; successive runs append further lines to the same file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandpileError};

/// Summary of one completed avalanche.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AvalancheEvent {
    /// Distinct cells that fired or received grains during the avalanche.
    pub affected: usize,
    /// Sum of all cells once the avalanche settled.
    pub energy: u64,
    /// Distinct cells that fired at least once.
    pub fired: usize,
    /// Total number of firings.
    pub firings: u64,
}

impl AvalancheEvent {
    /// Returns the persisted part of the event.
    pub fn log_record(&self) -> LogRecord {
        LogRecord {
            affected: self.affected as u64,
            energy: self.energy,
        }
    }
}

/// One `affected,energy` entry of an explosion log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogRecord {
    /// Affected cell count.
    pub affected: u64,
    /// Total energy after the avalanche.
    pub energy: u64,
}

/// Collects avalanche summaries in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ExplosionRecorder {
    events: Vec<AvalancheEvent>,
}

impl ExplosionRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&mut self, event: AvalancheEvent) {
        self.events.push(event);
    }

    /// Returns the recorded events, oldest first.
    pub fn events(&self) -> &[AvalancheEvent] {
        &self.events
    }

    /// Returns the most recent event.
    pub fn last(&self) -> Option<&AvalancheEvent> {
        self.events.last()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Takes all recorded events, leaving the recorder empty.
    pub fn flush(&mut self) -> Vec<AvalancheEvent> {
        std::mem::take(&mut self.events)
    }
}

// ============================================================================
// Log format
// ============================================================================

/// Formats one run as a log line.
pub fn format_run(events: &[AvalancheEvent]) -> String {
    let mut line = String::with_capacity(events.len() * 8 + 1);
    for event in events {
        line.push_str(&format!("{},{} ", event.affected, event.energy));
    }
    line.push('\n');
    line
}

/// Appends one run to a log file, creating the file if needed.
pub fn append_run(path: impl AsRef<Path>, events: &[AvalancheEvent]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    file.write_all(format_run(events).as_bytes())?;
    Ok(())
}

/// Parses one log line.
///
/// Empty tokens and tokens without exactly one comma are skipped.
pub fn parse_run(line: &str) -> Result<Vec<LogRecord>> {
    let mut records = Vec::new();
    for token in line.trim().split(' ') {
        let parts: Vec<&str> = token.split(',').collect();
        let [affected, energy] = parts.as_slice() else {
            continue;
        };
        records.push(LogRecord {
            affected: parse_field(token, affected)?,
            energy: parse_field(token, energy)?,
        });
    }
    Ok(records)
}

fn parse_field(token: &str, field: &str) -> Result<u64> {
    field.parse().map_err(|err| SandpileError::Parse {
        token: token.to_string(),
        message: format!("{err}"),
    })
}

/// Reads every run of a log file, one run per line.
pub fn read_runs(path: impl AsRef<Path>) -> Result<Vec<Vec<LogRecord>>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut runs = Vec::new();
    for line in reader.lines() {
        runs.push(parse_run(&line?)?);
    }
    Ok(runs)
}
