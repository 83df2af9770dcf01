//! Logging configuration and the in-memory log ring
//!
//! `LogConfig` is persisted with the settings and consumed by the binary's
//! logging setup. `LogRing` holds the most recent formatted lines for the
//! `/api/logs` endpoint.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Lines kept in the ring buffer.
pub const LOG_RING_CAPACITY: usize = 5000;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level directive (overridden by RUST_LOG)
    pub level: String,
    /// Mirror log lines to stderr
    pub console_output: bool,
    /// Write a log file under `directory`
    pub file_output: bool,
    /// Directory for log files
    pub directory: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: true,
            directory: PathBuf::from("logs"),
        }
    }
}

impl LogConfig {
    /// Parse the configured level, falling back to INFO on junk.
    pub fn parse_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }

    /// Create the log directory if needed.
    pub fn ensure_log_directory(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.directory)
    }

    /// Path of the current log file.
    pub fn current_log_path(&self) -> PathBuf {
        self.directory.join("followspot.log")
    }
}

/// Fixed-capacity ring of formatted log lines.
#[derive(Debug)]
pub struct LogRing {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(LOG_RING_CAPACITY)
    }
}

impl LogRing {
    /// Ring with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ring with an explicit capacity (tests).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append a line, evicting the oldest when full.
    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().expect("log ring poisoned");
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// The most recent `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().expect("log ring poisoned");
        lines
            .iter()
            .skip(lines.len().saturating_sub(n))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_evicts_oldest() {
        let ring = LogRing::with_capacity(3);
        for i in 0..5 {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.tail(10), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(ring.tail(1), vec!["line 4"]);
    }

    #[test]
    fn level_parse_falls_back_to_info() {
        let config = LogConfig {
            level: "noisy".into(),
            ..Default::default()
        };
        assert_eq!(config.parse_level(), tracing::Level::INFO);
        let config = LogConfig {
            level: "debug".into(),
            ..Default::default()
        };
        assert_eq!(config.parse_level(), tracing::Level::DEBUG);
    }
}
