//! Explicit logging sinks.
//!
//! Analysis components receive a `&dyn LogSink` instead of writing to a
//! process-wide logger. The binary passes [`LogFacade`], which forwards to the
//! `log` crate; tests pass a [`LogCollector`] and inspect what was recorded.

use log::Level;
use std::sync::Mutex;

/// Destination for diagnostic messages emitted during an analysis.
pub trait LogSink: Send + Sync {
    /// Record a message at the given level.
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Forwards every message to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "compositional_da", level, "{}", message);
    }
}

/// A single recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Collects messages in memory.
#[derive(Debug, Default)]
pub struct LogCollector {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries in arrival order.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages recorded at warning level.
    pub fn warnings(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == Level::Warn)
            .map(|e| e.message)
            .collect()
    }

    /// Check whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for LogCollector {
    fn log(&self, level: Level, message: &str) {
        let entry = LogEntry {
            level,
            message: message.to_string(),
        };
        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
