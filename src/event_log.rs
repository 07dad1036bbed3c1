//! Bounded diagnostic event log.
//!
//! Every significant transition in the monitor (connect, join, scene
//! lifecycle, load failures, throttled tick errors) is appended here with a
//! severity. When the log is full, appending silently evicts the oldest
//! entry. Memory usage is bounded at `capacity` entries regardless of how
//! long the monitor runs.
//!
//! Each append is also forwarded to the `log` facade at the matching level,
//! so host logs (env_logger, browser console) carry the same record.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::EVENT_LOG_CAPACITY;

/// Severity of an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine transition.
    Info,
    /// Rejected request or degraded state.
    Warn,
    /// Failure of a subsystem.
    Error,
}

impl Severity {
    /// Matching `log` level.
    pub fn level(self) -> log::Level {
        match self {
            Severity::Info => log::Level::Info,
            Severity::Warn => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogEntry {
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

/// Fixed-capacity FIFO of [`EventLogEntry`].
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
}

impl EventLog {
    /// Create a new log holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "EventLog capacity must be > 0");
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Create a log with [`EVENT_LOG_CAPACITY`] (500) entries.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(EVENT_LOG_CAPACITY)
    }

    /// Append an entry, evicting the oldest entries if over capacity.
    pub fn append(&mut self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        log::log!(target: "live_monitor::events", severity.level(), "{message}");

        self.entries.push_back(EventLogEntry {
            timestamp: Utc::now(),
            message,
            severity,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Append an [`Severity::Info`] entry.
    pub fn info(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Info);
    }

    /// Append a [`Severity::Warn`] entry.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Warn);
    }

    /// Append a [`Severity::Error`] entry.
    pub fn error(&mut self, message: impl Into<String>) {
        self.append(message, Severity::Error);
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    /// Copy of all entries, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<EventLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Most recent entry, if any.
    #[must_use]
    pub fn last(&self) -> Option<&EventLogEntry> {
        self.entries.back()
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard all entries without changing capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Configured maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
