//! Per-frame bookkeeping for the render loop.
//!
//! The host calls [`LiveMonitor::frame`](crate::LiveMonitor::frame) once per
//! animation frame. Each step:
//!
//! 1. polls channel liveness and tears down on loss
//! 2. drains the typed room event stream into the roster
//! 3. ticks the engine if connected and the busy gate is clear
//!
//! [`RenderScheduler`] holds the counters for that step. A failing tick never
//! stops the loop; failures are counted and only every `log_every`-th
//! consecutive one reaches the event log.

use crate::constants::TICK_ERROR_LOG_INTERVAL;
use crate::error::TickError;

/// Result of one frame step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The engine ticked successfully.
    Rendered,
    /// No connected session.
    SkippedDisconnected,
    /// The busy gate was held.
    SkippedBusy,
    /// The tick failed; the loop continues.
    TickFailed(TickError),
    /// The channel was found closed; the monitor tore everything down.
    ConnectionLost,
}

/// Frame and tick failure counters.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    log_every: u32,
    consecutive_failures: u32,
    frames: u64,
    last_timestamp_ms: Option<f64>,
}

impl RenderScheduler {
    /// Create a scheduler logging every `log_every`-th consecutive failure.
    ///
    /// A value of zero is treated as one.
    pub fn new(log_every: u32) -> Self {
        Self {
            log_every: log_every.max(1),
            consecutive_failures: 0,
            frames: 0,
            last_timestamp_ms: None,
        }
    }

    /// Note the timestamp of a frame step.
    pub fn begin_frame(&mut self, timestamp_ms: f64) {
        self.last_timestamp_ms = Some(timestamp_ms);
    }

    /// Record a successful tick.
    pub fn record_success(&mut self) {
        self.frames += 1;
        self.consecutive_failures = 0;
    }

    /// Record a failed tick. Returns true if this failure should be logged.
    pub fn record_failure(&mut self, error: &TickError) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        log::debug!(
            "Tick failure #{} in a row: {error}",
            self.consecutive_failures
        );
        self.consecutive_failures % self.log_every == 0
    }

    /// Forget the failure streak (new session).
    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Current run of consecutive failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Successful ticks since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Timestamp of the most recent frame step.
    pub fn last_timestamp_ms(&self) -> Option<f64> {
        self.last_timestamp_ms
    }

    /// Configured logging interval.
    pub fn log_every(&self) -> u32 {
        self.log_every
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(TICK_ERROR_LOG_INTERVAL)
    }
}
