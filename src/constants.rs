//! Application-wide constants for live-monitor.
//!
//! Centralizes the magic numbers shared by the orchestrator, the headless
//! session and the CLI. Constants are grouped by domain.
//!
//! # Categories
//!
//! - **Diagnostics**: event log capacity and tick error throttling
//! - **Channel**: control-channel endpoint and room id limits
//! - **Frames**: native frame pacing
//! - **Resources**: default resource pack contents

use std::time::Duration;

// ============================================================================
// Diagnostics
// ============================================================================

/// Maximum number of entries retained by the [`EventLog`](crate::EventLog).
///
/// Appends beyond this evict the oldest entry.
pub const EVENT_LOG_CAPACITY: usize = 500;

/// Consecutive tick failures between two logged tick errors.
///
/// At ~60 frames per second this is about one entry per second of breakage.
pub const TICK_ERROR_LOG_INTERVAL: u32 = 60;

// ============================================================================
// Channel
// ============================================================================

/// Path of the live control-channel WebSocket on the relay server.
pub const LIVE_WS_PATH: &str = "/ws/live";

/// Default relay server URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3080";

/// Maximum length of a room id.
pub const ROOM_ID_MAX_LEN: usize = 20;

// ============================================================================
// Frames
// ============================================================================

/// Native frame pacing delay (approximately 60fps).
///
/// Used by the headless CLI in place of `requestAnimationFrame`.
pub const FRAME_RATE_DELAY: Duration = Duration::from_millis(16);

/// How often the CLI prints a roster/scene summary.
pub const STATUS_PRINT_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// Resources
// ============================================================================

/// Files making up the default resource pack.
///
/// `info.yml` describes the pack; the PNGs are the note skins (with their
/// multi-hit `_mh` variants) and the hit effect sprite sheet.
pub const DEFAULT_RESOURCE_FILES: &[&str] = &[
    "info.yml",
    "click.png",
    "hold.png",
    "flick.png",
    "drag.png",
    "click_mh.png",
    "hold_mh.png",
    "flick_mh.png",
    "drag_mh.png",
    "hit_fx.png",
];
