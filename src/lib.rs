//! Live Monitor - session and scene lifecycle orchestration.
//!
//! This crate drives live spectating of a multiplayer rhythm-game room:
//! one control channel to the relay server, a roster of the players in the
//! joined room, and any number of independent per-player render scenes.
//!
//! # Architecture
//!
//! The crate follows a single-orchestrator pattern:
//!
//! - **LiveMonitor** - owns every component below, injected with an [`Engine`]
//! - **ConnectionManager** - control-channel state machine and liveness
//! - **RoomRosterTracker** - room membership derived from typed channel events
//! - **SceneRegistry** - per-player scene handles and their phase machine
//! - **ResizeCoordinator** - surface/engine size sync, gated by the [`BusyGate`]
//! - **RenderScheduler** - per-frame step and tick error throttling
//! - **EventLog** - bounded diagnostic record mirrored to the `log` facade
//!
//! Rendering, chart playback and audio live in the external engine and are
//! only reached through the [`engine`] capability traits.
//!
//! # Modules
//!
//! - [`monitor`] - the orchestrator
//! - [`engine`] - capability traits consumed from the rendering engine
//! - [`protocol`] - typed control-channel commands and events
//! - [`config`] - configuration loading
//! - [`headless`] - native `tokio-tungstenite` session (not on wasm32)

pub mod busy_gate;
pub mod config;
pub mod connection;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod monitor;
pub mod protocol;
pub mod resize;
pub mod resource_pack;
pub mod roster;
pub mod scene;
pub mod scheduler;

#[cfg(not(target_arch = "wasm32"))]
pub mod headless;
#[cfg(not(target_arch = "wasm32"))]
pub mod ws;

// Re-export commonly used types
pub use busy_gate::{BusyGate, BusyGuard};
pub use config::{ConfigError, MonitorConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use engine::{AuthContext, Endpoint, Engine, LiveSession, RenderSurface};
pub use error::{
    ChannelError, ConnectionError, InvalidRoomId, MonitorError, ResourceLoadError, SceneError,
    TickError,
};
pub use event_log::{EventLog, EventLogEntry, Severity};
pub use monitor::{AttachOutcome, LiveMonitor, MonitorStatus, SceneStatus};
pub use protocol::{ControlCommand, PlayerId, RenderTargetId, RoomEvent, RoomId, RoomPhase};
pub use resize::{ResizeCoordinator, ResizeDecision, SurfaceSize};
pub use resource_pack::{HttpResourceFetcher, ResourceFetcher, ResourcePack, ResourcePackCache};
pub use roster::{RoomInfo, RoomRoster, RoomRosterTracker, RoomUser, SceneEffect};
pub use scene::{AttachTransition, SceneHandle, ScenePhase, SceneRegistry};
pub use scheduler::{FrameOutcome, RenderScheduler};
