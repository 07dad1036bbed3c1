//! Capability surface consumed from the rendering engine.
//!
//! The monitor never draws, decodes charts, or plays audio itself. It talks
//! to an engine through two narrow traits:
//!
//! ```text
//! Engine (factory)
//!     │ construct(endpoint)
//!     ▼
//! LiveSession (one control channel + every per-player scene)
//!     ├── control:  handshake, join_room, leave_room, poll_events, close
//!     ├── liveness: is_connected
//!     ├── scenes:   create_scene, attach_canvas, detach_canvas, destroy_scene,
//!     │             resize_scene, load_scene_resource_pack
//!     └── frame:    tick, resume_audio
//! ```
//!
//! Everything runs on the host's single event loop, so the traits are
//! `?Send` and sessions are shared as `Rc<dyn LiveSession>`. All session
//! methods take `&self`; implementations keep their own interior state.

// Rust guideline compliant 2026-02

use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ChannelError, ConnectionError, ResourceLoadError, SceneError, TickError};
use crate::protocol::{PlayerId, RenderTargetId, RoomEvent, RoomId};
use crate::resource_pack::ResourcePack;

/// Where the control channel lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Full WebSocket URL, including the auth query.
    pub ws_url: String,
    /// Base URL for REST calls (chart fetching inside the engine).
    pub api_base: String,
}

/// Credentials presented to the relay.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    token: String,
}

impl AuthContext {
    /// Wrap a session token. Returns `None` for an empty token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self { token })
        }
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A drawable surface bound to one scene (a `<canvas>` in the browser).
pub trait RenderSurface {
    /// Set the backing pixel buffer size.
    fn set_buffer_size(&self, width: u32, height: u32);
}

/// Factory for live sessions.
pub trait Engine {
    /// Construct a session for `endpoint`.
    ///
    /// Construction is synchronous and only fails on immediately detectable
    /// problems (malformed URL, engine unavailable). The channel itself comes
    /// up asynchronously; see [`LiveSession::handshake`].
    fn construct(&self, endpoint: &Endpoint) -> Result<Rc<dyn LiveSession>, ConnectionError>;
}

/// One control channel to the relay plus every scene rendered through it.
#[async_trait(?Send)]
pub trait LiveSession {
    /// Resolve once the channel is open and usable.
    async fn handshake(&self) -> Result<(), ConnectionError>;

    /// Ask the relay to join a room. Fire-and-forget: the outcome arrives as
    /// a [`RoomEvent`].
    fn join_room(&self, room_id: &RoomId) -> Result<(), ChannelError>;

    /// Ask the relay to leave the current room.
    fn leave_room(&self) -> Result<(), ChannelError>;

    /// Drain room events received since the last call, oldest first.
    fn poll_events(&self) -> Vec<RoomEvent>;

    /// Advance and draw every ready scene for `timestamp_ms`.
    fn tick(&self, timestamp_ms: f64) -> Result<(), TickError>;

    /// Whether the underlying channel is still open.
    fn is_connected(&self) -> bool;

    /// Close the channel. Idempotent.
    fn close(&self) -> Result<(), ChannelError>;

    /// Create the engine-side scene for a player.
    fn create_scene(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError>;

    /// Bind the scene to the drawable surface identified by `target`.
    fn attach_canvas(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError>;

    /// Tear down the engine-side scene.
    fn destroy_scene(&self, player: PlayerId) -> Result<(), SceneError>;

    /// Unbind the drawable surface, freeing GPU and audio resources.
    fn detach_canvas(&self, player: PlayerId) -> Result<(), SceneError>;

    /// Upload the shared resource pack into a scene.
    async fn load_scene_resource_pack(
        &self,
        player: PlayerId,
        pack: Arc<ResourcePack>,
    ) -> Result<(), ResourceLoadError>;

    /// Inform the scene of its new dimensions. Only valid after attach.
    fn resize_scene(&self, player: PlayerId, width: u32, height: u32) -> Result<(), SceneError>;

    /// Resume the audio context.
    ///
    /// Browsers only honor this inside a user-gesture handler; call it
    /// synchronously from the gesture, before creating the scene.
    fn resume_audio(&self);
}
