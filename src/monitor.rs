//! The live monitor orchestrator.
//!
//! [`LiveMonitor`] owns every lifecycle component and is the only thing the
//! host talks to. It is constructed with an injected [`Engine`]; there are no
//! process-wide singletons.
//!
//! # Architecture
//!
//! ```text
//! host (UI / CLI)
//!     │ connect / join_room / add_scene / attach_render_target / frame
//!     ▼
//! LiveMonitor ── Rc<RefCell<MonitorState>> ──┬── ConnectionManager ── Rc<dyn LiveSession>
//!     │                                      ├── RoomRosterTracker
//!     ├── BusyGate (global)                  ├── SceneRegistry
//!     └── ResourcePackCache                  ├── ResizeCoordinator
//!                                            ├── RenderScheduler
//!                                            └── EventLog
//! ```
//!
//! # Concurrency
//!
//! Everything runs on one cooperative event loop. The handle is cheap to
//! clone; async operations (connect, resource loads) release the state borrow
//! before every await, so frames keep running while they are pending. A load
//! whose scene was removed in the meantime completes, then its result is
//! discarded because the `(player, render target)` pair is no longer live.
//! Teardown resets the busy gate, so such a load never blocks the frames of
//! a later session.

// Rust guideline compliant 2026-02

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;

use crate::busy_gate::BusyGate;
use crate::config::MonitorConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::engine::{AuthContext, Endpoint, Engine, LiveSession, RenderSurface};
use crate::error::{ConnectionError, MonitorError, ResourceLoadError, SceneError};
use crate::event_log::{EventLog, EventLogEntry, Severity};
use crate::protocol::{PlayerId, RenderTargetId, RoomEvent, RoomId};
use crate::resize::{ResizeCoordinator, ResizeDecision, SurfaceSize};
use crate::resource_pack::{ResourceFetcher, ResourcePack, ResourcePackCache};
use crate::roster::{RoomInfo, RoomRosterTracker, RoomUser, SceneEffect};
use crate::scene::{AttachTransition, ScenePhase, SceneRegistry};
use crate::scheduler::{FrameOutcome, RenderScheduler};

/// Result of [`LiveMonitor::attach_render_target`] (and of scene loads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Attached; no resource pack yet, so no load was started.
    Attached,
    /// Attached and the resource pack loaded.
    Ready,
    /// Attached, but the resource load failed. The scene stays usable.
    LoadFailed(ResourceLoadError),
    /// The scene was removed while its load was pending.
    Discarded,
    /// Duplicate surface-ready notification.
    AlreadyAttached,
    /// No live scene for the player.
    Unknown,
    /// The engine refused the surface; the scene was rolled back.
    Failed(SceneError),
}

/// One scene in a [`MonitorStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneStatus {
    /// Player rendered by the scene.
    pub player_id: PlayerId,
    /// Render target id.
    pub render_target_id: RenderTargetId,
    /// Lifecycle phase.
    pub phase: ScenePhase,
    /// Last size applied to surface and engine.
    pub size: Option<SurfaceSize>,
    /// Size waiting for the busy gate (or for attachment).
    pub pending_size: Option<SurfaceSize>,
}

/// Serializable snapshot for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    /// Control channel state.
    pub connection: ConnectionState,
    /// Room-level state.
    pub room: RoomInfo,
    /// Room members in arrival order.
    pub roster: Vec<RoomUser>,
    /// Live scenes ordered by player id.
    pub scenes: Vec<SceneStatus>,
    /// Whether the busy gate is held.
    pub busy: bool,
    /// Whether the resource pack is populated.
    pub resources_loaded: bool,
    /// Successful ticks so far.
    pub frames: u64,
    /// Current run of failed ticks.
    pub consecutive_tick_failures: u32,
    /// Most recent error or warning surfaced to the user.
    pub last_error: Option<String>,
}

struct MonitorState {
    connection: ConnectionManager,
    roster: RoomRosterTracker,
    scenes: SceneRegistry,
    resize: ResizeCoordinator,
    scheduler: RenderScheduler,
    log: EventLog,
    last_error: Option<String>,
}

impl MonitorState {
    fn record_error(&mut self, severity: Severity, message: String) {
        self.log.append(message.clone(), severity);
        self.last_error = Some(message);
    }

    /// Evict one scene and tear it down engine-side. Errors are swallowed.
    fn destroy_scene(&mut self, session: &dyn LiveSession, player: PlayerId, reason: &str) -> bool {
        let Some(handle) = self.scenes.remove(player) else {
            return false;
        };
        self.resize.forget(player);
        release_scene(session, player, handle.surface().is_some());
        self.log
            .info(format!("Scene for player {player} destroyed ({reason})"));
        true
    }

    fn destroy_all_scenes(&mut self, session: &dyn LiveSession, reason: &str) {
        let drained = self.scenes.drain();
        self.resize.clear();
        if drained.is_empty() {
            return;
        }
        for handle in &drained {
            release_scene(session, handle.player_id(), handle.surface().is_some());
        }
        self.log
            .info(format!("Destroyed {} scene(s) ({reason})", drained.len()));
    }

    /// Drop the session and everything rendered through it.
    fn teardown(&mut self, reason: &str, severity: Severity) -> bool {
        let Some(session) = self.connection.take_session() else {
            return false;
        };
        if let Err(e) = session.close() {
            log::debug!("Ignoring close error during teardown: {e}");
        }
        self.destroy_all_scenes(&*session, reason);
        self.roster.reset();
        self.log.append(reason.to_string(), severity);
        true
    }

    fn apply_event(&mut self, session: &dyn LiveSession, event: &RoomEvent) {
        match event {
            RoomEvent::RoomJoined { count } => {
                let room = self
                    .roster
                    .info()
                    .room_id
                    .as_ref()
                    .map_or_else(|| "room".to_string(), |id| format!("room {id}"));
                self.log.info(format!("Joined {room} ({count} member(s))"));
            }
            RoomEvent::UserJoined { id, name, .. } => {
                if !self.roster.roster().contains(*id) {
                    self.log.info(format!("{name} ({id}) joined"));
                }
            }
            RoomEvent::UserLeft { id } => {
                self.log.info(format!("Player {id} left"));
            }
            RoomEvent::RoomLeft => self.log.info("Left room"),
            RoomEvent::JoinFailed { reason } => {
                self.record_error(Severity::Warn, format!("Join failed: {reason}"));
            }
            RoomEvent::ChartSelected { chart_id } => {
                self.log.info(format!("Chart {chart_id} selected"));
            }
            RoomEvent::StateChanged { state } => {
                self.log.info(format!("Room state changed to {state:?}"));
            }
        }

        match self.roster.apply(event) {
            SceneEffect::None => {}
            SceneEffect::Destroy(player) => {
                self.destroy_scene(session, player, "player left");
            }
            SceneEffect::DestroyAll => self.destroy_all_scenes(session, "left room"),
        }
    }

    /// Set the surface buffer and the engine scene size together.
    ///
    /// The engine is informed first; the buffer only changes if it accepted,
    /// so the two never disagree.
    fn apply_resize(&mut self, session: &dyn LiveSession, player: PlayerId, size: SurfaceSize) -> bool {
        let Some(surface) = self
            .scenes
            .get(player)
            .and_then(|h| h.surface())
            .map(Rc::clone)
        else {
            return false;
        };

        match session.resize_scene(player, size.width, size.height) {
            Ok(()) => {
                surface.set_buffer_size(size.width, size.height);
                self.resize.record_applied(player, size);
                log::debug!("Scene for player {player} resized to {size}");
                true
            }
            Err(e) => {
                self.record_error(Severity::Warn, e.to_string());
                false
            }
        }
    }

    fn flush_pending_resizes(&mut self, session: &dyn LiveSession) {
        if self.resize.pending_count() == 0 {
            return;
        }
        let attached: Vec<PlayerId> = self
            .scenes
            .handles()
            .iter()
            .filter(|h| h.phase().is_attached())
            .map(|h| h.player_id())
            .collect();
        for player in attached {
            if let Some(size) = self.resize.take_pending(player) {
                self.apply_resize(session, player, size);
            }
        }
    }
}

/// Best-effort engine-side release of one scene.
fn release_scene(session: &dyn LiveSession, player: PlayerId, attached: bool) {
    if attached {
        if let Err(e) = session.detach_canvas(player) {
            log::debug!("Ignoring detach error for player {player}: {e}");
        }
    }
    if let Err(e) = session.destroy_scene(player) {
        log::debug!("Ignoring destroy error for player {player}: {e}");
    }
}

/// Strip the query (auth token) from a URL for logging.
fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Cloneable handle to the orchestrator.
#[derive(Clone)]
pub struct LiveMonitor {
    state: Rc<RefCell<MonitorState>>,
    engine: Rc<dyn Engine>,
    gate: BusyGate,
    resources: Rc<ResourcePackCache>,
}

impl std::fmt::Debug for LiveMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("LiveMonitor")
            .field("connection", &state.connection.state())
            .field("scenes", &state.scenes.len())
            .field("busy", &self.gate.is_held())
            .finish()
    }
}

impl LiveMonitor {
    /// Create a monitor with default event log capacity and tick throttling.
    pub fn new(engine: Rc<dyn Engine>) -> Self {
        Self::with_settings(engine, EventLog::with_default_capacity(), RenderScheduler::default())
    }

    /// Create a monitor sized by `config`.
    ///
    /// A zero `event_log_capacity` falls back to the default.
    pub fn from_config(engine: Rc<dyn Engine>, config: &MonitorConfig) -> Self {
        let log = if config.event_log_capacity == 0 {
            EventLog::with_default_capacity()
        } else {
            EventLog::new(config.event_log_capacity)
        };
        Self::with_settings(
            engine,
            log,
            RenderScheduler::new(config.tick_error_log_interval),
        )
    }

    fn with_settings(engine: Rc<dyn Engine>, log: EventLog, scheduler: RenderScheduler) -> Self {
        Self {
            state: Rc::new(RefCell::new(MonitorState {
                connection: ConnectionManager::new(),
                roster: RoomRosterTracker::new(),
                scenes: SceneRegistry::new(),
                resize: ResizeCoordinator::new(),
                scheduler,
                log,
                last_error: None,
            })),
            engine,
            gate: BusyGate::new(),
            resources: Rc::new(ResourcePackCache::new()),
        }
    }

    // ─── Connection ─────────────────────────────────────────────────────────

    /// Open the control channel and wait for the handshake.
    ///
    /// Fails immediately if a session already exists or `auth` is absent.
    /// A [`disconnect`](Self::disconnect) while the handshake is pending wins;
    /// this call then returns [`ConnectionError::Aborted`].
    pub async fn connect(&self, endpoint: Endpoint, auth: Option<&AuthContext>) -> Result<(), MonitorError> {
        let (attempt, session) = {
            let mut state = self.state.borrow_mut();
            let url = redact_query(&endpoint.ws_url).to_string();
            match state.connection.begin_connect(&*self.engine, endpoint, auth) {
                Ok(started) => {
                    state.log.info(format!("Connecting to {url}"));
                    started
                }
                Err(e) => {
                    state.record_error(Severity::Warn, format!("Connect rejected: {e}"));
                    return Err(e.into());
                }
            }
        };

        let outcome = session.handshake().await;

        let mut state = self.state.borrow_mut();
        match state.connection.finish_connect(attempt, outcome) {
            Ok(()) => {
                state.scheduler.reset_failures();
                state.last_error = None;
                state.log.info("Connected");
                Ok(())
            }
            Err(ConnectionError::Aborted) => {
                state.log.warn("Connect attempt aborted by disconnect");
                Err(ConnectionError::Aborted.into())
            }
            Err(e) => {
                state.record_error(Severity::Error, format!("Connect failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Close the channel and tear down every scene and the roster.
    ///
    /// Idempotent. Returns false if there was nothing to disconnect.
    pub fn disconnect(&self) -> bool {
        let torn_down = self
            .state
            .borrow_mut()
            .teardown("Disconnected", Severity::Info);
        if torn_down {
            self.orphan_pending_loads();
        }
        torn_down
    }

    /// Loads still pending on a torn-down session must not gate the next one.
    fn orphan_pending_loads(&self) {
        let released = self.gate.reset();
        if released > 0 {
            log::debug!("Released busy gate held by {released} orphaned load(s)");
        }
    }

    /// Recorded connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().connection.state()
    }

    // ─── Room ───────────────────────────────────────────────────────────────

    /// Ask the relay to join `room_id`. The roster fills as events arrive.
    pub fn join_room(&self, room_id: &str) -> Result<(), MonitorError> {
        let mut state = self.state.borrow_mut();
        let Some(session) = state.connection.connected_session() else {
            state.log.warn(format!("Join of {room_id:?} rejected: not connected"));
            return Err(MonitorError::NotConnected);
        };

        let room = match RoomId::new(room_id) {
            Ok(room) => room,
            Err(e) => {
                state.record_error(Severity::Warn, e.to_string());
                return Err(e.into());
            }
        };

        if let Err(e) = session.join_room(&room) {
            state.record_error(Severity::Error, format!("Join of {room} failed: {e}"));
            return Err(e.into());
        }

        state.log.info(format!("Joining room {room}"));
        state.roster.request_join(room);
        Ok(())
    }

    /// Leave the current room, clearing the roster and every scene.
    ///
    /// Local state is cleared even if the leave command cannot be sent.
    pub fn leave_room(&self) -> Result<(), MonitorError> {
        let mut state = self.state.borrow_mut();
        let Some(session) = state.connection.connected_session() else {
            state.log.warn("Leave rejected: not connected");
            return Err(MonitorError::NotConnected);
        };

        let sent = session.leave_room();
        state.destroy_all_scenes(&*session, "left room");
        state.roster.reset();

        match sent {
            Ok(()) => {
                state.log.info("Leaving room");
                Ok(())
            }
            Err(e) => {
                state.record_error(Severity::Error, format!("Leave failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Current roster in arrival order.
    pub fn roster(&self) -> Vec<RoomUser> {
        self.state.borrow().roster.roster().users().to_vec()
    }

    /// Current room info.
    pub fn room_info(&self) -> RoomInfo {
        self.state.borrow().roster.info().clone()
    }

    // ─── Scenes ─────────────────────────────────────────────────────────────

    /// Start monitoring `player`.
    ///
    /// Call this synchronously from the user-gesture handler: the audio
    /// context is resumed here, before the engine scene is created.
    pub fn add_scene(&self, player: PlayerId) -> Result<RenderTargetId, MonitorError> {
        let mut state = self.state.borrow_mut();
        let Some(session) = state.connection.connected_session() else {
            state
                .log
                .warn(format!("Scene for player {player} rejected: not connected"));
            return Err(MonitorError::NotConnected);
        };
        if state.scenes.contains(player) {
            state
                .log
                .warn(format!("Scene for player {player} rejected: already exists"));
            return Err(MonitorError::DuplicateScene(player));
        }

        session.resume_audio();

        let target = state
            .scenes
            .allocate(player)
            .ok_or(MonitorError::DuplicateScene(player))?;

        if let Err(e) = session.create_scene(player, target) {
            state.scenes.remove(player);
            state.record_error(Severity::Error, e.to_string());
            return Err(e.into());
        }

        state.log.info(format!(
            "Scene for player {player} allocated (render target {target})"
        ));
        Ok(target)
    }

    /// Bind a drawable surface to `player`'s scene.
    ///
    /// Only the first call per scene has any effect. If the resource pack is
    /// already populated, its load runs before this returns; frames keep
    /// running meanwhile.
    pub async fn attach_render_target(
        &self,
        player: PlayerId,
        surface: Rc<dyn RenderSurface>,
    ) -> AttachOutcome {
        let (session, target) = {
            let mut state = self.state.borrow_mut();
            let Some(session) = state.connection.connected_session() else {
                return AttachOutcome::Unknown;
            };
            let Some(target) = state.scenes.get(player).map(|h| h.render_target_id()) else {
                return AttachOutcome::Unknown;
            };

            match state.scenes.attach(player, surface) {
                AttachTransition::Attached => {}
                AttachTransition::AlreadyAttached => {
                    log::debug!("Duplicate surface for player {player} ignored");
                    return AttachOutcome::AlreadyAttached;
                }
                AttachTransition::Unknown => return AttachOutcome::Unknown,
            }

            if let Err(e) = session.attach_canvas(player, target) {
                state.scenes.remove(player);
                state.resize.forget(player);
                if let Err(destroy_err) = session.destroy_scene(player) {
                    log::debug!("Ignoring destroy error for player {player}: {destroy_err}");
                }
                state.record_error(Severity::Error, e.to_string());
                return AttachOutcome::Failed(e);
            }

            state
                .log
                .info(format!("Scene for player {player} attached"));

            if !self.gate.is_held() {
                if let Some(size) = state.resize.take_pending(player) {
                    state.apply_resize(&*session, player, size);
                }
            }
            (session, target)
        };

        match self.resources.get() {
            Some(pack) => self.load_into_scene(session, player, target, pack).await,
            None => AttachOutcome::Attached,
        }
    }

    async fn load_into_scene(
        &self,
        session: Rc<dyn LiveSession>,
        player: PlayerId,
        target: RenderTargetId,
        pack: Arc<ResourcePack>,
    ) -> AttachOutcome {
        let guard = self.gate.acquire();
        self.state
            .borrow_mut()
            .log
            .info(format!("Loading resource pack into scene for player {player}"));

        let result = session.load_scene_resource_pack(player, pack).await;
        drop(guard);

        let mut state = self.state.borrow_mut();
        let outcome = if !state.scenes.is_live(player, target) {
            state.log.info(format!(
                "Discarded resource load for removed scene (player {player})"
            ));
            AttachOutcome::Discarded
        } else {
            match result {
                Ok(()) => {
                    state.scenes.mark_ready(player, target);
                    state.log.info(format!("Scene for player {player} ready"));
                    AttachOutcome::Ready
                }
                Err(e) => {
                    state.record_error(Severity::Error, e.to_string());
                    AttachOutcome::LoadFailed(e)
                }
            }
        };

        if !self.gate.is_held() {
            if let Some(session) = state.connection.connected_session() {
                state.flush_pending_resizes(&*session);
            }
        }
        outcome
    }

    /// Stop monitoring `player`. A no-op if no scene exists.
    pub fn remove_scene(&self, player: PlayerId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.connection.session() {
            Some(session) => state.destroy_scene(&*session, player, "removed"),
            None => state.scenes.remove(player).is_some(),
        }
    }

    /// Phase of `player`'s scene, if live.
    pub fn scene_phase(&self, player: PlayerId) -> Option<ScenePhase> {
        self.state.borrow().scenes.get(player).map(|h| h.phase())
    }

    /// Render target id of `player`'s scene, if live.
    pub fn render_target(&self, player: PlayerId) -> Option<RenderTargetId> {
        self.state
            .borrow()
            .scenes
            .get(player)
            .map(|h| h.render_target_id())
    }

    /// Number of live scenes.
    pub fn scene_count(&self) -> usize {
        self.state.borrow().scenes.len()
    }

    // ─── Resize ─────────────────────────────────────────────────────────────

    /// Report the displayed size of `player`'s container.
    ///
    /// Applied immediately if the scene is attached and the busy gate is
    /// clear; otherwise deferred and applied once both hold. Returns
    /// [`ResizeDecision::Apply`] only if surface and engine now have `size`.
    pub fn observe_resize(&self, player: PlayerId, size: SurfaceSize) -> ResizeDecision {
        let mut state = self.state.borrow_mut();
        let Some(attached) = state.scenes.get(player).map(|h| h.phase().is_attached()) else {
            return ResizeDecision::Ignore;
        };
        let can_apply = attached && !self.gate.is_held();

        match state.resize.observe(player, size, can_apply) {
            ResizeDecision::Apply(size) => {
                let applied = match state.connection.connected_session() {
                    Some(session) => state.apply_resize(&*session, player, size),
                    None => false,
                };
                if applied {
                    ResizeDecision::Apply(size)
                } else {
                    ResizeDecision::Rejected
                }
            }
            ResizeDecision::Defer => {
                log::debug!("Resize of player {player} to {size} deferred");
                ResizeDecision::Defer
            }
            decision => decision,
        }
    }

    // ─── Resources ──────────────────────────────────────────────────────────

    /// Fetch the resource pack once and load it into every attached scene.
    ///
    /// Returns immediately if the pack is populated or a fetch is already
    /// running. A failed fetch can be retried.
    pub async fn load_resource_pack(
        &self,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<Vec<(PlayerId, AttachOutcome)>, MonitorError> {
        if !self.resources.begin_fetch() {
            return Ok(Vec::new());
        }
        self.state.borrow_mut().log.info("Fetching resource pack");

        match fetcher.fetch().await {
            Ok(pack) => Ok(self.populate_resource_pack(pack).await),
            Err(e) => {
                self.resources.abandon_fetch();
                self.state
                    .borrow_mut()
                    .record_error(Severity::Error, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Install an already-fetched pack and load it into every scene that is
    /// attached but not ready. Does nothing if a pack is already installed.
    pub async fn populate_resource_pack(&self, pack: ResourcePack) -> Vec<(PlayerId, AttachOutcome)> {
        let assets = pack.len();
        let bytes = pack.total_bytes();
        if !self.resources.populate(pack) {
            return Vec::new();
        }

        let (session, waiting) = {
            let mut state = self.state.borrow_mut();
            state
                .log
                .info(format!("Resource pack ready ({assets} assets, {bytes} bytes)"));
            let Some(session) = state.connection.connected_session() else {
                return Vec::new();
            };
            (session, state.scenes.awaiting_resources())
        };
        let Some(pack) = self.resources.get() else {
            return Vec::new();
        };

        join_all(waiting.into_iter().map(|(player, target)| {
            let session = Rc::clone(&session);
            let pack = Arc::clone(&pack);
            async move {
                let outcome = self.load_into_scene(session, player, target, pack).await;
                (player, outcome)
            }
        }))
        .await
    }

    /// True once the resource pack is installed.
    pub fn has_resource_pack(&self) -> bool {
        self.resources.is_populated()
    }

    // ─── Frames ─────────────────────────────────────────────────────────────

    /// Run one frame step for `timestamp_ms`.
    ///
    /// Never fails: tick errors are counted and throttled into the event log.
    pub fn frame(&self, timestamp_ms: f64) -> FrameOutcome {
        let mut state = self.state.borrow_mut();
        state.scheduler.begin_frame(timestamp_ms);

        if state.connection.liveness_lost() {
            state.teardown("Connection lost", Severity::Error);
            state.last_error = Some("Connection lost".to_string());
            self.orphan_pending_loads();
            return FrameOutcome::ConnectionLost;
        }

        let Some(session) = state.connection.connected_session() else {
            return FrameOutcome::SkippedDisconnected;
        };

        for event in session.poll_events() {
            state.apply_event(&*session, &event);
        }

        if self.gate.is_held() {
            return FrameOutcome::SkippedBusy;
        }
        state.flush_pending_resizes(&*session);

        match session.tick(timestamp_ms) {
            Ok(()) => {
                state.scheduler.record_success();
                FrameOutcome::Rendered
            }
            Err(e) => {
                if state.scheduler.record_failure(&e) {
                    let streak = state.scheduler.consecutive_failures();
                    state.record_error(
                        Severity::Error,
                        format!("{e} ({streak} consecutive failures)"),
                    );
                }
                FrameOutcome::TickFailed(e)
            }
        }
    }

    // ─── Diagnostics ────────────────────────────────────────────────────────

    /// The global busy gate.
    pub fn busy_gate(&self) -> &BusyGate {
        &self.gate
    }

    /// Copy of the event log, oldest first.
    pub fn event_log(&self) -> Vec<EventLogEntry> {
        self.state.borrow().log.to_vec()
    }

    /// Most recent error or warning surfaced to the user.
    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    /// Snapshot for status indicators.
    pub fn status(&self) -> MonitorStatus {
        let state = self.state.borrow();
        let scenes = state
            .scenes
            .handles()
            .into_iter()
            .map(|h| SceneStatus {
                player_id: h.player_id(),
                render_target_id: h.render_target_id(),
                phase: h.phase(),
                size: state.resize.applied(h.player_id()),
                pending_size: state.resize.pending(h.player_id()),
            })
            .collect();

        MonitorStatus {
            connection: state.connection.state(),
            room: state.roster.info().clone(),
            roster: state.roster.roster().users().to_vec(),
            scenes,
            busy: self.gate.is_held(),
            resources_loaded: self.resources.is_populated(),
            frames: state.scheduler.frames(),
            consecutive_tick_failures: state.scheduler.consecutive_failures(),
            last_error: state.last_error.clone(),
        }
    }
}
