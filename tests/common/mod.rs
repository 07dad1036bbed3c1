//! Shared test doubles: a recording engine whose handshakes and resource
//! loads can be held open, plus a surface that remembers buffer sizes.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use live_monitor::{
    AuthContext, ChannelError, ConnectionError, Endpoint, Engine, LiveMonitor, LiveSession,
    PlayerId, RenderSurface, RenderTargetId, ResourceLoadError, ResourcePack, RoomEvent, RoomId,
    SceneError, TickError,
};

/// Engine call recorded by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    JoinRoom(String),
    LeaveRoom,
    Close,
    CreateScene(PlayerId, RenderTargetId),
    AttachCanvas(PlayerId, RenderTargetId),
    DestroyScene(PlayerId),
    DetachCanvas(PlayerId),
    LoadResources(PlayerId),
    ResizeScene(PlayerId, u32, u32),
    ResumeAudio,
}

type Reply<E> = oneshot::Sender<Result<(), E>>;

#[derive(Debug, Default)]
pub struct MockSession {
    calls: RefCell<Vec<Call>>,
    events: RefCell<VecDeque<RoomEvent>>,
    connected: Cell<bool>,
    ticks: Cell<u32>,
    handshake: RefCell<Option<oneshot::Receiver<Result<(), ConnectionError>>>>,
    hold_loads: Cell<bool>,
    pending_loads: RefCell<VecDeque<Reply<ResourceLoadError>>>,
    fail_tick: Cell<bool>,
    fail_send: Cell<bool>,
    fail_create: Cell<bool>,
    fail_attach: Cell<bool>,
    fail_resize: Cell<bool>,
    fail_load: Cell<bool>,
}

impl MockSession {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn push_event(&self, event: RoomEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn push_events(&self, events: impl IntoIterator<Item = RoomEvent>) {
        self.events.borrow_mut().extend(events);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.get()
    }

    /// Hold every subsequent resource load until [`complete_next_load`](Self::complete_next_load).
    pub fn hold_loads(&self) {
        self.hold_loads.set(true);
    }

    pub fn pending_loads(&self) -> usize {
        self.pending_loads.borrow().len()
    }

    /// Resolve the oldest held load. Returns false if none is pending.
    pub fn complete_next_load(&self, result: Result<(), ResourceLoadError>) -> bool {
        match self.pending_loads.borrow_mut().pop_front() {
            Some(reply) => reply.send(result).is_ok(),
            None => false,
        }
    }

    pub fn fail_ticks(&self, fail: bool) {
        self.fail_tick.set(fail);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.set(fail);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.set(fail);
    }

    pub fn fail_attaches(&self, fail: bool) {
        self.fail_attach.set(fail);
    }

    pub fn fail_resizes(&self, fail: bool) {
        self.fail_resize.set(fail);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_load.set(fail);
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn send_result(&self) -> Result<(), ChannelError> {
        if self.fail_send.get() {
            Err(ChannelError::SendFailed("socket closed".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait(?Send)]
impl LiveSession for MockSession {
    async fn handshake(&self) -> Result<(), ConnectionError> {
        let pending = self.handshake.borrow_mut().take();
        let result = match pending {
            Some(rx) => rx.await.unwrap_or(Err(ConnectionError::Network("dropped".into()))),
            None => Ok(()),
        };
        self.connected.set(result.is_ok());
        result
    }

    fn join_room(&self, room_id: &RoomId) -> Result<(), ChannelError> {
        self.record(Call::JoinRoom(room_id.as_str().to_string()));
        self.send_result()
    }

    fn leave_room(&self) -> Result<(), ChannelError> {
        self.record(Call::LeaveRoom);
        self.send_result()
    }

    fn poll_events(&self) -> Vec<RoomEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    fn tick(&self, _timestamp_ms: f64) -> Result<(), TickError> {
        self.ticks.set(self.ticks.get() + 1);
        if self.fail_tick.get() {
            Err(TickError("shader compile failed".into()))
        } else {
            Ok(())
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn close(&self) -> Result<(), ChannelError> {
        self.record(Call::Close);
        self.connected.set(false);
        Ok(())
    }

    fn create_scene(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError> {
        self.record(Call::CreateScene(player, target));
        if self.fail_create.get() {
            return Err(SceneError::Create {
                player,
                detail: "no webgl".into(),
            });
        }
        Ok(())
    }

    fn attach_canvas(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError> {
        self.record(Call::AttachCanvas(player, target));
        if self.fail_attach.get() {
            return Err(SceneError::Attach {
                player,
                detail: "context lost".into(),
            });
        }
        Ok(())
    }

    fn destroy_scene(&self, player: PlayerId) -> Result<(), SceneError> {
        self.record(Call::DestroyScene(player));
        Ok(())
    }

    fn detach_canvas(&self, player: PlayerId) -> Result<(), SceneError> {
        self.record(Call::DetachCanvas(player));
        Ok(())
    }

    async fn load_scene_resource_pack(
        &self,
        player: PlayerId,
        _pack: Arc<ResourcePack>,
    ) -> Result<(), ResourceLoadError> {
        self.record(Call::LoadResources(player));
        if self.fail_load.get() {
            return Err(ResourceLoadError::Engine {
                player,
                detail: "texture upload failed".into(),
            });
        }
        if !self.hold_loads.get() {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        self.pending_loads.borrow_mut().push_back(tx);
        rx.await.unwrap_or_else(|_| {
            Err(ResourceLoadError::Engine {
                player,
                detail: "load abandoned".into(),
            })
        })
    }

    fn resize_scene(&self, player: PlayerId, width: u32, height: u32) -> Result<(), SceneError> {
        self.record(Call::ResizeScene(player, width, height));
        if self.fail_resize.get() {
            return Err(SceneError::Resize {
                player,
                detail: "too large".into(),
            });
        }
        Ok(())
    }

    fn resume_audio(&self) {
        self.record(Call::ResumeAudio);
    }
}

/// Engine producing [`MockSession`]s.
#[derive(Debug, Default)]
pub struct MockEngine {
    sessions: RefCell<Vec<Rc<MockSession>>>,
    hold_handshake: Cell<bool>,
    handshakes: RefCell<VecDeque<Reply<ConnectionError>>>,
    fail_construct: Cell<bool>,
}

impl MockEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Sessions built from now on wait for [`complete_handshake`](Self::complete_handshake).
    pub fn hold_handshakes(&self) {
        self.hold_handshake.set(true);
    }

    pub fn complete_handshake(&self, result: Result<(), ConnectionError>) -> bool {
        match self.handshakes.borrow_mut().pop_front() {
            Some(reply) => reply.send(result).is_ok(),
            None => false,
        }
    }

    pub fn fail_construct(&self, fail: bool) {
        self.fail_construct.set(fail);
    }

    pub fn constructed(&self) -> usize {
        self.sessions.borrow().len()
    }

    /// Most recently constructed session.
    pub fn session(&self) -> Rc<MockSession> {
        let sessions = self.sessions.borrow();
        Rc::clone(sessions.last().expect("no session constructed"))
    }
}

impl Engine for MockEngine {
    fn construct(&self, _endpoint: &Endpoint) -> Result<Rc<dyn LiveSession>, ConnectionError> {
        if self.fail_construct.get() {
            return Err(ConnectionError::Network("engine unavailable".into()));
        }

        let session = Rc::new(MockSession::default());
        if self.hold_handshake.get() {
            let (tx, rx) = oneshot::channel();
            *session.handshake.borrow_mut() = Some(rx);
            self.handshakes.borrow_mut().push_back(tx);
        }
        self.sessions.borrow_mut().push(Rc::clone(&session));
        Ok(session)
    }
}

/// Surface recording every buffer size it is given.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    sizes: RefCell<Vec<(u32, u32)>>,
}

impl RecordingSurface {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.borrow().clone()
    }
}

impl RenderSurface for RecordingSurface {
    fn set_buffer_size(&self, width: u32, height: u32) {
        self.sizes.borrow_mut().push((width, height));
    }
}

pub fn endpoint() -> Endpoint {
    Endpoint {
        ws_url: "ws://relay.test/ws/live?token=t0k3n".into(),
        api_base: "http://relay.test".into(),
    }
}

pub fn auth() -> AuthContext {
    AuthContext::new("t0k3n").expect("valid token")
}

pub fn pack() -> ResourcePack {
    ResourcePack::new(HashMap::from([
        ("info.yml".to_string(), b"name: test".to_vec()),
        ("click.png".to_string(), vec![0x89, b'P', b'N', b'G']),
    ]))
}

pub fn user(id: PlayerId, name: &str) -> RoomEvent {
    RoomEvent::UserJoined {
        id,
        name: name.into(),
        monitorable: true,
    }
}

/// A monitor connected through a fresh [`MockEngine`].
pub async fn connected_monitor() -> (LiveMonitor, Rc<MockEngine>, Rc<MockSession>) {
    let engine = MockEngine::new();
    let monitor = LiveMonitor::new(Rc::clone(&engine) as Rc<dyn Engine>);
    monitor
        .connect(endpoint(), Some(&auth()))
        .await
        .expect("connect");
    let session = engine.session();
    (monitor, engine, session)
}

/// Add and attach a scene for `player` without a resource pack installed.
pub async fn attached_scene(monitor: &LiveMonitor, player: PlayerId) -> Rc<RecordingSurface> {
    monitor.add_scene(player).expect("add scene");
    let surface = RecordingSurface::new();
    let outcome = monitor
        .attach_render_target(player, Rc::clone(&surface) as Rc<dyn RenderSurface>)
        .await;
    assert!(
        matches!(
            outcome,
            live_monitor::AttachOutcome::Attached | live_monitor::AttachOutcome::Ready
        ),
        "unexpected attach outcome {outcome:?}"
    );
    surface
}
