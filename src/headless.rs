//! Headless engine over a native WebSocket.
//!
//! [`HeadlessEngine`] implements the engine capability surface without a
//! renderer: the control channel is real, scenes are bookkeeping only. It
//! powers the `live-monitor` CLI and lets the orchestrator run against a
//! relay outside the browser.
//!
//! # Architecture
//!
//! ```text
//! HeadlessSession (event loop thread, ?Send)
//!     │ mpsc<Outgoing>            ▲ mpsc<RoomEvent>      ▲ AtomicBool alive
//!     ▼                           │                      │
//! channel task (tokio::spawn) ── WsWriter / WsReader ── relay /ws/live
//! ```
//!
//! The handshake resolves when the socket opens. Inbound JSON text frames
//! decode into [`RoomEvent`]s; frames that do not decode are logged and
//! skipped. `is_connected()` turns false once the task exits for any reason.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;

use crate::engine::{Endpoint, Engine, LiveSession};
use crate::error::{ChannelError, ConnectionError, ResourceLoadError, SceneError, TickError};
use crate::protocol::{ControlCommand, PlayerId, RenderTargetId, RoomEvent, RoomId};
use crate::resource_pack::ResourcePack;
use crate::ws::{self, WsMessage};

/// Message from the session to its channel task.
#[derive(Debug)]
enum Outgoing {
    Command(ControlCommand),
    Close,
}

/// Engine factory producing [`HeadlessSession`]s.
///
/// Must be used inside a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessEngine;

impl HeadlessEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }

    /// Open a concrete session. [`Engine::construct`] wraps this.
    pub fn open(&self, endpoint: &Endpoint) -> Result<Rc<HeadlessSession>, ConnectionError> {
        let url = reqwest::Url::parse(&endpoint.ws_url)
            .map_err(|e| ConnectionError::Network(format!("invalid endpoint URL: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConnectionError::Network(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConnectionError::Network(format!("no async runtime: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let alive = Arc::new(AtomicBool::new(true));

        runtime.spawn(run_channel(
            endpoint.ws_url.clone(),
            ready_tx,
            command_rx,
            event_tx,
            Arc::clone(&alive),
        ));

        Ok(Rc::new(HeadlessSession {
            commands: command_tx,
            events: RefCell::new(event_rx),
            ready: RefCell::new(Some(ready_rx)),
            alive,
            scenes: RefCell::new(HashMap::new()),
            ticks: Cell::new(0),
        }))
    }
}

impl Engine for HeadlessEngine {
    fn construct(&self, endpoint: &Endpoint) -> Result<Rc<dyn LiveSession>, ConnectionError> {
        let session: Rc<dyn LiveSession> = self.open(endpoint)?;
        Ok(session)
    }
}

/// Classify a connect failure.
fn connect_error(error: &anyhow::Error) -> ConnectionError {
    match error.downcast_ref::<tungstenite::Error>() {
        Some(tungstenite::Error::Http(response)) => {
            ConnectionError::Handshake(format!("relay answered HTTP {}", response.status()))
        }
        Some(tungstenite::Error::Protocol(e)) => ConnectionError::Handshake(e.to_string()),
        _ => ConnectionError::Network(format!("{error:#}")),
    }
}

async fn run_channel(
    url: String,
    ready: oneshot::Sender<Result<(), ConnectionError>>,
    mut commands: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<RoomEvent>,
    alive: Arc<AtomicBool>,
) {
    let (mut writer, mut reader) = match ws::connect(&url).await {
        Ok(halves) => {
            let _ = ready.send(Ok(()));
            halves
        }
        Err(e) => {
            alive.store(false, Ordering::SeqCst);
            let _ = ready.send(Err(connect_error(&e)));
            return;
        }
    };

    loop {
        tokio::select! {
            outgoing = commands.recv() => match outgoing {
                Some(Outgoing::Command(command)) => {
                    if let Err(e) = writer.send_command(&command).await {
                        log::warn!("Control channel send failed: {e:#}");
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    if let Err(e) = writer.close().await {
                        log::debug!("Ignoring close error: {e:#}");
                    }
                    break;
                }
            },
            incoming = reader.recv() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match RoomEvent::from_json(&text) {
                    Ok(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::debug!("Skipping undecodable frame ({e}): {text}"),
                },
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Err(e) = writer.send_pong(data).await {
                        log::debug!("Pong failed: {e:#}");
                    }
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    log::debug!("Skipping {}-byte binary frame", data.len());
                }
                Some(Ok(WsMessage::Close { code, reason })) => {
                    log::info!("Relay closed the control channel ({code}): {reason}");
                    break;
                }
                Some(Err(e)) => {
                    log::warn!("Control channel read failed: {e:#}");
                    break;
                }
                None => break,
            },
        }
    }

    alive.store(false, Ordering::SeqCst);
}

#[derive(Debug, Clone, Copy)]
struct HeadlessScene {
    target: RenderTargetId,
    attached: bool,
    ready: bool,
    size: Option<(u32, u32)>,
    frames: u64,
}

/// Live session backed by a native WebSocket. Scenes are not rendered.
#[derive(Debug)]
pub struct HeadlessSession {
    commands: mpsc::UnboundedSender<Outgoing>,
    events: RefCell<mpsc::UnboundedReceiver<RoomEvent>>,
    ready: RefCell<Option<oneshot::Receiver<Result<(), ConnectionError>>>>,
    alive: Arc<AtomicBool>,
    scenes: RefCell<HashMap<PlayerId, HeadlessScene>>,
    ticks: Cell<u64>,
}

impl HeadlessSession {
    fn send(&self, command: ControlCommand) -> Result<(), ChannelError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.commands
            .send(Outgoing::Command(command))
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    /// Frames drawn for `player` (ticks while its scene was ready).
    pub fn frames_rendered(&self, player: PlayerId) -> Option<u64> {
        self.scenes.borrow().get(&player).map(|s| s.frames)
    }

    /// Size last reported for `player`'s scene.
    pub fn scene_size(&self, player: PlayerId) -> Option<(u32, u32)> {
        self.scenes.borrow().get(&player).and_then(|s| s.size)
    }

    /// Total ticks since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

#[async_trait(?Send)]
impl LiveSession for HeadlessSession {
    async fn handshake(&self) -> Result<(), ConnectionError> {
        let ready = self.ready.borrow_mut().take();
        let Some(ready) = ready else {
            return Err(ConnectionError::Handshake("handshake already awaited".into()));
        };
        match ready.await {
            Ok(result) => result,
            Err(e) => Err(ConnectionError::Network(format!("channel task ended: {e}"))),
        }
    }

    fn join_room(&self, room_id: &RoomId) -> Result<(), ChannelError> {
        self.send(ControlCommand::JoinRoom {
            room_id: room_id.clone(),
        })
    }

    fn leave_room(&self) -> Result<(), ChannelError> {
        self.send(ControlCommand::LeaveRoom)
    }

    fn poll_events(&self) -> Vec<RoomEvent> {
        let mut events = self.events.borrow_mut();
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    fn tick(&self, _timestamp_ms: f64) -> Result<(), TickError> {
        self.ticks.set(self.ticks.get() + 1);
        for scene in self.scenes.borrow_mut().values_mut() {
            if scene.attached && scene.ready {
                scene.frames += 1;
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn close(&self) -> Result<(), ChannelError> {
        // The task may already be gone; closing twice is fine.
        let _ = self.commands.send(Outgoing::Close);
        Ok(())
    }

    fn create_scene(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError> {
        let mut scenes = self.scenes.borrow_mut();
        if scenes.contains_key(&player) {
            return Err(SceneError::Create {
                player,
                detail: "scene already exists".into(),
            });
        }
        scenes.insert(
            player,
            HeadlessScene {
                target,
                attached: false,
                ready: false,
                size: None,
                frames: 0,
            },
        );
        Ok(())
    }

    fn attach_canvas(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError> {
        match self.scenes.borrow_mut().get_mut(&player) {
            Some(scene) if scene.target == target => {
                scene.attached = true;
                Ok(())
            }
            Some(scene) => Err(SceneError::Attach {
                player,
                detail: format!("render target {target} does not match {}", scene.target),
            }),
            None => Err(SceneError::Attach {
                player,
                detail: "no such scene".into(),
            }),
        }
    }

    fn destroy_scene(&self, player: PlayerId) -> Result<(), SceneError> {
        self.scenes.borrow_mut().remove(&player);
        Ok(())
    }

    fn detach_canvas(&self, player: PlayerId) -> Result<(), SceneError> {
        if let Some(scene) = self.scenes.borrow_mut().get_mut(&player) {
            scene.attached = false;
        }
        Ok(())
    }

    async fn load_scene_resource_pack(
        &self,
        player: PlayerId,
        pack: Arc<ResourcePack>,
    ) -> Result<(), ResourceLoadError> {
        if pack.is_empty() {
            return Err(ResourceLoadError::Engine {
                player,
                detail: "resource pack is empty".into(),
            });
        }
        let target = self
            .scenes
            .borrow()
            .get(&player)
            .map(|scene| scene.target)
            .ok_or_else(|| ResourceLoadError::Engine {
                player,
                detail: "no such scene".into(),
            })?;

        tokio::task::yield_now().await;

        match self.scenes.borrow_mut().get_mut(&player) {
            Some(scene) if scene.target == target => {
                scene.ready = true;
                log::debug!(
                    "Headless scene {player} loaded {} assets ({} bytes)",
                    pack.len(),
                    pack.total_bytes()
                );
                Ok(())
            }
            _ => Err(ResourceLoadError::Engine {
                player,
                detail: "scene destroyed during load".into(),
            }),
        }
    }

    fn resize_scene(&self, player: PlayerId, width: u32, height: u32) -> Result<(), SceneError> {
        match self.scenes.borrow_mut().get_mut(&player) {
            Some(scene) if scene.attached => {
                scene.size = Some((width, height));
                Ok(())
            }
            _ => Err(SceneError::Resize {
                player,
                detail: "scene is not attached".into(),
            }),
        }
    }

    fn resume_audio(&self) {
        log::debug!("Headless session has no audio output");
    }
}
