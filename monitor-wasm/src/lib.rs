//! Browser bindings for the live monitor.
//!
//! Exposes [`WasmMonitor`] to JavaScript. The page supplies an engine factory
//! (see [`js_engine`]) and canvas element ids; the monitor drives everything
//! else, including its own `requestAnimationFrame` loop.
//!
//! ```text
//! page JS ──► WasmMonitor ──► LiveMonitor ──► JsEngine/JsSession ──► engine JS
//!                  │                                  ▲
//!                  └── CanvasRegistry (player → <canvas>) ┘
//! ```

pub mod js_engine;
pub mod logger;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlCanvasElement;

use live_monitor::{
    AttachOutcome, AuthContext, Endpoint, FrameOutcome, HttpResourceFetcher, LiveMonitor,
    MonitorConfig, PlayerId, RenderSurface, ResizeDecision, SurfaceSize,
};

use crate::js_engine::{CanvasRegistry, JsEngine, SceneCanvases};

// ---------------------------------------------------------------------------
// Canvas surface
// ---------------------------------------------------------------------------

struct CanvasSurface {
    canvas: HtmlCanvasElement,
}

impl RenderSurface for CanvasSurface {
    fn set_buffer_size(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }
}

fn find_canvas(canvas_id: &str) -> Result<HtmlCanvasElement, JsError> {
    web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(canvas_id))
        .ok_or_else(|| JsError::new(&format!("no element with id {canvas_id:?}")))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| JsError::new(&format!("element {canvas_id:?} is not a <canvas>")))
}

fn outcome_name(outcome: &AttachOutcome) -> &'static str {
    match outcome {
        AttachOutcome::Attached => "attached",
        AttachOutcome::Ready => "ready",
        AttachOutcome::LoadFailed(_) => "load_failed",
        AttachOutcome::Discarded => "discarded",
        AttachOutcome::AlreadyAttached => "already_attached",
        AttachOutcome::Unknown => "unknown",
        AttachOutcome::Failed(_) => "failed",
    }
}

fn frame_name(outcome: &FrameOutcome) -> &'static str {
    match outcome {
        FrameOutcome::Rendered => "rendered",
        FrameOutcome::SkippedDisconnected => "skipped_disconnected",
        FrameOutcome::SkippedBusy => "skipped_busy",
        FrameOutcome::TickFailed(_) => "tick_failed",
        FrameOutcome::ConnectionLost => "connection_lost",
    }
}

// ---------------------------------------------------------------------------
// Frame loop
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FrameLoop {
    running: Cell<bool>,
    handle: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl FrameLoop {
    fn request(&self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Some(callback) = self.callback.borrow().as_ref() {
            match window.request_animation_frame(callback.as_ref().unchecked_ref()) {
                Ok(handle) => self.handle.set(Some(handle)),
                Err(e) => log::error!("requestAnimationFrame failed: {}", js_engine::describe(&e)),
            }
        }
    }

    fn cancel(&self) {
        self.running.set(false);
        if let (Some(handle), Some(window)) = (self.handle.take(), web_sys::window()) {
            if let Err(e) = window.cancel_animation_frame(handle) {
                log::warn!("cancelAnimationFrame failed: {}", js_engine::describe(&e));
            }
        }
        self.callback.borrow_mut().take();
    }
}

// ---------------------------------------------------------------------------
// WasmMonitor
// ---------------------------------------------------------------------------

#[wasm_bindgen]
pub struct WasmMonitor {
    monitor: LiveMonitor,
    config: MonitorConfig,
    canvases: CanvasRegistry,
    frame_loop: Rc<FrameLoop>,
}

#[wasm_bindgen]
impl WasmMonitor {
    /// Create a monitor around a JS engine factory
    /// `(wsUrl, apiBase) => session`.
    ///
    /// `config` is a plain object with `MonitorConfig` fields; `undefined`
    /// means defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(engine_factory: Function, config: JsValue) -> Result<WasmMonitor, JsError> {
        console_error_panic_hook::set_once();
        logger::init(log::LevelFilter::Info);

        let config: MonitorConfig = if config.is_undefined() || config.is_null() {
            MonitorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsError::new(&format!("bad config: {e}")))?
        };
        config.validate().map_err(|e| JsError::new(&e.to_string()))?;

        let canvases: CanvasRegistry = Rc::new(RefCell::new(SceneCanvases::default()));
        let engine = Rc::new(JsEngine::new(engine_factory, Rc::clone(&canvases)));

        Ok(Self {
            monitor: LiveMonitor::from_config(engine, &config),
            config,
            canvases,
            frame_loop: Rc::new(FrameLoop::default()),
        })
    }

    /// Connect with the session token. Resolves once the handshake is done.
    pub fn connect(&self, token: Option<String>) -> Promise {
        let monitor = self.monitor.clone();
        let auth = token.and_then(AuthContext::new);
        let endpoint = match &auth {
            Some(auth) => self.config.live_endpoint(auth),
            None => Ok(Endpoint {
                ws_url: String::new(),
                api_base: self.config.api_base().to_string(),
            }),
        };

        future_to_promise(async move {
            let endpoint = endpoint.map_err(|e| JsValue::from(JsError::new(&e.to_string())))?;
            monitor
                .connect(endpoint, auth.as_ref())
                .await
                .map(|()| JsValue::UNDEFINED)
                .map_err(|e| JsValue::from(JsError::new(&e.to_string())))
        })
    }

    /// Close the channel and tear down every scene.
    pub fn disconnect(&self) -> bool {
        let torn_down = self.monitor.disconnect();
        self.canvases.borrow_mut().clear();
        torn_down
    }

    /// `"disconnected"`, `"connecting"` or `"connected"`.
    #[wasm_bindgen(js_name = "connectionState")]
    pub fn connection_state(&self) -> String {
        self.monitor.connection_state().to_string()
    }

    #[wasm_bindgen(js_name = "joinRoom")]
    pub fn join_room(&self, room_id: &str) -> Result<(), JsError> {
        self.monitor
            .join_room(room_id)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = "leaveRoom")]
    pub fn leave_room(&self) -> Result<(), JsError> {
        let result = self.monitor.leave_room();
        self.canvases.borrow_mut().clear();
        result.map_err(|e| JsError::new(&e.to_string()))
    }

    /// Current room members as `[{id, display_name, monitorable}]`.
    pub fn roster(&self) -> Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.monitor.roster())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Create a scene for `player_id`. Call from a user-gesture handler so
    /// audio can resume. Returns the render target id.
    #[wasm_bindgen(js_name = "addScene")]
    pub fn add_scene(&self, player_id: PlayerId) -> Result<f64, JsError> {
        self.monitor
            .add_scene(player_id)
            .map(|target| target as f64)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Bind the scene to the `<canvas>` with `canvas_id`.
    ///
    /// Resolves to the outcome name (`"attached"`, `"ready"`, ...).
    #[wasm_bindgen(js_name = "attachCanvas")]
    pub fn attach_canvas(&self, player_id: PlayerId, canvas_id: &str) -> Result<Promise, JsError> {
        let canvas = find_canvas(canvas_id)?;
        let target = self
            .monitor
            .render_target(player_id)
            .ok_or_else(|| JsError::new(&format!("no scene for player {player_id}")))?;
        {
            let mut canvases = self.canvases.borrow_mut();
            // A duplicate attach keeps the canvas the engine already draws to.
            if canvases.get(player_id, target).is_none() {
                canvases.insert(player_id, target, canvas.clone());
            }
        }

        let monitor = self.monitor.clone();
        Ok(future_to_promise(async move {
            let surface: Rc<dyn RenderSurface> = Rc::new(CanvasSurface { canvas });
            let outcome = monitor.attach_render_target(player_id, surface).await;
            Ok(JsValue::from_str(outcome_name(&outcome)))
        }))
    }

    /// Report the canvas's layout size. Returns true if applied now.
    #[wasm_bindgen(js_name = "observeResize")]
    pub fn observe_resize(&self, player_id: PlayerId, width: u32, height: u32) -> bool {
        matches!(
            self.monitor
                .observe_resize(player_id, SurfaceSize::new(width, height)),
            ResizeDecision::Apply(_)
        )
    }

    #[wasm_bindgen(js_name = "removeScene")]
    pub fn remove_scene(&self, player_id: PlayerId) -> bool {
        let removed = self.monitor.remove_scene(player_id);
        self.canvases.borrow_mut().release(player_id);
        removed
    }

    #[wasm_bindgen(js_name = "sceneCount")]
    pub fn scene_count(&self) -> usize {
        self.monitor.scene_count()
    }

    /// Fetch the resource pack from `base_url` (or the configured base) and
    /// load it into every attached scene.
    #[wasm_bindgen(js_name = "loadResourcePack")]
    pub fn load_resource_pack(&self, base_url: Option<String>) -> Result<Promise, JsError> {
        let base = base_url
            .or_else(|| self.config.resource_base.clone())
            .ok_or_else(|| JsError::new("no resource base URL configured"))?;
        let fetcher = HttpResourceFetcher::with_files(base, self.config.resource_files.clone());

        let monitor = self.monitor.clone();
        Ok(future_to_promise(async move {
            let loaded = monitor
                .load_resource_pack(&fetcher)
                .await
                .map_err(|e| JsValue::from(JsError::new(&e.to_string())))?;
            Ok(JsValue::from(loaded.len() as u32))
        }))
    }

    #[wasm_bindgen(js_name = "hasResourcePack")]
    pub fn has_resource_pack(&self) -> bool {
        self.monitor.has_resource_pack()
    }

    /// Run one frame manually. Returns the outcome name.
    pub fn frame(&self, timestamp_ms: f64) -> String {
        frame_name(&self.monitor.frame(timestamp_ms)).to_string()
    }

    /// Drive frames from `requestAnimationFrame` until [`stop`](Self::stop).
    pub fn start(&self) {
        if self.frame_loop.running.replace(true) {
            return;
        }

        let monitor = self.monitor.clone();
        let frame_loop = Rc::clone(&self.frame_loop);
        let callback = Closure::wrap(Box::new(move |timestamp_ms: f64| {
            if !frame_loop.running.get() {
                return;
            }
            monitor.frame(timestamp_ms);
            frame_loop.request();
        }) as Box<dyn FnMut(f64)>);

        *self.frame_loop.callback.borrow_mut() = Some(callback);
        self.frame_loop.request();
    }

    /// Stop the frame loop.
    pub fn stop(&self) {
        self.frame_loop.cancel();
    }

    #[wasm_bindgen(js_name = "isBusy")]
    pub fn is_busy(&self) -> bool {
        self.monitor.busy_gate().is_held()
    }

    /// Status snapshot for indicators.
    pub fn status(&self) -> Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.monitor.status())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// The event log, oldest first.
    #[wasm_bindgen(js_name = "eventLog")]
    pub fn event_log(&self) -> Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.monitor.event_log())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = "lastError")]
    pub fn last_error(&self) -> Option<String> {
        self.monitor.last_error()
    }
}

impl Drop for WasmMonitor {
    fn drop(&mut self) {
        self.frame_loop.cancel();
        self.monitor.disconnect();
    }
}
