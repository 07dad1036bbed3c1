//! Engine capability surface backed by a JavaScript object.
//!
//! The renderer lives in JS land (WebGL, WebAudio). [`JsEngine`] wraps a JS
//! factory `(wsUrl, apiBase) => session`; [`JsSession`] forwards every
//! [`LiveSession`] call to the same-named method on that session object via
//! `Reflect`.
//!
//! Expected JS session shape:
//!
//! ```text
//! handshake()                         -> Promise<void>
//! join_room(roomId) / leave_room()
//! poll_events()                       -> Array<{type: "room_joined", count} | ...>
//! tick(timestampMs)
//! is_connected()                      -> boolean
//! close()
//! create_scene(playerId, renderTargetId)
//! attach_canvas(playerId, renderTargetId, canvas)
//! destroy_scene(playerId) / detach_canvas(playerId)
//! load_scene_resource_pack(playerId, {name: Uint8Array}) -> Promise<void>
//! resize_scene(playerId, width, height)
//! resume_audio()
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array};
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlCanvasElement;

use live_monitor::{
    ChannelError, ConnectionError, Endpoint, Engine, LiveSession, PlayerId, RenderTargetId,
    ResourceLoadError, ResourcePack, RoomEvent, RoomId, SceneError, TickError,
};

/// Canvases shared between the bindings and the sessions.
pub type CanvasRegistry = Rc<RefCell<SceneCanvases>>;

/// The canvas bound to each player's scene, keyed by player.
///
/// An entry lives from `attachCanvas` until the engine destroys the scene,
/// whichever path tears it down. Lookups also match the render target, so a
/// canvas registered for an earlier scene is never handed to a newer one.
#[derive(Debug)]
pub struct SceneCanvases<C = HtmlCanvasElement> {
    by_player: HashMap<PlayerId, (RenderTargetId, C)>,
}

impl<C> Default for SceneCanvases<C> {
    fn default() -> Self {
        Self {
            by_player: HashMap::new(),
        }
    }
}

impl<C: Clone> SceneCanvases<C> {
    /// Bind `canvas` to `player`'s scene `target`, replacing any older entry.
    pub fn insert(&mut self, player: PlayerId, target: RenderTargetId, canvas: C) {
        self.by_player.insert(player, (target, canvas));
    }

    /// Canvas for `player`'s scene, if it was registered for `target`.
    pub fn get(&self, player: PlayerId, target: RenderTargetId) -> Option<C> {
        self.by_player
            .get(&player)
            .filter(|(registered, _)| *registered == target)
            .map(|(_, canvas)| canvas.clone())
    }

    /// Drop `player`'s entry. Returns true if one existed.
    pub fn release(&mut self, player: PlayerId) -> bool {
        self.by_player.remove(&player).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.by_player.clear();
    }

    /// Number of registered canvases.
    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}

/// Failure calling into the JS session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// The session object lacks the method.
    #[error("JS session has no method {0}()")]
    MissingMethod(&'static str),
    /// The method threw or its promise rejected.
    #[error("{method}() threw: {detail}")]
    Threw {
        /// Method name.
        method: &'static str,
        /// Stringified exception.
        detail: String,
    },
}

/// Render a thrown JS value for logs.
pub fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{value:?}")
}

fn target_value(target: RenderTargetId) -> JsValue {
    JsValue::from_f64(target as f64)
}

/// Factory wrapping a JS session constructor.
#[derive(Debug)]
pub struct JsEngine {
    factory: Function,
    canvases: CanvasRegistry,
}

impl JsEngine {
    /// Wrap `factory`. Canvases are resolved from `canvases` on attach.
    pub fn new(factory: Function, canvases: CanvasRegistry) -> Self {
        Self { factory, canvases }
    }
}

impl Engine for JsEngine {
    fn construct(&self, endpoint: &Endpoint) -> Result<Rc<dyn LiveSession>, ConnectionError> {
        let inner = self
            .factory
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(&endpoint.ws_url),
                &JsValue::from_str(&endpoint.api_base),
            )
            .map_err(|e| ConnectionError::Network(describe(&e)))?;

        if !inner.is_object() {
            return Err(ConnectionError::Network(
                "engine factory did not return a session object".into(),
            ));
        }

        Ok(Rc::new(JsSession {
            inner,
            canvases: Rc::clone(&self.canvases),
        }))
    }
}

/// A JS session object behind the [`LiveSession`] trait.
#[derive(Debug)]
pub struct JsSession {
    inner: JsValue,
    canvases: CanvasRegistry,
}

impl JsSession {
    fn call(&self, method: &'static str, args: &[JsValue]) -> Result<JsValue, BindingError> {
        let function = Reflect::get(&self.inner, &JsValue::from_str(method))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or(BindingError::MissingMethod(method))?;

        let args: Array = args.iter().collect();
        function
            .apply(&self.inner, &args)
            .map_err(|e| BindingError::Threw {
                method,
                detail: describe(&e),
            })
    }

    async fn call_async(&self, method: &'static str, args: &[JsValue]) -> Result<JsValue, BindingError> {
        let value = self.call(method, args)?;
        JsFuture::from(Promise::resolve(&value))
            .await
            .map_err(|e| BindingError::Threw {
                method,
                detail: describe(&e),
            })
    }
}

#[async_trait(?Send)]
impl LiveSession for JsSession {
    async fn handshake(&self) -> Result<(), ConnectionError> {
        self.call_async("handshake", &[])
            .await
            .map(|_| ())
            .map_err(|e| ConnectionError::Handshake(e.to_string()))
    }

    fn join_room(&self, room_id: &RoomId) -> Result<(), ChannelError> {
        self.call("join_room", &[JsValue::from_str(room_id.as_str())])
            .map(|_| ())
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    fn leave_room(&self) -> Result<(), ChannelError> {
        self.call("leave_room", &[])
            .map(|_| ())
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    fn poll_events(&self) -> Vec<RoomEvent> {
        let value = match self.call("poll_events", &[]) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("poll_events failed: {e}");
                return Vec::new();
            }
        };
        let Ok(array) = value.dyn_into::<Array>() else {
            return Vec::new();
        };

        array
            .iter()
            .filter_map(|item| match serde_wasm_bindgen::from_value::<RoomEvent>(item) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("Skipping undecodable room event: {e}");
                    None
                }
            })
            .collect()
    }

    fn tick(&self, timestamp_ms: f64) -> Result<(), TickError> {
        self.call("tick", &[JsValue::from_f64(timestamp_ms)])
            .map(|_| ())
            .map_err(|e| TickError(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.call("is_connected", &[])
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn close(&self) -> Result<(), ChannelError> {
        self.call("close", &[])
            .map(|_| ())
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    fn create_scene(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError> {
        self.call("create_scene", &[JsValue::from(player), target_value(target)])
            .map(|_| ())
            .map_err(|e| SceneError::Create {
                player,
                detail: e.to_string(),
            })
    }

    fn attach_canvas(&self, player: PlayerId, target: RenderTargetId) -> Result<(), SceneError> {
        let canvas = self
            .canvases
            .borrow()
            .get(player, target)
            .ok_or_else(|| SceneError::Attach {
                player,
                detail: format!("no canvas registered for render target {target}"),
            })?;

        self.call(
            "attach_canvas",
            &[JsValue::from(player), target_value(target), canvas.into()],
        )
        .map(|_| ())
        .map_err(|e| SceneError::Attach {
            player,
            detail: e.to_string(),
        })
    }

    fn destroy_scene(&self, player: PlayerId) -> Result<(), SceneError> {
        self.canvases.borrow_mut().release(player);
        self.call("destroy_scene", &[JsValue::from(player)])
            .map(|_| ())
            .map_err(|e| SceneError::Destroy {
                player,
                detail: e.to_string(),
            })
    }

    fn detach_canvas(&self, player: PlayerId) -> Result<(), SceneError> {
        self.call("detach_canvas", &[JsValue::from(player)])
            .map(|_| ())
            .map_err(|e| SceneError::Destroy {
                player,
                detail: e.to_string(),
            })
    }

    async fn load_scene_resource_pack(
        &self,
        player: PlayerId,
        pack: Arc<ResourcePack>,
    ) -> Result<(), ResourceLoadError> {
        let engine_err = |detail: String| ResourceLoadError::Engine { player, detail };

        let assets = Object::new();
        for (name, bytes) in pack.iter() {
            Reflect::set(
                &assets,
                &JsValue::from_str(name),
                &Uint8Array::from(bytes).into(),
            )
            .map_err(|e| engine_err(describe(&e)))?;
        }

        self.call_async(
            "load_scene_resource_pack",
            &[JsValue::from(player), assets.into()],
        )
        .await
        .map(|_| ())
        .map_err(|e| engine_err(e.to_string()))
    }

    fn resize_scene(&self, player: PlayerId, width: u32, height: u32) -> Result<(), SceneError> {
        self.call(
            "resize_scene",
            &[JsValue::from(player), JsValue::from(width), JsValue::from(height)],
        )
        .map(|_| ())
        .map_err(|e| SceneError::Resize {
            player,
            detail: e.to_string(),
        })
    }

    fn resume_audio(&self) {
        if let Err(e) = self.call("resume_audio", &[]) {
            log::warn!("resume_audio failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_lookup_requires_matching_target() {
        let mut canvases = SceneCanvases::default();
        canvases.insert(3, 10, "first");

        assert_eq!(canvases.get(3, 10), Some("first"));
        assert_eq!(canvases.get(3, 11), None);
        assert_eq!(canvases.get(4, 10), None);
    }

    #[test]
    fn test_readded_scene_replaces_entry() {
        let mut canvases = SceneCanvases::default();
        canvases.insert(3, 10, "first");
        canvases.insert(3, 12, "second");

        assert_eq!(canvases.len(), 1);
        assert_eq!(canvases.get(3, 10), None);
        assert_eq!(canvases.get(3, 12), Some("second"));
    }

    #[test]
    fn test_release_drops_entry() {
        let mut canvases = SceneCanvases::default();
        canvases.insert(3, 10, "first");
        canvases.insert(5, 11, "other");

        assert!(canvases.release(3));
        assert!(!canvases.release(3));
        assert_eq!(canvases.get(3, 10), None);
        assert_eq!(canvases.len(), 1);

        canvases.clear();
        assert!(canvases.is_empty());
    }
}
