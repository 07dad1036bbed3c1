//! Scene registry with an explicit per-scene phase machine.
//!
//! The registry holds one [`SceneHandle`] per monitored player and allocates
//! render target ids from a monotonic counter.
//!
//! # Phases
//!
//! ```text
//! allocate()        attach()            mark_ready()
//!     │                │                     │
//!     ▼                ▼                     ▼
//! Allocated ──────► Attached ────────────► Ready
//!     │                │                     │
//!     └────────────────┴──── remove() ───────┴──► Destroyed (evicted)
//! ```
//!
//! Transitions are guarded: attaching twice, readying a scene that is not
//! attached, or touching an unknown player are no-ops. Destroyed handles are
//! returned to the caller and never stay in the registry, so there is at most
//! one live handle per player.

use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::engine::RenderSurface;
use crate::protocol::{PlayerId, RenderTargetId};

/// Lifecycle phase of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenePhase {
    /// Handle and engine scene exist; no drawable surface yet.
    Allocated,
    /// Bound to a drawable surface; renders without the resource pack.
    Attached,
    /// Resource pack loaded.
    Ready,
    /// Torn down.
    Destroyed,
}

impl ScenePhase {
    /// True once a surface is bound (`Attached` or `Ready`).
    pub fn is_attached(self) -> bool {
        matches!(self, ScenePhase::Attached | ScenePhase::Ready)
    }
}

/// One monitored player's scene.
pub struct SceneHandle {
    player_id: PlayerId,
    render_target_id: RenderTargetId,
    phase: ScenePhase,
    surface: Option<Rc<dyn RenderSurface>>,
}

impl SceneHandle {
    /// Player this scene renders.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Render target id assigned at allocation.
    pub fn render_target_id(&self) -> RenderTargetId {
        self.render_target_id
    }

    /// Current phase.
    pub fn phase(&self) -> ScenePhase {
        self.phase
    }

    /// Bound surface, once attached.
    pub fn surface(&self) -> Option<&Rc<dyn RenderSurface>> {
        self.surface.as_ref()
    }
}

impl std::fmt::Debug for SceneHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneHandle")
            .field("player_id", &self.player_id)
            .field("render_target_id", &self.render_target_id)
            .field("phase", &self.phase)
            .field("has_surface", &self.surface.is_some())
            .finish()
    }
}

/// Result of [`SceneRegistry::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachTransition {
    /// `Allocated → Attached` happened now.
    Attached,
    /// Already attached; duplicate surface-ready notification ignored.
    AlreadyAttached,
    /// No live scene for the player.
    Unknown,
}

/// Registry of live scenes keyed by player.
#[derive(Debug)]
pub struct SceneRegistry {
    scenes: HashMap<PlayerId, SceneHandle>,
    /// Next render target id. Starts at 1; never decremented.
    next_render_target: RenderTargetId,
}

impl SceneRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            scenes: HashMap::new(),
            next_render_target: 1,
        }
    }

    /// Allocate a handle for `player` in [`ScenePhase::Allocated`].
    ///
    /// Returns the fresh render target id, or `None` if a live handle
    /// already exists for the player (nothing is allocated in that case).
    pub fn allocate(&mut self, player: PlayerId) -> Option<RenderTargetId> {
        if self.scenes.contains_key(&player) {
            return None;
        }

        let render_target_id = self.next_render_target;
        self.next_render_target += 1;

        self.scenes.insert(
            player,
            SceneHandle {
                player_id: player,
                render_target_id,
                phase: ScenePhase::Allocated,
                surface: None,
            },
        );
        Some(render_target_id)
    }

    /// Bind a surface, moving `Allocated → Attached` exactly once.
    pub fn attach(&mut self, player: PlayerId, surface: Rc<dyn RenderSurface>) -> AttachTransition {
        let Some(handle) = self.scenes.get_mut(&player) else {
            return AttachTransition::Unknown;
        };
        if handle.phase != ScenePhase::Allocated {
            return AttachTransition::AlreadyAttached;
        }
        handle.phase = ScenePhase::Attached;
        handle.surface = Some(surface);
        AttachTransition::Attached
    }

    /// Move `Attached → Ready` for the handle allocated as `target`.
    ///
    /// Returns `false` if the player has no live handle, the handle was
    /// recreated under a different render target, or it is not `Attached`.
    pub fn mark_ready(&mut self, player: PlayerId, target: RenderTargetId) -> bool {
        match self.scenes.get_mut(&player) {
            Some(handle)
                if handle.render_target_id == target && handle.phase == ScenePhase::Attached =>
            {
                handle.phase = ScenePhase::Ready;
                true
            }
            _ => false,
        }
    }

    /// True if `player` has a live handle allocated as `target`.
    pub fn is_live(&self, player: PlayerId, target: RenderTargetId) -> bool {
        self.scenes
            .get(&player)
            .is_some_and(|h| h.render_target_id == target)
    }

    /// Evict a handle, returning it in [`ScenePhase::Destroyed`].
    pub fn remove(&mut self, player: PlayerId) -> Option<SceneHandle> {
        let mut handle = self.scenes.remove(&player)?;
        handle.phase = ScenePhase::Destroyed;
        Some(handle)
    }

    /// Evict every handle, ordered by player id.
    pub fn drain(&mut self) -> Vec<SceneHandle> {
        let mut drained: Vec<SceneHandle> = self
            .scenes
            .drain()
            .map(|(_, mut handle)| {
                handle.phase = ScenePhase::Destroyed;
                handle
            })
            .collect();
        drained.sort_by_key(|h| h.player_id);
        drained
    }

    /// Get a live handle.
    pub fn get(&self, player: PlayerId) -> Option<&SceneHandle> {
        self.scenes.get(&player)
    }

    /// True if `player` has a live handle.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.scenes.contains_key(&player)
    }

    /// Live handles ordered by player id.
    pub fn handles(&self) -> Vec<&SceneHandle> {
        let mut handles: Vec<&SceneHandle> = self.scenes.values().collect();
        handles.sort_by_key(|h| h.player_id);
        handles
    }

    /// Players whose scene is attached but not yet ready, ordered by id.
    pub fn awaiting_resources(&self) -> Vec<(PlayerId, RenderTargetId)> {
        let mut waiting: Vec<_> = self
            .scenes
            .values()
            .filter(|h| h.phase == ScenePhase::Attached)
            .map(|h| (h.player_id, h.render_target_id))
            .collect();
        waiting.sort_unstable();
        waiting
    }

    /// Number of live scenes.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// True if no scene is live.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Count of live scenes in `phase`.
    pub fn count_in(&self, phase: ScenePhase) -> usize {
        self.scenes.values().filter(|h| h.phase == phase).count()
    }
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new()
    }
}
