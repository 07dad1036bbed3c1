//! Surface/engine size synchronization.
//!
//! The host reports the displayed size of each scene's container. The
//! coordinator decides whether that size must be applied now, deferred until
//! the [`BusyGate`](crate::BusyGate) clears (or the scene attaches), or
//! ignored. Applying is the orchestrator's job: it sets the drawable
//! surface's buffer size and the engine's scene size in one step.
//!
//! Deferred sizes are kept per player; a newer observation replaces an older
//! one, so a burst of layout changes during a load collapses into a single
//! resize when the gate clears.

use std::collections::HashMap;

use serde::Serialize;

use crate::protocol::PlayerId;

/// Pixel size of a scene's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SurfaceSize {
    /// Create a size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero (container hidden or collapsed).
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What to do with an observed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDecision {
    /// Nothing to do.
    Ignore,
    /// Apply this size now.
    Apply(SurfaceSize),
    /// Recorded as pending.
    Defer,
    /// Applying was attempted but the engine refused the size. Only the
    /// orchestrator reports this; nothing changed on screen.
    Rejected,
}

/// Per-player resize bookkeeping.
#[derive(Debug, Default)]
pub struct ResizeCoordinator {
    applied: HashMap<PlayerId, SurfaceSize>,
    pending: HashMap<PlayerId, SurfaceSize>,
}

impl ResizeCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what to do with a newly observed container size.
    ///
    /// `can_apply` is true when the scene is attached and the busy gate is
    /// clear. When it is false the size is stored as pending.
    pub fn observe(&mut self, player: PlayerId, size: SurfaceSize, can_apply: bool) -> ResizeDecision {
        if size.is_empty() {
            return ResizeDecision::Ignore;
        }

        if self.applied.get(&player) == Some(&size) {
            // Latest observation matches what is on screen; any older
            // pending size is obsolete.
            self.pending.remove(&player);
            return ResizeDecision::Ignore;
        }

        if can_apply {
            self.pending.remove(&player);
            ResizeDecision::Apply(size)
        } else {
            self.pending.insert(player, size);
            ResizeDecision::Defer
        }
    }

    /// Record that `size` is now applied to both surface and engine.
    pub fn record_applied(&mut self, player: PlayerId, size: SurfaceSize) {
        self.applied.insert(player, size);
    }

    /// Consume the pending size for `player`.
    pub fn take_pending(&mut self, player: PlayerId) -> Option<SurfaceSize> {
        self.pending.remove(&player)
    }

    /// Pending size for `player`, without consuming it.
    pub fn pending(&self, player: PlayerId) -> Option<SurfaceSize> {
        self.pending.get(&player).copied()
    }

    /// Number of players with a pending resize.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Last size applied for `player`.
    pub fn applied(&self, player: PlayerId) -> Option<SurfaceSize> {
        self.applied.get(&player).copied()
    }

    /// Drop all state for a removed scene.
    pub fn forget(&mut self, player: PlayerId) {
        self.applied.remove(&player);
        self.pending.remove(&player);
    }

    /// Drop all state.
    pub fn clear(&mut self) {
        self.applied.clear();
        self.pending.clear();
    }
}
