//! Orchestrator-wide busy gate.
//!
//! Held while any scene resource pack is loading. The resize path and the
//! render tick consult the gate but never wait on it: while it is held,
//! resizes are deferred and ticks are skipped.
//!
//! The gate counts holders rather than storing a single flag, so two
//! overlapping loads keep it held until the last one finishes. Release is
//! tied to [`BusyGuard`]'s `Drop`, which makes an early return or an error
//! inside a load unable to leave the gate stuck.
//!
//! [`BusyGate::reset`] starts a new generation. Guards from an older
//! generation release nothing, so a load still pending on a torn-down
//! session cannot keep the gate held for the next one.

use std::cell::Cell;
use std::rc::Rc;

/// Shared busy gate. Cloning yields another view of the same gate.
#[derive(Debug, Clone, Default)]
pub struct BusyGate {
    inner: Rc<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    holders: Cell<usize>,
    generation: Cell<u64>,
}

impl BusyGate {
    /// Create a clear gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the gate until the returned guard is dropped.
    #[must_use = "the gate is released as soon as the guard is dropped"]
    pub fn acquire(&self) -> BusyGuard {
        let state = &self.inner;
        state.holders.set(state.holders.get() + 1);
        BusyGuard {
            gate: Rc::clone(state),
            generation: state.generation.get(),
        }
    }

    /// Clear the gate and orphan every outstanding guard.
    ///
    /// Returns the number of holders that were released.
    pub fn reset(&self) -> usize {
        let state = &self.inner;
        state.generation.set(state.generation.get() + 1);
        state.holders.replace(0)
    }

    /// True while at least one guard is alive.
    pub fn is_held(&self) -> bool {
        self.inner.holders.get() > 0
    }

    /// Number of live guards in the current generation.
    pub fn holders(&self) -> usize {
        self.inner.holders.get()
    }
}

/// RAII holder of a [`BusyGate`].
#[derive(Debug)]
pub struct BusyGuard {
    gate: Rc<GateState>,
    generation: u64,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.gate.generation.get() != self.generation {
            return;
        }
        self.gate
            .holders
            .set(self.gate.holders.get().saturating_sub(1));
    }
}
