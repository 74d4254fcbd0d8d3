// SPDX-License-Identifier: MIT
//
// Typed listener lists.
//
// Every event the engine emits has its own payload type and its own list,
// so a handler's signature is checked at compile time. Registration hands
// back a `ListenerId` that removes exactly that handler later.
//
// Emission is synchronous and in registration order. Handlers receive a
// shared reference to the payload and can't reach back into the emitter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scroll::ScrollStep;

/// Process-wide so ids from different lists never collide.
static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler<E> = Box<dyn FnMut(&E)>;

/// An ordered list of handlers for one event type.
pub struct Listeners<E> {
    handlers: Vec<(ListenerId, Handler<E>)>,
}

impl<E> Listeners<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn add(&mut self, handler: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId::next();
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` wasn't registered here.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    /// Call every handler with `event`. Returns how many ran.
    pub fn emit(&mut self, event: &E) -> usize {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
        self.handlers.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.iter().map(|(id, _)| id)).finish()
    }
}

// ─── Payloads ───────────────────────────────────────────────────────────────

/// Emitted after every scroll request that reached a live screen, whether
/// or not the view moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollEvent {
    pub step: ScrollStep,
    pub base: usize,
    pub offset: usize,
    /// The move was done with a hardware line shift instead of a redraw.
    pub hardware: bool,
}

/// Emitted after the grids were reallocated for a new terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub cols: u16,
    pub rows: u16,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
