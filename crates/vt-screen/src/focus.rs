// SPDX-License-Identifier: MIT
//
// Focus history.
//
// The widget layer owns the focusable things; the engine only needs to know
// how to compare them and whether they can still take focus. History is a
// bounded stack: the top is the focused target, and popping returns to the
// nearest earlier target that's still attached and visible.
//
// A single save slot, independent of the stack, lets a modal dialog grab
// focus and hand it back afterwards.

use crate::events::{ListenerId, Listeners};

/// Deepest the history stack grows before the oldest entry is evicted.
pub const HISTORY_DEPTH: usize = 10;

/// Something that can hold keyboard focus.
pub trait FocusTarget: Clone + PartialEq {
    /// Still part of the widget tree.
    fn is_attached(&self) -> bool;

    fn is_visible(&self) -> bool {
        true
    }

    /// Whether the target can take focus right now.
    fn is_focusable(&self) -> bool {
        self.is_attached() && self.is_visible()
    }
}

/// `target` gained focus from `previous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusEvent<T> {
    pub target: T,
    pub previous: Option<T>,
}

/// `target` lost focus to `next`. `next` is `None` when nothing took over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurEvent<T> {
    pub target: T,
    pub next: Option<T>,
}

pub struct FocusHistory<T> {
    stack: Vec<T>,
    saved: Option<T>,
    on_focus: Listeners<FocusEvent<T>>,
    on_blur: Listeners<BlurEvent<T>>,
}

impl<T: FocusTarget> FocusHistory<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stack: Vec::new(),
            saved: None,
            on_focus: Listeners::new(),
            on_blur: Listeners::new(),
        }
    }

    pub fn on_focus(&mut self, handler: impl FnMut(&FocusEvent<T>) + 'static) -> ListenerId {
        self.on_focus.add(handler)
    }

    pub fn on_blur(&mut self, handler: impl FnMut(&BlurEvent<T>) + 'static) -> ListenerId {
        self.on_blur.add(handler)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.on_focus.remove(id) || self.on_blur.remove(id)
    }

    /// The focused target.
    #[must_use]
    pub fn focused(&self) -> Option<&T> {
        self.stack.last()
    }

    /// History, oldest first.
    #[must_use]
    pub fn history(&self) -> &[T] {
        &self.stack
    }

    /// Focus `target`, blurring the previous one.
    pub fn push(&mut self, target: T) {
        let old = self.stack.last().cloned();
        if self.stack.len() == HISTORY_DEPTH {
            self.stack.remove(0);
        }
        self.stack.push(target.clone());
        self.transfer(target, old);
    }

    /// Drop the focused target and return focus to the nearest earlier
    /// target that can still take it. Returns the dropped target.
    pub fn pop(&mut self) -> Option<T> {
        let old = self.stack.pop()?;
        self.refocus(old.clone());
        Some(old)
    }

    /// Like [`pop`](Self::pop), but returns the target that ends up focused.
    pub fn rewind(&mut self) -> Option<T> {
        let old = self.stack.pop()?;
        self.refocus(old)
    }

    /// Remember the focused target for [`restore`](Self::restore).
    pub fn save(&mut self) -> Option<&T> {
        self.saved = self.stack.last().cloned();
        self.saved.as_ref()
    }

    /// Refocus the saved target and clear the slot.
    pub fn restore(&mut self) -> Option<&T> {
        let saved = self.saved.take()?;
        self.push(saved);
        self.focused()
    }

    /// Move focus `n` steps through `ring` from the focused target, skipping
    /// targets that can't take focus. Negative `n` walks backwards.
    ///
    /// Nothing happens when no target in `ring` can take focus or the
    /// focused target isn't in `ring`.
    pub fn offset(&mut self, ring: &[T], n: isize) -> Option<&T> {
        if n == 0 || !ring.iter().any(FocusTarget::is_focusable) {
            return None;
        }
        let focused = self.stack.last()?;
        let mut i = ring.iter().position(|t| t == focused)?;

        let len = ring.len();
        let mut steps = n.unsigned_abs();
        while steps > 0 {
            i = if n > 0 { (i + 1) % len } else { (i + len - 1) % len };
            if ring[i].is_focusable() {
                steps -= 1;
            }
        }

        self.push(ring[i].clone());
        self.focused()
    }

    pub fn next(&mut self, ring: &[T]) -> Option<&T> {
        self.offset(ring, 1)
    }

    pub fn prev(&mut self, ring: &[T]) -> Option<&T> {
        self.offset(ring, -1)
    }

    /// After `old` left the stack, unwind to the nearest focusable entry.
    /// With none left, `old` is blurred with nothing taking over.
    fn refocus(&mut self, old: T) -> Option<T> {
        while let Some(top) = self.stack.last() {
            if top.is_focusable() {
                let top = top.clone();
                self.transfer(top.clone(), Some(old));
                return Some(top);
            }
            self.stack.pop();
        }
        self.on_blur.emit(&BlurEvent { target: old, next: None });
        None
    }

    fn transfer(&mut self, target: T, previous: Option<T>) {
        if let Some(prev) = previous.clone() {
            self.on_blur.emit(&BlurEvent { target: prev, next: Some(target.clone()) });
        }
        self.on_focus.emit(&FocusEvent { target, previous });
    }
}

impl<T: FocusTarget> Default for FocusHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for FocusHistory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusHistory")
            .field("stack", &self.stack)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
