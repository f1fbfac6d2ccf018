//! Depth-tracked state stack shared by the content and settings readers.
//!
//! A state is pushed together with the element depth at which it was
//! entered. It is popped on the end event that brings the depth back to that
//! value, so any amount of unrelated markup nested inside an element leaves
//! the stack alone.

use smallvec::SmallVec;

use super::constants::{DATA_HANDLER_LIMIT, STACK_SIZE};

/// Bounded stack of `(state, entry depth)` pairs.
///
/// The bottom entry is the reader's default state; it is never popped.
#[derive(Debug, Clone)]
pub struct StateStack<T: Copy> {
    entries: SmallVec<[(T, usize); STACK_SIZE]>,
    depth: usize,
}

/// Pushing would exceed [`STACK_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackOverflow;

impl<T: Copy + PartialEq> StateStack<T> {
    pub fn new(default: T) -> Self {
        let mut entries = SmallVec::new();
        entries.push((default, 0));
        Self { entries, depth: 0 }
    }

    /// Current state.
    pub fn top(&self) -> T {
        // the default entry is never popped
        self.entries[self.entries.len() - 1].0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Enter `state` at the current depth. Call before [`Self::enter_element`].
    pub fn push(&mut self, state: T) -> Result<(), StackOverflow> {
        if self.entries.len() >= STACK_SIZE {
            return Err(StackOverflow);
        }
        self.entries.push((state, self.depth));
        Ok(())
    }

    pub fn enter_element(&mut self) {
        self.depth += 1;
    }

    /// Leave an element; returns the state that ends with it, if any.
    pub fn leave_element(&mut self) -> Option<T> {
        self.depth = self.depth.saturating_sub(1);
        if self.entries.len() > 1 && self.entries[self.entries.len() - 1].1 == self.depth {
            return self.entries.pop().map(|(state, _)| state);
        }
        None
    }
}

/// Counts character-data events between element events.
///
/// Entity-expansion attacks produce huge runs of text and reference events
/// with no markup in between; a run longer than [`DATA_HANDLER_LIMIT`] is
/// treated as a corrupted document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataGuard {
    consecutive: usize,
}

impl DataGuard {
    #[inline]
    pub fn element(&mut self) {
        self.consecutive = 0;
    }

    /// Record one data event; `false` once the limit is reached.
    #[inline]
    pub fn data(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive < DATA_HANDLER_LIMIT
    }
}
