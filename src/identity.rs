//! Identity
//!
//! Handles are plain integers so they double as keys into a `SparseSet`.

use std::fmt::Display;

/// Opaque identifier of one sound source. Corresponds to exactly one slot in the position store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(usize);

/// Stable handle of a macro group. Never reused while the hub is alive, names are looked up separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacroId(usize);

impl From<usize> for SourceId {
    fn from(id: usize) -> Self {
        SourceId(id)
    }
}

impl From<SourceId> for usize {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source {}", self.0)
    }
}

impl From<usize> for MacroId {
    fn from(id: usize) -> Self {
        MacroId(id)
    }
}

impl From<MacroId> for usize {
    fn from(id: MacroId) -> Self {
        id.0
    }
}

impl Display for MacroId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "macro #{}", self.0)
    }
}

/// Hands out increasing handles, the hub keeps one per handle kind
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator { next: 0 }
    }

    pub fn allocate<T: From<usize>>(&mut self) -> T {
        let id = self.next;
        self.next += 1;
        T::from(id)
    }

    /// Makes sure future handles never collide with one chosen by the caller
    pub fn reserve(&mut self, id: usize) {
        if id >= self.next {
            self.next = id.saturating_add(1);
        }
    }
}
