//! Effect identifiers and allocation.
//!
//! An [`EffectId`] is the number callers use to refer to a running effect.
//! Ids increase monotonically for the lifetime of the process and are never
//! reused; the counter returns to 1 only when the whole registry is torn
//! down.

use std::sync::atomic::{AtomicU64, Ordering};

/// A running effect's public identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u64);

impl EffectId {
    /// Create an id from a raw value.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates monotonically increasing effect ids, safe to share across tasks.
#[derive(Debug)]
pub struct EffectIdAllocator {
    next_id: AtomicU64,
}

impl EffectIdAllocator {
    /// Creates a new allocator. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh id.
    pub fn allocate(&self) -> EffectId {
        EffectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of ids allocated since the last reset.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    /// Restart allocation at 1. Only valid once every effect is gone.
    pub fn reset(&self) {
        self.next_id.store(1, Ordering::Relaxed);
    }
}

impl Default for EffectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
