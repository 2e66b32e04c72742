//! Growable per-owner records of held references.
//!
//! Every owner carries one [`Registry`] per [`ResourceKind`]. They all work
//! the same way, so there's one generic implementation here instead of four
//! copies.
//!
//! The split between [`Registry::enlarge`] and [`Registry::remember`] is the
//! important part of the interface: if we run out of memory it has to happen
//! *before* the resource is acquired, otherwise we'd end up holding something
//! that nobody is going to release.
//!
//! [`ResourceKind`]: crate::ResourceKind

use crate::error::{Result, TrackerError};
use crate::handle::ResourceHandle;

/// Capacity used for the first allocation of an empty registry.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct Registry<H> {
    items: Vec<H>,
    /// Logical capacity. `items.capacity()` is at least this, but the growth
    /// policy is ours, not `Vec`'s.
    capacity: usize,
}

impl<H: ResourceHandle> Registry<H> {
    pub const fn new() -> Self {
        Self { items: Vec::new(), capacity: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The held handles, oldest first.
    #[inline]
    pub fn as_slice(&self) -> &[H] {
        &self.items
    }

    /// The most recently remembered handle still held.
    #[inline]
    pub fn last(&self) -> Option<H> {
        self.items.last().copied()
    }

    pub fn contains(&self, handle: H) -> bool {
        self.items.contains(&handle)
    }

    /// Make sure there is room for at least one more entry.
    ///
    /// An empty backing store gets `initial_capacity` slots, a full one is
    /// doubled.
    pub fn enlarge(&mut self, initial_capacity: usize) -> Result<()> {
        if self.items.len() < self.capacity {
            return Ok(());
        }

        let requested = if self.capacity == 0 {
            initial_capacity.max(1)
        } else {
            self.capacity.saturating_mul(2)
        };
        self.items.try_reserve_exact(requested - self.items.len()).map_err(|source| {
            TrackerError::OutOfMemory { kind: H::KIND, requested, source }
        })?;
        self.capacity = requested;
        Ok(())
    }

    /// Record `handle`. The caller must have called [`Registry::enlarge`]
    /// first.
    ///
    /// Returns `false`, recording nothing, if there is no room.
    #[must_use]
    pub fn remember(&mut self, handle: H) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        debug_assert!(!self.items.contains(&handle), "{} {handle} remembered twice", H::KIND);
        self.items.push(handle);
        true
    }

    /// Remove the entry for `handle`.
    ///
    /// The scan goes back-to-front, since what's being released is usually
    /// what was acquired last. In that case no entries have to be shifted.
    /// Returns `false` if `handle` isn't recorded.
    #[must_use]
    pub fn forget(&mut self, handle: H) -> bool {
        match self.items.iter().rposition(|h| *h == handle) {
            Some(pos) => {
                // `Vec::remove` shifts the tail down by one, which is free
                // when `pos` is the last index.
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl<H: ResourceHandle> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}
