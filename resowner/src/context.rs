//! The current (active) owner.
//!
//! Code that acquires a resource on behalf of "whatever scope we're in" asks
//! the tracker for [`ResourceTracker::current_owner`]. Anything that changes
//! it temporarily must put the old value back on every way out, including
//! early `?` returns and panics, or a failure deep in a release pass would
//! leave the next acquisition charged to the wrong owner.
//!
//! [`CurrentOwnerGuard`] does that: it swaps the new owner in when created
//! and restores the saved one when dropped.

use crate::tracker::ResourceTracker;
use crate::tree::OwnerId;
use core::ops::{Deref, DerefMut};

#[must_use = "the previous owner is restored as soon as the guard is dropped"]
pub struct CurrentOwnerGuard<'a> {
    tracker: &'a mut ResourceTracker,
    saved: Option<OwnerId>,
}

impl<'a> CurrentOwnerGuard<'a> {
    pub(crate) fn new(tracker: &'a mut ResourceTracker, owner: Option<OwnerId>) -> Self {
        let saved = core::mem::replace(&mut tracker.current, owner);
        Self { tracker, saved }
    }

    /// The owner that will be restored.
    pub fn saved(&self) -> Option<OwnerId> {
        self.saved
    }
}

impl Deref for CurrentOwnerGuard<'_> {
    type Target = ResourceTracker;

    fn deref(&self) -> &ResourceTracker {
        self.tracker
    }
}

impl DerefMut for CurrentOwnerGuard<'_> {
    fn deref_mut(&mut self) -> &mut ResourceTracker {
        self.tracker
    }
}

impl Drop for CurrentOwnerGuard<'_> {
    fn drop(&mut self) {
        self.tracker.current = self.saved;
    }
}

#[cfg(test)]
mod tests {
    use crate::ResourceTracker;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn restores_on_drop() {
        let mut tracker = ResourceTracker::default();
        let outer = tracker.create_owner(None, "outer");
        let inner = tracker.create_owner(Some(outer), "inner");
        tracker.set_current_owner(Some(outer));

        {
            let guard = tracker.enter(Some(inner));
            assert_eq!(guard.current_owner(), Some(inner));
            assert_eq!(guard.saved(), Some(outer));
        }
        assert_eq!(tracker.current_owner(), Some(outer));
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let mut tracker = ResourceTracker::default();
        let a = tracker.create_owner(None, "a");
        let b = tracker.create_owner(Some(a), "b");

        tracker.with_current_owner(a, |tracker| {
            tracker.with_current_owner(b, |tracker| {
                assert_eq!(tracker.current_owner(), Some(b));
            });
            assert_eq!(tracker.current_owner(), Some(a));
        });
        assert_eq!(tracker.current_owner(), None);
    }

    #[test]
    fn restores_on_panic() {
        let mut tracker = ResourceTracker::default();
        let a = tracker.create_owner(None, "a");

        let result = catch_unwind(AssertUnwindSafe(|| {
            tracker.with_current_owner(a, |_| panic!("error in scope"));
        }));
        assert!(result.is_err());
        assert_eq!(tracker.current_owner(), None);
    }
}
