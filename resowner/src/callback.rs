//! Add-on release callbacks.
//!
//! Modules that keep resources of their own (outside the four built-in
//! registries) can register a callback to run on every owner visited by
//! every release phase. A callback runs after the built-in work for that
//! owner is done, so it can only do noncritical cleanup.

use crate::error::CollaboratorError;
use crate::release::ReleasePhase;
use crate::tree::OwnerId;

/// What a callback is told about the release in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub phase: ReleasePhase,
    pub is_commit: bool,
    pub is_top_level: bool,
    /// The owner whose resources were just released.
    pub owner: OwnerId,
}

pub type ReleaseCallback = Box<dyn FnMut(&ReleaseInfo) -> Result<(), CollaboratorError>>;

/// Token returned by [`CallbackRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

#[derive(Default)]
pub struct CallbackRegistry {
    // newest last; iterated in reverse
    items: Vec<(CallbackId, ReleaseCallback)>,
    next_id: u64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: ReleaseCallback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.items.push((id, callback));
        id
    }

    /// Returns `false` if `id` was not registered (or already removed).
    pub fn unregister(&mut self, id: CallbackId) -> bool {
        match self.items.iter().position(|(item, _)| *item == id) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Run every callback, most recently registered first. Stops at the
    /// first failure.
    pub(crate) fn run(&mut self, info: &ReleaseInfo) -> Result<(), CollaboratorError> {
        for (_, callback) in self.items.iter_mut().rev() {
            callback(info)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallbackRegistry").field("len", &self.items.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::OwnerTree;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn info() -> ReleaseInfo {
        let mut tree = OwnerTree::new();
        let owner = tree.create(None, "owner".into());
        ReleaseInfo { phase: ReleasePhase::BeforeLocks, is_commit: true, is_top_level: false, owner }
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> ReleaseCallback {
        let log = Rc::clone(log);
        Box::new(move |_| {
            log.borrow_mut().push(tag);
            Ok(())
        })
    }

    #[test]
    fn newest_runs_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CallbackRegistry::new();
        registry.register(recorder(&log, "first"));
        registry.register(recorder(&log, "second"));

        registry.run(&info()).unwrap();
        assert_eq!(*log.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn unregister_removes_only_that_entry() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CallbackRegistry::new();
        let a = registry.register(recorder(&log, "a"));
        let _b = registry.register(recorder(&log, "b"));

        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));
        assert_eq!(registry.len(), 1);

        registry.run(&info()).unwrap();
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn failure_stops_the_walk() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CallbackRegistry::new();
        registry.register(recorder(&log, "never"));
        registry.register(Box::new(|_| Err("boom".into())));

        assert!(registry.run(&info()).is_err());
        assert!(log.borrow().is_empty());
    }
}
