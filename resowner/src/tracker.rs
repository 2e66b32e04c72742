//! The tracker: owner tree, current owner, release callbacks.
//!
//! One [`ResourceTracker`] exists per execution context (a backend session,
//! typically). It is not `Sync` and does no locking of its own.
//!
//! # Acquiring a resource
//!
//! ```
//! use resowner::{Buffer, ResourceTracker};
//!
//! let mut tracker = ResourceTracker::default();
//! let owner = tracker.create_owner(None, "TopTransaction");
//!
//! // Make room first: if this fails, nothing has been acquired yet.
//! tracker.enlarge_buffers(Some(owner))?;
//! let buffer = Buffer(42); // ... pin it in the buffer pool ...
//! tracker.remember_buffer(Some(owner), buffer);
//!
//! // ... and when done with it:
//! tracker.forget_buffer(Some(owner), buffer);
//! tracker.delete_owner(owner);
//! # Ok::<(), resowner::TrackerError>(())
//! ```

use crate::callback::{CallbackId, CallbackRegistry, ReleaseInfo};
use crate::config::TrackerConfig;
use crate::context::CurrentOwnerGuard;
use crate::error::{internal_error, CollaboratorError, Result};
use crate::handle::{Buffer, ReferenceCounts, ResourceHandle};
use crate::tree::{OwnerId, OwnerTree};
use std::borrow::Cow;

#[derive(Debug)]
pub struct ResourceTracker {
    pub(crate) tree: OwnerTree,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) current: Option<OwnerId>,
    top_transaction: Option<OwnerId>,
    cur_transaction: Option<OwnerId>,
    pub(crate) config: TrackerConfig,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl ResourceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tree: OwnerTree::new(),
            callbacks: CallbackRegistry::new(),
            current: None,
            top_transaction: None,
            cur_transaction: None,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ----------------------------------------------------------------------
    // Owner tree
    // ----------------------------------------------------------------------

    /// Create an empty owner, as the newest child of `parent` if given.
    pub fn create_owner(
        &mut self,
        parent: Option<OwnerId>,
        name: impl Into<Cow<'static, str>>,
    ) -> OwnerId {
        let name = name.into();
        tracing::trace!(name = %name, ?parent, "creating resource owner");
        self.tree.create(parent, name)
    }

    /// Delete an owner and all of its descendants.
    ///
    /// Everything they held must already have been released, and none of
    /// them may be the current owner.
    #[track_caller]
    pub fn delete_owner(&mut self, owner: OwnerId) {
        let node = self.tree.node(owner);
        if self.current == Some(owner) {
            internal_error!("cannot delete the current resource owner \"{}\"", node.name());
        }
        if !node.holds_nothing() {
            internal_error!(
                "cannot delete resource owner \"{}\": it still holds references {:?}",
                node.name(),
                node.counts()
            );
        }

        // Each recursive call unlinks the child from us, so just keep going
        // until there are none left.
        while let Some(child) = self.tree.node(owner).first_child() {
            self.delete_owner(child);
        }

        // Unlink before freeing, so a failure can't leave a dangling entry in
        // the parent's child list.
        self.tree.reparent(owner, None);

        if self.top_transaction == Some(owner) {
            self.top_transaction = None;
        }
        if self.cur_transaction == Some(owner) {
            self.cur_transaction = None;
        }

        let node = self.tree.free(owner);
        tracing::trace!(name = node.name(), "deleted resource owner");
    }

    /// The parent of `owner`, or `None` for a top-level owner.
    #[track_caller]
    pub fn get_parent(&self, owner: OwnerId) -> Option<OwnerId> {
        self.tree.node(owner).parent()
    }

    /// Move `owner` under `new_parent`, or make it a root. What it holds moves
    /// with it.
    #[track_caller]
    pub fn reparent(&mut self, owner: OwnerId, new_parent: Option<OwnerId>) {
        tracing::trace!(
            name = self.tree.node(owner).name(),
            ?new_parent,
            "reassigning resource owner parent"
        );
        self.tree.reparent(owner, new_parent);
    }

    #[track_caller]
    pub fn owner_name(&self, owner: OwnerId) -> &str {
        self.tree.node(owner).name()
    }

    /// Children of `owner`, most recently attached first.
    #[track_caller]
    pub fn children(&self, owner: OwnerId) -> impl ExactSizeIterator<Item = OwnerId> + '_ {
        self.tree.node(owner).children()
    }

    /// Whether `owner` still names a live owner.
    pub fn exists(&self, owner: OwnerId) -> bool {
        self.tree.contains(owner)
    }

    /// Number of live owners.
    pub fn owner_count(&self) -> usize {
        self.tree.len()
    }

    #[track_caller]
    pub fn counts(&self, owner: OwnerId) -> ReferenceCounts {
        self.tree.node(owner).counts()
    }

    /// The handles of kind `H` held by `owner`, oldest first.
    #[track_caller]
    pub fn held<H: ResourceHandle>(&self, owner: OwnerId) -> &[H] {
        self.tree.node(owner).registry::<H>().as_slice()
    }

    #[track_caller]
    pub fn capacity<H: ResourceHandle>(&self, owner: OwnerId) -> usize {
        self.tree.node(owner).registry::<H>().capacity()
    }

    // ----------------------------------------------------------------------
    // Current and well-known owners
    // ----------------------------------------------------------------------

    #[inline]
    pub fn current_owner(&self) -> Option<OwnerId> {
        self.current
    }

    /// Replace the current owner outright. Prefer [`ResourceTracker::enter`]
    /// or [`ResourceTracker::with_current_owner`] for temporary switches.
    pub fn set_current_owner(&mut self, owner: Option<OwnerId>) {
        if let Some(owner) = owner {
            self.tree.node(owner);
        }
        self.current = owner;
    }

    /// Make `owner` current until the returned guard is dropped.
    pub fn enter(&mut self, owner: Option<OwnerId>) -> CurrentOwnerGuard<'_> {
        if let Some(owner) = owner {
            self.tree.node(owner);
        }
        CurrentOwnerGuard::new(self, owner)
    }

    /// Run `f` with `owner` as the current owner.
    pub fn with_current_owner<R>(
        &mut self,
        owner: OwnerId,
        f: impl FnOnce(&mut ResourceTracker) -> R,
    ) -> R {
        let mut guard = self.enter(Some(owner));
        f(&mut *guard)
    }

    #[inline]
    pub fn top_transaction_owner(&self) -> Option<OwnerId> {
        self.top_transaction
    }

    pub fn set_top_transaction_owner(&mut self, owner: Option<OwnerId>) {
        if let Some(owner) = owner {
            self.tree.node(owner);
        }
        self.top_transaction = owner;
    }

    #[inline]
    pub fn cur_transaction_owner(&self) -> Option<OwnerId> {
        self.cur_transaction
    }

    pub fn set_cur_transaction_owner(&mut self, owner: Option<OwnerId>) {
        if let Some(owner) = owner {
            self.tree.node(owner);
        }
        self.cur_transaction = owner;
    }

    // ----------------------------------------------------------------------
    // Reference registries
    // ----------------------------------------------------------------------

    /// Make sure `owner` has room to remember one more `H`.
    ///
    /// Must be called, and must succeed, *before* acquiring the resource.
    #[track_caller]
    pub fn enlarge<H: ResourceHandle>(&mut self, owner: OwnerId) -> Result<()> {
        let initial = self.config.initial_capacity;
        self.tree.node_mut(owner).registry_mut::<H>().enlarge(initial)
    }

    /// Record that `owner` holds `handle`. Requires a prior
    /// [`ResourceTracker::enlarge`].
    #[track_caller]
    pub fn remember<H: ResourceHandle>(&mut self, owner: OwnerId, handle: H) {
        let node = self.tree.node_mut(owner);
        if !node.registry_mut::<H>().remember(handle) {
            internal_error!(
                "no room to remember {} {handle} in resource owner \"{}\"",
                H::KIND,
                node.name()
            );
        }
    }

    /// Record that `owner` no longer holds `handle`.
    #[track_caller]
    pub fn forget<H: ResourceHandle>(&mut self, owner: OwnerId, handle: H) {
        let node = self.tree.node_mut(owner);
        if !node.registry_mut::<H>().forget(handle) {
            internal_error!("{} {handle} is not owned by resource owner \"{}\"", H::KIND, node.name());
        }
    }

    // Buffer pins may be taken outside of any owner (during recovery, for
    // instance). Those aren't tracked, so a `None` owner is accepted here.

    #[track_caller]
    pub fn enlarge_buffers(&mut self, owner: Option<OwnerId>) -> Result<()> {
        match owner {
            Some(owner) => self.enlarge::<Buffer>(owner),
            None => Ok(()),
        }
    }

    #[track_caller]
    pub fn remember_buffer(&mut self, owner: Option<OwnerId>, buffer: Buffer) {
        if let Some(owner) = owner {
            self.remember(owner, buffer);
        }
    }

    #[track_caller]
    pub fn forget_buffer(&mut self, owner: Option<OwnerId>, buffer: Buffer) {
        if let Some(owner) = owner {
            self.forget(owner, buffer);
        }
    }

    // ----------------------------------------------------------------------
    // Release callbacks
    // ----------------------------------------------------------------------

    /// Register a callback to run for every owner visited by every release
    /// phase. Callbacks registered later run first.
    pub fn register_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut(&ReleaseInfo) -> std::result::Result<(), CollaboratorError> + 'static,
    {
        self.callbacks.register(Box::new(callback))
    }

    /// Returns `false` if no callback is registered under `id`.
    pub fn unregister_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }
}
