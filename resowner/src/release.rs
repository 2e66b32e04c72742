//! Releasing everything an owner subtree holds.
//!
//! Release happens in three phases, which the caller runs in order, usually
//! with other transaction bookkeeping in between:
//!
//! 1. [`ReleasePhase::BeforeLocks`]: buffer pins and relation references.
//!    These have to go before locks are released, since other backends may
//!    be waiting on the locks to touch the same buffers and relations.
//! 2. [`ReleasePhase::Locks`]: heavyweight locks, through the
//!    [`LockManager`](crate::LockManager). None of the four registries are
//!    touched.
//! 3. [`ReleasePhase::AfterLocks`]: catalog-cache references and index scan
//!    state.
//!
//! Each phase walks the subtree depth-first and bottom-up, so children are
//! drained before their parent. Add-on callbacks run for every owner visited,
//! in every phase.
//!
//! A resource still held at commit time means someone forgot to release it.
//! That's worth a warning, but not an error: it gets released all the same.
//! At abort, leftovers are expected and released quietly.

use crate::callback::ReleaseInfo;
use crate::collab::{CollabResult, Collaborators};
use crate::error::{internal_error, Result, TrackerError};
use crate::handle::{
    Buffer, CatCacheListRef, CatCacheTupleRef, RelationRef, ResourceHandle, ResourceKind,
};
use crate::tracker::ResourceTracker;
use crate::tree::OwnerId;
use core::fmt;
use tracing_error::SpanTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleasePhase {
    BeforeLocks,
    Locks,
    AfterLocks,
}

impl ReleasePhase {
    /// All phases, in the order they must be run.
    pub const ALL: [ReleasePhase; 3] =
        [ReleasePhase::BeforeLocks, ReleasePhase::Locks, ReleasePhase::AfterLocks];

    pub const fn as_str(self) -> &'static str {
        match self {
            ReleasePhase::BeforeLocks => "before-locks",
            ReleasePhase::Locks => "locks",
            ReleasePhase::AfterLocks => "after-locks",
        }
    }
}

impl fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl ResourceTracker {
    /// Run one release phase over `owner` and all of its descendants.
    ///
    /// The owners themselves are not deleted. `is_commit` is true for a
    /// successful completion; `is_top_level` is true when releasing the top
    /// transaction owner at the end of a main transaction.
    ///
    /// If a collaborator or callback fails, the error is returned at once.
    /// Whatever had not been released yet stays recorded, and the current
    /// owner is back to what it was before the call.
    pub fn release(
        &mut self,
        owner: OwnerId,
        phase: ReleasePhase,
        is_commit: bool,
        is_top_level: bool,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        // Each level of the recursion restores the current owner through its
        // own guard; this one covers the caller's value.
        let saved = self.current;
        let mut guard = self.enter(saved);
        guard.release_subtree(owner, phase, is_commit, is_top_level, collab)
    }

    /// Run all three phases in order.
    pub fn release_all_phases(
        &mut self,
        owner: OwnerId,
        is_commit: bool,
        is_top_level: bool,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        for phase in ReleasePhase::ALL {
            self.release(owner, phase, is_commit, is_top_level, collab)?;
        }
        Ok(())
    }

    fn release_subtree(
        &mut self,
        owner: OwnerId,
        phase: ReleasePhase,
        is_commit: bool,
        is_top_level: bool,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let nchildren = self.tree.node(owner).children().len();
        for i in 0..nchildren {
            // release never changes the shape of the tree
            let child = match self.tree.node(owner).children().nth(i) {
                Some(child) => child,
                None => internal_error!("resource owner tree changed during release"),
            };
            self.release_subtree(child, phase, is_commit, is_top_level, collab)?;
        }

        // Collaborators and callbacks may look at the current owner; make it
        // the one being released.
        let mut this = self.enter(Some(owner));
        this.release_owner(owner, phase, is_commit, is_top_level, collab)
    }

    fn release_owner(
        &mut self,
        owner: OwnerId,
        phase: ReleasePhase,
        is_commit: bool,
        is_top_level: bool,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let span = tracing::debug_span!("release", owner = self.tree.node(owner).name(), %phase);
        let _enter = span.enter();

        match phase {
            ReleasePhase::BeforeLocks => {
                self.drain::<Buffer>(owner, is_commit, |buffer| {
                    collab.buffers.release_buffer(owner, buffer)
                })?;
                self.drain::<RelationRef>(owner, is_commit, |relation| {
                    collab.relations.close_relation(owner, relation)
                })?;
            }
            ReleasePhase::Locks => self.release_locks(owner, is_commit, is_top_level, collab)?,
            ReleasePhase::AfterLocks => {
                self.drain::<CatCacheTupleRef>(owner, is_commit, |tuple| {
                    collab.catalog.release_tuple(owner, tuple)
                })?;
                self.drain::<CatCacheListRef>(owner, is_commit, |list| {
                    collab.catalog.release_list(owner, list)
                })?;

                for scan in collab.index_scans.iter_mut() {
                    scan.release_resources().map_err(|source| {
                        TrackerError::IndexScanCleanup { source, context: SpanTrace::capture() }
                    })?;
                }
            }
        }

        let info = ReleaseInfo { phase, is_commit, is_top_level, owner };
        self.callbacks.run(&info).map_err(|source| TrackerError::Callback {
            phase,
            source,
            context: SpanTrace::capture(),
        })
    }

    fn release_locks(
        &self,
        owner: OwnerId,
        is_commit: bool,
        is_top_level: bool,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let result = if is_top_level {
            // The whole transaction is going away, so every lock goes with
            // it: one call at the top of the tree does it all.
            if self.top_transaction_owner() != Some(owner) {
                return Ok(());
            }
            collab.locks.release_all(is_commit)
        } else {
            let node = self.tree.node(owner);
            let parent = match node.parent() {
                Some(parent) => parent,
                None => internal_error!(
                    "cannot release locks of top-level resource owner \"{}\" retail",
                    node.name()
                ),
            };
            // A committing subtransaction hands its locks to the parent
            // instead of releasing them.
            if is_commit {
                collab.locks.reassign_to_parent(owner, parent)
            } else {
                collab.locks.release_current(owner)
            }
        };

        result.map_err(|source| TrackerError::Locks {
            owner: self.tree.node(owner).name().to_owned(),
            source,
            context: SpanTrace::capture(),
        })
    }

    /// Release every `H` held by `owner`, newest first so that each forget
    /// pops the tail of the registry.
    fn drain<H: ResourceHandle>(
        &mut self,
        owner: OwnerId,
        is_commit: bool,
        mut release: impl FnMut(H) -> CollabResult,
    ) -> Result<()> {
        while let Some(handle) = self.tree.node(owner).registry::<H>().last() {
            if is_commit && self.config.warn_on_commit_leaks {
                leak_warning(self.tree.node(owner).name(), handle);
            }
            if let Err(source) = release(handle) {
                return Err(TrackerError::Release {
                    kind: H::KIND,
                    owner: self.tree.node(owner).name().to_owned(),
                    handle: handle.to_string(),
                    source,
                    context: SpanTrace::capture(),
                });
            }
            self.forget(owner, handle);
        }
        Ok(())
    }
}

fn leak_warning<H: ResourceHandle>(owner: &str, handle: H) {
    let kind = H::KIND.as_str();
    match H::KIND {
        ResourceKind::Buffer => {
            tracing::warn!(owner, kind, %handle, "buffer refcount leak: {handle}")
        }
        ResourceKind::Relation => {
            tracing::warn!(owner, kind, %handle, "relcache reference leak: {handle} not closed")
        }
        ResourceKind::CatCacheTuple => {
            tracing::warn!(owner, kind, %handle, "cache reference leak: {handle}")
        }
        ResourceKind::CatCacheList => {
            tracing::warn!(owner, kind, %handle, "cache reference leak: {handle}")
        }
    }
}
