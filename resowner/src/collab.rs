//! Interfaces to the subsystems that actually own the tracked resources.
//!
//! The tracker only does bookkeeping. When an owner is released it hands each
//! recorded handle back to the subsystem it came from through these traits,
//! and forgets the handle once that subsystem reports success.
//!
//! Every call gets the [`OwnerId`] being released explicitly, instead of
//! having to look at the tracker's current owner.

use crate::error::CollaboratorError;
use crate::handle::{Buffer, CatCacheListRef, CatCacheTupleRef, RelationRef};
use crate::tree::OwnerId;

pub type CollabResult = Result<(), CollaboratorError>;

/// Drops buffer pins.
pub trait BufferManager {
    fn release_buffer(&mut self, owner: OwnerId, buffer: Buffer) -> CollabResult;
}

/// Closes relation-cache entries.
pub trait RelationCache {
    fn close_relation(&mut self, owner: OwnerId, relation: RelationRef) -> CollabResult;
}

/// Drops catalog-cache tuple and list references.
pub trait CatalogCache {
    fn release_tuple(&mut self, owner: OwnerId, tuple: CatCacheTupleRef) -> CollabResult;
    fn release_list(&mut self, owner: OwnerId, list: CatCacheListRef) -> CollabResult;
}

/// Releases heavyweight locks.
///
/// # Top-level release
///
/// [`LockManager::release_all`] is called once, on the top transaction owner,
/// when a whole transaction ends. Implementations must be able to release
/// every lock the process holds (except session-level locks) in that single
/// call, no matter which owner in the tree acquired it. The tracker relies on
/// this and does not visit descendant owners for locks in that case.
pub trait LockManager {
    fn release_all(&mut self, is_commit: bool) -> CollabResult;

    /// Hand the locks held by `owner` over to `parent`, on subtransaction
    /// commit.
    fn reassign_to_parent(&mut self, owner: OwnerId, parent: OwnerId) -> CollabResult;

    /// Release the locks held by `owner`, on subtransaction abort.
    fn release_current(&mut self, owner: OwnerId) -> CollabResult;
}

/// An index access method that keeps scan state outside the owner tree and
/// needs to clean it up once per after-locks pass.
pub trait IndexScanCleanup {
    fn release_resources(&mut self) -> CollabResult;
}

/// Everything a release pass may call into.
pub struct Collaborators<'a> {
    pub buffers: &'a mut dyn BufferManager,
    pub relations: &'a mut dyn RelationCache,
    pub catalog: &'a mut dyn CatalogCache,
    pub locks: &'a mut dyn LockManager,
    /// Run in order, after the catalog-cache references have been dropped.
    pub index_scans: Vec<&'a mut dyn IndexScanCleanup>,
}
