//! # Resource owners
//!
//! Query execution acquires lots of short-lived handles: buffer pins,
//! catalog-cache references, open relations, locks. Every one of them has to
//! be released exactly once, at a well defined point, including when the
//! transaction aborts halfway through something. Relying on every code path
//! to clean up after itself doesn't work in the presence of errors, so
//! instead each acquisition is charged to a *resource owner*, and owners are
//! released as a whole when their scope ends.
//!
//! Owners form a tree mirroring the nesting of scopes: a transaction owns
//! its subtransactions, which own portals, and so on. Releasing an owner
//! releases its whole subtree, children first.
//!
//! ## Usage
//!
//! - Before acquiring a resource, make room in the owner that will hold it
//!   ([`ResourceTracker::enlarge`]). Only then acquire it, and record it with
//!   [`ResourceTracker::remember`]. This order means running out of memory
//!   can never leave an acquired resource unrecorded.
//! - When releasing the resource normally, [`ResourceTracker::forget`] it.
//! - At end of scope, run [`ResourceTracker::release`] for each
//!   [`ReleasePhase`] in order, then [`ResourceTracker::delete_owner`]. Or,
//!   when a subtransaction commits, move its owner under the parent with
//!   [`ResourceTracker::reparent`] so whatever is still live is handed up.
//!
//! The tracker itself never decides what to acquire, and never performs the
//! actual release: that is delegated to the [`collab`] traits.

pub mod callback;
pub mod collab;
pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod registry;
pub mod release;
pub mod tracker;
pub mod tree;

pub use callback::{CallbackId, ReleaseCallback, ReleaseInfo};
pub use collab::{
    BufferManager, CatalogCache, CollabResult, Collaborators, IndexScanCleanup, LockManager,
    RelationCache,
};
pub use config::TrackerConfig;
pub use context::CurrentOwnerGuard;
pub use error::{CollaboratorError, Result, TrackerError};
pub use handle::{
    Buffer, CatCacheListRef, CatCacheTupleRef, ReferenceCounts, RelationRef, ResourceHandle,
    ResourceKind,
};
pub use registry::Registry;
pub use release::ReleasePhase;
pub use tracker::ResourceTracker;
pub use tree::{OwnerId, OwnerNode};
