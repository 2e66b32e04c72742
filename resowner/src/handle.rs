//! Opaque handles for the four kinds of resource an owner can hold.
//!
//! The tracker never looks inside a handle. It only needs to compare handles
//! for equality (to find the entry to forget) and to print them in leak
//! warnings and internal errors. The subsystem that hands them out is the one
//! that knows what they mean.

use crate::registry::Registry;
use crate::tree::OwnerNode;
use core::fmt;
use enum_map::{Enum, EnumMap};

/// The kinds of resource with built-in registry support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum ResourceKind {
    /// A pinned shared buffer.
    Buffer,
    /// A reference to a single catalog-cache tuple.
    CatCacheTuple,
    /// A reference to a catalog-cache list.
    CatCacheList,
    /// An open relation-cache entry.
    Relation,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Buffer,
        ResourceKind::CatCacheTuple,
        ResourceKind::CatCacheList,
        ResourceKind::Relation,
    ];

    /// Human readable name used in log fields and error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::CatCacheTuple => "catcache reference",
            ResourceKind::CatCacheList => "catcache list reference",
            ResourceKind::Relation => "relcache reference",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-kind reference counts of one owner.
pub type ReferenceCounts = EnumMap<ResourceKind, usize>;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Buffer {}
    impl Sealed for super::CatCacheTupleRef {}
    impl Sealed for super::CatCacheListRef {}
    impl Sealed for super::RelationRef {}
}

/// Implemented by every handle type that an owner can record.
///
/// This trait is sealed: each implementation is tied to one of the registries
/// built into [`OwnerNode`].
pub trait ResourceHandle: sealed::Sealed + Copy + Eq + fmt::Debug + fmt::Display + 'static {
    const KIND: ResourceKind;

    #[doc(hidden)]
    fn registry(node: &OwnerNode) -> &Registry<Self>;
    #[doc(hidden)]
    fn registry_mut(node: &mut OwnerNode) -> &mut Registry<Self>;
}

macro_rules! impl_resource_handle {
    ($handle:ty, $kind:ident, $field:ident) => {
        impl ResourceHandle for $handle {
            const KIND: ResourceKind = ResourceKind::$kind;

            #[inline]
            fn registry(node: &OwnerNode) -> &Registry<Self> {
                &node.$field
            }
            #[inline]
            fn registry_mut(node: &mut OwnerNode) -> &mut Registry<Self> {
                &mut node.$field
            }
        }
    };
}

impl_resource_handle!(Buffer, Buffer, buffers);
impl_resource_handle!(CatCacheTupleRef, CatCacheTuple, catrefs);
impl_resource_handle!(CatCacheListRef, CatCacheList, catlistrefs);
impl_resource_handle!(RelationRef, Relation, relrefs);

/// A shared-buffer number, as handed out by the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Buffer(pub i32);

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:03}]", self.0)
    }
}

/// A reference to a catalog-cache tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatCacheTupleRef {
    /// Identifier of the cache the tuple lives in.
    pub cache_id: u32,
    /// Tuple identity within that cache.
    pub tuple: u64,
}

impl fmt::Display for CatCacheTupleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache {}, tuple {:#x}", self.cache_id, self.tuple)
    }
}

/// A reference to a catalog-cache list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatCacheListRef {
    pub cache_id: u32,
    pub list: u64,
}

impl fmt::Display for CatCacheListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache {}, list {:#x}", self.cache_id, self.list)
    }
}

/// An open relation, identified by its object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RelationRef(pub u32);

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relation {}", self.0)
    }
}
