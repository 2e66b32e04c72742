//! The owner tree.
//!
//! Owners live in an arena and refer to each other by [`OwnerId`]. A node's
//! parent is only a back-reference for navigation; the arena owns every node.
//! Children are kept in an index list per parent, in insertion order, so the
//! *last* element is the head of the child list (the most recently attached
//! child) and gets visited first.
//!
//! Ids carry a generation, so an id that outlives the owner it named is caught
//! instead of silently aliasing whatever got allocated in the same slot.

use crate::error::internal_error;
use crate::handle::{
    Buffer, CatCacheListRef, CatCacheTupleRef, ReferenceCounts, RelationRef, ResourceHandle,
    ResourceKind,
};
use crate::registry::Registry;
use core::fmt;
use std::borrow::Cow;

/// Stable handle to an owner in a [`ResourceTracker`](crate::ResourceTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId {
    index: u32,
    generation: u32,
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// One resource owner: its place in the tree, and what it holds.
#[derive(Debug)]
pub struct OwnerNode {
    name: Cow<'static, str>,
    parent: Option<OwnerId>,
    children: Vec<OwnerId>,
    pub(crate) buffers: Registry<Buffer>,
    pub(crate) catrefs: Registry<CatCacheTupleRef>,
    pub(crate) catlistrefs: Registry<CatCacheListRef>,
    pub(crate) relrefs: Registry<RelationRef>,
}

impl OwnerNode {
    fn new(name: Cow<'static, str>, parent: Option<OwnerId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            buffers: Registry::new(),
            catrefs: Registry::new(),
            catlistrefs: Registry::new(),
            relrefs: Registry::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<OwnerId> {
        self.parent
    }

    /// Children, head of the list (most recently attached) first.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = OwnerId> + ExactSizeIterator + '_ {
        self.children.iter().rev().copied()
    }

    pub(crate) fn first_child(&self) -> Option<OwnerId> {
        self.children.last().copied()
    }

    #[inline]
    pub fn registry<H: ResourceHandle>(&self) -> &Registry<H> {
        H::registry(self)
    }

    #[inline]
    pub(crate) fn registry_mut<H: ResourceHandle>(&mut self) -> &mut Registry<H> {
        H::registry_mut(self)
    }

    pub fn counts(&self) -> ReferenceCounts {
        let mut counts = ReferenceCounts::default();
        counts[ResourceKind::Buffer] = self.buffers.len();
        counts[ResourceKind::CatCacheTuple] = self.catrefs.len();
        counts[ResourceKind::CatCacheList] = self.catlistrefs.len();
        counts[ResourceKind::Relation] = self.relrefs.len();
        counts
    }

    pub fn holds_nothing(&self) -> bool {
        self.buffers.is_empty()
            && self.catrefs.is_empty()
            && self.catlistrefs.is_empty()
            && self.relrefs.is_empty()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<OwnerNode>,
}

/// Arena of owner nodes.
#[derive(Debug, Default)]
pub(crate) struct OwnerTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl OwnerTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn contains(&self, id: OwnerId) -> bool {
        self.slot(id).is_some()
    }

    fn slot(&self, id: OwnerId) -> Option<&OwnerNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    #[track_caller]
    pub(crate) fn node(&self, id: OwnerId) -> &OwnerNode {
        match self.slot(id) {
            Some(node) => node,
            None => internal_error!("resource owner {id} does not exist"),
        }
    }

    #[track_caller]
    pub(crate) fn node_mut(&mut self, id: OwnerId) -> &mut OwnerNode {
        match self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
        {
            Some(node) => node,
            None => internal_error!("resource owner {id} does not exist"),
        }
    }

    /// Allocate an empty owner, attached as the new head of `parent`'s
    /// children if a parent is given.
    pub(crate) fn create(&mut self, parent: Option<OwnerId>, name: Cow<'static, str>) -> OwnerId {
        if let Some(parent) = parent {
            // validate before allocating anything
            self.node(parent);
        }

        let node = OwnerNode::new(name, parent);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                OwnerId { index, generation: slot.generation }
            }
            None => {
                let index = match u32::try_from(self.slots.len()) {
                    Ok(index) => index,
                    Err(_) => internal_error!("too many resource owners"),
                };
                self.slots.push(Slot { generation: 0, node: Some(node) });
                OwnerId { index, generation: 0 }
            }
        };

        if let Some(parent) = parent {
            self.node_mut(parent).children.push(id);
        }
        id
    }

    /// Unlink `id` from its current parent (if any) and make it the head
    /// child of `new_parent`, or a root if `new_parent` is `None`.
    ///
    /// Only tree links change; what the owner holds is untouched.
    #[track_caller]
    pub(crate) fn reparent(&mut self, id: OwnerId, new_parent: Option<OwnerId>) {
        if new_parent == Some(id) {
            internal_error!("resource owner \"{}\" cannot be its own parent", self.node(id).name);
        }
        if let Some(new_parent) = new_parent {
            self.node(new_parent);
            if self.is_ancestor(id, new_parent) {
                internal_error!(
                    "resource owner \"{}\" cannot be moved below its own descendant \"{}\"",
                    self.node(id).name,
                    self.node(new_parent).name
                );
            }
        }

        if let Some(old_parent) = self.node(id).parent {
            let siblings = &mut self.node_mut(old_parent).children;
            // scan from the head of the list, the way it was built
            if let Some(pos) = siblings.iter().rposition(|c| *c == id) {
                siblings.remove(pos);
            }
        }

        self.node_mut(id).parent = new_parent;
        if let Some(new_parent) = new_parent {
            self.node_mut(new_parent).children.push(id);
        }
    }

    /// Does `ancestor` appear on the parent chain of `id` (or equal it)?
    fn is_ancestor(&self, ancestor: OwnerId, mut id: OwnerId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.node(id).parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Free the slot of an owner that has already been unlinked and has no
    /// children.
    pub(crate) fn free(&mut self, id: OwnerId) -> OwnerNode {
        let node = {
            let slot = &mut self.slots[id.index as usize];
            debug_assert_eq!(slot.generation, id.generation);
            slot.generation = slot.generation.wrapping_add(1);
            slot.node.take()
        };
        match node {
            Some(node) => {
                debug_assert!(node.parent.is_none() && node.children.is_empty());
                self.free.push(id.index);
                node
            }
            None => internal_error!("resource owner {id} does not exist"),
        }
    }
}
