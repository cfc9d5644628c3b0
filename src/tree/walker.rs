//! Link-following primitives
//!
//! `first` and `next` implement the tree's own iterator: descend toward the
//! near side for the first node; for the next node either cross to the far
//! child and descend near again, or climb while we are the far child.

use super::{Direction, NodeFields, Order};
use crate::access::{AccessError, OpaqueAccessor};
use crate::budget::BoundedStepGuard;
use crate::LensError;

/// Borrowed view of one tree's link structure
#[derive(Debug)]
pub struct TreeWalker<'a, A: OpaqueAccessor> {
    accessor: &'a A,
    sentinel: A::Identity,
    fields: NodeFields,
}

impl<'a, A: OpaqueAccessor> TreeWalker<'a, A> {
    /// Create walker for a tree whose missing children point at `sentinel`
    pub fn new(accessor: &'a A, sentinel: A::Identity, fields: NodeFields) -> Self {
        Self {
            accessor,
            sentinel,
            fields,
        }
    }

    /// Storage identity of a node
    #[inline]
    pub fn identity(&self, node: &A::Handle) -> Result<A::Identity, LensError> {
        Ok(self.accessor.identity(node)?)
    }

    /// Whether `node` is the sentinel (identity comparison only)
    ///
    /// A node without a readable identity is an error, never the sentinel.
    #[inline]
    pub fn is_sentinel(&self, node: &A::Handle) -> Result<bool, LensError> {
        Ok(self.identity(node)? == self.sentinel)
    }

    /// Child of `node` in `direction`
    pub fn link(&self, node: &A::Handle, direction: Direction) -> Result<A::Handle, LensError> {
        let links = self.accessor.field(node, self.fields.links)?;
        let pointer = self.accessor.child_at_index(&links, direction.link_index())?;
        Ok(self.accessor.dereference(&pointer)?)
    }

    /// Parent of `node`, `None` for the root
    ///
    /// The root's parent is the sentinel; a null parent pointer is treated the
    /// same way.
    pub fn parent(&self, node: &A::Handle) -> Result<Option<A::Handle>, LensError> {
        let pointer = self.accessor.field(node, self.fields.parent)?;
        if self.accessor.unsigned_value(&pointer, 0) == 0 {
            return Ok(None);
        }
        let parent = self.accessor.dereference(&pointer)?;
        if self.is_sentinel(&parent)? {
            return Ok(None);
        }
        Ok(Some(parent))
    }

    /// Follow `direction` links from `from` until the next link is the sentinel
    pub fn descend(
        &self,
        from: A::Handle,
        direction: Direction,
        guard: &mut BoundedStepGuard,
    ) -> Result<A::Handle, LensError> {
        let mut node = from;
        loop {
            let next = self.link(&node, direction)?;
            if self.is_sentinel(&next)? {
                return Ok(node);
            }
            guard.step()?;
            node = next;
        }
    }

    /// First node in `order` below `root`, `None` for an empty tree
    pub fn first(
        &self,
        root: &A::Handle,
        order: Order,
        guard: &mut BoundedStepGuard,
    ) -> Result<Option<A::Handle>, LensError> {
        if self.is_sentinel(root)? {
            return Ok(None);
        }
        let (near, _) = order.sides();
        self.descend(root.clone(), near, guard).map(Some)
    }

    /// Node following `node` in `order`, `None` at the end of the sequence
    pub fn next(
        &self,
        node: &A::Handle,
        order: Order,
        guard: &mut BoundedStepGuard,
    ) -> Result<Option<A::Handle>, LensError> {
        let (near, far) = order.sides();

        // Far subtree present: its near-most node follows
        let far_child = self.link(node, far)?;
        if !self.is_sentinel(&far_child)? {
            guard.step()?;
            return self.descend(far_child, near, guard).map(Some);
        }

        // Climb while we are the far child; the first ancestor reached from
        // its near side follows
        let mut current = node.clone();
        loop {
            let Some(parent) = self.parent(&current)? else {
                return Ok(None);
            };
            let id = self.identity(&current)?;

            if self.identity(&self.link(&parent, far)?)? == id {
                guard.step()?;
                current = parent;
                continue;
            }
            if self.identity(&self.link(&parent, near)?)? == id {
                return Ok(Some(parent));
            }

            return Err(AccessError::inconsistent(format!(
                "node {id:?} is not a child of its parent"
            ))
            .into());
        }
    }
}
