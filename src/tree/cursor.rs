//! Indexed access over an in-order walk
//!
//! Callers ask for elements by logical index, usually in ascending order. The
//! cursor remembers the last node it produced; a request for the very next
//! index costs one successor step, anything else restarts from the first node.

use super::{NodeFields, Order, TraversalCursor, TreeWalker};
use crate::access::{AccessError, OpaqueAccessor};
use crate::budget::{BoundedStepGuard, TraversalStats};
use crate::index::{check_range, read_count};
use crate::LensError;

/// Indexed in-order cursor over a sentinel tree
#[derive(Debug)]
pub struct OrderedTreeCursor<A: OpaqueAccessor> {
    /// Pointer field holding the root node
    root: A::Handle,

    /// Declared element count field
    count: A::Handle,

    /// Identity of the sentinel node
    sentinel: A::Identity,

    /// Node field names
    fields: NodeFields,

    /// Counts above this are treated as corrupt
    count_ceiling: u64,

    /// Step ceiling for each descent/ascent
    max_steps: usize,

    /// Last successfully materialized node
    cached: Option<TraversalCursor<A::Handle, A::Identity>>,

    /// Work counters
    stats: TraversalStats,
}

impl<A: OpaqueAccessor> OrderedTreeCursor<A> {
    /// Create cursor; `root` is the container's root pointer field
    pub fn new(
        root: A::Handle,
        count: A::Handle,
        sentinel: A::Identity,
        fields: NodeFields,
        count_ceiling: u64,
        max_steps: usize,
    ) -> Self {
        Self {
            root,
            count,
            sentinel,
            fields,
            count_ceiling,
            max_steps,
            cached: None,
            stats: TraversalStats::default(),
        }
    }

    fn walker<'a>(&self, accessor: &'a A) -> TreeWalker<'a, A> {
        TreeWalker::new(accessor, self.sentinel, self.fields)
    }

    /// Number of elements
    pub fn count(&self, accessor: &A) -> Result<usize, LensError> {
        read_count(accessor, &self.count, self.count_ceiling)
    }

    /// Current root node (may be the sentinel)
    pub fn root(&self, accessor: &A) -> Result<A::Handle, LensError> {
        Ok(accessor.dereference(&self.root)?)
    }

    fn first(&mut self, accessor: &A, order: Order) -> Result<Option<A::Handle>, LensError> {
        let root = self.root(accessor)?;
        let mut guard = BoundedStepGuard::new(self.max_steps);
        let result = self.walker(accessor).first(&root, order, &mut guard);
        self.stats.absorb(&guard);
        result
    }

    fn step(
        &mut self,
        accessor: &A,
        node: &A::Handle,
        order: Order,
    ) -> Result<Option<A::Handle>, LensError> {
        let mut guard = BoundedStepGuard::new(self.max_steps);
        let result = self.walker(accessor).next(node, order, &mut guard);
        self.stats.absorb(&guard);
        self.stats.successor_steps += 1;
        result
    }

    /// Smallest node, `None` for an empty tree
    pub fn leftmost(&mut self, accessor: &A) -> Result<Option<A::Handle>, LensError> {
        self.first(accessor, Order::Ascending)
    }

    /// Largest node, `None` for an empty tree
    pub fn rightmost(&mut self, accessor: &A) -> Result<Option<A::Handle>, LensError> {
        self.first(accessor, Order::Descending)
    }

    /// In-order successor of `node`, `None` after the last node
    pub fn successor(
        &mut self,
        accessor: &A,
        node: &A::Handle,
    ) -> Result<Option<A::Handle>, LensError> {
        self.step(accessor, node, Order::Ascending)
    }

    /// In-order predecessor of `node`, `None` before the first node
    pub fn predecessor(
        &mut self,
        accessor: &A,
        node: &A::Handle,
    ) -> Result<Option<A::Handle>, LensError> {
        self.step(accessor, node, Order::Descending)
    }

    /// Materialize element `index` in ascending order
    ///
    /// On success the node is cached for the next call, together with the
    /// walk's cycle state. Any failure other than an out-of-range request
    /// drops the cache.
    pub fn element_at(&mut self, accessor: &A, index: usize) -> Result<A::Handle, LensError> {
        let count = self.count(accessor)?;
        check_range(index, count)?;

        let cached = self.cached.take();
        let result = match cached {
            Some(cursor) if cursor.index + 1 == index => {
                self.stats.cache_hits += 1;
                self.advance_cached(accessor, cursor)
            }
            _ => {
                self.stats.restarts += 1;
                self.walk_from_first(accessor, index)
            }
        };

        match result {
            Ok(cursor) => {
                let node = cursor.node.clone();
                self.cached = Some(cursor);
                Ok(node)
            }
            Err(err) => {
                if matches!(err, LensError::Exhausted { .. }) {
                    self.stats.exhausted += 1;
                }
                tracing::warn!(index, error = %err, "tree element unavailable");
                Err(err)
            }
        }
    }

    fn advance(
        &mut self,
        accessor: &A,
        cursor: &mut TraversalCursor<A::Handle, A::Identity>,
    ) -> Result<(), LensError> {
        let position = cursor.index + 1;
        let next = self
            .successor(accessor, &cursor.node)?
            .ok_or_else(|| ended_early(position))?;
        let id = accessor.identity(&next)?;
        let current = accessor.identity(&cursor.node)?;
        cursor.advance(next, id, current)
    }

    fn advance_cached(
        &mut self,
        accessor: &A,
        mut cursor: TraversalCursor<A::Handle, A::Identity>,
    ) -> Result<TraversalCursor<A::Handle, A::Identity>, LensError> {
        self.advance(accessor, &mut cursor)?;
        Ok(cursor)
    }

    fn walk_from_first(
        &mut self,
        accessor: &A,
        index: usize,
    ) -> Result<TraversalCursor<A::Handle, A::Identity>, LensError> {
        let first = self.leftmost(accessor)?.ok_or_else(|| ended_early(0))?;
        let id = accessor.identity(&first)?;
        let mut cursor = TraversalCursor::start(first, id);
        while cursor.index < index {
            self.advance(accessor, &mut cursor)?;
        }
        Ok(cursor)
    }

    /// Drop the cached cursor
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Cached `(node, index)` pair, if any
    pub fn cached(&self) -> Option<&TraversalCursor<A::Handle, A::Identity>> {
        self.cached.as_ref()
    }

    /// Work counters since creation
    pub fn stats(&self) -> TraversalStats {
        self.stats
    }
}

fn ended_early(position: usize) -> LensError {
    AccessError::inconsistent(format!(
        "tree ran out of nodes at position {position} before its declared count"
    ))
    .into()
}
