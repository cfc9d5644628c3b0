//! Sentinel red-black tree traversal
//!
//! The inspected tree is intrusive: every node carries `parent` and a
//! two-element `link` array, and a designated sentinel node stands in for
//! every missing child (and for the root's parent). Nothing here recurses and
//! nothing trusts a link without checking it:
//! - the sentinel is recognized by storage identity, never by its contents
//! - a node must actually be its parent's left or right child
//! - every descent or ascent runs under a `BoundedStepGuard`
//! - successor sequences are checked for cycles

mod cursor;
mod walker;

pub use cursor::OrderedTreeCursor;
pub use walker::TreeWalker;

use crate::LensError;

/// Which link of a node to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `link[0]`
    Left,

    /// `link[1]`
    Right,
}

impl Direction {
    /// Index into the node's link array
    #[inline]
    pub fn link_index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }
}

/// Iteration order over the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// In-order: left subtree, node, right subtree
    Ascending,

    /// Mirrored in-order
    Descending,
}

impl Order {
    /// `(near, far)` link directions for this order
    ///
    /// Ascending walks toward `near` to find the first node and steps across
    /// `far` to find the next one; descending swaps the two.
    #[inline]
    pub fn sides(self) -> (Direction, Direction) {
        match self {
            Order::Ascending => (Direction::Left, Direction::Right),
            Order::Descending => (Direction::Right, Direction::Left),
        }
    }
}

/// Field names of an intrusive tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFields {
    /// Pointer to the parent node
    pub parent: &'static str,

    /// Two-element child pointer array
    pub links: &'static str,
}

/// Last materialized node and its logical index
///
/// Also carries the walk's cycle state, so a cached advance checks for loops
/// against every node produced since the walk last started from the first node.
#[derive(Debug, Clone)]
pub struct TraversalCursor<H, I> {
    /// Node handle
    pub node: H,

    /// Logical index of `node`
    pub index: usize,

    /// Identity of the first node of the walk
    pub(crate) first: I,

    /// Cycle state of the walk
    pub(crate) detector: CycleDetector<I>,
}

impl<H, I: Copy + Eq> TraversalCursor<H, I> {
    /// Cursor at the first node of a walk
    pub(crate) fn start(node: H, first: I) -> Self {
        Self {
            node,
            index: 0,
            first,
            detector: CycleDetector::new(first),
        }
    }

    /// Move to the node following the current one
    ///
    /// A successor can never be the first node or the current node again, and
    /// the detector catches longer loops; all of these are `Exhausted`.
    pub(crate) fn advance(&mut self, node: H, id: I, current: I) -> Result<(), LensError> {
        let position = self.index + 1;
        if id == self.first || id == current || self.detector.observe(id) {
            tracing::debug!(position, "successor sequence revisits a node");
            return Err(LensError::Exhausted { steps: position });
        }
        self.node = node;
        self.index = position;
        Ok(())
    }
}

/// Brent cycle detection over a sequence of node identities
///
/// Keeps O(1) state; a legitimate in-order walk never revisits a node, so a
/// hit on the checkpoint means the links form a loop.
#[derive(Debug, Clone)]
pub(crate) struct CycleDetector<I> {
    checkpoint: I,
    power: usize,
    lambda: usize,
}

impl<I: Copy + Eq> CycleDetector<I> {
    pub(crate) fn new(start: I) -> Self {
        Self {
            checkpoint: start,
            power: 1,
            lambda: 0,
        }
    }

    /// Record the next identity; `true` when a cycle has been seen
    pub(crate) fn observe(&mut self, id: I) -> bool {
        if id == self.checkpoint {
            return true;
        }
        self.lambda += 1;
        if self.lambda == self.power {
            self.checkpoint = id;
            self.power *= 2;
            self.lambda = 0;
        }
        false
    }
}
