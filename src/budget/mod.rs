//! Work accounting for traversals
//!
//! Every loop that follows links read from the inspected process runs under a
//! [`BoundedStepGuard`]. The per-view [`TraversalStats`] aggregate what the
//! guards observed so callers can verify amortized behaviour.

mod guard;

pub use guard::BoundedStepGuard;

/// Accumulated traversal counters for one container view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Successor computations performed
    pub successor_steps: usize,

    /// Individual link follows (left, right or parent)
    pub link_steps: usize,

    /// Requests served by advancing the cached cursor
    pub cache_hits: usize,

    /// Requests that restarted from the first node
    pub restarts: usize,

    /// Traversals aborted by a step guard or cycle check
    pub exhausted: usize,
}

impl TraversalStats {
    /// Fold a finished guard into the link counter
    pub fn absorb(&mut self, guard: &BoundedStepGuard) {
        self.link_steps += guard.taken();
    }

    /// Generate report
    pub fn report(&self) -> String {
        format!(
            "successors: {}\nlinks: {}\ncache hits: {}\nrestarts: {}\nexhausted: {}",
            self.successor_steps, self.link_steps, self.cache_hits, self.restarts, self.exhausted
        )
    }
}
