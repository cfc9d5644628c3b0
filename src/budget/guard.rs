//! Step guard for traversals over untrusted links

use crate::LensError;

/// Caps the number of link steps a single traversal may take
#[derive(Debug)]
pub struct BoundedStepGuard {
    /// Maximum steps allowed
    limit: usize,

    /// Steps taken so far
    taken: usize,
}

impl BoundedStepGuard {
    /// Create guard allowing `limit` steps
    pub fn new(limit: usize) -> Self {
        Self { limit, taken: 0 }
    }

    /// Record one step
    ///
    /// Fails with `Exhausted` once the limit has been reached; the traversal
    /// result must then be discarded.
    #[inline]
    pub fn step(&mut self) -> Result<(), LensError> {
        if self.taken >= self.limit {
            return Err(LensError::Exhausted { steps: self.limit });
        }
        self.taken += 1;
        Ok(())
    }

    /// Steps taken so far
    pub fn taken(&self) -> usize {
        self.taken
    }

    /// Steps still available
    pub fn remaining(&self) -> usize {
        self.limit - self.taken
    }

    /// Configured ceiling
    pub fn limit(&self) -> usize {
        self.limit
    }
}
