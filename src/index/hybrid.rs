//! Small-buffer-optimized containers
//!
//! The container keeps elements in an inline buffer while they fit and moves
//! them to an allocation once they do not. The switch-over is decided by the
//! current element count alone:
//!   count ≤ local_capacity → inline buffer
//!   count > local_capacity → external buffer

use super::{check_range, element_offset, read_count};
use crate::access::OpaqueAccessor;
use crate::LensError;

/// Which buffer currently holds the elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Inline buffer embedded in the container
    Inline,

    /// Externally allocated buffer
    External,
}

/// Indexer for inline/external hybrid storage
#[derive(Debug)]
pub struct HybridIndexer<A: OpaqueAccessor> {
    /// Inline buffer value
    inline: A::Handle,

    /// Pointer to the external allocation
    external: A::Handle,

    /// Declared element count field
    count: A::Handle,

    /// Type materialized for each element
    element_type: A::Type,

    /// Element stride in bytes
    element_size: u64,

    /// Elements that fit in the inline buffer
    local_capacity: usize,

    /// Counts above this are treated as corrupt
    count_ceiling: u64,
}

impl<A: OpaqueAccessor> HybridIndexer<A> {
    /// Create indexer; `local_capacity` is the inline byte size divided by the
    /// element size
    pub fn new(
        inline: A::Handle,
        external: A::Handle,
        count: A::Handle,
        element_type: A::Type,
        element_size: u64,
        local_capacity: usize,
        count_ceiling: u64,
    ) -> Self {
        Self {
            inline,
            external,
            count,
            element_type,
            element_size,
            local_capacity,
            count_ceiling,
        }
    }

    /// Number of logical elements
    pub fn count(&self, accessor: &A) -> Result<usize, LensError> {
        read_count(accessor, &self.count, self.count_ceiling)
    }

    /// Buffer selected for a given element count
    #[inline]
    pub fn storage_for_count(&self, count: usize) -> Storage {
        if count <= self.local_capacity {
            Storage::Inline
        } else {
            Storage::External
        }
    }

    /// Buffer currently holding the elements
    pub fn storage(&self, accessor: &A) -> Result<Storage, LensError> {
        Ok(self.storage_for_count(self.count(accessor)?))
    }

    fn base(&self, storage: Storage) -> &A::Handle {
        match storage {
            Storage::Inline => &self.inline,
            Storage::External => &self.external,
        }
    }

    /// Materialize element `index` from whichever buffer is active
    pub fn element_at(&self, accessor: &A, index: usize) -> Result<A::Handle, LensError> {
        let count = self.count(accessor)?;
        check_range(index, count)?;
        let storage = self.storage_for_count(count);
        let offset = element_offset(index, self.element_size)?;
        tracing::trace!(index, offset, ?storage, "hybrid element");
        Ok(accessor.child_at_offset(self.base(storage), index, offset, &self.element_type)?)
    }

    /// Raw bytes of the first `min(count, limit)` elements
    pub fn content(&self, accessor: &A, limit: usize) -> Result<Vec<u8>, LensError> {
        let count = self.count(accessor)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let storage = self.storage_for_count(count);
        let len = element_offset(count.min(limit), self.element_size)?;
        Ok(accessor.raw_bytes(self.base(storage), len as usize)?)
    }

    /// Elements that fit in the inline buffer
    pub fn local_capacity(&self) -> usize {
        self.local_capacity
    }

    /// Element stride in bytes
    pub fn element_size(&self) -> u64 {
        self.element_size
    }
}
