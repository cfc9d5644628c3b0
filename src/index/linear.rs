//! Pointer + count containers

use super::{check_range, element_offset, read_count};
use crate::access::{AccessError, OpaqueAccessor};
use crate::LensError;

/// Indexer for a flat element buffer reached through a pointer
#[derive(Debug)]
pub struct LinearIndexer<A: OpaqueAccessor> {
    /// Pointer to the first element
    elements: A::Handle,

    /// Declared element count field
    count: A::Handle,

    /// Type materialized for each element
    element_type: A::Type,

    /// Element stride in bytes
    element_size: u64,

    /// Counts above this are treated as corrupt
    count_ceiling: u64,
}

impl<A: OpaqueAccessor> LinearIndexer<A> {
    /// Create indexer over `elements[0..count]`
    pub fn new(
        elements: A::Handle,
        count: A::Handle,
        element_type: A::Type,
        element_size: u64,
        count_ceiling: u64,
    ) -> Self {
        Self {
            elements,
            count,
            element_type,
            element_size,
            count_ceiling,
        }
    }

    /// Number of logical elements
    pub fn count(&self, accessor: &A) -> Result<usize, LensError> {
        read_count(accessor, &self.count, self.count_ceiling)
    }

    /// Materialize element `index`
    pub fn element_at(&self, accessor: &A, index: usize) -> Result<A::Handle, LensError> {
        let count = self.count(accessor)?;
        check_range(index, count)?;
        let offset = element_offset(index, self.element_size)?;
        tracing::trace!(index, offset, "linear element");
        Ok(accessor.child_at_offset(&self.elements, index, offset, &self.element_type)?)
    }

    /// Raw bytes of the first `min(count, limit)` elements
    ///
    /// A null element pointer with a non-zero count is an access failure; an
    /// empty container yields an empty view.
    pub fn content(&self, accessor: &A, limit: usize) -> Result<Vec<u8>, LensError> {
        let count = self.count(accessor)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        if accessor.unsigned_value(&self.elements, 0) == 0 {
            return Err(AccessError::BadPointer {
                type_name: crate::access::value_type_name(accessor, &self.elements),
            }
            .into());
        }
        let len = element_offset(count.min(limit), self.element_size)?;
        Ok(accessor.raw_bytes(&self.elements, len as usize)?)
    }

    /// Element stride in bytes
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Pointer to the element buffer
    pub fn elements(&self) -> &A::Handle {
        &self.elements
    }
}
