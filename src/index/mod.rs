//! Flat and small-buffer indexers
//!
//! Both container families store elements contiguously; they differ only in
//! where the buffer lives:
//! - [`LinearIndexer`]: one external buffer behind a pointer
//! - [`HybridIndexer`]: inline buffer while the element count fits, external
//!   buffer beyond that
//!
//! Element `i` always lives at byte offset `i * element_size` from the chosen
//! base handle.

mod hybrid;
mod linear;

pub use hybrid::{HybridIndexer, Storage};
pub use linear::LinearIndexer;

use crate::access::{AccessError, OpaqueAccessor};
use crate::LensError;

/// Read a declared element count, enforcing the sanity ceiling
///
/// An unreadable count field reads as 0. A count above `ceiling` is almost
/// certainly uninitialized or mid-mutation memory and is reported as
/// `Degraded` instead of being enumerated.
pub(crate) fn read_count<A: OpaqueAccessor>(
    accessor: &A,
    count: &A::Handle,
    ceiling: u64,
) -> Result<usize, LensError> {
    let declared = accessor.unsigned_value(count, 0);
    if declared > ceiling {
        tracing::warn!(declared, ceiling, "declared element count above sanity ceiling");
        return Err(LensError::Degraded { declared, ceiling });
    }
    usize::try_from(declared).map_err(|_| LensError::Degraded { declared, ceiling })
}

/// Byte offset of element `index`
pub(crate) fn element_offset(index: usize, element_size: u64) -> Result<u64, LensError> {
    (index as u64).checked_mul(element_size).ok_or_else(|| {
        AccessError::inconsistent(format!(
            "offset of element {index} (size {element_size}) overflows"
        ))
        .into()
    })
}

/// Reject requests outside `[0, count)`
#[inline]
pub(crate) fn check_range(index: usize, count: usize) -> Result<(), LensError> {
    if index >= count {
        return Err(LensError::OutOfRange { index, count });
    }
    Ok(())
}

/// Display name of a materialized element
pub fn element_name(index: usize) -> String {
    format!("[{index}]")
}
