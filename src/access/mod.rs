//! Opaque accessor capability set
//!
//! The engine never reads memory itself. Everything it learns about an
//! inspected container goes through an [`OpaqueAccessor`] supplied by the host:
//! - named field lookup and positional child lookup
//! - child materialization at a byte offset from a base value
//! - unsigned reads with a caller-supplied default
//! - identity keys for "same storage" comparisons
//! - bounded raw byte reads
//!
//! Handles may go stale between calls. Implementations report that as an
//! [`AccessError`] instead of panicking.

use std::fmt;
use std::hash::Hash;

use thiserror::Error;

/// Failure reported by an accessor primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Named field does not exist on the value's type.
    #[error("no field `{field}` on `{type_name}`")]
    MissingField {
        /// Requested field name.
        field: String,
        /// Type that was searched.
        type_name: String,
    },

    /// Positional child does not exist.
    #[error("no child #{index} on `{type_name}`")]
    MissingChild {
        /// Requested child position.
        index: usize,
        /// Type that was searched.
        type_name: String,
    },

    /// Pointer was null or the value is not a pointer.
    #[error("cannot dereference `{type_name}`")]
    BadPointer {
        /// Type of the value that was dereferenced.
        type_name: String,
    },

    /// Memory range is not readable.
    #[error("unreadable memory: {len} bytes at {address:#x}")]
    Unreadable {
        /// Start address of the read.
        address: u64,
        /// Requested length.
        len: u64,
    },

    /// Type information required by the engine is unavailable.
    #[error("missing type information: {0}")]
    MissingType(String),

    /// Links read from the target contradict each other.
    #[error("inconsistent container state: {0}")]
    Inconsistent(String),

    /// Host-specific failure.
    #[error("host error: {0}")]
    Host(String),
}

impl AccessError {
    /// Helper for host-originated errors.
    pub fn host(msg: impl Into<String>) -> Self {
        AccessError::Host(msg.into())
    }

    /// Helper for contradictory link structures.
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        AccessError::Inconsistent(msg.into())
    }
}

/// Capability set the host hands to the engine.
///
/// `Handle` refers to a typed value in the inspected process, `Type` to a type
/// description, and `Identity` is a content-independent key for the storage a
/// handle refers to (typically its address).
pub trait OpaqueAccessor: fmt::Debug {
    /// Reference to a typed value in the inspected process.
    type Handle: Clone + fmt::Debug;
    /// Reference to a type description.
    type Type: Clone + fmt::Debug;
    /// Storage identity key.
    type Identity: Copy + Eq + Hash + fmt::Debug;

    /// Locate a named field, searching base classes as well.
    fn field(&self, value: &Self::Handle, name: &str) -> Result<Self::Handle, AccessError>;

    /// Positional child (struct member in declaration order, array element).
    fn child_at_index(&self, value: &Self::Handle, index: usize)
        -> Result<Self::Handle, AccessError>;

    /// Follow a pointer value to the value it points at.
    fn dereference(&self, pointer: &Self::Handle) -> Result<Self::Handle, AccessError>;

    /// Materialize a value of `element_type` at `byte_offset` from `base`.
    ///
    /// For pointer-typed bases the offset is relative to the pointee, otherwise
    /// to the base value's own storage. `index` only names the child.
    fn child_at_offset(
        &self,
        base: &Self::Handle,
        index: usize,
        byte_offset: u64,
        element_type: &Self::Type,
    ) -> Result<Self::Handle, AccessError>;

    /// Read an unsigned integral value, or `default` when unreadable.
    fn unsigned_value(&self, value: &Self::Handle, default: u64) -> u64;

    /// Identity of the storage `value` refers to.
    ///
    /// Fails when the storage cannot be located; distinct storage must never
    /// share an identity.
    fn identity(&self, value: &Self::Handle) -> Result<Self::Identity, AccessError>;

    /// Read up to `count` contiguous bytes of content.
    ///
    /// Pointer-typed values read from the pointee.
    fn raw_bytes(&self, value: &Self::Handle, count: usize) -> Result<Vec<u8>, AccessError>;

    /// Static type of a value.
    fn value_type(&self, value: &Self::Handle) -> Self::Type;

    /// Display name of a type.
    fn type_name(&self, ty: &Self::Type) -> String;

    /// Size of a type in bytes.
    fn byte_size(&self, ty: &Self::Type) -> u64;

    /// Pointee of a pointer type.
    fn pointee_type(&self, ty: &Self::Type) -> Option<Self::Type>;

    /// Template argument of a class template instantiation.
    fn template_argument(&self, ty: &Self::Type, index: usize) -> Option<Self::Type>;

    /// Look a type up by its full name.
    fn find_type(&self, _name: &str) -> Option<Self::Type> {
        None
    }

    /// Named members of an enumeration type.
    fn enum_members(&self, _ty: &Self::Type) -> Vec<(String, u64)> {
        Vec::new()
    }
}

/// Type name of a handle's static type.
pub(crate) fn value_type_name<A: OpaqueAccessor>(accessor: &A, value: &A::Handle) -> String {
    accessor.type_name(&accessor.value_type(value))
}
