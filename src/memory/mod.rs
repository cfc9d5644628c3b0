//! Serializable memory image backend
//!
//! A [`MemoryImage`] is a typed snapshot of part of a process:
//! - a type table (unsigned scalars, pointers, arrays, structs with base
//!   classes, enums, template arguments)
//! - byte regions keyed by base address
//! - named symbols pointing at typed values
//!
//! It implements [`OpaqueAccessor`](crate::OpaqueAccessor), which makes it both
//! the engine's test double and a backend for offline inspection of dumped
//! memory. Pointers are 8 bytes, scalars little-endian.

mod accessor;
mod builder;
pub mod samples;

pub use builder::ImageBuilder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::access::AccessError;

/// Size of a pointer in an image
pub const POINTER_SIZE: u64 = 8;

/// Index into an image's type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

/// Typed value at an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRef {
    /// Address of the value's storage
    pub address: u64,

    /// Static type
    pub ty: TypeId,
}

/// Struct member or base class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Member name (base classes use the base type's name)
    pub name: String,

    /// Byte offset inside the struct
    pub offset: u64,

    /// Member type
    pub ty: TypeId,

    /// Base class subobject; its fields are visible through the derived type
    #[serde(default)]
    pub base: bool,
}

/// Structure of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    /// Unsigned integer of the type's size
    Unsigned,

    /// Pointer to `pointee`
    Pointer {
        /// Pointed-to type
        pointee: TypeId,
    },

    /// Fixed-length array
    Array {
        /// Element type
        element: TypeId,
        /// Number of elements
        len: u64,
    },

    /// Struct or class
    Struct {
        /// Bases first, then members, in declaration order
        fields: Vec<FieldDef>,
    },

    /// Enumeration with named members
    Enum {
        /// `(name, value)` pairs
        members: Vec<(String, u64)>,
    },
}

/// Entry of the type table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Full type name
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Structure
    pub kind: TypeKind,

    /// Template arguments of a class template instantiation
    #[serde(default)]
    pub template_args: Vec<TypeId>,
}

/// Typed snapshot of process memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryImage {
    types: Vec<TypeDef>,
    regions: BTreeMap<u64, Vec<u8>>,
    symbols: BTreeMap<String, ValueRef>,
}

impl MemoryImage {
    /// Create an empty image
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an image from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Render the image as pretty JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Type table entry
    pub fn type_def(&self, ty: TypeId) -> Option<&TypeDef> {
        self.types.get(ty.0 as usize)
    }

    /// All types in table order
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// Type by full name
    pub fn type_named(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|def| def.name == name)
            .map(|index| TypeId(index as u32))
    }

    pub(crate) fn push_type(&mut self, def: TypeDef) -> TypeId {
        self.types.push(def);
        TypeId(self.types.len() as u32 - 1)
    }

    pub(crate) fn type_def_mut(&mut self, ty: TypeId) -> Option<&mut TypeDef> {
        self.types.get_mut(ty.0 as usize)
    }

    /// Value bound to a symbol
    pub fn symbol(&self, name: &str) -> Option<ValueRef> {
        self.symbols.get(name).copied()
    }

    /// All symbols in name order
    pub fn symbols(&self) -> impl Iterator<Item = (&str, ValueRef)> {
        self.symbols.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Bind a symbol
    pub fn define_symbol(&mut self, name: impl Into<String>, value: ValueRef) {
        self.symbols.insert(name.into(), value);
    }

    /// Map a zeroed region of `len` bytes at `base`
    pub fn map_region(&mut self, base: u64, len: usize) {
        self.regions.insert(base, vec![0; len]);
    }

    fn locate(&self, address: u64, len: u64) -> Option<(u64, usize, usize)> {
        let (&base, bytes) = self.regions.range(..=address).next_back()?;
        let start = usize::try_from(address - base).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        (end <= bytes.len()).then_some((base, start, end))
    }

    /// Read `len` bytes at `address`
    pub fn read(&self, address: u64, len: u64) -> Result<&[u8], AccessError> {
        let (base, start, end) = self
            .locate(address, len)
            .ok_or(AccessError::Unreadable { address, len })?;
        Ok(&self.regions[&base][start..end])
    }

    /// Read a little-endian unsigned integer of 1, 2, 4 or 8 bytes
    pub fn read_unsigned(&self, address: u64, size: u64) -> Result<u64, AccessError> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(AccessError::Unreadable { address, len: size });
        }
        let bytes = self.read(address, size)?;
        let mut buffer = [0u8; 8];
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buffer))
    }

    /// Overwrite bytes inside a mapped region
    pub fn write_bytes(&mut self, address: u64, data: &[u8]) -> Result<(), AccessError> {
        let len = data.len() as u64;
        let (base, start, end) = self
            .locate(address, len)
            .ok_or(AccessError::Unreadable { address, len })?;
        if let Some(region) = self.regions.get_mut(&base) {
            region[start..end].copy_from_slice(data);
        }
        Ok(())
    }

    /// Write a little-endian unsigned integer of `size` bytes
    pub fn write_unsigned(&mut self, address: u64, size: u64, value: u64) -> Result<(), AccessError> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(AccessError::Unreadable { address, len: size });
        }
        let bytes = value.to_le_bytes();
        self.write_bytes(address, &bytes[..size as usize])
    }

    /// Write a pointer
    pub fn write_pointer(&mut self, address: u64, target: u64) -> Result<(), AccessError> {
        self.write_unsigned(address, POINTER_SIZE, target)
    }
}
