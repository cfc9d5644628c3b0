//! Incremental construction of memory images
//!
//! Types are laid out with natural alignment (bases first, then members) and
//! deduplicated by name. Storage comes from a bump allocator; a gap between
//! allocations keeps out-of-bounds reads unmapped.

use super::{FieldDef, MemoryImage, TypeDef, TypeId, TypeKind, ValueRef, POINTER_SIZE};
use crate::access::{AccessError, OpaqueAccessor};

/// First address handed out
const HEAP_BASE: u64 = 0x1000;

/// Allocation alignment
const ALLOCATION_ALIGN: u64 = 16;

/// Unmapped bytes between allocations
const GUARD_GAP: u64 = 16;

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Builder for [`MemoryImage`]s
#[derive(Debug)]
pub struct ImageBuilder {
    image: MemoryImage,
    next_address: u64,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            image: MemoryImage::new(),
            next_address: HEAP_BASE,
        }
    }

    fn add_type(&mut self, def: TypeDef) -> TypeId {
        match self.image.type_named(&def.name) {
            Some(existing) => existing,
            None => self.image.push_type(def),
        }
    }

    /// Unsigned integer type of `size` bytes
    pub fn unsigned(&mut self, name: &str, size: u64) -> TypeId {
        self.add_type(TypeDef {
            name: name.to_string(),
            size,
            kind: TypeKind::Unsigned,
            template_args: Vec::new(),
        })
    }

    /// Pointer to `pointee`
    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        let name = format!("{} *", self.name(pointee));
        self.add_type(TypeDef {
            name,
            size: POINTER_SIZE,
            kind: TypeKind::Pointer { pointee },
            template_args: Vec::new(),
        })
    }

    /// Fixed-length array of `len` elements
    pub fn array(&mut self, element: TypeId, len: u64) -> TypeId {
        let name = format!("{}[{}]", self.name(element), len);
        let size = self.size(element) * len;
        self.add_type(TypeDef {
            name,
            size,
            kind: TypeKind::Array { element, len },
            template_args: Vec::new(),
        })
    }

    /// Enumeration type
    pub fn enumeration(&mut self, name: &str, size: u64, members: &[(&str, u64)]) -> TypeId {
        self.add_type(TypeDef {
            name: name.to_string(),
            size,
            kind: TypeKind::Enum {
                members: members
                    .iter()
                    .map(|(name, value)| (name.to_string(), *value))
                    .collect(),
            },
            template_args: Vec::new(),
        })
    }

    /// Struct with no fields yet; complete it with [`ImageBuilder::define`]
    ///
    /// Needed for self-referential types such as tree nodes.
    pub fn declare(&mut self, name: &str) -> TypeId {
        self.add_type(TypeDef {
            name: name.to_string(),
            size: 0,
            kind: TypeKind::Struct { fields: Vec::new() },
            template_args: Vec::new(),
        })
    }

    /// Lay out a declared struct
    pub fn define(&mut self, ty: TypeId, bases: &[TypeId], members: &[(&str, TypeId)]) {
        let entries = bases
            .iter()
            .map(|base| (self.name(*base), *base, true))
            .chain(members.iter().map(|(name, ty)| (name.to_string(), *ty, false)))
            .collect::<Vec<_>>();

        let mut fields = Vec::with_capacity(entries.len());
        let mut offset = 0;
        let mut max_align = 1;
        for (name, field_ty, base) in entries {
            let align = self.align(field_ty);
            max_align = max_align.max(align);
            offset = align_up(offset, align);
            fields.push(FieldDef {
                name,
                offset,
                ty: field_ty,
                base,
            });
            offset += self.size(field_ty);
        }
        let size = align_up(offset.max(1), max_align);

        if let Some(def) = self.image.type_def_mut(ty) {
            def.size = size;
            def.kind = TypeKind::Struct { fields };
        }
    }

    /// Struct with members laid out in order
    pub fn structure(&mut self, name: &str, members: &[(&str, TypeId)]) -> TypeId {
        self.derived(name, &[], members)
    }

    /// Struct deriving from `bases`
    pub fn derived(&mut self, name: &str, bases: &[TypeId], members: &[(&str, TypeId)]) -> TypeId {
        if let Some(existing) = self.image.type_named(name) {
            return existing;
        }
        let ty = self.declare(name);
        self.define(ty, bases, members);
        ty
    }

    /// Record template arguments of a class template instantiation
    pub fn set_template_args(&mut self, ty: TypeId, args: &[TypeId]) {
        if let Some(def) = self.image.type_def_mut(ty) {
            def.template_args = args.to_vec();
        }
    }

    /// Name of a type
    pub fn name(&self, ty: TypeId) -> String {
        self.image.type_name(&ty)
    }

    /// Size of a type
    pub fn size(&self, ty: TypeId) -> u64 {
        self.image.byte_size(&ty)
    }

    fn align(&self, ty: TypeId) -> u64 {
        let Some(def) = self.image.type_def(ty) else {
            return 1;
        };
        match &def.kind {
            TypeKind::Unsigned | TypeKind::Pointer { .. } | TypeKind::Enum { .. } => {
                def.size.clamp(1, 8)
            }
            TypeKind::Array { element, .. } => self.align(*element),
            TypeKind::Struct { fields } => fields
                .iter()
                .map(|field| self.align(field.ty))
                .max()
                .unwrap_or(1),
        }
    }

    /// Map `len` zeroed bytes and return their address
    pub fn allocate_bytes(&mut self, len: u64) -> u64 {
        let address = self.next_address;
        self.image.map_region(address, len as usize);
        self.next_address = align_up(address + len + GUARD_GAP, ALLOCATION_ALIGN);
        address
    }

    /// Map a zeroed value of type `ty`
    pub fn allocate(&mut self, ty: TypeId) -> ValueRef {
        let address = self.allocate_bytes(self.size(ty));
        ValueRef { address, ty }
    }

    /// Overwrite mapped bytes
    pub fn write_bytes(&mut self, address: u64, data: &[u8]) -> Result<(), AccessError> {
        self.image.write_bytes(address, data)
    }

    /// Write a little-endian unsigned integer
    pub fn write_unsigned(&mut self, address: u64, size: u64, value: u64) -> Result<(), AccessError> {
        self.image.write_unsigned(address, size, value)
    }

    /// Write a pointer
    pub fn write_pointer(&mut self, address: u64, target: u64) -> Result<(), AccessError> {
        self.image.write_pointer(address, target)
    }

    /// Handle to a named field of `value`
    pub fn field(&self, value: ValueRef, name: &str) -> Result<ValueRef, AccessError> {
        self.image.field(&value, name)
    }

    /// Write an unsigned or pointer field, sized by its type
    pub fn set_field(&mut self, value: ValueRef, name: &str, data: u64) -> Result<(), AccessError> {
        self.image.set_field(value, name, data)
    }

    /// Bind a symbol
    pub fn symbol(&mut self, name: &str, value: ValueRef) {
        self.image.define_symbol(name, value);
    }

    /// Image built so far
    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    /// Finish building
    pub fn finish(self) -> MemoryImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layout_natural_alignment() {
        let mut builder = ImageBuilder::new();
        let u8_ty = builder.unsigned("ezUInt8", 1);
        let u32_ty = builder.unsigned("ezUInt32", 4);
        let ptr = builder.pointer(u32_ty);
        let ty = builder.structure("S", &[("a", u8_ty), ("p", ptr), ("b", u32_ty)]);

        let def = builder.image().type_def(ty).unwrap();
        let TypeKind::Struct { fields } = &def.kind else {
            panic!("not a struct");
        };
        let offsets: Vec<u64> = fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(def.size, 24);
    }

    #[test]
    fn test_types_deduplicate_by_name() {
        let mut builder = ImageBuilder::new();
        let a = builder.unsigned("ezUInt32", 4);
        let b = builder.unsigned("ezUInt32", 4);
        assert_eq!(a, b);
        let pa = builder.pointer(a);
        assert_eq!(builder.name(pa), "ezUInt32 *");
        assert_eq!(builder.pointer(b), pa);
    }

    #[test]
    fn test_allocations_leave_gaps() {
        let mut builder = ImageBuilder::new();
        let first = builder.allocate_bytes(4);
        let second = builder.allocate_bytes(4);
        assert!(second >= first + 4 + GUARD_GAP);
        assert_eq!(second % ALLOCATION_ALIGN, 0);
        assert!(builder.image().read(first, 8).is_err());
    }
}
