//! [`OpaqueAccessor`] over a [`MemoryImage`]

use super::{MemoryImage, TypeDef, TypeId, TypeKind, ValueRef, POINTER_SIZE};
use crate::access::{AccessError, OpaqueAccessor};

/// Base classes nest at most this deep
const MAX_BASE_DEPTH: usize = 32;

impl MemoryImage {
    fn def(&self, ty: TypeId) -> Result<&TypeDef, AccessError> {
        self.type_def(ty)
            .ok_or_else(|| AccessError::MissingType(format!("type #{}", ty.0)))
    }

    fn name_of(&self, ty: TypeId) -> String {
        self.type_def(ty)
            .map_or_else(|| format!("<type #{}>", ty.0), |def| def.name.clone())
    }

    /// Offset and type of `name` inside `ty`, searching bases depth-first
    fn find_field(&self, ty: TypeId, name: &str, depth: usize) -> Option<(u64, TypeId)> {
        if depth > MAX_BASE_DEPTH {
            return None;
        }
        let TypeKind::Struct { fields } = &self.type_def(ty)?.kind else {
            return None;
        };
        if let Some(field) = fields.iter().find(|f| !f.base && f.name == name) {
            return Some((field.offset, field.ty));
        }
        fields.iter().filter(|f| f.base).find_map(|base| {
            self.find_field(base.ty, name, depth + 1)
                .map(|(offset, ty)| (base.offset + offset, ty))
        })
    }

    /// Overwrite an unsigned or pointer field of `value`, sized by its type
    pub fn set_field(&mut self, value: ValueRef, name: &str, data: u64) -> Result<(), AccessError> {
        let field = self.field(&value, name)?;
        let size = self.def(field.ty)?.size;
        self.write_unsigned(field.address, size, data)
    }

    /// Address content lives at: the pointee for pointers, the value otherwise
    fn storage_address(&self, value: &ValueRef) -> Result<u64, AccessError> {
        match self.def(value.ty)?.kind {
            TypeKind::Pointer { .. } => match self.read_unsigned(value.address, POINTER_SIZE)? {
                0 => Err(AccessError::BadPointer {
                    type_name: self.name_of(value.ty),
                }),
                target => Ok(target),
            },
            _ => Ok(value.address),
        }
    }
}

impl OpaqueAccessor for MemoryImage {
    type Handle = ValueRef;
    type Type = TypeId;
    type Identity = u64;

    fn field(&self, value: &ValueRef, name: &str) -> Result<ValueRef, AccessError> {
        let (offset, ty) = self.find_field(value.ty, name, 0).ok_or_else(|| {
            AccessError::MissingField {
                field: name.to_string(),
                type_name: self.name_of(value.ty),
            }
        })?;
        Ok(ValueRef {
            address: value.address + offset,
            ty,
        })
    }

    fn child_at_index(&self, value: &ValueRef, index: usize) -> Result<ValueRef, AccessError> {
        let missing = || AccessError::MissingChild {
            index,
            type_name: self.name_of(value.ty),
        };
        match &self.def(value.ty)?.kind {
            TypeKind::Struct { fields } => {
                let field = fields.get(index).ok_or_else(missing)?;
                Ok(ValueRef {
                    address: value.address + field.offset,
                    ty: field.ty,
                })
            }
            TypeKind::Array { element, len } if (index as u64) < *len => {
                let size = self.def(*element)?.size;
                Ok(ValueRef {
                    address: value.address + index as u64 * size,
                    ty: *element,
                })
            }
            _ => Err(missing()),
        }
    }

    fn dereference(&self, pointer: &ValueRef) -> Result<ValueRef, AccessError> {
        let TypeKind::Pointer { pointee } = self.def(pointer.ty)?.kind else {
            return Err(AccessError::BadPointer {
                type_name: self.name_of(pointer.ty),
            });
        };
        let address = self.storage_address(pointer)?;
        Ok(ValueRef {
            address,
            ty: pointee,
        })
    }

    fn child_at_offset(
        &self,
        base: &ValueRef,
        _index: usize,
        byte_offset: u64,
        element_type: &TypeId,
    ) -> Result<ValueRef, AccessError> {
        let start = self.storage_address(base)?;
        let size = self.def(*element_type)?.size;
        let address = start
            .checked_add(byte_offset)
            .ok_or(AccessError::Unreadable { address: start, len: byte_offset })?;
        // Only hand out handles to mapped memory
        self.read(address, size)?;
        Ok(ValueRef {
            address,
            ty: *element_type,
        })
    }

    fn unsigned_value(&self, value: &ValueRef, default: u64) -> u64 {
        let Some(def) = self.type_def(value.ty) else {
            return default;
        };
        match def.kind {
            TypeKind::Unsigned | TypeKind::Pointer { .. } | TypeKind::Enum { .. } => self
                .read_unsigned(value.address, def.size)
                .unwrap_or(default),
            _ => default,
        }
    }

    fn identity(&self, value: &ValueRef) -> Result<u64, AccessError> {
        Ok(value.address)
    }

    fn raw_bytes(&self, value: &ValueRef, count: usize) -> Result<Vec<u8>, AccessError> {
        let start = self.storage_address(value)?;
        Ok(self.read(start, count as u64)?.to_vec())
    }

    fn value_type(&self, value: &ValueRef) -> TypeId {
        value.ty
    }

    fn type_name(&self, ty: &TypeId) -> String {
        self.name_of(*ty)
    }

    fn byte_size(&self, ty: &TypeId) -> u64 {
        self.type_def(*ty).map_or(0, |def| def.size)
    }

    fn pointee_type(&self, ty: &TypeId) -> Option<TypeId> {
        match self.type_def(*ty)?.kind {
            TypeKind::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    fn template_argument(&self, ty: &TypeId, index: usize) -> Option<TypeId> {
        self.type_def(*ty)?.template_args.get(index).copied()
    }

    fn find_type(&self, name: &str) -> Option<TypeId> {
        self.type_named(name)
    }

    fn enum_members(&self, ty: &TypeId) -> Vec<(String, u64)> {
        match self.type_def(*ty).map(|def| &def.kind) {
            Some(TypeKind::Enum { members }) => members.clone(),
            _ => Vec::new(),
        }
    }
}
