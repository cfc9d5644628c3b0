//! Shared helpers for integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;

use synthlens::memory::{TypeId, ValueRef};
use synthlens::{
    AccessError, ContainerView, EngineConfig, Inspector, MemoryImage, OpaqueAccessor,
    ShapeRegistry,
};

/// Inspector with the default registry and configuration
pub fn inspector(image: &MemoryImage) -> Inspector<'_, MemoryImage> {
    Inspector::new(image, ShapeRegistry::with_defaults(), EngineConfig::default())
}

/// View over a symbol of `image`
pub fn view<'a>(
    inspector: &Inspector<'a, MemoryImage>,
    image: &MemoryImage,
    symbol: &str,
) -> ContainerView<'a, MemoryImage> {
    let value = image
        .symbol(symbol)
        .unwrap_or_else(|| panic!("symbol {symbol} missing"));
    inspector.view(&value).expect("describable container")
}

/// Unsigned value of every element in index order; `None` marks unavailable
pub fn scalars(image: &MemoryImage, view: &mut ContainerView<'_, MemoryImage>) -> Vec<Option<u64>> {
    (0..view.count())
        .map(|index| {
            view.element_at(index)
                .into_option()
                .map(|handle| image.unsigned_value(&handle, u64::MAX))
        })
        .collect()
}

/// Key stored in a tree node
pub fn node_key(image: &impl OpaqueAccessor<Handle = ValueRef>, node: &ValueRef) -> u64 {
    let key = image.field(node, "m_Key").expect("node has a key");
    image.unsigned_value(&key, u64::MAX)
}

/// Keys of a tree view, requested at the given indices
pub fn keys_at<A>(view: &mut ContainerView<'_, A>, indices: impl IntoIterator<Item = usize>) -> Vec<u64>
where
    A: OpaqueAccessor<Handle = ValueRef>,
{
    let accessor = view.accessor();
    indices
        .into_iter()
        .map(|index| {
            let node = view
                .try_element_at(index)
                .unwrap_or_else(|err| panic!("element {index}: {err}"));
            node_key(accessor, &node)
        })
        .collect()
}

/// Image behind a `RefCell` so tests can mutate it while a view is alive
///
/// Addresses added with [`LiveImage::hide_address`] have no identity.
#[derive(Debug)]
pub struct LiveImage(pub RefCell<MemoryImage>, RefCell<BTreeSet<u64>>);

impl LiveImage {
    pub fn new(image: MemoryImage) -> Self {
        Self(RefCell::new(image), RefCell::new(BTreeSet::new()))
    }

    pub fn hide_address(&self, address: u64) {
        self.1.borrow_mut().insert(address);
    }

    pub fn set_field(&self, value: ValueRef, name: &str, data: u64) {
        self.0
            .borrow_mut()
            .set_field(value, name, data)
            .expect("field is writable");
    }

    pub fn symbol(&self, name: &str) -> ValueRef {
        self.0.borrow().symbol(name).expect("symbol exists")
    }
}

impl OpaqueAccessor for LiveImage {
    type Handle = ValueRef;
    type Type = TypeId;
    type Identity = u64;

    fn field(&self, value: &ValueRef, name: &str) -> Result<ValueRef, AccessError> {
        self.0.borrow().field(value, name)
    }

    fn child_at_index(&self, value: &ValueRef, index: usize) -> Result<ValueRef, AccessError> {
        self.0.borrow().child_at_index(value, index)
    }

    fn dereference(&self, pointer: &ValueRef) -> Result<ValueRef, AccessError> {
        self.0.borrow().dereference(pointer)
    }

    fn child_at_offset(
        &self,
        base: &ValueRef,
        index: usize,
        byte_offset: u64,
        element_type: &TypeId,
    ) -> Result<ValueRef, AccessError> {
        self.0
            .borrow()
            .child_at_offset(base, index, byte_offset, element_type)
    }

    fn unsigned_value(&self, value: &ValueRef, default: u64) -> u64 {
        self.0.borrow().unsigned_value(value, default)
    }

    fn identity(&self, value: &ValueRef) -> Result<u64, AccessError> {
        if self.1.borrow().contains(&value.address) {
            return Err(AccessError::Unreadable {
                address: value.address,
                len: 0,
            });
        }
        Ok(value.address)
    }

    fn raw_bytes(&self, value: &ValueRef, count: usize) -> Result<Vec<u8>, AccessError> {
        self.0.borrow().raw_bytes(value, count)
    }

    fn value_type(&self, value: &ValueRef) -> TypeId {
        value.ty
    }

    fn type_name(&self, ty: &TypeId) -> String {
        self.0.borrow().type_name(ty)
    }

    fn byte_size(&self, ty: &TypeId) -> u64 {
        self.0.borrow().byte_size(ty)
    }

    fn pointee_type(&self, ty: &TypeId) -> Option<TypeId> {
        self.0.borrow().pointee_type(ty)
    }

    fn template_argument(&self, ty: &TypeId, index: usize) -> Option<TypeId> {
        self.0.borrow().template_argument(ty, index)
    }
}
