//! Sample layouts of the engine's containers
//!
//! Each function lays out one container the way the engine's headers do and
//! fills it with the given elements. [`standard`] bundles one of each (plus a
//! few corrupted ones) under well-known symbols; the CLI's `sample` command
//! writes it out and the test suite builds on the individual pieces.

use std::collections::BTreeMap;

use super::{ImageBuilder, MemoryImage, TypeId, ValueRef, POINTER_SIZE};
use crate::access::{AccessError, OpaqueAccessor};
use crate::tree::Direction;

const UINT8: &str = "ezUInt8";
const UINT32: &str = "ezUInt32";
const UINT64: &str = "ezUInt64";
const CHAR: &str = "char";
const ALLOCATOR_WRAPPER: &str = "ezDefaultAllocatorWrapper";

/// Node field holding the child pointers
const LINKS: &str = "m_pLink";

/// Shape of a generated search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeShape {
    /// Midpoint-balanced over the sorted keys
    Balanced,

    /// Plain binary-search-tree insertion in the given order
    InsertionOrder,
}

/// Which ordered associative container to lay out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// `ezMap<K, V>`; each value is the key times ten
    Map,

    /// `ezSet<K>`
    Set,
}

/// Generated map or set
#[derive(Debug, Clone)]
pub struct TreeSample {
    /// Container value
    pub value: ValueRef,

    /// Address of the sentinel node
    pub sentinel: u64,

    /// Node of each key
    pub nodes: BTreeMap<u32, ValueRef>,
}

impl TreeSample {
    /// Node holding `key`
    pub fn node(&self, key: u32) -> Option<ValueRef> {
        self.nodes.get(&key).copied()
    }
}

fn uint32(b: &mut ImageBuilder) -> TypeId {
    b.unsigned(UINT32, 4)
}

fn allocator_type(b: &mut ImageBuilder) -> TypeId {
    let id = b.unsigned(UINT64, 8);
    b.structure("ezAllocator", &[("m_Id", id)])
}

fn allocator(b: &mut ImageBuilder) -> Result<u64, AccessError> {
    let ty = allocator_type(b);
    let allocator = b.allocate(ty);
    b.set_field(allocator, "m_Id", 1)?;
    Ok(allocator.address)
}

/// `ezArrayBase` → `ezDynamicArrayBase` for `element`
fn dynamic_array_base(b: &mut ImageBuilder, element: TypeId) -> TypeId {
    let element_name = b.name(element);
    let elements = b.pointer(element);
    let count = uint32(b);
    let array_base = b.structure(
        &format!("ezArrayBase<{element_name}, ezDynamicArrayBase<{element_name}>>"),
        &[
            ("m_pElements", elements),
            ("m_uiCount", count),
            ("m_uiCapacity", count),
        ],
    );
    let allocator = allocator_type(b);
    let allocator = b.pointer(allocator);
    b.derived(
        &format!("ezDynamicArrayBase<{element_name}>"),
        &[array_base],
        &[("m_pAllocator", allocator)],
    )
}

fn write_elements(
    b: &mut ImageBuilder,
    address: u64,
    element: TypeId,
    values: &[u64],
) -> Result<(), AccessError> {
    let size = b.size(element);
    for (index, value) in values.iter().enumerate() {
        b.write_unsigned(address + index as u64 * size, size, *value)?;
    }
    Ok(())
}

/// Allocate an external buffer for `values`, `0` when there are none
fn external_buffer(
    b: &mut ImageBuilder,
    element: TypeId,
    values: &[u64],
) -> Result<(u64, u64), AccessError> {
    if values.is_empty() {
        return Ok((0, 0));
    }
    let capacity = (values.len() as u64).next_power_of_two().max(4);
    let address = b.allocate_bytes(capacity * b.size(element));
    write_elements(b, address, element, values)?;
    Ok((address, capacity))
}

/// `ezDynamicArray<ezUInt32>` holding `values`
pub fn dynamic_array(b: &mut ImageBuilder, values: &[u32]) -> Result<ValueRef, AccessError> {
    let element = uint32(b);
    let values: Vec<u64> = values.iter().map(|v| u64::from(*v)).collect();
    dynamic_array_of(b, element, &values)
}

/// `ezDynamicArray<T>` holding `values`, each written with `element`'s size
pub fn dynamic_array_of(
    b: &mut ImageBuilder,
    element: TypeId,
    values: &[u64],
) -> Result<ValueRef, AccessError> {
    let base = dynamic_array_base(b, element);
    let name = format!("ezDynamicArray<{}, {ALLOCATOR_WRAPPER}>", b.name(element));
    let ty = b.derived(&name, &[base], &[]);
    b.set_template_args(ty, &[element]);

    let array = b.allocate(ty);
    let (elements, capacity) = external_buffer(b, element, values)?;
    let allocator = allocator(b)?;
    b.set_field(array, "m_pElements", elements)?;
    b.set_field(array, "m_uiCount", values.len() as u64)?;
    b.set_field(array, "m_uiCapacity", capacity)?;
    b.set_field(array, "m_pAllocator", allocator)?;
    Ok(array)
}

/// `ezArrayPtr<ezUInt32>` over `values`
pub fn array_ptr(b: &mut ImageBuilder, values: &[u32]) -> Result<ValueRef, AccessError> {
    let element = uint32(b);
    let name = format!("ezArrayPtr<{UINT32}>");
    let values: Vec<u64> = values.iter().map(|v| u64::from(*v)).collect();
    array_ptr_of(b, &name, element, &values)
}

/// Byte array pointer (`ezByteArrayPtr`) over `bytes`
pub fn byte_array_ptr(b: &mut ImageBuilder, bytes: &[u8]) -> Result<ValueRef, AccessError> {
    let element = b.unsigned(UINT8, 1);
    let values: Vec<u64> = bytes.iter().map(|v| u64::from(*v)).collect();
    array_ptr_of(b, "ezByteArrayPtr", element, &values)
}

/// Array pointer type `type_name` over `values`
pub fn array_ptr_of(
    b: &mut ImageBuilder,
    type_name: &str,
    element: TypeId,
    values: &[u64],
) -> Result<ValueRef, AccessError> {
    let pointer = b.pointer(element);
    let count = uint32(b);
    let ty = b.structure(type_name, &[("m_ptr", pointer), ("m_uiCount", count)]);
    b.set_template_args(ty, &[element]);

    let value = b.allocate(ty);
    let (elements, _) = external_buffer(b, element, values)?;
    b.set_field(value, "m_ptr", elements)?;
    b.set_field(value, "m_uiCount", values.len() as u64)?;
    Ok(value)
}

/// `ezHybridArray<T, N>` type: dynamic array base plus an inline byte buffer
fn hybrid_array_type(b: &mut ImageBuilder, element: TypeId, local_capacity: u64) -> TypeId {
    let base = dynamic_array_base(b, element);
    let element_name = b.name(element);
    let byte = b.unsigned(UINT8, 1);
    let bytes = b.array(byte, local_capacity * b.size(element));
    let storage = b.structure(
        &format!("ezHybridArray<{element_name}, {local_capacity}>::Storage"),
        &[("m_Data", bytes)],
    );
    let ty = b.derived(
        &format!("ezHybridArray<{element_name}, {local_capacity}, {ALLOCATOR_WRAPPER}>"),
        &[base],
        &[("m_StaticData", storage)],
    );
    b.set_template_args(ty, &[element]);
    ty
}

/// Fill a hybrid array: inline while `values` fit, external otherwise
fn fill_hybrid(
    b: &mut ImageBuilder,
    array: ValueRef,
    element: TypeId,
    local_capacity: u64,
    values: &[u64],
) -> Result<(), AccessError> {
    let count = values.len() as u64;
    let (elements, capacity) = if count <= local_capacity {
        let inline = b.field(array, "m_StaticData")?.address;
        write_elements(b, inline, element, values)?;
        (inline, local_capacity)
    } else {
        external_buffer(b, element, values)?
    };
    let allocator = allocator(b)?;
    b.set_field(array, "m_pElements", elements)?;
    b.set_field(array, "m_uiCount", count)?;
    b.set_field(array, "m_uiCapacity", capacity)?;
    b.set_field(array, "m_pAllocator", allocator)?;
    Ok(())
}

/// `ezHybridArray<ezUInt32, N>` holding `values`
pub fn hybrid_array(
    b: &mut ImageBuilder,
    values: &[u32],
    local_capacity: u64,
) -> Result<ValueRef, AccessError> {
    let element = uint32(b);
    let ty = hybrid_array_type(b, element, local_capacity);
    let array = b.allocate(ty);
    let values: Vec<u64> = values.iter().map(|v| u64::from(*v)).collect();
    fill_hybrid(b, array, element, local_capacity, &values)?;
    Ok(array)
}

/// `ezHybridString<N>` holding `text` (no terminator counted)
pub fn hybrid_string(
    b: &mut ImageBuilder,
    text: &str,
    local_capacity: u64,
) -> Result<ValueRef, AccessError> {
    let name = format!("ezHybridString<{local_capacity}, {ALLOCATOR_WRAPPER}>");
    string_of(b, &name, text, local_capacity)
}

/// `ezStringBuilder` holding `text`
pub fn string_builder(b: &mut ImageBuilder, text: &str) -> Result<ValueRef, AccessError> {
    string_of(b, "ezStringBuilder", text, 128)
}

fn string_of(
    b: &mut ImageBuilder,
    type_name: &str,
    text: &str,
    local_capacity: u64,
) -> Result<ValueRef, AccessError> {
    let element = b.unsigned(CHAR, 1);
    let data = hybrid_array_type(b, element, local_capacity);
    let count = uint32(b);
    let ty = b.structure(type_name, &[("m_Data", data), ("m_uiCharacterCount", count)]);

    let string = b.allocate(ty);
    let array = b.field(string, "m_Data")?;
    let bytes: Vec<u64> = text.bytes().map(u64::from).collect();
    fill_hybrid(b, array, element, local_capacity, &bytes)?;
    b.set_field(string, "m_uiCharacterCount", text.chars().count() as u64)?;
    Ok(string)
}

fn string_view_type(b: &mut ImageBuilder) -> TypeId {
    let element = b.unsigned(CHAR, 1);
    let start = b.pointer(element);
    let count = uint32(b);
    b.structure(
        "ezStringView",
        &[("m_pStart", start), ("m_uiElementCount", count)],
    )
}

/// `ezStringView` over a copy of `text`
pub fn string_view(b: &mut ImageBuilder, text: &str) -> Result<ValueRef, AccessError> {
    let ty = string_view_type(b);
    let view = b.allocate(ty);
    let storage = b.allocate_bytes(text.len() as u64);
    b.write_bytes(storage, text.as_bytes())?;
    b.set_field(view, "m_pStart", storage)?;
    b.set_field(view, "m_uiElementCount", text.len() as u64)?;
    Ok(view)
}

/// `ezStringView` with a null start pointer and a nonzero count
pub fn null_string_view(b: &mut ImageBuilder, count: u64) -> Result<ValueRef, AccessError> {
    let ty = string_view_type(b);
    let view = b.allocate(ty);
    b.set_field(view, "m_uiElementCount", count)?;
    Ok(view)
}

/// `ezEnum<ezBasisAxis>` holding `value`
pub fn basis_axis(b: &mut ImageBuilder, value: u8) -> Result<ValueRef, AccessError> {
    b.enumeration(
        "ezBasisAxis::Enum",
        1,
        &[
            ("PositiveX", 0),
            ("PositiveY", 1),
            ("PositiveZ", 2),
            ("NegativeX", 3),
            ("NegativeY", 4),
            ("NegativeZ", 5),
        ],
    );
    let storage = b.unsigned(UINT8, 1);
    let argument = b.structure("ezBasisAxis", &[]);
    let ty = b.structure("ezEnum<ezBasisAxis>", &[("m_Value", storage)]);
    b.set_template_args(ty, &[argument]);

    let wrapper = b.allocate(ty);
    b.set_field(wrapper, "m_Value", u64::from(value))?;
    Ok(wrapper)
}

/// In-memory plan of a tree before it is written out
#[derive(Debug, Default)]
struct Plan {
    keys: Vec<u32>,
    parent: Vec<Option<usize>>,
    links: Vec<[Option<usize>; 2]>,
    root: Option<usize>,
}

impl Plan {
    fn push(&mut self, key: u32, parent: Option<usize>) -> usize {
        self.keys.push(key);
        self.parent.push(parent);
        self.links.push([None, None]);
        self.keys.len() - 1
    }

    fn balanced(keys: &[u32]) -> Self {
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut plan = Self::default();
        plan.root = plan.build(&sorted, None);
        plan
    }

    fn build(&mut self, keys: &[u32], parent: Option<usize>) -> Option<usize> {
        if keys.is_empty() {
            return None;
        }
        let mid = keys.len() / 2;
        let node = self.push(keys[mid], parent);
        self.links[node][0] = self.build(&keys[..mid], Some(node));
        self.links[node][1] = self.build(&keys[mid + 1..], Some(node));
        Some(node)
    }

    fn inserted(keys: &[u32]) -> Self {
        let mut plan = Self::default();
        for &key in keys {
            let Some(mut current) = plan.root else {
                plan.root = Some(plan.push(key, None));
                continue;
            };
            loop {
                if key == plan.keys[current] {
                    break;
                }
                let side = usize::from(key > plan.keys[current]);
                match plan.links[current][side] {
                    Some(next) => current = next,
                    None => {
                        let node = plan.push(key, Some(current));
                        plan.links[current][side] = Some(node);
                        break;
                    }
                }
            }
        }
        plan
    }

    fn level(&self, node: usize) -> u64 {
        let mut level = 1;
        let mut current = node;
        while let Some(parent) = self.parent[current] {
            level += 1;
            current = parent;
        }
        level
    }
}

/// Node types of a map or set: `(nil node, node)`
fn tree_node_types(b: &mut ImageBuilder, kind: TreeKind) -> (TypeId, TypeId) {
    let key = uint32(b);
    let base = match kind {
        TreeKind::Map => format!("ezMapBase<{UINT32}, {UINT32}, ezCompareHelper<{UINT32}>>"),
        TreeKind::Set => format!("ezSetBase<{UINT32}, ezCompareHelper<{UINT32}>>"),
    };
    let node = b.declare(&format!("{base}::Node"));
    let node_ptr = b.pointer(node);
    let links = b.array(node_ptr, 2);
    let level = uint32(b);
    let nil = b.structure(
        &format!("{base}::NilNode"),
        &[("m_pParent", node_ptr), (LINKS, links), ("m_uiLevel", level)],
    );
    match kind {
        TreeKind::Map => b.define(node, &[nil], &[("m_Key", key), ("m_Value", key)]),
        TreeKind::Set => b.define(node, &[nil], &[("m_Key", key)]),
    }
    (nil, node)
}

/// Address of the pointer slot for `direction` in `node`
fn link_slot(image: &MemoryImage, node: ValueRef, direction: Direction) -> Result<u64, AccessError> {
    let links = image.field(&node, LINKS)?;
    Ok(links.address + direction.link_index() as u64 * POINTER_SIZE)
}

/// Point a node's child link at `target`
pub fn set_link(
    image: &mut MemoryImage,
    node: ValueRef,
    direction: Direction,
    target: u64,
) -> Result<(), AccessError> {
    let slot = link_slot(image, node, direction)?;
    image.write_pointer(slot, target)
}

/// Point a node's parent link at `target`
pub fn set_parent(image: &mut MemoryImage, node: ValueRef, target: u64) -> Result<(), AccessError> {
    image.set_field(node, "m_pParent", target)
}

/// Map or set over `keys` (duplicates dropped)
pub fn ordered_tree(
    b: &mut ImageBuilder,
    kind: TreeKind,
    keys: &[u32],
    shape: TreeShape,
) -> Result<TreeSample, AccessError> {
    let (nil_type, node_type) = tree_node_types(b, kind);
    let node_ptr = b.pointer(node_type);
    let count = uint32(b);
    let name = match kind {
        TreeKind::Map => format!(
            "ezMap<{UINT32}, {UINT32}, ezCompareHelper<{UINT32}>, {ALLOCATOR_WRAPPER}>"
        ),
        TreeKind::Set => format!("ezSet<{UINT32}, ezCompareHelper<{UINT32}>, {ALLOCATOR_WRAPPER}>"),
    };
    let ty = b.structure(
        &name,
        &[
            ("m_NilNode", nil_type),
            ("m_pRoot", node_ptr),
            ("m_uiCount", count),
        ],
    );
    let key_type = uint32(b);
    b.set_template_args(ty, &[key_type]);

    let tree = b.allocate(ty);
    let sentinel = b.field(tree, "m_NilNode")?;
    let sentinel_node = ValueRef {
        address: sentinel.address,
        ty: nil_type,
    };
    b.set_field(sentinel_node, "m_pParent", sentinel.address)?;
    for direction in [Direction::Left, Direction::Right] {
        let slot = link_slot(b.image(), sentinel_node, direction)?;
        b.write_pointer(slot, sentinel.address)?;
    }

    let plan = match shape {
        TreeShape::Balanced => Plan::balanced(keys),
        TreeShape::InsertionOrder => Plan::inserted(keys),
    };
    let nodes: Vec<ValueRef> = plan.keys.iter().map(|_| b.allocate(node_type)).collect();
    let address = |slot: Option<usize>| slot.map_or(sentinel.address, |n| nodes[n].address);

    for (index, node) in nodes.iter().enumerate() {
        b.set_field(*node, "m_pParent", address(plan.parent[index]))?;
        for direction in [Direction::Left, Direction::Right] {
            let slot = link_slot(b.image(), *node, direction)?;
            b.write_pointer(slot, address(plan.links[index][direction.link_index()]))?;
        }
        b.set_field(*node, "m_uiLevel", plan.level(index))?;
        let key = u64::from(plan.keys[index]);
        b.set_field(*node, "m_Key", key)?;
        if kind == TreeKind::Map {
            b.set_field(*node, "m_Value", key * 10)?;
        }
    }

    b.set_field(tree, "m_pRoot", address(plan.root))?;
    b.set_field(tree, "m_uiCount", nodes.len() as u64)?;

    Ok(TreeSample {
        value: tree,
        sentinel: sentinel.address,
        nodes: plan.keys.iter().copied().zip(nodes.iter().copied()).collect(),
    })
}

/// Image with one of every supported container under a well-known symbol
///
/// | symbol | contents |
/// |---|---|
/// | `numbers` | dynamic array 1..=5 |
/// | `no_numbers` | empty dynamic array |
/// | `corrupt_numbers` | dynamic array with count `0xFFFFFFFF` |
/// | `slice` | array pointer 10, 20, 30 |
/// | `bytes` | byte array pointer |
/// | `small` / `large` | hybrid arrays, inline and external |
/// | `greeting` / `long_text` / `unicode` | hybrid strings |
/// | `builder` | string builder |
/// | `view` / `null_view` | string views |
/// | `lookup` | map over 1, 3, 5, 7, 9 |
/// | `chain` | map built by ascending insertion |
/// | `tags` | set |
/// | `no_entries` | empty map |
/// | `axis` / `bad_axis` | enum wrappers |
pub fn standard() -> Result<MemoryImage, AccessError> {
    let mut b = ImageBuilder::new();

    let numbers = dynamic_array(&mut b, &[1, 2, 3, 4, 5])?;
    b.symbol("numbers", numbers);
    let empty = dynamic_array(&mut b, &[])?;
    b.symbol("no_numbers", empty);
    let corrupt = dynamic_array(&mut b, &[1, 2, 3])?;
    b.set_field(corrupt, "m_uiCount", 0xFFFF_FFFF)?;
    b.symbol("corrupt_numbers", corrupt);

    let slice = array_ptr(&mut b, &[10, 20, 30])?;
    b.symbol("slice", slice);
    let bytes = byte_array_ptr(&mut b, b"\x01\x02\xfe\xff")?;
    b.symbol("bytes", bytes);

    let small = hybrid_array(&mut b, &[1, 2, 3], 4)?;
    b.symbol("small", small);
    let large: Vec<u32> = (1..=10).collect();
    let large = hybrid_array(&mut b, &large, 4)?;
    b.symbol("large", large);

    let greeting = hybrid_string(&mut b, "hello", 16)?;
    b.symbol("greeting", greeting);
    let long_text = hybrid_string(&mut b, "the quick brown fox jumps over the lazy dog", 16)?;
    b.symbol("long_text", long_text);
    let unicode = hybrid_string(&mut b, "größe", 16)?;
    b.symbol("unicode", unicode);
    let builder = string_builder(&mut b, "Data/Textures/Stone.dds")?;
    b.symbol("builder", builder);

    let view = string_view(&mut b, "world")?;
    b.symbol("view", view);
    let null_view = null_string_view(&mut b, 3)?;
    b.symbol("null_view", null_view);

    let lookup = ordered_tree(&mut b, TreeKind::Map, &[1, 3, 5, 7, 9], TreeShape::Balanced)?;
    b.symbol("lookup", lookup.value);
    let ascending: Vec<u32> = (1..=32).collect();
    let chain = ordered_tree(&mut b, TreeKind::Map, &ascending, TreeShape::InsertionOrder)?;
    b.symbol("chain", chain.value);
    let tags = ordered_tree(&mut b, TreeKind::Set, &[40, 10, 30, 20], TreeShape::InsertionOrder)?;
    b.symbol("tags", tags.value);
    let no_entries = ordered_tree(&mut b, TreeKind::Map, &[], TreeShape::Balanced)?;
    b.symbol("no_entries", no_entries.value);

    let axis = basis_axis(&mut b, 2)?;
    b.symbol("axis", axis);
    let bad_axis = basis_axis(&mut b, 42)?;
    b.symbol("bad_axis", bad_axis);

    Ok(b.finish())
}
