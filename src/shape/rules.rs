//! Layout rules: which fields each container kind is built from

use super::{ContainerDescriptor, ContainerKind, HeaderField, Indexer, TextLayout};
use crate::access::{value_type_name, AccessError, OpaqueAccessor};
use crate::index::{HybridIndexer, LinearIndexer};
use crate::tree::{NodeFields, OrderedTreeCursor};
use crate::{EngineConfig, LensError};

const ELEMENTS: &str = "m_pElements";
const COUNT: &str = "m_uiCount";
const CAPACITY: &str = "m_uiCapacity";
const ALLOCATOR: &str = "m_pAllocator";
const POINTER: &str = "m_ptr";
const STRING_DATA: &str = "m_Data";
const CHARACTER_COUNT: &str = "m_uiCharacterCount";
const VIEW_START: &str = "m_pStart";
const VIEW_COUNT: &str = "m_uiElementCount";
const TREE_ROOT: &str = "m_pRoot";
const TREE_SENTINEL: &str = "m_NilNode";

/// Node layout shared by maps and sets
pub(crate) const TREE_NODE: NodeFields = NodeFields {
    parent: "m_pParent",
    links: "m_pLink",
};

/// Build the descriptor of `value` using the layout of `kind`
pub fn describe<A: OpaqueAccessor>(
    accessor: &A,
    kind: ContainerKind,
    value: &A::Handle,
    config: &EngineConfig,
) -> Result<ContainerDescriptor<A>, LensError> {
    let type_name = value_type_name(accessor, value);
    tracing::debug!(%type_name, %kind, "describing container");

    let ceiling = kind.count_ceiling();
    let mut header = Vec::new();
    let mut text = None;

    let indexer = match kind {
        ContainerKind::DynamicArray => {
            let elements = accessor.field(value, ELEMENTS)?;
            let count = accessor.field(value, COUNT)?;
            let element_type = pointee(accessor, &elements)?;
            let element_size = element_size(accessor, &element_type)?;
            push_header(accessor, value, &mut header, &[COUNT, CAPACITY, ALLOCATOR])?;
            Indexer::Linear(LinearIndexer::new(
                elements,
                count,
                element_type,
                element_size,
                ceiling,
            ))
        }
        ContainerKind::ArrayPointer => {
            let elements = accessor.field(value, POINTER)?;
            let count = accessor.field(value, COUNT)?;
            let element_type = pointee(accessor, &elements)?;
            let element_size = element_size(accessor, &element_type)?;
            push_header(accessor, value, &mut header, &[COUNT])?;
            Indexer::Linear(LinearIndexer::new(
                elements,
                count,
                element_type,
                element_size,
                ceiling,
            ))
        }
        ContainerKind::HybridArray => {
            let element_type = accessor
                .template_argument(&accessor.value_type(value), 0)
                .ok_or_else(|| AccessError::MissingType(format!("element type of {type_name}")))?;
            let element_size = element_size(accessor, &element_type)?;
            let indexer = hybrid(accessor, value, element_type, element_size, ceiling)?;
            push_header(accessor, value, &mut header, &[COUNT, CAPACITY, ALLOCATOR])?;
            Indexer::Hybrid(indexer)
        }
        ContainerKind::HybridString => {
            let data = accessor.field(value, STRING_DATA)?;
            let elements = accessor.field(&data, ELEMENTS)?;
            let element_type = pointee(accessor, &elements)?;
            let element_size = element_size(accessor, &element_type)?;
            let indexer = hybrid(accessor, &data, element_type, element_size, ceiling)?;
            let character_count = accessor.field(value, CHARACTER_COUNT)?;

            push_header(accessor, &data, &mut header, &[COUNT])?;
            header.push(HeaderField {
                name: CHARACTER_COUNT.to_string(),
                value: character_count.clone(),
            });
            push_header(accessor, &data, &mut header, &[ALLOCATOR])?;

            text = Some(TextLayout {
                character_count: Some(character_count),
                preview_limit: config.string_preview_limit,
            });
            Indexer::Hybrid(indexer)
        }
        ContainerKind::StringView => {
            let elements = accessor.field(value, VIEW_START)?;
            let count = accessor.field(value, VIEW_COUNT)?;
            let element_type = pointee(accessor, &elements)?;
            let element_size = element_size(accessor, &element_type)?;
            text = Some(TextLayout {
                character_count: None,
                preview_limit: config.view_preview_limit,
            });
            Indexer::Linear(LinearIndexer::new(
                elements,
                count,
                element_type,
                element_size,
                ceiling,
            ))
        }
        ContainerKind::OrderedTree => {
            let count = accessor.field(value, COUNT)?;
            let root = accessor.field(value, TREE_ROOT)?;
            let sentinel = accessor.identity(&accessor.field(value, TREE_SENTINEL)?)?;
            push_header(accessor, value, &mut header, &[COUNT])?;
            Indexer::OrderedTree(OrderedTreeCursor::new(
                root,
                count,
                sentinel,
                TREE_NODE,
                ceiling,
                config.max_steps,
            ))
        }
    };

    Ok(ContainerDescriptor {
        type_name,
        kind,
        indexer,
        header,
        text,
    })
}

/// Hybrid storage of an array value: inline buffer is child 1 → child 0
fn hybrid<A: OpaqueAccessor>(
    accessor: &A,
    array: &A::Handle,
    element_type: A::Type,
    element_size: u64,
    ceiling: u64,
) -> Result<HybridIndexer<A>, LensError> {
    let elements = accessor.field(array, ELEMENTS)?;
    let count = accessor.field(array, COUNT)?;
    let storage = accessor.child_at_index(array, 1)?;
    let inline = accessor.child_at_index(&storage, 0)?;

    let inline_bytes = accessor.byte_size(&accessor.value_type(&inline));
    let local_capacity = usize::try_from(inline_bytes / element_size).map_err(|_| {
        AccessError::inconsistent(format!("inline buffer of {inline_bytes} bytes"))
    })?;
    tracing::debug!(inline_bytes, element_size, local_capacity, "hybrid inline storage");

    Ok(HybridIndexer::new(
        inline,
        elements,
        count,
        element_type,
        element_size,
        local_capacity,
        ceiling,
    ))
}

fn pointee<A: OpaqueAccessor>(accessor: &A, pointer: &A::Handle) -> Result<A::Type, LensError> {
    let ty = accessor.value_type(pointer);
    accessor.pointee_type(&ty).ok_or_else(|| {
        AccessError::MissingType(format!("pointee of {}", accessor.type_name(&ty))).into()
    })
}

fn element_size<A: OpaqueAccessor>(accessor: &A, ty: &A::Type) -> Result<u64, LensError> {
    match accessor.byte_size(ty) {
        0 => Err(AccessError::MissingType(format!("size of {}", accessor.type_name(ty))).into()),
        size => Ok(size),
    }
}

fn push_header<A: OpaqueAccessor>(
    accessor: &A,
    value: &A::Handle,
    header: &mut Vec<HeaderField<A>>,
    names: &[&str],
) -> Result<(), LensError> {
    for name in names {
        header.push(HeaderField {
            name: name.to_string(),
            value: accessor.field(value, name)?,
        });
    }
    Ok(())
}
