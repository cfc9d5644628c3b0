//! Container shapes and descriptors
//!
//! A container's shape is decided once, when it is first described:
//! - the type name is resolved to a [`ContainerKind`] by the [`ShapeRegistry`]
//! - the kind's layout rule reads the fields it needs and builds an [`Indexer`]
//!
//! The resulting [`ContainerDescriptor`] is cached by the caller until the
//! inspected value changes.

mod registry;
mod rules;

pub use registry::{ShapeRegistry, ShapeRule, TypeMatcher};
pub use rules::describe;

use std::fmt;

use crate::access::OpaqueAccessor;
use crate::index::{HybridIndexer, LinearIndexer};
use crate::tree::OrderedTreeCursor;
use crate::LensError;

/// Storage shape of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Pointer + count
    Linear,

    /// Inline buffer below a threshold, external buffer above
    Hybrid,

    /// Intrusive red-black tree with a sentinel node
    OrderedTree,
}

/// Concrete container layouts understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ContainerKind {
    /// Growable heap array
    DynamicArray,

    /// Non-owning pointer + count view
    ArrayPointer,

    /// Array with inline storage for a fixed number of elements
    HybridArray,

    /// Byte string over a hybrid array, with a separate character count
    HybridString,

    /// Non-owning pointer + length string view
    StringView,

    /// Ordered map or set
    OrderedTree,
}

impl ContainerKind {
    /// Storage shape of this kind
    pub fn shape(self) -> Shape {
        match self {
            ContainerKind::DynamicArray
            | ContainerKind::ArrayPointer
            | ContainerKind::StringView => Shape::Linear,
            ContainerKind::HybridArray | ContainerKind::HybridString => Shape::Hybrid,
            ContainerKind::OrderedTree => Shape::OrderedTree,
        }
    }

    /// Declared counts above this value are treated as corrupt
    pub fn count_ceiling(self) -> u64 {
        match self {
            ContainerKind::HybridArray | ContainerKind::HybridString => 0x1000_0000,
            _ => 0xff00_0000,
        }
    }

    /// Whether the container holds text
    pub fn is_text(self) -> bool {
        matches!(self, ContainerKind::HybridString | ContainerKind::StringView)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::DynamicArray => "dynamic-array",
            ContainerKind::ArrayPointer => "array-pointer",
            ContainerKind::HybridArray => "hybrid-array",
            ContainerKind::HybridString => "hybrid-string",
            ContainerKind::StringView => "string-view",
            ContainerKind::OrderedTree => "ordered-tree",
        };
        f.write_str(name)
    }
}

/// Shape-specific element access
#[derive(Debug)]
pub enum Indexer<A: OpaqueAccessor> {
    /// Pointer + count
    Linear(LinearIndexer<A>),

    /// Small-buffer storage
    Hybrid(HybridIndexer<A>),

    /// Sentinel tree
    OrderedTree(OrderedTreeCursor<A>),
}

impl<A: OpaqueAccessor> Indexer<A> {
    /// Shape served by this indexer
    pub fn shape(&self) -> Shape {
        match self {
            Indexer::Linear(_) => Shape::Linear,
            Indexer::Hybrid(_) => Shape::Hybrid,
            Indexer::OrderedTree(_) => Shape::OrderedTree,
        }
    }

    /// Number of logical elements
    pub fn count(&self, accessor: &A) -> Result<usize, LensError> {
        match self {
            Indexer::Linear(indexer) => indexer.count(accessor),
            Indexer::Hybrid(indexer) => indexer.count(accessor),
            Indexer::OrderedTree(cursor) => cursor.count(accessor),
        }
    }

    /// Materialize element `index`
    pub fn element_at(&mut self, accessor: &A, index: usize) -> Result<A::Handle, LensError> {
        match self {
            Indexer::Linear(indexer) => indexer.element_at(accessor, index),
            Indexer::Hybrid(indexer) => indexer.element_at(accessor, index),
            Indexer::OrderedTree(cursor) => cursor.element_at(accessor, index),
        }
    }

    /// Raw byte view of the first `limit` elements
    pub fn content(&self, accessor: &A, limit: usize) -> Result<Vec<u8>, LensError> {
        match self {
            Indexer::Linear(indexer) => indexer.content(accessor, limit),
            Indexer::Hybrid(indexer) => indexer.content(accessor, limit),
            Indexer::OrderedTree(_) => Err(LensError::Unsupported {
                type_name: "tree content".to_string(),
            }),
        }
    }

    /// Drop cached traversal state
    pub fn invalidate(&mut self) {
        if let Indexer::OrderedTree(cursor) = self {
            cursor.invalidate();
        }
    }
}

/// Named raw field surfaced next to the elements
#[derive(Debug)]
pub struct HeaderField<A: OpaqueAccessor> {
    /// Field name as declared by the container
    pub name: String,

    /// Field value
    pub value: A::Handle,
}

/// Extra metadata of string-like containers
#[derive(Debug)]
pub struct TextLayout<A: OpaqueAccessor> {
    /// Character count field (differs from the byte count for multi-byte text)
    pub character_count: Option<A::Handle>,

    /// Maximum number of bytes read for a preview
    pub preview_limit: usize,
}

/// Everything derived about one container in its update pass
#[derive(Debug)]
pub struct ContainerDescriptor<A: OpaqueAccessor> {
    /// Full type name of the container
    pub type_name: String,

    /// Matched layout
    pub kind: ContainerKind,

    /// Element access for the matched shape
    pub indexer: Indexer<A>,

    /// Raw fields shown before the elements
    pub header: Vec<HeaderField<A>>,

    /// Present for string-like containers
    pub text: Option<TextLayout<A>>,
}

impl<A: OpaqueAccessor> ContainerDescriptor<A> {
    /// Storage shape
    pub fn shape(&self) -> Shape {
        self.indexer.shape()
    }

    /// Whether the container holds text
    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }
}
