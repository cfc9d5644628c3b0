//! # Container introspection for debugger visualizers
//!
//! This library reconstructs the logical contents of containers that live in
//! another process, using nothing but a raw layout accessor supplied by the
//! debugger host.
//!
//! ## Core Algorithm
//!
//! 1. **Describe once**: resolve the container's type name to a layout and
//!    read the fields it needs into a cached descriptor
//! 2. **Count with a sanity ceiling**: implausible counts degrade to 0
//! 3. **Index by shape**: pointer + count, inline/external hybrid storage, or
//!    an in-order walk of a sentinel red-black tree
//! 4. **Bound every walk**: links from the target are untrusted, so every loop
//!    runs under a step guard and failures map to a single "unavailable" marker
//!
//! ## Usage Example
//!
//! ```ignore
//! use synthlens::{Inspector, EngineConfig, ShapeRegistry};
//!
//! let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), EngineConfig::default());
//! let mut view = inspector.view(&value)?;
//! for index in 0..view.count() {
//!     println!("{:?}", view.element_at(index));
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules
pub mod access;   // Opaque accessor capability set
pub mod budget;   // Step guards and traversal counters
pub mod index;    // Linear and hybrid indexers
pub mod tree;     // Sentinel red-black tree cursor
pub mod shape;    // Shape registry and layout rules
pub mod view;     // Uniform container façade and summaries
pub mod provider; // Synthetic-children protocol
pub mod memory;   // Serializable memory image backend
/// Python bindings for the LLDB scripting host.
#[cfg(feature = "python-bindings")]
pub mod python_bindings;

// Re-exports for convenience
pub use access::{AccessError, OpaqueAccessor};
pub use budget::{BoundedStepGuard, TraversalStats};
pub use index::{HybridIndexer, LinearIndexer, Storage};
pub use memory::{ImageBuilder, MemoryImage, TypeId, ValueRef};
pub use provider::{Child, ChildValue, SyntheticChildren};
pub use shape::{ContainerDescriptor, ContainerKind, Shape, ShapeRegistry, TypeMatcher};
pub use tree::{OrderedTreeCursor, TraversalCursor};
pub use view::{ContainerView, Slot};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while inspecting a container
///
/// None of these cross the [`ContainerView`] boundary: the view maps every one
/// of them to [`Slot::Unavailable`], a count of 0 or a placeholder summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    /// An accessor primitive could not resolve a field, pointer or read
    #[error("access failed: {0}")]
    AccessFailed(#[from] AccessError),

    /// Logical index outside `[0, count)`
    #[error("index {index} out of range (count {count})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Element count at the time of the request
        count: usize,
    },

    /// A bounded traversal hit its ceiling or detected a cycle
    #[error("traversal aborted after {steps} steps")]
    Exhausted {
        /// Steps taken before aborting
        steps: usize,
    },

    /// Container type is not one of the recognized shapes
    #[error("unsupported container type `{type_name}`")]
    Unsupported {
        /// Type name that failed to match
        type_name: String,
    },

    /// Declared count exceeded the sanity ceiling; 0 is reported instead
    #[error("declared count {declared} exceeds sanity ceiling {ceiling}")]
    Degraded {
        /// Raw declared count
        declared: u64,
        /// Ceiling for this container kind
        ceiling: u64,
    },
}

/// Configuration parameters for inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Step ceiling for each bounded traversal
    pub max_steps: usize,

    /// Maximum elements listed as synthetic children
    pub display_limit: usize,

    /// Maximum bytes read for an owning string preview
    pub string_preview_limit: usize,

    /// Maximum bytes read for a string view preview
    pub view_preview_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            display_limit: 256,
            string_preview_limit: 1024,
            view_preview_limit: 256,
        }
    }
}

impl EngineConfig {
    /// Set traversal step ceiling (at least 1).
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Set number of elements listed as children (at least 1).
    pub fn with_display_limit(mut self, display_limit: usize) -> Self {
        self.display_limit = display_limit.max(1);
        self
    }

    /// Set owning string preview length (at least 1).
    pub fn with_string_preview_limit(mut self, limit: usize) -> Self {
        self.string_preview_limit = limit.max(1);
        self
    }

    /// Set string view preview length (at least 1).
    pub fn with_view_preview_limit(mut self, limit: usize) -> Self {
        self.view_preview_limit = limit.max(1);
        self
    }
}

/// Entry point tying an accessor to a shape registry
///
/// Coordinates `describe` (type name → layout → descriptor) and hands out
/// [`ContainerView`]s for the presentation layer.
#[derive(Debug)]
pub struct Inspector<'a, A: OpaqueAccessor> {
    accessor: &'a A,
    registry: ShapeRegistry,
    config: EngineConfig,
}

impl<'a, A: OpaqueAccessor> Inspector<'a, A> {
    /// Create inspector
    pub fn new(accessor: &'a A, registry: ShapeRegistry, config: EngineConfig) -> Self {
        Self {
            accessor,
            registry,
            config,
        }
    }

    /// Layout matching the value's type, or `Unsupported`
    pub fn kind_of(&self, value: &A::Handle) -> Result<ContainerKind, LensError> {
        let type_name = access::value_type_name(self.accessor, value);
        self.registry
            .resolve(&type_name)
            .ok_or(LensError::Unsupported { type_name })
    }

    /// Derive the descriptor of a container value
    pub fn describe(&self, value: &A::Handle) -> Result<ContainerDescriptor<A>, LensError> {
        let kind = self.kind_of(value)?;
        shape::describe(self.accessor, kind, value, &self.config)
    }

    /// Describe a value and wrap it in a view
    pub fn view(&self, value: &A::Handle) -> Result<ContainerView<'a, A>, LensError> {
        let descriptor = self.describe(value)?;
        Ok(ContainerView::new(
            self.accessor,
            value.clone(),
            descriptor,
            self.config.clone(),
        ))
    }

    /// Synthetic children of a container value
    pub fn children(&self, value: &A::Handle) -> Result<SyntheticChildren<'a, A>, LensError> {
        Ok(SyntheticChildren::new(self.view(value)?))
    }

    /// One-line summary for string-like containers and enum wrappers
    ///
    /// `None` when the type has no summary. Failures render as `"<error>"`.
    pub fn summary(&self, value: &A::Handle) -> Option<String> {
        let type_name = access::value_type_name(self.accessor, value);
        if self.registry.is_enum(&type_name) {
            return Some(view::enum_summary(self.accessor, value));
        }
        match self.registry.resolve(&type_name) {
            Some(kind) if kind.is_text() => Some(match self.view(value) {
                Ok(view) => view.summary(),
                Err(err) => {
                    tracing::warn!(%type_name, error = %err, "string summary unavailable");
                    view::ERROR_SUMMARY.to_string()
                }
            }),
            _ => None,
        }
    }

    /// Accessor in use
    pub fn accessor(&self) -> &'a A {
        self.accessor
    }

    /// Registry in use
    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
