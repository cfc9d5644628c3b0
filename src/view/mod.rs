//! Uniform container façade
//!
//! [`ContainerView`] is what the presentation layer talks to. It exposes the
//! same `count` / `element_at` pair for every shape and folds every failure
//! kind into [`Slot::Unavailable`] (or a count of 0, or a placeholder summary).
//! The `try_*` variants keep the error for diagnostics.

mod summary;

pub use summary::{enum_summary, render_text, EMPTY_SUMMARY, ERROR_SUMMARY};

use crate::access::OpaqueAccessor;
use crate::budget::TraversalStats;
use crate::shape::{self, ContainerDescriptor, Indexer, Shape};
use crate::{EngineConfig, LensError};

/// Result of an element request as seen by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<H> {
    /// Materialized element
    Element(H),

    /// Element could not be produced
    Unavailable,
}

impl<H> Slot<H> {
    /// Convert into an `Option`
    pub fn into_option(self) -> Option<H> {
        match self {
            Slot::Element(handle) => Some(handle),
            Slot::Unavailable => None,
        }
    }

    /// Whether an element was produced
    pub fn is_available(&self) -> bool {
        matches!(self, Slot::Element(_))
    }
}

impl<H> From<Result<H, LensError>> for Slot<H> {
    fn from(result: Result<H, LensError>) -> Self {
        match result {
            Ok(handle) => Slot::Element(handle),
            Err(_) => Slot::Unavailable,
        }
    }
}

/// Fingerprint of a container's own header bytes
type Fingerprint = blake3::Hash;

/// One inspection session over one container value
#[derive(Debug)]
pub struct ContainerView<'a, A: OpaqueAccessor> {
    accessor: &'a A,
    value: A::Handle,
    descriptor: ContainerDescriptor<A>,
    config: EngineConfig,
    fingerprint: Option<Fingerprint>,
}

impl<'a, A: OpaqueAccessor> ContainerView<'a, A> {
    /// Wrap an already derived descriptor
    pub fn new(
        accessor: &'a A,
        value: A::Handle,
        descriptor: ContainerDescriptor<A>,
        config: EngineConfig,
    ) -> Self {
        let fingerprint = fingerprint(accessor, &value);
        Self {
            accessor,
            value,
            descriptor,
            config,
            fingerprint,
        }
    }

    /// Element count; 0 when degraded or unreadable
    pub fn count(&self) -> usize {
        self.try_count().unwrap_or_else(|err| {
            tracing::debug!(type_name = %self.descriptor.type_name, error = %err, "count unavailable");
            0
        })
    }

    /// Element count, keeping the failure reason
    pub fn try_count(&self) -> Result<usize, LensError> {
        self.descriptor.indexer.count(self.accessor)
    }

    /// Element `index`, or `Unavailable`
    pub fn element_at(&mut self, index: usize) -> Slot<A::Handle> {
        let result = self.try_element_at(index);
        if let Err(err) = &result {
            tracing::debug!(index, error = %err, "element unavailable");
        }
        result.into()
    }

    /// Element `index`, keeping the failure reason
    pub fn try_element_at(&mut self, index: usize) -> Result<A::Handle, LensError> {
        self.descriptor.indexer.element_at(self.accessor, index)
    }

    /// Raw byte preview of a string-like container
    ///
    /// `None` for non-text containers and when the content is unreadable.
    pub fn content(&self) -> Option<Vec<u8>> {
        match self.try_content() {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::debug!(error = %err, "content unavailable");
                None
            }
        }
    }

    /// Raw byte preview, keeping the failure reason
    pub fn try_content(&self) -> Result<Vec<u8>, LensError> {
        let Some(text) = &self.descriptor.text else {
            return Err(LensError::Unsupported {
                type_name: self.descriptor.type_name.clone(),
            });
        };
        self.descriptor
            .indexer
            .content(self.accessor, text.preview_limit)
    }

    /// Declared character count of a string (differs from the byte count for
    /// multi-byte text)
    pub fn character_count(&self) -> Option<u64> {
        let field = self.descriptor.text.as_ref()?.character_count.as_ref()?;
        Some(self.accessor.unsigned_value(field, 0))
    }

    /// Quoted preview, `"<empty>"` or `"<error>"`
    pub fn summary(&self) -> String {
        if !self.descriptor.is_text() {
            return ERROR_SUMMARY.to_string();
        }
        render_text(self.count(), self.try_content())
    }

    /// Drop cached traversal state
    pub fn invalidate(&mut self) {
        self.descriptor.indexer.invalidate();
    }

    /// Re-derive the descriptor from the current value (update pass)
    pub fn update(&mut self) -> Result<(), LensError> {
        self.descriptor = shape::describe(
            self.accessor,
            self.descriptor.kind,
            &self.value,
            &self.config,
        )?;
        self.fingerprint = fingerprint(self.accessor, &self.value);
        Ok(())
    }

    /// Re-derive the descriptor only if the container's header bytes changed
    ///
    /// Returns whether an update happened. Changes confined to element storage
    /// or tree nodes are not detected; call [`ContainerView::update`] for those.
    pub fn refresh(&mut self) -> Result<bool, LensError> {
        let current = fingerprint(self.accessor, &self.value);
        if current.is_some() && current == self.fingerprint {
            return Ok(false);
        }
        tracing::debug!(type_name = %self.descriptor.type_name, "container header changed");
        self.update()?;
        Ok(true)
    }

    /// Traversal counters (trees only; zero otherwise)
    pub fn stats(&self) -> TraversalStats {
        match &self.descriptor.indexer {
            Indexer::OrderedTree(cursor) => cursor.stats(),
            _ => TraversalStats::default(),
        }
    }

    /// Storage shape
    pub fn shape(&self) -> Shape {
        self.descriptor.shape()
    }

    /// Cached descriptor
    pub fn descriptor(&self) -> &ContainerDescriptor<A> {
        &self.descriptor
    }

    /// Unwrap the descriptor, keeping its traversal cache for a later view
    pub fn into_descriptor(self) -> ContainerDescriptor<A> {
        self.descriptor
    }

    /// Inspected value
    pub fn value(&self) -> &A::Handle {
        &self.value
    }

    /// Accessor in use
    pub fn accessor(&self) -> &'a A {
        self.accessor
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn fingerprint<A: OpaqueAccessor>(accessor: &A, value: &A::Handle) -> Option<Fingerprint> {
    let size = accessor.byte_size(&accessor.value_type(value));
    let bytes = accessor.raw_bytes(value, usize::try_from(size).ok()?).ok()?;
    Some(blake3::hash(&bytes))
}
