//! Synthetic-children protocol
//!
//! Debuggers display a container as a flat list of named children. This module
//! adapts a [`ContainerView`] to that protocol:
//! - text containers: `contents` (byte preview) followed by their header fields
//! - everything else: header fields, then up to `display_limit` elements `[i]`
//!
//! A child that cannot be produced is `None`; the listing itself never fails.

use crate::access::OpaqueAccessor;
use crate::index::element_name;
use crate::shape::ContainerKind;
use crate::view::ContainerView;
use crate::LensError;

/// Name of the content child of text containers
pub const CONTENTS: &str = "contents";

/// Payload of a synthetic child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildValue<H> {
    /// Value in the inspected process
    Value(H),

    /// Raw bytes read for display
    Content(Vec<u8>),
}

/// Named synthetic child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child<H> {
    /// Display name (`[3]`, `m_uiCount`, `contents`)
    pub name: String,

    /// Payload
    pub value: ChildValue<H>,
}

/// Synthetic-children provider over one container
#[derive(Debug)]
pub struct SyntheticChildren<'a, A: OpaqueAccessor> {
    view: ContainerView<'a, A>,
}

impl<'a, A: OpaqueAccessor> SyntheticChildren<'a, A> {
    /// Create provider for a view
    pub fn new(view: ContainerView<'a, A>) -> Self {
        Self { view }
    }

    /// Re-derive everything from the current value
    pub fn update(&mut self) -> Result<(), LensError> {
        self.view.update()
    }

    fn header_len(&self) -> usize {
        self.view.descriptor().header.len()
    }

    fn is_text(&self) -> bool {
        self.view.descriptor().is_text()
    }

    /// Number of children
    pub fn num_children(&self) -> usize {
        if self.is_text() {
            return 1 + self.header_len();
        }
        let shown = self.view.count().min(self.view.config().display_limit);
        self.header_len() + shown
    }

    /// Child at `index`, `None` when out of range or unavailable
    pub fn child_at_index(&mut self, index: usize) -> Option<Child<A::Handle>> {
        if index >= self.num_children() {
            return None;
        }

        if self.is_text() {
            if index == 0 {
                // An empty view has no content child at all
                if self.view.descriptor().kind == ContainerKind::StringView
                    && self.view.count() == 0
                {
                    return None;
                }
                let bytes = self.view.content()?;
                return Some(Child {
                    name: CONTENTS.to_string(),
                    value: ChildValue::Content(bytes),
                });
            }
            return self.header_child(index - 1);
        }

        let header_len = self.header_len();
        if index < header_len {
            return self.header_child(index);
        }
        let element = index - header_len;
        self.view.element_at(element).into_option().map(|handle| Child {
            name: element_name(element),
            value: ChildValue::Value(handle),
        })
    }

    fn header_child(&self, index: usize) -> Option<Child<A::Handle>> {
        let field = self.view.descriptor().header.get(index)?;
        Some(Child {
            name: field.name.clone(),
            value: ChildValue::Value(field.value.clone()),
        })
    }

    /// All children in display order, skipping unavailable ones
    pub fn children(&mut self) -> Vec<Child<A::Handle>> {
        (0..self.num_children())
            .filter_map(|index| self.child_at_index(index))
            .collect()
    }

    /// Underlying view
    pub fn view(&self) -> &ContainerView<'a, A> {
        &self.view
    }

    /// Underlying view, mutably
    pub fn view_mut(&mut self) -> &mut ContainerView<'a, A> {
        &mut self.view
    }

    /// Unwrap the view
    pub fn into_view(self) -> ContainerView<'a, A> {
        self.view
    }
}
