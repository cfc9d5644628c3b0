//! LLDB integration via PyO3.
//!
//! Build the `cdylib` with `--features python-bindings` and load it from LLDB:
//!
//! ```text
//! (lldb) command script import /path/to/synthlens.so
//! ```
//!
//! `__lldb_init_module` registers [`PySyntheticProvider`] and [`summary`] for
//! every type the default [`ShapeRegistry`] knows. The accessor talks to
//! `lldb.SBValue` / `lldb.SBType` objects through the Python API, so the same
//! engine that runs against memory images drives the debugger display.

use pyo3::{prelude::*, types::PyBytes, types::PyModule};

use crate::access::{AccessError, OpaqueAccessor};
use crate::provider::{ChildValue, SyntheticChildren, CONTENTS};
use crate::shape::{ContainerDescriptor, TypeMatcher};
use crate::view::{enum_summary, ContainerView, ERROR_SUMMARY};
use crate::{EngineConfig, Inspector, ShapeRegistry};

/// Python module name as seen by LLDB
const MODULE: &str = "synthlens";

/// `LLDB_INVALID_ADDRESS`
const INVALID_ADDRESS: u64 = u64::MAX;

/// Owned reference to an LLDB scripting object (`SBValue`, `SBType`, `SBTarget`)
#[derive(Debug)]
pub struct SbObject(Py<PyAny>);

impl Clone for SbObject {
    fn clone(&self) -> Self {
        Python::with_gil(|py| Self(self.0.clone_ref(py)))
    }
}

impl SbObject {
    fn bind<'py>(&self, py: Python<'py>) -> &Bound<'py, PyAny> {
        self.0.bind(py)
    }
}

fn host(err: PyErr) -> AccessError {
    AccessError::host(err.to_string())
}

fn is_valid(object: &Bound<'_, PyAny>) -> bool {
    object
        .call_method0("IsValid")
        .and_then(|valid| valid.extract::<bool>())
        .unwrap_or(false)
}

fn call_u64(object: &Bound<'_, PyAny>, method: &str) -> Option<u64> {
    object.call_method0(method).ok()?.extract().ok()
}

fn sb_type_name(value: &Bound<'_, PyAny>) -> String {
    value
        .call_method0("GetTypeName")
        .and_then(|name| name.extract())
        .unwrap_or_default()
}

/// [`OpaqueAccessor`] over the LLDB scripting API
#[derive(Debug, Clone)]
pub struct LldbAccessor {
    target: SbObject,
}

impl LldbAccessor {
    /// Accessor for the target `valobj` belongs to
    pub fn for_value(valobj: &Bound<'_, PyAny>) -> PyResult<Self> {
        let target = valobj.call_method0("GetTarget")?;
        Ok(Self {
            target: SbObject(target.unbind()),
        })
    }

    /// Address a value's content lives at: the pointee for pointers
    fn content_address(&self, value: &Bound<'_, PyAny>) -> Result<u64, AccessError> {
        let ty = value.call_method0("GetType").map_err(host)?;
        let is_pointer = ty
            .call_method0("IsPointerType")
            .and_then(|flag| flag.extract::<bool>())
            .map_err(host)?;
        if is_pointer {
            return match value.call_method1("GetValueAsUnsigned", (0u64,)) {
                Ok(address) => match address.extract::<u64>().map_err(host)? {
                    0 => Err(AccessError::BadPointer {
                        type_name: sb_type_name(value),
                    }),
                    address => Ok(address),
                },
                Err(err) => Err(host(err)),
            };
        }
        match call_u64(value, "GetLoadAddress") {
            Some(address) if address != INVALID_ADDRESS => Ok(address),
            _ => Err(AccessError::Unreadable {
                address: INVALID_ADDRESS,
                len: 0,
            }),
        }
    }
}

impl OpaqueAccessor for LldbAccessor {
    type Handle = SbObject;
    type Type = SbObject;
    type Identity = u64;

    fn field(&self, value: &SbObject, name: &str) -> Result<SbObject, AccessError> {
        Python::with_gil(|py| {
            let value = value.bind(py);
            let child = value
                .call_method1("GetChildMemberWithName", (name,))
                .map_err(host)?;
            if !is_valid(&child) {
                return Err(AccessError::MissingField {
                    field: name.to_string(),
                    type_name: sb_type_name(value),
                });
            }
            Ok(SbObject(child.unbind()))
        })
    }

    fn child_at_index(&self, value: &SbObject, index: usize) -> Result<SbObject, AccessError> {
        Python::with_gil(|py| {
            let value = value.bind(py);
            let child = value.call_method1("GetChildAtIndex", (index,)).map_err(host)?;
            if !is_valid(&child) {
                return Err(AccessError::MissingChild {
                    index,
                    type_name: sb_type_name(value),
                });
            }
            Ok(SbObject(child.unbind()))
        })
    }

    fn dereference(&self, pointer: &SbObject) -> Result<SbObject, AccessError> {
        Python::with_gil(|py| {
            let pointer = pointer.bind(py);
            // Null pointers fail here, before LLDB hands back an invalid value
            self.content_address(pointer)?;
            let target = pointer.call_method0("Dereference").map_err(host)?;
            if !is_valid(&target) {
                return Err(AccessError::BadPointer {
                    type_name: sb_type_name(pointer),
                });
            }
            Ok(SbObject(target.unbind()))
        })
    }

    fn child_at_offset(
        &self,
        base: &SbObject,
        index: usize,
        byte_offset: u64,
        element_type: &SbObject,
    ) -> Result<SbObject, AccessError> {
        Python::with_gil(|py| {
            let base = base.bind(py);
            let address = self.content_address(base)?;
            let child = base
                .call_method1(
                    "CreateChildAtOffset",
                    (format!("[{index}]"), byte_offset, element_type.bind(py)),
                )
                .map_err(host)?;
            if !is_valid(&child) {
                return Err(AccessError::Unreadable {
                    address: address.saturating_add(byte_offset),
                    len: self.byte_size(element_type),
                });
            }
            Ok(SbObject(child.unbind()))
        })
    }

    fn unsigned_value(&self, value: &SbObject, default: u64) -> u64 {
        Python::with_gil(|py| {
            value
                .bind(py)
                .call_method1("GetValueAsUnsigned", (default,))
                .and_then(|raw| raw.extract())
                .unwrap_or(default)
        })
    }

    fn identity(&self, value: &SbObject) -> Result<u64, AccessError> {
        Python::with_gil(|py| match call_u64(value.bind(py), "GetLoadAddress") {
            Some(address) if address != INVALID_ADDRESS => Ok(address),
            _ => Err(AccessError::Unreadable {
                address: INVALID_ADDRESS,
                len: 0,
            }),
        })
    }

    fn raw_bytes(&self, value: &SbObject, count: usize) -> Result<Vec<u8>, AccessError> {
        Python::with_gil(|py| {
            let value = value.bind(py);
            let address = self.content_address(value)?;
            if count == 0 {
                return Ok(Vec::new());
            }
            let unreadable = || AccessError::Unreadable {
                address,
                len: count as u64,
            };

            let lldb = py.import("lldb").map_err(host)?;
            let error = lldb.getattr("SBError").and_then(|ty| ty.call0()).map_err(host)?;
            let process = value.call_method0("GetProcess").map_err(host)?;
            let bytes = process
                .call_method1("ReadMemory", (address, count, &error))
                .map_err(host)?;
            let success = error
                .call_method0("Success")
                .and_then(|ok| ok.extract::<bool>())
                .unwrap_or(false);
            if !success {
                return Err(unreadable());
            }
            let bytes = bytes.downcast::<PyBytes>().map_err(|_| unreadable())?;
            Ok(bytes.as_bytes().to_vec())
        })
    }

    fn value_type(&self, value: &SbObject) -> SbObject {
        Python::with_gil(|py| {
            SbObject(
                value
                    .bind(py)
                    .call_method0("GetType")
                    .map(Bound::unbind)
                    .unwrap_or_else(|_| py.None()),
            )
        })
    }

    fn type_name(&self, ty: &SbObject) -> String {
        Python::with_gil(|py| {
            ty.bind(py)
                .call_method0("GetName")
                .and_then(|name| name.extract())
                .unwrap_or_default()
        })
    }

    fn byte_size(&self, ty: &SbObject) -> u64 {
        Python::with_gil(|py| call_u64(ty.bind(py), "GetByteSize").unwrap_or(0))
    }

    fn pointee_type(&self, ty: &SbObject) -> Option<SbObject> {
        Python::with_gil(|py| {
            let ty = ty.bind(py);
            let is_pointer: bool = ty.call_method0("IsPointerType").ok()?.extract().ok()?;
            if !is_pointer {
                return None;
            }
            let pointee = ty.call_method0("GetPointeeType").ok()?;
            is_valid(&pointee).then(|| SbObject(pointee.unbind()))
        })
    }

    fn template_argument(&self, ty: &SbObject, index: usize) -> Option<SbObject> {
        Python::with_gil(|py| {
            let argument = ty
                .bind(py)
                .call_method1("GetTemplateArgumentType", (index,))
                .ok()?;
            is_valid(&argument).then(|| SbObject(argument.unbind()))
        })
    }

    fn find_type(&self, name: &str) -> Option<SbObject> {
        Python::with_gil(|py| {
            let found = self
                .target
                .bind(py)
                .call_method1("FindFirstType", (name,))
                .ok()?;
            is_valid(&found).then(|| SbObject(found.unbind()))
        })
    }

    fn enum_members(&self, ty: &SbObject) -> Vec<(String, u64)> {
        Python::with_gil(|py| {
            let Ok(members) = ty.bind(py).call_method0("GetEnumMembers") else {
                return Vec::new();
            };
            let len = call_u64(&members, "GetSize").unwrap_or(0);
            (0..len)
                .filter_map(|index| {
                    let member = members
                        .call_method1("GetTypeEnumMemberAtIndex", (index,))
                        .ok()?;
                    let name: String = member.call_method0("GetName").ok()?.extract().ok()?;
                    Some((name, call_u64(&member, "GetValueAsUnsigned")?))
                })
                .collect()
        })
    }
}

/// What a provider derived in its last update pass
#[derive(Debug)]
enum ProviderState {
    Container(ContainerDescriptor<LldbAccessor>),
    Enum(String),
    Invalid,
}

/// Synthetic-children provider class registered with `type synthetic add`
#[pyclass(unsendable, name = "SyntheticProvider")]
#[derive(Debug)]
pub struct PySyntheticProvider {
    valobj: SbObject,
    accessor: LldbAccessor,
    registry: ShapeRegistry,
    config: EngineConfig,
    state: ProviderState,
}

impl PySyntheticProvider {
    fn derive(&self) -> ProviderState {
        let value = &self.valobj;
        let type_name = self.accessor.type_name(&self.accessor.value_type(value));
        if self.registry.is_enum(&type_name) {
            return ProviderState::Enum(enum_summary(&self.accessor, value));
        }
        let inspector = Inspector::new(&self.accessor, self.registry.clone(), self.config.clone());
        match inspector.describe(value) {
            Ok(descriptor) => ProviderState::Container(descriptor),
            Err(err) => {
                tracing::warn!(%type_name, error = %err, "container not describable");
                ProviderState::Invalid
            }
        }
    }

    /// Run `f` over a view built from the cached descriptor
    fn with_children<R>(
        &mut self,
        f: impl FnOnce(&mut SyntheticChildren<'_, LldbAccessor>) -> R,
    ) -> Option<R> {
        let state = std::mem::replace(&mut self.state, ProviderState::Invalid);
        let ProviderState::Container(descriptor) = state else {
            self.state = state;
            return None;
        };
        let view = ContainerView::new(
            &self.accessor,
            self.valobj.clone(),
            descriptor,
            self.config.clone(),
        );
        let mut children = SyntheticChildren::new(view);
        let result = f(&mut children);
        self.state = ProviderState::Container(children.into_view().into_descriptor());
        Some(result)
    }

    fn content_child<'py>(
        &self,
        py: Python<'py>,
        name: &str,
        bytes: &[u8],
    ) -> PyResult<Bound<'py, PyAny>> {
        let lldb = py.import("lldb")?;
        let target = self.accessor.target.bind(py);
        let error = lldb.getattr("SBError")?.call0()?;
        let data = lldb.getattr("SBData")?.call0()?;
        data.call_method1(
            "SetData",
            (
                &error,
                PyBytes::new(py, bytes),
                target.call_method0("GetByteOrder")?,
                target.call_method0("GetAddressByteSize")?,
            ),
        )?;
        let char_type = target.call_method1("GetBasicType", (lldb.getattr("eBasicTypeChar")?,))?;
        let array_type = char_type.call_method1("GetArrayType", (bytes.len(),))?;
        self.valobj
            .bind(py)
            .call_method1("CreateValueFromData", (name, data, array_type))
    }
}

#[pymethods]
impl PySyntheticProvider {
    #[new]
    #[pyo3(signature = (valobj, _internal_dict = None))]
    /// Create the provider for one value.
    pub fn new(valobj: Bound<'_, PyAny>, _internal_dict: Option<Bound<'_, PyAny>>) -> PyResult<Self> {
        let accessor = LldbAccessor::for_value(&valobj)?;
        let mut provider = Self {
            valobj: SbObject(valobj.unbind()),
            accessor,
            registry: ShapeRegistry::with_defaults(),
            config: EngineConfig::default(),
            state: ProviderState::Invalid,
        };
        provider.state = provider.derive();
        Ok(provider)
    }

    /// Re-derive the layout; returning `False` lets LLDB keep asking for children.
    pub fn update(&mut self) -> bool {
        self.state = self.derive();
        false
    }

    /// Always `True`; containers show their header even when empty.
    pub fn has_children(&self) -> bool {
        true
    }

    /// Number of synthetic children.
    pub fn num_children(&mut self) -> usize {
        match self.state {
            ProviderState::Enum(_) => 1,
            ProviderState::Invalid => 0,
            ProviderState::Container(_) => self
                .with_children(|children| children.num_children())
                .unwrap_or(0),
        }
    }

    /// Position of a named child, `-1` when unknown.
    pub fn get_child_index(&self, name: &str) -> i64 {
        let ProviderState::Container(descriptor) = &self.state else {
            return if name == "Value" { 0 } else { -1 };
        };
        let offset = usize::from(descriptor.is_text());
        if name == CONTENTS && descriptor.is_text() {
            return 0;
        }
        if let Some(position) = descriptor.header.iter().position(|field| field.name == name) {
            return (offset + position) as i64;
        }
        name.strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|index| index.parse::<usize>().ok())
            .map_or(-1, |index| (descriptor.header.len() + index) as i64)
    }

    /// Synthetic child at `index`, `None` when unavailable.
    pub fn get_child_at_index(&mut self, py: Python<'_>, index: usize) -> PyResult<Option<PyObject>> {
        if let ProviderState::Enum(text) = &self.state {
            let child = self.valobj.bind(py).call_method1(
                "CreateValueFromExpression",
                ("Value", format!("\"{text}\"")),
            )?;
            return Ok(Some(child.unbind()));
        }

        let Some(Some(child)) = self.with_children(|children| children.child_at_index(index)) else {
            return Ok(None);
        };
        let object = match child.value {
            ChildValue::Content(bytes) => self.content_child(py, &child.name, &bytes)?,
            ChildValue::Value(handle) if child.name.starts_with('[') => {
                // Tree nodes and offset children keep their own names; show the index
                let handle = handle.bind(py);
                self.valobj.bind(py).call_method1(
                    "CreateValueFromAddress",
                    (
                        child.name.as_str(),
                        handle.call_method0("GetLoadAddress")?,
                        handle.call_method0("GetType")?,
                    ),
                )?
            }
            ChildValue::Value(handle) => handle.bind(py).clone(),
        };
        Ok(Some(object.unbind()))
    }
}

/// Summary function registered with `type summary add`.
#[pyfunction]
#[pyo3(signature = (valobj, _internal_dict = None))]
pub fn summary(valobj: Bound<'_, PyAny>, _internal_dict: Option<Bound<'_, PyAny>>) -> String {
    let Ok(accessor) = LldbAccessor::for_value(&valobj) else {
        return ERROR_SUMMARY.to_string();
    };
    let inspector = Inspector::new(&accessor, ShapeRegistry::with_defaults(), EngineConfig::default());
    inspector
        .summary(&SbObject(valobj.unbind()))
        .unwrap_or_else(|| ERROR_SUMMARY.to_string())
}

fn type_argument(matcher: &TypeMatcher) -> String {
    match matcher {
        TypeMatcher::Exact(name) => format!("\"{name}\""),
        TypeMatcher::Prefix(prefix) => {
            let escaped: String = prefix
                .chars()
                .flat_map(|c| {
                    let special = "\\^$.|?*+()[]{}".contains(c);
                    special.then_some('\\').into_iter().chain(std::iter::once(c))
                })
                .collect();
            format!("-x \"^{escaped}\"")
        }
    }
}

/// LLDB commands binding the registry's types to this module
pub fn registration_commands(registry: &ShapeRegistry) -> Vec<String> {
    let mut commands = Vec::new();
    for rule in registry.list() {
        let ty = type_argument(&rule.matcher);
        commands.push(format!(
            "type synthetic add {ty} --python-class {MODULE}.SyntheticProvider"
        ));
        if rule.kind.is_text() {
            commands.push(format!("type summary add {ty} --python-function {MODULE}.summary"));
        }
    }
    for matcher in registry.enums() {
        let ty = type_argument(matcher);
        commands.push(format!(
            "type synthetic add {ty} --python-class {MODULE}.SyntheticProvider"
        ));
        commands.push(format!("type summary add {ty} --python-function {MODULE}.summary"));
    }
    commands
}

/// Entry point LLDB calls on `command script import`.
#[pyfunction(name = "__lldb_init_module")]
#[pyo3(signature = (debugger, _internal_dict = None))]
pub fn lldb_init_module(
    debugger: Bound<'_, PyAny>,
    _internal_dict: Option<Bound<'_, PyAny>>,
) -> PyResult<()> {
    for command in registration_commands(&ShapeRegistry::with_defaults()) {
        tracing::debug!(%command, "registering formatter");
        debugger.call_method1("HandleCommand", (command,))?;
    }
    Ok(())
}

/// Create Python module.
#[pymodule]
pub fn synthlens(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySyntheticProvider>()?;
    m.add_function(wrap_pyfunction!(summary, m)?)?;
    m.add_function(wrap_pyfunction!(lldb_init_module, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_commands_cover_defaults() {
        let commands = registration_commands(&ShapeRegistry::with_defaults());
        assert!(commands.contains(&format!(
            "type synthetic add -x \"^ezDynamicArray<\" --python-class {MODULE}.SyntheticProvider"
        )));
        assert!(commands.contains(&format!(
            "type summary add \"ezStringView\" --python-function {MODULE}.summary"
        )));
        assert!(commands
            .iter()
            .any(|command| command.contains("ezEnum<") && command.contains("summary")));
    }

    #[test]
    fn test_prefix_patterns_are_escaped() {
        assert_eq!(
            type_argument(&TypeMatcher::Prefix("a.b(".into())),
            "-x \"^a\\.b\\(\""
        );
    }
}
