use super::ContainerKind;

/// Type-name pattern of a shape rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    /// Whole name must match
    Exact(String),

    /// Name must start with the pattern (template instantiations)
    Prefix(String),
}

impl TypeMatcher {
    /// Match a full type name
    pub fn matches(&self, type_name: &str) -> bool {
        let type_name = type_name.trim_start_matches("const ").trim();
        match self {
            TypeMatcher::Exact(name) => type_name == name,
            TypeMatcher::Prefix(prefix) => type_name.starts_with(prefix.as_str()),
        }
    }
}

/// One registered rule
#[derive(Debug, Clone)]
pub struct ShapeRule {
    /// Type-name pattern
    pub matcher: TypeMatcher,

    /// Layout used for matching types
    pub kind: ContainerKind,
}

/// Ordered table mapping type names to container layouts
///
/// The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    rules: Vec<ShapeRule>,
    enums: Vec<TypeMatcher>,
}

impl ShapeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Registry knowing the engine's own container and enum wrapper types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(TypeMatcher::Prefix("ezDynamicArray<".into()), ContainerKind::DynamicArray)
            .register(TypeMatcher::Prefix("ezHybridArray<".into()), ContainerKind::HybridArray)
            .register(TypeMatcher::Prefix("ezHybridString<".into()), ContainerKind::HybridString)
            .register(TypeMatcher::Exact("ezStringBuilder".into()), ContainerKind::HybridString)
            .register(TypeMatcher::Exact("ezStringView".into()), ContainerKind::StringView)
            .register(TypeMatcher::Prefix("ezArrayPtr<".into()), ContainerKind::ArrayPointer)
            .register(TypeMatcher::Exact("ezByteArrayPtr".into()), ContainerKind::ArrayPointer)
            .register(TypeMatcher::Exact("ezConstByteArrayPtr".into()), ContainerKind::ArrayPointer)
            .register(TypeMatcher::Prefix("ezMap<".into()), ContainerKind::OrderedTree)
            .register(TypeMatcher::Prefix("ezSet<".into()), ContainerKind::OrderedTree);
        registry.register_enum(TypeMatcher::Prefix("ezEnum<".into()));
        registry
    }

    /// Append a rule.
    pub fn register(&mut self, matcher: TypeMatcher, kind: ContainerKind) -> &mut Self {
        self.rules.push(ShapeRule { matcher, kind });
        self
    }

    /// Append an enum wrapper pattern.
    pub fn register_enum(&mut self, matcher: TypeMatcher) -> &mut Self {
        self.enums.push(matcher);
        self
    }

    /// Layout for a type name, if any rule matches.
    pub fn resolve(&self, type_name: &str) -> Option<ContainerKind> {
        let kind = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(type_name))
            .map(|rule| rule.kind);
        tracing::trace!(type_name, ?kind, "resolved container kind");
        kind
    }

    /// Whether a type name is an enum wrapper.
    pub fn is_enum(&self, type_name: &str) -> bool {
        self.enums.iter().any(|matcher| matcher.matches(type_name))
    }

    /// All rules in match order.
    pub fn list(&self) -> &[ShapeRule] {
        &self.rules
    }

    /// Enum wrapper patterns.
    pub fn enums(&self) -> &[TypeMatcher] {
        &self.enums
    }
}
