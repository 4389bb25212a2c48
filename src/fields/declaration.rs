// Field declarations and default specifications

use crate::coercion::TypeTag;
use crate::value::FieldValue;
use std::fmt;
use std::sync::Arc;

/// Zero-argument producer for lazily computed defaults
pub type DefaultProducer = Arc<dyn Fn() -> FieldValue + Send + Sync>;

/// Default specification of a field
#[derive(Clone)]
pub enum DefaultValue {
    /// Built once at declaration time and shared by every instance
    Static(FieldValue),
    /// Evaluated at most once per instance, on first access
    Lazy(DefaultProducer),
}

impl DefaultValue {
    pub fn evaluate(&self) -> FieldValue {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Lazy(producer) => producer(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, DefaultValue::Lazy(_))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Options accepted when declaring a field
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub default: Option<DefaultValue>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self { default: None }
    }

    /// Static default
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Lazy default, evaluated per instance
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Lazy(Arc::new(producer)));
        self
    }
}

/// One declared field
#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub name: String,
    pub type_tag: TypeTag,
    pub default: Option<DefaultValue>,
    /// Name of the class that declared (or last re-declared) the field
    pub declared_in: String,
}

impl FieldDeclaration {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}
