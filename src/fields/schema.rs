// Per-class field registry with inheritance

use super::declaration::{DefaultValue, FieldDeclaration, FieldOptions};
use crate::coercion::{CoercerRegistry, TypeTag};
use crate::error::DeclarationError;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Field entry as it appears in an operation configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub type_tag: TypeTag,

    /// Static default, coerced through the field's type when loaded
    #[serde(default)]
    pub default: Option<JsonValue>,
}

/// Ordered mapping of field name to declaration, owned by one class
#[derive(Debug, Clone)]
pub struct FieldSchema {
    owner: String,
    declarations: Vec<FieldDeclaration>,
}

impl FieldSchema {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            declarations: Vec::new(),
        }
    }

    /// Start a subclass registry layered over a snapshot of `parent`
    pub fn inherit(owner: impl Into<String>, parent: &FieldSchema) -> Self {
        Self {
            owner: owner.into(),
            declarations: parent.declarations.clone(),
        }
    }

    /// Load declarations from configuration entries
    pub fn from_config(
        owner: impl Into<String>,
        fields: &[FieldConfig],
        coercers: &CoercerRegistry,
    ) -> Result<Self, DeclarationError> {
        let mut schema = Self::new(owner);

        for field in fields {
            let mut options = FieldOptions::new();
            if let Some(raw) = &field.default {
                options.default = Some(DefaultValue::Static(FieldValue::from_json(raw)));
            }
            schema.declare(coercers, &field.name, field.type_tag.clone(), options)?;
        }

        Ok(schema)
    }

    /// Declare a field. Re-declaring an inherited name replaces it in place.
    ///
    /// Static defaults are coerced through the field's type here, so every
    /// instance sees a value of the declared type. Lazy defaults are taken
    /// as produced.
    pub fn declare(
        &mut self,
        coercers: &CoercerRegistry,
        name: impl Into<String>,
        type_tag: impl Into<TypeTag>,
        options: FieldOptions,
    ) -> Result<(), DeclarationError> {
        let name = name.into();
        let type_tag = type_tag.into();

        if !coercers.is_registered(&type_tag) {
            return Err(self.unknown_type(&name, &type_tag));
        }

        let default = match options.default {
            Some(DefaultValue::Static(value)) => Some(DefaultValue::Static(
                Self::coerce_default(coercers, &name, &type_tag, &value)?,
            )),
            other => other,
        };

        let declaration = FieldDeclaration {
            name,
            type_tag,
            default,
            declared_in: self.owner.clone(),
        };

        log::debug!(
            "{} declares field `{}` as {}",
            self.owner,
            declaration.name,
            declaration.type_tag
        );

        match self.index_of(&declaration.name) {
            Some(index) => self.declarations[index] = declaration,
            None => self.declarations.push(declaration),
        }

        Ok(())
    }

    fn coerce_default(
        coercers: &CoercerRegistry,
        field: &str,
        type_tag: &TypeTag,
        value: &FieldValue,
    ) -> Result<FieldValue, DeclarationError> {
        let invalid = |reason: String| DeclarationError::InvalidDefault {
            field: field.to_string(),
            reason,
        };
        let raw = serde_json::to_value(value).map_err(|e| invalid(e.to_string()))?;
        coercers
            .coerce(field, type_tag, &raw)
            .map_err(|e| invalid(e.reason))
    }

    fn unknown_type(&self, field: &str, type_tag: &TypeTag) -> DeclarationError {
        DeclarationError::UnknownType {
            owner: self.owner.clone(),
            field: field.to_string(),
            type_tag: type_tag.clone(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn get(&self, name: &str) -> Option<&FieldDeclaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.declarations.iter().position(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDeclaration> {
        self.declarations.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.declarations.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
