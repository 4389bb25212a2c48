// Per-instance field state: raw input, provided keys and memoized values

use super::schema::FieldSchema;
use crate::coercion::{CoercerRegistry, CoercionError};
use crate::value::{FieldValue, Params};
use serde_json::{Map, Value as JsonValue};
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Field values of a single operation instance.
///
/// Every slot is resolved at most once; repeated reads return the cached
/// value. A field supplied as `null` resolves to `Some(FieldValue::Null)`
/// while a field never supplied and without default resolves to `None`.
#[derive(Debug)]
pub struct FieldStore {
    schema: Arc<FieldSchema>,
    coercers: Arc<CoercerRegistry>,
    raw_params: Map<String, JsonValue>,
    provided_keys: BTreeSet<String>,
    resolved: Vec<OnceCell<Option<FieldValue>>>,
    defaults: Vec<OnceCell<Option<FieldValue>>>,
}

impl FieldStore {
    /// Snapshot the caller's parameters
    pub fn setup(
        schema: Arc<FieldSchema>,
        coercers: Arc<CoercerRegistry>,
        raw_params: Map<String, JsonValue>,
    ) -> Self {
        let provided_keys = raw_params.keys().cloned().collect();
        let slots = schema.len();

        for key in raw_params.keys().filter(|k| !schema.contains(k)) {
            log::debug!("{} ignores undeclared parameter `{}`", schema.owner(), key);
        }

        Self {
            schema,
            coercers,
            raw_params,
            provided_keys,
            resolved: (0..slots).map(|_| OnceCell::new()).collect(),
            defaults: (0..slots).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Resolved value of a declared field, coercing or defaulting on first access
    pub fn get(&self, name: &str) -> Result<Option<&FieldValue>, CoercionError> {
        let (Some(index), Some(declaration)) = (self.schema.index_of(name), self.schema.get(name))
        else {
            return Ok(None);
        };

        if let Some(value) = self.resolved[index].get() {
            return Ok(value.as_ref());
        }

        let value = match self.raw_params.get(name) {
            Some(raw) => Some(self.coercers.coerce(name, &declaration.type_tag, raw)?),
            None => self.default_at(index, name).cloned(),
        };

        let _ = self.resolved[index].set(value);
        Ok(self.resolved[index].get().and_then(Option::as_ref))
    }

    fn default_at(&self, index: usize, name: &str) -> Option<&FieldValue> {
        self.defaults[index]
            .get_or_init(|| {
                self.schema
                    .get(name)
                    .and_then(|d| d.default.as_ref())
                    .map(|d| d.evaluate())
            })
            .as_ref()
    }

    /// True iff `name` was a key of the construction parameters, whatever its value
    pub fn field_provided(&self, name: &str) -> bool {
        self.provided_keys.contains(name)
    }

    pub fn provided_keys(&self) -> &BTreeSet<String> {
        &self.provided_keys
    }

    /// Raw input exactly as given
    pub fn raw(&self, name: &str) -> Option<&JsonValue> {
        self.raw_params.get(name)
    }

    /// Coerce every supplied field so bad input fails immediately
    pub fn resolve_provided(&self) -> Result<(), CoercionError> {
        for declaration in self.schema.iter() {
            if self.field_provided(&declaration.name) {
                self.get(&declaration.name)?;
            }
        }
        Ok(())
    }

    /// Coerced values of the declared fields that were supplied
    pub fn params_given(&self) -> Result<Params, CoercionError> {
        let mut params = Params::new();
        for declaration in self.schema.iter() {
            if self.field_provided(&declaration.name) {
                let value = self.get(&declaration.name)?.cloned().unwrap_or(FieldValue::Null);
                params.insert(declaration.name.clone(), value);
            }
        }
        Ok(params)
    }

    /// Every declared field, with defaults where not supplied
    pub fn params_with_defaults(&self) -> Result<Params, CoercionError> {
        let mut params = Params::new();
        for declaration in self.schema.iter() {
            let value = self.get(&declaration.name)?.cloned().unwrap_or(FieldValue::Null);
            params.insert(declaration.name.clone(), value);
        }
        Ok(params)
    }

    /// Defaults that would apply if nothing were supplied
    pub fn defaults_only(&self) -> Params {
        self.schema
            .iter()
            .enumerate()
            .filter(|(_, d)| d.has_default())
            .filter_map(|(index, d)| {
                self.default_at(index, &d.name)
                    .map(|value| (d.name.clone(), value.clone()))
            })
            .collect()
    }
}
