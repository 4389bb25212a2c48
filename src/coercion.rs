// Type coercion - maps type tags to coercion functions

use crate::value::FieldValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Identifies a coercer, e.g. `string`, `integer`, `date`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Raised the first time a supplied field value cannot be converted
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Error for field `{field}`: {reason}")]
pub struct CoercionError {
    pub field: String,
    pub type_tag: TypeTag,
    /// The offending input, rendered as JSON
    pub value: String,
    pub reason: String,
}

/// A coercion function. The error string is the human-readable reason.
pub type CoerceFn = Arc<dyn Fn(&JsonValue) -> Result<FieldValue, String> + Send + Sync>;

/// Registry of coercers keyed by type tag
#[derive(Clone)]
pub struct CoercerRegistry {
    coercers: HashMap<TypeTag, CoerceFn>,
}

impl CoercerRegistry {
    /// An empty registry with no known tags
    pub fn empty() -> Self {
        Self {
            coercers: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in coercers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("string", coerce_string);
        registry.register("integer", coerce_integer);
        registry.register("number", coerce_number);
        registry.register("boolean", coerce_boolean);
        registry.register("date", coerce_date);
        registry.register("time", coerce_time);
        registry.register("iso_date", |raw| {
            Ok(match coerce_date(raw)? {
                FieldValue::Date(d) => FieldValue::String(d.format("%Y-%m-%d").to_string()),
                other => other,
            })
        });
        registry.register("iso_time", |raw| {
            Ok(match coerce_time(raw)? {
                FieldValue::Time(t) => {
                    FieldValue::String(t.to_rfc3339_opts(SecondsFormat::Secs, true))
                }
                other => other,
            })
        });
        registry.register("array", coerce_array);
        registry.register("object", coerce_object);
        registry
    }

    /// Register or replace the coercer for a tag
    pub fn register<F>(&mut self, tag: impl Into<TypeTag>, coercer: F)
    where
        F: Fn(&JsonValue) -> Result<FieldValue, String> + Send + Sync + 'static,
    {
        self.coercers.insert(tag.into(), Arc::new(coercer));
    }

    pub fn is_registered(&self, tag: &TypeTag) -> bool {
        self.coercers.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&TypeTag> {
        let mut tags: Vec<_> = self.coercers.keys().collect();
        tags.sort();
        tags
    }

    /// Coerce `raw` for `field` using the coercer registered for `tag`.
    /// JSON `null` passes through as `FieldValue::Null` for every tag.
    pub fn coerce(
        &self,
        field: &str,
        tag: &TypeTag,
        raw: &JsonValue,
    ) -> Result<FieldValue, CoercionError> {
        let failure = |reason: String| CoercionError {
            field: field.to_string(),
            type_tag: tag.clone(),
            value: raw.to_string(),
            reason,
        };

        let coercer = self
            .coercers
            .get(tag)
            .ok_or_else(|| failure(format!("unknown type `{}`", tag)))?;

        if raw.is_null() {
            return Ok(FieldValue::Null);
        }

        coercer(raw).map_err(|reason| {
            log::debug!("coercion of field `{}` as {} failed: {}", field, tag, reason);
            failure(reason)
        })
    }
}

impl Default for CoercerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CoercerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoercerRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn coerce_string(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::String(s) => Ok(FieldValue::String(s.clone())),
        JsonValue::Number(n) => Ok(FieldValue::String(n.to_string())),
        JsonValue::Bool(b) => Ok(FieldValue::String(b.to_string())),
        _ => Err("invalid string".to_string()),
    }
}

fn coerce_integer(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(FieldValue::Integer(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(FieldValue::Integer(f as i64))
                }
                _ => Err("invalid integer".to_string()),
            }
        }
        JsonValue::String(s) if blank(s) => Ok(FieldValue::Null),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| "invalid integer".to_string()),
        _ => Err("invalid integer".to_string()),
    }
}

fn coerce_number(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::Number(n) => n
            .as_f64()
            .map(FieldValue::Number)
            .ok_or_else(|| "invalid number".to_string()),
        JsonValue::String(s) if blank(s) => Ok(FieldValue::Null),
        JsonValue::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(FieldValue::Number(f)),
            _ => Err("invalid number".to_string()),
        },
        _ => Err("invalid number".to_string()),
    }
}

fn coerce_boolean(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::Bool(b) => Ok(FieldValue::Boolean(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(1) => Ok(FieldValue::Boolean(true)),
            Some(0) => Ok(FieldValue::Boolean(false)),
            _ => Err("invalid boolean".to_string()),
        },
        JsonValue::String(s) if blank(s) => Ok(FieldValue::Null),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "on" => Ok(FieldValue::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" | "off" => Ok(FieldValue::Boolean(false)),
            _ => Err("invalid boolean".to_string()),
        },
        _ => Err("invalid boolean".to_string()),
    }
}

fn coerce_date(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::String(s) if blank(s) => Ok(FieldValue::Null),
        JsonValue::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| DateTime::parse_from_rfc3339(s).map(|t| t.date_naive()))
                .map(FieldValue::Date)
                .map_err(|_| "invalid date".to_string())
        }
        _ => Err("invalid date".to_string()),
    }
}

fn coerce_time(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(FieldValue::Time)
            .ok_or_else(|| "invalid time".to_string()),
        JsonValue::String(s) if blank(s) => Ok(FieldValue::Null),
        JsonValue::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc())
                })
                .map(FieldValue::Time)
                .map_err(|_| "invalid time".to_string())
        }
        _ => Err("invalid time".to_string()),
    }
}

fn coerce_array(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::Array(_) => Ok(FieldValue::from_json(raw)),
        scalar => Ok(FieldValue::Array(vec![FieldValue::from_json(scalar)])),
    }
}

fn coerce_object(raw: &JsonValue) -> Result<FieldValue, String> {
    match raw {
        JsonValue::Object(_) => Ok(FieldValue::from_json(raw)),
        _ => Err("invalid object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coerce(tag: &str, raw: JsonValue) -> Result<FieldValue, CoercionError> {
        CoercerRegistry::new().coerce("field", &TypeTag::new(tag), &raw)
    }

    #[test]
    fn test_builtin_tags_registered() {
        let registry = CoercerRegistry::new();
        for tag in ["string", "integer", "number", "boolean", "date", "time", "array", "object"] {
            assert!(registry.is_registered(&TypeTag::new(tag)), "missing {}", tag);
        }
        assert!(!CoercerRegistry::empty().is_registered(&TypeTag::new("string")));
    }

    #[test]
    fn test_null_passes_through_every_tag() {
        for tag in ["string", "integer", "date", "object"] {
            assert_eq!(coerce(tag, JsonValue::Null).unwrap(), FieldValue::Null);
        }
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(coerce("integer", json!(3)).unwrap(), FieldValue::Integer(3));
        assert_eq!(coerce("integer", json!(" 42 ")).unwrap(), FieldValue::Integer(42));
        assert_eq!(coerce("integer", json!(4.0)).unwrap(), FieldValue::Integer(4));
        assert_eq!(coerce("integer", json!("")).unwrap(), FieldValue::Null);
        assert!(coerce("integer", json!("abc")).is_err());
        assert!(coerce("integer", json!(1.5)).is_err());
        assert!(coerce("integer", json!(true)).is_err());
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(coerce("string", json!("abc")).unwrap(), FieldValue::from("abc"));
        assert_eq!(coerce("string", json!(12)).unwrap(), FieldValue::from("12"));
        assert!(coerce("string", json!([1])).is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(coerce("boolean", json!("Yes")).unwrap(), FieldValue::Boolean(true));
        assert_eq!(coerce("boolean", json!("off")).unwrap(), FieldValue::Boolean(false));
        assert_eq!(coerce("boolean", json!(0)).unwrap(), FieldValue::Boolean(false));
        assert!(coerce("boolean", json!("maybe")).is_err());
    }

    #[test]
    fn test_date_rejects_month_13() {
        let err = coerce("date", json!("2015-13-01")).unwrap_err();
        assert_eq!(err.field, "field");
        assert_eq!(err.value, "\"2015-13-01\"");
        assert_eq!(err.to_string(), "Error for field `field`: invalid date");

        assert_eq!(
            coerce("date", json!("2015-12-01")).unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2015, 12, 1).unwrap())
        );
        assert_eq!(
            coerce("date", json!("2015-12-01T10:00:00Z")).unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2015, 12, 1).unwrap())
        );
    }

    #[test]
    fn test_time_and_iso_variants() {
        let t = coerce("time", json!("2020-02-03 04:05:06")).unwrap();
        assert_eq!(
            t.as_time().unwrap().to_rfc3339_opts(SecondsFormat::Secs, true),
            "2020-02-03T04:05:06Z"
        );
        assert_eq!(
            coerce("iso_time", json!(0)).unwrap(),
            FieldValue::from("1970-01-01T00:00:00Z")
        );
        assert_eq!(
            coerce("iso_date", json!("2020-02-03T23:00:00+00:00")).unwrap(),
            FieldValue::from("2020-02-03")
        );
    }

    #[test]
    fn test_array_wraps_scalars_and_object_rejects_them() {
        assert_eq!(
            coerce("array", json!("a")).unwrap(),
            FieldValue::Array(vec![FieldValue::from("a")])
        );
        assert!(coerce("object", json!("a")).is_err());
    }

    #[test]
    fn test_custom_coercer() {
        let mut registry = CoercerRegistry::empty();
        registry.register("upcase", |raw| {
            raw.as_str()
                .map(|s| FieldValue::String(s.to_uppercase()))
                .ok_or_else(|| "expected text".to_string())
        });
        let tag = TypeTag::new("upcase");
        assert_eq!(
            registry.coerce("name", &tag, &json!("abc")).unwrap(),
            FieldValue::from("ABC")
        );
        let err = registry.coerce("name", &tag, &json!(1)).unwrap_err();
        assert_eq!(err.reason, "expected text");
    }
}
