//! Structured documents and the value conversion contract.
//!
//! A [`Document`] is an ordered, string-keyed JSON object. Persisted objects
//! write their fields into it through [`DocumentValue`] converters, each of
//! which pairs a render step with a shape-check predicate that must pass
//! before any parse is attempted.

use serde_json::{Map, Number, Value};

use crate::error::{ConversionError, DocumentError};

/// An ordered key/value document (insertion order is preserved).
pub type Document = Map<String, Value>;

/// Bidirectional conversion between a domain value and a document value.
pub trait DocumentValue: Sized {
    /// Renders this value into a document value.
    fn to_value(&self) -> Result<Value, ConversionError>;

    /// Returns true if `value` has the shape this type parses from.
    fn check(value: &Value) -> bool;

    /// Parses a document value. Implementations reject anything `check` rejects.
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Short type name of a document value, for error messages.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn mismatch(expected: &'static str, found: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        found: kind_of(found),
    }
}

impl DocumentValue for bool {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::Bool(*self))
    }

    fn check(value: &Value) -> bool {
        value.is_boolean()
    }

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

macro_rules! unsigned_value {
    ($($ty:ty),*) => {$(
        impl DocumentValue for $ty {
            fn to_value(&self) -> Result<Value, ConversionError> {
                Ok(Value::from(*self))
            }

            fn check(value: &Value) -> bool {
                value.as_u64().is_some_and(|v| <$ty>::try_from(v).is_ok())
            }

            fn from_value(value: &Value) -> Result<Self, ConversionError> {
                let raw = value.as_u64().ok_or_else(|| mismatch("unsigned integer", value))?;
                <$ty>::try_from(raw).map_err(|_| ConversionError::OutOfRange {
                    value: raw.to_string(),
                    target: stringify!($ty),
                })
            }
        }
    )*};
}

unsigned_value!(u8, u16, u32, u64);

impl DocumentValue for i64 {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::from(*self))
    }

    fn check(value: &Value) -> bool {
        value.is_i64()
    }

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_i64().ok_or_else(|| mismatch("signed integer", value))
    }
}

impl DocumentValue for f64 {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Number::from_f64(*self)
            .map(Value::Number)
            .ok_or(ConversionError::NonFinite)
    }

    fn check(value: &Value) -> bool {
        value.is_number()
    }

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_f64().ok_or_else(|| mismatch("number", value))
    }
}

impl DocumentValue for String {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::String(self.clone()))
    }

    fn check(value: &Value) -> bool {
        value.is_string()
    }

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("string", value))
    }
}

/// Field-level helpers over [`Document`].
pub trait DocumentExt {
    /// Renders `value` under `field`, replacing any previous value.
    fn put<T: DocumentValue>(&mut self, field: &str, value: &T) -> Result<(), DocumentError>;

    /// Parses the required `field`.
    fn fetch<T: DocumentValue>(&self, field: &str) -> Result<T, DocumentError>;

    /// Parses `field` if present; a present but malformed field is still an error.
    fn fetch_opt<T: DocumentValue>(&self, field: &str) -> Result<Option<T>, DocumentError>;

    /// Returns the child object under `key`, creating it (or replacing a
    /// non-object value) so each serializable object gets its own scope.
    fn scope_mut(&mut self, key: &str) -> &mut Document;

    /// Returns the child object under `key`, if it exists and is an object.
    fn scope(&self, key: &str) -> Option<&Document>;
}

impl DocumentExt for Document {
    fn put<T: DocumentValue>(&mut self, field: &str, value: &T) -> Result<(), DocumentError> {
        let rendered = value
            .to_value()
            .map_err(|e| DocumentError::invalid(field, e))?;
        self.insert(field.to_string(), rendered);
        Ok(())
    }

    fn fetch<T: DocumentValue>(&self, field: &str) -> Result<T, DocumentError> {
        self.fetch_opt(field)?.ok_or_else(|| DocumentError::MissingField {
            field: field.to_string(),
        })
    }

    fn fetch_opt<T: DocumentValue>(&self, field: &str) -> Result<Option<T>, DocumentError> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .map_err(|e| DocumentError::invalid(field, e)),
        }
    }

    fn scope_mut(&mut self, key: &str) -> &mut Document {
        let slot = self
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just set to an object"),
        }
    }

    fn scope(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(Value::as_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_and_fetch_scalars() {
        let mut doc = Document::new();
        doc.put("enabled", &true).unwrap();
        doc.put("brightness", &200u8).unwrap();
        doc.put("name", &"strip".to_string()).unwrap();
        doc.put("offset", &-3i64).unwrap();
        doc.put("speed", &1.5f64).unwrap();

        assert!(doc.fetch::<bool>("enabled").unwrap());
        assert_eq!(doc.fetch::<u8>("brightness").unwrap(), 200);
        assert_eq!(doc.fetch::<String>("name").unwrap(), "strip");
        assert_eq!(doc.fetch::<i64>("offset").unwrap(), -3);
        assert!((doc.fetch::<f64>("speed").unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let mut doc = Document::new();
        doc.put("zeta", &1u32).unwrap();
        doc.put("alpha", &2u32).unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let mut doc = Document::new();
        let err = doc.put("speed", &f64::NAN).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::InvalidField { source: ConversionError::NonFinite, .. }
        ));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_unsigned_range_is_enforced() {
        let value = json!(300);
        assert!(!u8::check(&value));
        assert!(matches!(
            u8::from_value(&value),
            Err(ConversionError::OutOfRange { target: "u8", .. })
        ));
        assert!(u16::check(&value));
        assert!(!u32::check(&json!(-1)));
    }

    #[test]
    fn test_missing_and_malformed_fields() {
        let mut doc = Document::new();
        doc.insert("count".to_string(), json!("seven"));

        assert!(matches!(
            doc.fetch::<u32>("absent"),
            Err(DocumentError::MissingField { .. })
        ));
        assert!(doc.fetch_opt::<u32>("absent").unwrap().is_none());
        assert!(matches!(
            doc.fetch::<u32>("count"),
            Err(DocumentError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_scopes_are_isolated() {
        let mut doc = Document::new();
        doc.scope_mut("left").put("value", &1u32).unwrap();
        doc.scope_mut("right").put("value", &2u32).unwrap();
        doc.scope_mut("left").put("extra", &true).unwrap();

        assert_eq!(doc.scope("left").unwrap().fetch::<u32>("value").unwrap(), 1);
        assert_eq!(doc.scope("right").unwrap().fetch::<u32>("value").unwrap(), 2);
        assert_eq!(doc.scope("left").unwrap().len(), 2);
    }

    #[test]
    fn test_scope_mut_replaces_scalar() {
        let mut doc = Document::new();
        doc.insert("child".to_string(), json!(5));
        doc.scope_mut("child").put("value", &1u32).unwrap();
        assert!(doc.scope("child").is_some());
    }
}
