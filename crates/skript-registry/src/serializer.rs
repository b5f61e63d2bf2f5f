//! Persisted form of registered values.
//!
//! Variable storage owns the on-disk format; this module only defines the
//! field set a class turns its values into and back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SerializeError;
use crate::value::Value;

/// A single persisted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Named fields describing one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, name: impl Into<String>, value: FieldValue) -> &mut Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn put_boolean(&mut self, name: impl Into<String>, value: bool) -> &mut Self {
        self.put(name, FieldValue::Boolean(value))
    }

    pub fn put_number(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        self.put(name, FieldValue::Number(value))
    }

    pub fn put_text(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.put(name, FieldValue::Text(value.into()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    fn require(&self, name: &str) -> Result<&FieldValue, SerializeError> {
        self.0
            .get(name)
            .ok_or_else(|| SerializeError::MissingField(name.to_string()))
    }

    pub fn get_boolean(&self, name: &str) -> Result<bool, SerializeError> {
        match self.require(name)? {
            FieldValue::Boolean(b) => Ok(*b),
            other => Err(wrong_type(name, "boolean", other)),
        }
    }

    pub fn get_number(&self, name: &str) -> Result<f64, SerializeError> {
        match self.require(name)? {
            FieldValue::Number(n) => Ok(*n),
            other => Err(wrong_type(name, "number", other)),
        }
    }

    pub fn get_text(&self, name: &str) -> Result<&str, SerializeError> {
        match self.require(name)? {
            FieldValue::Text(s) => Ok(s),
            other => Err(wrong_type(name, "text", other)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn wrong_type(name: &str, expected: &'static str, found: &FieldValue) -> SerializeError {
    SerializeError::WrongFieldType {
        field: name.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Turns values of one class into [`Fields`] and back.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<Fields, SerializeError>;

    fn deserialize(&self, fields: &Fields) -> Result<Value, SerializeError>;

    /// Whether [`Serializer::deserialize`] touches host state and therefore
    /// must run on the main thread.
    fn must_sync_deserialization(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut fields = Fields::new();
        fields.put_number("x", 1.5).put_text("world", "nether");

        assert_eq!(fields.len(), 2);
        assert!((fields.get_number("x").unwrap() - 1.5).abs() < f64::EPSILON);
        assert_eq!(fields.get_text("world").unwrap(), "nether");
        assert!(matches!(
            fields.get_boolean("x"),
            Err(SerializeError::WrongFieldType { expected: "boolean", found: "number", .. })
        ));
        assert!(matches!(
            fields.get_number("y"),
            Err(SerializeError::MissingField(name)) if name == "y"
        ));
    }

    #[test]
    fn test_fields_survive_json() {
        let mut fields = Fields::new();
        fields.put_boolean("flag", true).put_number("n", 3.0);

        let json = serde_json::to_string(&fields).unwrap();
        let back: Fields = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fields);
    }
}
