//! Framework-neutral value representation.
//!
//! [`GenericValue`] is the shape attribute documents take inside the core and
//! the target of every [`SemanticValue::to_generic`] conversion.
//!
//! [`SemanticValue::to_generic`]: super::SemanticValue::to_generic

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use super::CustomValue;

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenericValue {
    /// Absent value.
    #[default]
    Null,
    /// String value.
    String(String),
    /// Boolean value.
    Bool(bool),
    /// Arbitrary-precision JSON number.
    Number(Number),
    /// Ordered list.
    List(Vec<GenericValue>),
    /// Homogeneous map; zero when empty.
    Map(BTreeMap<String, GenericValue>),
    /// Plain structured value with named fields; zero only when null.
    Object(BTreeMap<String, GenericValue>),
    /// One of the custom semantic value kinds.
    Custom(Box<CustomValue>),
}

impl GenericValue {
    /// Returns the name of this value's kind, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Custom(custom) => custom.kind().as_str(),
        }
    }

    /// Returns true for [`GenericValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the custom payload, if this is a custom value.
    #[must_use]
    pub fn as_custom(&self) -> Option<&CustomValue> {
        match self {
            Self::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    /// Wraps a custom value.
    #[must_use]
    pub fn custom(value: impl Into<CustomValue>) -> Self {
        Self::Custom(Box::new(value.into()))
    }

    /// Converts to JSON, flattening custom values to their generic form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(fields) | Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Custom(custom) => custom.to_generic().to_json(),
        }
    }
}

impl From<Value> for GenericValue {
    /// JSON objects become [`GenericValue::Object`]; use
    /// [`GenericValue::Map`] explicitly for homogeneous maps.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => {
                Self::Object(fields.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for GenericValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for GenericValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for GenericValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for GenericValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<CustomValue> for GenericValue {
    fn from(value: CustomValue) -> Self {
        Self::Custom(Box::new(value))
    }
}

impl Serialize for GenericValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for GenericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_objects_become_plain_objects() {
        let value = GenericValue::from(json!({"name": "ns-1", "tags": ["a"], "size": 3}));

        match &value {
            GenericValue::Object(fields) => {
                assert_eq!(fields.get("name"), Some(&GenericValue::from("ns-1")));
                assert_eq!(fields.get("size"), Some(&GenericValue::from(3)));
                assert_eq!(fields.get("tags").map(GenericValue::kind_name), Some("list"));
            }
            other => panic!("unexpected value: {other:?}"),
        }
        assert_eq!(value.to_json(), json!({"name": "ns-1", "tags": ["a"], "size": 3}));
    }

    #[test]
    fn test_display() {
        assert_eq!(GenericValue::from("x").to_string(), "\"x\"");
        assert_eq!(GenericValue::Null.to_string(), "null");
        assert_eq!(GenericValue::from(json!([1, true])).to_string(), "[1,true]");
    }
}
