//! Attribute documents.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ValueError;

use super::{CustomKind, CustomValue, GenericValue};

/// The attributes of one resource, as declared, stored or observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState {
    attributes: BTreeMap<String, GenericValue>,
}

impl ResourceState {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style [`ResourceState::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<GenericValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<GenericValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Returns a top-level attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GenericValue> {
        self.attributes.get(name)
    }

    /// Returns every attribute.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, GenericValue> {
        &self.attributes
    }

    /// Builds a document from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if `value` is not an object.
    pub fn from_json(value: Value) -> Result<Self, ValueError> {
        match GenericValue::from(value) {
            GenericValue::Object(attributes) => Ok(Self { attributes }),
            other => Err(ValueError::mismatch("object", other.kind_name())),
        }
    }

    /// Converts to JSON, flattening custom values.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Re-types a top-level attribute as a custom value of `kind`.
    ///
    /// Returns `false` if the attribute is absent.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the attribute does not fit `kind`.
    pub fn wrap(&mut self, name: &str, kind: CustomKind) -> Result<bool, ValueError> {
        let Some(slot) = self.attributes.get_mut(name) else {
            return Ok(false);
        };
        if slot.as_custom().is_some_and(|c| c.kind() == kind) {
            return Ok(true);
        }

        let custom = CustomValue::from_generic(kind, slot).map_err(|e| match e {
            ValueError::SemanticEqualityTypeMismatch { expected, found } => {
                ValueError::lookup(name, format!("cannot read {found} as {kind} (expected {expected})"))
            }
            other => other,
        })?;
        *slot = GenericValue::custom(custom);
        Ok(true)
    }

    /// Resolves a dotted attribute path such as `tls.ca_bundle`.
    ///
    /// Paths descend through objects, maps and zero objects.
    ///
    /// # Errors
    ///
    /// Returns an attribute lookup error if a segment is missing or a parent
    /// is not a structured value.
    pub fn lookup(&self, path: &str) -> Result<&GenericValue, ValueError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self
            .attributes
            .get(first)
            .ok_or_else(|| ValueError::lookup(path, format!("attribute '{first}' is not set")))?;

        for segment in segments {
            let fields = match current {
                GenericValue::Object(fields) | GenericValue::Map(fields) => fields,
                GenericValue::Custom(custom) => match custom.as_ref() {
                    CustomValue::Zero(zero) => zero.fields().ok_or_else(|| {
                        ValueError::lookup(path, format!("parent of '{segment}' is null"))
                    })?,
                    other => {
                        return Err(ValueError::lookup(
                            path,
                            format!("cannot descend into {}", other.kind()),
                        ));
                    }
                },
                GenericValue::Null => {
                    return Err(ValueError::lookup(
                        path,
                        format!("parent of '{segment}' is null"),
                    ));
                }
                other => {
                    return Err(ValueError::lookup(
                        path,
                        format!("cannot descend into {}", other.kind_name()),
                    ));
                }
            };
            current = fields
                .get(segment)
                .ok_or_else(|| ValueError::lookup(path, format!("attribute '{segment}' is not set")))?;
        }

        Ok(current)
    }
}

impl Serialize for ResourceState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> ResourceState {
        ResourceState::from_json(json!({
            "name": "ns-1",
            "roles": ["b", "a"],
            "tls": {"ca_bundle": "", "mode": "strict"},
            "limits": null
        }))
        .unwrap()
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(ResourceState::from_json(json!([1, 2])).is_err());
        assert_eq!(document().get("name"), Some(&GenericValue::from("ns-1")));
    }

    #[test]
    fn test_lookup_paths() {
        let doc = document();

        assert_eq!(
            doc.lookup("tls.mode").unwrap(),
            &GenericValue::from("strict")
        );
        assert!(matches!(
            doc.lookup("tls.missing"),
            Err(ValueError::AttributeLookup { .. })
        ));
        assert!(doc.lookup("name.first").is_err());
        assert!(doc.lookup("limits.cpu").is_err());
    }

    #[test]
    fn test_lookup_through_zero_object() {
        let mut doc = document();
        assert!(doc.wrap("tls", CustomKind::Zero).unwrap());
        assert_eq!(
            doc.lookup("tls.mode").unwrap(),
            &GenericValue::from("strict")
        );
    }

    #[test]
    fn test_wrap() {
        let mut doc = document();

        assert!(doc.wrap("roles", CustomKind::UnorderedList).unwrap());
        assert_eq!(
            doc.get("roles").and_then(GenericValue::as_custom).map(CustomValue::kind),
            Some(CustomKind::UnorderedList)
        );
        assert!(!doc.wrap("absent", CustomKind::UnorderedList).unwrap());
        assert!(doc.wrap("name", CustomKind::Zero).is_err());

        // Flattening restores the declared JSON.
        assert_eq!(doc.to_json()["roles"], json!(["b", "a"]));
    }
}
