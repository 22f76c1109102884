//! Structured values where "unset" and "all defaults" mean the same thing.

use std::collections::BTreeMap;

use crate::error::{Result, ValueError};

use super::{CustomValue, GenericValue, SemanticValue};

/// A structured value that is semantically equal to null when every field
/// holds its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZeroObject {
    fields: Option<BTreeMap<String, GenericValue>>,
}

impl ZeroObject {
    /// Creates a populated object.
    #[must_use]
    pub const fn new(fields: BTreeMap<String, GenericValue>) -> Self {
        Self {
            fields: Some(fields),
        }
    }

    /// Creates the null object.
    #[must_use]
    pub const fn null() -> Self {
        Self { fields: None }
    }

    /// Returns the fields, or `None` for the null object.
    #[must_use]
    pub const fn fields(&self) -> Option<&BTreeMap<String, GenericValue>> {
        self.fields.as_ref()
    }

    /// Returns true if the object is null or every field holds its default.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.fields
            .as_ref()
            .is_none_or(|fields| fields.values().all(is_zero_value))
    }
}

/// Returns true if `value` holds its kind's default.
///
/// Plain objects count only when null; nested zero objects recurse.
#[must_use]
pub fn is_zero_value(value: &GenericValue) -> bool {
    match value {
        GenericValue::Null => true,
        GenericValue::String(s) => s.is_empty(),
        GenericValue::Bool(b) => !b,
        GenericValue::Number(n) => is_zero_number(n),
        GenericValue::List(items) => items.is_empty(),
        GenericValue::Map(entries) => entries.is_empty(),
        GenericValue::Object(_) => false,
        GenericValue::Custom(custom) => match custom.as_ref() {
            CustomValue::CertificateBundle(bundle) => bundle.is_empty(),
            CustomValue::UnorderedList(list) => list.is_empty(),
            CustomValue::Zero(object) => object.is_zero(),
        },
    }
}

#[allow(clippy::float_cmp)]
fn is_zero_number(n: &serde_json::Number) -> bool {
    if let Some(i) = n.as_i64() {
        i == 0
    } else if let Some(u) = n.as_u64() {
        u == 0
    } else {
        n.as_f64().is_some_and(|f| f == 0.0)
    }
}

impl SemanticValue for ZeroObject {
    const TYPE_NAME: &'static str = "zero_object";

    fn structural_equals(&self, other: &Self) -> bool {
        self.fields == other.fields
    }

    fn semantic_equals(&self, new: &Self) -> Result<bool> {
        Ok((self.is_zero() && new.is_zero()) || self.structural_equals(new))
    }

    fn to_generic(&self) -> GenericValue {
        self.fields
            .as_ref()
            .map_or(GenericValue::Null, |fields| GenericValue::Object(fields.clone()))
    }

    fn from_generic(value: &GenericValue) -> std::result::Result<Self, ValueError> {
        match value {
            GenericValue::Null => Ok(Self::null()),
            GenericValue::Object(fields) => Ok(Self::new(fields.clone())),
            other => Err(ValueError::mismatch("object", other.kind_name())),
        }
    }
}
