//! Order-insensitive string lists.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValueError};
use crate::planner::{ListDiff, list_diff};

use super::{GenericValue, SemanticValue};

/// A list of strings whose order carries no meaning.
///
/// `None` is the null list. It is structurally distinct from an empty list
/// but semantically equal to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnorderedStringList {
    items: Option<Vec<String>>,
}

impl UnorderedStringList {
    /// Creates a list from its elements.
    #[must_use]
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: Some(items.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates the null list.
    #[must_use]
    pub const fn null() -> Self {
        Self { items: None }
    }

    /// Returns true for the null list.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.items.is_none()
    }

    /// Returns the elements in declared order; null is empty.
    #[must_use]
    pub fn items(&self) -> &[String] {
        self.items.as_deref().unwrap_or_default()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns true if the list is null or has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Returns the members added and removed going from `self` to `new`.
    #[must_use]
    pub fn changes(&self, new: &Self) -> ListDiff<String> {
        list_diff(self.items(), new.items())
    }

    fn sorted(&self) -> Vec<&str> {
        let mut sorted: Vec<&str> = self.items().iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted
    }
}

impl SemanticValue for UnorderedStringList {
    const TYPE_NAME: &'static str = "unordered_string_list";

    fn structural_equals(&self, other: &Self) -> bool {
        self.items == other.items
    }

    fn semantic_equals(&self, new: &Self) -> Result<bool> {
        if self.len() != new.len() {
            return Ok(false);
        }
        Ok(self.sorted() == new.sorted())
    }

    fn to_generic(&self) -> GenericValue {
        self.items.as_ref().map_or(GenericValue::Null, |items| {
            GenericValue::List(items.iter().cloned().map(GenericValue::String).collect())
        })
    }

    fn from_generic(value: &GenericValue) -> std::result::Result<Self, ValueError> {
        match value {
            GenericValue::Null => Ok(Self::null()),
            GenericValue::List(items) => items
                .iter()
                .map(|item| match item {
                    GenericValue::String(s) => Ok(s.clone()),
                    other => Err(ValueError::mismatch("string element", other.kind_name())),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Self::new),
            other => Err(ValueError::mismatch("list of strings", other.kind_name())),
        }
    }
}
