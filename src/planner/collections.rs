//! Set and map comparison.
//!
//! Both functions are set-based: output order follows hash iteration and
//! must not be relied on.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::Serialize;

/// Members added and removed between two lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListDiff<T> {
    /// Members of the new list absent from the old one.
    pub added: Vec<T>,
    /// Members of the old list absent from the new one.
    pub removed: Vec<T>,
}

/// Entries added, removed and modified between two maps.
#[derive(Debug, Clone, Serialize)]
pub struct MapDiff<K, V> {
    /// Keys only in the new map, with their values.
    pub added: HashMap<K, V>,
    /// Keys only in the old map, with their old values.
    pub removed: HashMap<K, V>,
    /// Keys in both maps whose values differ, with their new values.
    pub modified: HashMap<K, V>,
}

impl<T> ListDiff<T> {
    /// Returns true if nothing was added or removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl<K, V> MapDiff<K, V> {
    /// Returns true if the maps are equal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Compares two lists as sets.
#[must_use]
pub fn list_diff<T>(old: &[T], new: &[T]) -> ListDiff<T>
where
    T: Eq + Hash + Clone,
{
    let old_set: HashSet<&T> = old.iter().collect();
    let new_set: HashSet<&T> = new.iter().collect();

    ListDiff {
        added: new_set.difference(&old_set).map(|t| (*t).clone()).collect(),
        removed: old_set.difference(&new_set).map(|t| (*t).clone()).collect(),
    }
}

/// Compares two maps key by key.
#[must_use]
pub fn map_diff<K, V>(old: &HashMap<K, V>, new: &HashMap<K, V>) -> MapDiff<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    let mut diff = MapDiff {
        added: HashMap::new(),
        removed: HashMap::new(),
        modified: HashMap::new(),
    };

    for (key, value) in new {
        match old.get(key) {
            None => {
                diff.added.insert(key.clone(), value.clone());
            }
            Some(previous) if previous != value => {
                diff.modified.insert(key.clone(), value.clone());
            }
            Some(_) => {}
        }
    }

    for (key, value) in old {
        if !new.contains_key(key) {
            diff.removed.insert(key.clone(), value.clone());
        }
    }

    diff
}
