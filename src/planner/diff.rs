//! Diff engine for comparing declared, stored and observed state.
//!
//! Attributes are partitioned with [`map_diff`]. Attributes that differ
//! structurally get a second look through semantic equality when either side
//! is a custom value, so re-encoded certificates, reordered lists and
//! defaulted objects do not show up as changes.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::values::{CustomValue, Diagnostics, GenericValue, ResourceState};

use super::collections::{ListDiff, map_diff};

/// Engine for computing diffs between resource states.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

/// Difference for a single resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDiff {
    /// Resource name.
    pub name: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Details about the difference, ordered by field.
    pub details: Vec<DiffDetail>,
    /// Diagnostics raised while comparing.
    pub diagnostics: Diagnostics,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    /// Resource needs to be created.
    Create,
    /// Resource needs to be updated.
    Update,
    /// Resource needs to be deleted.
    Delete,
    /// Resource is unchanged.
    NoChange,
    /// Resource changed outside of the declared configuration.
    Drift,
}

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffDetail {
    /// Field that differs.
    pub field: String,
    /// Old value.
    pub old_value: Option<String>,
    /// New value.
    pub new_value: Option<String>,
    /// Member-level changes, for unordered lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<ListDiff<String>>,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Plans the change from the stored `prior` state to the `desired` one.
    #[must_use]
    pub fn plan(
        &self,
        name: &str,
        prior: Option<&ResourceState>,
        desired: Option<&ResourceState>,
    ) -> ResourceDiff {
        let mut diagnostics = Diagnostics::new();

        let (diff_type, details) = match (prior, desired) {
            (None, None) => (DiffType::NoChange, Vec::new()),
            (None, Some(desired)) => {
                debug!("Resource {name} needs to be created");
                (DiffType::Create, Self::whole(desired, false))
            }
            (Some(prior), None) => {
                debug!("Resource {name} needs to be deleted");
                (DiffType::Delete, Self::whole(prior, true))
            }
            (Some(prior), Some(desired)) => {
                let details = self.compare(prior, desired, &mut diagnostics);
                if details.is_empty() {
                    debug!("Resource {name} is up to date");
                    (DiffType::NoChange, details)
                } else {
                    debug!("Resource {name} needs update ({} fields)", details.len());
                    (DiffType::Update, details)
                }
            }
        };

        ResourceDiff {
            name: name.to_string(),
            diff_type,
            details,
            diagnostics,
        }
    }

    /// Checks whether the `observed` remote state drifted from `prior`.
    ///
    /// A resource that is no longer observed has drifted.
    #[must_use]
    pub fn drift(
        &self,
        name: &str,
        prior: &ResourceState,
        observed: Option<&ResourceState>,
    ) -> ResourceDiff {
        let mut diagnostics = Diagnostics::new();

        let details = match observed {
            Some(observed) => self.compare(prior, observed, &mut diagnostics),
            None => vec![DiffDetail {
                field: String::from("resource"),
                old_value: Some(String::from("present")),
                new_value: None,
                members: None,
            }],
        };

        let diff_type = if details.is_empty() {
            DiffType::NoChange
        } else {
            debug!("Resource {name} drifted ({} fields)", details.len());
            DiffType::Drift
        };

        ResourceDiff {
            name: name.to_string(),
            diff_type,
            details,
            diagnostics,
        }
    }

    /// Compares two attribute documents. `current` is the trusted side.
    ///
    /// An absent attribute and a null one are the same.
    pub fn compare(
        &self,
        current: &ResourceState,
        new: &ResourceState,
        diags: &mut Diagnostics,
    ) -> Vec<DiffDetail> {
        let old: HashMap<&str, &GenericValue> = current
            .attributes()
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        let new_map: HashMap<&str, &GenericValue> = new
            .attributes()
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        let partition = map_diff(&old, &new_map);
        let mut details = Vec::new();

        for (field, value) in partition.added {
            if !Self::is_null_like(field, value, false, diags) {
                details.push(DiffDetail::new(field, None, Some(value)));
            }
        }

        for (field, value) in partition.removed {
            if !Self::is_null_like(field, value, true, diags) {
                details.push(DiffDetail::new(field, Some(value), None));
            }
        }

        for (field, value) in partition.modified {
            let Some(previous) = old.get(field) else {
                continue;
            };
            if let Some(detail) = Self::compare_attribute(field, previous, value, diags) {
                details.push(detail);
            }
        }

        details.sort_by(|a, b| a.field.cmp(&b.field));
        details
    }

    /// Compares one attribute whose values differ structurally.
    fn compare_attribute(
        field: &str,
        current: &GenericValue,
        new: &GenericValue,
        diags: &mut Diagnostics,
    ) -> Option<DiffDetail> {
        let pair = match (current, new) {
            (GenericValue::Custom(a), GenericValue::Custom(b)) => {
                Some(((**a).clone(), (**b).clone()))
            }
            (GenericValue::Custom(a), plain) => CustomValue::from_generic(a.kind(), plain)
                .ok()
                .map(|b| ((**a).clone(), b)),
            (plain, GenericValue::Custom(b)) => CustomValue::from_generic(b.kind(), plain)
                .ok()
                .map(|a| (a, (**b).clone())),
            _ => None,
        };

        let Some((a, b)) = pair else {
            return Some(DiffDetail::new(field, Some(current), Some(new)));
        };

        let mut local = Diagnostics::new();
        let equal = a.semantic_equals(&b, &mut local);
        local.at_path(field);
        diags.append(&mut local);

        if equal {
            debug!("Attribute {field} differs only in representation");
            return None;
        }

        let mut detail = DiffDetail::new(field, Some(current), Some(new));
        if let (CustomValue::UnorderedList(x), CustomValue::UnorderedList(y)) = (&a, &b) {
            detail.members = Some(x.changes(y));
        }
        Some(detail)
    }

    /// Returns true if a value present on one side only is equivalent to
    /// the attribute being unset.
    fn is_null_like(
        field: &str,
        value: &GenericValue,
        removed: bool,
        diags: &mut Diagnostics,
    ) -> bool {
        match value {
            GenericValue::Null => true,
            GenericValue::Custom(custom) => {
                let Ok(null) = CustomValue::from_generic(custom.kind(), &GenericValue::Null) else {
                    return false;
                };
                let mut local = Diagnostics::new();
                let equal = if removed {
                    custom.semantic_equals(&null, &mut local)
                } else {
                    null.semantic_equals(custom, &mut local)
                };
                local.at_path(field);
                diags.append(&mut local);
                equal
            }
            _ => false,
        }
    }

    /// Lists every non-null attribute of a created or deleted resource.
    fn whole(state: &ResourceState, removed: bool) -> Vec<DiffDetail> {
        state
            .attributes()
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(field, value)| {
                if removed {
                    DiffDetail::new(field, Some(value), None)
                } else {
                    DiffDetail::new(field, None, Some(value))
                }
            })
            .collect()
    }
}

impl DiffDetail {
    fn new(field: &str, old: Option<&GenericValue>, new: Option<&GenericValue>) -> Self {
        Self {
            field: field.to_string(),
            old_value: old.map(ToString::to_string),
            new_value: new.map(ToString::to_string),
            members: None,
        }
    }
}

impl ResourceDiff {
    /// Returns true if the resource needs no action.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.diff_type == DiffType::NoChange
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoChange => "no change",
            Self::Drift => "drift",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.diff_type)?;
        if !self.details.is_empty() {
            write!(f, " (")?;
            for (i, detail) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", detail.field)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{CertificateBundle, CustomKind, UnorderedStringList, ZeroObject};
    use serde_json::json;

    const ALPHA: &str = include_str!("../values/testdata/alpha.pem");
    const BETA: &str = include_str!("../values/testdata/beta.pem");

    fn state(value: serde_json::Value) -> ResourceState {
        ResourceState::from_json(value).unwrap()
    }

    fn typed(value: serde_json::Value) -> ResourceState {
        let mut doc = state(value);
        doc.wrap("roles", CustomKind::UnorderedList).unwrap();
        doc.wrap("limits", CustomKind::Zero).unwrap();
        doc.wrap("ca", CustomKind::CertificateBundle).unwrap();
        doc
    }

    #[test]
    fn test_create_and_delete() {
        let engine = DiffEngine::new();
        let doc = state(json!({"name": "ns-1", "region": null}));

        let create = engine.plan("ns-1", None, Some(&doc));
        assert_eq!(create.diff_type, DiffType::Create);
        assert_eq!(create.details.len(), 1);

        let delete = engine.plan("ns-1", Some(&doc), None);
        assert_eq!(delete.diff_type, DiffType::Delete);

        assert!(engine.plan("ns-1", None, None).is_unchanged());
    }

    #[test]
    fn test_reordered_list_is_no_change() {
        let prior = typed(json!({"name": "ns-1", "roles": ["read", "write"]}));
        let desired = typed(json!({"name": "ns-1", "roles": ["write", "read"]}));

        let diff = DiffEngine::new().plan("ns-1", Some(&prior), Some(&desired));
        assert_eq!(diff.diff_type, DiffType::NoChange);
        assert!(diff.diagnostics.is_empty());
    }

    #[test]
    fn test_null_vs_default_zero_object_is_no_change() {
        let prior = typed(json!({"limits": null}));
        let desired = typed(json!({"limits": {"cpu": 0, "memory": ""}}));

        let diff = DiffEngine::new().plan("ns-1", Some(&prior), Some(&desired));
        assert!(diff.is_unchanged());

        // Absent is the same as null.
        let bare = state(json!({}));
        let diff = DiffEngine::new().plan("ns-1", Some(&bare), Some(&desired));
        assert!(diff.is_unchanged());
    }

    #[test]
    fn test_changed_plain_string_is_update() {
        let prior = typed(json!({"name": "ns-1", "region": "eu-west-1"}));
        let desired = typed(json!({"name": "ns-1", "region": "us-east-1"}));

        let diff = DiffEngine::new().plan("ns-1", Some(&prior), Some(&desired));
        assert_eq!(diff.diff_type, DiffType::Update);
        assert_eq!(
            diff.details,
            vec![DiffDetail {
                field: String::from("region"),
                old_value: Some(String::from("\"eu-west-1\"")),
                new_value: Some(String::from("\"us-east-1\"")),
                members: None,
            }]
        );
    }

    #[test]
    fn test_list_member_detail() {
        let prior = typed(json!({"roles": ["read", "write"]}));
        let desired = typed(json!({"roles": ["write", "admin"]}));

        let diff = DiffEngine::new().plan("ns-1", Some(&prior), Some(&desired));
        let members = diff.details[0].members.clone().unwrap();
        assert_eq!(members.added, vec![String::from("admin")]);
        assert_eq!(members.removed, vec![String::from("read")]);
    }

    #[test]
    fn test_reencoded_certificate_is_no_drift() {
        let crlf = ALPHA.replace('\n', "\r\n");
        let prior = ResourceState::new().with(
            "ca",
            CustomValue::from(CertificateBundle::from_pem(ALPHA)),
        );
        // The observed side arrives as a plain string and is lifted.
        let observed =
            ResourceState::new().with("ca", CertificateBundle::from_pem(&crlf).as_str());

        let diff = DiffEngine::new().drift("ns-1", &prior, Some(&observed));
        assert_eq!(diff.diff_type, DiffType::NoChange);

        let rotated = ResourceState::new().with("ca", CertificateBundle::from_pem(BETA).as_str());
        let diff = DiffEngine::new().drift("ns-1", &prior, Some(&rotated));
        assert_eq!(diff.diff_type, DiffType::Drift);
    }

    #[test]
    fn test_vanished_resource_is_drift() {
        let prior = state(json!({"name": "ns-1"}));
        let diff = DiffEngine::new().drift("ns-1", &prior, None);
        assert_eq!(diff.diff_type, DiffType::Drift);
        assert_eq!(diff.to_string(), "ns-1: drift (resource)");
    }

    #[test]
    fn test_corrupt_prior_certificate_is_diagnosed() {
        let prior = ResourceState::new().with(
            "ca",
            CustomValue::from(CertificateBundle::new("corrupt")),
        );
        let desired = ResourceState::new().with(
            "ca",
            CustomValue::from(CertificateBundle::from_pem(ALPHA)),
        );

        let diff = DiffEngine::new().plan("ns-1", Some(&prior), Some(&desired));
        assert_eq!(diff.diff_type, DiffType::Update);
        assert!(diff.diagnostics.has_error());
        assert!(
            diff.diagnostics
                .iter()
                .all(|d| d.path.as_deref() == Some("ca"))
        );
    }

    #[test]
    fn test_kind_mismatch_is_structural() {
        let prior = ResourceState::new().with("roles", CustomValue::from(ZeroObject::null()));
        let desired = ResourceState::new().with(
            "roles",
            CustomValue::from(UnorderedStringList::new(["a"])),
        );

        let diff = DiffEngine::new().plan("ns-1", Some(&prior), Some(&desired));
        assert_eq!(diff.diff_type, DiffType::Update);
        assert!(diff.diagnostics.has_error());
    }
}
