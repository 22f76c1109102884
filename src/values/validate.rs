//! Attribute validators.
//!
//! Semantic equality defers validation of candidate values; these checks
//! report the actual problems as diagnostics.

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

use super::{CustomValue, Diagnostics, GenericValue, ResourceState, normalize};

/// Validates a certificate bundle attribute.
///
/// Null values are accepted; strings and certificate bundles must normalize.
pub fn validate_certificate_bundle(path: &str, value: &GenericValue, diags: &mut Diagnostics) {
    let encoded = match value {
        GenericValue::Null => return,
        GenericValue::String(s) => s.as_str(),
        GenericValue::Custom(custom) => match custom.as_ref() {
            CustomValue::CertificateBundle(bundle) => bundle.as_str(),
            other => {
                let err = ValueError::mismatch("certificate_bundle", other.kind().as_str());
                diags.add_attribute_error(path, "Invalid Attribute Type", err.to_string());
                return;
            }
        },
        other => {
            let err = ValueError::mismatch("string", other.kind_name());
            diags.add_attribute_error(path, "Invalid Attribute Type", err.to_string());
            return;
        }
    };

    if let Err(e) = normalize(encoded) {
        diags.add_attribute_error(path, "Invalid Certificate Bundle", e.to_string());
    }
}

/// Requires `companion` to be set whenever `attribute` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiresCompanion {
    /// Attribute that triggers the check.
    pub attribute: String,
    /// Attribute that must accompany it.
    pub companion: String,
}

impl RequiresCompanion {
    /// Creates the rule.
    #[must_use]
    pub fn new(attribute: impl Into<String>, companion: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            companion: companion.into(),
        }
    }

    /// Checks `document`, adding an attribute lookup error to `diags` when
    /// the companion is missing, null or unreadable.
    pub fn validate(&self, document: &ResourceState, diags: &mut Diagnostics) {
        match document.lookup(&self.attribute) {
            Ok(value) if !value.is_null() => {}
            _ => return,
        }

        let problem = match document.lookup(&self.companion) {
            Ok(GenericValue::Null) => Some(ValueError::lookup(
                &self.companion,
                format!("must be set when '{}' is set", self.attribute),
            )),
            Ok(_) => None,
            Err(e) => Some(e),
        };

        if let Some(err) = problem {
            diags.add_attribute_error(&self.companion, "Missing Required Attribute", err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{CertificateBundle, UnorderedStringList};
    use serde_json::json;

    const ALPHA: &str = include_str!("testdata/alpha.pem");

    #[test]
    fn test_valid_bundle_passes() {
        let mut diags = Diagnostics::new();
        let bundle = CertificateBundle::from_pem(ALPHA);

        validate_certificate_bundle("ca", &GenericValue::custom(bundle.clone()), &mut diags);
        validate_certificate_bundle("ca", &GenericValue::from(bundle.as_str()), &mut diags);
        validate_certificate_bundle("ca", &GenericValue::Null, &mut diags);

        assert!(diags.is_empty());
    }

    #[test]
    fn test_invalid_bundle_is_reported_with_path() {
        let mut diags = Diagnostics::new();
        validate_certificate_bundle("ca", &GenericValue::from("Zm9v"), &mut diags);

        assert!(diags.has_error());
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.path.as_deref(), Some("ca"));
        assert!(diag.detail.contains("malformed"));
    }

    #[test]
    fn test_wrong_kind_is_reported() {
        let mut diags = Diagnostics::new();
        validate_certificate_bundle(
            "ca",
            &GenericValue::custom(UnorderedStringList::new(["x"])),
            &mut diags,
        );
        validate_certificate_bundle("ca", &GenericValue::Bool(true), &mut diags);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_companion_rule() {
        let rule = RequiresCompanion::new("client_certificate", "client_key");

        let ok = ResourceState::from_json(json!({
            "client_certificate": "abc",
            "client_key": "def"
        }))
        .unwrap();
        let unset = ResourceState::from_json(json!({"client_certificate": null})).unwrap();
        let missing = ResourceState::from_json(json!({"client_certificate": "abc"})).unwrap();
        let null = ResourceState::from_json(json!({
            "client_certificate": "abc",
            "client_key": null
        }))
        .unwrap();

        let mut diags = Diagnostics::new();
        rule.validate(&ok, &mut diags);
        rule.validate(&unset, &mut diags);
        assert!(diags.is_empty());

        rule.validate(&missing, &mut diags);
        rule.validate(&null, &mut diags);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.path.as_deref() == Some("client_key")));
        assert!(diags.iter().all(|d| d.detail.contains("attribute lookup failed")));
    }

    #[test]
    fn test_unreadable_companion() {
        let rule = RequiresCompanion::new("auth.mode", "auth.settings.key");
        let doc = ResourceState::from_json(json!({
            "auth": {"mode": "mtls", "settings": "inline"}
        }))
        .unwrap();

        let mut diags = Diagnostics::new();
        rule.validate(&doc, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().any(|d| d.detail.contains("cannot descend into string")));
    }
}
