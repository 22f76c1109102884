//! Semantic values.
//!
//! The remote control plane re-encodes, reorders and defaults some
//! attributes. The types in this module decide equality the way the remote
//! side does, so a plan does not re-issue a mutation for a change that is
//! only representational.
//!
//! The set of custom kinds is closed: [`CustomValue`] is a plain enum and
//! [`CustomKind`] equality is the type-equality check.

mod certificate;
mod diagnostics;
mod document;
mod generic;
mod unordered;
mod validate;
mod zero;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ValueError};

pub use certificate::{CertificateBundle, CertificateInfo, normalize};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use document::ResourceState;
pub use generic::GenericValue;
pub use unordered::UnorderedStringList;
pub use validate::{RequiresCompanion, validate_certificate_bundle};
pub use zero::{ZeroObject, is_zero_value};

/// Equality and conversion contract shared by every semantic value.
pub trait SemanticValue: Sized {
    /// Name of the kind, used in diagnostics.
    const TYPE_NAME: &'static str;

    /// Representation-sensitive equality.
    fn structural_equals(&self, other: &Self) -> bool;

    /// Equality as the remote side sees it. `self` is the trusted current
    /// value and `new` the candidate.
    ///
    /// # Errors
    ///
    /// Returns an error only when `self` itself is unusable.
    fn semantic_equals(&self, new: &Self) -> Result<bool>;

    /// Converts to the generic representation.
    fn to_generic(&self) -> GenericValue;

    /// Converts from the generic representation.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if `value` has the wrong shape.
    fn from_generic(value: &GenericValue) -> std::result::Result<Self, ValueError>;
}

/// Custom value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomKind {
    /// Base64-encoded PEM certificate bundle.
    CertificateBundle,
    /// Order-insensitive list of strings.
    UnorderedList,
    /// Structured value equal to null when all fields are defaults.
    Zero,
}

impl CustomKind {
    /// Returns the kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CertificateBundle => CertificateBundle::TYPE_NAME,
            Self::UnorderedList => UnorderedStringList::TYPE_NAME,
            Self::Zero => ZeroObject::TYPE_NAME,
        }
    }
}

impl fmt::Display for CustomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value of one of the custom kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    /// Certificate bundle.
    CertificateBundle(CertificateBundle),
    /// Unordered string list.
    UnorderedList(UnorderedStringList),
    /// Zero-structured object.
    Zero(ZeroObject),
}

impl CustomValue {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> CustomKind {
        match self {
            Self::CertificateBundle(_) => CustomKind::CertificateBundle,
            Self::UnorderedList(_) => CustomKind::UnorderedList,
            Self::Zero(_) => CustomKind::Zero,
        }
    }

    /// Builds a value of `kind` from its generic representation.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if `value` does not fit `kind`.
    pub fn from_generic(
        kind: CustomKind,
        value: &GenericValue,
    ) -> std::result::Result<Self, ValueError> {
        match kind {
            CustomKind::CertificateBundle => {
                CertificateBundle::from_generic(value).map(Self::CertificateBundle)
            }
            CustomKind::UnorderedList => {
                UnorderedStringList::from_generic(value).map(Self::UnorderedList)
            }
            CustomKind::Zero => ZeroObject::from_generic(value).map(Self::Zero),
        }
    }

    /// Converts to the generic representation.
    #[must_use]
    pub fn to_generic(&self) -> GenericValue {
        match self {
            Self::CertificateBundle(v) => v.to_generic(),
            Self::UnorderedList(v) => v.to_generic(),
            Self::Zero(v) => v.to_generic(),
        }
    }

    /// Representation-sensitive equality; values of different kinds are
    /// never equal.
    #[must_use]
    pub fn structural_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::CertificateBundle(a), Self::CertificateBundle(b)) => a.structural_equals(b),
            (Self::UnorderedList(a), Self::UnorderedList(b)) => a.structural_equals(b),
            (Self::Zero(a), Self::Zero(b)) => a.structural_equals(b),
            _ => false,
        }
    }

    /// Semantic equality at the framework boundary.
    ///
    /// Never fails: a kind mismatch or an unusable current value is reported
    /// as an error diagnostic and the values compare unequal.
    pub fn semantic_equals(&self, new: &Self, diags: &mut Diagnostics) -> bool {
        let result = match (self, new) {
            (Self::CertificateBundle(a), Self::CertificateBundle(b)) => a.semantic_equals(b),
            (Self::UnorderedList(a), Self::UnorderedList(b)) => a.semantic_equals(b),
            (Self::Zero(a), Self::Zero(b)) => a.semantic_equals(b),
            _ => {
                let err = ValueError::mismatch(self.kind().as_str(), new.kind().as_str());
                diags.add_error("Semantic Equality Check Error", err.to_string());
                return false;
            }
        };

        match result {
            Ok(equal) => equal,
            Err(e) => {
                debug!("Semantic equality on {} failed: {e}", self.kind());
                diags.add_provider_error(
                    format!("Semantic Equality Check Error ({})", self.kind()),
                    &e,
                );
                false
            }
        }
    }
}

impl From<CertificateBundle> for CustomValue {
    fn from(value: CertificateBundle) -> Self {
        Self::CertificateBundle(value)
    }
}

impl From<UnorderedStringList> for CustomValue {
    fn from(value: UnorderedStringList) -> Self {
        Self::UnorderedList(value)
    }
}

impl From<ZeroObject> for CustomValue {
    fn from(value: ZeroObject) -> Self {
        Self::Zero(value)
    }
}
