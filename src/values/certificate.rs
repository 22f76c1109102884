//! Certificate bundle values.
//!
//! A bundle is a base64-encoded string of one or more concatenated PEM
//! certificates. The remote side is free to re-wrap, re-encode or re-space
//! it, so equality is decided on a canonical form: one `CERTIFICATE` block
//! per certificate, 64-column base64 body, `\n` line endings, original order.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls_pemfile::Item;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::parse_x509_certificate;

use crate::error::{CertificateError, Result, ValueError};

use super::{GenericValue, SemanticValue};

const PEM_LINE_WIDTH: usize = 64;

/// A base64-encoded PEM certificate bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateBundle {
    value: String,
}

/// Summary of one certificate in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// End of the validity period.
    pub not_after: String,
    /// SHA-256 of the DER encoding, hex.
    pub sha256: String,
}

impl CertificateBundle {
    /// Wraps an encoded bundle without validating it.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Encodes PEM text into a bundle.
    #[must_use]
    pub fn from_pem(pem: &str) -> Self {
        Self::new(STANDARD.encode(pem))
    }

    /// Returns the encoded bundle as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns true if the bundle string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Returns the canonical form of this bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle does not decode to certificates.
    pub fn normalize(&self) -> std::result::Result<String, CertificateError> {
        normalize(&self.value)
    }

    /// Returns the SHA-256 fingerprint of each certificate, in bundle order.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle does not decode to certificates.
    pub fn fingerprints(&self) -> std::result::Result<Vec<String>, CertificateError> {
        Ok(certificates(&self.value)?
            .iter()
            .map(|der| hex::encode(Sha256::digest(der)))
            .collect())
    }

    /// Describes each certificate in the bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle does not decode to certificates.
    pub fn inspect(&self) -> std::result::Result<Vec<CertificateInfo>, CertificateError> {
        certificates(&self.value)?
            .iter()
            .map(|der| {
                let (_, cert) = parse_x509_certificate(der).map_err(|e| CertificateError::Parse {
                    message: e.to_string(),
                })?;
                Ok(CertificateInfo {
                    subject: cert.subject().to_string(),
                    issuer: cert.issuer().to_string(),
                    not_after: cert.validity().not_after.to_string(),
                    sha256: hex::encode(Sha256::digest(der)),
                })
            })
            .collect()
    }
}

impl SemanticValue for CertificateBundle {
    const TYPE_NAME: &'static str = "certificate_bundle";

    fn structural_equals(&self, other: &Self) -> bool {
        self.value == other.value
    }

    /// Normalizes both sides. A failure on `self` (the trusted current value)
    /// is returned; a failure on `new` only makes the values unequal.
    fn semantic_equals(&self, new: &Self) -> Result<bool> {
        let current = self.normalize()?;
        match new.normalize() {
            Ok(candidate) => Ok(current == candidate),
            Err(e) => {
                debug!("Candidate certificate bundle does not normalize: {e}");
                Ok(false)
            }
        }
    }

    fn to_generic(&self) -> GenericValue {
        GenericValue::String(self.value.clone())
    }

    fn from_generic(value: &GenericValue) -> std::result::Result<Self, ValueError> {
        match value {
            GenericValue::String(s) => Ok(Self::new(s.clone())),
            other => Err(ValueError::mismatch("string", other.kind_name())),
        }
    }
}

/// Returns the canonical form of a base64-encoded PEM bundle.
///
/// Carriage returns and line feeds in `encoded` are ignored.
///
/// # Errors
///
/// Returns [`CertificateError::Decode`] for invalid base64,
/// [`CertificateError::EmptyInput`] if nothing decodes,
/// [`CertificateError::MalformedCertificate`] for non-certificate content, and
/// [`CertificateError::Parse`] if a block is not an X.509 certificate.
pub fn normalize(encoded: &str) -> std::result::Result<String, CertificateError> {
    let canonical: String = certificates(encoded)?
        .iter()
        .map(|der| encode_pem(der))
        .collect();
    Ok(STANDARD.encode(canonical))
}

/// Decodes a bundle into the DER encoding of each certificate.
fn certificates(encoded: &str) -> std::result::Result<Vec<Vec<u8>>, CertificateError> {
    let compact: String = encoded.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let decoded = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CertificateError::Decode {
            message: e.to_string(),
        })?;

    if decoded.is_empty() {
        return Err(CertificateError::EmptyInput);
    }

    let payload = extract_der(&decoded)?;
    split_certificates(&payload)
}

/// Concatenates the DER payload of every PEM block in `pem`.
fn extract_der(pem: &[u8]) -> std::result::Result<Vec<u8>, CertificateError> {
    let mut payload = Vec::new();
    let mut blocks = 0_usize;
    let mut rest = pem;

    loop {
        match rustls_pemfile::read_one_from_slice(rest) {
            Ok(Some((Item::X509Certificate(der), next))) => {
                payload.extend_from_slice(der.as_ref());
                blocks += 1;
                rest = next;
            }
            Ok(Some((other, _))) => {
                return Err(CertificateError::malformed(format!(
                    "block {} is not a certificate ({})",
                    blocks + 1,
                    item_label(&other)
                )));
            }
            Ok(None) => break,
            Err(e) => {
                return Err(CertificateError::malformed(format!("invalid PEM block: {e:?}")));
            }
        }
    }

    if rest.iter().any(|b| !b.is_ascii_whitespace()) {
        return Err(CertificateError::malformed(format!(
            "{} trailing bytes after the last PEM block",
            rest.len()
        )));
    }
    if blocks == 0 {
        return Err(CertificateError::malformed("no PEM certificate blocks found"));
    }

    Ok(payload)
}

/// Splits concatenated DER into individual certificates.
fn split_certificates(mut der: &[u8]) -> std::result::Result<Vec<Vec<u8>>, CertificateError> {
    let mut certs = Vec::new();

    while !der.is_empty() {
        let (remaining, _) = parse_x509_certificate(der).map_err(|e| CertificateError::Parse {
            message: e.to_string(),
        })?;
        let consumed = der.len() - remaining.len();
        if consumed == 0 {
            return Err(CertificateError::Parse {
                message: String::from("parser made no progress"),
            });
        }
        let (cert, next) = der.split_at(consumed);
        certs.push(cert.to_vec());
        der = next;
    }

    Ok(certs)
}

/// Encodes one certificate as a canonical PEM block.
fn encode_pem(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 60);

    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

const fn item_label(item: &Item) -> &'static str {
    match item {
        Item::Pkcs1Key(_) => "RSA PRIVATE KEY",
        Item::Pkcs8Key(_) => "PRIVATE KEY",
        Item::Sec1Key(_) => "EC PRIVATE KEY",
        Item::Crl(_) => "X509 CRL",
        Item::Csr(_) => "CERTIFICATE REQUEST",
        _ => "unsupported block",
    }
}
