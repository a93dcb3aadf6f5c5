//! Certificate model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::hash::{sha1_hex, sha256_hex};

/// SHA-256 fingerprint of a certificate's DER encoding (lowercase hex).
///
/// This is the only identity key for certificates: two certificates are
/// the same certificate iff their fingerprints are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of raw DER bytes.
    #[must_use]
    pub fn of(der: &[u8]) -> Self {
        Self(sha256_hex(der))
    }

    /// Full hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex characters, for log lines and file names.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(16)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// X.509 key usage bits, in the extension's bit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyUsage(pub u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: Self = Self(1 << 0);
    pub const NON_REPUDIATION: Self = Self(1 << 1);
    pub const KEY_ENCIPHERMENT: Self = Self(1 << 2);
    pub const DATA_ENCIPHERMENT: Self = Self(1 << 3);
    pub const KEY_AGREEMENT: Self = Self(1 << 4);
    pub const KEY_CERT_SIGN: Self = Self(1 << 5);
    pub const CRL_SIGN: Self = Self(1 << 6);
    pub const ENCIPHER_ONLY: Self = Self(1 << 7);
    pub const DECIPHER_ONLY: Self = Self(1 << 8);

    /// No bits set (extension absent).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A parsed X.509 certificate plus the metadata reconciliation needs.
///
/// Built by [`Certificate::from_der`] or [`crate::parse::parse_certificates`].
/// Equality and hashing use the fingerprint only, so subject formatting
/// or casing never makes two encodings of the same bytes differ.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// Subject distinguished name (RFC 4514 style)
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// Subject common name, if present
    pub common_name: Option<String>,
    /// Serial number (hex)
    pub serial: String,
    /// Not valid before
    pub not_before: DateTime<Utc>,
    /// Not valid after
    pub not_after: DateTime<Utc>,
    /// Raw DER encoding
    pub der: Vec<u8>,
    /// SHA-256 of `der`
    pub fingerprint: Fingerprint,
    /// Basic constraints `cA` flag
    pub is_ca: bool,
    /// Basic constraints extension present and well-formed
    pub basic_constraints_valid: bool,
    /// Key usage bits
    pub key_usage: KeyUsage,
    /// Name of the source (or store) this certificate was read from
    pub origin: String,
}

impl Certificate {
    /// PEM encoding of the raw DER bytes.
    #[must_use]
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.der.clone()))
    }

    /// SHA-1 thumbprint (hex), for tools that address certificates that way.
    #[must_use]
    pub fn sha1_hex(&self) -> String {
        sha1_hex(&self.der)
    }

    /// Human-readable label: common name, falling back to the subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.common_name.as_deref().unwrap_or(&self.subject)
    }

    /// File-system safe base name: sanitized common name plus fingerprint prefix.
    ///
    /// Falls back to `cert_<serial>` when the subject has no common name.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let base = match self.common_name.as_deref() {
            Some(cn) if !cn.trim().is_empty() => cn.to_string(),
            _ => format!("cert_{}", self.serial.replace(':', "")),
        };
        let safe: String = base
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' | '*' | ':' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("{}_{}", safe, &self.fingerprint.as_str()[..8])
    }

    /// Same certificate, attributed to a different origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

/// Compact, serializable view of a certificate for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertSummary {
    /// SHA-256 fingerprint
    pub fingerprint: Fingerprint,
    /// Subject distinguished name
    pub subject: String,
    /// Originating source
    pub origin: String,
    /// Not valid after
    pub not_after: DateTime<Utc>,
}

impl From<&Certificate> for CertSummary {
    fn from(cert: &Certificate) -> Self {
        Self {
            fingerprint: cert.fingerprint.clone(),
            subject: cert.subject.clone(),
            origin: cert.origin.clone(),
            not_after: cert.not_after,
        }
    }
}
