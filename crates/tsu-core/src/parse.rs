//! PEM / DER certificate parsing.

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{Result, TsuError};
use crate::types::{Certificate, Fingerprint, KeyUsage};

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const PEM_END: &[u8] = b"-----END ";

/// Parse every certificate found in `data`.
///
/// All PEM `CERTIFICATE` blocks are decoded independently: a malformed
/// block is logged and skipped. When no PEM certificate is found, the whole
/// buffer is tried once as a single DER certificate.
///
/// # Errors
///
/// Returns `TsuError::NoCertificates` only if nothing parseable was found.
pub fn parse_certificates(data: &[u8], origin: &str) -> Result<Vec<Certificate>> {
    let mut certs = Vec::new();

    for section in pem_sections(data) {
        let block = match pem::parse(section) {
            Ok(block) => block,
            Err(e) => {
                debug!(origin, error = %e, "skipping malformed PEM block");
                continue;
            }
        };
        if block.tag() != "CERTIFICATE" {
            continue;
        }
        match Certificate::from_der(block.contents(), origin) {
            Ok(cert) => certs.push(cert),
            Err(e) => debug!(origin, error = %e, "skipping unparseable certificate"),
        }
    }

    if certs.is_empty() {
        if let Ok(cert) = Certificate::from_der(data, origin) {
            certs.push(cert);
        }
    }

    if certs.is_empty() {
        return Err(TsuError::NoCertificates(origin.to_string()));
    }

    debug!(origin, count = certs.len(), "parsed certificates");
    Ok(certs)
}

/// Split a buffer into `-----BEGIN ...` / `-----END ...` sections.
///
/// A BEGIN line seen before the expected END abandons the open block and
/// starts over there, so a truncated block cannot swallow the next one.
fn pem_sections(data: &[u8]) -> Vec<&[u8]> {
    let mut sections = Vec::new();
    let mut rest = data;

    while let Some(start) = find(rest, PEM_BEGIN) {
        let block = &rest[start..];
        let body = &block[PEM_BEGIN.len()..];
        let Some(end) = find(body, PEM_END) else {
            break;
        };
        if let Some(next) = find(&body[..end], PEM_BEGIN) {
            debug!(bytes = PEM_BEGIN.len() + next, "skipping unterminated PEM block");
            rest = &body[next..];
            continue;
        }

        let end = end + PEM_BEGIN.len();
        let tail = &block[end..];
        let line_len = tail
            .iter()
            .position(|&b| b == b'\n')
            .map_or(tail.len(), |p| p + 1);
        let len = end + line_len;
        sections.push(&block[..len]);
        rest = &block[len..];
    }

    sections
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl Certificate {
    /// Parse a single DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns `TsuError::CertParse` if the bytes are not exactly one
    /// well-formed certificate.
    pub fn from_der(der: &[u8], origin: &str) -> Result<Self> {
        let parse_err = |reason: String| TsuError::CertParse {
            origin: origin.to_string(),
            reason,
        };

        let (rem, cert) = X509Certificate::from_der(der).map_err(|e| parse_err(e.to_string()))?;
        if !rem.is_empty() {
            return Err(parse_err(format!("{} trailing bytes after certificate", rem.len())));
        }

        let basic_constraints = cert.basic_constraints().ok().flatten();
        let key_usage = cert
            .key_usage()
            .ok()
            .flatten()
            .map_or_else(KeyUsage::empty, |ext| KeyUsage(ext.value.flags));
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            common_name,
            serial: cert.raw_serial_as_string(),
            not_before: asn1_to_utc(cert.validity().not_before, origin)?,
            not_after: asn1_to_utc(cert.validity().not_after, origin)?,
            der: der.to_vec(),
            fingerprint: Fingerprint::of(der),
            is_ca: basic_constraints.as_ref().is_some_and(|bc| bc.value.ca),
            basic_constraints_valid: basic_constraints.is_some(),
            key_usage,
            origin: origin.to_string(),
        })
    }
}

/// Convert an ASN.1 `GeneralizedTime` / `UTCTime` to `DateTime<Utc>`.
fn asn1_to_utc(t: x509_parser::time::ASN1Time, origin: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(t.timestamp(), 0)
        .single()
        .ok_or_else(|| TsuError::CertParse {
            origin: origin.to_string(),
            reason: format!("validity timestamp {} out of range", t.timestamp()),
        })
}
