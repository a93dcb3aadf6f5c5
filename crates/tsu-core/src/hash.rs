//! Certificate digests via `ring::digest`.

use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY, SHA256};

/// Compute SHA-256 of raw bytes (certificate DER data).
///
/// Returns lowercase hex-encoded digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}

/// Compute the SHA-1 thumbprint of raw bytes.
///
/// Only used to address certificates in tools that key them by SHA-1
/// (`certutil`, `security delete-certificate`). Never used for identity.
#[must_use]
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA1_FOR_LEGACY_USE_ONLY, data).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha1_hex() {
        assert_eq!(
            sha1_hex(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }
}
