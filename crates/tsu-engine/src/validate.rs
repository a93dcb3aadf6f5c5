//! Trust-worthiness rules for candidate root certificates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tsu_core::Certificate;

/// Why a candidate was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("certificate is not yet valid")]
    NotYetValid,

    #[error("certificate has expired")]
    Expired,

    #[error("certificate is not a CA")]
    NotCa,

    #[error("certificate basic constraints are missing or invalid")]
    InvalidBasicConstraints,
}

/// Check a certificate against the acceptance rules at instant `now`.
///
/// Rules are checked in order: validity window (`not_before <= now <=
/// not_after`, both ends inclusive), CA flag, basic constraints. No chain
/// or signature verification is done.
pub fn validate(cert: &Certificate, now: DateTime<Utc>) -> Result<(), ValidationFailure> {
    if now < cert.not_before {
        return Err(ValidationFailure::NotYetValid);
    }
    if now > cert.not_after {
        return Err(ValidationFailure::Expired);
    }
    if !cert.is_ca {
        return Err(ValidationFailure::NotCa);
    }
    if !cert.basic_constraints_valid {
        return Err(ValidationFailure::InvalidBasicConstraints);
    }
    Ok(())
}
