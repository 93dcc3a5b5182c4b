//! Error and verification-result types for the PKI layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
    #[error("certificate parsing failed: {0}")]
    Parse(String),
    #[error("pem encoding error: {0}")]
    Pem(#[from] pem::PemError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no private key available for this certificate")]
    NoPrivateKey,
    #[error("serial number {0} is unknown to this authority")]
    UnknownSerial(u64),
}

pub type Result<T> = std::result::Result<T, PkiError>;

/// One entry of the wire-visible error taxonomy for PKI verification
/// failures. A single `verify_cert` call accumulates every reason that
/// applies rather than stopping at the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyErrorCode {
    InvalidSignature,
    NotYetValid,
    Expired,
    Revoked,
    ParentRevoked,
}

impl VerifyErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            VerifyErrorCode::NotYetValid => "NOT_YET_VALID",
            VerifyErrorCode::Expired => "EXPIRED",
            VerifyErrorCode::Revoked => "REVOKED",
            VerifyErrorCode::ParentRevoked => "PARENT_REVOKED",
        }
    }
}

impl std::fmt::Display for VerifyErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`crate::CertificateAuthority::verify_cert`]. Errors are
/// accumulated rather than short-circuited so one call reports every
/// applicable reason at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertVerifyResult {
    pub valid: bool,
    pub errors: Vec<VerifyErrorCode>,
    pub issuer: String,
    pub subject: String,
    pub serial: u64,
    pub not_after: String,
}

impl CertVerifyResult {
    pub fn has_error(&self, code: VerifyErrorCode) -> bool {
        self.errors.contains(&code)
    }
}
