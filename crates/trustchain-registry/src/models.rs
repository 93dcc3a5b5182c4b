//! Tool certificate and violation types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLevel {
    SelfSigned,
    Internal,
    External,
}

impl Default for TrustLevel {
    fn default() -> Self {
        TrustLevel::SelfSigned
    }
}

/// A certificate binding one tool's qualified name and version to the
/// SHA-256 hash of its source text at issuance time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCertificate {
    pub tool_name: String,
    pub tool_module: String,
    pub version: String,

    pub code_hash: String,
    pub code_hash_algorithm: String,
    /// True when `code_hash` was computed from a stable qualified
    /// identifier rather than the tool's actual source text, because
    /// the implementation (e.g. a native/builtin function) has none
    /// available. A weaker integrity guarantee than a real hash.
    pub code_hash_is_fallback: bool,

    pub issuer: String,
    pub issuer_key_id: String,
    pub signature: String,
    pub trust_level: TrustLevel,

    pub issued_at: String,
    pub expires_at: Option<String>,
    pub revoked: bool,
    pub revocation_reason: String,

    pub owner: String,
    pub organization: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

impl ToolCertificate {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.tool_module, self.tool_name)
    }

    /// Validity per §4.7: not revoked and (no expiry, or expiry in the
    /// future).
    pub fn is_valid(&self) -> bool {
        if self.revoked {
            return false;
        }
        match &self.expires_at {
            None => true,
            Some(exp) => chrono::DateTime::parse_from_rfc3339(exp)
                .map(|exp| exp > chrono::Utc::now())
                .unwrap_or(true),
        }
    }

    /// Short fingerprint for display: first 12 chars of the code hash.
    pub fn fingerprint(&self) -> String {
        if self.code_hash.is_empty() {
            "---".to_string()
        } else {
            format!("{}...", &self.code_hash[..self.code_hash.len().min(12)])
        }
    }
}

/// Metadata supplied by the caller when certifying a tool.
#[derive(Debug, Clone, Default)]
pub struct CertifyMetadata {
    pub version: String,
    pub owner: String,
    pub organization: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    NoCertificate,
    Revoked,
    Expired,
    CodeTampered,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::NoCertificate => "NO_CERTIFICATE",
            ViolationType::Revoked => "REVOKED",
            ViolationType::Expired => "EXPIRED",
            ViolationType::CodeTampered => "CODE_TAMPERED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub tool: String,
    pub violation_type: ViolationType,
    pub detail: String,
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("no certificate found for tool '{0}'")]
    NoCertificate(String),
    #[error("untrusted tool '{tool}': {reason}")]
    UntrustedTool { tool: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
