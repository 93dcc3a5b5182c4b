//! Agent certificates: the X.509 leaf of the hierarchy, carrying
//! AI-specific metadata under the custom OID arc in [`crate::oid`].

use crate::error::{PkiError, Result};
use crate::oid;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rcgen::KeyPair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};
use x509_parser::prelude::*;

/// Input to [`crate::CertificateAuthority::issue_agent_cert`].
#[derive(Debug, Clone)]
pub struct AgentCertRequest {
    pub agent_id: String,
    pub organization: String,
    pub model_hash: String,
    pub prompt_hash: String,
    pub tool_versions: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    pub validity: Duration,
    /// Serial number of the parent agent, if this is a sub-agent
    /// delegated via the B+ pattern (§4.6).
    pub parent_serial: Option<u64>,
}

impl Default for AgentCertRequest {
    fn default() -> Self {
        AgentCertRequest {
            agent_id: String::new(),
            organization: "TrustChain".to_string(),
            model_hash: String::new(),
            prompt_hash: String::new(),
            tool_versions: BTreeMap::new(),
            capabilities: Vec::new(),
            validity: Duration::hours(1),
            parent_serial: None,
        }
    }
}

/// A short-lived X.509 leaf certificate for an AI agent.
///
/// Holds the DER-encoded certificate plus the fields parsed out of its
/// standard and custom extensions, so accessors don't re-parse on every
/// call. The agent's own private key is present only when this value
/// was freshly issued, not when reconstructed via [`AgentCertificate::from_pem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCertificate {
    pub(crate) der: Vec<u8>,
    pub agent_id: String,
    pub organization: String,
    pub serial: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub model_hash: String,
    pub prompt_hash: String,
    pub tool_versions: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    pub parent_serial: Option<u64>,
    #[serde(skip)]
    pub(crate) key_pair: Option<std::sync::Arc<KeyPair>>,
}

/// Read-only projection of an [`AgentCertificate`], the Rust analogue of
/// the original's `to_dict`. Used for logging and by the CLI's `cert show`
/// subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub organization: String,
    pub serial: u64,
    pub fingerprint: String,
    pub model_hash: String,
    pub prompt_hash: String,
    pub tool_versions: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    pub parent_serial: Option<u64>,
    pub is_sub_agent: bool,
    pub is_valid: bool,
    pub is_short_lived: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
}

impl AgentCertificate {
    pub fn is_sub_agent(&self) -> bool {
        self.parent_serial.is_some()
    }

    /// Time-wise validity: `not_before <= now <= not_after`.
    pub fn is_valid(&self) -> bool {
        let now = OffsetDateTime::now_utc();
        self.not_before <= now && now <= self.not_after
    }

    /// A certificate is "short-lived" if its validity window is under
    /// 24 hours.
    pub fn is_short_lived(&self) -> bool {
        (self.not_after - self.not_before) < Duration::hours(24)
    }

    pub fn validity_remaining(&self) -> Duration {
        self.not_after - OffsetDateTime::now_utc()
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new("CERTIFICATE", self.der.clone());
        pem::encode(&pem)
    }

    /// Reconstructs an [`AgentCertificate`] from a PEM-encoded X.509
    /// certificate, re-deriving every field (including the five
    /// AI-specific extensions) from the DER. Without the private key:
    /// a certificate imported this way cannot call [`AgentCertificate::sign_data`].
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let pem = pem::parse(pem_text).map_err(PkiError::Pem)?;
        Self::from_der(pem.contents().to_vec())
    }

    pub(crate) fn from_der(der: Vec<u8>) -> Result<Self> {
        let (_, cert) =
            X509Certificate::from_der(&der).map_err(|e| PkiError::Parse(e.to_string()))?;

        let agent_id = common_name(&cert).unwrap_or_default();
        let organization = org_name(&cert).unwrap_or_default();
        let serial = serial_as_u64(&cert);
        let not_before = cert.validity().not_before.to_datetime();
        let not_after = cert.validity().not_after.to_datetime();

        let model_hash = extension_string(&cert, &oid::OID_MODEL_HASH).unwrap_or_default();
        let prompt_hash = extension_string(&cert, &oid::OID_PROMPT_HASH).unwrap_or_default();
        let tool_versions = extension_bytes(&cert, &oid::OID_TOOL_VERSIONS)
            .and_then(|b| serde_json::from_slice(&b).ok())
            .unwrap_or_default();
        let capabilities = extension_bytes(&cert, &oid::OID_CAPABILITIES)
            .and_then(|b| serde_json::from_slice(&b).ok())
            .unwrap_or_default();
        let parent_serial = extension_string(&cert, &oid::OID_PARENT_AGENT_SERIAL)
            .and_then(|s| s.parse::<u64>().ok());

        Ok(AgentCertificate {
            der,
            agent_id,
            organization,
            serial,
            not_before,
            not_after,
            model_hash,
            prompt_hash,
            tool_versions,
            capabilities,
            parent_serial,
            key_pair: None,
        })
    }

    /// Signs arbitrary data with the agent's own private key.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key_pair = self.key_pair.as_ref().ok_or(PkiError::NoPrivateKey)?;
        Ok(key_pair.sign(data).map_err(PkiError::Generation)?.to_vec())
    }

    /// Verifies a signature produced by [`AgentCertificate::sign_data`]
    /// against this certificate's own embedded public key. Works on a
    /// certificate reconstructed via [`AgentCertificate::from_pem`] — it
    /// needs no private key, only the SPKI carried in the DER.
    pub fn verify_signature(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let (_, cert) =
            X509Certificate::from_der(&self.der).map_err(|e| PkiError::Parse(e.to_string()))?;
        let spki_bytes = cert.public_key().subject_public_key.data.as_ref();
        let key_bytes: [u8; 32] = spki_bytes
            .try_into()
            .map_err(|_| PkiError::Parse("unexpected Ed25519 public key length".to_string()))?;
        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|e| PkiError::Parse(e.to_string()))?;
        let signature_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| PkiError::Parse("unexpected Ed25519 signature length".to_string()))?;
        let signature = Signature::from_bytes(&signature_bytes);
        Ok(verifying_key.verify(data, &signature).is_ok())
    }

    /// SHA-256 fingerprint of the DER certificate, first 24 hex chars.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.der);
        hex::encode(digest)[..24].to_string()
    }

    /// A read-only, serializable summary of this certificate's fields —
    /// used by logging and the CLI's `cert show` subcommand.
    pub fn to_summary(&self) -> AgentSummary {
        AgentSummary {
            agent_id: self.agent_id.clone(),
            organization: self.organization.clone(),
            serial: self.serial,
            fingerprint: self.fingerprint(),
            model_hash: self.model_hash.clone(),
            prompt_hash: self.prompt_hash.clone(),
            tool_versions: self.tool_versions.clone(),
            capabilities: self.capabilities.clone(),
            parent_serial: self.parent_serial,
            is_sub_agent: self.is_sub_agent(),
            is_valid: self.is_valid(),
            is_short_lived: self.is_short_lived(),
            not_before: self.not_before,
            not_after: self.not_after,
        }
    }
}

fn common_name(cert: &X509Certificate) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

fn org_name(cert: &X509Certificate) -> Option<String> {
    cert.subject()
        .iter_organization()
        .next()
        .and_then(|o| o.as_str().ok())
        .map(str::to_string)
}

fn serial_as_u64(cert: &X509Certificate) -> u64 {
    let bytes = cert.raw_serial();
    let mut buf = [0u8; 8];
    let start = bytes.len().saturating_sub(8);
    let tail = &bytes[start..];
    buf[8 - tail.len()..].copy_from_slice(tail);
    u64::from_be_bytes(buf)
}

fn oid_matches(ext_oid: &x509_parser::der_parser::oid::Oid, arc: &[u64]) -> bool {
    ext_oid
        .iter()
        .map(|it| it.eq(arc.iter().copied()))
        .unwrap_or(false)
}

fn extension_bytes(cert: &X509Certificate, arc: &[u64]) -> Option<Vec<u8>> {
    cert.extensions()
        .iter()
        .find(|ext| oid_matches(&ext.oid, arc))
        .map(|ext| ext.value.to_vec())
}

fn extension_string(cert: &X509Certificate, arc: &[u64]) -> Option<String> {
    extension_bytes(cert, arc).and_then(|b| String::from_utf8(b).ok())
}
