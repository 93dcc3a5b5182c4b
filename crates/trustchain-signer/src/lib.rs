//! # Signer (C1)
//!
//! Owns one Ed25519 keypair and produces chained attestations over tool
//! calls. The signer is a leaf component: it knows nothing about storage,
//! the Merkle tree, or the log — it only canonicalises, signs, and
//! verifies. Keeping it a leaf avoids any cyclic dependency between the
//! signer and the verifiable log that persists its output.
//!
//! ## Threat Model
//!
//! - **Forged attestations**: Ed25519 signatures bind an attestation to
//!   one keypair; a forged signature fails `verify`.
//! - **Reordered signing input**: canonical serialisation (see
//!   [`trustchain_canon`]) means the signed bytes are a pure function of
//!   the attestation's logical content, not of field order.
//! - **Key confusion**: every attestation carries the signer's key id, so
//!   a verifier can detect when a record was produced under a rotated or
//!   foreign key before even checking the signature.
//!
//! ## References
//!
//! - RFC 8032 — "Edwards-Curve Digital Signature Algorithm (EdDSA)"

use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trustchain_canon::{canonicalize, hash_bytes, hash_to_hex};

const ALGORITHM_ED25519: &str = "ed25519";
const KEY_ID_HEX_LEN: usize = 16;

/// Fatal errors that can occur when creating or importing a signer. The
/// sign/verify operations themselves never return an error: `verify`
/// reports a negative result as `false`, per the fixed error taxonomy for
/// verification paths.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

pub type Result<T> = std::result::Result<T, SignerError>;

/// An attestation produced by [`Signer::sign`]: a signature over a tool
/// call, chained to the signer's previous signature via
/// `parent_signature`. The chain-store layer wraps this in a full record
/// (assigning sequence number, content id, and the Merkle parent hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub tool_id: String,
    pub data: serde_json::Value,
    /// UTC timestamp, ISO-8601 with microsecond or better precision.
    pub timestamp: String,
    pub nonce: Option<String>,
    /// Signature over the caller's previous attestation, if this call is
    /// chained to one. Distinct from the log's Merkle parent hash.
    pub parent_signature: Option<String>,
    /// Base64-encoded Ed25519 signature.
    pub signature: String,
    /// Opaque, per-attestation unique identifier.
    pub signature_id: String,
    pub key_id: String,
    pub algorithm: String,
}

/// Exportable key material for a signer: enough to reconstruct the same
/// signing identity elsewhere, or to archive a rotated-out key so its
/// historical attestations remain verifiable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerKeyMaterial {
    pub algorithm: String,
    pub key_id: String,
    /// Base64-encoded public key.
    pub public_key: String,
    /// Base64-encoded private key. Absent when exporting a public-only
    /// verification key (e.g. an archived, rotated-out identity).
    pub private_key: Option<String>,
}

/// Owns one Ed25519 keypair. Not thread-safe; wrap in a `Mutex` for
/// concurrent access, consistent with the rest of the chain engine.
pub struct Signer {
    signing_key: SigningKey,
    key_id: String,
    algorithm: String,
}

impl Signer {
    /// Generates a fresh Ed25519 keypair and derives a key id from the
    /// truncated SHA-256 hash of the public key.
    pub fn create(algorithm: &str) -> Result<Self> {
        if algorithm != ALGORITHM_ED25519 {
            return Err(SignerError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        let signing_key = SigningKey::generate(&mut OsRng);
        let key_id = derive_key_id(signing_key.verifying_key().as_bytes());
        tracing::debug!(key_id = %key_id, "generated new signer keypair");
        Ok(Signer {
            signing_key,
            key_id,
            algorithm: algorithm.to_string(),
        })
    }

    /// Reconstructs a signer from exported key material. Fails if the
    /// algorithm is unrecognised or the key material cannot be decoded.
    pub fn import_key(material: &SignerKeyMaterial) -> Result<Self> {
        if material.algorithm != ALGORITHM_ED25519 {
            return Err(SignerError::UnsupportedAlgorithm(material.algorithm.clone()));
        }
        let private_b64 = material
            .private_key
            .as_ref()
            .ok_or_else(|| SignerError::InvalidKeyMaterial("no private key present".into()))?;
        let private_bytes = base64::engine::general_purpose::STANDARD
            .decode(private_b64)
            .map_err(|e| SignerError::InvalidKeyMaterial(e.to_string()))?;
        let key_bytes: [u8; 32] = private_bytes
            .try_into()
            .map_err(|_| SignerError::InvalidKeyMaterial("private key must be 32 bytes".into()))?;
        let signing_key = SigningKey::from_bytes(&key_bytes);

        let expected_key_id = derive_key_id(signing_key.verifying_key().as_bytes());
        if expected_key_id != material.key_id {
            return Err(SignerError::InvalidKeyMaterial(
                "key id does not match imported key material".into(),
            ));
        }

        Ok(Signer {
            signing_key,
            key_id: material.key_id.clone(),
            algorithm: material.algorithm.clone(),
        })
    }

    /// Exports this signer's key material, including the private key.
    /// Callers archiving a key before [`Signer::rotate_keys`] should keep
    /// this so attestations signed under the old key id remain
    /// verifiable.
    pub fn export_key(&self) -> SignerKeyMaterial {
        SignerKeyMaterial {
            algorithm: self.algorithm.clone(),
            key_id: self.key_id.clone(),
            public_key: base64::engine::general_purpose::STANDARD
                .encode(self.signing_key.verifying_key().as_bytes()),
            private_key: Some(
                base64::engine::general_purpose::STANDARD.encode(self.signing_key.to_bytes()),
            ),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Generates an entirely new keypair in place. All attestations
    /// produced under the old key id remain valid when verified against
    /// an archived copy of the old public key, but this signer no longer
    /// holds it: export before rotating if retention is required.
    pub fn rotate_keys(&mut self) -> Result<()> {
        let fresh = Signer::create(&self.algorithm)?;
        tracing::info!(old_key_id = %self.key_id, new_key_id = %fresh.key_id, "rotated signer keypair");
        *self = fresh;
        Ok(())
    }

    /// Signs a tool call, producing a chained attestation.
    ///
    /// Canonicalises `{tool_id, data, timestamp, nonce, parent_signature}`
    /// and signs the resulting bytes. The returned attestation carries the
    /// base64 signature, the timestamp used, this signer's key id, and a
    /// fresh per-attestation signature identifier.
    pub fn sign(
        &self,
        tool_id: &str,
        data: serde_json::Value,
        nonce: Option<&str>,
        parent_signature: Option<&str>,
    ) -> Attestation {
        let timestamp = current_timestamp();
        let signing_payload = serde_json::json!({
            "tool_id": tool_id,
            "data": data,
            "timestamp": timestamp,
            "nonce": nonce,
            "parent_signature": parent_signature,
        });
        let canonical = canonicalize(&signing_payload);
        let signature: Signature = self.signing_key.sign(canonical.as_bytes());
        let signature_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());

        Attestation {
            tool_id: tool_id.to_string(),
            data,
            timestamp,
            nonce: nonce.map(str::to_string),
            parent_signature: parent_signature.map(str::to_string),
            signature: signature_b64,
            signature_id: fresh_signature_id(),
            key_id: self.key_id.clone(),
            algorithm: self.algorithm.clone(),
        }
    }

    /// Verifies an attestation's signature against this signer's public
    /// key. Never fails with an error: a malformed or mismatched
    /// signature simply returns `false`.
    pub fn verify(&self, attestation: &Attestation) -> bool {
        verify_with_key(&self.signing_key.verifying_key(), attestation)
    }
}

/// Verifies an attestation against an arbitrary public key, for the case
/// where the verifier does not hold the signer itself (e.g. an auditor
/// checking a record against an archived public key).
pub fn verify_with_material(material: &SignerKeyMaterial, attestation: &Attestation) -> bool {
    if material.algorithm != attestation.algorithm {
        return false;
    }
    let Ok(public_bytes) = base64::engine::general_purpose::STANDARD.decode(&material.public_key) else {
        return false;
    };
    let Ok(public_bytes): std::result::Result<[u8; 32], _> = public_bytes.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_bytes) else {
        return false;
    };
    verify_with_key(&verifying_key, attestation)
}

fn verify_with_key(verifying_key: &VerifyingKey, attestation: &Attestation) -> bool {
    if attestation.key_id.is_empty() {
        return false;
    }
    let signing_payload = serde_json::json!({
        "tool_id": attestation.tool_id,
        "data": attestation.data,
        "timestamp": attestation.timestamp,
        "nonce": attestation.nonce,
        "parent_signature": attestation.parent_signature,
    });
    let canonical = canonicalize(&signing_payload);

    let Ok(signature_bytes) = base64::engine::general_purpose::STANDARD.decode(&attestation.signature)
    else {
        return false;
    };
    let Ok(signature_bytes): std::result::Result<[u8; 64], _> = signature_bytes.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&signature_bytes);

    verifying_key.verify(canonical.as_bytes(), &signature).is_ok()
}

fn derive_key_id(public_key_bytes: &[u8]) -> String {
    let hash = hash_bytes(public_key_bytes);
    hash_to_hex(&hash)[..KEY_ID_HEX_LEN].to_string()
}

fn fresh_signature_id() -> String {
    use rand_core::RngCore;
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
