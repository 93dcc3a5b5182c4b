//! # TrustChain engine façade (C0)
//!
//! Wires the six leaf subsystems — [Ed25519 signer][trustchain_signer],
//! [Merkle engine][trustchain_merkle], [verifiable log][trustchain_log],
//! [chain store][trustchain_chain], [X.509 PKI][trustchain_pki], and
//! [tool certificate registry][trustchain_registry] — behind one
//! [`TrustChain`] façade constructed from a single [`EngineConfig`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use trustchain_core::{EngineConfig, TrustChain};
//!
//! let engine = TrustChain::new(EngineConfig::default()).unwrap();
//! let attestation = engine
//!     .sign("bash_tool", serde_json::json!({"command": "ls"}), Default::default(), None, None, 12)
//!     .unwrap();
//! assert!(engine.verify(&attestation).unwrap());
//! ```

mod config;
mod engine;
mod error;
mod nonce;

pub use config::{ChainConfig, EngineConfig, PkiConfig, RegistryConfig, SignerConfig};
pub use engine::{EnginePki, TrustChain};
pub use error::{EngineError, Result};
pub use nonce::{InMemoryNonceStore, NonceStore};

pub use trustchain_chain::ParentRef;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.chain.dir = dir.path().join("chain");
        config
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let dir = TempDir::new().unwrap();
        let engine = TrustChain::new(config(&dir)).unwrap();

        let attestation = engine
            .sign("bash_tool", serde_json::json!({"command": "ls"}), ParentRef::Auto, None, None, 5)
            .unwrap();

        assert!(engine.verify(&attestation).unwrap());
    }

    #[test]
    fn successive_signs_auto_chain_by_signature() {
        let dir = TempDir::new().unwrap();
        let engine = TrustChain::new(config(&dir)).unwrap();

        let first = engine
            .sign("bash_tool", serde_json::json!({"n": 1}), ParentRef::Auto, None, None, 0)
            .unwrap();
        let second = engine
            .sign("bash_tool", serde_json::json!({"n": 2}), ParentRef::Auto, None, None, 0)
            .unwrap();

        assert_eq!(second.parent_signature.as_deref(), Some(first.signature.as_str()));
        assert!(engine.verify_chain(&[first, second]));
    }

    #[test]
    fn tampered_attestation_fails_verification() {
        let dir = TempDir::new().unwrap();
        let engine = TrustChain::new(config(&dir)).unwrap();

        let mut attestation = engine
            .sign("bash_tool", serde_json::json!({"n": 1}), ParentRef::Auto, None, None, 0)
            .unwrap();
        attestation.data = serde_json::json!({"n": 999});

        assert!(!engine.verify(&attestation).unwrap());
    }

    #[test]
    fn chain_disabled_still_signs_but_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.chain.enabled = false;
        let engine = TrustChain::new(cfg).unwrap();

        engine
            .sign("bash_tool", serde_json::json!({}), ParentRef::Auto, None, None, 0)
            .unwrap();
        assert!(engine.chain().is_none());
    }

    #[test]
    fn pki_bootstrap_produces_a_verifiable_agent_certificate() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.pki.enabled = true;
        let engine = TrustChain::new(cfg).unwrap();

        let pki = engine.pki().unwrap();
        let result = pki.intermediate_ca.verify_cert(&pki.agent_cert);
        assert!(result.valid);
    }

    #[test]
    fn registry_backed_by_engine_signer_is_internal_trust() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.registry.enabled = true;
        cfg.registry.dir = dir.path().join("tools");
        let engine = TrustChain::new(cfg).unwrap();

        let cert = engine
            .certify_tool(
                "fs_tools",
                "read_file",
                Some("fn f() {}"),
                trustchain_registry::CertifyMetadata::default(),
            )
            .unwrap();
        assert_eq!(cert.trust_level, trustchain_registry::TrustLevel::Internal);

        assert!(engine.verify_tool("fs_tools", "read_file", Some("fn f() {}")).is_ok());
        assert!(engine
            .verify_tool("fs_tools", "read_file", Some("fn f() { tampered() }"))
            .is_err());
    }

    #[test]
    fn nonce_store_rejects_replays_on_verify() {
        let dir = TempDir::new().unwrap();
        let engine = TrustChain::new(config(&dir)).unwrap().with_nonce_store(Box::new(InMemoryNonceStore::default()));

        let attestation = engine
            .sign_with_nonce("bash_tool", serde_json::json!({}), Some("nonce-1"), ParentRef::Auto, None, None, 0)
            .unwrap();

        assert!(engine.verify(&attestation).unwrap());
        let replay = engine.verify(&attestation);
        assert!(replay.is_err());
    }
}
