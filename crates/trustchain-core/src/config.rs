//! Configuration types for the TrustChain engine façade.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for [`crate::TrustChain`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub signer: SignerConfig,
    pub chain: ChainConfig,
    pub pki: PkiConfig,
    pub registry: RegistryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signer: SignerConfig::default(),
            chain: ChainConfig::default(),
            pki: PkiConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Signer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Signature algorithm, currently only `"ed25519"`.
    pub algorithm: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            algorithm: "ed25519".to_string(),
        }
    }
}

/// Chain store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Whether signed records are committed to a persistent chain at
    /// all. When `false`, `sign` still produces attestations but
    /// nothing is appended anywhere.
    pub enabled: bool,

    /// Directory holding `chain.log`, `index.db`, `HEAD`, and
    /// `refs/sessions/`.
    pub dir: PathBuf,

    /// Whether an omitted `parent_signature` on `sign` auto-chains
    /// from the current HEAD signature, or is left `None`.
    pub auto_chain: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./.trustchain"),
            auto_chain: true,
        }
    }
}

/// X.509 PKI bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkiConfig {
    /// Bootstrap (or load) a root + intermediate CA and issue an
    /// agent certificate for this engine instance on construction.
    pub enabled: bool,

    pub organization: String,

    /// Identifier for this engine's own agent certificate. A random
    /// id is generated if omitted.
    pub agent_id: Option<String>,

    pub agent_validity_hours: i64,
    pub root_validity_days: i64,
    pub intermediate_validity_days: i64,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            organization: "TrustChain".to_string(),
            agent_id: None,
            agent_validity_hours: 1,
            root_validity_days: 3650,
            intermediate_validity_days: 365,
        }
    }
}

/// Tool certificate registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Sign certificates with the engine's own [`Signer`] (trust
    /// level `internal`) rather than leaving them self-signed.
    pub sign_with_engine_key: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("./.trustchain/tools"),
            sign_with_engine_key: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_chain_on_and_pki_off() {
        let config = EngineConfig::default();
        assert!(config.chain.enabled);
        assert!(!config.pki.enabled);
        assert!(config.chain.auto_chain);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.signer.algorithm, config.signer.algorithm);
    }
}
