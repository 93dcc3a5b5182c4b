//! The unified TrustChain engine façade.

use std::collections::BTreeMap;

use tracing::{debug, info};

use trustchain_chain::{ChainStore, CommitInput, ParentRef};
use trustchain_pki::{AgentCertRequest, AgentCertificate, CertificateAuthority};
use trustchain_registry::{CertifyMetadata, ToolCertificate, ToolRegistry};
use trustchain_signer::{Attestation, Signer};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::nonce::NonceStore;

const ROOT_CA_NAME: &str = "TrustChain Root CA";
const INTERMEDIATE_CA_NAME: &str = "TrustChain Platform CA";

/// Bootstrapped X.509 identity for one engine instance.
pub struct EnginePki {
    pub root_ca: CertificateAuthority,
    pub intermediate_ca: CertificateAuthority,
    pub agent_cert: AgentCertificate,
}

/// One `Signer`, one `ChainStore`, and optionally a bootstrapped PKI
/// hierarchy and tool registry, wired together from a single
/// [`EngineConfig`]. The crate's single public entry point.
///
/// `TrustChain` pipes a tool call through sign → chain-commit, with
/// PKI and tool-registry checks available as separate, composable
/// operations rather than a single linear pipeline — the three
/// subsystems here are independent proofs, not sequential vetoes.
pub struct TrustChain {
    config: EngineConfig,
    signer: Signer,
    chain: Option<ChainStore>,
    pki: Option<EnginePki>,
    registry: Option<ToolRegistry>,
    nonce_store: Option<Box<dyn NonceStore>>,
}

impl TrustChain {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let signer = Signer::create(&config.signer.algorithm)?;

        let chain = if config.chain.enabled {
            Some(ChainStore::open(&config.chain.dir, config.chain.auto_chain)?)
        } else {
            None
        };

        let pki = if config.pki.enabled {
            Some(Self::bootstrap_pki(&config)?)
        } else {
            None
        };

        let registry = if config.registry.enabled {
            let registry_signer = if config.registry.sign_with_engine_key {
                Some(Signer::import_key(&signer.export_key())?)
            } else {
                None
            };
            Some(ToolRegistry::open(&config.registry.dir, registry_signer)?)
        } else {
            None
        };

        info!(algorithm = %config.signer.algorithm, chain = config.chain.enabled, pki = config.pki.enabled, "trustchain engine initialized");

        Ok(Self {
            config,
            signer,
            chain,
            pki,
            registry,
            nonce_store: None,
        })
    }

    pub fn with_nonce_store(mut self, store: Box<dyn NonceStore>) -> Self {
        self.nonce_store = Some(store);
        self
    }

    fn bootstrap_pki(config: &EngineConfig) -> Result<EnginePki> {
        let dir = config.chain.dir.join("pki");
        std::fs::create_dir_all(&dir)?;
        let org = &config.pki.organization;

        let mut root_ca = match CertificateAuthority::load(&dir, ROOT_CA_NAME, org) {
            Ok(ca) => ca,
            Err(_) => {
                let ca = CertificateAuthority::create_root(ROOT_CA_NAME, org, config.pki.root_validity_days)?;
                ca.save(&dir)?;
                ca
            }
        };

        let mut intermediate_ca = match CertificateAuthority::load(&dir, INTERMEDIATE_CA_NAME, org) {
            Ok(ca) => ca,
            Err(_) => {
                let ca = root_ca.issue_intermediate(INTERMEDIATE_CA_NAME, org, config.pki.intermediate_validity_days)?;
                ca.save(&dir)?;
                ca
            }
        };

        let agent_id = config
            .pki
            .agent_id
            .clone()
            .unwrap_or_else(|| format!("agent-{}", chrono::Utc::now().timestamp_millis()));

        let agent_cert = intermediate_ca.issue_agent_cert(AgentCertRequest {
            agent_id,
            organization: org.clone(),
            model_hash: String::new(),
            prompt_hash: String::new(),
            tool_versions: BTreeMap::new(),
            capabilities: Vec::new(),
            validity: time::Duration::hours(config.pki.agent_validity_hours),
            parent_serial: None,
        })?;

        Ok(EnginePki {
            root_ca,
            intermediate_ca,
            agent_cert,
        })
    }

    /// Signs `data` under `tool_id` and, if the chain store is
    /// enabled, commits the resulting attestation to it. `parent`
    /// controls auto-chaining the same way [`ParentRef`] does at the
    /// chain-store layer.
    #[allow(clippy::too_many_arguments)]
    pub fn sign(
        &self,
        tool_id: &str,
        data: serde_json::Value,
        parent: ParentRef,
        session_id: Option<&str>,
        metadata: Option<serde_json::Value>,
        latency_ms: u64,
    ) -> Result<Attestation> {
        self.sign_with_nonce(tool_id, data, None, parent, session_id, metadata, latency_ms)
    }

    /// Like [`Self::sign`] but with an explicit nonce, checked against
    /// the configured [`NonceStore`] (if any) on a later `verify` call.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_with_nonce(
        &self,
        tool_id: &str,
        data: serde_json::Value,
        nonce: Option<&str>,
        parent: ParentRef,
        session_id: Option<&str>,
        metadata: Option<serde_json::Value>,
        latency_ms: u64,
    ) -> Result<Attestation> {
        let parent_signature_hint = match &parent {
            ParentRef::Explicit(sig) => Some(sig.clone()),
            ParentRef::None => None,
            ParentRef::Auto => self.chain.as_ref().and_then(|c| c.parent_signature()),
        };

        let attestation = self.signer.sign(tool_id, data.clone(), nonce, parent_signature_hint.as_deref());

        if let Some(chain) = &self.chain {
            chain.commit(CommitInput {
                tool_id: tool_id.to_string(),
                data,
                timestamp: attestation.timestamp.clone(),
                signature: attestation.signature.clone(),
                signature_id: attestation.signature_id.clone(),
                parent_signature: parent,
                key_id: attestation.key_id.clone(),
                algorithm: attestation.algorithm.clone(),
                latency_ms,
                session_id: session_id.map(|s| s.to_string()),
                nonce: attestation.nonce.clone(),
                metadata,
            })?;
        }

        debug!(tool = tool_id, "signed and recorded attestation");
        Ok(attestation)
    }

    /// Verifies a single attestation's signature, plus nonce replay if
    /// a nonce store is configured.
    pub fn verify(&self, attestation: &Attestation) -> Result<bool> {
        if let (Some(store), Some(nonce)) = (&self.nonce_store, &attestation.nonce) {
            if !store.check_and_record(nonce) {
                return Err(EngineError::NonceReplay(nonce.clone()));
            }
        }
        Ok(self.signer.verify(attestation))
    }

    /// Verifies a chain of attestations: each must itself verify, and
    /// each (after the first) must name the previous one's signature
    /// as `parent_signature`.
    pub fn verify_chain(&self, attestations: &[Attestation]) -> bool {
        for (i, attestation) in attestations.iter().enumerate() {
            if !self.signer.verify(attestation) {
                return false;
            }
            if i > 0 {
                let expected = &attestations[i - 1].signature;
                if attestation.parent_signature.as_deref() != Some(expected.as_str()) {
                    return false;
                }
            }
        }
        true
    }

    pub fn chain(&self) -> Option<&ChainStore> {
        self.chain.as_ref()
    }

    pub fn pki(&self) -> Result<&EnginePki> {
        self.pki.as_ref().ok_or(EngineError::PkiDisabled)
    }

    pub fn issue_agent_cert(&mut self, request: AgentCertRequest) -> Result<AgentCertificate> {
        let pki = self.pki.as_mut().ok_or(EngineError::PkiDisabled)?;
        Ok(pki.intermediate_ca.issue_agent_cert(request)?)
    }

    pub fn registry(&self) -> Result<&ToolRegistry> {
        self.registry.as_ref().ok_or(EngineError::RegistryDisabled)
    }

    pub fn certify_tool(
        &self,
        module: &str,
        name: &str,
        source: Option<&str>,
        metadata: CertifyMetadata,
    ) -> Result<ToolCertificate> {
        let registry = self.registry.as_ref().ok_or(EngineError::RegistryDisabled)?;
        Ok(registry.certify(module, name, source, metadata)?)
    }

    pub fn verify_tool(&self, module: &str, name: &str, source: Option<&str>) -> Result<()> {
        let registry = self.registry.as_ref().ok_or(EngineError::RegistryDisabled)?;
        Ok(registry.verify(module, name, source)?)
    }

    pub fn key_id(&self) -> &str {
        self.signer.key_id()
    }

    pub fn rotate_keys(&mut self) -> Result<()> {
        self.signer.rotate_keys()?;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
