//! # X.509 PKI (C5)
//!
//! A three-tier certificate authority hierarchy — root, intermediate,
//! agent — adapted from the SSL/TLS CA model to short-lived AI agent
//! identities. Agent certificates carry four AI-specific facts (model
//! hash, prompt hash, tool-version map, capability list) as custom
//! extensions under a private-enterprise OID arc, plus a fifth,
//! parent-agent serial, present only on delegated sub-agents.
//!
//! ## Hierarchy
//!
//! ```text
//! Root CA (self-signed, 10y default)
//!   └── Intermediate CA (CA=true, path_len=0, 1y default)
//!         ├── Agent cert (CA=false, 1h default)
//!         └── Agent cert
//!               └── Sub-agent cert (parent-agent-serial extension)
//! ```
//!
//! Only the intermediate ever issues certificates — an agent never
//! becomes `CA=true`, even when delegating to a sub-agent (the
//! SPIFFE-style "B+" pattern, §4.6).
//!
//! ## Cascading revocation
//!
//! Revoking an agent's serial at the issuing intermediate causes every
//! sub-agent whose `parent-agent-serial` extension names that serial
//! to fail verification with `PARENT_REVOKED`, even though its own
//! serial was never revoked.
//!
//! ## References
//!
//! - RFC 5280 — "Internet X.509 Public Key Infrastructure Certificate
//!   and CRL Profile"

mod agent;
mod ca;
mod error;
mod oid;

pub use agent::{AgentCertRequest, AgentCertificate, AgentSummary};
pub use ca::{verify_chain, CertificateAuthority};
pub use error::{CertVerifyResult, PkiError, Result, VerifyErrorCode};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use time::Duration;

    fn agent_request(agent_id: &str, parent_serial: Option<u64>) -> AgentCertRequest {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert("bash".to_string(), "1.2.0".to_string());
        AgentCertRequest {
            agent_id: agent_id.to_string(),
            organization: "TrustChain".to_string(),
            model_hash: "sha256:deadbeef".to_string(),
            prompt_hash: "sha256:cafef00d".to_string(),
            tool_versions,
            capabilities: vec!["read".to_string(), "write".to_string()],
            validity: Duration::hours(1),
            parent_serial,
        }
    }

    #[test]
    fn root_is_self_signed_and_long_lived() {
        let root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        assert!(root.is_root());
        assert!(root.certificate_pem().contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn full_chain_verifies() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", None))
            .unwrap();

        assert!(agent.is_valid());
        assert!(agent.is_short_lived());
        assert_eq!(agent.model_hash, "sha256:deadbeef");
        assert_eq!(agent.capabilities, vec!["read", "write"]);

        let chain = [&intermediate, &root];
        assert!(verify_chain(&agent, &chain));
    }

    #[test]
    fn foreign_ca_breaks_chain() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", None))
            .unwrap();

        let foreign_root = CertificateAuthority::create_root("Evil Root", "Evil Corp", 3650).unwrap();
        let chain = [&intermediate, &foreign_root];
        assert!(!verify_chain(&agent, &chain));
    }

    #[test]
    fn sub_agent_cascade_revocation() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();

        let agent_a = intermediate
            .issue_agent_cert(agent_request("agent-a", None))
            .unwrap();
        let agent_b = intermediate
            .issue_agent_cert(agent_request("agent-b", Some(agent_a.serial)))
            .unwrap();

        assert!(intermediate.verify_cert(&agent_b).valid);

        intermediate.revoke(agent_a.serial, "prompt injection detected");

        let result_b = intermediate.verify_cert(&agent_b);
        assert!(!result_b.valid);
        assert!(result_b.has_error(VerifyErrorCode::ParentRevoked));

        let result_a = intermediate.verify_cert(&agent_a);
        assert!(!result_a.valid);
        assert!(result_a.has_error(VerifyErrorCode::Revoked));
    }

    #[test]
    fn expired_cert_reports_expired() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();

        let mut req = agent_request("agent-short", None);
        req.validity = Duration::seconds(-1);
        let agent = intermediate.issue_agent_cert(req).unwrap();

        assert!(!agent.is_valid());
        let result = intermediate.verify_cert(&agent);
        assert!(result.has_error(VerifyErrorCode::Expired));
    }

    #[test]
    fn pem_round_trip_preserves_metadata() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", Some(42)))
            .unwrap();

        let pem = agent.to_pem();
        let reimported = AgentCertificate::from_pem(&pem).unwrap();

        assert_eq!(reimported.agent_id, agent.agent_id);
        assert_eq!(reimported.model_hash, agent.model_hash);
        assert_eq!(reimported.prompt_hash, agent.prompt_hash);
        assert_eq!(reimported.tool_versions, agent.tool_versions);
        assert_eq!(reimported.capabilities, agent.capabilities);
        assert_eq!(reimported.parent_serial, agent.parent_serial);
        assert_eq!(reimported.serial, agent.serial);
    }

    #[test]
    fn ca_save_and_load_round_trips_certificate() {
        let dir = TempDir::new().unwrap();
        let root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        root.save(dir.path()).unwrap();

        let loaded = CertificateAuthority::load(dir.path(), "Root", "TrustChain").unwrap();
        assert!(loaded.is_root());
        assert_eq!(loaded.name(), "Root");
    }

    #[test]
    fn ca_save_and_load_round_trips_revocations() {
        let dir = TempDir::new().unwrap();
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", None))
            .unwrap();
        intermediate.revoke(agent.serial, "compromised key");
        intermediate.save(dir.path()).unwrap();

        let reloaded =
            CertificateAuthority::load(dir.path(), "Platform", "TrustChain").unwrap();
        assert!(reloaded.is_revoked(agent.serial));
        assert!(!reloaded.verify_cert(&agent).valid);
        assert!(reloaded
            .verify_cert(&agent)
            .has_error(VerifyErrorCode::Revoked));
    }

    #[test]
    fn agent_signature_round_trips_and_survives_pem() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", None))
            .unwrap();

        let payload = b"delegate to sub-agent-02";
        let signature = agent.sign_data(payload).unwrap();
        assert!(agent.verify_signature(payload, &signature).unwrap());
        assert!(!agent.verify_signature(b"tampered", &signature).unwrap());

        // A cert reconstructed from PEM has no private key but can still
        // verify a signature produced before the round trip.
        let reimported = AgentCertificate::from_pem(&agent.to_pem()).unwrap();
        assert!(reimported.sign_data(payload).is_err());
        assert!(reimported.verify_signature(payload, &signature).unwrap());
    }

    #[test]
    fn to_summary_reflects_certificate_fields() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", Some(7)))
            .unwrap();

        let summary = agent.to_summary();
        assert_eq!(summary.agent_id, "agent-01");
        assert_eq!(summary.serial, agent.serial);
        assert_eq!(summary.fingerprint.len(), 24);
        assert_eq!(summary.model_hash, agent.model_hash);
        assert_eq!(summary.parent_serial, Some(7));
        assert!(summary.is_sub_agent);
        assert!(summary.is_valid);
        assert!(summary.is_short_lived);
    }

    #[test]
    fn crl_emission_produces_pem() {
        let mut root = CertificateAuthority::create_root("Root", "TrustChain", 3650).unwrap();
        let mut intermediate = root.issue_intermediate("Platform", "TrustChain", 365).unwrap();
        let agent = intermediate
            .issue_agent_cert(agent_request("agent-01", None))
            .unwrap();
        intermediate.revoke(agent.serial, "test revocation");

        let crl_pem = intermediate.crl_pem().unwrap();
        assert!(crl_pem.contains("BEGIN X509 CRL"));
    }
}
