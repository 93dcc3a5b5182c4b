//! # Tool Certificate Registry (C6)
//!
//! Binds a tool's qualified name and version to the hash of its
//! source code at the moment it was certified. Every subsequent call
//! re-hashes the tool's current source and refuses to trust it if the
//! hash has drifted, the certificate expired, or it was revoked.
//!
//! Unlike the X.509 [PKI](../trustchain_pki/index.html), which
//! attests to an *agent's* identity, this registry attests to a
//! *tool implementation's* integrity — the two are complementary, not
//! layered: an agent certificate says who is calling, a tool
//! certificate says the code being called hasn't changed.

mod hashing;
mod models;
mod registry;

pub use hashing::{hash_qualified_identity, hash_source};
pub use models::{
    CertifyMetadata, RegistryError, Result, ToolCertificate, TrustLevel, Violation, ViolationType,
};
pub use registry::ToolRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata() -> CertifyMetadata {
        CertifyMetadata {
            version: "1.0.0".to_string(),
            owner: "platform-team".to_string(),
            organization: "TrustChain".to_string(),
            description: "reads a file".to_string(),
            capabilities: vec!["fs.read".to_string()],
            expires_at: None,
        }
    }

    #[test]
    fn certify_then_verify_succeeds_when_source_unchanged() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::open(dir.path(), None).unwrap();

        let source = "fn read_file(path: &str) -> String { path.to_string() }";
        registry
            .certify("fs_tools", "read_file", Some(source), metadata())
            .unwrap();

        assert!(registry.verify("fs_tools", "read_file", Some(source)).is_ok());
    }

    #[test]
    fn tampered_source_fails_verification_with_code_tampered() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::open(dir.path(), None).unwrap();

        let original = "fn read_file(path: &str) -> String { path.to_string() }";
        registry
            .certify("fs_tools", "read_file", Some(original), metadata())
            .unwrap();

        let tampered = "fn read_file(path: &str) -> String { leak(path) }";
        let result = registry.verify("fs_tools", "read_file", Some(tampered));
        assert!(result.is_err());

        let violations = registry.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::CodeTampered);
        assert_eq!(violations[0].violation_type.as_str(), "CODE_TAMPERED");
    }

    #[test]
    fn uncertified_tool_fails_with_no_certificate() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::open(dir.path(), None).unwrap();

        let result = registry.verify("fs_tools", "delete_file", None);
        assert!(result.is_err());
        assert_eq!(registry.violations()[0].violation_type, ViolationType::NoCertificate);
    }

    #[test]
    fn revoked_tool_fails_verification() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::open(dir.path(), None).unwrap();

        let source = "fn run() {}";
        registry.certify("shell", "run", Some(source), metadata()).unwrap();
        registry.revoke("shell", "run", "compromised dependency").unwrap();

        let result = registry.verify("shell", "run", Some(source));
        assert!(result.is_err());
        assert_eq!(registry.violations()[0].violation_type, ViolationType::Revoked);
    }

    #[test]
    fn fallback_hash_skips_source_comparison() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::open(dir.path(), None).unwrap();

        registry.certify("native", "syscall", None, metadata()).unwrap();
        let cert = registry.get("native", "syscall").unwrap();
        assert!(cert.code_hash_is_fallback);

        assert!(registry.verify("native", "syscall", None).is_ok());
        assert!(registry.verify("native", "syscall", Some("anything")).is_ok());
    }

    #[test]
    fn enforce_blocks_call_in_strict_mode_but_not_permissive() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::open(dir.path(), None).unwrap();

        let strict = registry.enforce("fs_tools", "unknown", None, true, || 42);
        assert!(strict.is_err());

        let permissive = registry.enforce("fs_tools", "unknown", None, false, || 42);
        assert_eq!(permissive.unwrap(), 42);
    }

    #[test]
    fn signer_backed_certificate_is_internal_trust() {
        let dir = TempDir::new().unwrap();
        let signer = trustchain_signer::Signer::create("ed25519").unwrap();
        let registry = ToolRegistry::open(dir.path(), Some(signer)).unwrap();

        let cert = registry
            .certify("fs_tools", "read_file", Some("fn f() {}"), metadata())
            .unwrap();

        assert_eq!(cert.trust_level, TrustLevel::Internal);
        assert!(!cert.signature.is_empty());
    }

    #[test]
    fn reopening_registry_reloads_certificates_from_disk() {
        let dir = TempDir::new().unwrap();
        {
            let registry = ToolRegistry::open(dir.path(), None).unwrap();
            registry
                .certify("fs_tools", "read_file", Some("fn f() {}"), metadata())
                .unwrap();
        }

        let reopened = ToolRegistry::open(dir.path(), None).unwrap();
        assert!(reopened.get("fs_tools", "read_file").is_some());
    }
}
