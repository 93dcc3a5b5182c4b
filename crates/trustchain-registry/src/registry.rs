//! The tool certificate registry facade.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};

use crate::hashing::{hash_qualified_identity, hash_source};
use crate::models::{
    CertifyMetadata, Result, RegistryError, ToolCertificate, TrustLevel, Violation, ViolationType,
};
use trustchain_signer::Signer;

/// Directory-backed registry of tool certificates.
///
/// Certificates are kept in memory and mirrored to one JSON file per
/// tool under `root/<qualified-name>.json`, so a registry reopened on
/// a later run picks up where the last one left off. An optional
/// [`Signer`] upgrades newly certified tools from `self-signed` to
/// `internal` trust; without one every certificate is self-signed.
pub struct ToolRegistry {
    root: PathBuf,
    signer: Option<Signer>,
    certs: Mutex<HashMap<String, ToolCertificate>>,
    violations: Mutex<Vec<Violation>>,
}

impl ToolRegistry {
    pub fn open<P: AsRef<Path>>(root: P, signer: Option<Signer>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let mut certs = HashMap::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            let cert: ToolCertificate = serde_json::from_str(&contents)?;
            certs.insert(cert.qualified_name(), cert);
        }

        Ok(Self {
            root,
            signer,
            certs: Mutex::new(certs),
            violations: Mutex::new(Vec::new()),
        })
    }

    fn cert_path(&self, qualified_name: &str) -> PathBuf {
        let sanitized = qualified_name.replace(['/', '\\'], "_");
        self.root.join(format!("{sanitized}.json"))
    }

    fn persist(&self, cert: &ToolCertificate) -> Result<()> {
        let path = self.cert_path(&cert.qualified_name());
        let json = serde_json::to_string_pretty(cert)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Issues a certificate binding `module.name`'s current source (or,
    /// when `source` is `None`, a stable qualified-identifier fallback)
    /// to a certificate. Signs it with the registry's signer if one was
    /// configured (trust level `internal`); otherwise the certificate
    /// is `self-signed`.
    pub fn certify(
        &self,
        module: &str,
        name: &str,
        source: Option<&str>,
        metadata: CertifyMetadata,
    ) -> Result<ToolCertificate> {
        let (code_hash, code_hash_is_fallback) = match source {
            Some(src) => (hash_source(src), false),
            None => (hash_qualified_identity(module, name), true),
        };

        let now = Utc::now().to_rfc3339();

        let (issuer, issuer_key_id, signature, trust_level) = match &self.signer {
            Some(signer) => {
                let payload = serde_json::json!({
                    "tool_module": module,
                    "tool_name": name,
                    "code_hash": code_hash,
                });
                let attestation = signer.sign("cert_issue", payload, None, None);
                (
                    signer.key_id().to_string(),
                    signer.key_id().to_string(),
                    attestation.signature,
                    TrustLevel::Internal,
                )
            }
            None => (
                "self".to_string(),
                "self".to_string(),
                String::new(),
                TrustLevel::SelfSigned,
            ),
        };

        let cert = ToolCertificate {
            tool_name: name.to_string(),
            tool_module: module.to_string(),
            version: metadata.version,
            code_hash,
            code_hash_algorithm: "sha256".to_string(),
            code_hash_is_fallback,
            issuer,
            issuer_key_id,
            signature,
            trust_level,
            issued_at: now,
            expires_at: metadata.expires_at,
            revoked: false,
            revocation_reason: String::new(),
            owner: metadata.owner,
            organization: metadata.organization,
            description: metadata.description,
            capabilities: metadata.capabilities,
        };

        self.persist(&cert)?;
        self.certs
            .lock()
            .unwrap()
            .insert(cert.qualified_name(), cert.clone());

        info!(tool = %cert.qualified_name(), fallback = code_hash_is_fallback, "certified tool");
        Ok(cert)
    }

    /// Checks a tool's certificate against its current source (if
    /// known). Returns `Ok(())` when the tool is trusted; otherwise
    /// records and returns the first violation encountered.
    pub fn verify(&self, module: &str, name: &str, source: Option<&str>) -> Result<()> {
        let qualified = format!("{module}.{name}");
        let cert = {
            let certs = self.certs.lock().unwrap();
            certs.get(&qualified).cloned()
        };

        let Some(cert) = cert else {
            self.record_violation(&qualified, ViolationType::NoCertificate, "no certificate issued");
            return Err(RegistryError::NoCertificate(qualified));
        };

        if cert.revoked {
            self.record_violation(&qualified, ViolationType::Revoked, &cert.revocation_reason);
            return Err(RegistryError::UntrustedTool {
                tool: qualified,
                reason: "certificate revoked".to_string(),
            });
        }

        if !cert.is_valid() {
            self.record_violation(&qualified, ViolationType::Expired, "certificate expired");
            return Err(RegistryError::UntrustedTool {
                tool: qualified,
                reason: "certificate expired".to_string(),
            });
        }

        if let Some(src) = source {
            let current_hash = hash_source(src);
            if !cert.code_hash_is_fallback && current_hash != cert.code_hash {
                self.record_violation(
                    &qualified,
                    ViolationType::CodeTampered,
                    "source hash does not match certificate",
                );
                return Err(RegistryError::UntrustedTool {
                    tool: qualified,
                    reason: "source code does not match certificate".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn revoke(&self, module: &str, name: &str, reason: &str) -> Result<()> {
        let qualified = format!("{module}.{name}");
        let mut certs = self.certs.lock().unwrap();
        let cert = certs
            .get_mut(&qualified)
            .ok_or_else(|| RegistryError::NoCertificate(qualified.clone()))?;
        cert.revoked = true;
        cert.revocation_reason = reason.to_string();
        self.persist(cert)?;
        warn!(tool = %qualified, reason, "revoked tool certificate");
        Ok(())
    }

    pub fn get(&self, module: &str, name: &str) -> Option<ToolCertificate> {
        let qualified = format!("{module}.{name}");
        self.certs.lock().unwrap().get(&qualified).cloned()
    }

    pub fn list(&self) -> Vec<ToolCertificate> {
        let mut out: Vec<_> = self.certs.lock().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.qualified_name().cmp(&b.qualified_name()));
        out
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.violations.lock().unwrap().clone()
    }

    fn record_violation(&self, tool: &str, violation_type: ViolationType, detail: &str) {
        self.violations.lock().unwrap().push(Violation {
            tool: tool.to_string(),
            violation_type,
            detail: detail.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    /// Wraps a call so it only proceeds when `verify` succeeds. In
    /// strict mode any violation is returned as an error; in
    /// permissive mode the violation is recorded but `call` still
    /// runs, letting callers soft-launch certification across a
    /// codebase before flipping enforcement on.
    pub fn enforce<T>(
        &self,
        module: &str,
        name: &str,
        source: Option<&str>,
        strict: bool,
        call: impl FnOnce() -> T,
    ) -> Result<T> {
        match self.verify(module, name, source) {
            Ok(()) => Ok(call()),
            Err(err) if strict => Err(err),
            Err(_) => Ok(call()),
        }
    }
}
