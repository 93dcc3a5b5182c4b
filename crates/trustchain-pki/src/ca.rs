//! The three-tier CA hierarchy: root, intermediate, and the agent
//! certificates an intermediate issues.

use crate::agent::{AgentCertRequest, AgentCertificate};
use crate::error::{CertVerifyResult, PkiError, Result, VerifyErrorCode};
use crate::oid;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DistinguishedName, DnType,
    IsCa, KeyPair, KeyUsagePurpose, SerialNumber,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use x509_parser::prelude::*;

/// Serial numbers below this floor are reserved (root + intermediate
/// use low fixed serials; agent certs start issuing above it).
const SERIAL_FLOOR: u64 = 1000;

#[derive(Debug, Clone)]
struct RevocationEntry {
    at: OffsetDateTime,
    reason: String,
}

/// On-disk shape of one revocation entry, persisted alongside the CRL
/// (whose standard reason-code field can't carry our free-form reason
/// string) so `load()` can rebuild the in-memory revocation map.
#[derive(Debug, Serialize, Deserialize)]
struct RevocationRecord {
    serial: u64,
    at: String,
    reason: String,
}

/// One certificate authority in the hierarchy: root, intermediate, or
/// (conceptually) the issuer role an intermediate plays when minting
/// agent certs. Owns its own keypair, its signed certificate, a serial
/// counter, and a revocation list keyed by serial.
pub struct CertificateAuthority {
    name: String,
    organization: String,
    is_root: bool,
    key_pair: KeyPair,
    cert: Certificate,
    next_serial: u64,
    revoked: HashMap<u64, RevocationEntry>,
}

impl CertificateAuthority {
    /// Self-signed root CA. Default validity 10 years, `CA=true` with
    /// path length 1 (permits exactly one intermediate tier below it).
    pub fn create_root(name: &str, organization: &str, validity_days: i64) -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ED25519)?;
        let mut params = base_params(
            name,
            organization,
            "AI Security",
            validity_days,
            IsCa::Ca(BasicConstraints::Constrained(1)),
            vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
            ],
        )?;
        params.serial_number = Some(SerialNumber::from(1u64));
        let cert = params.self_signed(&key_pair)?;

        tracing::info!(name, "created root CA");
        Ok(CertificateAuthority {
            name: name.to_string(),
            organization: organization.to_string(),
            is_root: true,
            key_pair,
            cert,
            next_serial: SERIAL_FLOOR,
            revoked: HashMap::new(),
        })
    }

    /// Issues an intermediate CA certificate signed by this CA.
    /// Default validity 1 year, `CA=true` with path length 0 (the
    /// intermediate may not delegate further CA authority — it may
    /// only issue leaf agent certificates).
    pub fn issue_intermediate(
        &mut self,
        name: &str,
        organization: &str,
        validity_days: i64,
    ) -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ED25519)?;
        let mut params = base_params(
            name,
            organization,
            "AI Platform",
            validity_days,
            IsCa::Ca(BasicConstraints::Constrained(0)),
            vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
            ],
        )?;
        let serial = self.next_serial_number();
        params.serial_number = Some(SerialNumber::from(serial));
        let cert = params.signed_by(&key_pair, &self.cert, &self.key_pair)?;

        tracing::info!(name, serial, issuer = %self.name, "issued intermediate CA");
        Ok(CertificateAuthority {
            name: name.to_string(),
            organization: organization.to_string(),
            is_root: false,
            key_pair,
            cert,
            next_serial: SERIAL_FLOOR,
            revoked: HashMap::new(),
        })
    }

    /// Issues a short-lived agent certificate signed by this CA (an
    /// intermediate, in the canonical hierarchy). The issuing CA never
    /// becomes `CA=true` itself — only the intermediate mints certs,
    /// preserving a single issuance point even for sub-agent
    /// delegation (`req.parent_serial`).
    pub fn issue_agent_cert(&mut self, req: AgentCertRequest) -> Result<AgentCertificate> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ED25519)?;
        let now = OffsetDateTime::now_utc();
        let not_after = now + req.validity;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, req.agent_id.clone());
        dn.push(DnType::OrganizationName, req.organization.clone());
        dn.push(DnType::OrganizationalUnitName, "AI Agent");

        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.distinguished_name = dn;
        params.not_before = now;
        params.not_after = not_after;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::ContentCommitment,
        ];
        let serial = self.next_serial_number();
        params.serial_number = Some(SerialNumber::from(serial));

        if !req.model_hash.is_empty() {
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(
                    &oid::OID_MODEL_HASH,
                    req.model_hash.clone().into_bytes(),
                ));
        }
        if !req.prompt_hash.is_empty() {
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(
                    &oid::OID_PROMPT_HASH,
                    req.prompt_hash.clone().into_bytes(),
                ));
        }
        if !req.tool_versions.is_empty() {
            let json = serde_json::to_vec(&req.tool_versions).map_err(|e| {
                PkiError::Parse(format!("tool_versions serialization failed: {e}"))
            })?;
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(
                    &oid::OID_TOOL_VERSIONS,
                    json,
                ));
        }
        if !req.capabilities.is_empty() {
            let mut sorted = req.capabilities.clone();
            sorted.sort();
            let json = serde_json::to_vec(&sorted)
                .map_err(|e| PkiError::Parse(format!("capabilities serialization failed: {e}")))?;
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(
                    &oid::OID_CAPABILITIES,
                    json,
                ));
        }
        if let Some(parent_serial) = req.parent_serial {
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(
                    &oid::OID_PARENT_AGENT_SERIAL,
                    parent_serial.to_string().into_bytes(),
                ));
        }

        let cert = params.signed_by(&key_pair, &self.cert, &self.key_pair)?;

        tracing::info!(
            agent_id = %req.agent_id,
            serial,
            issuer = %self.name,
            sub_agent = req.parent_serial.is_some(),
            "issued agent certificate"
        );

        Ok(AgentCertificate {
            der: cert.der().to_vec(),
            agent_id: req.agent_id,
            organization: req.organization,
            serial,
            not_before: now,
            not_after,
            model_hash: req.model_hash,
            prompt_hash: req.prompt_hash,
            tool_versions: req.tool_versions,
            capabilities: req.capabilities,
            parent_serial: req.parent_serial,
            key_pair: Some(Arc::new(key_pair)),
        })
    }

    // ── Revocation ──

    /// Revokes a certificate by serial number. Immediate: the next
    /// `verify_cert`/`verify_chain` call against this CA sees it.
    pub fn revoke(&mut self, serial: u64, reason: &str) {
        self.revoked.insert(
            serial,
            RevocationEntry {
                at: OffsetDateTime::now_utc(),
                reason: reason.to_string(),
            },
        );
        tracing::warn!(serial, reason, authority = %self.name, "revoked certificate");
    }

    pub fn is_revoked(&self, serial: u64) -> bool {
        self.revoked.contains_key(&serial)
    }

    pub fn revoked_serials(&self) -> Vec<u64> {
        self.revoked.keys().copied().collect()
    }

    /// Emits a PEM-encoded CRL signed by this CA, `this_update` now and
    /// `next_update` one hour out.
    pub fn crl_pem(&self) -> Result<String> {
        let now = OffsetDateTime::now_utc();
        let mut revoked_certs = Vec::with_capacity(self.revoked.len());
        for (serial, entry) in &self.revoked {
            revoked_certs.push(rcgen::RevokedCertParams {
                serial_number: SerialNumber::from(*serial),
                revocation_time: entry.at,
                reason_code: None,
                invalidity_date: None,
            });
        }
        let crl_params = rcgen::CertificateRevocationListParams {
            this_update: now,
            next_update: now + Duration::hours(1),
            crl_number: SerialNumber::from(self.revoked.len() as u64),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: rcgen::KeyIdMethod::Sha256,
        };
        let crl = crl_params.signed_by(&self.cert, &self.key_pair)?;
        Ok(crl.pem()?)
    }

    // ── Verification ──

    /// Verifies an agent certificate was issued by this CA: signature,
    /// validity window, direct revocation, and cascading
    /// parent-agent revocation (the B+ pattern). Checks run in the
    /// order given in §4.6 and accumulate every applicable error.
    pub fn verify_cert(&self, cert: &AgentCertificate) -> CertVerifyResult {
        let mut errors = Vec::new();

        if !self.verify_signed_by_me(&cert.der) {
            errors.push(VerifyErrorCode::InvalidSignature);
        }

        let now = OffsetDateTime::now_utc();
        if now < cert.not_before {
            errors.push(VerifyErrorCode::NotYetValid);
        }
        if now > cert.not_after {
            errors.push(VerifyErrorCode::Expired);
        }

        if self.is_revoked(cert.serial) {
            errors.push(VerifyErrorCode::Revoked);
        }

        if let Some(parent_serial) = cert.parent_serial {
            if self.is_revoked(parent_serial) {
                errors.push(VerifyErrorCode::ParentRevoked);
            }
        }

        CertVerifyResult {
            valid: errors.is_empty(),
            errors,
            issuer: self.name.clone(),
            subject: cert.agent_id.clone(),
            serial: cert.serial,
            not_after: cert.not_after.to_string(),
        }
    }

    /// Verifies `cert` was signed by this CA's key, re-parsing the DER
    /// and checking the signature against this CA's public key.
    fn verify_signed_by_me(&self, cert_der: &[u8]) -> bool {
        let Ok((_, parsed)) = X509Certificate::from_der(cert_der) else {
            return false;
        };
        let Ok((_, issuer_parsed)) = X509Certificate::from_der(self.cert.der()) else {
            return false;
        };
        parsed
            .verify_signature(Some(issuer_parsed.public_key()))
            .is_ok()
    }

    fn verify_ca_signed_by(&self, child: &CertificateAuthority) -> bool {
        self.verify_signed_by_me(child.cert.der())
    }

    fn is_self_signed(&self) -> bool {
        let Ok((_, parsed)) = X509Certificate::from_der(self.cert.der()) else {
            return false;
        };
        parsed.verify_signature(None).is_ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn serial(&self) -> u64 {
        serial_from_der(self.cert.der())
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn certificate_pem(&self) -> String {
        self.cert.pem()
    }

    fn next_serial_number(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    // ── Persistence ──

    /// Saves `<slug>.crt` (PEM cert), `<slug>.key` (PEM PKCS#8 private
    /// key, unencrypted), `<slug>.crl` (PEM CRL), and `<slug>.revoked.json`
    /// (the revocation map, reloaded by `load()`) under `directory`.
    pub fn save(&self, directory: &Path) -> Result<()> {
        std::fs::create_dir_all(directory)?;
        let slug = slugify(&self.name);
        std::fs::write(directory.join(format!("{slug}.crt")), self.cert.pem())?;
        std::fs::write(
            directory.join(format!("{slug}.key")),
            self.key_pair.serialize_pem(),
        )?;
        std::fs::write(directory.join(format!("{slug}.crl")), self.crl_pem()?)?;

        let records: Vec<RevocationRecord> = self
            .revoked
            .iter()
            .map(|(serial, entry)| RevocationRecord {
                serial: *serial,
                at: entry
                    .at
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| entry.at.to_string()),
                reason: entry.reason.clone(),
            })
            .collect();
        std::fs::write(
            directory.join(format!("{slug}.revoked.json")),
            serde_json::to_string(&records).map_err(|e| PkiError::Parse(e.to_string()))?,
        )?;
        Ok(())
    }

    /// Loads a CA's certificate, private key, and revocation map from
    /// `directory`. The revocation map is rebuilt from `<slug>.revoked.json`
    /// (a missing file, e.g. a CA that was saved before any revocation,
    /// loads as empty); the `.crl` itself is re-derived fresh on the next
    /// `crl_pem()` call rather than re-parsed, since it carries no
    /// information `.revoked.json` doesn't already have.
    pub fn load(directory: &Path, name: &str, organization: &str) -> Result<Self> {
        let slug = slugify(name);
        let cert_pem = std::fs::read_to_string(directory.join(format!("{slug}.crt")))?;
        let key_pem = std::fs::read_to_string(directory.join(format!("{slug}.key")))?;

        let key_pair = KeyPair::from_pem(&key_pem)?;
        let cert_der = pem::parse(&cert_pem).map_err(PkiError::Pem)?;
        let (_, parsed) = X509Certificate::from_der(cert_der.contents())
            .map_err(|e| PkiError::Parse(e.to_string()))?;
        let is_root = parsed
            .basic_constraints()
            .ok()
            .flatten()
            .map(|bc| bc.value.path_len_constraint == Some(1))
            .unwrap_or(false);

        // Rebuild an rcgen::Certificate handle by re-signing is not
        // possible without the original params; store the parsed DER
        // directly via a self-signed placeholder is wrong for a loaded
        // intermediate, so we reconstruct params from the parsed cert
        // and re-derive a `Certificate` wrapper purely for PEM/DER
        // access going forward.
        let params = CertificateParams::from_ca_cert_der(cert_der.contents())?;
        let cert = params.self_signed(&key_pair)?;

        let revoked_path = directory.join(format!("{slug}.revoked.json"));
        let revoked = match std::fs::read_to_string(&revoked_path) {
            Ok(json) => {
                let records: Vec<RevocationRecord> =
                    serde_json::from_str(&json).map_err(|e| PkiError::Parse(e.to_string()))?;
                records
                    .into_iter()
                    .map(|r| {
                        let at = OffsetDateTime::parse(&r.at, &Rfc3339)
                            .unwrap_or_else(|_| OffsetDateTime::now_utc());
                        (r.serial, RevocationEntry { at, reason: r.reason })
                    })
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(PkiError::Io(e)),
        };

        Ok(CertificateAuthority {
            name: name.to_string(),
            organization: organization.to_string(),
            is_root,
            key_pair,
            cert,
            next_serial: SERIAL_FLOOR,
            revoked,
        })
    }
}

/// Verifies a full certificate chain: leaf against its immediate
/// issuer, each CA against its parent, and finally that the top of the
/// chain is self-signed. `chain` is ordered issuer-to-root.
pub fn verify_chain(cert: &AgentCertificate, chain: &[&CertificateAuthority]) -> bool {
    let Some((leaf_issuer, rest)) = chain.split_first() else {
        return false;
    };
    if !leaf_issuer.verify_cert(cert).valid {
        return false;
    }
    let mut issued_by = *leaf_issuer;
    for ca in rest {
        if !ca.verify_ca_signed_by(issued_by) {
            return false;
        }
        issued_by = ca;
    }
    issued_by.is_self_signed()
}

fn base_params(
    name: &str,
    organization: &str,
    ou: &str,
    validity_days: i64,
    is_ca: IsCa,
    key_usages: Vec<KeyUsagePurpose>,
) -> Result<CertificateParams> {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    dn.push(DnType::OrganizationName, organization);
    dn.push(DnType::OrganizationalUnitName, ou);

    let now = OffsetDateTime::now_utc();
    let mut params = CertificateParams::new(Vec::<String>::new())?;
    params.distinguished_name = dn;
    params.not_before = now;
    params.not_after = now + Duration::days(validity_days);
    params.is_ca = is_ca;
    params.key_usages = key_usages;
    Ok(params)
}

fn serial_from_der(der: &[u8]) -> u64 {
    let Ok((_, parsed)) = X509Certificate::from_der(der) else {
        return 0;
    };
    let bytes = parsed.raw_serial();
    let mut buf = [0u8; 8];
    let start = bytes.len().saturating_sub(8);
    let tail = &bytes[start..];
    buf[8 - tail.len()..].copy_from_slice(tail);
    u64::from_be_bytes(buf)
}

fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}
