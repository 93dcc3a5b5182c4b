//! Custom X.509 extension OIDs carrying AI agent metadata.
//!
//! All five live under one private-enterprise OID arc:
//! `1.3.6.1.4.1.99999.{1..5}`. Values are non-critical
//! `UnrecognizedExtension`s so a generic X.509 verifier that doesn't
//! understand them still accepts the certificate.
//!
//! Two implementations that need to interoperate must agree on this
//! exact arc — it is not a real IANA-registered Private Enterprise
//! Number.

const PEN: u64 = 99999;

pub const OID_MODEL_HASH: [u64; 8] = [1, 3, 6, 1, 4, 1, PEN, 1];
pub const OID_PROMPT_HASH: [u64; 8] = [1, 3, 6, 1, 4, 1, PEN, 2];
pub const OID_TOOL_VERSIONS: [u64; 8] = [1, 3, 6, 1, 4, 1, PEN, 3];
pub const OID_CAPABILITIES: [u64; 8] = [1, 3, 6, 1, 4, 1, PEN, 4];
pub const OID_PARENT_AGENT_SERIAL: [u64; 8] = [1, 3, 6, 1, 4, 1, PEN, 5];
