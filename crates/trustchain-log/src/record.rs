//! Record types for the verifiable log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A signed record as persisted in the log — the leaf of the chain.
///
/// `id` is a pure function of `tool_id`, `data`, `timestamp`, and
/// `signature`; `seq` equals the record's 1-based position in the log;
/// `parent_hash` equals the Merkle root after the previous record was
/// appended, or is empty iff `seq == 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// First 12 hex chars of SHA-256 over `tool_id || canonical(data) ||
    /// timestamp || signature`.
    pub id: String,
    pub seq: u64,
    pub tool_id: String,
    /// UTC timestamp, ISO-8601 with microsecond or better precision.
    pub timestamp: String,
    pub data: serde_json::Value,
    /// Base64-encoded Ed25519 signature.
    pub signature: String,
    pub signature_id: String,
    /// Previous Merkle root, or empty for the genesis record.
    pub parent_hash: String,
    /// The signature this record's chain considers its predecessor, or
    /// `None` if this record starts a new chain of trust. Distinct from
    /// `parent_hash`: this is caller-supplied commit-level lineage
    /// (mirroring the signer's own attestation chain), while
    /// `parent_hash` is the log's own structural Merkle chaining.
    pub parent_signature: Option<String>,
    pub key_id: String,
    pub algorithm: String,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub nonce: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields supplied by the caller when appending a new record. `seq`,
/// `id`, and `parent_hash` are assigned by the log itself.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub tool_id: String,
    pub data: serde_json::Value,
    pub timestamp: String,
    pub signature: String,
    pub signature_id: String,
    pub parent_signature: Option<String>,
    pub key_id: String,
    pub algorithm: String,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub nonce: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("journal corrupt: {0}")]
    Corrupt(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("old length {old} exceeds current log length {current}")]
    SizeOrder { old: u64, current: u64 },
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Report produced by [`crate::VerifiableLog::verify`].
///
/// `CHAIN_BROKEN` from the wire-visible error taxonomy corresponds to
/// `valid == false` here, with both roots reported for forensic use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub valid: bool,
    pub length: u64,
    pub stored_root: Option<String>,
    pub computed_root: Option<String>,
}

/// Snapshot of a log's current state, matching the original
/// `_init_sqlite`-backed `status()`: length and HEAD plus the aggregate
/// health summary (per-tool counts, timestamp span, average latency,
/// on-disk sizes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStatus {
    pub length: u64,
    pub head: Option<String>,
    pub tools_count: u64,
    pub first_operation: Option<String>,
    pub last_operation: Option<String>,
    pub avg_latency_ms: f64,
    pub tools: Vec<ToolCount>,
    pub log_size_bytes: u64,
    pub index_size_bytes: u64,
}

/// Per-tool call count, ordered highest-first, as in `status()`'s
/// `GROUP BY tool ORDER BY cnt DESC`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCount {
    pub tool: String,
    pub count: u64,
}

/// A single field-level difference between two records, used by
/// [`crate::VerifiableLog::diff`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDiff {
    pub a: Record,
    pub b: Record,
    pub changes: Vec<FieldDiff>,
}

/// An inclusion proof bundled with the tree state it was generated
/// against, suitable for handing to an external verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionProofBundle {
    pub proof: trustchain_merkle::InclusionProof,
    pub root: String,
}

/// Result of checking a prior `(length, root)` snapshot against the
/// log's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub consistent: bool,
    pub old_length: u64,
    pub new_length: u64,
}
