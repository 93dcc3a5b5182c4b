//! Git-like façade over the verifiable log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use trustchain_log::{
    ConsistencyReport, InclusionProofBundle, LogStatus, NewRecord, Record, RecordDiff,
    VerifiableLog, VerifyReport,
};

use crate::error::{ChainError, Result};
use crate::parent::ParentRef;

/// Fields supplied by a caller committing a new record. Mirrors
/// [`NewRecord`] but swaps `parent_signature: Option<String>` for a
/// [`ParentRef`] so the store can tell "auto-chain" apart from "no
/// parent, on purpose".
#[derive(Debug, Clone)]
pub struct CommitInput {
    pub tool_id: String,
    pub data: serde_json::Value,
    pub timestamp: String,
    pub signature: String,
    pub signature_id: String,
    pub parent_signature: ParentRef,
    pub key_id: String,
    pub algorithm: String,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub nonce: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A full export of the chain's current state, as produced by
/// [`ChainStore::export`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExport {
    pub head: Option<String>,
    pub status: LogStatus,
    pub chain: Vec<Record>,
    pub exported_at: String,
}

/// Git-like façade: `commit`/`log`/`blame`/`diff`/`verify`/`status`
/// over a [`VerifiableLog`], plus HEAD-signature auto-chaining and
/// per-session refs.
///
/// "HEAD" here means two different things at two layers and the
/// distinction matters: the underlying log's HEAD is the Merkle root
/// after the last append (structural integrity); this façade's notion
/// of "parent signature" is the *signature* of the last commit
/// (attestation lineage). `head()` exposes the former; auto-chaining
/// uses the latter.
pub struct ChainStore {
    log: VerifiableLog,
    refs_dir: Option<PathBuf>,
    auto_chain: bool,
    last_signature: Mutex<Option<String>>,
}

impl ChainStore {
    /// Opens (creating if absent) a chain store rooted at `dir`. Session
    /// refs are kept under `dir/refs/sessions/`.
    pub fn open<P: AsRef<Path>>(dir: P, auto_chain: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let log = VerifiableLog::open(dir)?;
        let refs_dir = dir.join("refs").join("sessions");
        fs::create_dir_all(&refs_dir)?;

        let last_signature = log.log_reverse()?.into_iter().next().map(|r| r.signature);

        Ok(Self {
            log,
            refs_dir: Some(refs_dir),
            auto_chain,
            last_signature: Mutex::new(last_signature),
        })
    }

    /// An in-memory store with no session-ref persistence, for tests
    /// and scratch chains that never need to survive a restart.
    pub fn open_ephemeral<P: AsRef<Path>>(dir: P, auto_chain: bool) -> Result<Self> {
        let log = VerifiableLog::open(dir)?;
        Ok(Self {
            log,
            refs_dir: None,
            auto_chain,
            last_signature: Mutex::new(None),
        })
    }

    pub fn commit(&self, input: CommitInput) -> Result<Record> {
        let current_head = self.last_signature.lock().unwrap().clone();
        let parent_signature = input.parent_signature.resolve(self.auto_chain, current_head.as_deref());

        let record = self.log.append(NewRecord {
            tool_id: input.tool_id,
            data: input.data,
            timestamp: input.timestamp,
            signature: input.signature,
            signature_id: input.signature_id,
            parent_signature,
            key_id: input.key_id,
            algorithm: input.algorithm,
            latency_ms: input.latency_ms,
            session_id: input.session_id.clone(),
            nonce: input.nonce,
            metadata: input.metadata,
        })?;

        *self.last_signature.lock().unwrap() = Some(record.signature.clone());

        if let Some(session_id) = &input.session_id {
            self.save_session_ref(session_id, &record.signature)?;
        }

        debug!(seq = record.seq, tool = %record.tool_id, "committed record");
        Ok(record)
    }

    /// The log's current Merkle root, or `None` for an empty log.
    pub fn head(&self) -> Result<Option<String>> {
        Ok(self.log.status()?.head)
    }

    /// The signature the next auto-chained commit would use as its
    /// parent, i.e. the signature of the most recently committed
    /// record.
    pub fn parent_signature(&self) -> Option<String> {
        self.last_signature.lock().unwrap().clone()
    }

    pub fn log_entries(&self) -> Result<Vec<Record>> {
        Ok(self.log.log()?)
    }

    pub fn log_reverse(&self) -> Result<Vec<Record>> {
        Ok(self.log.log_reverse()?)
    }

    pub fn show(&self, content_id: &str) -> Result<Record> {
        self.log
            .show(content_id)?
            .ok_or_else(|| ChainError::NotFound(content_id.to_string()))
    }

    pub fn blame(&self, tool: &str) -> Result<Vec<Record>> {
        Ok(self.log.blame(tool)?)
    }

    pub fn diff(&self, seq_a: u64, seq_b: u64) -> Result<RecordDiff> {
        Ok(self.log.diff(seq_a, seq_b)?)
    }

    pub fn status(&self) -> Result<LogStatus> {
        Ok(self.log.status()?)
    }

    pub fn verify(&self) -> Result<VerifyReport> {
        Ok(self.log.verify()?)
    }

    pub fn inclusion_proof(&self, content_id: &str) -> Result<Option<InclusionProofBundle>> {
        Ok(self.log.inclusion_proof(content_id)?)
    }

    pub fn consistency_proof(&self, old_length: u64, old_root_hex: &str) -> Result<ConsistencyReport> {
        Ok(self.log.consistency_proof(old_length, old_root_hex)?)
    }

    /// Serializes the entire chain plus its current status to a JSON
    /// string, writing it to `path` if one is given.
    pub fn export(&self, path: Option<&Path>) -> Result<String> {
        let export = ChainExport {
            head: self.head()?,
            status: self.status()?,
            chain: self.log_entries()?,
            exported_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&export)?;
        if let Some(path) = path {
            fs::write(path, &json)?;
        }
        Ok(json)
    }

    /// Every session id with a ref on disk, sorted.
    pub fn sessions(&self) -> Vec<String> {
        let Some(refs_dir) = &self.refs_dir else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(refs_dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        ids.sort();
        ids
    }

    /// The signature a given session's ref currently points to.
    pub fn session_head(&self, session_id: &str) -> Option<String> {
        let refs_dir = self.refs_dir.as_ref()?;
        let path = refs_dir.join(Self::safe_ref_name(session_id));
        fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }

    fn save_session_ref(&self, session_id: &str, signature: &str) -> Result<()> {
        let Some(refs_dir) = &self.refs_dir else {
            return Ok(());
        };
        let path = refs_dir.join(Self::safe_ref_name(session_id));
        fs::write(path, signature)?;
        Ok(())
    }

    fn safe_ref_name(session_id: &str) -> String {
        format!("{}.ref", session_id.replace(['/', '\\'], "_"))
    }
}
