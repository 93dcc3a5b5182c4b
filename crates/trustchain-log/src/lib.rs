//! # Verifiable Log (C3)
//!
//! A Certificate-Transparency-style append-only log: a binary journal of
//! signed records (`chain.log`), a Merkle tree over their canonical
//! hashes whose root is witnessed in `HEAD`, and an indexed read
//! projection (`index.db`) rebuildable from the journal alone.
//!
//! ## Storage layout (one directory per log)
//!
//! - `chain.log` — append-only binary journal.
//! - `index.db` — relational read projection, WAL-mode.
//! - `HEAD` — current Merkle root, or absent/empty for an empty log.
//!
//! ## Append pipeline
//!
//! 1. Assign `seq = current_length + 1`.
//! 2. Compute `parent_hash = current_root` (or empty if the log is empty).
//! 3. Compute the record's content id from its canonical form.
//! 4. Append the framed record to `chain.log` and flush to the OS.
//! 5. Recompute the Merkle tree incorporating the new leaf hash.
//! 6. Write the new root to `HEAD`.
//! 7. Insert the projection row into `index.db`.
//!
//! Any crash between steps is reconciled on next open: a crash before
//! step 4 leaves no visible record; after step 4, the record becomes
//! visible once `HEAD` catches up to the one append the journal is ahead
//! by; after step 6, the index rebuild on open reconciles the
//! projection. There is no half-written record visible to any caller.
//! A `HEAD` that disagrees with the journal for any other reason — i.e.
//! tampering, not an interrupted append — is left as-is on open so
//! `verify` can still report the mismatch.
//!
//! ## Concurrency
//!
//! A single mutex serialises the append pipeline; reads may proceed
//! concurrently with each other but not with an in-flight append.
//!
//! ## References
//!
//! - RFC 6962 — "Certificate Transparency"

mod head;
mod index;
mod journal;
mod record;

pub use record::{
    ConsistencyReport, FieldDiff, InclusionProofBundle, LogError, LogStatus, NewRecord, Record,
    RecordDiff, Result, ToolCount, VerifyReport,
};

use rusqlite::Connection;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use trustchain_canon::{hash_bytes, hash_canonical, hash_from_hex, hash_to_hex, Hash};
use trustchain_merkle::MerkleTree;

struct Inner {
    dir: PathBuf,
    journal: File,
    db: Connection,
    tree: MerkleTree,
    records: Vec<Record>,
}

/// The verifiable append-only log for one directory.
///
/// Thread-safe: every method takes `&self` and serialises through an
/// internal mutex, so a single `VerifiableLog` can be shared (e.g. via
/// `Arc`) across threads without an external lock.
pub struct VerifiableLog {
    inner: Mutex<Inner>,
}

impl VerifiableLog {
    /// Opens a log directory, creating it if absent. Scans `chain.log`,
    /// discarding any trailing truncated frame, rebuilds the in-memory
    /// Merkle tree, re-derives `HEAD`, and rebuilds `index.db` if its
    /// maximum `seq` does not match the number of complete records.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let journal_path = dir.join("chain.log");
        let head_path = dir.join("HEAD");
        let db_path = dir.join("index.db");

        let (leaves, records) = journal::scan(&journal_path)?;
        let computed_root = if leaves.is_empty() {
            None
        } else {
            Some(hash_to_hex(&MerkleTree::from_leaves(leaves.clone()).root()))
        };

        let stored_root = head::read(&head_path)?;
        let reconciled_root = reconcile_head(&leaves, stored_root.as_deref(), computed_root.as_deref());
        if reconciled_root.as_deref() != stored_root.as_deref() {
            tracing::warn!(
                stored = ?stored_root,
                recomputed = ?computed_root,
                "HEAD behind journal after an interrupted append, advancing it"
            );
        }
        head::write(&head_path, reconciled_root.as_deref())?;
        let mut tree = MerkleTree::from_leaves(leaves);

        let db = index::open(&db_path)?;
        let index_len = index::max_seq(&db)?;
        if index_len != records.len() as u64 {
            tracing::warn!(
                index_len,
                journal_len = records.len(),
                "index out of sync with journal, rebuilding"
            );
            index::rebuild(&db, &records)?;
        }

        let journal = journal::open_for_append(&journal_path)?;

        tracing::info!(path = %dir.display(), length = records.len(), "opened verifiable log");

        Ok(VerifiableLog {
            inner: Mutex::new(Inner {
                dir,
                journal,
                db,
                tree,
                records,
            }),
        })
    }

    /// Appends a new record, running the full append pipeline. Returns
    /// the persisted record, including its assigned `seq`, `id`, and
    /// `parent_hash`.
    pub fn append(&self, input: NewRecord) -> Result<Record> {
        let mut inner = self.inner.lock().expect("verifiable log mutex poisoned");

        let seq = inner.tree.len() as u64 + 1;
        let parent_hash = if inner.tree.is_empty() {
            String::new()
        } else {
            hash_to_hex(&inner.tree.root())
        };
        let id = compute_content_id(&input.tool_id, &input.data, &input.timestamp, &input.signature);

        let record = Record {
            id,
            seq,
            tool_id: input.tool_id,
            timestamp: input.timestamp,
            data: input.data,
            signature: input.signature,
            signature_id: input.signature_id,
            parent_hash,
            parent_signature: input.parent_signature,
            key_id: input.key_id,
            algorithm: input.algorithm,
            latency_ms: input.latency_ms,
            session_id: input.session_id,
            nonce: input.nonce,
            metadata: input.metadata,
        };

        journal::append_frame(&mut inner.journal, &record)?;

        let leaf = hash_canonical(&serde_json::to_value(&record)?);
        inner.tree.append(leaf);
        let new_root = hash_to_hex(&inner.tree.root());
        head::write(&inner.dir.join("HEAD"), Some(&new_root))?;

        index::insert(&inner.db, &record)?;
        inner.records.push(record.clone());

        tracing::debug!(seq = record.seq, id = %record.id, "appended record");
        Ok(record)
    }

    /// All records in append order.
    pub fn log(&self) -> Result<Vec<Record>> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        index::all_in_order(&inner.db)
    }

    /// All records in reverse append order (most recent first).
    pub fn log_reverse(&self) -> Result<Vec<Record>> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        index::all_reverse(&inner.db)
    }

    /// Looks up a single record by its content id.
    pub fn show(&self, content_id: &str) -> Result<Option<Record>> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        index::by_content_id(&inner.db, content_id)
    }

    /// All records for a given tool, in append order.
    pub fn blame(&self, tool: &str) -> Result<Vec<Record>> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        index::by_tool(&inner.db, tool)
    }

    /// Field-level diff between the records at two sequence numbers.
    pub fn diff(&self, seq_a: u64, seq_b: u64) -> Result<RecordDiff> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        let a = index::by_seq(&inner.db, seq_a)?
            .ok_or_else(|| LogError::NotFound(format!("seq {seq_a}")))?;
        let b = index::by_seq(&inner.db, seq_b)?
            .ok_or_else(|| LogError::NotFound(format!("seq {seq_b}")))?;
        Ok(RecordDiff {
            changes: diff_records(&a, &b),
            a,
            b,
        })
    }

    /// Chain health summary: length and HEAD root plus the aggregate
    /// stats computed over `index.db` and the on-disk sizes of
    /// `chain.log`/`index.db`, matching the original `status()`.
    pub fn status(&self) -> Result<LogStatus> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        let head = if inner.tree.is_empty() {
            None
        } else {
            let mut tree = inner.tree.clone();
            Some(hash_to_hex(&tree.root()))
        };
        let stats = index::stats(&inner.db)?;
        let tools = index::tool_counts(&inner.db)?;
        let log_size_bytes = std::fs::metadata(inner.dir.join("chain.log"))
            .map(|m| m.len())
            .unwrap_or(0);
        let index_size_bytes = std::fs::metadata(inner.dir.join("index.db"))
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(LogStatus {
            length: inner.tree.len() as u64,
            head,
            tools_count: stats.tools_count,
            first_operation: stats.first_operation,
            last_operation: stats.last_operation,
            avg_latency_ms: stats.avg_latency_ms,
            tools,
            log_size_bytes,
            index_size_bytes,
        })
    }

    /// Recomputes the Merkle root from the journal's leaf hashes and
    /// compares it to `HEAD`. Equality means the log is intact; any
    /// divergence is reported with both roots for forensic use.
    pub fn verify(&self) -> Result<VerifyReport> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        let head_path = inner.dir.join("HEAD");
        let stored_root = head::read(&head_path)?;

        let (leaves, _) = journal::scan(&inner.dir.join("chain.log"))?;
        let mut rebuilt = MerkleTree::from_leaves(leaves);
        let computed_root = if rebuilt.is_empty() {
            None
        } else {
            Some(hash_to_hex(&rebuilt.root()))
        };

        Ok(VerifyReport {
            valid: stored_root == computed_root,
            length: rebuilt.len() as u64,
            stored_root,
            computed_root,
        })
    }

    /// Generates an inclusion proof for the record with the given
    /// content id, against the log's current tree state.
    pub fn inclusion_proof(&self, content_id: &str) -> Result<Option<InclusionProofBundle>> {
        let mut inner = self.inner.lock().expect("verifiable log mutex poisoned");
        let Some(record) = index::by_content_id(&inner.db, content_id)? else {
            return Ok(None);
        };
        let leaf_index = (record.seq - 1) as usize;
        let proof = inner
            .tree
            .inclusion_proof(leaf_index)
            .map_err(|e| LogError::Corrupt(e.to_string()))?;
        let root = hash_to_hex(&inner.tree.root());
        Ok(Some(InclusionProofBundle { proof, root }))
    }

    /// Checks whether a prior `(old_length, old_root)` snapshot is a
    /// consistent prefix of the log's current state.
    pub fn consistency_proof(&self, old_length: u64, old_root_hex: &str) -> Result<ConsistencyReport> {
        let mut inner = self.inner.lock().expect("verifiable log mutex poisoned");
        let new_length = inner.tree.len() as u64;
        if old_length > new_length {
            return Err(LogError::SizeOrder {
                old: old_length,
                current: new_length,
            });
        }
        if old_length == 0 {
            return Ok(ConsistencyReport {
                consistent: true,
                old_length,
                new_length,
            });
        }
        let Some(old_root) = hash_from_hex(old_root_hex) else {
            return Ok(ConsistencyReport {
                consistent: false,
                old_length,
                new_length,
            });
        };
        let new_root = inner.tree.root();
        let proof = inner
            .tree
            .consistency_proof(old_length as usize)
            .map_err(|e| LogError::Corrupt(e.to_string()))?;
        let consistent = trustchain_merkle::MerkleTree::verify_consistency(&proof, &old_root, &new_root);
        Ok(ConsistencyReport {
            consistent,
            old_length,
            new_length,
        })
    }

    /// Forces a full rebuild of `index.db` from `chain.log`. The
    /// disaster-recovery path: delete `index.db`, call this, queries
    /// resume.
    pub fn rebuild_index(&self) -> Result<()> {
        let inner = self.inner.lock().expect("verifiable log mutex poisoned");
        index::rebuild(&inner.db, &inner.records)?;
        tracing::info!("rebuilt index from journal");
        Ok(())
    }
}

/// Reconciles a stored `HEAD` value against the root recomputed from
/// the journal on open.
///
/// The append pipeline writes the journal frame (step 4) before it
/// writes `HEAD` (step 6), and the single append mutex means at most
/// one record can ever be mid-flight this way. So if `stored` equals
/// the root over every leaf except the last, the journal is simply one
/// append ahead of a `HEAD` that never got its final write — safe to
/// advance to `computed`. Any other disagreement is not a crash window;
/// it means the journal changed out from under a `HEAD` that otherwise
/// witnessed it, which is exactly what `verify` needs to be able to
/// report, so `stored` is left untouched.
fn reconcile_head(leaves: &[Hash], stored: Option<&str>, computed: Option<&str>) -> Option<String> {
    match stored {
        None => computed.map(str::to_string),
        Some(s) if Some(s) == computed => Some(s.to_string()),
        Some(s) => {
            if !leaves.is_empty() {
                let prev = MerkleTree::from_leaves(leaves[..leaves.len() - 1].to_vec());
                let prev_root = if prev.is_empty() {
                    None
                } else {
                    Some(hash_to_hex(&prev.root()))
                };
                if prev_root.as_deref() == Some(s) {
                    return computed.map(str::to_string);
                }
            }
            Some(s.to_string())
        }
    }
}

fn compute_content_id(
    tool_id: &str,
    data: &serde_json::Value,
    timestamp: &str,
    signature: &str,
) -> String {
    let canonical_data = trustchain_canon::canonicalize(data);
    let mut buf = Vec::new();
    buf.extend_from_slice(tool_id.as_bytes());
    buf.extend_from_slice(canonical_data.as_bytes());
    buf.extend_from_slice(timestamp.as_bytes());
    buf.extend_from_slice(signature.as_bytes());
    let hash: Hash = hash_bytes(&buf);
    hash_to_hex(&hash)[..12].to_string()
}

fn diff_records(a: &Record, b: &Record) -> Vec<FieldDiff> {
    let mut changes = Vec::new();
    macro_rules! field {
        ($name:literal, $a:expr, $b:expr) => {
            if $a != $b {
                changes.push(FieldDiff {
                    field: $name.to_string(),
                    before: $a.to_string(),
                    after: $b.to_string(),
                });
            }
        };
    }
    field!("tool_id", a.tool_id, b.tool_id);
    field!("session_id", format!("{:?}", a.session_id), format!("{:?}", b.session_id));
    let a_data = trustchain_canon::canonicalize(&a.data);
    let b_data = trustchain_canon::canonicalize(&b.data);
    field!("data", a_data, b_data);
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn new_record(tool: &str, data: serde_json::Value) -> NewRecord {
        NewRecord {
            tool_id: tool.to_string(),
            data,
            timestamp: "2026-07-26T00:00:00.000000Z".to_string(),
            signature: "sig".to_string(),
            signature_id: "sig-id".to_string(),
            parent_signature: None,
            key_id: "key-1".to_string(),
            algorithm: "ed25519".to_string(),
            latency_ms: 5,
            session_id: None,
            nonce: None,
            metadata: None,
        }
    }

    #[test]
    fn genesis_commit_has_no_parent() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        let record = log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();

        assert_eq!(record.seq, 1);
        assert_eq!(record.parent_hash, "");
        let status = log.status().unwrap();
        assert_eq!(status.length, 1);
        assert!(status.head.is_some());
    }

    #[test]
    fn chain_of_three_links_parent_hashes() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();

        let r1 = log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        let head_after_1 = log.status().unwrap().head.unwrap();
        let r2 = log.append(new_record("bash", json!({"cmd": "pwd"}))).unwrap();
        let head_after_2 = log.status().unwrap().head.unwrap();
        let r3 = log.append(new_record("bash", json!({"cmd": "whoami"}))).unwrap();

        assert_eq!(r1.seq, 1);
        assert_eq!(r2.seq, 2);
        assert_eq!(r3.seq, 3);
        assert_eq!(r2.parent_hash, head_after_1);
        assert_eq!(r3.parent_hash, head_after_2);

        let report = log.verify().unwrap();
        assert!(report.valid);
        assert_eq!(report.length, 3);
    }

    #[test]
    fn crash_between_journal_write_and_head_write_is_recovered_on_reopen() {
        let dir = TempDir::new().unwrap();
        let correct_root = {
            let log = VerifiableLog::open(dir.path()).unwrap();
            log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
            log.status().unwrap().head.unwrap()
        };

        // Simulate a crash between steps 4 and 6: the journal frame landed
        // but HEAD was never advanced from the empty-log sentinel.
        std::fs::write(dir.path().join("HEAD"), "").unwrap();

        let reopened = VerifiableLog::open(dir.path()).unwrap();
        let status = reopened.status().unwrap();
        assert_eq!(status.head.as_deref(), Some(correct_root.as_str()));
        assert!(reopened.verify().unwrap().valid);
        let on_disk = std::fs::read_to_string(dir.path().join("HEAD")).unwrap();
        assert_eq!(on_disk.trim(), correct_root);
    }

    #[test]
    fn reopen_reproduces_same_root() {
        let dir = TempDir::new().unwrap();
        {
            let log = VerifiableLog::open(dir.path()).unwrap();
            log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
            log.append(new_record("bash", json!({"cmd": "pwd"}))).unwrap();
        }
        let reopened = VerifiableLog::open(dir.path()).unwrap();
        let report = reopened.verify().unwrap();
        assert!(report.valid);
        assert_eq!(report.length, 2);
    }

    #[test]
    fn tampering_journal_breaks_verification() {
        let dir = TempDir::new().unwrap();
        {
            let log = VerifiableLog::open(dir.path()).unwrap();
            log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        }

        let journal_path = dir.path().join("chain.log");
        let mut bytes = std::fs::read(&journal_path).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0xFF;
        std::fs::write(&journal_path, bytes).unwrap();

        let reopened = VerifiableLog::open(dir.path()).unwrap();
        let report = reopened.verify().unwrap();
        assert!(!report.valid);
        assert_ne!(report.stored_root, report.computed_root);
    }

    #[test]
    fn inclusion_proof_verifies_against_head() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        for i in 0..8 {
            log.append(new_record("bash", json!({"i": i}))).unwrap();
        }
        let all = log.log().unwrap();
        let target = &all[5];
        let bundle = log.inclusion_proof(&target.id).unwrap().unwrap();
        let expected_root = hash_from_hex(&bundle.root).unwrap();
        assert!(trustchain_merkle::MerkleTree::verify_inclusion(
            &bundle.proof,
            &expected_root
        ));
    }

    #[test]
    fn consistency_proof_across_growth() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        for i in 0..3 {
            log.append(new_record("bash", json!({"i": i}))).unwrap();
        }
        let snapshot = log.status().unwrap();
        for i in 3..6 {
            log.append(new_record("bash", json!({"i": i}))).unwrap();
        }
        let report = log
            .consistency_proof(snapshot.length, &snapshot.head.unwrap())
            .unwrap();
        assert!(report.consistent);
    }

    #[test]
    fn consistency_with_empty_snapshot_is_trivially_consistent() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        let report = log.consistency_proof(0, "").unwrap();
        assert!(report.consistent);
    }

    #[test]
    fn rebuild_index_restores_query_results() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        log.append(new_record("curl", json!({"url": "x"}))).unwrap();

        let before = log.log().unwrap();
        std::fs::remove_file(dir.path().join("index.db")).unwrap();
        let reopened = VerifiableLog::open(dir.path()).unwrap();
        let after = reopened.log().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn blame_filters_by_tool() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        log.append(new_record("curl", json!({"url": "x"}))).unwrap();
        log.append(new_record("bash", json!({"cmd": "pwd"}))).unwrap();

        let bash_calls = log.blame("bash").unwrap();
        assert_eq!(bash_calls.len(), 2);
    }

    #[test]
    fn diff_reports_changed_fields() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        log.append(new_record("bash", json!({"cmd": "pwd"}))).unwrap();

        let diff = log.diff(1, 2).unwrap();
        assert!(!diff.changes.is_empty());
    }

    #[test]
    fn empty_log_status_has_no_head() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        let status = log.status().unwrap();
        assert_eq!(status.length, 0);
        assert!(status.head.is_none());
        assert!(status.tools.is_empty());
        assert_eq!(status.tools_count, 0);
        assert!(status.first_operation.is_none());
        assert!(log.verify().unwrap().valid);
    }

    #[test]
    fn status_reports_aggregate_stats() {
        let dir = TempDir::new().unwrap();
        let log = VerifiableLog::open(dir.path()).unwrap();
        log.append(new_record("bash", json!({"cmd": "ls"}))).unwrap();
        log.append(new_record("curl", json!({"url": "x"}))).unwrap();
        log.append(new_record("bash", json!({"cmd": "pwd"}))).unwrap();

        let status = log.status().unwrap();
        assert_eq!(status.length, 3);
        assert_eq!(status.tools_count, 2);
        assert_eq!(status.avg_latency_ms, 5.0);
        assert_eq!(status.first_operation, status.last_operation);
        assert_eq!(
            status.tools.iter().find(|t| t.tool == "bash").map(|t| t.count),
            Some(2)
        );
        assert_eq!(
            status.tools.iter().find(|t| t.tool == "curl").map(|t| t.count),
            Some(1)
        );
        assert!(status.log_size_bytes > 0);
        assert!(status.index_size_bytes > 0);
    }
}
