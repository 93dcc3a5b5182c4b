//! # Chain Store Façade (C4)
//!
//! A thin, git-flavored API over the [verifiable log][trustchain_log]:
//! `commit`/`log`/`blame`/`diff`/`verify`/`status`/`export`, HEAD
//! tracking, and per-session refs recording each session's most recent
//! commit so a caller can reconstruct one session's history without
//! scanning the whole chain.
//!
//! Auto-chaining links successive commits by signature: when a caller
//! omits `parent_signature`, the store supplies the previous commit's
//! signature automatically, mirroring how each record's own
//! `parent_hash` links to the log's Merkle root. See [`ParentRef`] for
//! the three-way distinction between "auto", "explicit", and
//! "deliberately none".

mod error;
mod parent;
mod store;

pub use error::{ChainError, Result};
pub use parent::ParentRef;
pub use store::{ChainExport, ChainStore, CommitInput};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn input(tool: &str, parent: ParentRef, session: Option<&str>) -> CommitInput {
        CommitInput {
            tool_id: tool.to_string(),
            data: serde_json::json!({"n": 1}),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            signature: format!("sig-{tool}"),
            signature_id: format!("sid-{tool}"),
            parent_signature: parent,
            key_id: "key-1".to_string(),
            algorithm: "Ed25519".to_string(),
            latency_ms: 5,
            session_id: session.map(|s| s.to_string()),
            nonce: None,
            metadata: None,
        }
    }

    #[test]
    fn auto_chain_links_successive_commits() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), true).unwrap();

        let first = store.commit(input("bash", ParentRef::Auto, None)).unwrap();
        assert_eq!(first.parent_signature, None);

        let second = store.commit(input("grep", ParentRef::Auto, None)).unwrap();
        assert_eq!(second.parent_signature, Some(first.signature.clone()));

        let report = store.verify().unwrap();
        assert!(report.valid);
    }

    #[test]
    fn explicit_none_breaks_the_chain_deliberately() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), true).unwrap();

        store.commit(input("bash", ParentRef::Auto, None)).unwrap();
        let genesis = store.commit(input("grep", ParentRef::None, None)).unwrap();
        assert_eq!(genesis.parent_signature, None);
    }

    #[test]
    fn explicit_parent_overrides_auto_chain() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), true).unwrap();

        store.commit(input("bash", ParentRef::Auto, None)).unwrap();
        let linked = store
            .commit(input("grep", ParentRef::Explicit("custom-sig".to_string()), None))
            .unwrap();
        assert_eq!(linked.parent_signature, Some("custom-sig".to_string()));
    }

    #[test]
    fn auto_chain_disabled_never_links() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), false).unwrap();

        store.commit(input("bash", ParentRef::Auto, None)).unwrap();
        let second = store.commit(input("grep", ParentRef::Auto, None)).unwrap();
        assert_eq!(second.parent_signature, None);
    }

    #[test]
    fn session_refs_track_independent_histories() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), true).unwrap();

        store.commit(input("bash", ParentRef::Auto, Some("session-a"))).unwrap();
        let b1 = store.commit(input("grep", ParentRef::Auto, Some("session-b"))).unwrap();
        let a2 = store.commit(input("ls", ParentRef::Auto, Some("session-a"))).unwrap();

        assert_eq!(store.session_head("session-a"), Some(a2.signature));
        assert_eq!(store.session_head("session-b"), Some(b1.signature));
        assert_eq!(store.sessions(), vec!["session-a".to_string(), "session-b".to_string()]);
    }

    #[test]
    fn blame_and_diff_delegate_to_the_log() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), true).unwrap();

        store.commit(input("bash", ParentRef::Auto, None)).unwrap();
        store.commit(input("grep", ParentRef::Auto, None)).unwrap();
        store.commit(input("bash", ParentRef::Auto, None)).unwrap();

        let blamed = store.blame("bash").unwrap();
        assert_eq!(blamed.len(), 2);

        let diff = store.diff(1, 2).unwrap();
        assert_eq!(diff.a.seq, 1);
        assert_eq!(diff.b.seq, 2);
    }

    #[test]
    fn export_round_trips_through_json() {
        let dir = TempDir::new().unwrap();
        let store = ChainStore::open(dir.path(), true).unwrap();
        store.commit(input("bash", ParentRef::Auto, None)).unwrap();

        let json = store.export(None).unwrap();
        let parsed: ChainExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chain.len(), 1);
        assert_eq!(parsed.head, store.head().unwrap());
        assert!(!parsed.exported_at.is_empty());
    }

    #[test]
    fn reopening_a_store_recovers_parent_signature() {
        let dir = TempDir::new().unwrap();
        let last_sig;
        {
            let store = ChainStore::open(dir.path(), true).unwrap();
            let record = store.commit(input("bash", ParentRef::Auto, None)).unwrap();
            last_sig = record.signature;
        }

        let reopened = ChainStore::open(dir.path(), true).unwrap();
        assert_eq!(reopened.parent_signature(), Some(last_sig));
    }
}
