//! The nonce-replay contract.
//!
//! The engine treats nonce storage as an external collaborator: it
//! only requires that implementations be thread-safe and answer
//! whether a nonce has been seen before. Production deployments are
//! expected to back this with Redis or similar; [`InMemoryNonceStore`]
//! is provided for tests and single-process use.

use std::collections::HashSet;
use std::sync::Mutex;

pub trait NonceStore: Send + Sync {
    /// Records `nonce` as seen. Returns `true` if this is the first
    /// time it has been observed, `false` if it is a replay.
    fn check_and_record(&self, nonce: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    seen: Mutex<HashSet<String>>,
}

impl NonceStore for InMemoryNonceStore {
    fn check_and_record(&self, nonce: &str) -> bool {
        self.seen.lock().unwrap().insert(nonce.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_use_of_a_nonce_is_a_replay() {
        let store = InMemoryNonceStore::default();
        assert!(store.check_and_record("abc"));
        assert!(!store.check_and_record("abc"));
    }
}
