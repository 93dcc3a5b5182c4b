//! Source-code hashing for tool certificates.

use sha2::{Digest, Sha256};

/// Normalizes source text (CRLF -> LF, trim leading/trailing
/// whitespace) and hashes it with SHA-256, returning lower-case hex.
/// This is the integrity check: any edit to a tool's source changes
/// this hash, which the registry compares against a tool's
/// certificate on every call.
pub fn hash_source(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n");
    let trimmed = normalized.trim();
    let mut hasher = Sha256::new();
    hasher.update(trimmed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fallback identity hash for tools whose source text is unobtainable
/// (native implementations, FFI shims). Weaker than [`hash_source`]:
/// it only detects that the tool was renamed or moved, not that its
/// body changed.
pub fn hash_qualified_identity(module: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(module.as_bytes());
    hasher.update(b".");
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}
