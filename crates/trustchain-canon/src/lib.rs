//! # RFC 8785 JSON Canonicalization Scheme (JCS)
//!
//! Deterministic byte representation of JSON values, used throughout
//! TrustChain wherever a value needs to be hashed or signed. Every
//! attestation, Merkle leaf, and certificate extension payload is hashed
//! over its canonical form so that two semantically identical values never
//! produce different signatures.
//!
//! ## Threat Model
//!
//! Canonicalization defends against:
//!
//! - **Key reordering**: JSON objects have no inherent key order, so an
//!   attacker could otherwise craft a semantically identical document that
//!   hashes differently.
//! - **Whitespace manipulation**: insignificant whitespace must not affect
//!   the hash.
//! - **Number representation**: `1.0`, `1.00`, and `1` are equivalent but
//!   byte-different without normalization.
//! - **Unicode escaping**: `"A"` and `"A"` are equivalent but
//!   byte-different.
//!
//! ## RFC 8785 Summary
//!
//! 1. Object keys sorted lexicographically by UTF-16 code units.
//! 2. Numbers serialized in minimal representation.
//! 3. Strings use minimal escaping.
//! 4. No insignificant whitespace.
//! 5. Arrays keep their original element order.
//!
//! ## References
//!
//! - RFC 8785 — "JSON Canonicalization Scheme (JCS)"
//!   <https://www.rfc-editor.org/rfc/rfc8785>
//! - RFC 7493 — "I-JSON"
//!
//! ## Example
//!
//! ```rust
//! use trustchain_canon::{canonicalize, hash_canonical};
//! use serde_json::json;
//!
//! let obj1 = json!({"b": 1, "a": 2});
//! let obj2 = json!({"a": 2, "b": 1});
//!
//! assert_eq!(canonicalize(&obj1), canonicalize(&obj2));
//! assert_eq!(canonicalize(&obj1), r#"{"a":2,"b":1}"#);
//! assert_eq!(hash_canonical(&obj1), hash_canonical(&obj2));
//! ```

use sha2::{Digest, Sha256};

/// Size in bytes of a SHA-256 hash.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 hash, used as the unit of identity across the chain,
/// Merkle tree, and certificate layers.
pub type Hash = [u8; HASH_SIZE];

/// Canonicalizes a JSON value according to RFC 8785.
///
/// Semantically identical inputs always produce byte-identical outputs:
/// object keys sorted by UTF-16 code unit, numbers in minimal form,
/// strings minimally escaped, no insignificant whitespace.
///
/// # Example
///
/// ```rust
/// use trustchain_canon::canonicalize;
/// use serde_json::json;
///
/// let value = json!({"zulu": true, "alpha": [3, 2, 1], "bravo": "test"});
/// assert_eq!(canonicalize(&value), r#"{"alpha":[3,2,1],"bravo":"test","zulu":true}"#);
/// ```
pub fn canonicalize(value: &serde_json::Value) -> String {
    canonicalize_value(value)
}

/// Computes the SHA-256 hash of a value's canonical JSON representation.
///
/// This is the primary hashing entry point used by the signer, the
/// Merkle tree, and the PKI layer's certificate extensions.
pub fn hash_canonical(value: &serde_json::Value) -> Hash {
    let canonical = canonicalize(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

/// Computes the SHA-256 hash of raw bytes.
///
/// Used where the input is not itself a JSON value (source code text,
/// concatenated attestation fields, PEM-encoded certificates).
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Renders a hash as lowercase hex.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parses a lowercase hex string back into a hash.
pub fn hash_from_hex(s: &str) -> Option<Hash> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

fn canonicalize_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        serde_json::Value::Number(n) => canonicalize_number(n),
        serde_json::Value::String(s) => canonicalize_string(s),
        serde_json::Value::Array(arr) => canonicalize_array(arr),
        serde_json::Value::Object(obj) => canonicalize_object(obj),
    }
}

/// Canonicalizes a JSON number according to RFC 8785: no leading zeros
/// (except "0" itself), no trailing zeros after the decimal point.
fn canonicalize_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
            return (f as i64).to_string();
        }
        format_float(f)
    } else {
        n.to_string()
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() || f.is_infinite() {
        // Not valid JSON; serde_json should never hand us one of these.
        return "null".to_string();
    }
    format!("{}", f)
}

/// Canonicalizes a JSON string: escapes `"`, `\`, and control characters
/// (0x00-0x1F); leaves `/` and all other Unicode characters untouched.
fn canonicalize_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');

    for ch in s.chars() {
        match ch {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\x08' => result.push_str("\\b"),
            '\x0C' => result.push_str("\\f"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }

    result.push('"');
    result
}

fn canonicalize_array(arr: &[serde_json::Value]) -> String {
    let elements: Vec<String> = arr.iter().map(canonicalize_value).collect();
    format!("[{}]", elements.join(","))
}

/// Canonicalizes a JSON object. Keys are sorted by UTF-16 code unit, the
/// step that makes the whole scheme deterministic regardless of insertion
/// order.
fn canonicalize_object(obj: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut entries: Vec<(&String, &serde_json::Value)> = obj.iter().collect();
    entries.sort_by(|(a, _), (b, _)| compare_utf16(a, b));

    let pairs: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{}:{}", canonicalize_string(k), canonicalize_value(v)))
        .collect();

    format!("{{{}}}", pairs.join(","))
}

/// Compares two strings by UTF-16 code unit sequence, per RFC 8785 §3.2.3.
fn compare_utf16(a: &str, b: &str) -> std::cmp::Ordering {
    let a_utf16: Vec<u16> = a.encode_utf16().collect();
    let b_utf16: Vec<u16> = b.encode_utf16().collect();
    a_utf16.cmp(&b_utf16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalize_null() {
        assert_eq!(canonicalize(&json!(null)), "null");
    }

    #[test]
    fn canonicalize_bool() {
        assert_eq!(canonicalize(&json!(true)), "true");
        assert_eq!(canonicalize(&json!(false)), "false");
    }

    #[test]
    fn canonicalize_numbers() {
        assert_eq!(canonicalize(&json!(0)), "0");
        assert_eq!(canonicalize(&json!(1)), "1");
        assert_eq!(canonicalize(&json!(-1)), "-1");
        assert_eq!(canonicalize(&json!(123456789)), "123456789");
    }

    #[test]
    fn canonicalize_strings() {
        assert_eq!(canonicalize(&json!("")), r#""""#);
        assert_eq!(canonicalize(&json!("hello")), r#""hello""#);
        assert_eq!(canonicalize(&json!("he\"llo")), r#""he\"llo""#);
        assert_eq!(canonicalize(&json!("he\\llo")), r#""he\\llo""#);
        assert_eq!(canonicalize(&json!("line\nbreak")), r#""line\nbreak""#);
    }

    #[test]
    fn canonicalize_array() {
        assert_eq!(canonicalize(&json!([])), "[]");
        assert_eq!(canonicalize(&json!([1, 2, 3])), "[1,2,3]");
        assert_eq!(canonicalize(&json!(["a", "b"])), r#"["a","b"]"#);
    }

    #[test]
    fn canonicalize_object_key_sorting() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonicalize(&obj), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn canonicalize_deterministic_regardless_of_insertion_order() {
        let obj1 = json!({"b": 1, "a": 2});
        let obj2 = json!({"a": 2, "b": 1});
        assert_eq!(canonicalize(&obj1), canonicalize(&obj2));
    }

    #[test]
    fn canonicalize_nested() {
        let obj = json!({"outer": {"z": 1, "a": 2}});
        assert_eq!(canonicalize(&obj), r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn hash_deterministic() {
        let obj1 = json!({"b": 1, "a": 2});
        let obj2 = json!({"a": 2, "b": 1});
        assert_eq!(hash_canonical(&obj1), hash_canonical(&obj2));
    }

    #[test]
    fn hash_different_values_differ() {
        let obj1 = json!({"a": 1});
        let obj2 = json!({"a": 2});
        assert_ne!(hash_canonical(&obj1), hash_canonical(&obj2));
    }

    #[test]
    fn utf16_sorting() {
        assert_eq!(compare_utf16("a", "b"), std::cmp::Ordering::Less);
        assert_eq!(compare_utf16("b", "a"), std::cmp::Ordering::Greater);
        assert_eq!(compare_utf16("a", "a"), std::cmp::Ordering::Equal);
    }

    #[test]
    fn hash_hex_roundtrip() {
        let hash = hash_bytes(b"trustchain");
        let hex_str = hash_to_hex(&hash);
        assert_eq!(hash_from_hex(&hex_str), Some(hash));
    }
}
