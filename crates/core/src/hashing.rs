//! SHA-256 helpers and the interactive-input digest.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the input digest.
pub const INPUT_HASH_LEN: usize = 8;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Canonicalise an interactive payload so cosmetic differences do not split
/// the cache: null fields are dropped and strings are trimmed. Object keys
/// come out sorted because `serde_json::Map` is ordered.
pub fn normalize_input(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), normalize_input(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(normalize_input).collect()),
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// Short digest distinguishing interactive requests with different input.
pub fn input_hash(input: &serde_json::Value) -> String {
    let canonical = normalize_input(input).to_string();
    let mut hex = sha256_hex(canonical.as_bytes());
    hex.truncate(INPUT_HASH_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn input_hash_is_eight_hex_chars() {
        let h = input_hash(&json!({"dream": "falling"}));
        assert_eq!(h.len(), INPUT_HASH_LEN);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_order_whitespace_and_nulls_do_not_matter() {
        let a = json!({"card": "tower", "question": "  work?  ", "extra": null});
        let b = json!({"question": "work?", "card": "tower"});
        assert_eq!(input_hash(&a), input_hash(&b));
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(
            input_hash(&json!({"card": "tower"})),
            input_hash(&json!({"card": "star"}))
        );
    }
}
