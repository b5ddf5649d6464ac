//! Request identity hashing.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request identity.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", "https://app.test/");
        let hash2 = compute_cache_key("GET", "https://app.test/");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_cache_key("GET", "https://app.test/");
        let head = compute_cache_key("HEAD", "https://app.test/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_hash_separator_prevents_ambiguity() {
        let a = compute_cache_key("GET", "Xhttps://app.test/");
        let b = compute_cache_key("GETX", "https://app.test/");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", "https://app.test/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
