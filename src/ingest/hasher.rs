//! Credential digests
//!
//! The store never sees raw API keys. The recorder is handed a `KeyHasher`
//! and persists only its output.

use sha2::{Digest, Sha256};

/// Irreversible, fixed-length digest of a credential.
///
/// Implementations must map the empty string to the empty string.
pub trait KeyHasher: Send + Sync {
    fn hash(&self, secret: &str) -> String;
}

/// Lowercase hex SHA-256 (64 characters)
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256KeyHasher;

impl KeyHasher for Sha256KeyHasher {
    fn hash(&self, secret: &str) -> String {
        if secret.is_empty() {
            return String::new();
        }
        format!("{:x}", Sha256::digest(secret.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_digest() {
        assert_eq!(
            Sha256KeyHasher.hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_secret_maps_to_empty() {
        assert_eq!(Sha256KeyHasher.hash(""), "");
    }

    #[test]
    fn test_digest_is_fixed_length_and_not_raw() {
        let key = "sk-1234567890abcdef";
        let digest = Sha256KeyHasher.hash(key);

        assert_eq!(digest.len(), 64);
        assert_ne!(digest, key);
        assert!(!digest.contains(key));
        assert_eq!(digest, Sha256KeyHasher.hash(key));
    }
}
