use arbiter_protocol::{AuthorityError, ContentHash, HashAlgorithm};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_string;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes canonical serializations with one fixed algorithm.
///
/// Hashes from different algorithms have different lengths (64 vs 16 hex
/// chars) and are never compared with each other; every consumer of a
/// chronicle uses the hasher the chronicle was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn sha256() -> Self {
        Self::new(HashAlgorithm::Sha256)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> ContentHash {
        match self.algorithm {
            HashAlgorithm::Sha256 => ContentHash::from_hex(sha256_bytes(bytes)),
            HashAlgorithm::Fnv1a => ContentHash::from_hex(format!("{:016x}", fnv1a(bytes))),
        }
    }

    pub fn hash_value(&self, value: &Value) -> ContentHash {
        self.hash_bytes(canonical_string(value).as_bytes())
    }

    pub fn hash_serializable<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<ContentHash, AuthorityError> {
        let value = serde_json::to_value(value)?;
        Ok(self.hash_value(&value))
    }
}

fn sha256_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_is_64_lowercase_hex() {
        let hash = ContentHasher::sha256().hash_value(&json!({"a": 1}));
        assert_eq!(hash.as_str().len(), 64);
        assert!(
            hash.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn sha256_matches_known_vector() {
        let hash = ContentHasher::sha256().hash_bytes(b"abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn key_order_does_not_change_the_hash() {
        for hasher in [
            ContentHasher::sha256(),
            ContentHasher::new(HashAlgorithm::Fnv1a),
        ] {
            let a = json!({"text": "hi", "meta": {"x": 1, "y": [1, 2]}});
            let b = json!({"meta": {"y": [1, 2], "x": 1}, "text": "hi"});
            assert_eq!(hasher.hash_value(&a), hasher.hash_value(&a));
            assert_eq!(hasher.hash_value(&a), hasher.hash_value(&b));
            assert_ne!(hasher.hash_value(&a), hasher.hash_value(&json!({"text": "ho"})));
        }
    }

    #[test]
    fn placeholder_hash_is_distinguishable_by_length() {
        let fnv = ContentHasher::new(HashAlgorithm::Fnv1a).hash_bytes(b"");
        assert_eq!(fnv.as_str(), "cbf29ce484222325");
    }
}
