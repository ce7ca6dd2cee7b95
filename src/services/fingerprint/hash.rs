use sha2::{Digest, Sha256};

use super::normalize;

pub fn hash_norm(norm: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(norm.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Content fingerprint of a source text.
pub fn fingerprint(text: &str) -> String {
    hash_norm(&normalize::normalize(text))
}
