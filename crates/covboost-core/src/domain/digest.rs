//! SHA-256 content digests for source files and candidates.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hex digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_content_sensitive() {
        assert_ne!(sha256_hex(b"fn a() {}"), sha256_hex(b"fn a() {} "));
    }
}
