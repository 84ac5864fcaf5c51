//! Shared SHA-256 hex digest utility.
//!
//! Used by the fingerprint and MinHash modules to avoid duplicating the
//! same hash computation.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Compute a SHA-256 digest and return the first 8 bytes as a `u64`.
///
/// Used as the deterministic base hash for MinHash shingles; the value must
/// be stable across processes because signatures are persisted.
pub fn sha256_u64(data: &[u8]) -> u64 {
    let hash = Sha256::digest(data);
    u64::from_le_bytes(hash[..8].try_into().expect("digest is at least 8 bytes"))
}

#[cfg(test)]
mod tests {
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
    fn consistent_output() {
        let data = b"hello world";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn u64_variant_is_stable() {
        assert_eq!(sha256_u64(b"shingle"), sha256_u64(b"shingle"));
        assert_ne!(sha256_u64(b"shingle"), sha256_u64(b"shingles"));
    }
}
