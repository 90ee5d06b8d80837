//! # Fragment Digests
//!
//! BLAKE3 fingerprints used for loss detection. Every shard is hashed when
//! it is produced; a shard whose bytes no longer hash to the recorded value
//! has been tampered with (encrypted in place, truncated, bit-rotted) and is
//! treated exactly like a missing one. Key material is fingerprinted the same
//! way so a reconstructed key can be checked before access is granted.

/// Length of every digest in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// A BLAKE3 digest.
pub type Digest = [u8; DIGEST_LENGTH];

/// Compute the BLAKE3 hash of `data`.
///
/// ```
/// use rase_protocol::digest::blake3_hash;
///
/// assert_eq!(blake3_hash(b"shard"), blake3_hash(b"shard"));
/// assert_ne!(blake3_hash(b"shard"), blake3_hash(b"shard!"));
/// ```
pub fn blake3_hash(data: &[u8]) -> Digest {
    *blake3::hash(data).as_bytes()
}

/// Domain-separated digest of a key.
///
/// The context string keeps key fingerprints from ever colliding with shard
/// digests of identical bytes.
pub fn key_fingerprint(key_bytes: &[u8]) -> Digest {
    let mut hasher = blake3::Hasher::new_derive_key("rase 2026 key fingerprint v1");
    hasher.update(key_bytes);
    *hasher.finalize().as_bytes()
}

/// Compare two digests without early exit.
pub fn digests_match(a: &Digest, b: &Digest) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Short hex prefix for log lines.
pub fn short_hex(digest: &Digest) -> String {
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_fingerprint_is_domain_separated() {
        let bytes = b"0123456789abcdef";
        assert_ne!(key_fingerprint(bytes), blake3_hash(bytes));
        assert_eq!(key_fingerprint(bytes), key_fingerprint(bytes));
    }

    #[test]
    fn digests_match_detects_single_bit_flip() {
        let a = blake3_hash(b"payload");
        let mut b = a;
        assert!(digests_match(&a, &b));
        b[31] ^= 0x01;
        assert!(!digests_match(&a, &b));
    }

    #[test]
    fn short_hex_is_sixteen_chars() {
        assert_eq!(short_hex(&blake3_hash(b"x")).len(), 16);
    }
}
