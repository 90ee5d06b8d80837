//! Shards and shard sets.
//!
//! A [`Shard`] is one fragment of an encoded payload. Once written it is
//! either *present* (bytes available) or *missing* (only the index survives).
//! The digest taken at encode time stays with the shard either way, which is
//! what lets a later read tell an intact shard from a tampered one.

use serde::{Deserialize, Serialize};

use crate::digest::{blake3_hash, digests_match, Digest};

/// One fragment of an erasure-coded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    /// Position in the generator: `0..K` data, `K..N` parity.
    pub index: usize,
    /// Shard bytes, `None` once the shard is lost.
    pub bytes: Option<Vec<u8>>,
    /// BLAKE3 digest of the bytes as produced by the encoder.
    pub digest: Digest,
}

impl Shard {
    /// Wrap freshly encoded bytes, recording their digest.
    pub fn new(index: usize, bytes: Vec<u8>) -> Self {
        let digest = blake3_hash(&bytes);
        Self {
            index,
            bytes: Some(bytes),
            digest,
        }
    }

    /// `true` if bytes are held, whether or not they are intact.
    pub fn is_present(&self) -> bool {
        self.bytes.is_some()
    }

    /// `true` if bytes are held and still match the recorded digest.
    pub fn is_intact(&self) -> bool {
        match &self.bytes {
            Some(bytes) => digests_match(&blake3_hash(bytes), &self.digest),
            None => false,
        }
    }

    /// `true` if bytes are held but no longer match the digest.
    pub fn is_corrupt(&self) -> bool {
        self.is_present() && !self.is_intact()
    }

    /// Drop the shard's bytes, keeping only its index and digest.
    pub fn mark_missing(&mut self) {
        self.bytes = None;
    }
}

/// The complete set of shards for one payload, plus the geometry needed to
/// decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSet {
    /// `K`.
    pub data_shards: usize,
    /// `N - K`.
    pub parity_shards: usize,
    /// Bytes per shard, `⌈payload_len / K⌉`.
    pub shard_size: usize,
    /// Original payload length; decoding truncates the zero padding to this.
    pub payload_len: usize,
    /// All `N` shards, ordered by index.
    pub shards: Vec<Shard>,
}

impl ShardSet {
    /// `N`.
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Number of shards that are present and intact.
    pub fn intact_count(&self) -> usize {
        self.shards.iter().filter(|s| s.is_intact()).count()
    }

    /// Number of shards holding bytes, intact or not.
    pub fn present_count(&self) -> usize {
        self.shards.iter().filter(|s| s.is_present()).count()
    }

    /// Indices of shards whose bytes fail digest verification.
    pub fn corrupt_indices(&self) -> Vec<usize> {
        self.shards
            .iter()
            .filter(|s| s.is_corrupt())
            .map(|s| s.index)
            .collect()
    }

    /// Indices of shards that are present and intact.
    pub fn intact_indices(&self) -> Vec<usize> {
        self.shards
            .iter()
            .filter(|s| s.is_intact())
            .map(|s| s.index)
            .collect()
    }

    /// `true` if at least `K` shards are intact.
    pub fn is_recoverable(&self) -> bool {
        self.intact_count() >= self.data_shards
    }

    /// Per-index view for the decoder: intact bytes or `None`.
    ///
    /// Corrupt shards are reported as `None`, the same as missing ones.
    pub fn verified(&self) -> Vec<Option<Vec<u8>>> {
        self.shards
            .iter()
            .map(|s| if s.is_intact() { s.bytes.clone() } else { None })
            .collect()
    }

    /// Mark the shard at `index` missing. Returns `false` if it already was
    /// or the index is out of range.
    pub fn mark_missing(&mut self, index: usize) -> bool {
        match self.shards.get_mut(index) {
            Some(shard) if shard.is_present() => {
                shard.mark_missing();
                true
            }
            _ => false,
        }
    }
}
