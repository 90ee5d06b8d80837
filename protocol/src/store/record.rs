//! Protected records and the reports the store hands back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{short_hex, Digest};
use crate::erasure::ShardSet;
use crate::sharing::KeyShareSet;

/// Everything stored for one record id.
///
/// A store replaces the whole value: new shards, a new key and a new
/// key-share set are committed together, never piecemeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRecord {
    pub id: String,
    /// Erasure-coded payload.
    pub shards: ShardSet,
    /// Threshold split of the record key, with its prime.
    pub key_shares: KeyShareSet,
    /// Fingerprint of the record key, checked after reconstruction.
    pub key_digest: Digest,
    /// 1 for the first store of an id, bumped by every later store.
    pub generation: u64,
    pub stored_at: DateTime<Utc>,
}

impl ProtectedRecord {
    /// Fragment counts as they stand.
    pub fn health(&self) -> RecordHealth {
        let intact = self.shards.intact_count();
        let corrupt = self.shards.corrupt_indices().len();
        let total = self.shards.total_shards();
        RecordHealth {
            id: self.id.clone(),
            generation: self.generation,
            intact_shards: intact,
            corrupt_shards: corrupt,
            missing_shards: total - intact - corrupt,
            required_shards: self.shards.data_shards,
            total_shards: total,
            present_shares: self.key_shares.present_count(),
            required_shares: self.key_shares.threshold,
            total_shares: self.key_shares.total_shares,
            recoverable: self.shards.is_recoverable() && self.key_shares.is_recoverable(),
        }
    }
}

/// Summary returned by a successful store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    pub id: String,
    pub generation: u64,
    pub data_shards: usize,
    pub parity_shards: usize,
    pub shard_size: usize,
    pub payload_len: usize,
    pub key_shares: usize,
    pub key_threshold: usize,
    pub prime_bits: u64,
    /// Short hex prefix of the key fingerprint.
    pub key_fingerprint: String,
}

impl StoreReceipt {
    pub(crate) fn for_record(record: &ProtectedRecord) -> Self {
        Self {
            id: record.id.clone(),
            generation: record.generation,
            data_shards: record.shards.data_shards,
            parity_shards: record.shards.parity_shards,
            shard_size: record.shards.shard_size,
            payload_len: record.shards.payload_len,
            key_shares: record.key_shares.total_shares,
            key_threshold: record.key_shares.threshold,
            prime_bits: record.key_shares.prime.bits(),
            key_fingerprint: short_hex(&record.key_digest),
        }
    }
}

/// What an injected corruption did to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionReport {
    pub id: String,
    /// Shards whose bytes were destroyed.
    pub removed_shards: Vec<usize>,
    /// Key-shares that were destroyed, by x.
    pub removed_shares: Vec<u32>,
    /// Shards whose bytes were altered in place.
    pub tampered_shards: Vec<usize>,
    /// Intact shards left.
    pub remaining_shards: usize,
    /// Key-shares left.
    pub remaining_shares: usize,
    /// Derived from the remaining counts against `K` and the threshold.
    pub recoverable: bool,
}

/// What a repair rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub id: String,
    /// Shards regenerated because they were missing or corrupt.
    pub rebuilt_shards: Vec<usize>,
    /// Size of the freshly issued key-share set.
    pub reissued_shares: usize,
}

/// Fragment counts for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHealth {
    pub id: String,
    pub generation: u64,
    pub intact_shards: usize,
    pub corrupt_shards: usize,
    pub missing_shards: usize,
    pub required_shards: usize,
    pub total_shards: usize,
    pub present_shares: usize,
    pub required_shares: usize,
    pub total_shares: usize,
    pub recoverable: bool,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::digest::key_fingerprint;
    use crate::erasure::ErasureCoder;
    use crate::sharing::{split, SharingConfig};
    use num_bigint::BigUint;

    /// A 4+2 record of a short payload with a 3-of-5 key split.
    pub(crate) fn sample_record(id: &str) -> ProtectedRecord {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let shards = coder.encode(b"blood type O negative").unwrap();
        let key = BigUint::from(0xC0FFEEu32);
        let key_shares = split(&key, &SharingConfig::new(3, 5).unwrap()).unwrap();
        ProtectedRecord {
            id: id.to_string(),
            shards,
            key_shares,
            key_digest: key_fingerprint(&key.to_bytes_be()),
            generation: 1,
            stored_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_record_is_fully_healthy() {
        let health = sample_record("p1").health();
        assert_eq!(health.intact_shards, 6);
        assert_eq!(health.missing_shards, 0);
        assert_eq!(health.present_shares, 5);
        assert!(health.recoverable);
    }

    #[test]
    fn health_separates_missing_from_corrupt() {
        let mut record = sample_record("p1");
        record.shards.mark_missing(1);
        if let Some(bytes) = record.shards.shards[4].bytes.as_mut() {
            bytes[0] ^= 0x5A;
        }
        record.key_shares.remove(2);
        record.key_shares.remove(3);
        record.key_shares.remove(4);
        let health = record.health();
        assert_eq!(health.intact_shards, 4);
        assert_eq!(health.corrupt_shards, 1);
        assert_eq!(health.missing_shards, 1);
        assert_eq!(health.present_shares, 2);
        assert!(!health.recoverable);
    }

    #[test]
    fn receipt_summarises_geometry() {
        let record = sample_record("p1");
        let receipt = StoreReceipt::for_record(&record);
        assert_eq!(receipt.payload_len, 21);
        assert_eq!(receipt.shard_size, 6);
        assert_eq!(receipt.key_shares, 5);
        assert_eq!(receipt.key_fingerprint.len(), 16);
    }
}
