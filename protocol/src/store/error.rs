//! Store errors and their classification.

use thiserror::Error;

use super::state::SystemState;
use crate::config::ConfigError;
use crate::erasure::ErasureError;
use crate::journal::JournalError;
use crate::persistence::BackendError;
use crate::sharing::SharingError;

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Too few fragments survive right now. Expected under attack; the
    /// operation may succeed after repair or once fragments return.
    InsufficientRedundancy,
    /// The request was refused: bad input, wrong state, or an injected
    /// outage. Nothing about the data is wrong.
    Rejected,
    /// The data or the environment is broken in a way retrying will not fix.
    Fatal,
}

/// Errors returned by [`RecordStore`](super::RecordStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record id must be non-empty and at most {max} bytes")]
    InvalidRecordId {
        /// Longest accepted id.
        max: usize,
    },

    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition {
        from: SystemState,
        to: SystemState,
    },

    /// The operation writes and the current state forbids writes of its kind.
    #[error("writes are suspended while {state}")]
    WritesSuspended { state: SystemState },

    /// Injected failure from the attack duty cycle.
    #[error("simulated outage on guarded operation #{operation}")]
    SimulatedOutage { operation: u64 },

    #[error("insufficient shards: {available} intact, {required} required")]
    InsufficientShards { available: usize, required: usize },

    #[error("insufficient key-shares: {available} present, {required} required")]
    InsufficientShares { available: usize, required: usize },

    /// The reconstructed key does not match the stored fingerprint.
    #[error("reconstructed key for {0} does not match its fingerprint; access refused")]
    KeyMismatch(String),

    #[error("shard index {index} out of range (record has {total} shards)")]
    InvalidShardIndex { index: usize, total: usize },

    #[error("key-share x={x} out of range (record issued {total} shares)")]
    InvalidShareIndex { x: u32, total: usize },

    #[error("erasure coding failed: {0}")]
    Erasure(ErasureError),

    #[error("key sharing failed: {0}")]
    Sharing(SharingError),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("journal unavailable: {0}")]
    Journal(#[from] JournalError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<ErasureError> for StoreError {
    fn from(e: ErasureError) -> Self {
        match e {
            ErasureError::InsufficientShards {
                available,
                required,
            } => StoreError::InsufficientShards {
                available,
                required,
            },
            other => StoreError::Erasure(other),
        }
    }
}

impl From<SharingError> for StoreError {
    fn from(e: SharingError) -> Self {
        match e {
            SharingError::InsufficientShares {
                available,
                required,
            } => StoreError::InsufficientShares {
                available,
                required,
            },
            other => StoreError::Sharing(other),
        }
    }
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::InsufficientShards { .. } | StoreError::InsufficientShares { .. } => {
                ErrorClass::InsufficientRedundancy
            }
            StoreError::NotFound(_)
            | StoreError::InvalidRecordId { .. }
            | StoreError::InvalidTransition { .. }
            | StoreError::WritesSuspended { .. }
            | StoreError::SimulatedOutage { .. }
            | StoreError::InvalidShardIndex { .. }
            | StoreError::InvalidShareIndex { .. }
            | StoreError::Config(_) => ErrorClass::Rejected,
            StoreError::Erasure(e) => match e {
                ErasureError::InvalidLayout { .. }
                | ErasureError::UnrecoverableLayout { .. }
                | ErasureError::LayoutTooLarge { .. } => ErrorClass::Rejected,
                _ => ErrorClass::Fatal,
            },
            StoreError::Sharing(e) => match e {
                SharingError::NoInverse => ErrorClass::Fatal,
                _ => ErrorClass::Rejected,
            },
            StoreError::KeyMismatch(_)
            | StoreError::PersistenceFailure(_)
            | StoreError::Journal(_) => ErrorClass::Fatal,
        }
    }

    /// `true` for [`ErrorClass::InsufficientRedundancy`].
    pub fn is_insufficient_redundancy(&self) -> bool {
        self.class() == ErrorClass::InsufficientRedundancy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldError;

    #[test]
    fn quorum_shortages_are_insufficient_redundancy() {
        let from_erasure: StoreError = ErasureError::InsufficientShards {
            available: 3,
            required: 4,
        }
        .into();
        assert!(matches!(
            from_erasure,
            StoreError::InsufficientShards {
                available: 3,
                required: 4
            }
        ));
        assert!(from_erasure.is_insufficient_redundancy());

        let from_sharing: StoreError = SharingError::InsufficientShares {
            available: 2,
            required: 3,
        }
        .into();
        assert_eq!(from_sharing.class(), ErrorClass::InsufficientRedundancy);
    }

    #[test]
    fn caller_errors_are_rejected() {
        assert_eq!(StoreError::NotFound("p".into()).class(), ErrorClass::Rejected);
        assert_eq!(
            StoreError::SimulatedOutage { operation: 2 }.class(),
            ErrorClass::Rejected
        );
        let prime: StoreError = SharingError::SecretExceedsPrime {
            secret_bits: 8,
            prime_bits: 4,
        }
        .into();
        assert_eq!(prime.class(), ErrorClass::Rejected);
        let mismatch: StoreError = SharingError::PrimeMismatch { x: 3 }.into();
        assert_eq!(mismatch.class(), ErrorClass::Rejected);
    }

    #[test]
    fn broken_data_is_fatal() {
        let singular: StoreError = ErasureError::SingularMatrix {
            indices: vec![0, 1, 4, 5],
        }
        .into();
        assert_eq!(singular.class(), ErrorClass::Fatal);
        let field: StoreError =
            ErasureError::Field(FieldError::InvalidFieldOperation("inverse of zero")).into();
        assert_eq!(field.class(), ErrorClass::Fatal);
        assert_eq!(StoreError::KeyMismatch("p".into()).class(), ErrorClass::Fatal);
        let backend = StoreError::from(BackendError::Unavailable("offline".into()));
        assert_eq!(backend.class(), ErrorClass::Fatal);
    }
}
