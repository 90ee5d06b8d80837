//! # Erasure Coding
//!
//! Reed-Solomon style erasure coding over GF(2^8). A payload is cut into `K`
//! data shards, `P` parity shards are derived from them, and the payload can
//! be rebuilt from *any* `K` of the `N = K + P` shards.
//!
//! ## Architecture
//!
//! ```text
//! matrix.rs  dense GF(2^8) matrices, Vandermonde rows, Gauss-Jordan inverse
//! shard.rs   Shard / ShardSet with BLAKE3 digests for loss detection
//! codec.rs   ErasureCoder: encode, reconstruct, decode, layout check
//! ```
//!
//! ## Generator
//!
//! The stacked generator is `[I_K ; V]` where `V[i][j] = α^(i·j)`. Shard
//! `r` is row `r` of the generator times the data column. Rebuilding from a
//! set of `K` surviving shards means inverting the `K×K` matrix made of their
//! generator rows. A layout is only usable if every such selection is
//! invertible; [`ErasureCoder::new`] checks this rather than assuming it.

pub mod codec;
pub mod matrix;
pub mod shard;

pub use codec::{Combinations, ErasureCoder};
pub use matrix::{Matrix, MatrixError};
pub use shard::{Shard, ShardSet};

use thiserror::Error;

use crate::field::FieldError;

/// Errors produced by the erasure coder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ErasureError {
    /// Fewer than `K` intact shards are available.
    #[error("insufficient shards: {available} available, {required} required")]
    InsufficientShards {
        /// Intact shards found.
        available: usize,
        /// Data shard count `K`.
        required: usize,
    },

    /// The generator rows selected for reconstruction do not form an
    /// invertible matrix. Unreachable for a verified layout.
    #[error("singular reconstruction matrix for shard indices {indices:?}")]
    SingularMatrix {
        /// Shard indices whose generator rows were selected.
        indices: Vec<usize>,
    },

    /// The shard counts cannot describe a valid code.
    #[error("invalid layout: {data} data + {parity} parity shards")]
    InvalidLayout {
        /// Requested data shard count.
        data: usize,
        /// Requested parity shard count.
        parity: usize,
    },

    /// Layout check found a `K`-subset of shards that cannot rebuild the data.
    #[error("layout is not recoverable from shard indices {indices:?}")]
    UnrecoverableLayout {
        /// The first failing subset.
        indices: Vec<usize>,
    },

    /// The layout has more parity-block minors than the coder will check.
    #[error("layout needs {minors} minor checks, more than the {max} allowed")]
    LayoutTooLarge {
        /// Minors the layout would need checked.
        minors: usize,
        /// `MAX_LAYOUT_CHECK_MINORS`.
        max: usize,
    },

    /// A caller passed the wrong number of shards.
    #[error("expected {expected} shards, got {got}")]
    ShardCountMismatch {
        /// Expected count.
        expected: usize,
        /// Supplied count.
        got: usize,
    },

    /// Shards that must be the same length are not.
    #[error("shard {index} has length {got}, expected {expected}")]
    ShardLengthMismatch {
        /// Offending shard index.
        index: usize,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// A selected shard index is out of range or absent.
    #[error("shard {0} is not available")]
    ShardUnavailable(usize),

    /// Matrix construction or inversion failed for a non-singularity reason.
    #[error("matrix error: {0}")]
    Matrix(MatrixError),

    /// Field arithmetic failure.
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl From<MatrixError> for ErasureError {
    fn from(e: MatrixError) -> Self {
        match e {
            MatrixError::Field(f) => ErasureError::Field(f),
            other => ErasureError::Matrix(other),
        }
    }
}
