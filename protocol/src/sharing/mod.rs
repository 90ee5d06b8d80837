//! # Threshold Key Sharing
//!
//! Shamir's Secret Sharing over a prime field, used to protect the key of
//! every stored record. The key is an arbitrary-precision integer; it is
//! split into `n` points on a random polynomial of degree `threshold - 1`
//! whose constant term is the key, and any `threshold` points rebuild it by
//! Lagrange interpolation at zero.
//!
//! ## Field Selection
//!
//! The prime is chosen per split as the smallest prime strictly greater than
//! both the secret and the share count. It travels with the share set and
//! must be supplied again at reconstruction; shares are meaningless under
//! any other modulus.
//!
//! ## Usage
//!
//! ```
//! use num_bigint::BigUint;
//! use rase_protocol::sharing::{split, reconstruct, SharingConfig};
//!
//! let secret = BigUint::from(123_456_789u32);
//! let config = SharingConfig::new(3, 5).unwrap();
//! let set = split(&secret, &config).unwrap();
//!
//! // Any 3 of the 5 shares recover the secret.
//! let recovered = reconstruct(&set.shares[2..], &set.prime, set.threshold).unwrap();
//! assert_eq!(recovered, secret);
//! ```

pub mod prime;
pub mod shamir;

pub use prime::{is_probable_prime, next_prime};
pub use shamir::{reconstruct, split, split_with_prime};

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest share count a single split may issue. x-coordinates are stored
/// as `u32`; this keeps the Lagrange products small as well.
pub const MAX_SHARES: usize = 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from splitting or reconstructing a secret.
///
/// Secret values never appear in messages; sizes are reported in bits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharingError {
    /// 1-of-n is just copying the secret.
    #[error("threshold must be >= 2, got {0}")]
    ThresholdTooLow(usize),

    /// More shares required than issued.
    #[error("threshold ({threshold}) exceeds total shares ({total})")]
    ThresholdExceedsTotal {
        /// Requested threshold.
        threshold: usize,
        /// Requested share count.
        total: usize,
    },

    /// Share count above [`MAX_SHARES`].
    #[error("cannot issue more than {MAX_SHARES} shares, got {0}")]
    TooManyShares(usize),

    /// The supplied prime does not exceed the secret.
    #[error("prime ({prime_bits} bits) must be strictly greater than the secret ({secret_bits} bits)")]
    SecretExceedsPrime {
        /// Bit length of the secret.
        secret_bits: u64,
        /// Bit length of the prime.
        prime_bits: u64,
    },

    /// The field has fewer nonzero elements than there are shares.
    #[error("prime {prime} leaves no room for {total_shares} distinct x-coordinates")]
    FieldTooSmall {
        /// The supplied prime.
        prime: BigUint,
        /// Requested share count.
        total_shares: usize,
    },

    /// The supplied modulus failed the primality test.
    #[error("modulus ({0} bits) is not prime")]
    NotPrime(u64),

    /// A share lies outside the field it is being interpolated in.
    #[error("share x={x} does not belong to the given prime field")]
    PrimeMismatch {
        /// x-coordinate of the offending share.
        x: u32,
    },

    /// Two shares claim the same x with different y.
    #[error("conflicting shares at x={0}")]
    ConflictingShares(u32),

    /// Fewer distinct shares than the threshold.
    #[error("insufficient key-shares: {available} available, {required} required")]
    InsufficientShares {
        /// Distinct shares supplied.
        available: usize,
        /// Threshold.
        required: usize,
    },

    /// A Lagrange denominator had no inverse modulo the prime.
    #[error("no modular inverse exists; modulus is not prime")]
    NoInverse,
}

// ---------------------------------------------------------------------------
// Public Types
// ---------------------------------------------------------------------------

/// Threshold and share count for a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Minimum number of shares required to reconstruct.
    pub threshold: usize,
    /// Number of shares issued.
    pub total_shares: usize,
}

impl SharingConfig {
    /// Validate and build a configuration.
    ///
    /// # Constraints
    ///
    /// - `threshold >= 2`
    /// - `total_shares >= threshold`
    /// - `total_shares <= MAX_SHARES`
    pub fn new(threshold: usize, total_shares: usize) -> Result<Self, SharingError> {
        if threshold < 2 {
            return Err(SharingError::ThresholdTooLow(threshold));
        }
        if total_shares < threshold {
            return Err(SharingError::ThresholdExceedsTotal {
                threshold,
                total: total_shares,
            });
        }
        if total_shares > MAX_SHARES {
            return Err(SharingError::TooManyShares(total_shares));
        }
        Ok(Self {
            threshold,
            total_shares,
        })
    }
}

/// One point `(x, f(x) mod prime)` on the sharing polynomial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    /// Evaluation point, 1-based; x = 0 is the secret itself.
    pub x: u32,
    /// Polynomial value at `x`, reduced modulo the set's prime.
    pub y: BigUint,
}

/// The shares of one split together with the field they live in.
///
/// Shares are removed from `shares` when lost; `total_shares` keeps the
/// count originally issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShareSet {
    /// Field modulus chosen at split time.
    pub prime: BigUint,
    /// Shares needed to reconstruct.
    pub threshold: usize,
    /// Shares issued by the split.
    pub total_shares: usize,
    /// Surviving shares, ordered by `x`.
    pub shares: Vec<KeyShare>,
}

impl KeyShareSet {
    /// Number of surviving shares.
    pub fn present_count(&self) -> usize {
        self.shares.len()
    }

    /// `true` if enough shares survive to reconstruct.
    pub fn is_recoverable(&self) -> bool {
        self.shares.len() >= self.threshold
    }

    /// x-coordinates of the surviving shares.
    pub fn xs(&self) -> Vec<u32> {
        self.shares.iter().map(|s| s.x).collect()
    }

    /// Drop the share at `x`. Returns `false` if it was already gone.
    pub fn remove(&mut self, x: u32) -> bool {
        let before = self.shares.len();
        self.shares.retain(|s| s.x != x);
        self.shares.len() != before
    }

    /// Rebuild the secret from the surviving shares.
    pub fn reconstruct(&self) -> Result<BigUint, SharingError> {
        shamir::reconstruct(&self.shares, &self.prime, self.threshold)
    }
}

/// Draw a fresh uniformly random key of `bits` bits from the OS CSPRNG.
pub fn generate_key(bits: u64) -> BigUint {
    OsRng.gen_biguint(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(SharingConfig::new(3, 5).is_ok());
        assert!(SharingConfig::new(2, 2).is_ok());
        assert_eq!(SharingConfig::new(1, 5), Err(SharingError::ThresholdTooLow(1)));
        assert_eq!(
            SharingConfig::new(4, 3),
            Err(SharingError::ThresholdExceedsTotal {
                threshold: 4,
                total: 3
            })
        );
        assert_eq!(
            SharingConfig::new(2, MAX_SHARES + 1),
            Err(SharingError::TooManyShares(MAX_SHARES + 1))
        );
    }

    #[test]
    fn share_set_tracks_losses() {
        let config = SharingConfig::new(3, 5).unwrap();
        let mut set = split(&BigUint::from(42u32), &config).unwrap();
        assert_eq!(set.xs(), vec![1, 2, 3, 4, 5]);
        assert!(set.remove(2));
        assert!(!set.remove(2));
        assert!(set.remove(5));
        assert_eq!(set.present_count(), 3);
        assert!(set.is_recoverable());
        assert_eq!(set.reconstruct().unwrap(), BigUint::from(42u32));
        assert!(set.remove(1));
        assert!(!set.is_recoverable());
        assert_eq!(
            set.reconstruct(),
            Err(SharingError::InsufficientShares {
                available: 2,
                required: 3
            })
        );
    }

    #[test]
    fn generated_keys_fit_their_width() {
        let key = generate_key(256);
        assert!(key.bits() <= 256);
        assert_ne!(generate_key(256), generate_key(256));
    }

    #[test]
    fn errors_do_not_leak_secret_digits() {
        let err = SharingError::SecretExceedsPrime {
            secret_bits: 27,
            prime_bits: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("27 bits"));
        assert!(!msg.contains("123456789"));
    }
}
