//! Split and reconstruct.

use std::collections::BTreeMap;

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use tracing::debug;

use super::prime::{is_probable_prime, next_prime};
use super::{KeyShare, KeyShareSet, SharingConfig, SharingError};

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

/// Split `secret` into `config.total_shares` shares over a freshly chosen
/// prime field.
///
/// The prime is the smallest prime strictly greater than both the secret and
/// the share count, so it is recomputed on every call.
pub fn split(secret: &BigUint, config: &SharingConfig) -> Result<KeyShareSet, SharingError> {
    let share_count = BigUint::from(config.total_shares);
    let prime = next_prime(std::cmp::max(secret, &share_count));
    split_with_prime(secret, config, &prime)
}

/// Split `secret` over a caller-supplied prime.
///
/// The prime is checked before any share is generated: it must exceed the
/// secret, exceed the share count and pass the primality test.
pub fn split_with_prime(
    secret: &BigUint,
    config: &SharingConfig,
    prime: &BigUint,
) -> Result<KeyShareSet, SharingError> {
    if prime <= secret {
        return Err(SharingError::SecretExceedsPrime {
            secret_bits: secret.bits(),
            prime_bits: prime.bits(),
        });
    }
    if *prime <= BigUint::from(config.total_shares) {
        return Err(SharingError::FieldTooSmall {
            prime: prime.clone(),
            total_shares: config.total_shares,
        });
    }
    if !is_probable_prime(prime) {
        return Err(SharingError::NotPrime(prime.bits()));
    }

    let one = BigUint::one();
    let coefficients: Vec<BigUint> = (1..config.threshold)
        .map(|_| OsRng.gen_biguint_range(&one, prime))
        .collect();

    let shares = (1..=config.total_shares)
        .map(|x| {
            let x = x as u32;
            KeyShare {
                x,
                y: evaluate(secret, &coefficients, x, prime),
            }
        })
        .collect();

    debug!(
        threshold = config.threshold,
        total = config.total_shares,
        prime_bits = prime.bits(),
        "secret split"
    );

    Ok(KeyShareSet {
        prime: prime.clone(),
        threshold: config.threshold,
        total_shares: config.total_shares,
        shares,
    })
}

/// `f(x) = secret + Σ a_i · x^i`, summed in full and reduced once.
fn evaluate(secret: &BigUint, coefficients: &[BigUint], x: u32, prime: &BigUint) -> BigUint {
    let x = BigUint::from(x);
    let mut power = x.clone();
    let mut y = secret.clone();
    for a in coefficients {
        y += a * &power;
        power *= &x;
    }
    y % prime
}

// ---------------------------------------------------------------------------
// Reconstruct
// ---------------------------------------------------------------------------

/// Rebuild the secret from at least `threshold` shares of one split.
///
/// Duplicate shares are collapsed; the `threshold` shares with the lowest
/// x-coordinates are interpolated at zero. The function is pure: any valid
/// subset of one split yields the same value on every call.
pub fn reconstruct(
    shares: &[KeyShare],
    prime: &BigUint,
    threshold: usize,
) -> Result<BigUint, SharingError> {
    let mut points: BTreeMap<u32, &BigUint> = BTreeMap::new();
    for share in shares {
        if share.x == 0 || BigUint::from(share.x) >= *prime || share.y >= *prime {
            return Err(SharingError::PrimeMismatch { x: share.x });
        }
        match points.get(&share.x) {
            Some(existing) if *existing != &share.y => {
                return Err(SharingError::ConflictingShares(share.x));
            }
            Some(_) => {}
            None => {
                points.insert(share.x, &share.y);
            }
        }
    }

    if points.len() < threshold {
        return Err(SharingError::InsufficientShares {
            available: points.len(),
            required: threshold,
        });
    }

    let chosen: Vec<(BigUint, &BigUint)> = points
        .into_iter()
        .take(threshold)
        .map(|(x, y)| (BigUint::from(x), y))
        .collect();

    let mut secret = BigUint::zero();
    for (i, (xi, yi)) in chosen.iter().enumerate() {
        let mut numerator = BigUint::one();
        let mut denominator = BigUint::one();
        for (j, (xj, _)) in chosen.iter().enumerate() {
            if i == j {
                continue;
            }
            // (0 - x_j) and (x_i - x_j), lifted into [0, p)
            numerator = (numerator * (prime - xj)) % prime;
            denominator = (denominator * ((xi + prime - xj) % prime)) % prime;
        }
        let basis = (numerator * mod_inverse(&denominator, prime)?) % prime;
        secret = (secret + *yi * basis) % prime;
    }
    Ok(secret)
}

/// Inverse of `a` modulo `m` by the extended Euclidean algorithm.
pub(crate) fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, SharingError> {
    let modulus = BigInt::from(m.clone());
    let (mut old_r, mut r) = (BigInt::from(a.clone()), modulus.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    if !old_r.is_one() {
        return Err(SharingError::NoInverse);
    }
    old_s
        .mod_floor(&modulus)
        .to_biguint()
        .ok_or(SharingError::NoInverse)
}
