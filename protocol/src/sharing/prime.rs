//! Prime search for the sharing field.
//!
//! Miller-Rabin over `BigUint`. The first thirteen primes are always used as
//! witnesses, which is deterministic below 3.3 · 10^24; wider candidates get
//! [`MILLER_RABIN_ROUNDS`] additional random witnesses.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::rngs::OsRng;

use crate::config::MILLER_RABIN_ROUNDS;

const SMALL_PRIMES: [u32; 13] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41];

/// Bit length below which the fixed witnesses alone are a proof.
const DETERMINISTIC_BITS: u64 = 81;

/// `true` if `n` is prime with overwhelming probability.
pub fn is_probable_prime(n: &BigUint) -> bool {
    if let Some(small) = n.to_u64() {
        if small < 2 {
            return false;
        }
        for p in SMALL_PRIMES {
            if small == u64::from(p) {
                return true;
            }
        }
    }
    for p in SMALL_PRIMES {
        if (n % p).is_zero() {
            return false;
        }
    }

    // n - 1 = d · 2^s with d odd
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    for p in SMALL_PRIMES {
        if !passes_round(n, &n_minus_one, &d, s, &BigUint::from(p)) {
            return false;
        }
    }
    if n.bits() > DETERMINISTIC_BITS {
        let low = BigUint::from(2u32);
        for _ in 0..MILLER_RABIN_ROUNDS {
            let witness = OsRng.gen_biguint_range(&low, &n_minus_one);
            if !passes_round(n, &n_minus_one, &d, s, &witness) {
                return false;
            }
        }
    }
    true
}

fn passes_round(n: &BigUint, n_minus_one: &BigUint, d: &BigUint, s: u64, witness: &BigUint) -> bool {
    let mut x = witness.modpow(d, n);
    if x.is_one() || &x == n_minus_one {
        return true;
    }
    for _ in 1..s {
        x = (&x * &x) % n;
        if &x == n_minus_one {
            return true;
        }
    }
    false
}

/// Smallest prime strictly greater than `n`.
pub fn next_prime(n: &BigUint) -> BigUint {
    let two = BigUint::from(2u32);
    if n < &two {
        return two;
    }
    let mut candidate = n + 1u32;
    if candidate.is_even() {
        candidate += 1u32;
    }
    while !is_probable_prime(&candidate) {
        candidate += 2u32;
    }
    candidate
}
