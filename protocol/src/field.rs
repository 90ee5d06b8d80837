//! # GF(2^8) Arithmetic
//!
//! Byte-sized finite field used by the erasure coder. Every shard byte is a
//! field element, every parity byte is a linear combination of data bytes,
//! and reconstruction is linear algebra over this field.
//!
//! ## Field Definition
//!
//! - Primitive polynomial: `x^8 + x^4 + x^3 + x^2 + 1` (0x11D).
//! - Generator: α = 2, which generates the full multiplicative group of
//!   order 255.
//! - Addition and subtraction are both XOR (characteristic 2).
//!
//! ## Tables
//!
//! `EXP[i] = α^i` for `i` in `[0, 254]`, duplicated into `[255, 509]` so
//! that `LOG[a] + LOG[b]` (at most 508) and `LOG[a] - LOG[b] + 255` (at most
//! 509) index the table directly with no modulo. Both tables are computed at
//! compile time and live in read-only statics, so every thread shares them
//! without synchronization.
//!
//! `LOG[0]` is meaningless. Zero operands are special-cased before any table
//! lookup and never reach it.

use thiserror::Error;

/// Primitive polynomial defining the field: x^8 + x^4 + x^3 + x^2 + 1.
pub const PRIMITIVE_POLY: u16 = 0x11D;

/// Order of the multiplicative group (number of nonzero elements).
pub const GROUP_ORDER: usize = 255;

/// Length of the doubled exponent table.
const EXP_TABLE_LEN: usize = 2 * GROUP_ORDER;

/// Errors from field operations that have no defined result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Division by zero or inversion of zero. Always a programming error in
    /// the caller: a correctly built matrix never produces a zero pivot.
    #[error("invalid field operation: {0}")]
    InvalidFieldOperation(&'static str),
}

const fn build_exp_table() -> [u8; EXP_TABLE_LEN] {
    let mut table = [0u8; EXP_TABLE_LEN];
    let mut val: u16 = 1;
    let mut i = 0;
    while i < GROUP_ORDER {
        table[i] = val as u8;
        table[i + GROUP_ORDER] = val as u8;
        // Multiply by α = 2, reducing by the primitive polynomial.
        val <<= 1;
        if val & 0x100 != 0 {
            val ^= PRIMITIVE_POLY;
        }
        i += 1;
    }
    table
}

const fn build_log_table() -> [u8; 256] {
    let exp = build_exp_table();
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < GROUP_ORDER {
        table[exp[i] as usize] = i as u8;
        i += 1;
    }
    table
}

static EXP: [u8; EXP_TABLE_LEN] = build_exp_table();
static LOG: [u8; 256] = build_log_table();

/// Add two elements. Addition is XOR.
#[inline]
pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Subtract two elements. Same as addition in characteristic 2.
#[inline]
pub fn sub(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Multiply two elements using the log/exp tables.
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
}

/// Divide `a` by `b`.
///
/// Returns [`FieldError::InvalidFieldOperation`] when `b` is zero.
#[inline]
pub fn div(a: u8, b: u8) -> Result<u8, FieldError> {
    if b == 0 {
        return Err(FieldError::InvalidFieldOperation("division by zero"));
    }
    if a == 0 {
        return Ok(0);
    }
    Ok(EXP[LOG[a as usize] as usize + GROUP_ORDER - LOG[b as usize] as usize])
}

/// Multiplicative inverse of `a`.
///
/// Returns [`FieldError::InvalidFieldOperation`] when `a` is zero.
#[inline]
pub fn inv(a: u8) -> Result<u8, FieldError> {
    if a == 0 {
        return Err(FieldError::InvalidFieldOperation("zero has no inverse"));
    }
    Ok(EXP[GROUP_ORDER - LOG[a as usize] as usize])
}

/// α raised to `power`, reduced modulo the group order.
#[inline]
pub fn exp(power: usize) -> u8 {
    EXP[power % GROUP_ORDER]
}

/// Raise `base` to `power`. `0^0` is 1 by convention.
pub fn pow(base: u8, power: usize) -> u8 {
    if power == 0 {
        return 1;
    }
    if base == 0 {
        return 0;
    }
    exp(LOG[base as usize] as usize * power)
}
