//! Modular arithmetic and limb decomposition.
//!
//! The modulus is always passed explicitly. Nothing here assumes a default
//! field.

use crate::error::{PoaError, Result};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// `a mod m` normalized to `[0, m)`, also for negative `a`.
///
/// # Errors
/// Returns `InvalidInput` if `m <= 0`.
pub fn modulo(a: &BigInt, m: &BigInt) -> Result<BigInt> {
    if !m.is_positive() {
        return Err(PoaError::InvalidInput(format!(
            "modulus must be positive, got {m}"
        )));
    }
    Ok(a.mod_floor(m))
}

/// Modular inverse via the extended Euclidean algorithm.
///
/// # Errors
/// - `InvalidInput` if `a == 0` or `m <= 0`
/// - `NotInvertible` if `gcd(a, m) != 1`
///
/// # Examples
///
/// ```
/// use num_bigint::BigInt;
/// use zkp_proof_of_assets::arith::invert;
///
/// let inv = invert(&BigInt::from(3), &BigInt::from(11)).unwrap();
/// assert_eq!(inv, BigInt::from(4));
/// ```
pub fn invert(a: &BigInt, m: &BigInt) -> Result<BigInt> {
    if a.is_zero() || !m.is_positive() {
        return Err(PoaError::InvalidInput(format!(
            "invert expects a non-zero value and a positive modulus, got a={a} m={m}"
        )));
    }

    let mut a_cur = modulo(a, m)?;
    let mut b_cur = m.clone();
    let (mut x, mut y) = (BigInt::zero(), BigInt::one());
    let (mut u, mut v) = (BigInt::one(), BigInt::zero());

    while !a_cur.is_zero() {
        let (q, r) = b_cur.div_rem(&a_cur);
        let next_u = &x - &u * &q;
        let next_v = &y - &v * &q;
        b_cur = a_cur;
        a_cur = r;
        x = u;
        y = v;
        u = next_u;
        v = next_v;
    }

    if !b_cur.is_one() {
        return Err(PoaError::NotInvertible {
            value: a.to_string(),
            modulus: m.to_string(),
        });
    }

    modulo(&x, m)
}

/// Unsigned convenience wrapper around [`invert`].
pub fn invert_unsigned(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    let inv = invert(&BigInt::from(a.clone()), &BigInt::from(m.clone()))?;
    inv.to_biguint()
        .ok_or_else(|| PoaError::InvalidInput("inverse is negative".to_string()))
}

/// Little-endian base-`base` decomposition zero-padded to `limb_count`.
///
/// # Errors
/// - `InvalidInput` if `base < 2`
/// - `Overflow` if `value >= base^limb_count`
///
/// # Examples
///
/// ```
/// use num_bigint::BigUint;
/// use zkp_proof_of_assets::arith::{chunk, dechunk};
///
/// let base = BigUint::from(256u32);
/// let limbs = chunk(&BigUint::from(0x0102u32), &base, 4).unwrap();
/// let expected: Vec<BigUint> = [2u32, 1, 0, 0].into_iter().map(BigUint::from).collect();
/// assert_eq!(limbs, expected);
/// assert_eq!(dechunk(&limbs, &base), BigUint::from(0x0102u32));
/// ```
pub fn chunk(value: &BigUint, base: &BigUint, limb_count: usize) -> Result<Vec<BigUint>> {
    if base < &BigUint::from(2u8) {
        return Err(PoaError::InvalidInput(format!(
            "chunk base must be at least 2, got {base}"
        )));
    }

    let mut limbs = Vec::with_capacity(limb_count);
    let mut rest = value.clone();
    while !rest.is_zero() {
        let (q, r) = rest.div_rem(base);
        limbs.push(r);
        rest = q;
    }

    if limbs.len() > limb_count {
        return Err(PoaError::Overflow {
            needed: limbs.len(),
            available: limb_count,
            base: base.to_string(),
        });
    }

    limbs.resize(limb_count, BigUint::zero());
    Ok(limbs)
}

/// Inverse of [`chunk`]: `sum(limbs[i] * base^i)`.
pub fn dechunk(limbs: &[BigUint], base: &BigUint) -> BigUint {
    limbs
        .iter()
        .rev()
        .fold(BigUint::zero(), |acc, limb| acc * base + limb)
}
