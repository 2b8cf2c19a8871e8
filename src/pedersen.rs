//! Pedersen commitments on the Ed25519 curve.
//!
//! `commit(v, r) = v·G + r·H`. G is the Ed25519 base point and H is the
//! Bulletproofs hash-derived generator, so commitments interoperate with the
//! DAPOL code that uses the same pair.

use crate::arith::{chunk, dechunk};
use crate::constants::{
    COMMITMENT_LIMBS, EDWARDS_CHUNK_BASE, EDWARDS_COORDS, EDWARDS_LIMBS, GENERATOR_G, GENERATOR_H,
    SCALAR_BITS,
};
use crate::edwards::{point_add, point_scalar_mul, points_equal, EdwardsPoint};
use crate::error::{PoaError, Result};
use log::{debug, warn};
use num_bigint::BigUint;
use rand::{rngs::OsRng, RngCore};

pub fn generator_g() -> EdwardsPoint {
    EdwardsPoint::from_coords(&GENERATOR_G)
}

pub fn generator_h() -> EdwardsPoint {
    EdwardsPoint::from_coords(&GENERATOR_H)
}

/// Computes `value·G + blinding_factor·H` with every coordinate reduced mod p.
pub fn commit(value: &BigUint, blinding_factor: &BigUint) -> EdwardsPoint {
    let first = point_scalar_mul(value, &generator_g());
    let second = point_scalar_mul(blinding_factor, &generator_h());
    point_add(&first, &second)
}

/// Splits each of the 4 extended coordinates into 3 limbs of 85 bits.
pub fn format_generator(point: &EdwardsPoint) -> Result<Vec<Vec<BigUint>>> {
    point
        .coords()
        .iter()
        .map(|coord| chunk(coord, &EDWARDS_CHUNK_BASE, EDWARDS_LIMBS))
        .collect()
}

/// 255 little-endian bits of `k`.
///
/// Circuit scalars are strictly below 2^255, so bit 255 is dropped when
/// present.
///
/// # Errors
/// Returns `Overflow` if `k` does not fit in 256 bits.
pub fn format_scalar(k: &BigUint) -> Result<Vec<u8>> {
    if k.bits() > (SCALAR_BITS as u64) + 1 {
        return Err(PoaError::Overflow {
            needed: k.bits() as usize,
            available: SCALAR_BITS + 1,
            base: "2".to_string(),
        });
    }
    if k.bit(SCALAR_BITS as u64) {
        warn!("Scalar has bit {SCALAR_BITS} set; eliding it for the circuit");
    }

    Ok((0..SCALAR_BITS as u64).map(|i| u8::from(k.bit(i))).collect())
}

/// Rebuilds an extended point from the 12 limbs a commitment circuit emits.
///
/// # Errors
/// Returns `InvalidInput` unless exactly 12 limbs are given.
pub fn dechunk_to_point(limbs: &[BigUint]) -> Result<EdwardsPoint> {
    if limbs.len() != COMMITMENT_LIMBS {
        return Err(PoaError::InvalidInput(format!(
            "expected {COMMITMENT_LIMBS} commitment limbs, got {}",
            limbs.len()
        )));
    }

    let coords: Vec<BigUint> = limbs
        .chunks(EDWARDS_LIMBS)
        .map(|c| dechunk(c, &EDWARDS_CHUNK_BASE))
        .collect();
    debug_assert_eq!(coords.len(), EDWARDS_COORDS);

    Ok(EdwardsPoint::new(
        coords[0].clone(),
        coords[1].clone(),
        coords[2].clone(),
        coords[3].clone(),
    ))
}

/// Recomputes the commitment and compares it with the circuit's output.
pub fn verify_commitment(
    claimed_limbs: &[BigUint],
    value: &BigUint,
    blinding_factor: &BigUint,
) -> Result<bool> {
    let claimed = dechunk_to_point(claimed_limbs)?;
    let computed = commit(value, blinding_factor);
    let equal = points_equal(&claimed, &computed);
    debug!("Commitment check for value {value}: {equal}");
    Ok(equal)
}

/// Uniform scalar below 2^255 from the OS RNG.
pub fn random_blinding_factor() -> BigUint {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes[31] &= 0x7f;
    BigUint::from_bytes_le(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{One, Zero};

    #[test]
    fn test_commit_zero_blinding_is_value_times_g() {
        let v = BigUint::from(42u8);
        let c = commit(&v, &BigUint::zero());
        assert!(points_equal(&c, &point_scalar_mul(&v, &generator_g())));
    }

    #[test]
    fn test_commit_zero_is_identity() {
        let c = commit(&BigUint::zero(), &BigUint::zero());
        assert!(points_equal(&c, &EdwardsPoint::identity()));
    }

    #[test]
    fn test_commit_binds_value() {
        let r = BigUint::from(99u8);
        let a = commit(&BigUint::from(100u8), &r);
        let b = commit(&BigUint::from(101u8), &r);
        assert!(!points_equal(&a, &b));
    }

    #[test]
    fn test_format_generator_shape() {
        let formatted = format_generator(&generator_g()).unwrap();
        assert_eq!(formatted.len(), 4);
        assert!(formatted.iter().all(|c| c.len() == 3));
        // z = 1 for G
        assert_eq!(formatted[2], vec![BigUint::one(), BigUint::zero(), BigUint::zero()]);
    }

    #[test]
    fn test_format_scalar_small() {
        let bits = format_scalar(&BigUint::from(5u8)).unwrap();
        assert_eq!(bits.len(), 255);
        assert_eq!(&bits[..4], &[1, 0, 1, 0]);
        assert!(bits[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_format_scalar_elides_top_bit() {
        let k = (BigUint::one() << 255u32) + 3u32;
        let bits = format_scalar(&k).unwrap();
        assert_eq!(bits.len(), 255);
        assert_eq!(&bits[..2], &[1, 1]);
    }

    #[test]
    fn test_format_scalar_overflow() {
        let k = BigUint::one() << 256u32;
        assert!(matches!(
            format_scalar(&k),
            Err(PoaError::Overflow { .. })
        ));
    }

    #[test]
    fn test_verify_commitment_roundtrip() {
        let value = BigUint::from(600u32);
        let blinding = BigUint::parse_bytes(
            b"4869643893319708471955165214975585939793846505679808910535986866633137979160",
            10,
        )
        .unwrap();
        let limbs: Vec<BigUint> = format_generator(&commit(&value, &blinding))
            .unwrap()
            .into_iter()
            .flatten()
            .collect();

        assert!(verify_commitment(&limbs, &value, &blinding).unwrap());
        assert!(!verify_commitment(&limbs, &BigUint::from(601u32), &blinding).unwrap());
    }

    #[test]
    fn test_verify_commitment_wrong_limb_count() {
        let limbs = vec![BigUint::zero(); 11];
        assert!(matches!(
            verify_commitment(&limbs, &BigUint::one(), &BigUint::one()),
            Err(PoaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_random_blinding_factor_below_bound() {
        for _ in 0..16 {
            assert!(random_blinding_factor().bits() <= 255);
        }
    }
}
