//! Twisted Edwards arithmetic over the Curve25519 base field.
//!
//! Points use extended coordinates `(X, Y, Z, T)` with `x = X/Z`, `y = Y/Z`
//! and `XY = ZT`. Addition follows the unified a = -1 formulas, so no
//! inversion happens while adding, doubling or multiplying.

use crate::arith::invert_unsigned;
use crate::constants::{ED25519_D, ED25519_P, EDWARDS_COORDS};
use crate::error::{PoaError, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::fmt;

/// Point in extended coordinates. Every coordinate is kept reduced mod p.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdwardsPoint {
    x: BigUint,
    y: BigUint,
    z: BigUint,
    t: BigUint,
}

fn fmul(a: &BigUint, b: &BigUint) -> BigUint {
    (a * b) % &*ED25519_P
}

fn fadd(a: &BigUint, b: &BigUint) -> BigUint {
    (a + b) % &*ED25519_P
}

// Operands are reduced, so adding p once keeps the difference non-negative.
fn fsub(a: &BigUint, b: &BigUint) -> BigUint {
    (a + &*ED25519_P - b) % &*ED25519_P
}

impl EdwardsPoint {
    pub fn new(x: BigUint, y: BigUint, z: BigUint, t: BigUint) -> Self {
        let p = &*ED25519_P;
        Self {
            x: x % p,
            y: y % p,
            z: z % p,
            t: t % p,
        }
    }

    /// The neutral element `(0, 1, 1, 0)`.
    pub fn identity() -> Self {
        Self::new(BigUint::zero(), BigUint::one(), BigUint::one(), BigUint::zero())
    }

    pub fn from_coords(coords: &[BigUint; EDWARDS_COORDS]) -> Self {
        Self::new(
            coords[0].clone(),
            coords[1].clone(),
            coords[2].clone(),
            coords[3].clone(),
        )
    }

    pub fn coords(&self) -> [BigUint; EDWARDS_COORDS] {
        [
            self.x.clone(),
            self.y.clone(),
            self.z.clone(),
            self.t.clone(),
        ]
    }

    pub fn x(&self) -> &BigUint {
        &self.x
    }

    pub fn y(&self) -> &BigUint {
        &self.y
    }

    pub fn z(&self) -> &BigUint {
        &self.z
    }

    pub fn t(&self) -> &BigUint {
        &self.t
    }

    /// Affine `(x, y)`. Only used for display and diagnostics.
    ///
    /// # Errors
    /// Returns `NotInvertible` when `Z == 0`.
    pub fn to_affine(&self) -> Result<(BigUint, BigUint)> {
        let z_inv = invert_unsigned(&self.z, &ED25519_P).map_err(|_| PoaError::NotInvertible {
            value: self.z.to_string(),
            modulus: ED25519_P.to_string(),
        })?;
        Ok((fmul(&self.x, &z_inv), fmul(&self.y, &z_inv)))
    }

    /// Checks `(-X² + Y²)·Z² = Z⁴ + d·X²·Y²` and `X·Y = Z·T`.
    pub fn is_on_curve(&self) -> bool {
        if self.z.is_zero() {
            return false;
        }
        let xx = fmul(&self.x, &self.x);
        let yy = fmul(&self.y, &self.y);
        let zz = fmul(&self.z, &self.z);
        let lhs = fmul(&fsub(&yy, &xx), &zz);
        let rhs = fadd(&fmul(&zz, &zz), &fmul(&ED25519_D, &fmul(&xx, &yy)));
        lhs == rhs && fmul(&self.x, &self.y) == fmul(&self.z, &self.t)
    }
}

impl fmt::Display for EdwardsPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.t)
    }
}

/// Unified extended-coordinate addition.
///
/// `A=(y1−x1)(y2−x2), B=(y1+x1)(y2+x2), C=2·t1·t2·d, D=2·z1·z2,
/// E=B−A, F=D−C, G=D+C, H=B+A → (E·F, G·H, F·G, E·H)`
pub fn point_add(p: &EdwardsPoint, q: &EdwardsPoint) -> EdwardsPoint {
    let two = BigUint::from(2u8);

    let a = fmul(&fsub(&p.y, &p.x), &fsub(&q.y, &q.x));
    let b = fmul(&fadd(&p.y, &p.x), &fadd(&q.y, &q.x));
    let c = fmul(&fmul(&two, &fmul(&p.t, &q.t)), &ED25519_D);
    let d = fmul(&two, &fmul(&p.z, &q.z));

    let e = fsub(&b, &a);
    let f = fsub(&d, &c);
    let g = fadd(&d, &c);
    let h = fadd(&b, &a);

    EdwardsPoint {
        x: fmul(&e, &f),
        y: fmul(&g, &h),
        z: fmul(&f, &g),
        t: fmul(&e, &h),
    }
}

pub fn point_double(p: &EdwardsPoint) -> EdwardsPoint {
    point_add(p, p)
}

/// Double-and-add from the least significant bit of `k`.
pub fn point_scalar_mul(k: &BigUint, p: &EdwardsPoint) -> EdwardsPoint {
    let mut acc = EdwardsPoint::identity();
    let mut base = p.clone();
    for i in 0..k.bits() {
        if k.bit(i) {
            acc = point_add(&acc, &base);
        }
        base = point_double(&base);
    }
    acc
}

/// Projective equality: `x1·z2 ≡ x2·z1` and `y1·z2 ≡ y2·z1` (mod p).
pub fn points_equal(p: &EdwardsPoint, q: &EdwardsPoint) -> bool {
    fmul(&p.x, &q.z) == fmul(&q.x, &p.z) && fmul(&p.y, &q.z) == fmul(&q.y, &p.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GENERATOR_G, GENERATOR_H};

    fn g() -> EdwardsPoint {
        EdwardsPoint::from_coords(&GENERATOR_G)
    }

    #[test]
    fn test_generators_on_curve() {
        assert!(g().is_on_curve());
        assert!(EdwardsPoint::from_coords(&GENERATOR_H).is_on_curve());
        assert!(EdwardsPoint::identity().is_on_curve());
    }

    #[test]
    fn test_identity_is_neutral() {
        let sum = point_add(&g(), &EdwardsPoint::identity());
        assert!(points_equal(&sum, &g()));
    }

    #[test]
    fn test_double_matches_scalar_two() {
        let doubled = point_double(&g());
        let mul = point_scalar_mul(&BigUint::from(2u8), &g());
        assert!(points_equal(&doubled, &mul));
        assert!(doubled.is_on_curve());
    }

    #[test]
    fn test_scalar_mul_zero_is_identity() {
        let zero = point_scalar_mul(&BigUint::zero(), &g());
        assert_eq!(zero, EdwardsPoint::identity());
    }

    #[test]
    fn test_scalar_mul_distributes() {
        let a = BigUint::from(12345u32);
        let b = BigUint::from(67890u32);
        let lhs = point_add(&point_scalar_mul(&a, &g()), &point_scalar_mul(&b, &g()));
        let rhs = point_scalar_mul(&(a + b), &g());
        assert!(points_equal(&lhs, &rhs));
    }

    #[test]
    fn test_points_equal_is_projective() {
        let p = point_scalar_mul(&BigUint::from(7u8), &g());
        let lambda = BigUint::from(987654321u64);
        let scaled = EdwardsPoint::new(
            p.x() * &lambda,
            p.y() * &lambda,
            p.z() * &lambda,
            p.t() * &lambda,
        );
        assert_ne!(p, scaled);
        assert!(points_equal(&p, &scaled));
        assert_eq!(p.to_affine().unwrap(), scaled.to_affine().unwrap());
    }

    #[test]
    fn test_points_not_equal() {
        let two = point_double(&g());
        assert!(!points_equal(&g(), &two));
    }

    #[test]
    fn test_generator_affine_is_normalized() {
        let (x, y) = g().to_affine().unwrap();
        assert_eq!(&x, &GENERATOR_G[0]);
        assert_eq!(&y, &GENERATOR_G[1]);
    }
}
