//! ECDSA → ECDSA* conversion.
//!
//! An ECDSA* signature replaces the recovery bit with `r'`, the y-coordinate
//! of the nonce point `R = s⁻¹·h·G + s⁻¹·r·Q`. A circuit can then check
//! `s·R = h·G + r·Q` with two scalar multiplications and one addition
//! instead of a modular inverse plus key recovery.
//!
//! The transform checks the claimed address twice: once against the key
//! recovered from the plain signature, and once against the key carried by
//! the reconstructed ECDSA* signature after re-checking its relation.

use crate::arith::invert;
use crate::constants::{SECP256K1_HALF_N, SECP256K1_N, SECP256K1_P};
use crate::error::{PoaError, Result};
use crate::ethereum::{address_from_coordinates, address_to_biguint, to_bytes32, Address};
use crate::types::SignatureData;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::group::Curve;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use log::{debug, info};
use num_bigint::{BigInt, BigUint};
use rayon::prelude::*;

/// Length in bytes of the message hash that is signed.
pub const MSG_HASH_BYTES: usize = 32;

/// Plain ECDSA signature over a 32-byte message hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: BigUint,
    pub s: BigUint,
    pub recovery_bit: u8,
    pub msg_hash: Vec<u8>,
}

impl EcdsaSignature {
    /// # Errors
    /// - `InvalidSignature` if `recovery_bit` is not 0 or 1
    /// - `InvalidInput` if the message hash is not 32 bytes
    pub fn new(r: BigUint, s: BigUint, recovery_bit: u8, msg_hash: Vec<u8>) -> Result<Self> {
        if recovery_bit > 1 {
            return Err(PoaError::InvalidSignature(format!(
                "recovery bit must be 0 or 1, got {recovery_bit}"
            )));
        }
        if msg_hash.len() != MSG_HASH_BYTES {
            return Err(PoaError::InvalidInput(format!(
                "message hash must be {MSG_HASH_BYTES} bytes, got {}",
                msg_hash.len()
            )));
        }
        Ok(Self {
            r,
            s,
            recovery_bit,
            msg_hash,
        })
    }

    /// Builds a signature from the Ethereum `v ∈ {27, 28}` encoding.
    pub fn from_v(r: BigUint, s: BigUint, v: u64, msg_hash: Vec<u8>) -> Result<Self> {
        let recovery_bit = match v {
            27 => 0,
            28 => 1,
            other => {
                return Err(PoaError::InvalidSignature(format!(
                    "Invalid ECDSA 'v' value {other} (must be 27 or 28)"
                )))
            }
        };
        Self::new(r, s, recovery_bit, msg_hash)
    }

    pub fn v(&self) -> u64 {
        27 + u64::from(self.recovery_bit)
    }
}

/// Affine secp256k1 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub x: BigUint,
    pub y: BigUint,
}

impl PublicKey {
    pub fn address(&self) -> Result<Address> {
        address_from_coordinates(&self.x, &self.y)
    }
}

/// ECDSA* signature `(r, s, r', Q, h)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaStarSignature {
    pub r: BigUint,
    pub s: BigUint,
    pub r_prime: BigUint,
    pub pubkey: PublicKey,
    pub msg_hash: Vec<u8>,
}

/// Public-key recovery oracle.
pub trait KeyRecovery: Send + Sync {
    fn recover_public_key(
        &self,
        msg_hash: &[u8],
        r: &BigUint,
        s: &BigUint,
        recovery_bit: u8,
    ) -> Result<PublicKey>;
}

/// Recovery backed by `k256`.
#[derive(Debug, Clone, Copy, Default)]
pub struct K256Recovery;

impl KeyRecovery for K256Recovery {
    fn recover_public_key(
        &self,
        msg_hash: &[u8],
        r: &BigUint,
        s: &BigUint,
        recovery_bit: u8,
    ) -> Result<PublicKey> {
        // k256 only recovers from low-s signatures; (r, n - s) with the
        // recovery bit flipped names the same key.
        let (s, recovery_bit) = if s > &*SECP256K1_HALF_N {
            (&*SECP256K1_N - s, recovery_bit ^ 1)
        } else {
            (s.clone(), recovery_bit)
        };
        let signature = Signature::from_scalars(field_bytes(r)?, field_bytes(&s)?)
            .map_err(|e| PoaError::InvalidSignature(format!("malformed (r, s): {e}")))?;
        let recovery_id = RecoveryId::from_byte(recovery_bit).ok_or_else(|| {
            PoaError::InvalidSignature(format!("invalid recovery bit {recovery_bit}"))
        })?;
        let key = VerifyingKey::recover_from_prehash(msg_hash, &signature, recovery_id)
            .map_err(|e| PoaError::InvalidSignature(format!("public key recovery failed: {e}")))?;
        public_key_from_affine(key.as_affine())
    }
}

fn field_bytes(value: &BigUint) -> Result<FieldBytes> {
    Ok(FieldBytes::clone_from_slice(&to_bytes32(value)?))
}

fn scalar_from_biguint(value: &BigUint) -> Result<Scalar> {
    let reduced = value % &*SECP256K1_N;
    Option::from(Scalar::from_repr(field_bytes(&reduced)?))
        .ok_or_else(|| PoaError::InvalidInput(format!("{value} is not a secp256k1 scalar")))
}

fn public_key_from_affine(point: &AffinePoint) -> Result<PublicKey> {
    let encoded = point.to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Ok(PublicKey {
            x: BigUint::from_bytes_be(x),
            y: BigUint::from_bytes_be(y),
        }),
        _ => Err(PoaError::InvalidSignature(
            "point at infinity has no affine coordinates".to_string(),
        )),
    }
}

fn affine_from_coordinates(x: &BigUint, y: &BigUint) -> Option<AffinePoint> {
    let x = field_bytes(x).ok()?;
    let y = field_bytes(y).ok()?;
    let encoded = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::from(AffinePoint::from_encoded_point(&encoded))
}

fn msg_hash_scalar(msg_hash: &[u8]) -> BigUint {
    BigUint::from_bytes_be(msg_hash)
}

/// `s⁻¹·h mod n` and `s⁻¹·r mod n`.
fn opening_scalars(r: &BigUint, s: &BigUint, msg_hash: &[u8]) -> Result<(Scalar, Scalar)> {
    let n = BigInt::from(SECP256K1_N.clone());
    let s_inv = invert(&BigInt::from(s.clone()), &n)?;
    let h = BigInt::from(msg_hash_scalar(msg_hash));
    let u1 = (h * &s_inv) % &n;
    let u2 = (BigInt::from(r.clone()) * &s_inv) % &n;
    let to_scalar = |v: BigInt| {
        v.to_biguint()
            .ok_or_else(|| PoaError::InvalidInput("negative opening scalar".to_string()))
            .and_then(|v| scalar_from_biguint(&v))
    };
    Ok((to_scalar(u1)?, to_scalar(u2)?))
}

/// `r' = (s⁻¹·h·G + s⁻¹·r·Q).y`.
pub fn construct_r_prime(
    r: &BigUint,
    s: &BigUint,
    pubkey: &PublicKey,
    msg_hash: &[u8],
) -> Result<BigUint> {
    let q = affine_from_coordinates(&pubkey.x, &pubkey.y)
        .ok_or_else(|| PoaError::InvalidSignature("public key is not on secp256k1".to_string()))?;
    let (u1, u2) = opening_scalars(r, s, msg_hash)?;

    let point = ProjectivePoint::GENERATOR * u1 + ProjectivePoint::from(q) * u2;
    if point == ProjectivePoint::IDENTITY {
        return Err(PoaError::InvalidSignature(
            "nonce point is the point at infinity".to_string(),
        ));
    }
    Ok(public_key_from_affine(&point.to_affine())?.y)
}

/// Rebuilds `R` from `(r, r')`. The x-coordinate is `r` or, when the nonce
/// point's x overflowed the group order, `r + n`.
fn reconstruct_nonce_point(r: &BigUint, r_prime: &BigUint) -> Option<AffinePoint> {
    let p = &*SECP256K1_P;
    [r.clone(), r + &*SECP256K1_N]
        .into_iter()
        .filter(|x| x < p)
        .find_map(|x| affine_from_coordinates(&x, r_prime))
}

/// Address carried by an ECDSA* signature, after checking `s·R = h·G + r·Q`.
///
/// # Errors
/// Returns `InvalidSignature` if `R` or `Q` are not curve points or the
/// relation does not hold.
pub fn recover_address_ecdsa_star(sig: &EcdsaStarSignature) -> Result<Address> {
    let q = affine_from_coordinates(&sig.pubkey.x, &sig.pubkey.y)
        .ok_or_else(|| PoaError::InvalidSignature("public key is not on secp256k1".to_string()))?;
    let nonce = reconstruct_nonce_point(&sig.r, &sig.r_prime)
        .ok_or_else(|| PoaError::InvalidSignature("(r, r') is not a curve point".to_string()))?;

    let s = scalar_from_biguint(&sig.s)?;
    let r = scalar_from_biguint(&sig.r)?;
    let h = scalar_from_biguint(&msg_hash_scalar(&sig.msg_hash))?;

    let lhs = ProjectivePoint::from(nonce) * s;
    let rhs = ProjectivePoint::GENERATOR * h + ProjectivePoint::from(q) * r;
    if lhs != rhs {
        return Err(PoaError::InvalidSignature(
            "s·R != h·G + r·Q for the reconstructed signature".to_string(),
        ));
    }

    sig.pubkey.address()
}

/// Converts `sig` to ECDSA*, checking both recovery paths against `claimed`.
///
/// # Errors
/// - `InvalidSignature` if the key cannot be recovered
/// - `AddressMismatch` if either path yields a different address
/// - `NotInvertible` if `s` has no inverse mod n
pub fn ecdsa_star_from_ecdsa<R: KeyRecovery + ?Sized>(
    recovery: &R,
    sig: &EcdsaSignature,
    claimed: &Address,
) -> Result<EcdsaStarSignature> {
    if sig.recovery_bit > 1 {
        return Err(PoaError::InvalidSignature(format!(
            "recovery bit must be 0 or 1, got {}",
            sig.recovery_bit
        )));
    }

    let pubkey = recovery.recover_public_key(&sig.msg_hash, &sig.r, &sig.s, sig.recovery_bit)?;
    let recovered = pubkey.address()?;
    if &recovered != claimed {
        return Err(PoaError::AddressMismatch {
            path: "ecdsa",
            expected: hex::encode(claimed),
            recovered: hex::encode(recovered),
        });
    }

    let r_prime = construct_r_prime(&sig.r, &sig.s, &pubkey, &sig.msg_hash)?;
    let star = EcdsaStarSignature {
        r: sig.r.clone(),
        s: sig.s.clone(),
        r_prime,
        pubkey,
        msg_hash: sig.msg_hash.clone(),
    };

    match recover_address_ecdsa_star(&star) {
        Ok(address) if &address == claimed => {}
        Ok(address) => {
            return Err(PoaError::AddressMismatch {
                path: "ecdsa*",
                expected: hex::encode(claimed),
                recovered: hex::encode(address),
            })
        }
        Err(e) => {
            return Err(PoaError::AddressMismatch {
                path: "ecdsa*",
                expected: hex::encode(claimed),
                recovered: format!("<none: {e}>"),
            })
        }
    }

    debug!("ECDSA* conversion succeeded for 0x{}", hex::encode(claimed));
    Ok(star)
}

/// [`ecdsa_star_from_ecdsa`] with the `k256` recovery oracle.
pub fn transform(sig: &EcdsaSignature, claimed: &Address) -> Result<EcdsaStarSignature> {
    ecdsa_star_from_ecdsa(&K256Recovery, sig, claimed)
}

/// ECDSA* signature bound to the account it attests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAttestation {
    pub signature: EcdsaStarSignature,
    pub address: BigUint,
    pub balance: BigUint,
}

/// Converts one signature and binds it to `(address, balance)`.
pub fn attest<R: KeyRecovery + ?Sized>(
    recovery: &R,
    sig: &EcdsaSignature,
    address: &Address,
    balance: BigUint,
) -> Result<AccountAttestation> {
    let signature = ecdsa_star_from_ecdsa(recovery, sig, address)?;
    Ok(AccountAttestation {
        signature,
        address: address_to_biguint(address),
        balance,
    })
}

/// Attests every record of a signature input file.
///
/// # Errors
/// Stops at the first record that fails to parse or convert; the error is
/// prefixed with the record's position.
pub fn attest_batch(records: &[SignatureData], parallel: bool) -> Result<Vec<AccountAttestation>> {
    let convert = |(i, record): (usize, &SignatureData)| -> Result<AccountAttestation> {
        let (sig, address, balance) = record.parse()?;
        attest(&K256Recovery, &sig, &address, balance).map_err(|e| match e {
            PoaError::InvalidSignature(msg) => {
                PoaError::InvalidSignature(format!("record {i}: {msg}"))
            }
            PoaError::InvalidInput(msg) => PoaError::InvalidInput(format!("record {i}: {msg}")),
            other => other,
        })
    };

    let attestations = if parallel {
        records
            .par_iter()
            .enumerate()
            .map(convert)
            .collect::<Result<Vec<_>>>()?
    } else {
        records
            .iter()
            .enumerate()
            .map(convert)
            .collect::<Result<Vec<_>>>()?
    };
    info!("Converted {} signatures to ECDSA*", attestations.len());
    Ok(attestations)
}
