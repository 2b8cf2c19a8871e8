//! Parsing helpers and the Poseidon compression oracles.

use crate::error::{PoaError, Result};
use ark_bn254::Fr;
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use light_poseidon::{Poseidon, PoseidonBytesHasher};
use num_bigint::BigUint;
use num_traits::Zero;
use pasta_curves::group::ff::PrimeField;
use pasta_curves::pallas;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns `InvalidInput` if the stripped string has the wrong length or
/// contains non-hex characters.
///
/// # Examples
///
/// ```
/// use zkp_proof_of_assets::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(PoaError::InvalidInput(format!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(PoaError::InvalidInput(
            "Invalid hex string: contains non-hex characters".to_string(),
        ));
    }

    Ok(stripped.to_string())
}

/// Validates that a string contains only hex digits.
#[must_use]
pub fn validate_hex_string(input: &str) -> bool {
    let stripped = strip_hex_prefix(input);

    if stripped.is_empty() {
        return false;
    }

    is_valid_hex_string(stripped)
}

/// Decodes an even-length hex string (optional `0x`) into big-endian bytes.
pub fn hex_to_bytes(input: &str) -> Result<Vec<u8>> {
    let stripped = strip_hex_prefix(input);
    if stripped.len() % 2 != 0 {
        return Err(PoaError::InvalidInput(format!(
            "Invalid hex string: odd length {} for '{input}'",
            stripped.len()
        )));
    }
    hex::decode(stripped)
        .map_err(|e| PoaError::InvalidInput(format!("Invalid hex string '{input}': {e}")))
}

/// Parses a hex integer with optional `0x` prefix.
pub fn parse_hex_biguint(input: &str) -> Result<BigUint> {
    if !validate_hex_string(input) {
        return Err(PoaError::InvalidInput(format!(
            "Invalid hex integer '{input}'"
        )));
    }
    BigUint::parse_bytes(strip_hex_prefix(input).as_bytes(), 16)
        .ok_or_else(|| PoaError::InvalidInput(format!("Invalid hex integer '{input}'")))
}

/// Parses a base-10 integer.
pub fn parse_decimal_biguint(input: &str) -> Result<BigUint> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(PoaError::InvalidInput(format!(
            "Invalid decimal integer '{input}'"
        )));
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| PoaError::InvalidInput(format!("Invalid decimal integer '{input}'")))
}

/// Parses a decimal balance, accepting the legacy `123n` spelling.
pub fn parse_balance(input: &str) -> Result<BigUint> {
    let trimmed = input.trim();
    parse_decimal_biguint(trimmed.strip_suffix('n').unwrap_or(trimmed))
}

/// Converts an integer to a Pallas base field element.
///
/// # Errors
/// Returns `InvalidInput` if the value is not below the field modulus.
pub fn biguint_to_field(value: &BigUint) -> Result<pallas::Base> {
    let bytes = value.to_bytes_le();
    if bytes.len() > 32 {
        return Err(PoaError::InvalidInput(format!(
            "{value} does not fit in a field element"
        )));
    }
    let mut repr = [0u8; 32];
    repr[..bytes.len()].copy_from_slice(&bytes);
    Option::from(pallas::Base::from_repr(repr))
        .ok_or_else(|| PoaError::InvalidInput(format!("{value} is not below the field modulus")))
}

#[inline]
#[must_use]
pub fn field_to_biguint(field: pallas::Base) -> BigUint {
    BigUint::from_bytes_le(field.to_repr().as_ref())
}

/// Poseidon hash of two field elements using `P128Pow5T3` specification.
///
/// # Example
///
/// ```
/// use zkp_proof_of_assets::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// let hash = poseidon_hash(left, right);
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}

/// 2-to-1 compression function used for leaves and inner Merkle nodes.
///
/// Implementations must be deterministic and collision resistant; the
/// circuits that consume the tree recompute it.
pub trait Compressor: Send + Sync {
    fn compress(&self, left: &BigUint, right: &BigUint) -> Result<BigUint>;

    /// Hash of an arbitrary number of inputs, as a left fold of `compress`
    /// seeded with zero.
    fn hash_many(&self, inputs: &[BigUint]) -> Result<BigUint> {
        inputs
            .iter()
            .try_fold(BigUint::zero(), |acc, x| self.compress(&acc, x))
    }
}

/// circomlib Poseidon(2) over the BN254 scalar field.
///
/// This is the hash the layer-two circuit recomputes, so leaf hashes, roots
/// and path elements built with it can be fed to the circuits directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircomPoseidonCompressor;

impl Compressor for CircomPoseidonCompressor {
    fn compress(&self, left: &BigUint, right: &BigUint) -> Result<BigUint> {
        let mut hasher = Poseidon::<Fr>::new_circom(2)
            .map_err(|e| PoaError::InvalidInput(format!("Poseidon parameters: {e}")))?;
        let hash = hasher
            .hash_bytes_be(&[&left.to_bytes_be(), &right.to_bytes_be()])
            .map_err(|e| {
                PoaError::InvalidInput(format!("({left}, {right}) are not BN254 scalars: {e}"))
            })?;
        Ok(BigUint::from_bytes_be(&hash))
    }
}

/// Poseidon `P128Pow5T3` over the Pallas base field.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonCompressor;

impl Compressor for PoseidonCompressor {
    fn compress(&self, left: &BigUint, right: &BigUint) -> Result<BigUint> {
        let l = biguint_to_field(left)?;
        let r = biguint_to_field(right)?;
        Ok(field_to_biguint(poseidon_hash(l, r)))
    }
}
