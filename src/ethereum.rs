//! Ethereum address derivation, validation and normalization.

use crate::constants::ADDRESS_BYTES;
use crate::error::{PoaError, Result};
use crate::utils::validate_and_strip_hex;
use num_bigint::BigUint;
use sha3::{Digest, Keccak256};

/// Expected length of an Ethereum address in hex characters (excluding 0x prefix)
pub const ADDRESS_HEX_LENGTH: usize = 2 * ADDRESS_BYTES;

/// 20-byte Ethereum address.
pub type Address = [u8; ADDRESS_BYTES];

/// Validates and normalizes a single Ethereum address.
///
/// Returns a lowercase hex string without the 0x prefix.
///
/// # Examples
///
/// ```
/// use zkp_proof_of_assets::ethereum::normalize_address;
///
/// let normalized = normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap();
/// assert_eq!(normalized, "742d35cc6634c0532925a3b844bc454e4438f44e");
/// ```
pub fn normalize_address(address: &str) -> Result<String> {
    validate_and_strip_hex(address, ADDRESS_HEX_LENGTH).map(|s| s.to_lowercase())
}

/// Parses a hex address (checksummed or not) into its 20 bytes.
pub fn parse_address(address: &str) -> Result<Address> {
    let normalized = normalize_address(address)?;
    let bytes = hex::decode(&normalized)
        .map_err(|e| PoaError::InvalidInput(format!("Failed to decode address: {e}")))?;
    let mut out = [0u8; ADDRESS_BYTES];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Last 20 bytes of keccak256 over the 64-byte uncompressed key `x || y`.
pub fn address_from_uncompressed(pubkey: &[u8; 64]) -> Address {
    let hash = Keccak256::digest(pubkey);
    let mut address = [0u8; ADDRESS_BYTES];
    address.copy_from_slice(&hash[hash.len() - ADDRESS_BYTES..]);
    address
}

/// Address of the public key with affine coordinates `(x, y)`.
///
/// # Errors
/// Returns `InvalidInput` if a coordinate does not fit in 32 bytes.
pub fn address_from_coordinates(x: &BigUint, y: &BigUint) -> Result<Address> {
    let mut pubkey = [0u8; 64];
    pubkey[..32].copy_from_slice(&to_bytes32(x)?);
    pubkey[32..].copy_from_slice(&to_bytes32(y)?);
    Ok(address_from_uncompressed(&pubkey))
}

/// Big-endian 32-byte encoding, left-padded with zeros.
pub fn to_bytes32(value: &BigUint) -> Result<[u8; 32]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(PoaError::InvalidInput(format!(
            "{value} does not fit in 32 bytes"
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Address as the 160-bit integer used for leaves and ordering.
#[must_use]
pub fn address_to_biguint(address: &Address) -> BigUint {
    BigUint::from_bytes_be(address)
}

/// Inverse of [`address_to_biguint`].
pub fn biguint_to_address(value: &BigUint) -> Result<Address> {
    let bytes = value.to_bytes_be();
    if bytes.len() > ADDRESS_BYTES {
        return Err(PoaError::InvalidInput(format!(
            "{value} is wider than 160 bits"
        )));
    }
    let mut out = [0u8; ADDRESS_BYTES];
    out[ADDRESS_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address_valid() {
        let result = normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e");
        assert_eq!(result.unwrap(), "742d35cc6634c0532925a3b844bc454e4438f44e");
    }

    #[test]
    fn test_normalize_address_invalid_length() {
        assert!(normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438").is_err());
    }

    #[test]
    fn test_normalize_address_invalid_hex() {
        assert!(normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44g").is_err());
    }

    #[test]
    fn test_address_from_known_public_key() {
        // uncompressed key of private key 0x93fe0b17...2eaa
        let pubkey = hex::decode(
            "4d1bce0a18161d4c1354e2f00ee711d24f1f4e87d6c81313ed6151ff5123876f\
             288600a424a24a0ca72167f5ecc7287afb78f35be132de122ab31d1b971c6b7a",
        )
        .unwrap();
        let mut key = [0u8; 64];
        key.copy_from_slice(&pubkey);
        let address = address_from_uncompressed(&key);
        assert_eq!(
            hex::encode(address),
            "668e97bfd9851af354c0508d6c180ddc68244826"
        );
    }

    #[test]
    fn test_address_biguint_roundtrip() {
        let address = parse_address("0x782a37Cc40a61789f80a96450d770ABA841c7EcD").unwrap();
        let value = address_to_biguint(&address);
        assert_eq!(
            value,
            BigUint::parse_bytes(b"686020384476461118200129503363572918284147523277", 10).unwrap()
        );
        assert_eq!(biguint_to_address(&value).unwrap(), address);
    }

    #[test]
    fn test_biguint_to_address_rejects_wide_values() {
        let wide = BigUint::from(1u8) << 160u32;
        assert!(biguint_to_address(&wide).is_err());
    }

    #[test]
    fn test_to_bytes32_pads() {
        let bytes = to_bytes32(&BigUint::from(0x0102u32)).unwrap();
        assert_eq!(bytes[30..], [1, 2]);
        assert!(bytes[..30].iter().all(|&b| b == 0));
    }
}
