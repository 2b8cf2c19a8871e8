//! Protocol constants shared by every layer.
//!
//! Curve generators, field characteristics and limb widths are defined here
//! once. Changing any of them breaks compatibility with the circuits that
//! consume the prepared inputs.

use num_bigint::BigUint;
use once_cell::sync::Lazy;

/// Width in bits of one limb of an Edwards coordinate.
pub const EDWARDS_LIMB_BITS: usize = 85;

/// Limbs per Edwards coordinate (3 × 85 = 255 bits).
pub const EDWARDS_LIMBS: usize = 3;

/// Coordinates of an extended Edwards point (x, y, z, t).
pub const EDWARDS_COORDS: usize = 4;

/// Limb values that make up one chunked commitment.
pub const COMMITMENT_LIMBS: usize = EDWARDS_COORDS * EDWARDS_LIMBS;

/// Bits of a scalar fed to the commitment circuit.
pub const SCALAR_BITS: usize = 255;

/// Width in bits of one limb of a secp256k1 value.
pub const SECP_LIMB_BITS: usize = 64;

/// Limbs per secp256k1 value (4 × 64 = 256 bits).
pub const SECP_LIMBS: usize = 4;

/// Ethereum addresses are 20 bytes.
pub const ADDRESS_BYTES: usize = 20;

/// Characteristic of the Curve25519 base field, `2^255 - 19`.
pub static ED25519_P: Lazy<BigUint> = Lazy::new(|| (BigUint::from(1u8) << 255u32) - 19u32);

/// `d` in `-x^2 + y^2 = 1 + d x^2 y^2`.
pub static ED25519_D: Lazy<BigUint> = Lazy::new(|| {
    decimal("37095705934669439343138083508754565189542113879843219016388785533085940283555")
});

/// Ed25519 base point in extended coordinates.
pub static GENERATOR_G: Lazy<[BigUint; EDWARDS_COORDS]> = Lazy::new(|| {
    [
        decimal("15112221349535400772501151409588531511454012693041857206046113283949847762202"),
        decimal("46316835694926478169428394003475163141307993866256225615783033603165251855960"),
        BigUint::from(1u8),
        decimal("46827403850823179245072216630277197565144205554125654976674165829533817101731"),
    ]
});

/// Hash of `GENERATOR_G`, matching the Bulletproofs generator used by the
/// DAPOL commitment code.
pub static GENERATOR_H: Lazy<[BigUint; EDWARDS_COORDS]> = Lazy::new(|| {
    [
        decimal("33610936965734216034622052748864527785054979741013463956582067314415336407764"),
        decimal("39037926758455103342491841394431773648115673280860795116462000885017926418697"),
        decimal("44972472311651602601636560056538958210842501314939311016992875096561375476462"),
        decimal("25285931357802837959040485138497351343220742265312934020814563180777586254493"),
    ]
});

/// Order of the secp256k1 group.
pub static SECP256K1_N: Lazy<BigUint> = Lazy::new(|| {
    hex_const("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141")
});

/// `n / 2`; signatures with a larger `s` are "high-s".
pub static SECP256K1_HALF_N: Lazy<BigUint> = Lazy::new(|| &*SECP256K1_N >> 1u32);

/// Characteristic of the secp256k1 base field.
pub static SECP256K1_P: Lazy<BigUint> = Lazy::new(|| {
    hex_const("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f")
});

/// `2^85`, the chunk base for Edwards coordinates.
pub static EDWARDS_CHUNK_BASE: Lazy<BigUint> =
    Lazy::new(|| BigUint::from(1u8) << EDWARDS_LIMB_BITS);

/// `2^64`, the chunk base for secp256k1 values.
pub static SECP_CHUNK_BASE: Lazy<BigUint> = Lazy::new(|| BigUint::from(1u8) << SECP_LIMB_BITS);

fn decimal(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 10).expect("decimal constant is well formed")
}

fn hex_const(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("hex constant is well formed")
}
