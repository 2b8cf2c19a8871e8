//! Error taxonomy for the proof-of-assets core.
//!
//! Every variant is fatal for the operation that raised it. None of them are
//! caused by transient state, so callers never retry.

use thiserror::Error;

/// Errors raised by the arithmetic, signature, Merkle and commitment layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoaError {
    /// Malformed scalar or modulus argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `gcd(a, m) != 1` in a modular inverse.
    #[error("{value} is not invertible modulo {modulus}")]
    NotInvertible { value: String, modulus: String },

    /// Recovery bit outside {0, 1} or a signature the curve rejects.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Recovered address disagrees with the claimed one.
    #[error("address mismatch ({path}): expected 0x{expected}, recovered 0x{recovered}")]
    AddressMismatch {
        path: &'static str,
        expected: String,
        recovered: String,
    },

    /// Requested tree height cannot hold the leaf count.
    #[error("height {height} is not big enough for {leaves} leaves")]
    HeightTooSmall { height: u32, leaves: usize },

    /// Attested leaf absent from the bottom level of the tree.
    #[error("leaf for address {address} (hash {hash}) not found in the tree")]
    LeafNotFound { address: String, hash: String },

    /// A freshly generated proof did not fold back to the root.
    #[error("Merkle proof for leaf {0} failed self-verification")]
    ProofVerificationFailed(String),

    /// Attestation batch not strictly ascending, duplicated, or misaligned
    /// with its Merkle leaves.
    #[error("ordering violation: {0}")]
    OrderingViolation(String),

    /// Value needs more limbs than the configured limb count.
    #[error("value needs {needed} limbs of base {base} but only {available} are available")]
    Overflow {
        needed: usize,
        available: usize,
        base: String,
    },

    /// Boundary data could not be parsed into typed values.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, PoaError>;

impl From<serde_json::Error> for PoaError {
    fn from(err: serde_json::Error) -> Self {
        PoaError::Serialization(err.to_string())
    }
}
