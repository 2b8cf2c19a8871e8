//! Proof-of-assets input preparation
//!
//! Prepares the inputs of a layered zero-knowledge proof of assets: a prover
//! shows that they own Ethereum addresses from a public anonymity set and
//! commits to the sum of their balances without revealing which addresses
//! are theirs.
//!
//! # Components
//!
//! - [`ecdsa_star`]: ECDSA → ECDSA* conversion with a double address check
//! - [`merkle`]: Poseidon Merkle accumulator over `(address, balance)` leaves
//! - [`pedersen`]: Pedersen commitments on Ed25519 and their limb encoding
//! - [`circuit_input`]: input files for the three circuit layers
//!
//! # Example
//!
//! ```
//! use num_bigint::BigUint;
//! use zkp_proof_of_assets::{MerkleAccumulator, PoseidonCompressor};
//!
//! let entries = vec![
//!     (BigUint::from(10u8), BigUint::from(100u8)),
//!     (BigUint::from(20u8), BigUint::from(200u8)),
//! ];
//! let tree = MerkleAccumulator::new(PoseidonCompressor)
//!     .load_leaves(&entries)
//!     .unwrap()
//!     .build(0, &BigUint::from(0u8))
//!     .unwrap();
//! assert_eq!(tree.height(), 2);
//! ```

pub mod arith;
pub mod circuit_input;
pub mod config;
pub mod constants;
pub mod ecdsa_star;
pub mod edwards;
pub mod error;
pub mod ethereum;
pub mod merkle;
pub mod pedersen;
pub mod types;
pub mod utils;

#[cfg(test)]
mod merkle_tests;

pub use ecdsa_star::{
    attest, attest_batch, ecdsa_star_from_ecdsa, AccountAttestation, EcdsaSignature,
    EcdsaStarSignature, K256Recovery, KeyRecovery, PublicKey,
};
pub use edwards::EdwardsPoint;
pub use error::{PoaError, Result};
pub use merkle::{Leaf, MerkleAccumulator, MerkleProof, MerkleTree};
pub use pedersen::{commit, verify_commitment};
pub use utils::{CircomPoseidonCompressor, Compressor, PoseidonCompressor};
