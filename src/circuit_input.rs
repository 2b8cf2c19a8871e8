//! Input files for the three circuit layers.
//!
//! - Layer one verifies a batch of ECDSA* signatures.
//! - Layer two checks Merkle inclusion of the batch and binds it to the
//!   layer-one proof through a hash of the public keys.
//! - Layer three sums the layer-two balances into a Pedersen commitment.
//!
//! Groth16 proofs of the lower layers are produced elsewhere and copied
//! through untouched.

use crate::arith::chunk;
use crate::constants::{SECP_CHUNK_BASE, SECP_LIMBS};
use crate::ecdsa_star::AccountAttestation;
use crate::error::{PoaError, Result};
use crate::merkle::{check_address_ordering, verify_proof, Leaf};
use crate::pedersen::{format_generator, format_scalar, generator_g, generator_h, verify_commitment};
use crate::types::{CommitmentCheck, CommitmentFormat, Decimal, MerkleProofBundle};
use crate::utils::{parse_decimal_biguint, Compressor};
use log::{debug, info};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Range;

/// Blinding factor used when none is supplied.
pub const DEFAULT_BLINDING_FACTOR: &str =
    "4869643893319708471955165214975585939793846505679808910535986866633137979160";

/// Resolves the `[start, end)` batch of `len` accounts. `end = None` means
/// "up to the last account".
///
/// # Errors
/// Returns `InvalidInput` unless `start < end <= len`.
pub fn batch_range(len: usize, start: usize, end: Option<usize>) -> Result<Range<usize>> {
    let end = end.unwrap_or(len);
    if start >= end {
        return Err(PoaError::InvalidInput(format!(
            "start index {start} must be less than end index {end}"
        )));
    }
    if end > len {
        return Err(PoaError::InvalidInput(format!(
            "end index {end} is past the {len} available accounts"
        )));
    }
    Ok(start..end)
}

fn secp_limbs(value: &BigUint) -> Result<Vec<Decimal>> {
    Ok(chunk(value, &SECP_CHUNK_BASE, SECP_LIMBS)?
        .into_iter()
        .map(Decimal)
        .collect())
}

fn generator_limbs(limbs: Vec<Vec<BigUint>>) -> Vec<Vec<Decimal>> {
    limbs
        .into_iter()
        .map(|coord| coord.into_iter().map(Decimal).collect())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerOneInput {
    pub r: Vec<Vec<Decimal>>,
    pub s: Vec<Vec<Decimal>>,
    pub rprime: Vec<Vec<Decimal>>,
    pub pubkey: Vec<Vec<Vec<Decimal>>>,
    pub msghash: Vec<Vec<Decimal>>,
}

/// Layer-one input: every signature value as 4 limbs of 64 bits.
pub fn layer_one_input(attestations: &[AccountAttestation]) -> Result<LayerOneInput> {
    let mut input = LayerOneInput {
        r: Vec::with_capacity(attestations.len()),
        s: Vec::with_capacity(attestations.len()),
        rprime: Vec::with_capacity(attestations.len()),
        pubkey: Vec::with_capacity(attestations.len()),
        msghash: Vec::with_capacity(attestations.len()),
    };

    for a in attestations {
        let sig = &a.signature;
        input.r.push(secp_limbs(&sig.r)?);
        input.s.push(secp_limbs(&sig.s)?);
        input.rprime.push(secp_limbs(&sig.r_prime)?);
        input
            .pubkey
            .push(vec![secp_limbs(&sig.pubkey.x)?, secp_limbs(&sig.pubkey.y)?]);
        input
            .msghash
            .push(secp_limbs(&BigUint::from_bytes_be(&sig.msg_hash))?);
    }

    debug!("Layer one input built for {} signatures", attestations.len());
    Ok(input)
}

/// Groth16 proof in the shape the recursive verifier circuits take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub gamma2: Value,
    pub delta2: Value,
    pub negalfa1xbeta2: Value,
    #[serde(rename = "IC")]
    pub ic: Value,
    pub negpa: Value,
    pub pb: Value,
    pub pc: Value,
}

/// Sanitized proof file: the proof plus its public inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedProof {
    #[serde(flatten)]
    pub proof: Groth16Proof,
    #[serde(rename = "pubInput")]
    pub pub_input: Vec<Value>,
}

impl SanitizedProof {
    /// First public input, the batch balance of a layer-two proof.
    pub fn balance(&self) -> Result<BigUint> {
        match self.pub_input.first() {
            Some(Value::String(s)) => parse_decimal_biguint(s),
            Some(Value::Number(n)) => parse_decimal_biguint(&n.to_string()),
            Some(other) => Err(PoaError::InvalidInput(format!(
                "public input is not an integer: {other}"
            ))),
            None => Err(PoaError::InvalidInput(
                "proof has no public inputs".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerTwoInput {
    #[serde(flatten)]
    pub proof: Groth16Proof,
    pub pubkey_x_coord_hash: Decimal,
    pub pubkey: Vec<Vec<Vec<Decimal>>>,
    pub leaf_addresses: Vec<Decimal>,
    pub leaf_balances: Vec<Decimal>,
    pub merkle_root: Decimal,
    pub path_elements: Vec<Vec<Decimal>>,
    pub path_indices: Vec<Vec<u8>>,
}

/// Hash of the 64-bit limbs of every public key x-coordinate, in batch order.
pub fn pubkey_x_coords_hash<C: Compressor + ?Sized>(
    compressor: &C,
    attestations: &[AccountAttestation],
) -> Result<BigUint> {
    let limbs = attestations
        .iter()
        .map(|a| chunk(&a.signature.pubkey.x, &SECP_CHUNK_BASE, SECP_LIMBS))
        .collect::<Result<Vec<_>>>()?
        .concat();
    compressor.hash_many(&limbs)
}

/// Layer-two input for one batch.
///
/// `attestations` and `proofs` must already be cut to the same batch.
///
/// # Errors
/// - `OrderingViolation` if attestations and leaves disagree or are not
///   strictly ascending
/// - `ProofVerificationFailed` if a bundled proof does not fold to `root`
pub fn layer_two_input<C: Compressor + ?Sized>(
    compressor: &C,
    attestations: &[AccountAttestation],
    proofs: &MerkleProofBundle,
    root: &BigUint,
    layer_one_proof: Groth16Proof,
) -> Result<LayerTwoInput> {
    let bundled = proofs.to_proofs(compressor)?;
    let leaves: Vec<Leaf> = bundled.iter().map(|(leaf, _)| leaf.clone()).collect();
    let addresses: Vec<BigUint> = attestations.iter().map(|a| a.address.clone()).collect();
    check_address_ordering(&addresses, &leaves)?;

    for (leaf, proof) in &bundled {
        if !verify_proof(compressor, root, proof) {
            return Err(PoaError::ProofVerificationFailed(leaf.hash.to_string()));
        }
    }

    let hash = pubkey_x_coords_hash(compressor, attestations)?;
    info!("Hash of public keys x-coords: {hash}");

    let pubkey = attestations
        .iter()
        .map(|a| {
            Ok(vec![
                secp_limbs(&a.signature.pubkey.x)?,
                secp_limbs(&a.signature.pubkey.y)?,
            ])
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LayerTwoInput {
        proof: layer_one_proof,
        pubkey_x_coord_hash: Decimal(hash),
        pubkey,
        leaf_addresses: attestations.iter().map(|a| Decimal::from(&a.address)).collect(),
        leaf_balances: attestations.iter().map(|a| Decimal::from(&a.balance)).collect(),
        merkle_root: Decimal::from(root),
        path_elements: proofs.path_elements.clone(),
        path_indices: proofs.path_indices.clone(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerThreeInput {
    pub gamma2: Vec<Value>,
    pub delta2: Vec<Value>,
    pub negalfa1xbeta2: Vec<Value>,
    #[serde(rename = "IC")]
    pub ic: Vec<Value>,
    pub negpa: Vec<Value>,
    pub pb: Vec<Value>,
    pub pc: Vec<Value>,
    pub balances: Vec<Decimal>,
    pub merkle_root: Decimal,
    pub ped_com_generator_g: Vec<Vec<Decimal>>,
    pub ped_com_generator_h: Vec<Vec<Decimal>>,
    pub ped_com_blinding_factor: Vec<u8>,
}

/// Layer-three input over every layer-two proof.
///
/// # Errors
/// Returns `InvalidInput` if there are no proofs or a proof lacks its
/// balance public input.
pub fn layer_three_input(
    layer_two_proofs: &[SanitizedProof],
    root: &BigUint,
    blinding_factor: &BigUint,
) -> Result<LayerThreeInput> {
    if layer_two_proofs.is_empty() {
        return Err(PoaError::InvalidInput(
            "layer three needs at least one layer-two proof".to_string(),
        ));
    }

    let format = commitment_format(blinding_factor)?;
    let mut input = LayerThreeInput {
        gamma2: Vec::new(),
        delta2: Vec::new(),
        negalfa1xbeta2: Vec::new(),
        ic: Vec::new(),
        negpa: Vec::new(),
        pb: Vec::new(),
        pc: Vec::new(),
        balances: Vec::new(),
        merkle_root: Decimal::from(root),
        ped_com_generator_g: format.g,
        ped_com_generator_h: format.h,
        ped_com_blinding_factor: format.blinding_factor_bits,
    };

    for sanitized in layer_two_proofs {
        input.balances.push(Decimal(sanitized.balance()?));
        let proof = sanitized.proof.clone();
        input.gamma2.push(proof.gamma2);
        input.delta2.push(proof.delta2);
        input.negalfa1xbeta2.push(proof.negalfa1xbeta2);
        input.ic.push(proof.ic);
        input.negpa.push(proof.negpa);
        input.pb.push(proof.pb);
        input.pc.push(proof.pc);
    }

    info!(
        "Layer three input built over {} layer-two proofs",
        layer_two_proofs.len()
    );
    Ok(input)
}

/// Formatted G, H and blinding-factor bits.
pub fn commitment_format(blinding_factor: &BigUint) -> Result<CommitmentFormat> {
    Ok(CommitmentFormat {
        g: generator_limbs(format_generator(&generator_g())?),
        h: generator_limbs(format_generator(&generator_h())?),
        blinding_factor_bits: format_scalar(blinding_factor)?,
    })
}

/// Runs [`verify_commitment`] on boundary data.
pub fn check_commitment(check: &CommitmentCheck) -> Result<bool> {
    let limbs: Vec<BigUint> = check.commitment.iter().map(|d| d.0.clone()).collect();
    verify_commitment(&limbs, &check.balance.0, &check.blinding_factor.0)
}
