//! JSON/CSV boundary schema.
//!
//! Every integer that can exceed 64 bits travels as a decimal string
//! ([`Decimal`]); signatures arrive as hex. Conversions into the core types
//! validate as they go, so the rest of the crate never sees loose JSON.

use crate::ecdsa_star::{
    recover_address_ecdsa_star, AccountAttestation, EcdsaSignature, EcdsaStarSignature, PublicKey,
};
use crate::error::{PoaError, Result};
use crate::ethereum::{address_to_biguint, biguint_to_address, parse_address, Address};
use crate::merkle::{Leaf, MerkleProof, ProvenTree};
use crate::utils::{hex_to_bytes, parse_balance, parse_decimal_biguint, parse_hex_biguint, Compressor};
use log::debug;
use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Arbitrary-precision integer serialized as a base-10 string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal(pub BigUint);

impl From<BigUint> for Decimal {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<&BigUint> for Decimal {
    fn from(value: &BigUint) -> Self {
        Self(value.clone())
    }
}

impl From<Decimal> for BigUint {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_decimal_biguint(&raw)
            .map(Decimal)
            .map_err(de::Error::custom)
    }
}

fn decimals(values: &[BigUint]) -> Vec<Decimal> {
    values.iter().map(Decimal::from).collect()
}

fn biguints(values: &[Decimal]) -> Vec<BigUint> {
    values.iter().map(|d| d.0.clone()).collect()
}

/// Raw ECDSA signature as produced by wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureRecord {
    pub r: String,
    pub s: String,
    pub v: u64,
    pub msghash: String,
}

impl SignatureRecord {
    pub fn to_signature(&self) -> Result<EcdsaSignature> {
        EcdsaSignature::from_v(
            parse_hex_biguint(&self.r)?,
            parse_hex_biguint(&self.s)?,
            self.v,
            hex_to_bytes(&self.msghash)?,
        )
    }
}

/// One entry of the signature input file.
///
/// `balance` is a decimal string; the legacy `123n` spelling is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureData {
    pub signature: SignatureRecord,
    pub address: String,
    pub balance: String,
}

impl SignatureData {
    pub fn parse(&self) -> Result<(EcdsaSignature, Address, BigUint)> {
        Ok((
            self.signature.to_signature()?,
            parse_address(&self.address)?,
            parse_balance(&self.balance)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PubkeyJson {
    pub x: Decimal,
    pub y: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureStarJson {
    pub r: Decimal,
    pub s: Decimal,
    pub r_prime: Decimal,
    pub pubkey: PubkeyJson,
    pub msghash: Vec<u8>,
}

impl From<&EcdsaStarSignature> for SignatureStarJson {
    fn from(sig: &EcdsaStarSignature) -> Self {
        Self {
            r: Decimal::from(&sig.r),
            s: Decimal::from(&sig.s),
            r_prime: Decimal::from(&sig.r_prime),
            pubkey: PubkeyJson {
                x: Decimal::from(&sig.pubkey.x),
                y: Decimal::from(&sig.pubkey.y),
            },
            msghash: sig.msg_hash.clone(),
        }
    }
}

impl From<&SignatureStarJson> for EcdsaStarSignature {
    fn from(json: &SignatureStarJson) -> Self {
        Self {
            r: json.r.0.clone(),
            s: json.s.0.clone(),
            r_prime: json.r_prime.0.clone(),
            pubkey: PublicKey {
                x: json.pubkey.x.0.clone(),
                y: json.pubkey.y.0.clone(),
            },
            msg_hash: json.msghash.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountData {
    pub address: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountAttestationJson {
    pub signature: SignatureStarJson,
    pub account_data: AccountData,
}

impl From<&AccountAttestation> for AccountAttestationJson {
    fn from(a: &AccountAttestation) -> Self {
        Self {
            signature: SignatureStarJson::from(&a.signature),
            account_data: AccountData {
                address: Decimal::from(&a.address),
                balance: Decimal::from(&a.balance),
            },
        }
    }
}

impl AccountAttestationJson {
    /// Converts back to the core type, re-checking the ECDSA* relation and
    /// that the signing key owns `account_data.address`.
    ///
    /// # Errors
    /// Returns `AddressMismatch` if the attestation does not hold.
    pub fn to_attestation(&self) -> Result<AccountAttestation> {
        let signature = EcdsaStarSignature::from(&self.signature);
        let claimed: Address = biguint_to_address(&self.account_data.address.0)?;
        let recovered = recover_address_ecdsa_star(&signature).map_err(|e| {
            PoaError::AddressMismatch {
                path: "ecdsa*",
                expected: hex::encode(claimed),
                recovered: format!("<none: {e}>"),
            }
        })?;
        if recovered != claimed {
            return Err(PoaError::AddressMismatch {
                path: "ecdsa*",
                expected: hex::encode(claimed),
                recovered: hex::encode(recovered),
            });
        }

        Ok(AccountAttestation {
            signature,
            address: address_to_biguint(&claimed),
            balance: self.account_data.balance.0.clone(),
        })
    }
}

/// Output of the ECDSA* conversion step, input of the circuit builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProofOfAssetsInput {
    pub account_attestations: Vec<AccountAttestationJson>,
}

impl ProofOfAssetsInput {
    pub fn from_attestations(attestations: &[AccountAttestation]) -> Self {
        Self {
            account_attestations: attestations.iter().map(AccountAttestationJson::from).collect(),
        }
    }

    pub fn to_attestations(&self) -> Result<Vec<AccountAttestation>> {
        self.account_attestations
            .iter()
            .map(AccountAttestationJson::to_attestation)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafJson {
    pub address: Decimal,
    pub balance: Decimal,
    pub hash: Decimal,
}

impl From<&Leaf> for LeafJson {
    fn from(leaf: &Leaf) -> Self {
        Self {
            address: Decimal::from(&leaf.address),
            balance: Decimal::from(&leaf.balance),
            hash: Decimal::from(&leaf.hash),
        }
    }
}

impl From<&LeafJson> for Leaf {
    fn from(json: &LeafJson) -> Self {
        Self {
            address: json.address.0.clone(),
            balance: json.balance.0.clone(),
            hash: json.hash.0.clone(),
        }
    }
}

/// Proofs for a batch of leaves, one entry per leaf in each array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerkleProofBundle {
    pub leaves: Vec<LeafJson>,
    pub path_elements: Vec<Vec<Decimal>>,
    pub path_indices: Vec<Vec<u8>>,
}

impl MerkleProofBundle {
    pub fn from_proven<C: Compressor>(proven: &ProvenTree<C>) -> Self {
        Self {
            leaves: proven.targets().iter().map(LeafJson::from).collect(),
            path_elements: proven
                .proofs()
                .iter()
                .map(|p| decimals(&p.path_elements))
                .collect(),
            path_indices: proven
                .proofs()
                .iter()
                .map(|p| p.path_indices.clone())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves and proofs, after checking the three arrays line up and every
    /// leaf hash matches `compress(address, balance)`.
    pub fn to_proofs<C: Compressor + ?Sized>(
        &self,
        compressor: &C,
    ) -> Result<Vec<(Leaf, MerkleProof)>> {
        if self.path_elements.len() != self.leaves.len()
            || self.path_indices.len() != self.leaves.len()
        {
            return Err(PoaError::InvalidInput(format!(
                "proof bundle arrays differ in length: {} leaves, {} element paths, {} index paths",
                self.leaves.len(),
                self.path_elements.len(),
                self.path_indices.len()
            )));
        }

        self.leaves
            .iter()
            .zip(&self.path_elements)
            .zip(&self.path_indices)
            .map(|((leaf, elements), indices)| {
                let leaf = Leaf::from(leaf);
                let expected = compressor.compress(&leaf.address, &leaf.balance)?;
                if expected != leaf.hash {
                    return Err(PoaError::InvalidInput(format!(
                        "leaf hash for address {} does not match its contents",
                        leaf.address
                    )));
                }
                let proof = MerkleProof {
                    leaf: leaf.hash.clone(),
                    path_elements: biguints(elements),
                    path_indices: indices.clone(),
                };
                Ok((leaf, proof))
            })
            .collect()
    }

    /// Sub-bundle for accounts `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.leaves.len() {
            return Err(PoaError::InvalidInput(format!(
                "invalid batch range [{start}, {end}) for {} proofs",
                self.leaves.len()
            )));
        }
        Ok(Self {
            leaves: self.leaves[start..end].to_vec(),
            path_elements: self.path_elements[start..end].to_vec(),
            path_indices: self.path_indices[start..end].to_vec(),
        })
    }
}

/// Generator and blinding-factor formatting for the commitment circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitmentFormat {
    pub g: Vec<Vec<Decimal>>,
    pub h: Vec<Vec<Decimal>>,
    pub blinding_factor_bits: Vec<u8>,
}

/// Inputs to a commitment check: the 12 limbs emitted by the circuit plus
/// the opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitmentCheck {
    pub commitment: Vec<Decimal>,
    pub balance: Decimal,
    pub blinding_factor: Decimal,
}

const ANONYMITY_SET_HEADER: [&str; 2] = ["address", "eth_balance"];

/// One row of the anonymity-set CSV.
#[derive(Debug, Deserialize)]
struct AnonymitySetRow {
    address: String,
    eth_balance: String,
}

fn csv_error(err: csv::Error) -> PoaError {
    match err.position() {
        Some(pos) => PoaError::InvalidInput(format!("anonymity set line {}: {err}", pos.line())),
        None => PoaError::InvalidInput(format!("anonymity set: {err}")),
    }
}

/// Parses an `address,eth_balance` CSV with a header row.
///
/// Addresses are hex, balances decimal. Quoted fields are accepted and blank
/// lines are skipped.
///
/// # Errors
/// Returns `InvalidInput` naming the offending line.
pub fn parse_anonymity_set_csv(content: &str) -> Result<Vec<(BigUint, BigUint)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(PoaError::InvalidInput("empty anonymity set".to_string()));
    }
    if headers.iter().ne(ANONYMITY_SET_HEADER) {
        return Err(PoaError::InvalidInput(format!(
            "expected CSV header 'address,eth_balance', got '{}'",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map_or(0, |pos| pos.line());
        let row: AnonymitySetRow = record.deserialize(Some(&headers)).map_err(csv_error)?;
        let parsed = parse_address(&row.address)
            .map(|address| address_to_biguint(&address))
            .and_then(|address| Ok((address, parse_balance(&row.eth_balance)?)))
            .map_err(|e| PoaError::InvalidInput(format!("anonymity set line {line}: {e}")))?;
        entries.push(parsed);
    }

    debug!("Parsed {} anonymity set entries", entries.len());
    Ok(entries)
}
