//! Merkle accumulator over `(address, balance)` leaves.
//!
//! Leaves are hashed with a 2-to-1 [`Compressor`], padded with a null node
//! up to `2^(height-1)` entries and sorted ascending before the levels are
//! folded pairwise into the root. The lifecycle is encoded in the types:
//!
//! ```text
//! MerkleAccumulator --load_leaves--> LoadedLeaves --build--> MerkleTree --prove--> ProvenTree
//! ```

use crate::error::{PoaError, Result};
use crate::utils::Compressor;
use log::{debug, info};
use num_bigint::BigUint;
use rayon::prelude::*;
use std::fmt;

/// Largest supported height; the bottom level is materialised in memory.
pub const MAX_TREE_HEIGHT: u32 = 32;

/// An `(address, balance)` entry with its compressed hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub address: BigUint,
    pub balance: BigUint,
    pub hash: BigUint,
}

/// Inclusion proof. `path_indices[i] == 1` means the running node is the
/// right child at level `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: BigUint,
    pub path_elements: Vec<BigUint>,
    pub path_indices: Vec<u8>,
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof:\n  Leaf: {}\n  Depth: {}\n  Indices: {:?}",
            self.leaf,
            self.path_elements.len(),
            self.path_indices
        )
    }
}

/// `compress(address, balance)`.
pub fn hash_leaf<C: Compressor + ?Sized>(
    compressor: &C,
    address: &BigUint,
    balance: &BigUint,
) -> Result<BigUint> {
    compressor.compress(address, balance)
}

/// Smallest height whose bottom level holds `leaves` entries.
fn auto_height(leaves: usize) -> u32 {
    // ceil(log2(n)) + 1
    let mut height = 1;
    while (1usize << (height - 1)) < leaves {
        height += 1;
    }
    height
}

fn compress_level<C: Compressor + ?Sized>(
    compressor: &C,
    level: &[BigUint],
    parallel: bool,
) -> Result<Vec<BigUint>> {
    if parallel {
        level
            .par_chunks(2)
            .map(|pair| compressor.compress(&pair[0], &pair[1]))
            .collect()
    } else {
        level
            .chunks(2)
            .map(|pair| compressor.compress(&pair[0], &pair[1]))
            .collect()
    }
}

/// Builds every level of the tree, bottom level first.
///
/// # Arguments
/// * `leaf_hashes` - Hashes of the real leaves, in any order
/// * `target_height` - Number of levels including the root; `0` picks the
///   smallest height that fits
/// * `null_value` - Padding node
///
/// # Errors
/// - `InvalidInput` if there are no leaves
/// - `HeightTooSmall` if more than `2^(target_height-1)` leaves are given
pub fn build_tree<C: Compressor + ?Sized>(
    compressor: &C,
    leaf_hashes: &[BigUint],
    target_height: u32,
    null_value: &BigUint,
    parallel: bool,
) -> Result<Vec<Vec<BigUint>>> {
    if leaf_hashes.is_empty() {
        return Err(PoaError::InvalidInput(
            "cannot build a Merkle tree without leaves".to_string(),
        ));
    }

    let height = if target_height == 0 {
        auto_height(leaf_hashes.len())
    } else {
        target_height
    };
    if height > MAX_TREE_HEIGHT {
        return Err(PoaError::InvalidInput(format!(
            "tree height {height} exceeds the maximum of {MAX_TREE_HEIGHT}"
        )));
    }
    let capacity = 1usize << (height - 1);
    if leaf_hashes.len() > capacity {
        return Err(PoaError::HeightTooSmall {
            height,
            leaves: leaf_hashes.len(),
        });
    }

    let mut bottom = leaf_hashes.to_vec();
    bottom.resize(capacity, null_value.clone());
    bottom.sort();
    debug!(
        "Merkle bottom level: {} leaves, {} null nodes",
        leaf_hashes.len(),
        capacity - leaf_hashes.len()
    );

    let mut levels = vec![bottom];
    while levels.last().map_or(0, Vec::len) > 1 {
        let current = &levels[levels.len() - 1];
        let next = compress_level(compressor, current, parallel)?;
        levels.push(next);
    }
    Ok(levels)
}

/// Each level must hold twice as many nodes as the one above it, ending in a
/// single root.
fn check_levels_shape(levels: &[Vec<BigUint>]) -> Result<()> {
    let top = levels
        .last()
        .ok_or_else(|| PoaError::InvalidInput("empty Merkle tree".to_string()))?;
    if top.len() != 1 {
        return Err(PoaError::InvalidInput(format!(
            "top level has {} nodes, expected 1",
            top.len()
        )));
    }
    for (depth, pair) in levels.windows(2).enumerate() {
        if pair[0].len() != 2 * pair[1].len() {
            return Err(PoaError::InvalidInput(format!(
                "level {depth} has {} nodes, expected {}",
                pair[0].len(),
                2 * pair[1].len()
            )));
        }
    }
    Ok(())
}

/// Builds the inclusion proof for `leaf` and checks it against the root.
///
/// # Errors
/// - `InvalidInput` if `levels` is not a complete binary tree
/// - `LeafNotFound` if the hash is not in the bottom level
/// - `ProofVerificationFailed` if the freshly built proof does not fold to
///   the root
pub fn generate_proof<C: Compressor + ?Sized>(
    compressor: &C,
    levels: &[Vec<BigUint>],
    leaf: &BigUint,
) -> Result<MerkleProof> {
    check_levels_shape(levels)?;
    let mut index = levels[0]
        .iter()
        .position(|h| h == leaf)
        .ok_or_else(|| PoaError::LeafNotFound {
            address: String::from("?"),
            hash: leaf.to_string(),
        })?;

    let depth = levels.len() - 1;
    let mut path_elements = Vec::with_capacity(depth);
    let mut path_indices = Vec::with_capacity(depth);
    for level in &levels[..depth] {
        path_elements.push(level[index ^ 1].clone());
        path_indices.push((index & 1) as u8);
        index /= 2;
    }

    let proof = MerkleProof {
        leaf: leaf.clone(),
        path_elements,
        path_indices,
    };

    let root = &levels[depth][0];
    if !verify_proof(compressor, root, &proof) {
        debug!("Proof for leaf {leaf} does not fold to root {root}");
        return Err(PoaError::ProofVerificationFailed(leaf.to_string()));
    }
    Ok(proof)
}

/// Folds `proof` up to a root and compares.
///
/// Never errors: a length mismatch, an index outside `{0, 1}` or a value the
/// compressor rejects all yield `false`.
pub fn verify_proof<C: Compressor + ?Sized>(
    compressor: &C,
    root: &BigUint,
    proof: &MerkleProof,
) -> bool {
    if proof.path_elements.len() != proof.path_indices.len() {
        return false;
    }

    let mut current = proof.leaf.clone();
    for (sibling, &index) in proof.path_elements.iter().zip(&proof.path_indices) {
        let next = match index {
            0 => compressor.compress(&current, sibling),
            1 => compressor.compress(sibling, &current),
            _ => return false,
        };
        match next {
            Ok(hash) => current = hash,
            Err(_) => return false,
        }
    }

    &current == root
}

/// Checks that `addresses` are strictly ascending, which also rules out
/// duplicates.
pub fn ensure_strictly_ascending(addresses: &[BigUint]) -> Result<()> {
    for (i, pair) in addresses.windows(2).enumerate() {
        if pair[0] >= pair[1] {
            return Err(PoaError::OrderingViolation(format!(
                "address at position {} ({}) is not below position {} ({})",
                i,
                pair[0],
                i + 1,
                pair[1]
            )));
        }
    }
    Ok(())
}

/// Checks that attestations and Merkle leaves describe the same accounts in
/// the same strictly ascending order.
///
/// # Errors
/// Returns `OrderingViolation` on a length mismatch, a pairwise address
/// mismatch or a non-ascending sequence.
pub fn check_address_ordering(attested: &[BigUint], leaves: &[Leaf]) -> Result<()> {
    if attested.len() != leaves.len() {
        return Err(PoaError::OrderingViolation(format!(
            "{} attestations but {} Merkle leaves",
            attested.len(),
            leaves.len()
        )));
    }
    if let Some((i, (a, leaf))) = attested
        .iter()
        .zip(leaves)
        .enumerate()
        .find(|(_, (a, leaf))| *a != &leaf.address)
    {
        return Err(PoaError::OrderingViolation(format!(
            "attestation {i} is for address {a} but the leaf is for {}",
            leaf.address
        )));
    }
    ensure_strictly_ascending(attested)
}

/// `Empty` state: a compressor and nothing else.
#[derive(Debug, Clone)]
pub struct MerkleAccumulator<C> {
    compressor: C,
    parallel: bool,
}

impl<C: Compressor> MerkleAccumulator<C> {
    pub fn new(compressor: C) -> Self {
        Self {
            compressor,
            parallel: true,
        }
    }

    /// Toggles rayon for leaf hashing, level compression and proofs.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Hashes every `(address, balance)` entry.
    pub fn load_leaves(self, entries: &[(BigUint, BigUint)]) -> Result<LoadedLeaves<C>> {
        let hash = |(address, balance): &(BigUint, BigUint)| -> Result<Leaf> {
            Ok(Leaf {
                address: address.clone(),
                balance: balance.clone(),
                hash: hash_leaf(&self.compressor, address, balance)?,
            })
        };
        let leaves = if self.parallel {
            entries.par_iter().map(hash).collect::<Result<Vec<_>>>()?
        } else {
            entries.iter().map(hash).collect::<Result<Vec<_>>>()?
        };
        debug!("Hashed {} Merkle leaves", leaves.len());

        Ok(LoadedLeaves {
            compressor: self.compressor,
            parallel: self.parallel,
            leaves,
        })
    }
}

/// `LeavesLoaded` state.
#[derive(Debug, Clone)]
pub struct LoadedLeaves<C> {
    compressor: C,
    parallel: bool,
    leaves: Vec<Leaf>,
}

impl<C: Compressor> LoadedLeaves<C> {
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// See [`build_tree`].
    pub fn build(self, target_height: u32, null_value: &BigUint) -> Result<MerkleTree<C>> {
        let hashes: Vec<BigUint> = self.leaves.iter().map(|l| l.hash.clone()).collect();
        let levels = build_tree(
            &self.compressor,
            &hashes,
            target_height,
            null_value,
            self.parallel,
        )?;
        info!(
            "Merkle root computed over {} leaves (height {})",
            self.leaves.len(),
            levels.len()
        );

        Ok(MerkleTree {
            compressor: self.compressor,
            parallel: self.parallel,
            leaves: self.leaves,
            levels,
        })
    }
}

/// `TreeBuilt` state. Immutable once built.
#[derive(Debug, Clone)]
pub struct MerkleTree<C> {
    compressor: C,
    parallel: bool,
    leaves: Vec<Leaf>,
    levels: Vec<Vec<BigUint>>,
}

impl<C: Compressor> MerkleTree<C> {
    pub fn root(&self) -> &BigUint {
        // build_tree always ends with a single-node level
        &self.levels[self.levels.len() - 1][0]
    }

    /// Number of levels including the root.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[Vec<BigUint>] {
        &self.levels
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    /// Finds the leaf for `(address, balance)` among the loaded leaves.
    pub fn find_leaf(&self, address: &BigUint, balance: &BigUint) -> Result<&Leaf> {
        self.leaves
            .iter()
            .find(|l| &l.address == address && &l.balance == balance)
            .ok_or_else(|| PoaError::LeafNotFound {
                address: address.to_string(),
                hash: String::from("?"),
            })
    }

    /// Proof for one leaf hash. See [`generate_proof`].
    pub fn proof_for(&self, leaf_hash: &BigUint) -> Result<MerkleProof> {
        generate_proof(&self.compressor, &self.levels, leaf_hash).map_err(|e| match e {
            PoaError::LeafNotFound { hash, .. } => {
                let address = self
                    .leaves
                    .iter()
                    .find(|l| l.hash.to_string() == hash)
                    .map_or_else(|| String::from("?"), |l| l.address.to_string());
                PoaError::LeafNotFound { address, hash }
            }
            other => other,
        })
    }

    pub fn verify(&self, proof: &MerkleProof) -> bool {
        verify_proof(&self.compressor, self.root(), proof)
    }

    /// Generates proofs for `targets` and moves to `ProofsGenerated`.
    pub fn prove(self, targets: &[Leaf]) -> Result<ProvenTree<C>> {
        let proofs = if self.parallel {
            targets
                .par_iter()
                .map(|leaf| self.proof_for(&leaf.hash))
                .collect::<Result<Vec<_>>>()?
        } else {
            targets
                .iter()
                .map(|leaf| self.proof_for(&leaf.hash))
                .collect::<Result<Vec<_>>>()?
        };
        info!("Generated {} Merkle proofs", proofs.len());

        Ok(ProvenTree {
            tree: self,
            targets: targets.to_vec(),
            proofs,
        })
    }
}

/// `ProofsGenerated` state.
#[derive(Debug, Clone)]
pub struct ProvenTree<C> {
    tree: MerkleTree<C>,
    targets: Vec<Leaf>,
    proofs: Vec<MerkleProof>,
}

impl<C: Compressor> ProvenTree<C> {
    pub fn tree(&self) -> &MerkleTree<C> {
        &self.tree
    }

    pub fn root(&self) -> &BigUint {
        self.tree.root()
    }

    /// Proven leaves, in the order they were requested.
    pub fn targets(&self) -> &[Leaf] {
        &self.targets
    }

    pub fn proofs(&self) -> &[MerkleProof] {
        &self.proofs
    }
}
