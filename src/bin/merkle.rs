use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use std::fs;
use std::path::{Path, PathBuf};
use zkp_proof_of_assets::{
    circuit_input::{batch_range, layer_two_input, SanitizedProof},
    config::{Config, MerkleHash},
    merkle::{Leaf, MerkleAccumulator},
    types::{parse_anonymity_set_csv, Decimal, MerkleProofBundle, ProofOfAssetsInput},
    CircomPoseidonCompressor, Compressor, PoseidonCompressor,
};

/// Builds the anonymity-set Merkle tree and prepares layer-two input
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the tree and the inclusion proofs of every attested account
    Build {
        /// CSV with an `address,eth_balance` header
        #[arg(short, long)]
        anonymity_set: PathBuf,

        #[arg(short = 'i', long)]
        poa_input_data: PathBuf,

        /// Overrides `merkle.tree_height` from the config
        #[arg(long)]
        height: Option<u32>,

        #[arg(long, default_value = "merkle_root.json")]
        root_output: PathBuf,

        #[arg(long, default_value = "merkle_proofs.json")]
        proofs_output: PathBuf,
    },
    /// Write the layer-two circuit input for one batch
    LayerTwo {
        #[arg(short = 'i', long)]
        poa_input_data: PathBuf,

        #[arg(short = 't', long)]
        merkle_root: PathBuf,

        #[arg(short = 'p', long)]
        merkle_proofs: PathBuf,

        #[arg(short = 'd', long)]
        layer_one_sanitized_proof: PathBuf,

        #[arg(short, long, default_value = "layer_two_input.json")]
        output: PathBuf,

        #[arg(short = 's', long, default_value_t = 0)]
        account_start_index: usize,

        /// Exclusive; defaults to the number of attestations
        #[arg(short = 'e', long)]
        account_end_index: Option<usize>,
    },
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
fn build<C: Compressor>(
    compressor: C,
    config: &Config,
    anonymity_set: &Path,
    poa_input_data: &Path,
    height: Option<u32>,
    root_output: &Path,
    proofs_output: &Path,
) -> Result<()> {
    println!("Loading anonymity set from: {:?}", anonymity_set);
    let entries = parse_anonymity_set_csv(&config.read_input(anonymity_set)?)
        .context("Failed to parse anonymity set")?;
    println!("Loaded {} accounts", entries.len());

    let data: ProofOfAssetsInput = serde_json::from_str(&config.read_input(poa_input_data)?)
        .context("Failed to parse account attestations")?;
    let attestations = data.to_attestations()?;

    let height = height.unwrap_or(config.merkle.tree_height);
    let null_node = config.merkle.null_node_value()?;

    println!("Building Merkle tree ({:?})...", config.merkle.hash);
    let tree = MerkleAccumulator::new(compressor)
        .with_parallel(config.parallel.enabled)
        .load_leaves(&entries)?
        .build(height, &null_node)?;
    println!("Merkle root: {}", tree.root());

    let targets: Vec<Leaf> = attestations
        .iter()
        .map(|a| tree.find_leaf(&a.address, &a.balance).cloned())
        .collect::<zkp_proof_of_assets::Result<_>>()
        .context("Attested account is missing from the anonymity set")?;

    println!("Generating {} Merkle proofs...", targets.len());
    let proven = tree.prove(&targets)?;

    write_json(root_output, &Decimal::from(proven.root()))?;
    write_json(proofs_output, &MerkleProofBundle::from_proven(&proven))?;

    println!("Merkle root written to {}", root_output.display());
    println!("Merkle proofs written to {}", proofs_output.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn layer_two<C: Compressor + ?Sized>(
    compressor: &C,
    config: &Config,
    poa_input_data: &Path,
    merkle_root: &Path,
    merkle_proofs: &Path,
    layer_one_sanitized_proof: &Path,
    output: &Path,
    start: usize,
    end: Option<usize>,
) -> Result<()> {
    let data: ProofOfAssetsInput = serde_json::from_str(&config.read_input(poa_input_data)?)
        .context("Failed to parse account attestations")?;
    let attestations = data.to_attestations()?;

    let root: BigUint = serde_json::from_str::<Decimal>(&config.read_input(merkle_root)?)
        .context("Failed to parse Merkle root")?
        .into();
    let bundle: MerkleProofBundle = serde_json::from_str(&config.read_input(merkle_proofs)?)
        .context("Failed to parse Merkle proofs")?;
    let sanitized: SanitizedProof =
        serde_json::from_str(&config.read_input(layer_one_sanitized_proof)?)
            .context("Failed to parse layer one proof")?;

    let range = batch_range(attestations.len(), start, end)?;
    log::info!("Preparing layer two input for accounts {:?}", range);
    let batch = bundle.slice(range.start, range.end)?;

    let input = layer_two_input(
        compressor,
        &attestations[range],
        &batch,
        &root,
        sanitized.proof,
    )?;
    write_json(output, &input)?;

    println!("Hash of public keys x-coords: {}", input.pubkey_x_coord_hash);
    println!("Layer two input written to {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match &cli.command {
        Command::Build {
            anonymity_set,
            poa_input_data,
            height,
            root_output,
            proofs_output,
        } => {
            let root_output = config.output_path(root_output);
            let proofs_output = config.output_path(proofs_output);
            match config.merkle.hash {
                MerkleHash::CircomPoseidon => build(
                    CircomPoseidonCompressor,
                    &config,
                    anonymity_set,
                    poa_input_data,
                    *height,
                    &root_output,
                    &proofs_output,
                ),
                MerkleHash::PallasPoseidon => build(
                    PoseidonCompressor,
                    &config,
                    anonymity_set,
                    poa_input_data,
                    *height,
                    &root_output,
                    &proofs_output,
                ),
            }
        }
        Command::LayerTwo {
            poa_input_data,
            merkle_root,
            merkle_proofs,
            layer_one_sanitized_proof,
            output,
            account_start_index,
            account_end_index,
        } => {
            let compressor: &dyn Compressor = match config.merkle.hash {
                MerkleHash::CircomPoseidon => &CircomPoseidonCompressor,
                MerkleHash::PallasPoseidon => &PoseidonCompressor,
            };
            layer_two(
                compressor,
                &config,
                poa_input_data,
                merkle_root,
                merkle_proofs,
                layer_one_sanitized_proof,
                &config.output_path(output),
                *account_start_index,
                *account_end_index,
            )
        }
    }
}
