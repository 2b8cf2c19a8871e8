use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use std::fs;
use std::path::{Path, PathBuf};
use zkp_proof_of_assets::{
    circuit_input::{
        check_commitment, commitment_format, layer_three_input, SanitizedProof,
        DEFAULT_BLINDING_FACTOR,
    },
    config::Config,
    pedersen::random_blinding_factor,
    types::{CommitmentCheck, Decimal},
    utils::parse_decimal_biguint,
};

/// Pedersen commitment formatting, layer-three input and commitment checks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the formatted generators and blinding-factor bits
    Format {
        #[arg(short, long, default_value = DEFAULT_BLINDING_FACTOR, conflicts_with = "random")]
        blinding_factor: String,

        /// Draw a fresh blinding factor from the OS RNG
        #[arg(long)]
        random: bool,

        #[arg(short, long, default_value = "pedersen_format.json")]
        output: PathBuf,
    },
    /// Write the layer-three circuit input
    LayerThree {
        #[arg(short = 't', long)]
        merkle_root: PathBuf,

        /// A sanitized proof file, or with `--multiple-proofs` a directory of
        /// `batch_*/sanitized_proof.json`
        #[arg(short = 's', long)]
        layer_two_sanitized_proof: PathBuf,

        #[arg(short, long)]
        multiple_proofs: bool,

        #[arg(short, long, default_value = DEFAULT_BLINDING_FACTOR)]
        blinding_factor: String,

        #[arg(short, long, default_value = "layer_three_input.json")]
        output: PathBuf,
    },
    /// Check a commitment emitted by the layer-three circuit
    Check {
        /// JSON with `commitment` (12 limbs), `balance` and `blinding_factor`
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn parse_blinding_factor(raw: &str) -> Result<BigUint> {
    parse_decimal_biguint(raw).context("Blinding factor must be a decimal integer")
}

/// Numeric suffix of a `batch_<n>` directory.
fn batch_index(path: &Path) -> Option<u64> {
    if !path.is_dir() {
        return None;
    }
    path.file_name()?
        .to_str()?
        .strip_prefix("batch_")?
        .parse()
        .ok()
}

fn load_sanitized_proofs(config: &Config, path: &Path, multiple: bool) -> Result<Vec<SanitizedProof>> {
    let read = |file: &Path| -> Result<SanitizedProof> {
        serde_json::from_str(&config.read_input(file)?)
            .with_context(|| format!("Failed to parse sanitized proof {}", file.display()))
    };

    if !multiple {
        if path.is_dir() {
            anyhow::bail!("Expected {} to be a file", path.display());
        }
        return Ok(vec![read(path)?]);
    }

    if !path.is_dir() {
        anyhow::bail!("Expected {} to be a directory", path.display());
    }
    let mut batch_dirs: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("Failed to list {}", path.display()))? {
        let dir = entry
            .with_context(|| format!("Failed to read an entry of {}", path.display()))?
            .path();
        if let Some(index) = batch_index(&dir) {
            batch_dirs.push((index, dir));
        }
    }
    batch_dirs.sort();

    batch_dirs
        .iter()
        .map(|(_, dir)| {
            log::info!("Found {}; reading sanitized_proof.json", dir.display());
            read(&dir.join("sanitized_proof.json"))
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match &cli.command {
        Command::Format {
            blinding_factor,
            random,
            output,
        } => {
            let blinding = if *random {
                random_blinding_factor()
            } else {
                parse_blinding_factor(blinding_factor)?
            };
            let output = config.output_path(output);
            write_json(&output, &commitment_format(&blinding)?)?;
            if *random {
                println!("Blinding factor: {blinding}");
            }
            println!("Commitment formatting written to {}", output.display());
        }
        Command::LayerThree {
            merkle_root,
            layer_two_sanitized_proof,
            multiple_proofs,
            blinding_factor,
            output,
        } => {
            let root: BigUint = serde_json::from_str::<Decimal>(&config.read_input(merkle_root)?)
                .context("Failed to parse Merkle root")?
                .into();
            let proofs =
                load_sanitized_proofs(&config, layer_two_sanitized_proof, *multiple_proofs)?;
            let blinding = parse_blinding_factor(blinding_factor)?;

            let input = layer_three_input(&proofs, &root, &blinding)?;
            let output = config.output_path(output);
            write_json(&output, &input)?;
            println!("Layer three input written to {}", output.display());
        }
        Command::Check { input } => {
            let check: CommitmentCheck = serde_json::from_str(&config.read_input(input)?)
                .context("Failed to parse commitment check input")?;
            if check_commitment(&check)? {
                println!("Commitment matches balance {}", check.balance);
            } else {
                anyhow::bail!(
                    "Commitment does not match balance {} and the given blinding factor",
                    check.balance
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_batches_load_in_numeric_order() {
        let dir = tempdir().unwrap();
        for (i, balance) in [(10, "1000"), (2, "20"), (1, "10")] {
            let batch = dir.path().join(format!("batch_{i}"));
            fs::create_dir(&batch).unwrap();
            let proof = serde_json::json!({
                "gamma2": [], "delta2": [], "negalfa1xbeta2": [], "IC": [],
                "negpa": [], "pb": [], "pc": [], "pubInput": [balance],
            });
            fs::write(batch.join("sanitized_proof.json"), proof.to_string()).unwrap();
        }
        fs::create_dir(dir.path().join("batch_notes")).unwrap();
        fs::write(dir.path().join("batch_3"), "not a directory").unwrap();

        let proofs = load_sanitized_proofs(&Config::default(), dir.path(), true).unwrap();
        let balances: Vec<BigUint> = proofs.iter().map(|p| p.balance().unwrap()).collect();
        assert_eq!(
            balances,
            vec![BigUint::from(10u32), BigUint::from(20u32), BigUint::from(1000u32)]
        );
    }
}
