use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use zkp_proof_of_assets::{
    attest_batch,
    circuit_input::{batch_range, layer_one_input},
    config::Config,
    types::{ProofOfAssetsInput, SignatureData},
};

/// Converts wallet signatures to ECDSA* and prepares layer-one input
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a list of signature records into account attestations
    Convert {
        #[arg(short, long)]
        signatures: PathBuf,

        #[arg(short, long, default_value = "input_data.json")]
        output: PathBuf,
    },
    /// Write the layer-one circuit input for a batch of attestations
    LayerOne {
        #[arg(short = 'i', long)]
        poa_input_data: PathBuf,

        #[arg(short, long, default_value = "layer_one_input.json")]
        output: PathBuf,

        #[arg(short = 's', long, default_value_t = 0)]
        account_start_index: usize,

        /// Exclusive; defaults to the number of attestations
        #[arg(short = 'e', long)]
        account_end_index: Option<usize>,
    },
}

fn convert(config: &Config, signatures: &Path, output: &Path) -> Result<()> {
    println!("Loading signatures from: {:?}", signatures);
    let content = config.read_input(signatures)?;
    let records: Vec<SignatureData> =
        serde_json::from_str(&content).context("Failed to parse signature records")?;
    log::info!("Loaded {} signature records", records.len());

    let attestations = attest_batch(&records, config.parallel.enabled)
        .context("Failed to convert signatures to ECDSA*")?;

    let output_data = ProofOfAssetsInput::from_attestations(&attestations);
    let json = serde_json::to_string_pretty(&output_data)
        .context("Failed to serialize account attestations")?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} account attestations to {}",
        attestations.len(),
        output.display()
    );
    Ok(())
}

fn layer_one(
    config: &Config,
    input: &Path,
    output: &Path,
    start: usize,
    end: Option<usize>,
) -> Result<()> {
    let content = config.read_input(input)?;
    let data: ProofOfAssetsInput =
        serde_json::from_str(&content).context("Failed to parse account attestations")?;
    let attestations = data
        .to_attestations()
        .context("Account attestations failed re-verification")?;

    let range = batch_range(attestations.len(), start, end)?;
    log::info!("Preparing layer one input for accounts {:?}", range);
    let layer_one = layer_one_input(&attestations[range])?;

    let json =
        serde_json::to_string_pretty(&layer_one).context("Failed to serialize layer one input")?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Layer one input written to {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match &cli.command {
        Command::Convert { signatures, output } => {
            convert(&config, signatures, &config.output_path(output))
        }
        Command::LayerOne {
            poa_input_data,
            output,
            account_start_index,
            account_end_index,
        } => layer_one(
            &config,
            poa_input_data,
            &config.output_path(output),
            *account_start_index,
            *account_end_index,
        ),
    }
}
