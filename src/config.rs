//! Configuration file support for the proof-of-assets tools.
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration. Binaries look for the file named by `POA_CONFIG`.

use anyhow::{Context, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::parse_decimal_biguint;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "POA_CONFIG";

const DEFAULT_MAX_INPUT_FILE_SIZE: u64 = 64 * 1024 * 1024;
const DEFAULT_TREE_HEIGHT: u32 = 0;
const DEFAULT_NULL_NODE: &str = "0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub merkle: MerkleConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Upper bound for JSON and CSV inputs, in bytes.
    #[serde(default = "default_max_input_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleConfig {
    /// Levels including the root; 0 picks the smallest height that fits.
    #[serde(default = "default_tree_height")]
    pub tree_height: u32,
    /// Padding node as a decimal string.
    #[serde(default = "default_null_node")]
    pub null_node: String,
    /// Compression function for leaves and inner nodes.
    #[serde(default)]
    pub hash: MerkleHash,
}

/// Poseidon instance used to build the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerkleHash {
    /// circomlib parameters over BN254, matching the circuits.
    #[default]
    CircomPoseidon,
    /// `P128Pow5T3` over the Pallas base field.
    PallasPoseidon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    #[serde(default = "default_parallel_enabled")]
    pub enabled: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_INPUT_FILE_SIZE,
        }
    }
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self {
            tree_height: DEFAULT_TREE_HEIGHT,
            null_node: DEFAULT_NULL_NODE.to_string(),
            hash: MerkleHash::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_max_input_file_size() -> u64 {
    DEFAULT_MAX_INPUT_FILE_SIZE
}

fn default_tree_height() -> u32 {
    DEFAULT_TREE_HEIGHT
}

fn default_null_node() -> String {
    DEFAULT_NULL_NODE.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_parallel_enabled() -> bool {
    true
}

impl MerkleConfig {
    pub fn null_node_value(&self) -> Result<BigUint> {
        parse_decimal_biguint(&self.null_node)
            .with_context(|| format!("Invalid merkle.null_node '{}'", self.null_node))
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .merkle
            .null_node_value()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    /// Loads the file named by `POA_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load_from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Reads an input file after checking it against `input.max_file_size`.
    pub fn read_input(&self, path: &Path) -> Result<String> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat input file: {}", path.display()))?
            .len();
        if size > self.input.max_file_size {
            anyhow::bail!(
                "Input file {} is {} bytes, above the {} byte limit",
                path.display(),
                size,
                self.input.max_file_size
            );
        }
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))
    }

    /// `path` resolved against `output.dir`; absolute paths are kept as is.
    pub fn output_path(&self, path: &Path) -> PathBuf {
        self.output.dir.join(path)
    }
}
