//! YAML configuration file support.
//!
//! One file configures signature generation, index construction and query
//! defaults. Missing sections and fields fall back to the runtime defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "catalog"
//!
//! signature:
//!   version: 1
//!   permutation_count: 128
//!   band_size: 8
//!   seed: 10010000
//!   use_parallel: false
//!
//! index:
//!   max_candidates: 10000   # null disables the cap
//!   retain_matrix: false
//!   retain_peak_sets: true
//!   compression: "zstd"
//!   compression_level: 3
//!
//! query:
//!   threshold: 0.3
//!   limit: 10
//! ```

use std::fs;
use std::path::Path;

use index::{CompressionCodec, CompressionConfig, IndexConfig, QueryOptions};
use serde::{Deserialize, Serialize};
use signature::{DEFAULT_BAND_SIZE, DEFAULT_PERMUTATION_COUNT, DEFAULT_SEED, SignatureConfig};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PeakmatchConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub signature: SignatureYamlConfig,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub query: QueryYamlConfig,
}

impl PeakmatchConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PeakmatchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.signature.validate()?;
        self.index.validate()?;
        self.query.validate()?;
        Ok(())
    }

    pub fn signature_config(&self) -> SignatureConfig {
        SignatureConfig {
            version: self.signature.version,
            permutation_count: self.signature.permutation_count,
            band_size: self.signature.band_size,
            seed: self.signature.seed,
            use_parallel: self.signature.use_parallel,
        }
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new()
            .with_signature(self.signature_config())
            .with_max_candidates(self.index.max_candidates)
            .with_retain_matrix(self.index.retain_matrix)
            .with_retain_peak_sets(self.index.retain_peak_sets)
    }

    pub fn compression_config(&self) -> CompressionConfig {
        let codec = match self.index.compression.as_str() {
            "none" => CompressionCodec::None,
            _ => CompressionCodec::Zstd,
        };
        CompressionConfig::new(codec, self.index.compression_level)
    }

    pub fn query_options(&self) -> QueryOptions {
        let opts = QueryOptions::new().with_threshold(self.query.threshold);
        match self.query.limit {
            Some(limit) => opts.with_limit(limit),
            None => opts,
        }
    }
}

impl Default for PeakmatchConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            signature: SignatureYamlConfig::default(),
            index: IndexYamlConfig::default(),
            query: QueryYamlConfig::default(),
        }
    }
}

/// MinHash and banding parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureYamlConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_permutation_count")]
    pub permutation_count: usize,

    #[serde(default = "default_band_size")]
    pub band_size: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub use_parallel: bool,
}

impl SignatureYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.version == 0 {
            return Err(ConfigLoadError::Validation(
                "signature.version must be >= 1".to_string(),
            ));
        }
        if self.permutation_count == 0 {
            return Err(ConfigLoadError::Validation(
                "signature.permutation_count must be >= 1".to_string(),
            ));
        }
        if self.band_size == 0 {
            return Err(ConfigLoadError::Validation(
                "signature.band_size must be >= 1".to_string(),
            ));
        }
        if self.permutation_count % self.band_size != 0 {
            return Err(ConfigLoadError::Validation(format!(
                "signature.band_size ({}) must divide signature.permutation_count ({})",
                self.band_size, self.permutation_count
            )));
        }
        Ok(())
    }
}

impl Default for SignatureYamlConfig {
    fn default() -> Self {
        Self {
            version: 1,
            permutation_count: DEFAULT_PERMUTATION_COUNT,
            band_size: DEFAULT_BAND_SIZE,
            seed: DEFAULT_SEED,
            use_parallel: false,
        }
    }
}

/// Index construction and snapshot settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    #[serde(default = "default_max_candidates")]
    pub max_candidates: Option<usize>,

    #[serde(default)]
    pub retain_matrix: bool,

    #[serde(default = "true_value")]
    pub retain_peak_sets: bool,

    /// `zstd` or `none`
    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_candidates == Some(0) {
            return Err(ConfigLoadError::Validation(
                "index.max_candidates must be >= 1 or null".to_string(),
            ));
        }
        match self.compression.as_str() {
            "zstd" | "none" => {}
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "index.compression must be \"zstd\" or \"none\", got {other:?}"
                )));
            }
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigLoadError::Validation(
                "index.compression_level must be in 1..=22".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            retain_matrix: false,
            retain_peak_sets: true,
            compression: default_compression(),
            compression_level: default_compression_level(),
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryYamlConfig {
    #[serde(default)]
    pub threshold: f64,

    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigLoadError::Validation(format!(
                "query.threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

fn default_version() -> u32 {
    1
}
fn default_permutation_count() -> usize {
    DEFAULT_PERMUTATION_COUNT
}
fn default_band_size() -> usize {
    DEFAULT_BAND_SIZE
}
fn default_seed() -> u64 {
    DEFAULT_SEED
}
fn default_max_candidates() -> Option<usize> {
    Some(index::DEFAULT_MAX_CANDIDATES)
}
fn default_compression() -> String {
    "zstd".to_string()
}
fn default_compression_level() -> i32 {
    3
}
fn true_value() -> bool {
    true
}
