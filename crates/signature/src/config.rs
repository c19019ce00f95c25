//! Configuration and error types for peak signatures.
//!
//! The signature stage is a pure function of `(peak sets, config)`. Nothing
//! here reads the environment or the clock, so two builds with equal configs
//! over the same corpus produce bit-identical signatures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seed shared by every index build unless the caller overrides it.
pub const DEFAULT_SEED: u64 = 10_010_000;

/// Default number of MinHash permutations (16 bands of 8 rows).
pub const DEFAULT_PERMUTATION_COUNT: usize = 128;

/// Default number of signature rows hashed together into one bucket.
///
/// With [`DEFAULT_PERMUTATION_COUNT`] this favours precision: a pair at
/// Jaccard 0.5 shares a bucket only about 6% of the time, while pairs above
/// 0.8 are almost always found. Lower the band size (1 to 4) when moderately
/// similar tracks must be returned.
pub const DEFAULT_BAND_SIZE: usize = 8;

/// Configuration for MinHash signatures and their banding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureConfig {
    /// Configuration schema version.
    ///
    /// Bump whenever a change can alter signatures so stored indexes stay
    /// comparable.
    pub version: u32,
    /// Number of independent hash permutations (`k`).
    pub permutation_count: usize,
    /// Signature rows per band (`B`). `permutation_count` must be a multiple.
    ///
    /// Shorter bands raise recall and false positives; longer bands do the
    /// opposite.
    pub band_size: usize,
    /// Seed for both universal hash families.
    pub seed: u64,
    /// Compute signatures across tracks with rayon.
    pub use_parallel: bool,
}

impl SignatureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of MinHash permutations.
    pub fn with_permutation_count(mut self, permutation_count: usize) -> Self {
        self.permutation_count = permutation_count;
        self
    }

    /// Set the number of rows per band.
    pub fn with_band_size(mut self, band_size: usize) -> Self {
        self.band_size = band_size;
        self
    }

    /// Set the seed for hash parameter generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable parallel signature computation.
    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    /// Number of bands a signature splits into.
    ///
    /// Only meaningful once [`validate`](Self::validate) has passed.
    pub fn band_count(&self) -> usize {
        if self.band_size == 0 {
            0
        } else {
            self.permutation_count / self.band_size
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), SignatureError> {
        if self.version < 1 {
            return Err(SignatureError::InvalidConfigVersion {
                version: self.version,
            });
        }
        if self.permutation_count < 1 {
            return Err(SignatureError::InvalidPermutationCount {
                permutations: self.permutation_count,
            });
        }
        if self.band_size < 1 {
            return Err(SignatureError::InvalidBandSize {
                band_size: self.band_size,
            });
        }
        if self.permutation_count % self.band_size != 0 {
            return Err(SignatureError::PermutationsNotDivisible {
                permutations: self.permutation_count,
                band_size: self.band_size,
            });
        }
        Ok(())
    }
}

impl Default for SignatureConfig {
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

/// Errors returned while building vocabularies, matrices and signatures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid config version {version}; expected >= 1")]
    InvalidConfigVersion { version: u32 },

    #[error("invalid config: permutation_count must be >= 1 (got {permutations})")]
    InvalidPermutationCount { permutations: usize },

    #[error("invalid config: band_size must be >= 1 (got {band_size})")]
    InvalidBandSize { band_size: usize },

    #[error(
        "invalid config: permutation_count {permutations} is not divisible by band_size {band_size}"
    )]
    PermutationsNotDivisible {
        permutations: usize,
        band_size: usize,
    },

    #[error("row {row} is outside the vocabulary of {rows} peaks")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("track column {column} is outside the matrix of {columns} tracks")]
    ColumnOutOfRange { column: usize, columns: usize },
}
