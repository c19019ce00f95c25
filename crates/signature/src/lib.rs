//! # Peak signatures
//!
//! Turns per-track peak sets into MinHash signatures that preserve Jaccard
//! similarity between tracks.
//!
//! ## Contract
//!
//! - Input is a finite set of integer peak ids per track, already produced by
//!   feature extraction. Nothing here decodes audio or reads files.
//! - Output is a pure function of `(peak sets, config)`: the same corpus with
//!   the same [`SignatureConfig`] always yields bit-identical signatures.
//!
//! ## Pipeline
//!
//! 1.  **Vocabulary**: all peaks across the corpus are merged into one sorted,
//!     deduplicated [`PeakVocabulary`]; a peak's position is its row.
//! 2.  **Shingle matrix**: a [`ShingleMatrix`] marks which rows each track
//!     contains.
//! 3.  **MinHash**: for each of `k` universal hash permutations
//!     `perm_p(row) = (a[p]·row + b[p]) mod c`, a track's slot is the smallest
//!     permuted row among its peaks. Peakless tracks get the sentinel
//!     [`Signature::empty`].
//!
//! ## Example Usage
//!
//! ```
//! use signature::{sign_corpus, SignatureConfig};
//!
//! let tracks = vec![vec![1u64, 2, 5], vec![1, 2, 6], vec![9, 10, 11]];
//! let cfg = SignatureConfig::new().with_permutation_count(64);
//!
//! let corpus = sign_corpus(&tracks, &cfg).unwrap();
//!
//! assert_eq!(corpus.vocabulary.peaks(), &[1, 2, 5, 6, 9, 10, 11]);
//! assert_eq!(corpus.signatures.len(), 3);
//! assert_eq!(corpus.signatures[0].len(), 64);
//! ```
//!
pub mod config;
pub mod hash;
pub mod jaccard;
pub mod matrix;
mod minhash;
pub mod types;
pub mod vocabulary;

use std::time::Instant;

use tracing::debug;

pub use crate::config::{
    SignatureConfig, SignatureError, DEFAULT_BAND_SIZE, DEFAULT_PERMUTATION_COUNT, DEFAULT_SEED,
};
pub use crate::hash::{HashParams, HashStage, HASH_PRIME};
pub use crate::jaccard::{estimate_jaccard, jaccard, jaccard_sorted};
pub use crate::matrix::ShingleMatrix;
pub use crate::minhash::{minhash_signature, signatures_for_matrix};
pub use crate::types::{PeakId, Signature, TrackId, EMPTY_SLOT};
pub use crate::vocabulary::{normalize_peaks, PeakVocabulary};

/// Everything derived from one corpus snapshot up to the signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSignatures {
    pub vocabulary: PeakVocabulary,
    pub matrix: ShingleMatrix,
    pub params: HashParams,
    /// One signature per track, indexed by [`TrackId`].
    pub signatures: Vec<Signature>,
}

/// Build vocabulary, matrix and signatures for a corpus.
///
/// `peak_sets[t]` holds the peaks of track `t`; an empty set is valid and
/// produces the sentinel signature.
pub fn sign_corpus<S>(
    peak_sets: &[S],
    cfg: &SignatureConfig,
) -> Result<CorpusSignatures, SignatureError>
where
    S: AsRef<[PeakId]>,
{
    cfg.validate()?;
    let start = Instant::now();

    let vocabulary = PeakVocabulary::from_peak_sets(peak_sets);
    let matrix = ShingleMatrix::build(&vocabulary, peak_sets);
    let params = HashParams::generate(cfg.permutation_count, cfg.seed, HashStage::Signature);
    let signatures = signatures_for_matrix(&matrix, &params, cfg.use_parallel)?;

    debug!(
        tracks = peak_sets.len(),
        peaks = vocabulary.len(),
        permutations = cfg.permutation_count,
        use_parallel = cfg.use_parallel,
        elapsed_micros = start.elapsed().as_micros(),
        "sign_corpus"
    );

    Ok(CorpusSignatures {
        vocabulary,
        matrix,
        params,
        signatures,
    })
}

/// Signature of a query peak set against an existing vocabulary.
///
/// Peaks outside the vocabulary are dropped; their count is returned so the
/// caller can report it. A query with no known peaks gets the sentinel.
pub fn sign_peaks(
    vocabulary: &PeakVocabulary,
    peaks: &[PeakId],
    params: &HashParams,
) -> (Signature, usize) {
    let (rows, unseen) = vocabulary.rows_for(peaks);
    (minhash_signature(&rows, params), unseen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<PeakId>> {
        vec![vec![1, 2, 5], vec![1, 2, 6], vec![9, 10, 11]]
    }

    #[test]
    fn sign_corpus_rejects_invalid_config() {
        let cfg = SignatureConfig::new()
            .with_permutation_count(20)
            .with_band_size(8);
        assert!(matches!(
            sign_corpus(&corpus(), &cfg),
            Err(SignatureError::PermutationsNotDivisible { .. })
        ));
    }

    #[test]
    fn sign_corpus_is_deterministic() {
        let cfg = SignatureConfig::default();
        let a = sign_corpus(&corpus(), &cfg).unwrap();
        let b = sign_corpus(&corpus(), &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sign_peaks_matches_corpus_signature() {
        let cfg = SignatureConfig::default();
        let built = sign_corpus(&corpus(), &cfg).unwrap();
        let (sig, unseen) = sign_peaks(&built.vocabulary, &[5, 2, 1], &built.params);
        assert_eq!(unseen, 0);
        assert_eq!(sig, built.signatures[0]);
    }

    #[test]
    fn sign_peaks_drops_unknown_peaks() {
        let cfg = SignatureConfig::default();
        let built = sign_corpus(&corpus(), &cfg).unwrap();
        let (sig, unseen) = sign_peaks(&built.vocabulary, &[1, 2, 5, 1000], &built.params);
        assert_eq!(unseen, 1);
        assert_eq!(sig, built.signatures[0]);

        let (sig, unseen) = sign_peaks(&built.vocabulary, &[500, 501], &built.params);
        assert_eq!(unseen, 2);
        assert!(!sig.has_peaks());
    }

    #[test]
    fn empty_corpus_signs_to_nothing() {
        let tracks: Vec<Vec<PeakId>> = Vec::new();
        let built = sign_corpus(&tracks, &SignatureConfig::default()).unwrap();
        assert!(built.vocabulary.is_empty());
        assert!(built.signatures.is_empty());
        assert_eq!(built.matrix.columns(), 0);
    }

    #[test]
    fn peakless_track_gets_sentinel() {
        let tracks = vec![vec![1u64, 2], vec![]];
        let built = sign_corpus(&tracks, &SignatureConfig::default()).unwrap();
        assert!(built.signatures[0].has_peaks());
        assert!(!built.signatures[1].has_peaks());
    }
}
