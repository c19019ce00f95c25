//! # Peak track index
//!
//! A MinHash/LSH index over audio tracks represented as sets of peak ids.
//! Similar tracks collide in at least one band bucket with high probability,
//! so a query only inspects bucket-colliding candidates and confirms them with
//! Jaccard similarity.
//!
//! ## Core Features
//!
//! - **Deterministic build**: vocabulary, signatures and buckets are a pure
//!   function of the corpus and the [`IndexConfig`]; two builds with the same
//!   seed are byte-identical once serialized.
//! - **Tunable banding**: `band_size` trades recall against false positives.
//! - **Exact confirmation**: when peak sets are retained, candidates are
//!   scored with exact Jaccard; otherwise with the signature agreement
//!   estimate.
//! - **Snapshots**: [`IndexSnapshot`] stores everything a query needs,
//!   bincode-encoded and zstd-compressed.
//!
//! A built [`TrackIndex`] is immutable. Rebuild and swap it in whole when the
//! corpus changes.
//!
//! ## Example Usage
//!
//! ```
//! use index::{IndexConfig, QueryOptions, TrackIndex};
//! use signature::SignatureConfig;
//!
//! let tracks = vec![
//!     (0, vec![1u64, 2, 5]),
//!     (1, vec![1, 2, 6]),
//!     (2, vec![9, 10, 11]),
//! ];
//! let cfg = IndexConfig::new().with_signature(SignatureConfig::new().with_band_size(1));
//! let index = TrackIndex::build(tracks, cfg).unwrap();
//!
//! let hits = index
//!     .query(&[1, 2, 5], &QueryOptions::new().with_threshold(0.3))
//!     .unwrap();
//! assert_eq!(hits[0].track, 0);
//! assert_eq!(hits[1].track, 1);
//! assert_eq!(hits.len(), 2);
//! ```

mod bands;
mod query;
mod snapshot;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use signature::{
    normalize_peaks, sign_corpus, HashParams, HashStage, PeakId, PeakVocabulary, ShingleMatrix,
    Signature, SignatureConfig, SignatureError, TrackId,
};
use thiserror::Error;
use tracing::{info, Level};

pub use crate::bands::{band_buckets, BucketId, BucketIndex};
pub use crate::query::{Confirmation, QueryOptions, TrackMatch};
pub use crate::snapshot::{
    CompressionCodec, CompressionConfig, IndexSnapshot, SNAPSHOT_SCHEMA_VERSION,
};

/// Default cap on deduplicated candidates per query.
pub const DEFAULT_MAX_CANDIDATES: usize = 10_000;

/// How far track ids may run past the number of supplied tracks.
pub const MAX_TRACK_ID_GAP: usize = 65_536;

/// Config for building the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// MinHash and banding parameters.
    pub signature: SignatureConfig,
    /// Upper bound on candidates examined per query; `None` disables the cap.
    pub max_candidates: Option<usize>,
    /// Keep the shingle matrix after signatures are computed.
    pub retain_matrix: bool,
    /// Keep per-track peak sets for exact Jaccard confirmation.
    pub retain_peak_sets: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            signature: SignatureConfig::default(),
            max_candidates: Some(DEFAULT_MAX_CANDIDATES),
            retain_matrix: false,
            retain_peak_sets: true,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signature(mut self, signature: SignatureConfig) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: Option<usize>) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_retain_matrix(mut self, retain_matrix: bool) -> Self {
        self.retain_matrix = retain_matrix;
        self
    }

    pub fn with_retain_peak_sets(mut self, retain_peak_sets: bool) -> Self {
        self.retain_peak_sets = retain_peak_sets;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        self.signature.validate()?;
        if self.max_candidates == Some(0) {
            return Err(IndexError::InvalidMaxCandidates);
        }
        Ok(())
    }
}

/// Custom error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] SignatureError),
    #[error("invalid threshold {threshold}; expected a value in [0, 1]")]
    InvalidThreshold { threshold: f64 },
    #[error("invalid config: max_candidates must be >= 1")]
    InvalidMaxCandidates,
    #[error("track {track} appears more than once in the corpus")]
    DuplicateTrack { track: TrackId },
    #[error("track {track} is not in the index")]
    UnknownTrack { track: TrackId },
    #[error("track id {track} exceeds the limit {limit} for this corpus")]
    TrackIdOutOfRange { track: TrackId, limit: TrackId },
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u16, expected: u16 },
}

impl From<bincode::error::EncodeError> for IndexError {
    fn from(e: bincode::error::EncodeError) -> Self {
        IndexError::Encode(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for IndexError {
    fn from(e: bincode::error::DecodeError) -> Self {
        IndexError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Io(e.to_string())
    }
}

/// Shape of a built index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub tracks: usize,
    pub peaks: usize,
    pub permutations: usize,
    pub bands: usize,
    pub buckets: usize,
    pub largest_bucket: usize,
    /// Tracks with no peaks (never matched).
    pub empty_tracks: usize,
}

/// Immutable similarity index over one corpus snapshot.
#[derive(Debug, Clone)]
pub struct TrackIndex {
    cfg: IndexConfig,
    vocabulary: PeakVocabulary,
    matrix: Option<ShingleMatrix>,
    signature_params: HashParams,
    band_params: HashParams,
    signatures: Vec<Signature>,
    buckets: BucketIndex,
    peak_sets: Option<Vec<Vec<PeakId>>>,
}

impl TrackIndex {
    /// Build an index from `(track id, peaks)` pairs.
    ///
    /// Track ids are zero-based corpus positions. Ids that never appear get
    /// an empty column, so gaps left by tracks whose extraction failed do not
    /// shift anyone else. An empty corpus yields an empty, queryable index.
    ///
    /// Ids must stay below the number of supplied tracks plus
    /// [`MAX_TRACK_ID_GAP`]; larger ids are rejected with
    /// [`IndexError::TrackIdOutOfRange`].
    pub fn build<I, P>(tracks: I, cfg: IndexConfig) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (TrackId, P)>,
        P: IntoIterator<Item = PeakId>,
    {
        cfg.validate()?;
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "index.build");
        let _guard = span.enter();

        let tracks: Vec<(TrackId, P)> = tracks.into_iter().collect();
        let limit = tracks.len().saturating_add(MAX_TRACK_ID_GAP);

        let mut peak_sets: Vec<Vec<PeakId>> = Vec::new();
        let mut present: Vec<bool> = Vec::new();
        for (track, peaks) in tracks {
            let slots = match track.checked_add(1) {
                Some(slots) if slots <= limit => slots,
                _ => return Err(IndexError::TrackIdOutOfRange { track, limit }),
            };
            if slots > peak_sets.len() {
                peak_sets.resize(slots, Vec::new());
                present.resize(slots, false);
            }
            if present[track] {
                return Err(IndexError::DuplicateTrack { track });
            }
            present[track] = true;
            let peaks: Vec<PeakId> = peaks.into_iter().collect();
            peak_sets[track] = normalize_peaks(&peaks);
        }

        let corpus = sign_corpus(&peak_sets, &cfg.signature)?;
        let band_params = HashParams::generate(
            cfg.signature.band_size,
            cfg.signature.seed,
            HashStage::Banding,
        );
        let buckets =
            BucketIndex::build(&corpus.signatures, cfg.signature.band_size, &band_params);

        let index = Self {
            matrix: cfg.retain_matrix.then_some(corpus.matrix),
            peak_sets: cfg.retain_peak_sets.then_some(peak_sets),
            vocabulary: corpus.vocabulary,
            signature_params: corpus.params,
            band_params,
            signatures: corpus.signatures,
            buckets,
            cfg,
        };

        let stats = index.stats();
        info!(
            tracks = stats.tracks,
            peaks = stats.peaks,
            bands = stats.bands,
            buckets = stats.buckets,
            largest_bucket = stats.largest_bucket,
            empty_tracks = stats.empty_tracks,
            elapsed_micros = start.elapsed().as_micros(),
            "index_build_success"
        );
        Ok(index)
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    /// Number of track slots, including peakless ones.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn vocabulary(&self) -> &PeakVocabulary {
        &self.vocabulary
    }

    /// The shingle matrix, when the config asked to retain it.
    pub fn matrix(&self) -> Option<&ShingleMatrix> {
        self.matrix.as_ref()
    }

    pub fn signature_params(&self) -> &HashParams {
        &self.signature_params
    }

    pub fn band_params(&self) -> &HashParams {
        &self.band_params
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn signature(&self, track: TrackId) -> Option<&Signature> {
        self.signatures.get(track)
    }

    pub fn buckets(&self) -> &BucketIndex {
        &self.buckets
    }

    /// Normalized peaks of `track`, when peak sets are retained.
    pub fn peaks(&self, track: TrackId) -> Option<&[PeakId]> {
        self.peak_sets
            .as_ref()
            .and_then(|sets| sets.get(track))
            .map(Vec::as_slice)
    }

    pub fn retains_peak_sets(&self) -> bool {
        self.peak_sets.is_some()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            tracks: self.len(),
            peaks: self.vocabulary.len(),
            permutations: self.signature_params.len(),
            bands: self.cfg.signature.band_count(),
            buckets: self.buckets.bucket_count(),
            largest_bucket: self.buckets.largest_bucket(),
            empty_tracks: self.signatures.iter().filter(|s| !s.has_peaks()).count(),
        }
    }
}

/// Build an index with `cfg`. See [`TrackIndex::build`].
pub fn build_index<I, P>(tracks: I, cfg: IndexConfig) -> Result<TrackIndex, IndexError>
where
    I: IntoIterator<Item = (TrackId, P)>,
    P: IntoIterator<Item = PeakId>,
{
    TrackIndex::build(tracks, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(TrackId, Vec<PeakId>)> {
        vec![
            (0, vec![1, 2, 5]),
            (1, vec![1, 2, 6]),
            (2, vec![9, 10, 11]),
        ]
    }

    #[test]
    fn build_populates_every_stage() {
        let index = TrackIndex::build(corpus(), IndexConfig::default()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.vocabulary().peaks(), &[1, 2, 5, 6, 9, 10, 11]);
        assert_eq!(index.signatures().len(), 3);
        assert!(index.signatures().iter().all(|s| s.len() == 128));
        assert_eq!(index.buckets().len(), 3);
        assert!(index.buckets().is_consistent());
        assert_eq!(index.band_params().len(), 8);
        assert!(index.matrix().is_none());
        assert_eq!(index.peaks(1), Some(&[1, 2, 6][..]));
    }

    #[test]
    fn build_is_deterministic() {
        let a = TrackIndex::build(corpus(), IndexConfig::default()).unwrap();
        let b = TrackIndex::build(corpus(), IndexConfig::default()).unwrap();
        assert_eq!(a.signatures(), b.signatures());
        assert_eq!(a.buckets(), b.buckets());
    }

    #[test]
    fn build_rejects_indivisible_bands() {
        let cfg = IndexConfig::new().with_signature(
            SignatureConfig::new()
                .with_permutation_count(100)
                .with_band_size(8),
        );
        assert!(matches!(
            TrackIndex::build(corpus(), cfg),
            Err(IndexError::Config(
                SignatureError::PermutationsNotDivisible { .. }
            ))
        ));
    }

    #[test]
    fn build_rejects_zero_candidate_cap() {
        let cfg = IndexConfig::new().with_max_candidates(Some(0));
        assert_eq!(
            TrackIndex::build(corpus(), cfg).unwrap_err(),
            IndexError::InvalidMaxCandidates
        );
    }

    #[test]
    fn build_rejects_duplicate_track_ids() {
        let tracks = vec![(0, vec![1u64]), (0, vec![2u64])];
        assert_eq!(
            TrackIndex::build(tracks, IndexConfig::default()).unwrap_err(),
            IndexError::DuplicateTrack { track: 0 }
        );
    }

    #[test]
    fn build_rejects_track_ids_past_the_gap_limit() {
        for track in [usize::MAX, 1 << 40, 1 + MAX_TRACK_ID_GAP] {
            let tracks = vec![(track, vec![1u64, 2])];
            assert_eq!(
                TrackIndex::build(tracks, IndexConfig::default()).unwrap_err(),
                IndexError::TrackIdOutOfRange {
                    track,
                    limit: 1 + MAX_TRACK_ID_GAP,
                }
            );
        }

        let edge = vec![(MAX_TRACK_ID_GAP, vec![1u64, 2])];
        let index = TrackIndex::build(edge, IndexConfig::default()).unwrap();
        assert_eq!(index.len(), MAX_TRACK_ID_GAP + 1);
    }

    #[test]
    fn empty_corpus_is_queryable() {
        let tracks: Vec<(TrackId, Vec<PeakId>)> = Vec::new();
        let index = TrackIndex::build(tracks, IndexConfig::default()).unwrap();
        assert!(index.is_empty());
        assert!(index
            .query(&[1, 2, 3], &QueryOptions::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn gaps_in_track_ids_become_empty_tracks() {
        let tracks = vec![(0, vec![1u64, 2]), (3, vec![1u64, 2])];
        let index = TrackIndex::build(tracks, IndexConfig::default()).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.stats().empty_tracks, 2);
        assert_eq!(index.buckets().track_buckets(1), Some(&[][..]));
    }

    #[test]
    fn peakless_track_is_never_matched() {
        let tracks = vec![(0, vec![]), (1, vec![4u64, 5, 6])];
        let cfg = IndexConfig::new().with_signature(SignatureConfig::new().with_band_size(1));
        let index = TrackIndex::build(tracks, cfg).unwrap();
        assert!(!index.signature(0).unwrap().has_peaks());

        let hits = index.query(&[4, 5, 6], &QueryOptions::new()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track, 1);
    }

    #[test]
    fn retain_flags_control_stored_state() {
        let cfg = IndexConfig::new()
            .with_retain_matrix(true)
            .with_retain_peak_sets(false);
        let index = TrackIndex::build(corpus(), cfg).unwrap();
        let matrix = index.matrix().expect("matrix retained");
        assert_eq!(matrix.rows(), 7);
        assert_eq!(matrix.columns(), 3);
        assert!(index.peaks(0).is_none());
        assert!(!index.retains_peak_sets());
    }

    #[test]
    fn accepts_set_typed_peaks() {
        use std::collections::BTreeSet;
        let tracks = vec![(0, BTreeSet::from([3u64, 1, 2]))];
        let index = build_index(tracks, IndexConfig::default()).unwrap();
        assert_eq!(index.peaks(0), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn stats_describe_index_shape() {
        let index = TrackIndex::build(corpus(), IndexConfig::default()).unwrap();
        let stats = index.stats();
        assert_eq!(stats.tracks, 3);
        assert_eq!(stats.peaks, 7);
        assert_eq!(stats.permutations, 128);
        assert_eq!(stats.bands, 16);
        assert_eq!(stats.empty_tracks, 0);
        assert!(stats.buckets >= 16);
        assert!(stats.largest_bucket >= 1);
    }
}
