//! Workspace umbrella crate for peak-based audio track matching.
//!
//! This crate wires feature extraction to the signature and index crates so
//! callers can build, swap and query a track index through one API. Track
//! metadata (names, authors) stays with the caller; everything here speaks
//! [`TrackId`]s.

pub mod config;

pub use index::{
    BucketId, BucketIndex, CompressionCodec, CompressionConfig, Confirmation, IndexConfig,
    IndexError, IndexSnapshot, IndexStats, QueryOptions, SNAPSHOT_SCHEMA_VERSION, TrackIndex,
    TrackMatch, band_buckets, build_index,
};
pub use signature::{
    DEFAULT_BAND_SIZE, DEFAULT_PERMUTATION_COUNT, DEFAULT_SEED, EMPTY_SLOT, HashParams,
    HashStage, PeakId, PeakVocabulary, ShingleMatrix, Signature, SignatureConfig,
    SignatureError, TrackId, estimate_jaccard, jaccard, jaccard_sorted, normalize_peaks,
    sign_corpus,
};

pub use crate::config::{ConfigLoadError, PeakmatchConfig};

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced by the build pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("signature failure: {0}")]
    Signature(#[from] SignatureError),
    #[error("index failure: {0}")]
    Index(#[from] IndexError),
    #[error("feature extraction failed for track {track}: {reason}")]
    FeatureExtraction { track: TrackId, reason: String },
    #[error("config load failure: {0}")]
    ConfigLoad(String),
}

impl From<ConfigLoadError> for PipelineError {
    fn from(value: ConfigLoadError) -> Self {
        PipelineError::ConfigLoad(value.to_string())
    }
}

/// Source of peak sets, one call per track.
///
/// Decoding audio and picking spectrogram peaks happen behind this seam.
pub trait PeakExtractor: Sync {
    type Error: fmt::Display;

    fn extract(&self, track: TrackId) -> Result<Vec<PeakId>, Self::Error>;
}

impl<F, E> PeakExtractor for F
where
    F: Fn(TrackId) -> Result<Vec<PeakId>, E> + Sync,
    E: fmt::Display,
{
    type Error = E;

    fn extract(&self, track: TrackId) -> Result<Vec<PeakId>, E> {
        self(track)
    }
}

/// A track whose peaks could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFailure {
    pub track: TrackId,
    pub reason: String,
}

impl From<TrackFailure> for PipelineError {
    fn from(value: TrackFailure) -> Self {
        PipelineError::FeatureExtraction {
            track: value.track,
            reason: value.reason,
        }
    }
}

/// Outcome of a build: the index plus every track that was skipped.
///
/// Failed tracks keep their id and hold no peaks, so they never match.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub index: TrackIndex,
    pub failures: Vec<TrackFailure>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_tracks(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.failures.iter().map(|f| f.track)
    }
}

/// Metrics observer for build and query.
pub trait BuildMetrics: Send + Sync {
    fn record_build(&self, latency: Duration, result: Result<IndexStats, PipelineError>);
    fn record_query(&self, latency: Duration, result: Result<usize, IndexError>);
}

/// Install or clear the global metrics recorder.
pub fn set_build_metrics(recorder: Option<Arc<dyn BuildMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn BuildMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn BuildMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn BuildMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Arc<dyn BuildMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    fn record_build(self, result: Result<IndexStats, PipelineError>) {
        self.recorder.record_build(self.start.elapsed(), result);
    }

    fn record_query(self, result: Result<usize, IndexError>) {
        self.recorder.record_query(self.start.elapsed(), result);
    }
}

/// Build an index from peak sets already in hand.
pub fn build_corpus_index<I, P>(tracks: I, cfg: &IndexConfig) -> Result<TrackIndex, PipelineError>
where
    I: IntoIterator<Item = (TrackId, P)>,
    P: IntoIterator<Item = PeakId>,
{
    let metrics = MetricsSpan::start();
    let result = TrackIndex::build(tracks, cfg.clone()).map_err(PipelineError::from);
    if let Some(span) = metrics {
        span.record_build(result.as_ref().map(TrackIndex::stats).map_err(Clone::clone));
    }
    result
}

/// Extract peaks for tracks `0..track_count` and index them.
///
/// Extraction failures are collected in the report rather than aborting the
/// build. Extraction runs on the rayon pool when `use_parallel` is set.
pub fn build_from_extractor<X>(
    extractor: &X,
    track_count: usize,
    cfg: &IndexConfig,
) -> Result<BuildReport, PipelineError>
where
    X: PeakExtractor + ?Sized,
{
    let extract = |track: TrackId| {
        extractor
            .extract(track)
            .map_err(|err| TrackFailure {
                track,
                reason: err.to_string(),
            })
    };
    let extracted: Vec<Result<Vec<PeakId>, TrackFailure>> = if cfg.signature.use_parallel {
        (0..track_count).into_par_iter().map(extract).collect()
    } else {
        (0..track_count).map(extract).collect()
    };

    let mut failures = Vec::new();
    let mut tracks = Vec::with_capacity(track_count);
    for (track, outcome) in extracted.into_iter().enumerate() {
        match outcome {
            Ok(peaks) => tracks.push((track, peaks)),
            Err(failure) => {
                warn!(
                    track = failure.track,
                    reason = %failure.reason,
                    "feature_extraction_failed"
                );
                tracks.push((track, Vec::new()));
                failures.push(failure);
            }
        }
    }

    let index = build_corpus_index(tracks, cfg)?;
    if !failures.is_empty() {
        info!(
            tracks = track_count,
            failed = failures.len(),
            "index_build_partial"
        );
    }
    Ok(BuildReport { index, failures })
}

/// Query `index` and report to the metrics recorder.
pub fn query_index(
    index: &TrackIndex,
    peaks: &[PeakId],
    opts: &QueryOptions,
) -> Result<Vec<TrackMatch>, IndexError> {
    let metrics = MetricsSpan::start();
    let result = index.query(peaks, opts);
    if let Some(span) = metrics {
        span.record_query(result.as_ref().map(Vec::len).map_err(Clone::clone));
    }
    result
}

/// Shared, swappable index.
///
/// Readers take an [`Arc`] snapshot and query it without holding the lock;
/// a rebuild is published with a single [`IndexHandle::replace`], so no
/// query ever observes a partially built index.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<TrackIndex>>,
}

impl IndexHandle {
    pub fn new(index: TrackIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The index currently being served.
    pub fn snapshot(&self) -> Arc<TrackIndex> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Publish `index`, returning the one it replaced.
    pub fn replace(&self, index: TrackIndex) -> Arc<TrackIndex> {
        let next = Arc::new(index);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        info!(tracks = guard.len(), "index_replaced");
        previous
    }

    /// Rebuild from `extractor` and publish on success.
    ///
    /// On error the served index is left untouched.
    pub fn rebuild<X>(
        &self,
        extractor: &X,
        track_count: usize,
        cfg: &IndexConfig,
    ) -> Result<Vec<TrackFailure>, PipelineError>
    where
        X: PeakExtractor + ?Sized,
    {
        let report = build_from_extractor(extractor, track_count, cfg)?;
        self.replace(report.index);
        Ok(report.failures)
    }

    pub fn query(
        &self,
        peaks: &[PeakId],
        opts: &QueryOptions,
    ) -> Result<Vec<TrackMatch>, IndexError> {
        let index = self.snapshot();
        query_index(&index, peaks, opts)
    }
}
