use std::cmp::Ordering;
use std::time::Instant;

use signature::{estimate_jaccard, jaccard_sorted, normalize_peaks, sign_peaks};
use signature::{PeakId, Signature, TrackId};
use tracing::{debug, warn, Level};

use crate::bands::band_buckets;
use crate::{IndexError, TrackIndex};

/// Result entry for a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMatch {
    /// Matched corpus track.
    pub track: TrackId,
    /// Jaccard similarity in `(threshold, 1.0]`.
    pub similarity: f64,
}

/// How a query confirms bucket candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Exact Jaccard over retained peak sets.
    Exact,
    /// Fraction of agreeing signature slots.
    Estimated,
}

/// Per-query knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Only candidates with similarity strictly above this are returned.
    pub threshold: f64,
    /// Keep at most this many results after sorting.
    pub limit: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            limit: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(IndexError::InvalidThreshold {
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

/// Similarity queries against a built index.
impl TrackIndex {
    /// Tracks similar to `peaks`, most similar first.
    ///
    /// Peaks outside the vocabulary are ignored. A query with no known peaks
    /// returns an empty list.
    pub fn query(
        &self,
        peaks: &[PeakId],
        opts: &QueryOptions,
    ) -> Result<Vec<TrackMatch>, IndexError> {
        opts.validate()?;
        let start = Instant::now();
        let span = tracing::span!(Level::DEBUG, "index.query", peaks = peaks.len());
        let _guard = span.enter();

        let (signature, unseen) = sign_peaks(self.vocabulary(), peaks, self.signature_params());
        if unseen > 0 {
            debug!(unseen, "query_peaks_outside_vocabulary");
        }
        if !signature.has_peaks() {
            debug!("query_without_known_peaks");
            return Ok(Vec::new());
        }

        let known: Vec<PeakId> = normalize_peaks(peaks)
            .into_iter()
            .filter(|&peak| self.vocabulary().row_of(peak).is_some())
            .collect();
        let hits = self.confirm(&signature, Some(known.as_slice()), opts);
        debug!(
            hits = hits.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "query_complete"
        );
        Ok(hits)
    }

    /// Query with the stored peaks of an indexed track.
    pub fn query_track(
        &self,
        track: TrackId,
        opts: &QueryOptions,
    ) -> Result<Vec<TrackMatch>, IndexError> {
        opts.validate()?;
        let signature = self
            .signature(track)
            .ok_or(IndexError::UnknownTrack { track })?;
        if !signature.has_peaks() {
            return Ok(Vec::new());
        }
        Ok(self.confirm(signature, self.peaks(track), opts))
    }

    /// Query with a precomputed signature, confirming by signature agreement.
    ///
    /// The signature must come from this index's hash parameters.
    pub fn query_signature(
        &self,
        signature: &Signature,
        opts: &QueryOptions,
    ) -> Result<Vec<TrackMatch>, IndexError> {
        opts.validate()?;
        if signature.len() != self.signature_params().len() || !signature.has_peaks() {
            return Ok(Vec::new());
        }
        Ok(self.confirm(signature, None, opts))
    }

    /// Tracks sharing at least one bucket with `signature`, ascending.
    ///
    /// When more tracks collide than `max_candidates` allows, the lowest
    /// track ids are kept and a warning is logged.
    pub fn candidates(&self, signature: &Signature) -> Vec<TrackId> {
        let buckets = band_buckets(
            signature,
            self.config().signature.band_size,
            self.band_params(),
        );
        let candidates = self.buckets().candidates(&buckets);
        match self.config().max_candidates {
            Some(cap) if candidates.len() > cap => {
                warn!(
                    candidates = candidates.len(),
                    max_candidates = cap,
                    "query_candidates_truncated"
                );
                candidates.into_iter().take(cap).collect()
            }
            _ => candidates.into_iter().collect(),
        }
    }

    /// How candidates are confirmed, given whether the query brings its own peaks.
    pub fn confirmation(&self, has_query_peaks: bool) -> Confirmation {
        if has_query_peaks && self.retains_peak_sets() {
            Confirmation::Exact
        } else {
            Confirmation::Estimated
        }
    }

    fn confirm(
        &self,
        signature: &Signature,
        query_peaks: Option<&[PeakId]>,
        opts: &QueryOptions,
    ) -> Vec<TrackMatch> {
        let mode = self.confirmation(query_peaks.is_some());
        let mut results = Vec::new();

        for track in self.candidates(signature) {
            let similarity = match (mode, query_peaks, self.peaks(track)) {
                (Confirmation::Exact, Some(query), Some(stored)) => jaccard_sorted(query, stored),
                _ => match self.signature(track) {
                    Some(candidate) => estimate_jaccard(signature, candidate),
                    None => continue,
                },
            };
            if similarity > opts.threshold {
                results.push(TrackMatch { track, similarity });
            }
        }

        // Ties are broken by track id so result order is deterministic.
        results.sort_unstable_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.track.cmp(&b.track))
        });
        if let Some(limit) = opts.limit {
            results.truncate(limit);
        }
        results
    }
}
