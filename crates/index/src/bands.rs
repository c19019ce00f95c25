//! Banding: signatures → bucket ids, and the two-way bucket index.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use signature::{HashParams, Signature, TrackId};

/// Bucket identifier produced by hashing one band (`< HashParams::c`).
pub type BucketId = u64;

/// Bucket ids of a signature, one per band, in band order.
///
/// The sentinel signature of a peakless track maps to no buckets: such a
/// track can never be a similarity match, so it is kept out of every bucket.
pub fn band_buckets(signature: &Signature, band_size: usize, params: &HashParams) -> Vec<BucketId> {
    if !signature.has_peaks() {
        return Vec::new();
    }
    signature
        .bands(band_size)
        .map(|band| params.combine(band))
        .collect()
}

/// `TrackBuckets` and `BucketTracks` kept in sync.
///
/// A track is listed under bucket `b` iff `b` appears in that track's bucket
/// sequence. Ordered maps keep the serialized form byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketIndex {
    track_buckets: Vec<Vec<BucketId>>,
    bucket_tracks: BTreeMap<BucketId, BTreeSet<TrackId>>,
}

impl BucketIndex {
    /// Band every signature; `signatures[t]` belongs to track `t`.
    pub fn build(signatures: &[Signature], band_size: usize, params: &HashParams) -> Self {
        let mut index = Self {
            track_buckets: Vec::with_capacity(signatures.len()),
            bucket_tracks: BTreeMap::new(),
        };
        for (track, signature) in signatures.iter().enumerate() {
            let buckets = band_buckets(signature, band_size, params);
            for &bucket in &buckets {
                index.bucket_tracks.entry(bucket).or_default().insert(track);
            }
            index.track_buckets.push(buckets);
        }
        index
    }

    /// Number of tracks covered (including peakless ones).
    pub fn len(&self) -> usize {
        self.track_buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_buckets.is_empty()
    }

    /// Bucket ids of `track`, in band order.
    pub fn track_buckets(&self, track: TrackId) -> Option<&[BucketId]> {
        self.track_buckets.get(track).map(Vec::as_slice)
    }

    /// Tracks filed under `bucket`; empty when nothing landed there.
    pub fn tracks_in(&self, bucket: BucketId) -> impl Iterator<Item = TrackId> + '_ {
        self.bucket_tracks
            .get(&bucket)
            .into_iter()
            .flat_map(|tracks| tracks.iter().copied())
    }

    /// Deduplicated tracks sharing at least one of `buckets`, ascending.
    pub fn candidates(&self, buckets: &[BucketId]) -> BTreeSet<TrackId> {
        let mut out = BTreeSet::new();
        for &bucket in buckets {
            out.extend(self.tracks_in(bucket));
        }
        out
    }

    /// Number of distinct non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.bucket_tracks.len()
    }

    /// Size of the most populated bucket.
    pub fn largest_bucket(&self) -> usize {
        self.bucket_tracks
            .values()
            .map(BTreeSet::len)
            .max()
            .unwrap_or(0)
    }

    /// Check that both maps describe the same memberships.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .track_buckets
            .iter()
            .enumerate()
            .all(|(track, buckets)| {
                buckets.iter().all(|bucket| {
                    self.bucket_tracks
                        .get(bucket)
                        .is_some_and(|tracks| tracks.contains(&track))
                })
            });
        let backward = self.bucket_tracks.iter().all(|(bucket, tracks)| {
            !tracks.is_empty()
                && tracks.iter().all(|&track| {
                    self.track_buckets
                        .get(track)
                        .is_some_and(|buckets| buckets.contains(bucket))
                })
        });
        forward && backward
    }
}
