//! Persisted form of a [`TrackIndex`].
//!
//! A snapshot is a one-byte codec tag followed by the bincode encoding of
//! [`IndexSnapshot`], compressed with that codec. The schema version is the
//! first encoded field so it can be checked before the rest is decoded.

use std::fs;
use std::path::Path;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use signature::{HashParams, PeakId, PeakVocabulary, ShingleMatrix, Signature};
use tracing::info;
use zstd::{decode_all, encode_all};

use crate::bands::BucketIndex;
use crate::{IndexConfig, IndexError, TrackIndex};

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u16 = 1;

/// Compression codec options for snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionCodec {
    /// No compression (useful for debugging).
    None,
    /// Zstd compression (default).
    #[default]
    Zstd,
}

impl CompressionCodec {
    fn tag(self) -> u8 {
        match self {
            CompressionCodec::None => 0,
            CompressionCodec::Zstd => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, IndexError> {
        match tag {
            0 => Ok(CompressionCodec::None),
            1 => Ok(CompressionCodec::Zstd),
            other => Err(IndexError::Decode(format!("unknown codec tag {other}"))),
        }
    }
}

/// Compression behavior configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub codec: CompressionCodec,
    /// Zstd level (1-22).
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => {
                encode_all(data, self.level).map_err(|e| IndexError::Compression(e.to_string()))
            }
        }
    }
}

fn decompress(codec: CompressionCodec, data: &[u8]) -> Result<Vec<u8>, IndexError> {
    match codec {
        CompressionCodec::None => Ok(data.to_vec()),
        CompressionCodec::Zstd => {
            decode_all(data).map_err(|e| IndexError::Compression(e.to_string()))
        }
    }
}

/// Everything a query needs, in serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub schema_version: u16,
    pub config: IndexConfig,
    pub vocabulary: PeakVocabulary,
    pub signature_params: HashParams,
    pub band_params: HashParams,
    pub signatures: Vec<Signature>,
    pub buckets: BucketIndex,
    pub peak_sets: Option<Vec<Vec<PeakId>>>,
    pub matrix: Option<ShingleMatrix>,
}

impl IndexSnapshot {
    /// Encode and compress.
    pub fn to_bytes(&self, compression: &CompressionConfig) -> Result<Vec<u8>, IndexError> {
        let encoded = encode_to_vec(self, standard())?;
        let body = compression.compress(&encoded)?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(compression.codec.tag());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decompress and decode, rejecting unknown schema versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let (&tag, body) = bytes
            .split_first()
            .ok_or_else(|| IndexError::Decode("empty snapshot".into()))?;
        let decompressed = decompress(CompressionCodec::from_tag(tag)?, body)?;

        let (found, _): (u16, usize) = decode_from_slice(&decompressed, standard())?;
        if found != SNAPSHOT_SCHEMA_VERSION {
            return Err(IndexError::SchemaMismatch {
                found,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        let (snapshot, _) = decode_from_slice(&decompressed, standard())?;
        Ok(snapshot)
    }
}

impl TrackIndex {
    pub fn to_snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            config: self.cfg.clone(),
            vocabulary: self.vocabulary.clone(),
            signature_params: self.signature_params.clone(),
            band_params: self.band_params.clone(),
            signatures: self.signatures.clone(),
            buckets: self.buckets.clone(),
            peak_sets: self.peak_sets.clone(),
            matrix: self.matrix.clone(),
        }
    }

    /// Rebuild an index from a snapshot, checking its parts agree.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self, IndexError> {
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(IndexError::SchemaMismatch {
                found: snapshot.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        snapshot.config.validate()?;

        let tracks = snapshot.signatures.len();
        let permutations = snapshot.config.signature.permutation_count;
        let consistent = snapshot.buckets.len() == tracks
            && snapshot.signature_params.len() == permutations
            && snapshot.band_params.len() == snapshot.config.signature.band_size
            && snapshot.signatures.iter().all(|s| s.len() == permutations)
            && snapshot.vocabulary.is_sorted()
            && snapshot.peak_sets.as_ref().map_or(true, |sets| {
                sets.len() == tracks
                    && sets
                        .iter()
                        .flatten()
                        .all(|&peak| snapshot.vocabulary.row_of(peak).is_some())
            })
            && snapshot.matrix.as_ref().map_or(true, |m| {
                m.rows() == snapshot.vocabulary.len() && m.columns() == tracks
            })
            && snapshot.buckets.is_consistent();
        if !consistent {
            return Err(IndexError::Decode(
                "snapshot parts disagree on index shape".into(),
            ));
        }

        Ok(Self {
            cfg: snapshot.config,
            vocabulary: snapshot.vocabulary,
            matrix: snapshot.matrix,
            signature_params: snapshot.signature_params,
            band_params: snapshot.band_params,
            signatures: snapshot.signatures,
            buckets: snapshot.buckets,
            peak_sets: snapshot.peak_sets,
        })
    }

    pub fn to_bytes(&self, compression: &CompressionConfig) -> Result<Vec<u8>, IndexError> {
        self.to_snapshot().to_bytes(compression)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        Self::from_snapshot(IndexSnapshot::from_bytes(bytes)?)
    }

    /// Write a compressed snapshot to `path`.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        compression: &CompressionConfig,
    ) -> Result<(), IndexError> {
        let bytes = self.to_bytes(compression)?;
        fs::write(path.as_ref(), &bytes)?;
        info!(
            path = %path.as_ref().display(),
            bytes = bytes.len(),
            tracks = self.len(),
            "index_snapshot_saved"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let bytes = fs::read(path.as_ref())?;
        let index = Self::from_bytes(&bytes)?;
        info!(
            path = %path.as_ref().display(),
            tracks = index.len(),
            "index_snapshot_loaded"
        );
        Ok(index)
    }
}
