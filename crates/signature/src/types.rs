//! Identifier aliases and the MinHash signature artifact.
//!
//! The signature layout is part of the persisted index format: any change to
//! how slots are filled must come with a new `SignatureConfig::version`.

use serde::{Deserialize, Serialize};

/// Opaque spectral/onset peak identifier produced by feature extraction.
pub type PeakId = u64;

/// Zero-based position of a track in the corpus.
pub type TrackId = usize;

/// Slot value for a track with no peaks.
///
/// Permuted row indices are always reduced modulo a prime below `u32::MAX`,
/// so this value never collides with a real slot.
pub const EMPTY_SLOT: u64 = u64::MAX;

/// Fixed-length MinHash signature of one track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<u64>);

impl Signature {
    /// Sentinel signature for a track with no peaks.
    pub fn empty(permutations: usize) -> Self {
        Self(vec![EMPTY_SLOT; permutations])
    }

    pub fn from_slots(slots: Vec<u64>) -> Self {
        Self(slots)
    }

    pub fn slots(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `false` for the sentinel signature of a peakless track.
    pub fn has_peaks(&self) -> bool {
        self.0.iter().any(|&slot| slot != EMPTY_SLOT)
    }

    /// Contiguous bands of `band_size` slots, in band order.
    ///
    /// A trailing partial band is never produced; callers validate that the
    /// signature length is a multiple of `band_size` first.
    pub fn bands(&self, band_size: usize) -> impl Iterator<Item = &[u64]> {
        self.0.chunks_exact(band_size.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signature_is_all_sentinel() {
        let sig = Signature::empty(8);
        assert_eq!(sig.len(), 8);
        assert!(sig.slots().iter().all(|&v| v == EMPTY_SLOT));
        assert!(!sig.has_peaks());
    }

    #[test]
    fn signature_with_any_slot_has_peaks() {
        let sig = Signature::from_slots(vec![EMPTY_SLOT, 3]);
        assert!(sig.has_peaks());
    }

    #[test]
    fn bands_split_in_order() {
        let sig = Signature::from_slots(vec![1, 2, 3, 4, 5, 6]);
        let bands: Vec<&[u64]> = sig.bands(2).collect();
        assert_eq!(bands, vec![&[1, 2][..], &[3, 4][..], &[5, 6][..]]);
    }

    #[test]
    fn serde_is_transparent() {
        let sig = Signature::from_slots(vec![7, 9]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "[7,9]");
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
