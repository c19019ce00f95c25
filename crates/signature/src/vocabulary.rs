//! Global peak vocabulary.
//!
//! Every distinct peak seen across the corpus gets one row index. A fresh
//! build sorts the peaks so the vocabulary does not depend on the order in
//! which tracks were visited. Later growth is append-only: existing rows are
//! never renumbered while an index built on them is alive.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::PeakId;

/// Sorted, deduplicated copy of a single track's peaks.
pub fn normalize_peaks(peaks: &[PeakId]) -> Vec<PeakId> {
    let mut out = peaks.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// Mapping between peak identifiers and shingle-matrix rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PeakId>", into = "Vec<PeakId>")]
pub struct PeakVocabulary {
    peaks: Vec<PeakId>,
    rows: HashMap<PeakId, usize>,
}

impl PeakVocabulary {
    /// Merge per-track peak sets into one sorted vocabulary.
    pub fn from_peak_sets<I, S>(peak_sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[PeakId]>,
    {
        let mut universe = BTreeSet::new();
        for set in peak_sets {
            universe.extend(set.as_ref().iter().copied());
        }
        Self::from(universe.into_iter().collect::<Vec<_>>())
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// All peaks in row order.
    pub fn peaks(&self) -> &[PeakId] {
        &self.peaks
    }

    /// Row index assigned to `peak`, if it is part of the vocabulary.
    pub fn row_of(&self, peak: PeakId) -> Option<usize> {
        self.rows.get(&peak).copied()
    }

    pub fn peak_at(&self, row: usize) -> Option<PeakId> {
        self.peaks.get(row).copied()
    }

    /// Map a peak set onto sorted row indices.
    ///
    /// Returns the rows together with the number of peaks that are not in the
    /// vocabulary. Unseen peaks cannot match anything and are dropped.
    pub fn rows_for(&self, peaks: &[PeakId]) -> (Vec<usize>, usize) {
        let mut rows = Vec::with_capacity(peaks.len());
        let mut unseen = 0usize;
        for &peak in peaks {
            match self.row_of(peak) {
                Some(row) => rows.push(row),
                None => unseen += 1,
            }
        }
        rows.sort_unstable();
        rows.dedup();
        (rows, unseen)
    }

    /// Append peaks that are not yet known, in ascending order.
    ///
    /// Existing rows keep their index. Returns how many peaks were appended.
    pub fn extend(&mut self, peaks: &[PeakId]) -> usize {
        let before = self.peaks.len();
        for peak in normalize_peaks(peaks) {
            if !self.rows.contains_key(&peak) {
                self.rows.insert(peak, self.peaks.len());
                self.peaks.push(peak);
            }
        }
        self.peaks.len() - before
    }

    /// Whether rows are still in ascending peak order.
    ///
    /// This stops holding after [`extend`](Self::extend) appends a peak below
    /// the current maximum; an offline rebuild restores it.
    pub fn is_sorted(&self) -> bool {
        self.peaks.windows(2).all(|pair| pair[0] < pair[1])
    }
}

impl From<Vec<PeakId>> for PeakVocabulary {
    fn from(peaks: Vec<PeakId>) -> Self {
        let mut vocabulary = Self {
            peaks: Vec::with_capacity(peaks.len()),
            rows: HashMap::with_capacity(peaks.len()),
        };
        for peak in peaks {
            if !vocabulary.rows.contains_key(&peak) {
                vocabulary.rows.insert(peak, vocabulary.peaks.len());
                vocabulary.peaks.push(peak);
            }
        }
        vocabulary
    }
}

impl From<PeakVocabulary> for Vec<PeakId> {
    fn from(vocabulary: PeakVocabulary) -> Self {
        vocabulary.peaks
    }
}
