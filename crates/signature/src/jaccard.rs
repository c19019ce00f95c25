//! Jaccard similarity, exact and estimated from signatures.

use std::collections::HashSet;

use crate::types::{PeakId, Signature, EMPTY_SLOT};

/// `|A ∩ B| / |A ∪ B|` over two peak collections.
///
/// Duplicates inside either input are ignored. Two empty sets score `0.0`.
pub fn jaccard(a: &[PeakId], b: &[PeakId]) -> f64 {
    let left: HashSet<PeakId> = a.iter().copied().collect();
    let right: HashSet<PeakId> = b.iter().copied().collect();
    let intersection = left.intersection(&right).count();
    let union = left.len() + right.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Jaccard similarity of two ascending, deduplicated slices via a merge walk.
pub fn jaccard_sorted(a: &[PeakId], b: &[PeakId]) -> f64 {
    let (mut i, mut j) = (0usize, 0usize);
    let mut intersection = 0usize;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                intersection += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Fraction of slots on which two signatures agree.
///
/// Slots where both sides hold the empty sentinel do not count as agreement,
/// so a peakless track estimates `0.0` against everything. Signatures of
/// different lengths score `0.0`.
pub fn estimate_jaccard(a: &Signature, b: &Signature) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let agree = a
        .slots()
        .iter()
        .zip(b.slots())
        .filter(|(x, y)| x == y && **x != EMPTY_SLOT)
        .count();
    agree as f64 / a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_half_overlap() {
        assert_eq!(jaccard(&[1, 2, 3], &[2, 3, 4]), 0.5);
    }

    #[test]
    fn jaccard_of_two_empty_sets_is_zero() {
        assert_eq!(jaccard(&[], &[]), 0.0);
        assert_eq!(jaccard_sorted(&[], &[]), 0.0);
    }

    #[test]
    fn jaccard_identical_singletons() {
        assert_eq!(jaccard(&[1], &[1]), 1.0);
    }

    #[test]
    fn jaccard_ignores_duplicates() {
        assert_eq!(jaccard(&[1, 1, 2], &[2, 2, 1]), 1.0);
    }

    #[test]
    fn jaccard_disjoint_is_zero() {
        assert_eq!(jaccard(&[1, 2], &[3, 4]), 0.0);
        assert_eq!(jaccard(&[1, 2], &[]), 0.0);
    }

    #[test]
    fn sorted_variant_agrees_with_hash_variant() {
        let cases: [(&[PeakId], &[PeakId]); 4] = [
            (&[1, 2, 5], &[1, 2, 6]),
            (&[1, 2, 3], &[2, 3, 4]),
            (&[9, 10, 11], &[1, 2, 5]),
            (&[4], &[1, 2, 3, 4, 5, 6, 7, 8]),
        ];
        for (a, b) in cases {
            assert_eq!(jaccard(a, b), jaccard_sorted(a, b));
        }
    }

    #[test]
    fn estimate_counts_agreeing_slots() {
        let a = Signature::from_slots(vec![1, 2, 3, 4]);
        let b = Signature::from_slots(vec![1, 9, 3, 8]);
        assert_eq!(estimate_jaccard(&a, &b), 0.5);
        assert_eq!(estimate_jaccard(&a, &a), 1.0);
    }

    #[test]
    fn estimate_never_matches_empty_signatures() {
        let empty = Signature::empty(4);
        assert_eq!(estimate_jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn estimate_rejects_length_mismatch() {
        let a = Signature::from_slots(vec![1, 2]);
        let b = Signature::from_slots(vec![1, 2, 3]);
        assert_eq!(estimate_jaccard(&a, &b), 0.0);
    }
}
