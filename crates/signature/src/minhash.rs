//! MinHash signatures over shingle-matrix columns.
//!
//! Slot `p` of a track's signature is the smallest `perm_p(row)` over the
//! rows where the track has a peak, with `perm_p(row) = (a[p]·row + b[p]) mod c`.
//! Two tracks agree on a slot with probability equal to the Jaccard similarity
//! of their peak sets.

use rayon::prelude::*;

use crate::config::SignatureError;
use crate::hash::HashParams;
use crate::matrix::ShingleMatrix;
use crate::types::Signature;

/// Signature of a track given its occupied rows.
///
/// An empty `rows` slice yields the sentinel signature.
pub fn minhash_signature(rows: &[usize], params: &HashParams) -> Signature {
    if rows.is_empty() {
        return Signature::empty(params.len());
    }
    let slots = (0..params.len())
        .map(|p| compute_slot(rows, p, params))
        .collect();
    Signature::from_slots(slots)
}

/// Computes a single slot in the MinHash signature.
///
/// Equal permuted values are ordered by the original row index so the
/// minimum is taken over a total order.
#[inline]
pub(crate) fn compute_slot(rows: &[usize], p: usize, params: &HashParams) -> u64 {
    let mut best = (u64::MAX, usize::MAX);
    for &row in rows {
        let candidate = (params.permute(p, row), row);
        if candidate < best {
            best = candidate;
        }
    }
    best.0
}

/// Signatures for every column of `matrix`, in column order.
///
/// The parallel path splits work by track and collects back into column
/// order, so both paths return identical vectors.
pub fn signatures_for_matrix(
    matrix: &ShingleMatrix,
    params: &HashParams,
    use_parallel: bool,
) -> Result<Vec<Signature>, SignatureError> {
    let columns = matrix.columns();
    if use_parallel {
        (0..columns)
            .into_par_iter()
            .map(|column| Ok(minhash_signature(&matrix.column_rows(column)?, params)))
            .collect()
    } else {
        (0..columns)
            .map(|column| Ok(minhash_signature(&matrix.column_rows(column)?, params)))
            .collect()
    }
}
