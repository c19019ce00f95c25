//! Boolean peak × track presence matrix.

use serde::{Deserialize, Serialize};

use crate::config::SignatureError;
use crate::types::PeakId;
use crate::vocabulary::PeakVocabulary;

/// Presence matrix with one row per vocabulary peak and one column per track.
///
/// Cells are stored column-major as `0`/`1` bytes so a track's rows can be
/// read without striding across the whole matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShingleMatrix {
    rows: usize,
    columns: usize,
    cells: Vec<u8>,
}

impl ShingleMatrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            cells: vec![0; rows * columns],
        }
    }

    /// Build by direct index assignment, O(Σ |peaks(t)|).
    ///
    /// Peaks missing from `vocabulary` are skipped.
    pub fn build<S: AsRef<[PeakId]>>(vocabulary: &PeakVocabulary, peak_sets: &[S]) -> Self {
        let mut matrix = Self::zeros(vocabulary.len(), peak_sets.len());
        for (column, peaks) in peak_sets.iter().enumerate() {
            for &peak in peaks.as_ref() {
                if let Some(row) = vocabulary.row_of(peak) {
                    matrix.cells[column * matrix.rows + row] = 1;
                }
            }
        }
        matrix
    }

    /// Build by scanning every (peak, track) pair, O(|vocabulary| · |tracks|).
    ///
    /// Produces the same matrix as [`build`](Self::build); kept as the
    /// reference construction.
    pub fn from_membership_scan<S: AsRef<[PeakId]>>(
        vocabulary: &PeakVocabulary,
        peak_sets: &[S],
    ) -> Self {
        let mut matrix = Self::zeros(vocabulary.len(), peak_sets.len());
        for (column, peaks) in peak_sets.iter().enumerate() {
            let peaks = peaks.as_ref();
            for (row, peak) in vocabulary.peaks().iter().enumerate() {
                if peaks.contains(peak) {
                    matrix.cells[column * matrix.rows + row] = 1;
                }
            }
        }
        matrix
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> Result<bool, SignatureError> {
        self.check(row, column)?;
        Ok(self.cells[column * self.rows + row] == 1)
    }

    pub fn set(&mut self, row: usize, column: usize, present: bool) -> Result<(), SignatureError> {
        self.check(row, column)?;
        self.cells[column * self.rows + row] = u8::from(present);
        Ok(())
    }

    /// Rows holding a `1` in `column`, ascending.
    pub fn column_rows(&self, column: usize) -> Result<Vec<usize>, SignatureError> {
        if column >= self.columns {
            return Err(SignatureError::ColumnOutOfRange {
                column,
                columns: self.columns,
            });
        }
        let start = column * self.rows;
        Ok(self.cells[start..start + self.rows]
            .iter()
            .enumerate()
            .filter_map(|(row, &cell)| (cell == 1).then_some(row))
            .collect())
    }

    /// Raw column-major cells.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    fn check(&self, row: usize, column: usize) -> Result<(), SignatureError> {
        if row >= self.rows {
            return Err(SignatureError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        if column >= self.columns {
            return Err(SignatureError::ColumnOutOfRange {
                column,
                columns: self.columns,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<PeakId>> {
        vec![vec![1, 2, 5], vec![1, 2, 6], vec![9, 10, 11]]
    }

    #[test]
    fn direct_and_scan_builders_agree() {
        let sets = corpus();
        let vocab = PeakVocabulary::from_peak_sets(&sets);
        let direct = ShingleMatrix::build(&vocab, &sets);
        let scanned = ShingleMatrix::from_membership_scan(&vocab, &sets);
        assert_eq!(direct, scanned);
        assert_eq!(direct.as_bytes(), scanned.as_bytes());
    }

    #[test]
    fn matrix_has_expected_cells() {
        let sets = corpus();
        let vocab = PeakVocabulary::from_peak_sets(&sets);
        let matrix = ShingleMatrix::build(&vocab, &sets);

        assert_eq!(matrix.rows(), 7);
        assert_eq!(matrix.columns(), 3);
        // vocabulary: 1 2 5 6 9 10 11
        assert_eq!(matrix.column_rows(0).unwrap(), vec![0, 1, 2]);
        assert_eq!(matrix.column_rows(1).unwrap(), vec![0, 1, 3]);
        assert_eq!(matrix.column_rows(2).unwrap(), vec![4, 5, 6]);
        assert!(matrix.get(2, 0).unwrap());
        assert!(!matrix.get(2, 1).unwrap());
    }

    #[test]
    fn empty_peak_set_yields_zero_column() {
        let sets = vec![vec![3u64, 4], vec![]];
        let vocab = PeakVocabulary::from_peak_sets(&sets);
        let matrix = ShingleMatrix::build(&vocab, &sets);
        assert!(matrix.column_rows(1).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let mut matrix = ShingleMatrix::zeros(2, 2);
        assert!(matches!(
            matrix.get(2, 0),
            Err(SignatureError::RowOutOfRange { row: 2, rows: 2 })
        ));
        assert!(matches!(
            matrix.set(0, 5, true),
            Err(SignatureError::ColumnOutOfRange {
                column: 5,
                columns: 2
            })
        ));
        assert!(matrix.column_rows(2).is_err());
    }

    #[test]
    fn set_then_get() {
        let mut matrix = ShingleMatrix::zeros(3, 1);
        matrix.set(1, 0, true).unwrap();
        assert_eq!(matrix.column_rows(0).unwrap(), vec![1]);
        matrix.set(1, 0, false).unwrap();
        assert!(matrix.column_rows(0).unwrap().is_empty());
    }
}
