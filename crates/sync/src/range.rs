//! Command ranges.

use crate::error::ApplyError;

/// A validated command target: one cell or an inclusive rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRange {
    Single { row: usize, col: usize },
    Rect { start_row: usize, start_col: usize, end_row: usize, end_col: usize },
}

impl CellRange {
    /// Parse a wire range: `[row, col]` or `[startRow, startCol, endRow, endCol]`.
    pub fn parse(range: &[i64]) -> Result<Self, ApplyError> {
        let invalid = |reason| ApplyError::InvalidRange { range: range.to_vec(), reason };

        if range.iter().any(|&v| v < 0) {
            return Err(invalid("negative coordinate"));
        }
        let v: Vec<usize> = range.iter().map(|&v| v as usize).collect();

        match v.as_slice() {
            &[row, col] => Ok(CellRange::Single { row, col }),
            &[start_row, start_col, end_row, end_col] => {
                if end_row < start_row || end_col < start_col {
                    return Err(invalid("inverted bounds"));
                }
                Ok(CellRange::Rect { start_row, start_col, end_row, end_col })
            }
            _ => Err(invalid("expected 2 or 4 coordinates")),
        }
    }

    /// Reject ranges that reach outside a `rows` x `cols` grid.
    pub fn check_bounds(&self, rows: usize, cols: usize) -> Result<(), ApplyError> {
        let (end_row, end_col) = self.end();
        if end_row >= rows || end_col >= cols {
            return Err(ApplyError::InvalidRange {
                range: self.to_wire(),
                reason: "outside the sheet",
            });
        }
        Ok(())
    }

    pub fn start(&self) -> (usize, usize) {
        match *self {
            CellRange::Single { row, col } => (row, col),
            CellRange::Rect { start_row, start_col, .. } => (start_row, start_col),
        }
    }

    pub fn end(&self) -> (usize, usize) {
        match *self {
            CellRange::Single { row, col } => (row, col),
            CellRange::Rect { end_row, end_col, .. } => (end_row, end_col),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, CellRange::Single { .. })
    }

    pub fn cell_count(&self) -> usize {
        let (sr, sc) = self.start();
        let (er, ec) = self.end();
        (er - sr + 1) * (ec - sc + 1)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (sr, sc) = self.start();
        let (er, ec) = self.end();
        (sr..=er).flat_map(move |r| (sc..=ec).map(move |c| (r, c)))
    }

    pub fn to_wire(&self) -> Vec<i64> {
        match *self {
            CellRange::Single { row, col } => vec![row as i64, col as i64],
            CellRange::Rect { start_row, start_col, end_row, end_col } => {
                vec![start_row as i64, start_col as i64, end_row as i64, end_col as i64]
            }
        }
    }
}
