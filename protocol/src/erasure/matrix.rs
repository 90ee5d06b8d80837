//! Dense matrices over GF(2^8).
//!
//! Row-major storage in a single `Vec<u8>`. Sizes are tiny (at most a few
//! dozen rows), so clarity wins over cache tricks here.

use thiserror::Error;

use crate::field::{self, FieldError};

/// Errors from matrix algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// Inversion requested on a non-square matrix.
    #[error("matrix is not square: {rows}x{cols}")]
    NotSquare {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },

    /// No inverse exists over GF(2^8).
    #[error("matrix is singular")]
    Singular,

    /// Dimensions of the operands do not line up.
    #[error("dimension mismatch: {left_cols} columns against {right_rows} rows")]
    DimensionMismatch {
        /// Columns of the left operand.
        left_cols: usize,
        /// Rows of the right operand.
        right_rows: usize,
    },

    /// Field arithmetic failure during elimination.
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// A `rows × cols` matrix of field elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// `n × n` identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1);
        }
        m
    }

    /// Build from explicit rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in &rows {
            if row.len() != cols {
                return Err(MatrixError::DimensionMismatch {
                    left_cols: cols,
                    right_rows: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Parity block of the generator: `entry[i][j] = α^(i·j)`.
    ///
    /// Row 0 is all ones (plain XOR parity); row `i` evaluates the data
    /// column at the point `α^i`.
    pub fn vandermonde(rows: usize, cols: usize) -> Self {
        let mut m = Self::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                m.set(i, j, field::exp(i * j));
            }
        }
        m
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at `(r, c)`.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u8 {
        self.data[r * self.cols + c]
    }

    /// Overwrite the element at `(r, c)`.
    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: u8) {
        self.data[r * self.cols + c] = value;
    }

    /// Borrow row `r`.
    pub fn row(&self, r: usize) -> &[u8] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    /// Matrix product `self · rhs`.
    pub fn multiply(&self, rhs: &Matrix) -> Result<Matrix, MatrixError> {
        if self.cols != rhs.rows {
            return Err(MatrixError::DimensionMismatch {
                left_cols: self.cols,
                right_rows: rhs.rows,
            });
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for r in 0..self.rows {
            for c in 0..rhs.cols {
                let mut acc = 0u8;
                for k in 0..self.cols {
                    acc ^= field::mul(self.get(r, k), rhs.get(k, c));
                }
                out.set(r, c, acc);
            }
        }
        Ok(out)
    }

    /// Inverse by Gauss-Jordan elimination on `[self | I]`.
    ///
    /// Field division replaces real division; subtraction is XOR, so
    /// eliminating a row is `row ^= factor · pivot_row`.
    pub fn invert(&self) -> Result<Matrix, MatrixError> {
        if self.rows != self.cols {
            return Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let n = self.rows;
        let mut work = self.clone();
        let mut inverse = Matrix::identity(n);

        for col in 0..n {
            let pivot = (col..n)
                .find(|&r| work.get(r, col) != 0)
                .ok_or(MatrixError::Singular)?;
            work.swap_rows(col, pivot);
            inverse.swap_rows(col, pivot);

            let scale = field::inv(work.get(col, col))?;
            for c in 0..n {
                work.set(col, c, field::mul(work.get(col, c), scale));
                inverse.set(col, c, field::mul(inverse.get(col, c), scale));
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = work.get(r, col);
                if factor == 0 {
                    continue;
                }
                for c in 0..n {
                    let w = field::sub(work.get(r, c), field::mul(factor, work.get(col, c)));
                    work.set(r, c, w);
                    let v = field::sub(inverse.get(r, c), field::mul(factor, inverse.get(col, c)));
                    inverse.set(r, c, v);
                }
            }
        }

        Ok(inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_its_own_inverse() {
        let id = Matrix::identity(5);
        assert_eq!(id.invert().unwrap(), id);
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let m = Matrix::from_rows(vec![
            vec![1, 1, 1, 1],
            vec![1, 2, 4, 8],
            vec![0, 0, 1, 0],
            vec![0, 0, 0, 1],
        ])
        .unwrap();
        let inv = m.invert().unwrap();
        assert_eq!(m.multiply(&inv).unwrap(), Matrix::identity(4));
        assert_eq!(inv.multiply(&m).unwrap(), Matrix::identity(4));
    }

    #[test]
    fn singular_matrix_is_reported() {
        let m = Matrix::from_rows(vec![vec![1, 2], vec![1, 2]]).unwrap();
        assert_eq!(m.invert(), Err(MatrixError::Singular));
    }

    #[test]
    fn non_square_inversion_is_rejected() {
        let m = Matrix::zeros(2, 3);
        assert!(matches!(m.invert(), Err(MatrixError::NotSquare { .. })));
    }

    #[test]
    fn vandermonde_rows_follow_alpha_powers() {
        let v = Matrix::vandermonde(2, 4);
        assert_eq!(v.row(0), &[1, 1, 1, 1]);
        assert_eq!(v.row(1), &[1, 2, 4, 8]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(Matrix::from_rows(vec![vec![1, 2], vec![3]]).is_err());
    }
}
