//! Fixed-capacity dense matrices for the Kalman core
//!
//! A [`Matrix`] stores up to [`MAX_DIM`] x [`MAX_DIM`] `f32` values inline,
//! row-major, together with its logical shape. Every arithmetic routine checks
//! operand and destination shapes before touching any element and writes into
//! a destination sized by the caller, so the per-sample path never allocates.

use core::fmt;
use core::ops::{Index, IndexMut};

use crate::error::MatrixError;

/// Largest supported number of rows or columns
pub const MAX_DIM: usize = 8;

const CAPACITY: usize = MAX_DIM * MAX_DIM;

/// Dense row-major matrix with inline storage
#[derive(Clone, Copy, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: [f32; CAPACITY],
}

impl Matrix {
    /// `rows x cols` matrix of zeros
    pub fn zeros(rows: usize, cols: usize) -> Result<Self, MatrixError> {
        Self::filled(rows, cols, 0.0)
    }

    /// `rows x cols` matrix with every element set to `value`
    pub fn filled(rows: usize, cols: usize, value: f32) -> Result<Self, MatrixError> {
        check_shape(rows, cols)?;
        let mut data = [0.0; CAPACITY];
        data[..rows * cols].fill(value);
        Ok(Self { rows, cols, data })
    }

    /// `n x n` identity
    pub fn identity(n: usize) -> Result<Self, MatrixError> {
        let mut matrix = Self::zeros(n, n)?;
        matrix.set_identity()?;
        Ok(matrix)
    }

    /// `n x n` matrix with `diagonal` on the diagonal
    pub fn from_diagonal(diagonal: &[f32]) -> Result<Self, MatrixError> {
        let n = diagonal.len();
        let mut matrix = Self::zeros(n, n)?;
        for (i, value) in diagonal.iter().enumerate() {
            matrix[(i, i)] = *value;
        }
        Ok(matrix)
    }

    /// Fill from values listed row by row
    ///
    /// # Example
    /// ```
    /// use kalman_ahrs::Matrix;
    ///
    /// let m = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    /// assert_eq!(m[(1, 0)], 4.0);
    /// ```
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f32]) -> Result<Self, MatrixError> {
        let mut matrix = Self::zeros(rows, cols)?;
        if values.len() != rows * cols {
            return Err(MatrixError::DimensionMismatch {
                operation: "from_row_slice",
                expected: (rows, cols),
                found: (values.len(), 1),
            });
        }
        matrix.data[..values.len()].copy_from_slice(values);
        Ok(matrix)
    }

    /// Fill from values listed column by column
    ///
    /// Reading a row-major `cols x rows` array this way yields its transpose.
    pub fn from_column_slice(rows: usize, cols: usize, values: &[f32]) -> Result<Self, MatrixError> {
        let mut matrix = Self::zeros(rows, cols)?;
        if values.len() != rows * cols {
            return Err(MatrixError::DimensionMismatch {
                operation: "from_column_slice",
                expected: (rows, cols),
                found: (values.len(), 1),
            });
        }
        for c in 0..cols {
            for r in 0..rows {
                matrix[(r, c)] = values[c * rows + r];
            }
        }
        Ok(matrix)
    }

    /// Zero matrix shaped for the product `a * b`
    ///
    /// A 1x1 operand acts as a scalar, so the result takes the other operand's shape.
    pub fn for_product(a: &Matrix, b: &Matrix) -> Result<Self, MatrixError> {
        let (rows, cols) = product_shape(a, b)?;
        Self::zeros(rows, cols)
    }

    /// Zero matrix shaped for the transpose of `a`
    pub fn for_transpose(a: &Matrix) -> Result<Self, MatrixError> {
        Self::zeros(a.cols, a.rows)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Elements in row-major order
    pub fn as_slice(&self) -> &[f32] {
        &self.data[..self.rows * self.cols]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data[..self.rows * self.cols]
    }

    /// One row as a slice
    pub fn row_slice(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Element access that reports out-of-range indices instead of panicking
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Sum of the diagonal
    pub fn trace(&self) -> Result<f32, MatrixError> {
        self.ensure_square()?;
        Ok((0..self.rows).map(|i| self[(i, i)]).sum())
    }

    pub fn fill(&mut self, value: f32) {
        self.as_mut_slice().fill(value);
    }

    /// Overwrite a square matrix with the identity
    pub fn set_identity(&mut self) -> Result<(), MatrixError> {
        self.ensure_square()?;
        self.fill(0.0);
        for i in 0..self.rows {
            self[(i, i)] = 1.0;
        }
        Ok(())
    }

    /// Copy every element of `source`; shapes must match
    pub fn copy_from(&mut self, source: &Matrix) -> Result<(), MatrixError> {
        same_shape("copy_from", source, self)?;
        self.data = source.data;
        Ok(())
    }

    /// `self += rhs`
    pub fn add_assign(&mut self, rhs: &Matrix) -> Result<(), MatrixError> {
        same_shape("add_assign", rhs, self)?;
        let n = self.rows * self.cols;
        for (value, other) in self.data[..n].iter_mut().zip(&rhs.data[..n]) {
            *value += *other;
        }
        Ok(())
    }

    /// `self = lhs - self`
    pub fn subtract_from(&mut self, lhs: &Matrix) -> Result<(), MatrixError> {
        same_shape("subtract_from", lhs, self)?;
        let n = self.rows * self.cols;
        for (value, other) in self.data[..n].iter_mut().zip(&lhs.data[..n]) {
            *value = *other - *value;
        }
        Ok(())
    }

    /// `self *= scalar`
    pub fn scale_mut(&mut self, scalar: f32) {
        for value in self.as_mut_slice() {
            *value *= scalar;
        }
    }

    pub(crate) fn ensure_square(&self) -> Result<(), MatrixError> {
        if self.is_square() {
            Ok(())
        } else {
            Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        &mut self.data[row * self.cols + col]
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{} [", self.rows, self.cols)?;
        for r in 0..self.rows {
            writeln!(f, "  {:?}", self.row_slice(r))?;
        }
        write!(f, "]")
    }
}

fn check_shape(rows: usize, cols: usize) -> Result<(), MatrixError> {
    if rows == 0 || cols == 0 {
        return Err(MatrixError::Empty);
    }
    if rows > MAX_DIM || cols > MAX_DIM {
        return Err(MatrixError::ExceedsCapacity { rows, cols });
    }
    Ok(())
}

fn same_shape(operation: &'static str, expected: &Matrix, found: &Matrix) -> Result<(), MatrixError> {
    if expected.shape() == found.shape() {
        Ok(())
    } else {
        Err(MatrixError::DimensionMismatch {
            operation,
            expected: expected.shape(),
            found: found.shape(),
        })
    }
}

fn product_shape(a: &Matrix, b: &Matrix) -> Result<(usize, usize), MatrixError> {
    if a.shape() == (1, 1) {
        Ok(b.shape())
    } else if b.shape() == (1, 1) {
        Ok(a.shape())
    } else if a.cols == b.rows {
        Ok((a.rows, b.cols))
    } else {
        Err(MatrixError::DimensionMismatch {
            operation: "multiply",
            expected: (a.cols, b.cols),
            found: b.shape(),
        })
    }
}

/// `dest = a + b`
pub fn add(a: &Matrix, b: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    same_shape("add", a, b)?;
    same_shape("add", a, dest)?;
    let n = a.rows * a.cols;
    for i in 0..n {
        dest.data[i] = a.data[i] + b.data[i];
    }
    Ok(())
}

/// `dest = a - b`
pub fn subtract(a: &Matrix, b: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    same_shape("subtract", a, b)?;
    same_shape("subtract", a, dest)?;
    let n = a.rows * a.cols;
    for i in 0..n {
        dest.data[i] = a.data[i] - b.data[i];
    }
    Ok(())
}

/// `dest = scalar * a`
pub fn scalar_multiply(a: &Matrix, scalar: f32, dest: &mut Matrix) -> Result<(), MatrixError> {
    same_shape("scalar_multiply", a, dest)?;
    let n = a.rows * a.cols;
    for i in 0..n {
        dest.data[i] = a.data[i] * scalar;
    }
    Ok(())
}

/// `dest = a * b`
///
/// A 1x1 operand on either side is treated as a scalar.
pub fn multiply(a: &Matrix, b: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    let shape = product_shape(a, b)?;
    if dest.shape() != shape {
        return Err(MatrixError::DimensionMismatch {
            operation: "multiply",
            expected: shape,
            found: dest.shape(),
        });
    }

    if a.shape() == (1, 1) {
        return scalar_multiply(b, a.data[0], dest);
    }
    if b.shape() == (1, 1) {
        return scalar_multiply(a, b.data[0], dest);
    }

    for r in 0..a.rows {
        for c in 0..b.cols {
            let mut sum = 0.0;
            for k in 0..a.cols {
                sum += a.data[r * a.cols + k] * b.data[k * b.cols + c];
            }
            dest.data[r * dest.cols + c] = sum;
        }
    }
    Ok(())
}

/// `dest = aᵀ`
pub fn transpose(a: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    if dest.shape() != (a.cols, a.rows) {
        return Err(MatrixError::DimensionMismatch {
            operation: "transpose",
            expected: (a.cols, a.rows),
            found: dest.shape(),
        });
    }
    for r in 0..a.rows {
        for c in 0..a.cols {
            dest.data[c * dest.cols + r] = a.data[r * a.cols + c];
        }
    }
    Ok(())
}
