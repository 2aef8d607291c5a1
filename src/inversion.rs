//! Matrix inversion family
//!
//! Closed forms for 1x1 through 4x4 and a cofactor/adjugate method for larger
//! matrices up to [`MAX_DIM`](crate::matrix::MAX_DIM). Determinants and
//! reciprocal determinants are accumulated in `f64`; results are stored as
//! `f32`. Every routine writes the destination only after the determinant has
//! been checked, so a singular input leaves the destination untouched.
//! Source and destination are distinct borrows, which rules out aliasing.

use crate::error::MatrixError;
use crate::matrix::{MAX_DIM, Matrix};

/// Inversion routine chosen once from the matrix size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inversion {
    Scalar,
    TwoByTwo,
    ThreeByThree,
    FourByFour,
    /// Direct cofactor expansion for sizes above four
    Cofactor,
}

impl Inversion {
    /// Pick the cheapest routine for an `n x n` matrix
    pub fn for_size(n: usize) -> Result<Self, MatrixError> {
        match n {
            0 => Err(MatrixError::Empty),
            1 => Ok(Inversion::Scalar),
            2 => Ok(Inversion::TwoByTwo),
            3 => Ok(Inversion::ThreeByThree),
            4 => Ok(Inversion::FourByFour),
            n if n <= MAX_DIM => Ok(Inversion::Cofactor),
            n => Err(MatrixError::ExceedsCapacity { rows: n, cols: n }),
        }
    }

    /// Invert `source` into `dest`
    pub fn invert(self, source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
        match self {
            Inversion::Scalar => invert_1x1(source, dest),
            Inversion::TwoByTwo => invert_2x2(source, dest),
            Inversion::ThreeByThree => invert_3x3(source, dest),
            Inversion::FourByFour => invert_4x4(source, dest),
            Inversion::Cofactor => invert_cofactor(source, dest),
        }
    }
}

fn check_square(operation: &'static str, source: &Matrix, dest: &Matrix, n: Option<usize>) -> Result<(), MatrixError> {
    source.ensure_square()?;
    if let Some(n) = n {
        if source.rows() != n {
            return Err(MatrixError::DimensionMismatch {
                operation,
                expected: (n, n),
                found: source.shape(),
            });
        }
    }
    if dest.shape() != source.shape() {
        return Err(MatrixError::DimensionMismatch {
            operation,
            expected: source.shape(),
            found: dest.shape(),
        });
    }
    Ok(())
}

fn reciprocal(determinant: f64) -> Result<f64, MatrixError> {
    if determinant == 0.0 {
        Err(MatrixError::Singular)
    } else {
        Ok(1.0 / determinant)
    }
}

pub fn invert_1x1(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("invert_1x1", source, dest, Some(1))?;
    let inverse = reciprocal(source[(0, 0)] as f64)?;
    dest[(0, 0)] = inverse as f32;
    Ok(())
}

pub fn invert_2x2(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("invert_2x2", source, dest, Some(2))?;
    let a = |r: usize, c: usize| source[(r, c)] as f64;

    let determinant = a(0, 0) * a(1, 1) - a(0, 1) * a(1, 0);
    let invdet = reciprocal(determinant)?;

    dest[(0, 0)] = (a(1, 1) * invdet) as f32;
    dest[(0, 1)] = (-a(0, 1) * invdet) as f32;
    dest[(1, 0)] = (-a(1, 0) * invdet) as f32;
    dest[(1, 1)] = (a(0, 0) * invdet) as f32;
    Ok(())
}

pub fn invert_3x3(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("invert_3x3", source, dest, Some(3))?;
    let a = |r: usize, c: usize| source[(r, c)] as f64;

    let determinant = a(0, 0) * (a(1, 1) * a(2, 2) - a(2, 1) * a(1, 2))
        - a(0, 1) * (a(1, 0) * a(2, 2) - a(1, 2) * a(2, 0))
        + a(0, 2) * (a(1, 0) * a(2, 1) - a(1, 1) * a(2, 0));
    let invdet = reciprocal(determinant)?;

    let inverse = [
        a(1, 1) * a(2, 2) - a(2, 1) * a(1, 2),
        -(a(0, 1) * a(2, 2) - a(0, 2) * a(2, 1)),
        a(0, 1) * a(1, 2) - a(0, 2) * a(1, 1),
        -(a(1, 0) * a(2, 2) - a(1, 2) * a(2, 0)),
        a(0, 0) * a(2, 2) - a(0, 2) * a(2, 0),
        -(a(0, 0) * a(1, 2) - a(1, 0) * a(0, 2)),
        a(1, 0) * a(2, 1) - a(2, 0) * a(1, 1),
        -(a(0, 0) * a(2, 1) - a(2, 0) * a(0, 1)),
        a(0, 0) * a(1, 1) - a(1, 0) * a(0, 1),
    ];
    for (value, cofactor) in dest.as_mut_slice().iter_mut().zip(inverse) {
        *value = (cofactor * invdet) as f32;
    }
    Ok(())
}

/// 4x4 inverse from the six 2x2 minors of the top and bottom row pairs
pub fn invert_4x4(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("invert_4x4", source, dest, Some(4))?;
    let a = |r: usize, c: usize| source[(r, c)] as f64;

    let s = [
        a(0, 0) * a(1, 1) - a(1, 0) * a(0, 1),
        a(0, 0) * a(1, 2) - a(1, 0) * a(0, 2),
        a(0, 0) * a(1, 3) - a(1, 0) * a(0, 3),
        a(0, 1) * a(1, 2) - a(1, 1) * a(0, 2),
        a(0, 1) * a(1, 3) - a(1, 1) * a(0, 3),
        a(0, 2) * a(1, 3) - a(1, 2) * a(0, 3),
    ];
    let c = [
        a(2, 0) * a(3, 1) - a(3, 0) * a(2, 1),
        a(2, 0) * a(3, 2) - a(3, 0) * a(2, 2),
        a(2, 0) * a(3, 3) - a(3, 0) * a(2, 3),
        a(2, 1) * a(3, 2) - a(3, 1) * a(2, 2),
        a(2, 1) * a(3, 3) - a(3, 1) * a(2, 3),
        a(2, 2) * a(3, 3) - a(3, 2) * a(2, 3),
    ];

    let determinant = s[0] * c[5] - s[1] * c[4] + s[2] * c[3] + s[3] * c[2] - s[4] * c[1] + s[5] * c[0];
    let idet = reciprocal(determinant)?;

    let inverse = [
        a(1, 1) * c[5] - a(1, 2) * c[4] + a(1, 3) * c[3],
        -a(0, 1) * c[5] + a(0, 2) * c[4] - a(0, 3) * c[3],
        a(3, 1) * s[5] - a(3, 2) * s[4] + a(3, 3) * s[3],
        -a(2, 1) * s[5] + a(2, 2) * s[4] - a(2, 3) * s[3],
        -a(1, 0) * c[5] + a(1, 2) * c[2] - a(1, 3) * c[1],
        a(0, 0) * c[5] - a(0, 2) * c[2] + a(0, 3) * c[1],
        -a(3, 0) * s[5] + a(3, 2) * s[2] - a(3, 3) * s[1],
        a(2, 0) * s[5] - a(2, 2) * s[2] + a(2, 3) * s[1],
        a(1, 0) * c[4] - a(1, 1) * c[2] + a(1, 3) * c[0],
        -a(0, 0) * c[4] + a(0, 1) * c[2] - a(0, 3) * c[0],
        a(3, 0) * s[4] - a(3, 1) * s[2] + a(3, 3) * s[0],
        -a(2, 0) * s[4] + a(2, 1) * s[2] - a(2, 3) * s[0],
        -a(1, 0) * c[3] + a(1, 1) * c[1] - a(1, 2) * c[0],
        a(0, 0) * c[3] - a(0, 1) * c[1] + a(0, 2) * c[0],
        -a(3, 0) * s[3] + a(3, 1) * s[1] - a(3, 2) * s[0],
        a(2, 0) * s[3] - a(2, 1) * s[1] + a(2, 2) * s[0],
    ];
    for (value, cofactor) in dest.as_mut_slice().iter_mut().zip(inverse) {
        *value = (cofactor * idet) as f32;
    }
    Ok(())
}

/// Copy `source` without row `skip_row` and column `skip_col` into `minor`
fn minor_into(source: &Matrix, skip_row: usize, skip_col: usize, minor: &mut Matrix) -> Result<(), MatrixError> {
    let n = source.rows();
    *minor = Matrix::zeros(n - 1, n - 1)?;
    let mut index = 0;
    for r in (0..n).filter(|r| *r != skip_row) {
        for c in (0..n).filter(|c| *c != skip_col) {
            minor.as_mut_slice()[index] = source[(r, c)];
            index += 1;
        }
    }
    Ok(())
}

fn cofactor_sign(row: usize, col: usize) -> f64 {
    if (row + col) & 1 == 1 { -1.0 } else { 1.0 }
}

/// Determinant by recursive cofactor expansion along the first row
pub fn determinant(source: &Matrix) -> Result<f64, MatrixError> {
    source.ensure_square()?;
    let n = source.rows();
    match n {
        1 => Ok(source[(0, 0)] as f64),
        2 => Ok(source[(0, 0)] as f64 * source[(1, 1)] as f64 - source[(0, 1)] as f64 * source[(1, 0)] as f64),
        _ => {
            let mut minor = Matrix::zeros(n - 1, n - 1)?;
            let mut sum = 0.0;
            for col in 0..n {
                let pivot = source[(0, col)] as f64;
                if pivot == 0.0 {
                    continue;
                }
                minor_into(source, 0, col, &mut minor)?;
                sum += cofactor_sign(0, col) * pivot * determinant(&minor)?;
            }
            Ok(sum)
        }
    }
}

/// Adjugate (transposed cofactor matrix)
pub fn adjugate(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("adjugate", source, dest, None)?;
    let n = source.rows();
    if n == 1 {
        dest[(0, 0)] = 1.0;
        return Ok(());
    }

    let mut result = Matrix::zeros(n, n)?;
    let mut minor = Matrix::zeros(n - 1, n - 1)?;
    for r in 0..n {
        for c in 0..n {
            minor_into(source, r, c, &mut minor)?;
            result[(c, r)] = (cofactor_sign(r, c) * determinant(&minor)?) as f32;
        }
    }
    dest.copy_from(&result)
}

/// General inverse `adj(A) / det(A)` through an explicit adjugate
pub fn invert_adjugate(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("invert_adjugate", source, dest, None)?;
    let invdet = reciprocal(determinant(source)?)?;

    let mut adj = Matrix::for_transpose(source)?;
    adjugate(source, &mut adj)?;
    for (value, cofactor) in dest.as_mut_slice().iter_mut().zip(adj.as_slice()) {
        *value = (*cofactor as f64 * invdet) as f32;
    }
    Ok(())
}

/// General inverse writing each scaled cofactor straight into `dest`
///
/// Skips the intermediate adjugate matrix of [`invert_adjugate`].
pub fn invert_cofactor(source: &Matrix, dest: &mut Matrix) -> Result<(), MatrixError> {
    check_square("invert_cofactor", source, dest, None)?;
    let invdet = reciprocal(determinant(source)?)?;
    let n = source.rows();
    if n == 1 {
        dest[(0, 0)] = invdet as f32;
        return Ok(());
    }

    let mut minor = Matrix::zeros(n - 1, n - 1)?;
    for r in 0..n {
        for c in 0..n {
            minor_into(source, r, c, &mut minor)?;
            dest[(c, r)] = (cofactor_sign(r, c) * determinant(&minor)? * invdet) as f32;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::multiply;

    fn well_conditioned(n: usize) -> Matrix {
        let mut m = Matrix::zeros(n, n).unwrap();
        for r in 0..n {
            for c in 0..n {
                m[(r, c)] = if r == c { 4.0 + r as f32 } else { 1.0 / (1.0 + r as f32 + 2.0 * c as f32) };
            }
        }
        m
    }

    fn assert_identity(m: &Matrix, tolerance: f32) {
        for r in 0..m.rows() {
            for c in 0..m.cols() {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!(
                    (m[(r, c)] - expected).abs() < tolerance,
                    "element ({r}, {c}) = {}",
                    m[(r, c)]
                );
            }
        }
    }

    #[test]
    fn test_dispatch_by_size() {
        assert_eq!(Inversion::for_size(1), Ok(Inversion::Scalar));
        assert_eq!(Inversion::for_size(4), Ok(Inversion::FourByFour));
        assert_eq!(Inversion::for_size(6), Ok(Inversion::Cofactor));
        assert_eq!(Inversion::for_size(0), Err(MatrixError::Empty));
        assert_eq!(
            Inversion::for_size(MAX_DIM + 1),
            Err(MatrixError::ExceedsCapacity { rows: MAX_DIM + 1, cols: MAX_DIM + 1 })
        );
    }

    #[test]
    fn test_every_size_inverts() {
        for n in 1..=MAX_DIM {
            let a = well_conditioned(n);
            let mut inverse = Matrix::zeros(n, n).unwrap();
            Inversion::for_size(n).unwrap().invert(&a, &mut inverse).unwrap();

            let mut product = Matrix::zeros(n, n).unwrap();
            multiply(&a, &inverse, &mut product).unwrap();
            assert_identity(&product, 1e-4);
        }
    }

    #[test]
    fn test_closed_forms_match_general_path() {
        for n in 1..=MAX_DIM {
            let a = well_conditioned(n);
            let mut general = Matrix::zeros(n, n).unwrap();
            let mut adjugate_path = Matrix::zeros(n, n).unwrap();

            invert_cofactor(&a, &mut general).unwrap();
            invert_adjugate(&a, &mut adjugate_path).unwrap();
            for i in 0..n * n {
                assert!(
                    (general.as_slice()[i] - adjugate_path.as_slice()[i]).abs() < 1e-6,
                    "size {n}, element {i}"
                );
            }

            if n <= 4 {
                let mut closed = Matrix::zeros(n, n).unwrap();
                Inversion::for_size(n).unwrap().invert(&a, &mut closed).unwrap();
                for i in 0..n * n {
                    assert!((closed.as_slice()[i] - general.as_slice()[i]).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_singular_leaves_destination() {
        for n in 1..=6 {
            let zero = Matrix::zeros(n, n).unwrap();
            let mut dest = Matrix::filled(n, n, 3.0).unwrap();
            let result = Inversion::for_size(n).unwrap().invert(&zero, &mut dest);
            assert_eq!(result, Err(MatrixError::Singular), "size {n}");
            assert!(dest.as_slice().iter().all(|v| *v == 3.0));
        }
    }

    #[test]
    fn test_rank_deficient_is_singular() {
        let a = Matrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0]).unwrap();
        let mut dest = Matrix::zeros(3, 3).unwrap();
        assert_eq!(invert_3x3(&a, &mut dest), Err(MatrixError::Singular));
        assert_eq!(invert_cofactor(&a, &mut dest), Err(MatrixError::Singular));
    }

    #[test]
    fn test_wrong_size_rejected() {
        let a = Matrix::identity(3).unwrap();
        let mut dest = Matrix::zeros(3, 3).unwrap();
        assert!(matches!(invert_4x4(&a, &mut dest), Err(MatrixError::DimensionMismatch { .. })));

        let rect = Matrix::zeros(2, 3).unwrap();
        let mut dest = Matrix::zeros(2, 3).unwrap();
        assert!(matches!(invert_cofactor(&rect, &mut dest), Err(MatrixError::NotSquare { .. })));
    }

    #[test]
    fn test_determinant() {
        let a = Matrix::from_row_slice(3, 3, &[2.0, 0.0, 1.0, 1.0, 3.0, 2.0, 1.0, 1.0, 1.0]).unwrap();
        assert!((determinant(&a).unwrap() - 1.0).abs() < 1e-12);
        assert!((determinant(&Matrix::identity(7).unwrap()).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_adjugate_of_2x2() {
        let a = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut adj = Matrix::zeros(2, 2).unwrap();
        adjugate(&a, &mut adj).unwrap();
        assert_eq!(adj.as_slice(), &[4.0, -2.0, -3.0, 1.0]);
    }
}
