//! Small dense solvers for the normal equations.

use crate::error::{Result, TmleError};

/// Solve `A x = b` for symmetric positive-definite `A` (row-major, `p x p`)
/// by Cholesky decomposition.
pub fn solve_spd(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    let p = b.len();
    TmleError::check_len(p * p, a.len())?;

    // Lower-triangular factor, row-major.
    let mut l = vec![0.0; p * p];
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[i * p + j];
            for k in 0..j {
                sum -= l[i * p + k] * l[j * p + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(TmleError::numerical(format!(
                        "normal equations are not positive definite (pivot {i} = {sum:e})"
                    )));
                }
                l[i * p + i] = sum.sqrt();
            } else {
                l[i * p + j] = sum / l[j * p + j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = vec![0.0; p];
    for i in 0..p {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * p + k] * y[k];
        }
        y[i] = sum / l[i * p + i];
    }

    // Back substitution: L^T x = y
    let mut x = vec![0.0; p];
    for i in (0..p).rev() {
        let mut sum = y[i];
        for k in (i + 1)..p {
            sum -= l[k * p + i] * x[k];
        }
        x[i] = sum / l[i * p + i];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_two_by_two() {
        // [4 2; 2 3] x = [2; 1] -> x = [0.5, 0]
        let x = solve_spd(&[4.0, 2.0, 2.0, 3.0], &[2.0, 1.0]).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_numerical_error() {
        let err = solve_spd(&[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, TmleError::Numerical(_)));
    }
}
