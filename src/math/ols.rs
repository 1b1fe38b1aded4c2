//! Least squares solver.
//!
//! Every estimator in this crate reduces to an ordinary least squares problem on a
//! (possibly transformed) design:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - Thin QR decomposition `X = QR`; β solves `R β = Q^T y` by back substitution.
//!   This avoids forming `X'X`, which matters with near-collinear regressors.
//! - Rank is checked on the diagonal of `R` relative to each column's norm. A
//!   column that is (numerically) a combination of earlier columns fails with
//!   `RankDeficiency` naming it, instead of producing garbage coefficients.
//! - `(X'X)⁻¹ = R⁻¹ R⁻ᵀ` is kept for the covariance estimators.

use nalgebra::{DMatrix, DVector};

use crate::error::{PanelError, PanelResult};

/// Relative tolerance on `|R_jj| / ‖x_j‖` below which column `j` is deemed collinear.
const RANK_TOL: f64 = 1e-10;

/// Solution of a least squares problem.
#[derive(Debug, Clone)]
pub struct OlsSolution {
    pub beta: DVector<f64>,
    pub residuals: DVector<f64>,
    pub xtx_inv: DMatrix<f64>,
    pub ssr: f64,
}

/// Solve a least squares problem using QR.
///
/// `names` label the columns of `x` for error messages.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>, names: &[String]) -> PanelResult<OlsSolution> {
    let (n, k) = x.shape();
    if k == 0 {
        return Err(PanelError::numerical("design matrix has no columns"));
    }
    if y.len() != n {
        return Err(PanelError::numerical(format!(
            "response has {} rows, design has {n}",
            y.len()
        )));
    }
    if n < k {
        return Err(PanelError::InsufficientObservations {
            context: "least squares".to_string(),
            available: n,
            required: k,
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(PanelError::numerical("non-finite value in least squares input"));
    }

    let qr = x.clone().qr();
    let r = qr.r();
    let q = qr.q();

    for j in 0..k {
        let col_norm = x.column(j).norm();
        if r[(j, j)].abs() <= RANK_TOL * col_norm.max(f64::MIN_POSITIVE) {
            let column = names.get(j).cloned().unwrap_or_else(|| format!("#{j}"));
            return Err(PanelError::RankDeficiency { column });
        }
    }

    let qty = q.transpose() * y;
    let beta = r
        .solve_upper_triangular(&qty)
        .ok_or_else(|| PanelError::numerical("back substitution failed"))?;
    let r_inv = r
        .solve_upper_triangular(&DMatrix::identity(k, k))
        .ok_or_else(|| PanelError::numerical("could not invert R"))?;
    let xtx_inv = &r_inv * r_inv.transpose();

    let residuals = y - x * &beta;
    let ssr = residuals.norm_squared();
    if !ssr.is_finite() || beta.iter().any(|b| !b.is_finite()) {
        return Err(PanelError::numerical("non-finite least squares solution"));
    }

    Ok(OlsSolution {
        beta,
        residuals,
        xtx_inv,
        ssr,
    })
}

/// Coefficient of determination.
///
/// With `centered`, the total sum of squares is taken around the mean of `y`;
/// otherwise around zero (appropriate for demeaned data).
pub fn r_squared(y: &DVector<f64>, ssr: f64, centered: bool) -> f64 {
    let mean = if centered && !y.is_empty() {
        y.mean()
    } else {
        0.0
    };
    let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if tss <= 0.0 {
        return f64::NAN;
    }
    1.0 - ssr / tss
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(k: usize) -> Vec<String> {
        (0..k).map(|j| format!("x{j}")).collect()
    }

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let sol = solve_least_squares(&x, &y, &names(2)).unwrap();
        assert!((sol.beta[0] - 2.0).abs() < 1e-10);
        assert!((sol.beta[1] - 3.0).abs() < 1e-10);
        assert!(sol.ssr < 1e-20);
    }

    #[test]
    fn xtx_inverse_matches_direct_inverse() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.5, 1.0, 1.5, 1.0, -2.0, 1.0, 4.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 0.0, 3.0]);
        let sol = solve_least_squares(&x, &y, &names(2)).unwrap();
        let direct = (x.transpose() * &x).try_inverse().unwrap();
        assert!((sol.xtx_inv - direct).abs().max() < 1e-10);
    }

    #[test]
    fn collinear_column_is_reported_by_name() {
        // Third column is the sum of the first two.
        let x = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 2.0, 3.0, 0.0, 1.0, 1.0, 2.0, 5.0, 7.0, 1.0, 1.0, 2.0],
        );
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0, 4.0]);
        let cols = vec!["a".to_string(), "b".to_string(), "a_plus_b".to_string()];
        let err = solve_least_squares(&x, &y, &cols).unwrap_err();
        assert_eq!(
            err,
            PanelError::RankDeficiency {
                column: "a_plus_b".to_string()
            }
        );
    }

    #[test]
    fn zero_column_is_rank_deficient() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let err = solve_least_squares(&x, &y, &names(2)).unwrap_err();
        assert!(matches!(err, PanelError::RankDeficiency { .. }));
    }

    #[test]
    fn too_few_rows_is_insufficient() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0]);
        let err = solve_least_squares(&x, &y, &names(2)).unwrap_err();
        assert!(matches!(err, PanelError::InsufficientObservations { available: 1, required: 2, .. }));
    }
}
