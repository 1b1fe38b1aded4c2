//! Hausman test of random against fixed effects.
//!
//! `H = (b_FE − b_RE)' (V_FE − V_RE)⁻¹ (b_FE − b_RE)` over the slopes both models
//! estimate, `χ²(k)` under the null that the entity effects are uncorrelated with
//! the regressors.
//!
//! The covariance difference is not guaranteed to be positive definite in finite
//! samples. A singular difference is handled with a pseudo-inverse (degrees of
//! freedom = its rank); a negative statistic is reported as-is with `p = 1` and a
//! note, never clamped.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::domain::{FittedModel, NullDistribution, TestKind, TestResult};
use crate::error::{PanelError, PanelResult};
use crate::math::p_value;

const PINV_TOL: f64 = 1e-10;

/// Quadratic form and degrees of freedom of the Hausman contrast.
///
/// Swapping the roles of the two models flips the sign of the statistic but not
/// its magnitude.
pub fn hausman_statistic(
    b_fixed: &DVector<f64>,
    v_fixed: &DMatrix<f64>,
    b_random: &DVector<f64>,
    v_random: &DMatrix<f64>,
) -> PanelResult<(f64, usize)> {
    let k = b_fixed.len();
    if k == 0 || b_random.len() != k || v_fixed.shape() != (k, k) || v_random.shape() != (k, k) {
        return Err(PanelError::numerical("Hausman: coefficient and covariance shapes disagree"));
    }
    let d = b_fixed - b_random;
    let diff = v_fixed - v_random;

    if let Some(inv) = diff.clone().lu().try_inverse() {
        if inv.iter().all(|v| v.is_finite()) {
            let h = (d.transpose() * &inv * &d)[(0, 0)];
            return Ok((h, k));
        }
    }

    let rank = diff.clone().svd(false, false).rank(PINV_TOL);
    if rank == 0 {
        return Err(PanelError::numerical("Hausman: covariance difference is zero"));
    }
    let pinv = diff
        .pseudo_inverse(PINV_TOL)
        .map_err(|e| PanelError::numerical(format!("Hausman pseudo-inverse: {e}")))?;
    let h = (d.transpose() * pinv * &d)[(0, 0)];
    Ok((h, rank))
}

/// Hausman test on the slopes shared by a within and a random effects fit.
pub fn hausman(fixed: &FittedModel, random: &FittedModel) -> PanelResult<TestResult> {
    let shared: Vec<(usize, usize)> = fixed
        .names()
        .iter()
        .enumerate()
        .filter_map(|(i, name)| random.position(name).map(|j| (i, j)))
        .collect();
    if shared.is_empty() {
        return Err(PanelError::numerical("Hausman: models share no coefficients"));
    }

    let k = shared.len();
    let b_f = DVector::from_fn(k, |r, _| fixed.coefficients()[shared[r].0]);
    let b_r = DVector::from_fn(k, |r, _| random.coefficients()[shared[r].1]);
    let v_f = DMatrix::from_fn(k, k, |r, c| fixed.vcov()[(shared[r].0, shared[c].0)]);
    let v_r = DMatrix::from_fn(k, k, |r, c| random.vcov()[(shared[r].1, shared[c].1)]);

    let (statistic, df) = hausman_statistic(&b_f, &v_f, &b_r, &v_r)?;
    let distribution = NullDistribution::ChiSquared { df: df as f64 };

    let mut notes = Vec::new();
    if df < k {
        notes.push(format!("covariance difference is singular; generalized inverse with rank {df} of {k}"));
    }
    if statistic < 0.0 {
        warn!(statistic, "negative Hausman statistic (V_FE − V_RE not positive definite)");
        notes.push("negative statistic: V_FE − V_RE is not positive definite, p-value set to 1".to_string());
    }

    Ok(TestResult {
        test: TestKind::Hausman,
        statistic,
        distribution,
        p_value: p_value(statistic, distribution)?,
        note: if notes.is_empty() { None } else { Some(notes.join("; ")) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (DVector<f64>, DMatrix<f64>, DVector<f64>, DMatrix<f64>) {
        (
            DVector::from_vec(vec![1.0, 2.0]),
            DMatrix::from_diagonal(&DVector::from_vec(vec![0.5, 1.0])),
            DVector::from_vec(vec![0.5, 1.0]),
            DMatrix::from_diagonal(&DVector::from_vec(vec![0.25, 0.5])),
        )
    }

    #[test]
    fn hand_computed_statistic() {
        // d = [0.5, 1], V_FE − V_RE = diag(0.25, 0.5): 0.25/0.25 + 1/0.5 = 3.
        let (bf, vf, br, vr) = fixture();
        let (h, df) = hausman_statistic(&bf, &vf, &br, &vr).unwrap();
        assert!((h - 3.0).abs() < 1e-12);
        assert_eq!(df, 2);
    }

    #[test]
    fn swapping_labels_keeps_magnitude() {
        let (bf, vf, br, vr) = fixture();
        let (h, _) = hausman_statistic(&bf, &vf, &br, &vr).unwrap();
        let (h_swapped, _) = hausman_statistic(&br, &vr, &bf, &vf).unwrap();
        assert!((h + h_swapped).abs() < 1e-12);
        assert!((h.abs() - h_swapped.abs()).abs() < 1e-12);
    }

    #[test]
    fn singular_difference_uses_rank() {
        let bf = DVector::from_vec(vec![1.0, 2.0]);
        let br = DVector::from_vec(vec![0.0, 2.0]);
        let vf = DMatrix::from_diagonal(&DVector::from_vec(vec![0.5, 1.0]));
        let vr = DMatrix::from_diagonal(&DVector::from_vec(vec![0.25, 1.0]));
        let (h, df) = hausman_statistic(&bf, &vf, &br, &vr).unwrap();
        assert_eq!(df, 1);
        assert!((h - 4.0).abs() < 1e-9);
    }

    #[test]
    fn negative_statistic_has_unit_p_value() {
        let (bf, vf, br, vr) = fixture();
        let (h, df) = hausman_statistic(&br, &vr, &bf, &vf).unwrap();
        let p = p_value(h, NullDistribution::ChiSquared { df: df as f64 }).unwrap();
        assert!(h < 0.0);
        assert_eq!(p, 1.0);
    }
}
