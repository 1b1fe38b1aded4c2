//! Heteroskedasticity-consistent (sandwich) covariance.
//!
//! `V = (X'X)⁻¹ (Σ_i ω_i x_i x_i') (X'X)⁻¹` with the per-observation weight
//! `ω_i` chosen by `HcType`. The design is the one actually fitted, so for the
//! within estimator the leverages are those of the demeaned design.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CovarianceKind, CovarianceMatrix, FittedModel, HcType};
use crate::error::{PanelError, PanelResult};

/// Leverages below this distance from one contribute nothing to HC3.
const LEVERAGE_EPS: f64 = 1e-12;

/// Diagonal of the hat matrix, `h_ii = x_i' (X'X)⁻¹ x_i`.
pub fn leverages(design: &DMatrix<f64>, xtx_inv: &DMatrix<f64>) -> Vec<f64> {
    let xa = design * xtx_inv;
    (0..design.nrows())
        .map(|i| xa.row(i).dot(&design.row(i)))
        .collect()
}

/// `A · X' diag(ω) X · A` symmetrized, with `A = (X'X)⁻¹`.
pub(crate) fn sandwich(design: &DMatrix<f64>, weights: &[f64], xtx_inv: &DMatrix<f64>) -> DMatrix<f64> {
    let mut scaled = design.clone();
    for (i, w) in weights.iter().enumerate() {
        scaled.row_mut(i).scale_mut(*w);
    }
    let meat = design.transpose() * scaled;
    symmetrize(xtx_inv * meat * xtx_inv)
}

pub(crate) fn symmetrize(m: DMatrix<f64>) -> DMatrix<f64> {
    (&m + m.transpose()) * 0.5
}

pub fn hc_covariance(
    design: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    hc: HcType,
) -> PanelResult<DMatrix<f64>> {
    let n = design.nrows();
    let k = design.ncols();
    if residuals.len() != n || xtx_inv.shape() != (k, k) {
        return Err(PanelError::numerical("HC covariance: design, residual and (X'X)⁻¹ shapes disagree"));
    }

    let weights: Vec<f64> = match hc {
        HcType::HC0 => residuals.iter().map(|e| e * e).collect(),
        HcType::HC1 => {
            if n <= k {
                return Err(PanelError::InsufficientObservations {
                    context: "HC1 covariance".to_string(),
                    available: n,
                    required: k + 1,
                });
            }
            let scale = n as f64 / (n - k) as f64;
            residuals.iter().map(|e| scale * e * e).collect()
        }
        HcType::HC3 => leverages(design, xtx_inv)
            .iter()
            .zip(residuals.iter())
            .map(|(h, e)| {
                let one_minus = 1.0 - h;
                if one_minus <= LEVERAGE_EPS {
                    0.0
                } else {
                    e * e / (one_minus * one_minus)
                }
            })
            .collect(),
    };

    Ok(sandwich(design, &weights, xtx_inv))
}

/// HC covariance of a fitted model, indexed by its regressor names.
pub fn hc_vcov(model: &FittedModel, hc: HcType) -> PanelResult<CovarianceMatrix> {
    let matrix = hc_covariance(model.design(), model.residuals(), model.xtx_inv(), hc)?;
    Ok(CovarianceMatrix {
        kind: CovarianceKind::Hc(hc),
        names: model.names().to_vec(),
        matrix,
    })
}
