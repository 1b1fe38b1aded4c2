//! Cluster-robust covariance, clustered by entity.
//!
//! `V = c · (X'X)⁻¹ (Σ_g s_g s_g') (X'X)⁻¹` with the cluster score
//! `s_g = Σ_{i∈g} x_i e_i`. With the small-sample correction on,
//! `c = G/(G − 1) · (n − 1)/(n − k)`; otherwise `c = 1`.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::domain::{CovarianceKind, CovarianceMatrix, FittedModel};
use crate::error::{PanelError, PanelResult};
use crate::inference::hc::symmetrize;

pub fn cluster_covariance(
    design: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    clusters: &[usize],
    small_sample: bool,
) -> PanelResult<DMatrix<f64>> {
    let n = design.nrows();
    let k = design.ncols();
    if residuals.len() != n || clusters.len() != n || xtx_inv.shape() != (k, k) {
        return Err(PanelError::numerical("cluster covariance: input shapes disagree"));
    }

    let mut scores: BTreeMap<usize, DVector<f64>> = BTreeMap::new();
    for (i, &g) in clusters.iter().enumerate() {
        let score = scores.entry(g).or_insert_with(|| DVector::zeros(k));
        *score += design.row(i).transpose() * residuals[i];
    }
    let g = scores.len();
    if g < 2 {
        return Err(PanelError::InsufficientClusters { clusters: g });
    }

    let mut meat = DMatrix::<f64>::zeros(k, k);
    for s in scores.values() {
        meat += s * s.transpose();
    }

    let scale = if small_sample {
        if n <= k {
            return Err(PanelError::InsufficientObservations {
                context: "cluster-robust covariance".to_string(),
                available: n,
                required: k + 1,
            });
        }
        (g as f64 / (g - 1) as f64) * ((n - 1) as f64 / (n - k) as f64)
    } else {
        1.0
    };

    Ok(symmetrize(xtx_inv * meat * xtx_inv * scale))
}

/// Entity-clustered covariance of a fitted model, with the small-sample correction.
pub fn cluster_vcov(model: &FittedModel) -> PanelResult<CovarianceMatrix> {
    let matrix = cluster_covariance(
        model.design(),
        model.residuals(),
        model.xtx_inv(),
        &model.entity_ids(),
        true,
    )?;
    Ok(CovarianceMatrix {
        kind: CovarianceKind::ClusterEntity,
        names: model.names().to_vec(),
        matrix,
    })
}
