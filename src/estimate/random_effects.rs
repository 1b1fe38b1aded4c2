//! Random effects via Swamy–Arora variance components.
//!
//! The one-way error-component model splits the error into an entity part
//! (variance `σ²_u`) and an idiosyncratic part (`σ²_e`):
//!
//! - `σ²_e` from the within regression: `SSR_w / (n − N − k)`
//! - `σ²_b` from the between regression on entity means: `SSR_b / (N − k − 1)`,
//!   which estimates `σ²_u + σ²_e / T̄` with `T̄` the harmonic mean of `T_i`
//! - `σ²_u = σ²_b − σ²_e / T̄`, truncated to zero when negative
//!
//! Each entity is then quasi-demeaned with
//! `θ_i = 1 − sqrt(σ²_e / (σ²_e + T_i σ²_u))` and the transformed data are fitted by
//! OLS (the intercept column becomes `1 − θ_i`). `θ = 0` is pooled OLS, `θ = 1`
//! is the within estimator.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::domain::{FittedModel, ObsIndex, Specification, VarianceComponents};
use crate::error::{PanelError, PanelResult};
use crate::estimate::engine::{DesignParts, LevelScale, finish, with_intercept};
use crate::estimate::sample::EstimationSample;
use crate::math::solve_least_squares;
use crate::panel::{entity_means, quasi_demean, within_transform};

/// Estimate the variance components for a complete-case sample.
pub fn variance_components(sample: &EstimationSample) -> PanelResult<(f64, f64, bool)> {
    let n = sample.n_obs();
    let n_entities = sample.n_entities();
    let k = sample.x.ncols();

    if n <= n_entities + k {
        return Err(PanelError::InsufficientObservations {
            context: "random effects (within variance)".to_string(),
            available: n,
            required: n_entities + k + 1,
        });
    }
    if n_entities <= k + 1 {
        return Err(PanelError::InsufficientObservations {
            context: "random effects (between variance)".to_string(),
            available: n_entities,
            required: k + 2,
        });
    }

    let (x_w, y_w) = within_transform(&sample.x, &sample.y, &sample.entity_ids, n_entities);
    let within = solve_least_squares(&x_w, &y_w, &sample.names)?;
    let sigma2_e = within.ssr / (n - n_entities - k) as f64;

    let y_bar = entity_means(sample.y.as_slice(), &sample.entity_ids, n_entities);
    let mut x_bar = DMatrix::<f64>::zeros(n_entities, k);
    for j in 0..k {
        let col: Vec<f64> = sample.x.column(j).iter().copied().collect();
        let means = entity_means(&col, &sample.entity_ids, n_entities);
        x_bar.set_column(j, &DVector::from_vec(means));
    }
    let (between_design, between_names) = with_intercept(&x_bar, &sample.names);
    let between = solve_least_squares(&between_design, &DVector::from_vec(y_bar), &between_names)?;
    let sigma2_b = between.ssr / (n_entities - k - 1) as f64;

    let counts = sample.counts();
    let harmonic_t = n_entities as f64 / counts.iter().map(|&c| 1.0 / c as f64).sum::<f64>();
    let raw_u = sigma2_b - sigma2_e / harmonic_t;
    let truncated = raw_u < 0.0;
    if truncated {
        warn!(
            sigma2_u = raw_u,
            "negative entity variance component truncated to zero (random effects reduces to pooled OLS)"
        );
    }
    Ok((sigma2_e, raw_u.max(0.0), truncated))
}

/// Quasi-demeaned GLS fit of the random effects model.
pub fn fit_random_effects(sample: EstimationSample, spec: &Specification) -> PanelResult<FittedModel> {
    let (sigma2_e, sigma2_u, truncated) = variance_components(&sample)?;
    let counts = sample.counts();
    let theta: Vec<f64> = counts
        .iter()
        .map(|&t| {
            let denom = sigma2_e + t as f64 * sigma2_u;
            if denom <= 0.0 {
                0.0
            } else {
                1.0 - (sigma2_e / denom).sqrt()
            }
        })
        .collect();

    let (raw_design, names) = with_intercept(&sample.x, &sample.names);
    let mut design = DMatrix::<f64>::zeros(raw_design.nrows(), raw_design.ncols());
    for j in 0..raw_design.ncols() {
        let col: Vec<f64> = raw_design.column(j).iter().copied().collect();
        design.set_column(j, &DVector::from_vec(quasi_demean(&col, &sample.entity_ids, &theta)));
    }
    let response = DVector::from_vec(quasi_demean(sample.y.as_slice(), &sample.entity_ids, &theta));

    let index: Vec<ObsIndex> = sample
        .entity_ids
        .iter()
        .zip(sample.times.iter())
        .map(|(&entity, &time)| ObsIndex { entity, time })
        .collect();
    let components = VarianceComponents {
        idiosyncratic: sigma2_e,
        individual: sigma2_u,
        theta_min: theta.iter().copied().fold(f64::INFINITY, f64::min),
        theta_max: theta.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        truncated,
    };

    finish(
        spec,
        DesignParts {
            names,
            design,
            response,
            levels: LevelScale::Design(raw_design),
            index,
            entity_names: sample.entity_names,
            audit: sample.audit,
            absorbed: 0,
            centered_r2: true,
            components: Some(components),
        },
    )
}
