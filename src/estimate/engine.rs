//! Pooled, within and first-difference estimators.
//!
//! Each estimator transforms the complete-case sample into a design matrix and a
//! response, then hands both to the shared QR least squares step. The transformed
//! design is kept on the fitted model because the robust covariance estimators
//! need it.

use nalgebra::{DMatrix, DVector};

use crate::domain::{DropAudit, FittedModel, INTERCEPT, ObsIndex, Specification, VarianceComponents};
use crate::error::{PanelError, PanelResult};
use crate::estimate::sample::EstimationSample;
use crate::math::{r_squared, solve_least_squares};
use crate::panel::within_transform;

/// How fitted values on the response scale are recovered after the fit.
pub(crate) enum LevelScale {
    /// `y − e`: the transformation only removes entity means (or is the identity).
    Residual(DVector<f64>),
    /// `X β` on an untransformed design.
    Design(DMatrix<f64>),
}

/// Inputs to the shared least squares step.
pub(crate) struct DesignParts {
    pub names: Vec<String>,
    pub design: DMatrix<f64>,
    pub response: DVector<f64>,
    pub levels: LevelScale,
    pub index: Vec<ObsIndex>,
    pub entity_names: Vec<String>,
    pub audit: DropAudit,
    /// Parameters absorbed by the transformation (entity means for within).
    pub absorbed: usize,
    pub centered_r2: bool,
    pub components: Option<VarianceComponents>,
}

pub(crate) fn finish(spec: &Specification, parts: DesignParts) -> PanelResult<FittedModel> {
    let n = parts.design.nrows();
    let k = parts.design.ncols();
    let required = k + parts.absorbed + 1;
    if n < required {
        return Err(PanelError::InsufficientObservations {
            context: spec.label.clone(),
            available: n,
            required,
        });
    }

    let sol = solve_least_squares(&parts.design, &parts.response, &parts.names)?;
    let df_residual = n - k - parts.absorbed;
    let sigma2 = sol.ssr / df_residual as f64;
    let vcov = &sol.xtx_inv * sigma2;
    let r2 = r_squared(&parts.response, sol.ssr, parts.centered_r2);
    let fitted_levels = match parts.levels {
        LevelScale::Residual(y) => y - &sol.residuals,
        LevelScale::Design(x) => {
            if x.shape() != parts.design.shape() {
                return Err(PanelError::numerical("level-scale design does not match the fitted design"));
            }
            x * &sol.beta
        }
    };

    Ok(FittedModel {
        spec: spec.clone(),
        names: parts.names,
        coefficients: sol.beta,
        vcov,
        xtx_inv: sol.xtx_inv,
        design: parts.design,
        fitted_levels,
        residuals: sol.residuals,
        index: parts.index,
        entity_names: parts.entity_names,
        df_residual,
        r_squared: r2,
        audit: parts.audit,
        components: parts.components,
    })
}

/// `[1, X]` with the intercept named first.
pub(crate) fn with_intercept(x: &DMatrix<f64>, names: &[String]) -> (DMatrix<f64>, Vec<String>) {
    let design = x.clone().insert_column(0, 1.0);
    let mut out = Vec::with_capacity(names.len() + 1);
    out.push(INTERCEPT.to_string());
    out.extend(names.iter().cloned());
    (design, out)
}

fn sample_index(sample: &EstimationSample) -> Vec<ObsIndex> {
    sample
        .entity_ids
        .iter()
        .zip(sample.times.iter())
        .map(|(&entity, &time)| ObsIndex { entity, time })
        .collect()
}

/// Pooled OLS on raw variables with an intercept.
pub fn fit_pooling(sample: EstimationSample, spec: &Specification) -> PanelResult<FittedModel> {
    let (design, names) = with_intercept(&sample.x, &sample.names);
    let index = sample_index(&sample);
    finish(
        spec,
        DesignParts {
            names,
            design,
            response: sample.y.clone(),
            levels: LevelScale::Residual(sample.y),
            index,
            entity_names: sample.entity_names,
            audit: sample.audit,
            absorbed: 0,
            centered_r2: true,
            components: None,
        },
    )
}

/// One-way fixed effects: entity demeaning, then OLS without an intercept.
pub fn fit_within(sample: EstimationSample, spec: &Specification) -> PanelResult<FittedModel> {
    let sample = sample.drop_singletons();
    let n_entities = sample.n_entities();
    if n_entities == 0 {
        return Err(PanelError::InsufficientObservations {
            context: spec.label.clone(),
            available: 0,
            required: 2,
        });
    }
    let (design, response) = within_transform(&sample.x, &sample.y, &sample.entity_ids, n_entities);
    let index = sample_index(&sample);
    finish(
        spec,
        DesignParts {
            names: sample.names,
            design,
            response,
            levels: LevelScale::Residual(sample.y),
            index,
            entity_names: sample.entity_names,
            audit: sample.audit,
            absorbed: n_entities,
            centered_r2: false,
            components: None,
        },
    )
}

/// First differences within entity over consecutive periods, with an intercept.
///
/// A row is differenced only against the same entity's previous period (`t - 1`);
/// the first row of each entity and rows after a gap are lost.
pub fn fit_first_difference(sample: EstimationSample, spec: &Specification) -> PanelResult<FittedModel> {
    let (dx, dy, index) = first_differences(&sample);
    let mut audit = sample.audit;
    audit.rows_lost_differencing = sample.rows.len() - dy.len();
    audit.rows_used = dy.len();

    let (design, names) = with_intercept(&dx, &sample.names);
    finish(
        spec,
        DesignParts {
            names,
            design,
            response: dy.clone(),
            levels: LevelScale::Residual(dy),
            index,
            entity_names: sample.entity_names,
            audit,
            absorbed: 0,
            centered_r2: true,
            components: None,
        },
    )
}

/// Differenced regressors, differenced response and the index of each later row.
pub(crate) fn first_differences(sample: &EstimationSample) -> (DMatrix<f64>, DVector<f64>, Vec<ObsIndex>) {
    let k = sample.x.ncols();
    let mut dx = Vec::new();
    let mut dy = Vec::new();
    let mut index = Vec::new();
    for i in 1..sample.rows.len() {
        let same_entity = sample.entity_ids[i] == sample.entity_ids[i - 1];
        if !same_entity || sample.times[i] - sample.times[i - 1] != 1 {
            continue;
        }
        for j in 0..k {
            dx.push(sample.x[(i, j)] - sample.x[(i - 1, j)]);
        }
        dy.push(sample.y[i] - sample.y[i - 1]);
        index.push(ObsIndex {
            entity: sample.entity_ids[i],
            time: sample.times[i],
        });
    }
    let n = dy.len();
    (DMatrix::from_row_slice(n, k, &dx), DVector::from_vec(dy), index)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{ModelType, Regressor, Variable};
    use crate::estimate::sample::complete_cases;
    use crate::panel::PanelTable;

    /// debt = 2·growth − spend + α_e, exactly.
    fn exact_panel() -> PanelTable {
        let entities = ["A", "B", "C"];
        let alpha = [10.0, -5.0, 30.0];
        let growth = [[1.0, 2.5, 0.3, 4.0], [2.0, -1.0, 0.5, 1.5], [3.0, 3.5, -2.0, 0.0]];
        let spend = [[20.0, 22.0, 19.0, 25.0], [30.0, 28.5, 31.0, 27.0], [15.0, 18.0, 16.5, 14.0]];

        let mut names = Vec::new();
        let mut years = Vec::new();
        let mut debt = Vec::new();
        let mut g = Vec::new();
        let mut s = Vec::new();
        for e in 0..3 {
            for t in 0..4 {
                names.push(entities[e].to_string());
                years.push(2000 + t as i32);
                g.push(Some(growth[e][t]));
                s.push(Some(spend[e][t]));
                debt.push(Some(2.0 * growth[e][t] - spend[e][t] + alpha[e]));
            }
        }
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), debt);
        columns.insert("gdp_growth".to_string(), g);
        columns.insert("gov_spending".to_string(), s);
        PanelTable::new("country", "year", names, years, columns).unwrap()
    }

    fn spec(model: ModelType) -> Specification {
        Specification::new(
            "exact",
            Variable::Debt,
            vec![Regressor::Raw(Variable::GdpGrowth), Regressor::Raw(Variable::GovSpending)],
            model,
        )
    }

    #[test]
    fn within_recovers_exact_coefficients() {
        let table = exact_panel();
        let spec = spec(ModelType::Within);
        let fit = fit_within(complete_cases(&table, &spec).unwrap(), &spec).unwrap();
        assert!((fit.coefficient("gdp_growth").unwrap() - 2.0).abs() < 1e-6);
        assert!((fit.coefficient("gov_spending").unwrap() + 1.0).abs() < 1e-6);
        assert!(fit.residuals().iter().all(|r| r.abs() < 1e-9));
        assert_eq!(fit.df_residual(), 12 - 3 - 2);

        // Entity effects are part of the fitted levels.
        let debt = table.column("debt").unwrap();
        for (fitted, row) in fit.fitted_levels().iter().zip(complete_cases(&table, &spec).unwrap().rows) {
            assert!((fitted - debt[row].unwrap()).abs() < 1e-8);
        }
    }

    #[test]
    fn first_difference_recovers_slopes() {
        let table = exact_panel();
        let spec = spec(ModelType::FirstDifference);
        let fit = fit_first_difference(complete_cases(&table, &spec).unwrap(), &spec).unwrap();
        assert_eq!(fit.n_obs(), 9);
        assert_eq!(fit.audit().rows_lost_differencing, 3);
        assert!((fit.coefficient("gdp_growth").unwrap() - 2.0).abs() < 1e-8);
        assert!(fit.coefficient(INTERCEPT).unwrap().abs() < 1e-8);
    }

    #[test]
    fn pooling_has_intercept_first() {
        let table = exact_panel();
        let spec = spec(ModelType::Pooling);
        let fit = fit_pooling(complete_cases(&table, &spec).unwrap(), &spec).unwrap();
        assert_eq!(fit.names()[0], INTERCEPT);
        assert_eq!(fit.df_residual(), 12 - 3);
    }
}
