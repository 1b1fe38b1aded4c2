//! Wooldridge test for serial correlation in panel errors.
//!
//! The specification is refit in first differences (with an intercept). If the
//! level errors are serially uncorrelated, the differenced errors have a
//! first-order autocorrelation of exactly `−0.5`. The differenced residuals are
//! regressed on their own lag within entity and `ρ = −0.5` is tested with an
//! entity-clustered variance: `F = ((ρ̂ + 0.5) / se(ρ̂))² ~ F(1, n_aux − 2)`.

use nalgebra::{DMatrix, DVector};

use crate::domain::{FittedModel, ModelType, NullDistribution, TestKind, TestResult};
use crate::error::{PanelError, PanelResult};
use crate::estimate::engine::{first_differences, with_intercept};
use crate::estimate::complete_cases;
use crate::inference::cluster_covariance;
use crate::math::{p_value, solve_least_squares};
use crate::panel::PanelTable;

/// Autocorrelation of first-differenced errors implied by no serial correlation.
pub const NULL_RHO: f64 = -0.5;

/// Test the specification of `model` for serial correlation on `table`.
pub fn wooldridge_serial(table: &PanelTable, model: &FittedModel) -> PanelResult<TestResult> {
    let spec = model.spec().with_model(ModelType::FirstDifference);
    let sample = complete_cases(table, &spec)?;
    let (dx, dy, index) = first_differences(&sample);
    let (design, names) = with_intercept(&dx, &sample.names);
    if design.nrows() <= design.ncols() {
        return Err(PanelError::InsufficientObservations {
            context: "Wooldridge serial correlation (first differences)".to_string(),
            available: design.nrows(),
            required: design.ncols() + 1,
        });
    }
    let fd = solve_least_squares(&design, &dy, &names)?;

    let mut current = Vec::new();
    let mut lagged = Vec::new();
    let mut clusters = Vec::new();
    for i in 1..index.len() {
        if index[i].entity == index[i - 1].entity && index[i].time - index[i - 1].time == 1 {
            current.push(fd.residuals[i]);
            lagged.push(fd.residuals[i - 1]);
            clusters.push(index[i].entity);
        }
    }
    let n_aux = current.len();
    if n_aux < 3 {
        return Err(PanelError::InsufficientObservations {
            context: "Wooldridge serial correlation (lagged residual pairs)".to_string(),
            available: n_aux,
            required: 3,
        });
    }

    let aux_design = DMatrix::from_fn(n_aux, 2, |i, j| if j == 0 { 1.0 } else { lagged[i] });
    let aux_names = vec!["(intercept)".to_string(), "lag_residual".to_string()];
    let aux = solve_least_squares(&aux_design, &DVector::from_vec(current), &aux_names)?;
    let cov = cluster_covariance(&aux_design, &aux.residuals, &aux.xtx_inv, &clusters, false)?;

    let se = cov[(1, 1)].max(0.0).sqrt();
    if se <= 0.0 {
        return Err(PanelError::numerical("Wooldridge serial correlation: zero variance of the lag coefficient"));
    }
    let rho = aux.beta[1];
    let statistic = ((rho - NULL_RHO) / se).powi(2);
    let distribution = NullDistribution::F {
        df1: 1.0,
        df2: (n_aux - 2) as f64,
    };

    Ok(TestResult {
        test: TestKind::WooldridgeSerial,
        statistic,
        distribution,
        p_value: p_value(statistic, distribution)?,
        note: Some(format!("rho = {rho:.4} (null {NULL_RHO})")),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{Regressor, Specification, Variable};
    use crate::estimate::fit;

    /// AR(1) errors with coefficient `phi` (deterministic pseudo-noise).
    fn ar_panel(phi: f64) -> PanelTable {
        let mut names = Vec::new();
        let mut years = Vec::new();
        let mut debt = Vec::new();
        let mut growth = Vec::new();
        let mut state: u64 = 7;
        let mut draw = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        };
        for e in 0..12 {
            let mut u = 0.0;
            for t in 0..10 {
                u = phi * u + draw();
                let g = draw() * 4.0;
                names.push(format!("E{e}"));
                years.push(1990 + t);
                growth.push(Some(g));
                debt.push(Some(e as f64 * 3.0 + 1.5 * g + u));
            }
        }
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), debt);
        columns.insert("gdp_growth".to_string(), growth);
        PanelTable::new("country", "year", names, years, columns).unwrap()
    }

    fn within(table: &PanelTable) -> FittedModel {
        let spec = Specification::new(
            "serial",
            Variable::Debt,
            vec![Regressor::Raw(Variable::GdpGrowth)],
            ModelType::Within,
        );
        fit(table, &spec).unwrap()
    }

    #[test]
    fn random_walk_errors_are_detected() {
        // phi = 1: differenced errors are white noise, rho near 0, far from −0.5.
        let table = ar_panel(1.0);
        let result = wooldridge_serial(&table, &within(&table)).unwrap();
        assert!(result.rejects(0.05), "F {} p {}", result.statistic, result.p_value);
        assert_eq!(
            result.distribution,
            NullDistribution::F {
                df1: 1.0,
                df2: (12 * 8 - 2) as f64
            }
        );
    }

    #[test]
    fn too_short_panel_is_an_error() {
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)]);
        columns.insert("gdp_growth".to_string(), vec![Some(0.1), Some(0.4), Some(0.2), Some(0.9)]);
        let table = PanelTable::new(
            "country",
            "year",
            vec!["A".into(), "A".into(), "B".into(), "B".into()],
            vec![2000, 2001, 2000, 2001],
            columns,
        )
        .unwrap();
        let spec = Specification::new(
            "short",
            Variable::Debt,
            vec![Regressor::Raw(Variable::GdpGrowth)],
            ModelType::Pooling,
        );
        let model = fit(&table, &spec).unwrap();
        assert!(matches!(
            wooldridge_serial(&table, &model),
            Err(PanelError::InsufficientObservations { .. })
        ));
    }
}
