//! White test for heteroskedasticity.
//!
//! Squared residuals are regressed on an intercept, the fitted design columns and
//! their squares (no cross products). `n · R² ~ χ²(q)` with `q` the number of
//! auxiliary slopes. Constant design columns are skipped, and auxiliary columns
//! that turn out collinear are dropped one at a time.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{FittedModel, NullDistribution, TestKind, TestResult};
use crate::error::{PanelError, PanelResult};
use crate::math::{p_value, r_squared, solve_least_squares};

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| (w[0] - w[1]).abs() <= 1e-12 * w[0].abs().max(1.0))
}

pub fn white_test(model: &FittedModel) -> PanelResult<TestResult> {
    let design = model.design();
    let n = design.nrows();

    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
    for (j, name) in model.names().iter().enumerate() {
        let level: Vec<f64> = design.column(j).iter().copied().collect();
        if is_constant(&level) {
            continue;
        }
        let square = level.iter().map(|v| v * v).collect();
        columns.push((name.clone(), level));
        columns.push((format!("{name}^2"), square));
    }

    let e2 = DVector::from_iterator(n, model.residuals().iter().map(|e| e * e));
    if e2.iter().all(|&v| v == 0.0) {
        return Err(PanelError::numerical("White test: residuals are identically zero"));
    }

    loop {
        let q = columns.len();
        if q == 0 {
            return Err(PanelError::numerical("White test: no usable auxiliary regressors"));
        }
        if n <= q + 1 {
            return Err(PanelError::InsufficientObservations {
                context: "White test auxiliary regression".to_string(),
                available: n,
                required: q + 2,
            });
        }
        let aux = DMatrix::from_fn(n, q + 1, |i, j| if j == 0 { 1.0 } else { columns[j - 1].1[i] });
        let mut names = vec!["(intercept)".to_string()];
        names.extend(columns.iter().map(|(name, _)| name.clone()));

        match solve_least_squares(&aux, &e2, &names) {
            Ok(sol) => {
                let statistic = n as f64 * r_squared(&e2, sol.ssr, true);
                let distribution = NullDistribution::ChiSquared { df: q as f64 };
                return Ok(TestResult {
                    test: TestKind::WhiteHeteroskedasticity,
                    statistic,
                    distribution,
                    p_value: p_value(statistic, distribution)?,
                    note: None,
                });
            }
            Err(PanelError::RankDeficiency { column }) => {
                debug!(column = %column, "dropping collinear White auxiliary column");
                columns.retain(|(name, _)| *name != column);
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{ModelType, Regressor, Specification, Variable};
    use crate::estimate::fit;
    use crate::panel::PanelTable;

    fn model(scale_with_x: bool) -> FittedModel {
        let signs = [1.0, -1.0, -1.0, 1.0, 1.0, -1.0, 1.0, -1.0];
        let mut names = Vec::new();
        let mut years = Vec::new();
        let mut debt = Vec::new();
        let mut growth = Vec::new();
        for i in 0..40 {
            let g = 0.25 * i as f64;
            let sd = if scale_with_x { 0.05 + g * g } else { 1.0 };
            names.push(format!("E{}", i % 4));
            years.push(2000 + (i / 4) as i32);
            growth.push(Some(g));
            debt.push(Some(1.0 + 0.5 * g + sd * signs[(i * 3) % 8]));
        }
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), debt);
        columns.insert("gdp_growth".to_string(), growth);
        let table = PanelTable::new("country", "year", names, years, columns).unwrap();
        let spec = Specification::new(
            "white",
            Variable::Debt,
            vec![Regressor::Raw(Variable::GdpGrowth)],
            ModelType::Pooling,
        );
        fit(&table, &spec).unwrap()
    }

    #[test]
    fn variance_growing_with_regressor_is_flagged() {
        let result = white_test(&model(true)).unwrap();
        assert_eq!(result.distribution, NullDistribution::ChiSquared { df: 2.0 });
        assert!(result.rejects(0.05), "stat {} p {}", result.statistic, result.p_value);
    }

    #[test]
    fn intercept_column_is_skipped() {
        let result = white_test(&model(false)).unwrap();
        // levels + squares of one slope only
        assert_eq!(result.distribution, NullDistribution::ChiSquared { df: 2.0 });
        assert!(result.statistic >= 0.0);
    }
}
