//! Wald tests of coefficients under a chosen covariance matrix.

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    CoefficientTable, CoefficientTest, CovarianceMatrix, FittedModel, INTERCEPT, NullDistribution, TestKind,
    TestResult,
};
use crate::error::{PanelError, PanelResult};
use crate::math::{p_value, t_two_sided};

fn check_names(model: &FittedModel, cov: &CovarianceMatrix) -> PanelResult<()> {
    if cov.names != model.names() || cov.matrix.shape() != (cov.names.len(), cov.names.len()) {
        return Err(PanelError::numerical(format!(
            "covariance for '{}' does not match its coefficients",
            model.spec().label
        )));
    }
    Ok(())
}

/// Per-regressor `t = b / se` with two-sided p-values on the residual degrees of freedom.
pub fn coefficient_tests(model: &FittedModel, cov: &CovarianceMatrix) -> PanelResult<CoefficientTable> {
    check_names(model, cov)?;
    let df = model.df_residual();

    let mut rows = Vec::with_capacity(cov.names.len());
    for ((j, name), std_error) in cov.names.iter().enumerate().zip(cov.std_errors()) {
        let estimate = model.coefficients()[j];
        let statistic = if std_error > 0.0 {
            estimate / std_error
        } else if estimate == 0.0 {
            0.0
        } else {
            estimate.signum() * f64::INFINITY
        };
        let p = if statistic.is_finite() {
            t_two_sided(statistic, df as f64)?
        } else {
            0.0
        };
        rows.push(CoefficientTest {
            regressor: name.clone(),
            estimate,
            std_error,
            statistic,
            p_value: p,
        });
    }

    Ok(CoefficientTable {
        spec_label: model.spec().label.clone(),
        model: model.model_type(),
        covariance: cov.kind,
        df,
        rows,
    })
}

/// Joint test that every slope (all coefficients but the intercept) is zero.
///
/// `W = b' V⁻¹ b ~ χ²(k)`.
pub fn joint_wald(model: &FittedModel, cov: &CovarianceMatrix) -> PanelResult<TestResult> {
    check_names(model, cov)?;
    let slopes: Vec<usize> = (0..cov.names.len()).filter(|&j| cov.names[j] != INTERCEPT).collect();
    let k = slopes.len();
    if k == 0 {
        return Err(PanelError::numerical("joint Wald: model has no slopes"));
    }

    let b = DVector::from_fn(k, |r, _| model.coefficients()[slopes[r]]);
    let v = DMatrix::from_fn(k, k, |r, c| cov.matrix[(slopes[r], slopes[c])]);
    let inv = v
        .cholesky()
        .map(|ch| ch.inverse())
        .ok_or_else(|| PanelError::numerical("joint Wald: covariance of slopes is not positive definite"))?;
    let statistic = (b.transpose() * inv * &b)[(0, 0)];

    let distribution = NullDistribution::ChiSquared { df: k as f64 };
    Ok(TestResult {
        test: TestKind::JointWald,
        statistic,
        distribution,
        p_value: p_value(statistic, distribution)?,
        note: Some(format!("covariance: {}", cov.kind.label())),
    })
}
