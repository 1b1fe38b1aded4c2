//! Tail probabilities of the reference distributions used by the tests.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::domain::NullDistribution;
use crate::error::{PanelError, PanelResult};

/// Upper-tail probability of `stat` under `dist`.
///
/// For the standard normal the p-value is two-sided.
pub fn p_value(stat: f64, dist: NullDistribution) -> PanelResult<f64> {
    if stat.is_nan() {
        return Err(PanelError::numerical("test statistic is NaN"));
    }
    let p = match dist {
        NullDistribution::ChiSquared { df } => {
            if stat <= 0.0 {
                1.0
            } else {
                ChiSquared::new(df)
                    .map_err(|e| PanelError::numerical(format!("chi-squared({df}): {e}")))?
                    .sf(stat)
            }
        }
        NullDistribution::F { df1, df2 } => {
            if stat <= 0.0 {
                1.0
            } else {
                FisherSnedecor::new(df1, df2)
                    .map_err(|e| PanelError::numerical(format!("F({df1}, {df2}): {e}")))?
                    .sf(stat)
            }
        }
        NullDistribution::StandardNormal => {
            let normal = Normal::new(0.0, 1.0)
                .map_err(|e| PanelError::numerical(format!("normal: {e}")))?;
            2.0 * normal.sf(stat.abs())
        }
    };
    Ok(p.clamp(0.0, 1.0))
}

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
pub fn t_two_sided(stat: f64, df: f64) -> PanelResult<f64> {
    if stat.is_nan() {
        return Err(PanelError::numerical("t statistic is NaN"));
    }
    let t = StudentsT::new(0.0, 1.0, df).map_err(|e| PanelError::numerical(format!("t({df}): {e}")))?;
    Ok((2.0 * t.sf(stat.abs())).clamp(0.0, 1.0))
}
