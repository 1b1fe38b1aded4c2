//! Mean-centering.
//!
//! Interaction terms are built from centered components so that the main effects
//! read as conditional effects at the sample mean of the other variable. Centering
//! adds a `c_<column>` column; the source column is left untouched.

use tracing::debug;

use crate::domain::Variable;
use crate::error::{PanelError, PanelResult};
use crate::panel::PanelTable;

/// Mean over non-missing values, `None` if every value is missing.
pub fn nan_mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Subtract `mean` from every present value.
pub fn center(values: &[Option<f64>], mean: f64) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(|x| x - mean)).collect()
}

/// Add `mean` back to centered values.
pub fn uncenter(values: &[Option<f64>], mean: f64) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(|x| x + mean)).collect()
}

impl PanelTable {
    /// New table with a centered column for each variable.
    pub fn with_centered(&self, variables: &[Variable]) -> PanelResult<PanelTable> {
        let mut out = self.clone();
        for &variable in variables {
            let name = variable.centered_column();
            if out.has_column(&name) {
                continue;
            }
            let values = out.variable(variable)?;
            let mean = nan_mean(values).ok_or_else(|| {
                PanelError::InsufficientObservations {
                    context: format!("mean of {}", variable.column()),
                    available: 0,
                    required: 1,
                }
            })?;
            let centered = center(values, mean);
            debug!(column = variable.column(), mean, "centered column");
            out = out.with_derived_column(name, centered, variable.column(), mean)?;
        }
        Ok(out)
    }
}
