//! Breusch-Pagan Lagrange multiplier test for entity variance components.
//!
//! On pooled OLS residuals `e_it`:
//!
//! `LM = n² / (2 Σ_i T_i(T_i − 1)) · (Σ_i (Σ_t e_it)² / Σ e_it² − 1)²`
//!
//! with `n` the number of observations; for a balanced panel of `N` entities this
//! is `NT / (2(T − 1)) · (...)²`. Under the null of
//! no entity effect, `LM ~ χ²(1)`.

use crate::domain::{FittedModel, NullDistribution, TestKind, TestResult};
use crate::error::{PanelError, PanelResult};
use crate::math::p_value;
use crate::panel::entity_counts;

pub fn breusch_pagan_lm(pooled: &FittedModel) -> PanelResult<TestResult> {
    let ids = pooled.entity_ids();
    let n_entities = pooled.n_entities();
    let residuals = pooled.residuals();
    let n = residuals.len() as f64;

    let counts = entity_counts(&ids, n_entities);
    let pairs: f64 = counts.iter().map(|&t| (t * t.saturating_sub(1)) as f64).sum();
    if pairs <= 0.0 {
        return Err(PanelError::InsufficientObservations {
            context: "Breusch-Pagan LM (entities with repeated periods)".to_string(),
            available: 0,
            required: 1,
        });
    }

    let ssr = pooled.ssr();
    if ssr <= 0.0 {
        return Err(PanelError::numerical("Breusch-Pagan LM: pooled residuals are identically zero"));
    }

    let mut entity_sums = vec![0.0; n_entities];
    for (&e, r) in ids.iter().zip(residuals.iter()) {
        entity_sums[e] += r;
    }
    let between: f64 = entity_sums.iter().map(|s| s * s).sum();
    let statistic = n * n / (2.0 * pairs) * (between / ssr - 1.0).powi(2);

    let distribution = NullDistribution::ChiSquared { df: 1.0 };
    Ok(TestResult {
        test: TestKind::BreuschPaganLm,
        statistic,
        distribution,
        p_value: p_value(statistic, distribution)?,
        note: None,
    })
}
