//! Estimator choice from the Breusch-Pagan and Hausman tests.
//!
//! - Breusch-Pagan does not reject: pooled OLS.
//! - Breusch-Pagan rejects, Hausman rejects: fixed effects (within).
//! - Breusch-Pagan rejects, Hausman does not: random effects.
//!
//! A diagnostic that could not be computed blocks the decision; the run then falls
//! back to fixed effects and records why.

use serde::Serialize;
use tracing::{info, warn};

use crate::diagnostics::{breusch_pagan_lm, hausman};
use crate::domain::{ModelType, Specification, TestResult};
use crate::error::PanelResult;
use crate::estimate::fit;
use crate::panel::PanelTable;

/// Looser threshold quoted alongside the conventional one; decisions that flip at
/// this level are flagged.
pub const LOOSE_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatorDecision {
    pub chosen: ModelType,
    pub alpha: f64,
    pub reason: String,
    /// A diagnostic failed and the fixed-effects fallback was used.
    pub fallback: bool,
    /// The choice would differ at `LOOSE_ALPHA`.
    pub sensitive_at_loose_threshold: bool,
}

/// Diagnostic stage outcome: both tests (or why they failed) and the decision.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub breusch_pagan: PanelResult<TestResult>,
    pub hausman: PanelResult<TestResult>,
    pub decision: EstimatorDecision,
}

fn choose(bp: &TestResult, hausman: &TestResult, alpha: f64) -> ModelType {
    if !bp.rejects(alpha) {
        ModelType::Pooling
    } else if hausman.rejects(alpha) {
        ModelType::Within
    } else {
        ModelType::RandomEffects
    }
}

pub fn select_estimator(
    bp: &PanelResult<TestResult>,
    hausman: &PanelResult<TestResult>,
    alpha: f64,
) -> EstimatorDecision {
    let (bp, hausman) = match (bp, hausman) {
        (Ok(bp), Ok(h)) => (bp, h),
        (Err(e), _) => {
            return EstimatorDecision {
                chosen: ModelType::Within,
                alpha,
                reason: format!("Breusch-Pagan test failed ({e}); falling back to fixed effects"),
                fallback: true,
                sensitive_at_loose_threshold: false,
            };
        }
        (_, Err(e)) => {
            return EstimatorDecision {
                chosen: ModelType::Within,
                alpha,
                reason: format!("Hausman test failed ({e}); falling back to fixed effects"),
                fallback: true,
                sensitive_at_loose_threshold: false,
            };
        }
    };

    let chosen = choose(bp, hausman, alpha);
    let reason = match chosen {
        ModelType::Pooling => format!(
            "Breusch-Pagan p = {:.4} >= {alpha}: no entity variance component, pooled OLS",
            bp.p_value
        ),
        ModelType::Within => format!(
            "Breusch-Pagan p = {:.4} < {alpha} and Hausman p = {:.4} < {alpha}: fixed effects",
            bp.p_value, hausman.p_value
        ),
        _ => format!(
            "Breusch-Pagan p = {:.4} < {alpha} and Hausman p = {:.4} >= {alpha}: random effects",
            bp.p_value, hausman.p_value
        ),
    };

    EstimatorDecision {
        chosen,
        alpha,
        reason,
        fallback: false,
        sensitive_at_loose_threshold: choose(bp, hausman, LOOSE_ALPHA) != chosen,
    }
}

/// Fit pooled, random effects and within models of `formula` and pick one.
///
/// The model type on `formula` is ignored.
pub fn run_diagnostics(table: &PanelTable, formula: &Specification, alpha: f64) -> DiagnosticReport {
    let pooled = fit(table, &formula.with_model(ModelType::Pooling));
    let breusch_pagan = pooled.and_then(|m| breusch_pagan_lm(&m));

    let within = fit(table, &formula.with_model(ModelType::Within));
    let random = fit(table, &formula.with_model(ModelType::RandomEffects));
    let hausman = match (within, random) {
        (Ok(fe), Ok(re)) => hausman(&fe, &re),
        (Err(e), _) | (_, Err(e)) => Err(e),
    };

    let decision = select_estimator(&breusch_pagan, &hausman, alpha);
    if decision.fallback {
        warn!(reason = %decision.reason, "estimator decision fell back to fixed effects");
    } else {
        info!(chosen = decision.chosen.display_name(), reason = %decision.reason, "estimator selected");
    }
    if decision.sensitive_at_loose_threshold {
        warn!(alpha, loose = LOOSE_ALPHA, "estimator choice differs at the looser threshold");
    }

    DiagnosticReport {
        breusch_pagan,
        hausman,
        decision,
    }
}
