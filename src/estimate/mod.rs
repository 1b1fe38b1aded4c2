//! Estimator engine.
//!
//! Responsibilities:
//!
//! - build the complete-case sample for a specification (with a drop audit)
//! - dispatch to pooled OLS, random effects, within, or first difference
//! - return an immutable `FittedModel`

pub mod engine;
pub mod random_effects;
pub mod sample;

pub use engine::{fit_first_difference, fit_pooling, fit_within};
pub use random_effects::{fit_random_effects, variance_components};
pub use sample::{EstimationSample, complete_cases};

use tracing::{info, warn};

use crate::domain::{FittedModel, ModelType, Specification};
use crate::error::PanelResult;
use crate::panel::PanelTable;

/// Fit `spec` on `table` with the estimator named in the specification.
pub fn fit(table: &PanelTable, spec: &Specification) -> PanelResult<FittedModel> {
    let sample = complete_cases(table, spec)?;
    let fitted = match spec.model {
        ModelType::Pooling => fit_pooling(sample, spec)?,
        ModelType::RandomEffects => fit_random_effects(sample, spec)?,
        ModelType::Within => fit_within(sample, spec)?,
        ModelType::FirstDifference => fit_first_difference(sample, spec)?,
    };

    let audit = fitted.audit();
    info!(
        spec = %spec.label,
        model = spec.model.display_name(),
        rows_used = audit.rows_used,
        rows_dropped_missing = audit.rows_dropped_missing(),
        entities = fitted.n_entities(),
        "fitted specification"
    );
    for (column, count) in &audit.missing_by_column {
        info!(spec = %spec.label, column = %column, rows = count, "rows dropped for missing values");
    }
    if !audit.singleton_entities.is_empty() {
        warn!(
            spec = %spec.label,
            entities = ?audit.singleton_entities,
            "entities observed once dropped from within estimation"
        );
    }
    Ok(fitted)
}
