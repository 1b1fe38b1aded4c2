//! Interaction model runner.
//!
//! Each moderated regression uses the centered components `c_a`, `c_b`, their
//! product `c_a:c_b`, and every other base variable in raw form, fitted with the
//! within estimator. The fit is followed by the serial correlation and
//! cross-sectional dependence tests and by HC3 and entity-clustered inference.
//!
//! Specifications are independent of each other and only read the shared panel
//! table, so they can run in parallel; a failing specification never affects the
//! others.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::diagnostics::{pesaran_cd, wooldridge_serial};
use crate::domain::{
    CoefficientTable, FittedModel, HcType, InteractionSpec, MixedFormPolicy, ModelType, Regressor, Specification,
    Study, TestResult,
};
use crate::error::{PanelError, PanelResult};
use crate::estimate::fit;
use crate::inference::{cluster_vcov, coefficient_tests, hc_vcov};
use crate::panel::PanelTable;

/// Everything computed for one interaction specification.
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    pub label: String,
    pub model: FittedModel,
    pub hc3: CoefficientTable,
    pub cluster: CoefficientTable,
    pub serial: PanelResult<TestResult>,
    pub cross_section: PanelResult<TestResult>,
    pub warnings: Vec<String>,
}

impl InteractionOutcome {
    /// Name of the product term, e.g. `c_gdp_growth:c_gov_spending`.
    pub fn product_term(&self) -> Option<String> {
        self.model
            .spec()
            .interaction
            .map(|(a, b)| Regressor::Interaction(a, b).name())
    }
}

/// `{c_a, c_b, c_a:c_b} ∪ (base − {a, b}, raw) ∪ extra raw controls`, within estimator.
pub fn build_specification(study: &Study, interaction: &InteractionSpec) -> Specification {
    let (a, b) = (interaction.a, interaction.b);
    let mut regressors = vec![Regressor::Centered(a), Regressor::Centered(b), Regressor::Interaction(a, b)];
    regressors.extend(
        study
            .base
            .iter()
            .filter(|v| **v != a && **v != b)
            .map(|v| Regressor::Raw(*v)),
    );
    for extra in &interaction.extra_raw {
        let raw = Regressor::Raw(*extra);
        if !regressors.contains(&raw) {
            regressors.push(raw);
        }
    }

    let mut spec = Specification::new(interaction.label.clone(), study.response, regressors, ModelType::Within);
    spec.interaction = Some((a, b));
    spec
}

/// Enforce the mixed centered/raw policy.
///
/// Under `Warn` the raw form of each mixed variable is excluded from the design:
/// after within demeaning `c_x` and `x` are the same column, so keeping both can
/// only end in a rank deficiency. The returned warnings name what was excluded.
pub fn apply_mixed_form_policy(
    spec: &Specification,
    policy: MixedFormPolicy,
) -> PanelResult<(Specification, Vec<String>)> {
    let mixed = spec.mixed_forms();
    let Some(first) = mixed.first() else {
        return Ok((spec.clone(), Vec::new()));
    };
    match policy {
        MixedFormPolicy::Reject => Err(PanelError::UnconfirmedMixedForm {
            spec: spec.label.clone(),
            variable: first.column().to_string(),
        }),
        MixedFormPolicy::Warn => {
            let mut resolved = spec.clone();
            resolved
                .regressors
                .retain(|r| !matches!(r, Regressor::Raw(v) if mixed.contains(v)));
            let warnings = mixed
                .iter()
                .map(|v| {
                    warn!(
                        spec = %spec.label,
                        variable = v.column(),
                        kept = %v.centered_column(),
                        "mixed centered and raw forms; raw column excluded from the design"
                    );
                    format!(
                        "'{}' enters both centered ({}) and raw ({}); confirmed by configuration, \
                         raw '{}' excluded since it equals '{}' after within demeaning",
                        v.display_name(),
                        v.centered_column(),
                        v.column(),
                        v.column(),
                        v.centered_column()
                    )
                })
                .collect();
            Ok((resolved, warnings))
        }
    }
}

/// Fit and test one interaction specification.
///
/// `table` must already carry the centered columns of both components.
pub fn run_interaction(
    table: &PanelTable,
    study: &Study,
    interaction: &InteractionSpec,
    policy: MixedFormPolicy,
) -> PanelResult<InteractionOutcome> {
    let (spec, warnings) = apply_mixed_form_policy(&build_specification(study, interaction), policy)?;

    let model = fit(table, &spec)?;
    let hc3 = coefficient_tests(&model, &hc_vcov(&model, HcType::HC3)?)?;
    let cluster = coefficient_tests(&model, &cluster_vcov(&model)?)?;

    let serial = wooldridge_serial(table, &model);
    if let Err(e) = &serial {
        warn!(spec = %spec.label, error = %e, "serial correlation test failed");
    }
    let cross_section = pesaran_cd(&model);
    if let Err(e) = &cross_section {
        warn!(spec = %spec.label, error = %e, "cross-sectional dependence test failed");
    }

    let outcome = InteractionOutcome {
        label: spec.label.clone(),
        model,
        hc3,
        cluster,
        serial,
        cross_section,
        warnings,
    };
    if let Some(term) = outcome.product_term() {
        if let Some(row) = outcome.cluster.row(&term) {
            info!(
                spec = %outcome.label,
                term = %term,
                estimate = row.estimate,
                p_cluster = row.p_value,
                "interaction fitted"
            );
        }
    }
    Ok(outcome)
}

/// Run every interaction of the study; results keep the study's order.
pub fn run_all(
    table: &PanelTable,
    study: &Study,
    policy: MixedFormPolicy,
    parallel: bool,
) -> Vec<(String, PanelResult<InteractionOutcome>)> {
    let run = |interaction: &InteractionSpec| {
        let result = run_interaction(table, study, interaction, policy);
        if let Err(e) = &result {
            warn!(spec = %interaction.label, error = %e, "interaction specification failed");
        }
        (interaction.label.clone(), result)
    };

    if parallel {
        study.interactions.par_iter().map(run).collect()
    } else {
        study.interactions.iter().map(run).collect()
    }
}
