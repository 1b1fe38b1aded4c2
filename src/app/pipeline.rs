//! The analysis pipeline shared by the `run` and `diagnose` commands.
//!
//! panel -> collinearity screen -> BP / Hausman decision -> final model
//! -> HC3 + clustered inference -> centering -> six interaction models
//!
//! Each stage returns new values; nothing computed earlier is mutated.

use tracing::{info, warn};

use crate::diagnostics::{DiagnosticReport, run_diagnostics, white_test};
use crate::domain::{AnalysisConfig, CoefficientTable, FittedModel, HcType, ModelType, Study, TestResult};
use crate::error::{AppError, PanelResult};
use crate::estimate::fit;
use crate::inference::{cluster_vcov, coefficient_tests, hc_vcov, joint_wald};
use crate::interaction::{InteractionOutcome, run_all};
use crate::io::{IngestedPanel, load_panel};
use crate::report::{CollinearPair, CorrelationMatrix, screen_collinearity};

/// All computed outputs of a single `debtpanel run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedPanel,
    pub correlation: CorrelationMatrix,
    pub collinear: Vec<CollinearPair>,
    pub diagnostics: DiagnosticReport,
    pub final_model: FittedModel,
    pub final_hc3: CoefficientTable,
    pub final_cluster: PanelResult<CoefficientTable>,
    pub joint_wald: PanelResult<TestResult>,
    pub white: PanelResult<TestResult>,
    pub interactions: Vec<(String, PanelResult<InteractionOutcome>)>,
}

fn warn_on_threshold(config: &AnalysisConfig) {
    if (config.alpha - AnalysisConfig::DEFAULT_ALPHA).abs() > f64::EPSILON {
        warn!(
            alpha = config.alpha,
            conventional = AnalysisConfig::DEFAULT_ALPHA,
            "decision threshold differs from the conventional 0.05"
        );
    }
}

/// Load the panel and run the estimator decision only.
pub fn run_diagnose(config: &AnalysisConfig, study: &Study) -> Result<(IngestedPanel, DiagnosticReport), AppError> {
    warn_on_threshold(config);
    let ingest = load_panel(&config.data_path, &config.complete_entities)?;
    let report = run_diagnostics(&ingest.table, &study.base_specification(ModelType::Within), config.alpha);
    Ok((ingest, report))
}

/// Load the panel at `config.data_path` and run the full analysis.
pub fn run_analysis(config: &AnalysisConfig, study: &Study) -> Result<RunOutput, AppError> {
    let ingest = load_panel(&config.data_path, &config.complete_entities)?;
    run_analysis_on(ingest, config, study)
}

/// Full analysis on an already ingested panel.
pub fn run_analysis_on(ingest: IngestedPanel, config: &AnalysisConfig, study: &Study) -> Result<RunOutput, AppError> {
    warn_on_threshold(config);

    // 1) Collinearity screen over the response and base regressors.
    let mut screened = vec![study.response];
    screened.extend(study.base.iter().copied());
    let (correlation, collinear) = screen_collinearity(&ingest.table, &screened, config.collinearity_threshold)?;

    // 2) Estimator decision.
    let formula = study.base_specification(ModelType::Within);
    let diagnostics = run_diagnostics(&ingest.table, &formula, config.alpha);

    // 3) Final model with robust inference.
    let final_model = fit(&ingest.table, &formula.with_model(diagnostics.decision.chosen))?;
    let hc3 = hc_vcov(&final_model, HcType::HC3)?;
    let final_hc3 = coefficient_tests(&final_model, &hc3)?;
    let cluster = cluster_vcov(&final_model);
    let final_cluster = match &cluster {
        Ok(cov) => coefficient_tests(&final_model, cov),
        Err(e) => Err(e.clone()),
    };
    // Joint test under the clustered covariance when it exists.
    let wald = match &cluster {
        Ok(cov) => joint_wald(&final_model, cov),
        Err(_) => joint_wald(&final_model, &hc3),
    };
    let white = white_test(&final_model);
    if let Ok(w) = &white {
        info!(statistic = w.statistic, p = w.p_value, "White heteroskedasticity test");
    }

    // 4) Interaction models on the centered table.
    let centered = ingest.table.with_centered(&study.interaction_variables())?;
    let interactions = run_all(&centered, study, config.mixed_forms, config.parallel);
    let failed = interactions.iter().filter(|(_, r)| r.is_err()).count();
    info!(
        total = interactions.len(),
        failed,
        "interaction specifications finished"
    );

    Ok(RunOutput {
        ingest,
        correlation,
        collinear,
        diagnostics,
        final_model,
        final_hc3,
        final_cluster,
        joint_wald: wald,
        white,
        interactions,
    })
}
