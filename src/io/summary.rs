//! JSON run summary.
//!
//! A machine-readable record of one run: the estimator decision, every test (or
//! why it failed), drop audits, coefficient tables and warnings.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::pipeline::RunOutput;
use crate::diagnostics::EstimatorDecision;
use crate::domain::{AnalysisConfig, CoefficientTable, DropAudit, FittedModel, ModelType, TestResult, VarianceComponents};
use crate::error::{AppError, PanelResult};
use crate::report::CollinearPair;

#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestSummary {
    fn new(name: &str, result: &PanelResult<TestResult>) -> Self {
        Self {
            name: name.to_string(),
            result: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub label: String,
    pub model: ModelType,
    pub n_obs: usize,
    pub n_entities: usize,
    pub df_residual: usize,
    pub r_squared: f64,
    pub audit: DropAudit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance_components: Option<VarianceComponents>,
    pub coefficients: Vec<CoefficientTable>,
}

impl ModelSummary {
    fn new(model: &FittedModel, tables: Vec<CoefficientTable>) -> Self {
        Self {
            label: model.spec().label.clone(),
            model: model.model_type(),
            n_obs: model.n_obs(),
            n_entities: model.n_entities(),
            df_residual: model.df_residual(),
            r_squared: model.r_squared(),
            audit: model.audit().clone(),
            variance_components: model.variance_components().copied(),
            coefficients: tables,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionSummary {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSummary>,
    pub tests: Vec<TestSummary>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub data_path: String,
    pub alpha: f64,
    pub rows_read: usize,
    pub rows_used: usize,
    pub entities: usize,
    pub skipped_rows: usize,
    pub collinear_pairs: Vec<(String, String, f64)>,
    pub decision: EstimatorDecision,
    pub tests: Vec<TestSummary>,
    pub final_model: ModelSummary,
    pub interactions: Vec<InteractionSummary>,
}

fn pairs(collinear: &[CollinearPair]) -> Vec<(String, String, f64)> {
    collinear
        .iter()
        .map(|p| (p.a.clone(), p.b.clone(), p.correlation))
        .collect()
}

pub fn build_summary(run: &RunOutput, config: &AnalysisConfig) -> RunSummary {
    let mut final_tables = vec![run.final_hc3.clone()];
    if let Ok(t) = &run.final_cluster {
        final_tables.push(t.clone());
    }

    let interactions = run
        .interactions
        .iter()
        .map(|(label, result)| match result {
            Ok(o) => InteractionSummary {
                label: label.clone(),
                error: None,
                model: Some(ModelSummary::new(&o.model, vec![o.hc3.clone(), o.cluster.clone()])),
                tests: vec![
                    TestSummary::new("wooldridge_serial", &o.serial),
                    TestSummary::new("pesaran_cd", &o.cross_section),
                ],
                warnings: o.warnings.clone(),
            },
            Err(e) => InteractionSummary {
                label: label.clone(),
                error: Some(e.to_string()),
                model: None,
                tests: Vec::new(),
                warnings: Vec::new(),
            },
        })
        .collect();

    RunSummary {
        generated_at: Utc::now(),
        data_path: config.data_path.display().to_string(),
        alpha: config.alpha,
        rows_read: run.ingest.rows_read,
        rows_used: run.ingest.rows_used,
        entities: run.ingest.table.n_entities(),
        skipped_rows: run.ingest.row_errors.len(),
        collinear_pairs: pairs(&run.collinear),
        decision: run.diagnostics.decision.clone(),
        tests: vec![
            TestSummary::new("breusch_pagan_lm", &run.diagnostics.breusch_pagan),
            TestSummary::new("hausman", &run.diagnostics.hausman),
            TestSummary::new("white", &run.white),
            TestSummary::new("joint_wald", &run.joint_wald),
        ],
        final_model: ModelSummary::new(&run.final_model, final_tables),
        interactions,
    }
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))
}
