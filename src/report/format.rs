//! Formatted terminal output.
//!
//! Formatting lives in one place so the estimation code stays free of
//! presentation concerns and output changes are localized.

use crate::diagnostics::{DiagnosticReport, LOOSE_ALPHA};
use crate::domain::{AnalysisConfig, CoefficientTable, DropAudit, FittedModel, NullDistribution, TestResult};
use crate::error::PanelResult;
use crate::interaction::InteractionOutcome;
use crate::io::IngestedPanel;
use crate::report::CollinearPair;

fn fmt_distribution(d: &NullDistribution) -> String {
    match d {
        NullDistribution::ChiSquared { df } => format!("chi2({df})"),
        NullDistribution::F { df1, df2 } => format!("F({df1}, {df2})"),
        NullDistribution::StandardNormal => "N(0,1)".to_string(),
    }
}

fn stars(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else if p < 0.1 {
        "."
    } else {
        ""
    }
}

/// Dataset header: rows, entities, skipped rows.
pub fn format_ingest_summary(ingest: &IngestedPanel, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    out.push_str("=== debtpanel - Government debt panel analysis ===\n");
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    let times = ingest.table.times();
    let (t_min, t_max) = (
        times.iter().min().copied().unwrap_or_default(),
        times.iter().max().copied().unwrap_or_default(),
    );
    out.push_str(&format!(
        "Panel: rows={} | entities={} | years=[{t_min}, {t_max}]\n",
        ingest.rows_used,
        ingest.table.n_entities(),
    ));
    if !ingest.row_errors.is_empty() {
        out.push_str(&format!(
            "Skipped rows: {} of {}\n",
            ingest.row_errors.len(),
            ingest.rows_read
        ));
    }
    if !ingest.ignored_columns.is_empty() {
        out.push_str(&format!("Ignored columns: {}\n", ingest.ignored_columns.join(", ")));
    }
    out
}

pub fn format_test(result: &TestResult) -> String {
    let mut line = format!(
        "{:<48} stat={:>10.4} {:<14} p={:.4e} {}",
        result.test.display_name(),
        result.statistic,
        fmt_distribution(&result.distribution),
        result.p_value,
        stars(result.p_value),
    );
    if let Some(note) = &result.note {
        line.push_str(&format!("\n{:<48} ({note})", ""));
    }
    line.trim_end().to_string()
}

fn format_test_result(name: &str, result: &PanelResult<TestResult>) -> String {
    match result {
        Ok(r) => format_test(r),
        Err(e) => format!("{name:<48} FAILED: {e}"),
    }
}

pub fn format_diagnostics(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    out.push_str("Specification tests:\n");
    out.push_str(&format_test_result("Breusch-Pagan LM", &report.breusch_pagan));
    out.push('\n');
    out.push_str(&format_test_result("Hausman", &report.hausman));
    out.push('\n');

    let d = &report.decision;
    out.push_str(&format!("\nEstimator: {} (alpha = {})\n", d.chosen.display_name(), d.alpha));
    out.push_str(&format!("- {}\n", d.reason));
    if d.fallback {
        out.push_str("- fallback: a diagnostic failed, fixed effects used\n");
    }
    if d.sensitive_at_loose_threshold {
        out.push_str(&format!("- note: the choice differs at the looser {LOOSE_ALPHA} threshold\n"));
    }
    out
}

pub fn format_audit(audit: &DropAudit) -> String {
    let mut out = format!("rows used {} of {}", audit.rows_used, audit.rows_total);
    if !audit.missing_by_column.is_empty() {
        let parts: Vec<String> = audit
            .missing_by_column
            .iter()
            .map(|(col, n)| format!("{col}={n}"))
            .collect();
        out.push_str(&format!(" | dropped for missing: {}", parts.join(", ")));
    }
    if !audit.singleton_entities.is_empty() {
        out.push_str(&format!(" | singleton entities: {}", audit.singleton_entities.join(", ")));
    }
    if audit.rows_lost_differencing > 0 {
        out.push_str(&format!(" | lost to differencing: {}", audit.rows_lost_differencing));
    }
    out
}

pub fn format_model_header(model: &FittedModel) -> String {
    let mut out = format!(
        "[{}] {} | n={} entities={} df={} R2={:.4}\n",
        model.spec().label,
        model.model_type().display_name(),
        model.n_obs(),
        model.n_entities(),
        model.df_residual(),
        model.r_squared(),
    );
    out.push_str(&format!("  {}\n", format_audit(model.audit())));
    if let Some(vc) = model.variance_components() {
        out.push_str(&format!(
            "  sigma2_e={:.4} sigma2_u={:.4} theta=[{:.3}, {:.3}]{}\n",
            vc.idiosyncratic,
            vc.individual,
            vc.theta_min,
            vc.theta_max,
            if vc.truncated { " (sigma2_u truncated at 0)" } else { "" }
        ));
    }
    out
}

pub fn format_coefficient_table(table: &CoefficientTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("  covariance: {}\n", table.covariance.label()));
    out.push_str(
        format!(
            "  {:<34} {:>12} {:>12} {:>9} {:>11}\n",
            "regressor", "estimate", "std_error", "t", "p_value"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("  {:-<34} {:-<12} {:-<12} {:-<9} {:-<11}\n", "", "", "", "", "").trim_end());
    out.push('\n');
    for r in &table.rows {
        out.push_str(
            format!(
                "  {:<34} {:>12.4} {:>12.4} {:>9.3} {:>11.4e} {}",
                r.regressor,
                r.estimate,
                r.std_error,
                r.statistic,
                r.p_value,
                stars(r.p_value)
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

pub fn format_interaction(label: &str, result: &PanelResult<InteractionOutcome>) -> String {
    let outcome = match result {
        Ok(o) => o,
        Err(e) => return format!("[{label}] FAILED: {e}\n"),
    };
    let mut out = format_model_header(&outcome.model);
    for w in &outcome.warnings {
        out.push_str(&format!("  warning: {w}\n"));
    }
    out.push_str(&format!("  {}\n", format_test_result("Wooldridge serial", &outcome.serial)));
    out.push_str(&format!("  {}\n", format_test_result("Pesaran CD", &outcome.cross_section)));
    out.push_str(&format_coefficient_table(&outcome.cluster));
    out
}

pub fn format_collinearity(pairs: &[CollinearPair], threshold: f64) -> String {
    if pairs.is_empty() {
        return format!("Collinearity: no pair above |r| > {threshold}\n");
    }
    let mut out = format!("Collinearity: {} pair(s) above |r| > {threshold}\n", pairs.len());
    for p in pairs {
        out.push_str(&format!("  {:<22} {:<22} r={:+.3}\n", p.a, p.b, p.correlation));
    }
    out
}
