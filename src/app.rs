//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the diagnostics / estimation pipeline
//! - prints reports
//! - writes optional exports

use std::path::Path;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs, SimulateArgs};
use crate::data::{SyntheticPanelConfig, generate_panel};
use crate::domain::{AnalysisConfig, MixedFormPolicy, Study};
use crate::error::AppError;
use crate::io::{
    build_summary, write_coefficients_csv, write_correlation_csv, write_panel_csv_file, write_residuals_csv,
    write_summary_json,
};
use crate::report::{
    format_coefficient_table, format_collinearity, format_diagnostics, format_ingest_summary,
    format_interaction, format_model_header, format_test,
};

pub mod pipeline;

/// Entry point for the `debtpanel` binary.
pub fn run() -> Result<(), AppError> {
    // Values from `.env` (e.g. DEBT_PANEL_CSV) fill in unset environment variables.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(&args),
        Command::Diagnose(args) => handle_diagnose(&args),
        Command::Simulate(args) => handle_simulate(&args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    // `try_init` so tests and embedders that already installed a subscriber keep theirs.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn config_from_args(args: &RunArgs) -> Result<AnalysisConfig, AppError> {
    if !(args.alpha > 0.0 && args.alpha < 1.0) {
        return Err(AppError::new(2, format!("--alpha must lie in (0, 1), got {}", args.alpha)));
    }
    if !(args.collinearity_threshold > 0.0 && args.collinearity_threshold <= 1.0) {
        return Err(AppError::new(
            2,
            format!(
                "--collinearity-threshold must lie in (0, 1], got {}",
                args.collinearity_threshold
            ),
        ));
    }

    let mut config = AnalysisConfig::new(args.data.clone());
    config.alpha = args.alpha;
    config.mixed_forms = if args.allow_mixed_forms {
        MixedFormPolicy::Warn
    } else {
        MixedFormPolicy::Reject
    };
    config.complete_entities = args.complete_entities.clone();
    config.parallel = !args.sequential;
    config.collinearity_threshold = args.collinearity_threshold;
    config.out_dir = args.out_dir.clone();
    config.summary_json = args.json.clone();
    Ok(config)
}

fn handle_run(args: &RunArgs) -> Result<(), AppError> {
    let config = config_from_args(args)?;
    let study = Study::debt_study();
    let run = pipeline::run_analysis(&config, &study)?;

    println!("{}", format_ingest_summary(&run.ingest, &config));
    println!("{}", format_collinearity(&run.collinear, config.collinearity_threshold));
    println!("{}", format_diagnostics(&run.diagnostics));

    println!("{}", format_model_header(&run.final_model));
    println!("{}", format_coefficient_table(&run.final_hc3));
    match &run.final_cluster {
        Ok(table) => println!("{}", format_coefficient_table(table)),
        Err(e) => println!("Clustered standard errors unavailable: {e}\n"),
    }
    match &run.joint_wald {
        Ok(t) => println!("{}", format_test(t)),
        Err(e) => println!("Joint Wald test unavailable: {e}"),
    }
    match &run.white {
        Ok(t) => println!("{}", format_test(t)),
        Err(e) => println!("White test unavailable: {e}"),
    }
    println!();

    for (label, result) in &run.interactions {
        println!("{}", format_interaction(label, result));
    }

    if let Some(dir) = &config.out_dir {
        write_exports(dir, &run)?;
    }
    if let Some(path) = &config.summary_json {
        write_summary_json(path, &build_summary(&run, &config))?;
        info!(path = %path.display(), "wrote run summary");
    }
    Ok(())
}

fn write_exports(dir: &Path, run: &pipeline::RunOutput) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display())))?;

    let mut tables = vec![&run.final_hc3];
    if let Ok(t) = &run.final_cluster {
        tables.push(t);
    }
    for (_, result) in &run.interactions {
        if let Ok(outcome) = result {
            tables.push(&outcome.hc3);
            tables.push(&outcome.cluster);
        }
    }
    write_coefficients_csv(&dir.join("coefficients.csv"), &tables)?;
    write_correlation_csv(&dir.join("correlation.csv"), &run.correlation)?;

    write_residuals_csv(&dir.join("residuals_final.csv"), &run.final_model)?;
    for (label, result) in &run.interactions {
        if let Ok(outcome) = result {
            write_residuals_csv(&dir.join(format!("residuals_{label}.csv")), &outcome.model)?;
        }
    }
    info!(dir = %dir.display(), tables = tables.len(), "wrote CSV exports");
    Ok(())
}

fn handle_diagnose(args: &RunArgs) -> Result<(), AppError> {
    let config = config_from_args(args)?;
    let study = Study::debt_study();
    let (ingest, report) = pipeline::run_diagnose(&config, &study)?;

    println!("{}", format_ingest_summary(&ingest, &config));
    println!("{}", format_diagnostics(&report));
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    if !(0.0..1.0).contains(&args.missing_rate) {
        return Err(AppError::new(
            2,
            format!("--missing-rate must lie in [0, 1), got {}", args.missing_rate),
        ));
    }
    let config = SyntheticPanelConfig {
        entities: args.entities,
        years: args.years,
        start_year: args.start_year,
        seed: args.seed,
        noise_sd: args.noise,
        missing_rate: args.missing_rate,
        ..SyntheticPanelConfig::default()
    };
    debug!(?config, "generating synthetic panel");

    let table = generate_panel(&config)?;
    write_panel_csv_file(&args.out, &table)?;
    println!(
        "Wrote {} rows ({} countries x {} years) to {}",
        table.n_rows(),
        config.entities,
        config.years,
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            data: PathBuf::from("panel.csv"),
            alpha: 0.05,
            allow_mixed_forms: false,
            complete_entities: vec!["China".to_string()],
            sequential: false,
            collinearity_threshold: 0.8,
            out_dir: None,
            json: None,
        }
    }

    #[test]
    fn config_maps_flags() {
        let mut a = args();
        a.allow_mixed_forms = true;
        a.sequential = true;
        a.alpha = 0.1;
        let config = config_from_args(&a).unwrap();
        assert_eq!(config.mixed_forms, MixedFormPolicy::Warn);
        assert!(!config.parallel);
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.complete_entities, vec!["China"]);
    }

    #[test]
    fn invalid_alpha_is_a_config_error() {
        let mut a = args();
        a.alpha = 1.5;
        let err = config_from_args(&a).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
