//! Command-line parsing for the debt panel analysis.
//!
//! Argument parsing and command dispatch are kept separate from the estimation
//! code; `app` turns these arguments into an `AnalysisConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "debtpanel", version, about = "Panel-data econometrics of government debt")]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full analysis: diagnostics, final model, robust inference, interactions.
    Run(RunArgs),
    /// Only the Breusch-Pagan / Hausman estimator decision.
    Diagnose(RunArgs),
    /// Write a seeded synthetic panel CSV.
    Simulate(SimulateArgs),
}

/// Options shared by `run` and `diagnose`.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Panel CSV (country, year and one column per study variable).
    #[arg(short, long, env = "DEBT_PANEL_CSV", value_name = "CSV")]
    pub data: PathBuf,

    /// Decision threshold for the Breusch-Pagan and Hausman tests.
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,

    /// Fit specifications that use a variable both centered and raw (logged as warnings).
    #[arg(long)]
    pub allow_mixed_forms: bool,

    /// Entity whose unemployment series must be complete (repeatable).
    #[arg(long = "complete-entity", value_name = "NAME", default_values_t = ["China".to_string(), "Argentina".to_string()])]
    pub complete_entities: Vec<String>,

    /// Fit the interaction specifications one after another.
    #[arg(long)]
    pub sequential: bool,

    /// Absolute correlation flagged by collinearity screening.
    #[arg(long, default_value_t = 0.8)]
    pub collinearity_threshold: f64,

    /// Directory for CSV exports (coefficients, residuals, correlation matrix).
    #[arg(long, env = "DEBT_PANEL_OUT_DIR", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Write a JSON run summary.
    #[arg(long, value_name = "JSON")]
    pub json: Option<PathBuf>,
}

/// Options for `simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of countries.
    #[arg(long, default_value_t = 20)]
    pub entities: usize,

    /// Number of years per country.
    #[arg(long, default_value_t = 15)]
    pub years: usize,

    /// First year of the panel.
    #[arg(long, default_value_t = 2000)]
    pub start_year: i32,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Standard deviation of the idiosyncratic error.
    #[arg(long, default_value_t = 2.0)]
    pub noise: f64,

    /// Probability that a regressor value is missing.
    #[arg(long, default_value_t = 0.02)]
    pub missing_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["debtpanel", "run", "--data", "panel.csv"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.alpha, 0.05);
        assert_eq!(args.complete_entities, vec!["China", "Argentina"]);
        assert!(!args.allow_mixed_forms);
        assert!(!cli.verbose);
    }

    #[test]
    fn repeated_complete_entity_replaces_defaults() {
        let cli = Cli::parse_from([
            "debtpanel",
            "diagnose",
            "-d",
            "p.csv",
            "--complete-entity",
            "Chile",
            "--complete-entity",
            "Peru",
            "-v",
        ]);
        let Command::Diagnose(args) = cli.command else {
            panic!("expected diagnose");
        };
        assert_eq!(args.complete_entities, vec!["Chile", "Peru"]);
        assert!(cli.verbose);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
