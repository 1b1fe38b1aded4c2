//! Seeded synthetic country-year panels.
//!
//! The generator draws a fixed-effects data-generating process:
//!
//! `debt_it = 60 + α_i + Σ_k β_k x_k,it + γ (g_it − μ_g)(s_it − μ_s) + ε_it`
//!
//! with `α_i ~ N(0, σ_α)`, regressors varying around entity-specific levels, and
//! `γ` the growth × spending interaction. It is used by the `simulate` command and
//! by tests that need a panel with known coefficients.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::Variable;
use crate::error::AppError;
use crate::panel::PanelTable;

const ENTITY_NAMES: [&str; 24] = [
    "Argentina",
    "Australia",
    "Brazil",
    "Canada",
    "Chile",
    "China",
    "Colombia",
    "France",
    "Germany",
    "India",
    "Indonesia",
    "Italy",
    "Japan",
    "Kenya",
    "Mexico",
    "Nigeria",
    "Norway",
    "Peru",
    "Poland",
    "South Africa",
    "Spain",
    "Turkey",
    "United Kingdom",
    "United States",
];

/// Population mean and within-entity standard deviation of each regressor.
fn regressor_profile(variable: Variable) -> (f64, f64) {
    match variable {
        Variable::Debt => (60.0, 0.0),
        Variable::GdpGrowth => (3.0, 2.0),
        Variable::GovSpending => (18.0, 3.0),
        Variable::Inflation => (4.0, 2.5),
        Variable::GovRevenue => (25.0, 4.0),
        Variable::PopGrowth => (1.2, 0.6),
        Variable::UrbanPopGrowth => (1.8, 0.8),
        Variable::Unemployment => (7.0, 2.0),
        Variable::AgeDependency => (50.0, 5.0),
        Variable::HealthSpending => (6.0, 1.5),
        Variable::MilitarySpending => (2.0, 0.7),
        Variable::EducationSpending => (4.5, 1.0),
        Variable::Corruption => (50.0, 8.0),
    }
}

/// Slopes of the data-generating process (by column name).
pub fn true_coefficients() -> BTreeMap<String, f64> {
    use Variable::*;
    [
        (GdpGrowth, -1.5),
        (GovSpending, 1.2),
        (Inflation, -0.4),
        (GovRevenue, -0.8),
        (PopGrowth, 2.0),
        (UrbanPopGrowth, -1.0),
        (Unemployment, 0.9),
        (AgeDependency, 0.3),
        (HealthSpending, 0.5),
        (MilitarySpending, 1.1),
        (EducationSpending, -0.6),
        (Corruption, -0.2),
    ]
    .into_iter()
    .map(|(v, b)| (v.column().to_string(), b))
    .collect()
}

/// Coefficient of the centered growth × spending product.
pub const TRUE_INTERACTION: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct SyntheticPanelConfig {
    pub entities: usize,
    pub years: usize,
    pub start_year: i32,
    pub seed: u64,
    /// Standard deviation of the idiosyncratic error.
    pub noise_sd: f64,
    /// Standard deviation of the entity effect.
    pub entity_effect_sd: f64,
    /// Probability that a regressor value is blanked.
    pub missing_rate: f64,
    /// Entities whose unemployment series is never blanked.
    pub complete_entities: Vec<String>,
}

impl Default for SyntheticPanelConfig {
    fn default() -> Self {
        Self {
            entities: 20,
            years: 15,
            start_year: 2000,
            seed: 42,
            noise_sd: 2.0,
            entity_effect_sd: 15.0,
            missing_rate: 0.02,
            complete_entities: vec!["China".to_string(), "Argentina".to_string()],
        }
    }
}

fn entity_name(i: usize) -> String {
    ENTITY_NAMES
        .get(i)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Country {:02}", i + 1))
}

fn noise(sd: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(0.0, sd).map_err(|e| AppError::new(2, format!("Invalid noise standard deviation {sd}: {e}")))
}

/// Draw a synthetic panel.
pub fn generate_panel(config: &SyntheticPanelConfig) -> Result<PanelTable, AppError> {
    if config.entities < 2 || config.years < 2 {
        return Err(AppError::new(2, "Synthetic panel needs at least 2 entities and 2 years."));
    }
    if !(0.0..1.0).contains(&config.missing_rate) {
        return Err(AppError::new(2, "Missing rate must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let standard = noise(1.0)?;
    let idiosyncratic = noise(config.noise_sd)?;
    let effect = noise(config.entity_effect_sd)?;
    let betas = true_coefficients();

    let regressors: Vec<Variable> = Variable::ALL.into_iter().filter(|v| *v != Variable::Debt).collect();
    let n = config.entities * config.years;
    let mut entities = Vec::with_capacity(n);
    let mut times = Vec::with_capacity(n);
    let mut columns: BTreeMap<String, Vec<Option<f64>>> = Variable::ALL
        .into_iter()
        .map(|v| (v.column().to_string(), Vec::with_capacity(n)))
        .collect();

    for i in 0..config.entities {
        let name = entity_name(i);
        let alpha = effect.sample(&mut rng);
        // Entity-specific regressor levels.
        let levels: Vec<f64> = regressors
            .iter()
            .map(|v| {
                let (mean, sd) = regressor_profile(*v);
                mean + 0.5 * sd * standard.sample(&mut rng)
            })
            .collect();
        let keep_unemployment = config.complete_entities.iter().any(|e| *e == name);

        for t in 0..config.years {
            entities.push(name.clone());
            times.push(config.start_year + t as i32);

            let mut debt = 60.0 + alpha + idiosyncratic.sample(&mut rng);
            let mut growth = 0.0;
            let mut spending = 0.0;
            for (v, level) in regressors.iter().zip(&levels) {
                let (_, sd) = regressor_profile(*v);
                let value = level + sd * standard.sample(&mut rng);
                debt += betas.get(v.column()).copied().unwrap_or(0.0) * value;
                match v {
                    Variable::GdpGrowth => growth = value,
                    Variable::GovSpending => spending = value,
                    _ => {}
                }

                let protected = keep_unemployment && *v == Variable::Unemployment;
                let blank = !protected && config.missing_rate > 0.0 && rng.gen_bool(config.missing_rate);
                if let Some(column) = columns.get_mut(v.column()) {
                    column.push(if blank { None } else { Some(value) });
                }
            }
            let (g_mean, _) = regressor_profile(Variable::GdpGrowth);
            let (s_mean, _) = regressor_profile(Variable::GovSpending);
            debt += TRUE_INTERACTION * (growth - g_mean) * (spending - s_mean);

            if let Some(column) = columns.get_mut(Variable::Debt.column()) {
                column.push(Some(debt));
            }
        }
    }

    PanelTable::new("country", "year", entities, times, columns).map_err(AppError::from)
}
