//! Shared domain types.
//!
//! Outputs of the estimation core are value objects: a new specification yields a
//! new `FittedModel`, a new covariance choice yields a new `CovarianceMatrix`, and
//! nothing is mutated after construction.

use std::collections::BTreeMap;
use std::path::PathBuf;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Prefix used for mean-centered derived columns.
pub const CENTERED_PREFIX: &str = "c_";

/// Name of the intercept term in pooled and random-effects designs.
pub const INTERCEPT: &str = "(intercept)";

/// The fixed set of numeric fields in the debt panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Debt,
    GdpGrowth,
    GovSpending,
    Inflation,
    GovRevenue,
    PopGrowth,
    UrbanPopGrowth,
    Unemployment,
    AgeDependency,
    HealthSpending,
    MilitarySpending,
    EducationSpending,
    Corruption,
}

impl Variable {
    pub const ALL: [Variable; 13] = [
        Variable::Debt,
        Variable::GdpGrowth,
        Variable::GovSpending,
        Variable::Inflation,
        Variable::GovRevenue,
        Variable::PopGrowth,
        Variable::UrbanPopGrowth,
        Variable::Unemployment,
        Variable::AgeDependency,
        Variable::HealthSpending,
        Variable::MilitarySpending,
        Variable::EducationSpending,
        Variable::Corruption,
    ];

    /// Column name in the panel CSV and in exports.
    pub fn column(self) -> &'static str {
        match self {
            Variable::Debt => "debt",
            Variable::GdpGrowth => "gdp_growth",
            Variable::GovSpending => "gov_spending",
            Variable::Inflation => "inflation",
            Variable::GovRevenue => "gov_revenue",
            Variable::PopGrowth => "pop_growth",
            Variable::UrbanPopGrowth => "urban_pop_growth",
            Variable::Unemployment => "unemployment",
            Variable::AgeDependency => "age_dependency",
            Variable::HealthSpending => "health_spending",
            Variable::MilitarySpending => "military_spending",
            Variable::EducationSpending => "education_spending",
            Variable::Corruption => "corruption",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Variable::Debt => "Government debt (% GDP)",
            Variable::GdpGrowth => "GDP growth",
            Variable::GovSpending => "Government spending",
            Variable::Inflation => "Inflation",
            Variable::GovRevenue => "Government revenue",
            Variable::PopGrowth => "Population growth",
            Variable::UrbanPopGrowth => "Urban population growth",
            Variable::Unemployment => "Unemployment",
            Variable::AgeDependency => "Age-dependency ratio",
            Variable::HealthSpending => "Health spending",
            Variable::MilitarySpending => "Military spending",
            Variable::EducationSpending => "Education spending",
            Variable::Corruption => "Corruption index",
        }
    }

    pub fn from_column(name: &str) -> Option<Variable> {
        Variable::ALL.into_iter().find(|v| v.column() == name)
    }

    /// Name of the derived mean-centered column.
    pub fn centered_column(self) -> String {
        format!("{CENTERED_PREFIX}{}", self.column())
    }
}

/// A typed regressor: a raw variable, its centered form, or the product of two
/// centered variables.
///
/// Interactions are only ever built from centered components, so a product of raw
/// columns cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regressor {
    Raw(Variable),
    Centered(Variable),
    Interaction(Variable, Variable),
}

impl Regressor {
    pub fn name(&self) -> String {
        match self {
            Regressor::Raw(v) => v.column().to_string(),
            Regressor::Centered(v) => v.centered_column(),
            Regressor::Interaction(a, b) => {
                format!("{}:{}", a.centered_column(), b.centered_column())
            }
        }
    }

    /// Table columns this regressor is computed from.
    pub fn source_columns(&self) -> Vec<String> {
        match self {
            Regressor::Raw(v) => vec![v.column().to_string()],
            Regressor::Centered(v) => vec![v.centered_column()],
            Regressor::Interaction(a, b) => vec![a.centered_column(), b.centered_column()],
        }
    }

    /// Variables entering this regressor in centered form.
    pub fn centered_variables(&self) -> Vec<Variable> {
        match self {
            Regressor::Raw(_) => Vec::new(),
            Regressor::Centered(v) => vec![*v],
            Regressor::Interaction(a, b) => vec![*a, *b],
        }
    }
}

/// Estimator used for a specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Pooling,
    RandomEffects,
    Within,
    FirstDifference,
}

impl ModelType {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelType::Pooling => "pooled OLS",
            ModelType::RandomEffects => "random effects",
            ModelType::Within => "fixed effects (within)",
            ModelType::FirstDifference => "first difference",
        }
    }

    /// Whether the design carries an explicit intercept column.
    pub fn has_intercept(self) -> bool {
        !matches!(self, ModelType::Within)
    }
}

/// An explicit regression specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub label: String,
    pub response: Variable,
    pub regressors: Vec<Regressor>,
    pub model: ModelType,
    pub interaction: Option<(Variable, Variable)>,
}

impl Specification {
    pub fn new(label: impl Into<String>, response: Variable, regressors: Vec<Regressor>, model: ModelType) -> Self {
        Self {
            label: label.into(),
            response,
            regressors,
            model,
            interaction: None,
        }
    }

    /// Same formula, different estimator.
    pub fn with_model(&self, model: ModelType) -> Self {
        Self {
            model,
            ..self.clone()
        }
    }

    pub fn regressor_names(&self) -> Vec<String> {
        self.regressors.iter().map(Regressor::name).collect()
    }

    /// Variables that appear both raw and centered (directly or inside an interaction).
    pub fn mixed_forms(&self) -> Vec<Variable> {
        let raw: Vec<Variable> = self
            .regressors
            .iter()
            .filter_map(|r| match r {
                Regressor::Raw(v) => Some(*v),
                _ => None,
            })
            .collect();
        let mut mixed: Vec<Variable> = self
            .regressors
            .iter()
            .flat_map(Regressor::centered_variables)
            .filter(|v| raw.contains(v))
            .collect();
        mixed.sort();
        mixed.dedup();
        mixed
    }
}

/// A moderated regression: `A × B` on centered components plus the base controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSpec {
    pub label: String,
    pub a: Variable,
    pub b: Variable,
    /// Raw controls kept in addition to the base set (even if they are `a` or `b`).
    #[serde(default)]
    pub extra_raw: Vec<Variable>,
}

impl InteractionSpec {
    pub fn new(label: impl Into<String>, a: Variable, b: Variable) -> Self {
        Self {
            label: label.into(),
            a,
            b,
            extra_raw: Vec::new(),
        }
    }

    pub fn keeping_raw(mut self, variable: Variable) -> Self {
        self.extra_raw.push(variable);
        self
    }
}

/// The fixed variable set and interaction list of the debt study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub response: Variable,
    pub base: Vec<Variable>,
    pub interactions: Vec<InteractionSpec>,
}

impl Study {
    pub fn debt_study() -> Self {
        use Variable::*;
        Self {
            response: Debt,
            base: vec![
                GdpGrowth,
                GovSpending,
                Inflation,
                GovRevenue,
                PopGrowth,
                UrbanPopGrowth,
                Unemployment,
                AgeDependency,
                HealthSpending,
                MilitarySpending,
                EducationSpending,
                Corruption,
            ],
            interactions: vec![
                InteractionSpec::new("growth_x_spending", GdpGrowth, GovSpending),
                InteractionSpec::new("inflation_x_revenue", Inflation, GovRevenue),
                InteractionSpec::new("pop_x_urban", PopGrowth, UrbanPopGrowth).keeping_raw(PopGrowth),
                InteractionSpec::new("unemployment_x_dependency", Unemployment, AgeDependency),
                InteractionSpec::new("health_x_education", HealthSpending, EducationSpending),
                InteractionSpec::new("corruption_x_military", Corruption, MilitarySpending),
            ],
        }
    }

    /// Base specification with all regressors raw.
    pub fn base_specification(&self, model: ModelType) -> Specification {
        Specification::new(
            "base",
            self.response,
            self.base.iter().map(|v| Regressor::Raw(*v)).collect(),
            model,
        )
    }

    /// Every variable that enters some interaction (and must be centered).
    pub fn interaction_variables(&self) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self.interactions.iter().flat_map(|s| [s.a, s.b]).collect();
        vars.sort();
        vars.dedup();
        vars
    }
}

/// How a run treats specifications that mix centered and raw forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedFormPolicy {
    /// Fail the specification until its author confirms intent.
    Reject,
    /// Fit it, recording a warning on the result.
    Warn,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub data_path: PathBuf,
    /// Decision threshold for the Breusch-Pagan and Hausman tests.
    pub alpha: f64,
    pub mixed_forms: MixedFormPolicy,
    /// Entities whose unemployment series was interpolated upstream.
    pub complete_entities: Vec<String>,
    /// Fit the interaction specifications in parallel.
    pub parallel: bool,
    /// Absolute pairwise correlation flagged during collinearity screening.
    pub collinearity_threshold: f64,
    pub out_dir: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

impl AnalysisConfig {
    pub const DEFAULT_ALPHA: f64 = 0.05;

    pub fn new(data_path: PathBuf) -> Self {
        Self {
            data_path,
            alpha: Self::DEFAULT_ALPHA,
            mixed_forms: MixedFormPolicy::Reject,
            complete_entities: vec!["China".to_string(), "Argentina".to_string()],
            parallel: true,
            collinearity_threshold: 0.8,
            out_dir: None,
            summary_json: None,
        }
    }
}

/// Row of the estimation sample: compact entity id plus time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsIndex {
    pub entity: usize,
    pub time: i32,
}

/// Audit of listwise deletion for one specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropAudit {
    pub rows_total: usize,
    /// Rows dropped because of a missing value, keyed by the first missing column.
    pub missing_by_column: BTreeMap<String, usize>,
    /// Entities observed once, whose within-transformed rows are identically zero.
    pub singleton_entities: Vec<String>,
    /// Rows lost when differencing (first row of each entity or gaps in time).
    pub rows_lost_differencing: usize,
    pub rows_used: usize,
}

impl DropAudit {
    pub fn rows_dropped_missing(&self) -> usize {
        self.missing_by_column.values().sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_total.saturating_sub(self.rows_used)
    }
}

/// Variance components of the one-way error-component model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceComponents {
    pub idiosyncratic: f64,
    pub individual: f64,
    pub theta_min: f64,
    pub theta_max: f64,
    /// The individual component was estimated negative and set to zero.
    pub truncated: bool,
}

/// A fitted specification.
///
/// Fields are crate-private; a new specification yields a new `FittedModel`.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub(crate) spec: Specification,
    pub(crate) names: Vec<String>,
    pub(crate) coefficients: DVector<f64>,
    /// Classical covariance `σ² (X'X)⁻¹`.
    pub(crate) vcov: DMatrix<f64>,
    pub(crate) xtx_inv: DMatrix<f64>,
    /// Design matrix actually passed to least squares (after any transformation).
    pub(crate) design: DMatrix<f64>,
    /// Fitted values on the response scale for the retained rows.
    pub(crate) fitted_levels: DVector<f64>,
    pub(crate) residuals: DVector<f64>,
    pub(crate) index: Vec<ObsIndex>,
    pub(crate) entity_names: Vec<String>,
    pub(crate) df_residual: usize,
    pub(crate) r_squared: f64,
    pub(crate) audit: DropAudit,
    pub(crate) components: Option<VarianceComponents>,
}

impl FittedModel {
    pub fn spec(&self) -> &Specification {
        &self.spec
    }

    pub fn model_type(&self) -> ModelType {
        self.spec.model
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.coefficients[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn vcov(&self) -> &DMatrix<f64> {
        &self.vcov
    }

    pub fn xtx_inv(&self) -> &DMatrix<f64> {
        &self.xtx_inv
    }

    pub fn design(&self) -> &DMatrix<f64> {
        &self.design
    }

    pub fn residuals(&self) -> &DVector<f64> {
        &self.residuals
    }

    /// Fitted values on the original response scale.
    ///
    /// Pooled and within fits include the entity effects (`y − e`); random effects
    /// report `X β` on the raw regressors, since its residuals live on the
    /// quasi-demeaned scale.
    pub fn fitted_levels(&self) -> &DVector<f64> {
        &self.fitted_levels
    }

    pub fn index(&self) -> &[ObsIndex] {
        &self.index
    }

    pub fn entity_names(&self) -> &[String] {
        &self.entity_names
    }

    pub fn entity_ids(&self) -> Vec<usize> {
        self.index.iter().map(|o| o.entity).collect()
    }

    pub fn n_obs(&self) -> usize {
        self.residuals.len()
    }

    pub fn n_entities(&self) -> usize {
        self.entity_names.len()
    }

    pub fn df_residual(&self) -> usize {
        self.df_residual
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn audit(&self) -> &DropAudit {
        &self.audit
    }

    pub fn variance_components(&self) -> Option<&VarianceComponents> {
        self.components.as_ref()
    }

    pub fn ssr(&self) -> f64 {
        self.residuals.norm_squared()
    }
}

/// Heteroskedasticity-consistent covariance variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HcType {
    /// `ω_i = e_i²`
    HC0,
    /// `ω_i = n/(n-k) e_i²`
    HC1,
    /// `ω_i = e_i² / (1 - h_ii)²`
    HC3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceKind {
    Classical,
    Hc(HcType),
    /// Cluster-robust by entity.
    ClusterEntity,
}

impl CovarianceKind {
    pub fn label(self) -> &'static str {
        match self {
            CovarianceKind::Classical => "classical",
            CovarianceKind::Hc(HcType::HC0) => "HC0",
            CovarianceKind::Hc(HcType::HC1) => "HC1",
            CovarianceKind::Hc(HcType::HC3) => "HC3",
            CovarianceKind::ClusterEntity => "cluster(entity)",
        }
    }
}

/// A symmetric covariance matrix indexed by regressor name.
#[derive(Debug, Clone)]
pub struct CovarianceMatrix {
    pub kind: CovarianceKind,
    pub names: Vec<String>,
    pub matrix: DMatrix<f64>,
}

impl CovarianceMatrix {
    /// Square roots of the diagonal; round-off can leave a tiny negative variance
    /// on an exact fit, which is read as zero.
    pub fn std_errors(&self) -> Vec<f64> {
        self.matrix.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect()
    }
}

/// Per-regressor Wald test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTest {
    pub regressor: String,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
}

/// Coefficient tests of one specification under one covariance estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTable {
    pub spec_label: String,
    pub model: ModelType,
    pub covariance: CovarianceKind,
    pub df: usize,
    pub rows: Vec<CoefficientTest>,
}

impl CoefficientTable {
    pub fn row(&self, regressor: &str) -> Option<&CoefficientTest> {
        self.rows.iter().find(|r| r.regressor == regressor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    BreuschPaganLm,
    Hausman,
    WooldridgeSerial,
    PesaranCd,
    WhiteHeteroskedasticity,
    JointWald,
}

impl TestKind {
    pub fn display_name(self) -> &'static str {
        match self {
            TestKind::BreuschPaganLm => "Breusch-Pagan LM (pooled vs random)",
            TestKind::Hausman => "Hausman (random vs fixed)",
            TestKind::WooldridgeSerial => "Wooldridge serial correlation (first difference)",
            TestKind::PesaranCd => "Pesaran CD (cross-sectional dependence)",
            TestKind::WhiteHeteroskedasticity => "White heteroskedasticity",
            TestKind::JointWald => "Joint Wald (all slopes)",
        }
    }
}

/// Reference distribution of a test statistic under the null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum NullDistribution {
    ChiSquared { df: f64 },
    F { df1: f64, df2: f64 },
    StandardNormal,
}

/// Outcome of a specification test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test: TestKind,
    pub statistic: f64,
    pub distribution: NullDistribution,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TestResult {
    pub fn rejects(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}
