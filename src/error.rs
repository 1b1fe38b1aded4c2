//! Error types.
//!
//! - `PanelError`: failures of the estimation core (index, rank, sample size, ...)
//! - `AppError`: what the binary reports, carrying a process exit code
//!
//! Exit codes: `2` input/config, `3` insufficient data, `4` numerical/internal.

use thiserror::Error;

/// Failures raised by the panel estimation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanelError {
    /// A (entity, time) pair occurs more than once in the panel index.
    #[error("duplicate panel index ({entity}, {time}) at rows {first_row} and {second_row}")]
    DuplicateIndex {
        entity: String,
        time: i32,
        first_row: usize,
        second_row: usize,
    },

    /// The design matrix is not of full column rank.
    #[error("design matrix is rank deficient: column '{column}' is collinear with earlier columns")]
    RankDeficiency { column: String },

    /// Too few observations remain for the number of parameters.
    #[error("insufficient observations for '{context}': {available} available, {required} required")]
    InsufficientObservations {
        context: String,
        available: usize,
        required: usize,
    },

    /// Cluster-robust inference needs at least two clusters.
    #[error("cluster-robust covariance needs at least 2 clusters, got {clusters}")]
    InsufficientClusters { clusters: usize },

    #[error("panel has no column named '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has {found} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    /// An interaction or centered regressor was requested before centering.
    #[error("centered column '{0}' is missing; center the variable before using it")]
    MissingCenteredColumn(String),

    /// An entity whose series was interpolated upstream still has gaps.
    #[error("entity '{entity}' must have a complete '{column}' series, {missing} value(s) missing")]
    IncompleteInterpolatedSeries {
        entity: String,
        column: String,
        missing: usize,
    },

    /// A specification uses both the centered and raw form of a variable.
    #[error(
        "specification '{spec}' uses '{variable}' both centered and raw; confirm intent with --allow-mixed-forms"
    )]
    UnconfirmedMixedForm { spec: String, variable: String },

    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

pub type PanelResult<T> = Result<T, PanelError>;

impl PanelError {
    pub fn numerical(message: impl Into<String>) -> Self {
        PanelError::NumericalFailure(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PanelError> for AppError {
    fn from(err: PanelError) -> Self {
        let exit_code = match &err {
            PanelError::DuplicateIndex { .. }
            | PanelError::MissingColumn(_)
            | PanelError::RaggedColumn { .. }
            | PanelError::MissingCenteredColumn(_)
            | PanelError::IncompleteInterpolatedSeries { .. }
            | PanelError::UnconfirmedMixedForm { .. } => 2,
            PanelError::InsufficientObservations { .. } | PanelError::InsufficientClusters { .. } => 3,
            PanelError::RankDeficiency { .. } | PanelError::NumericalFailure(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
