//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the study variables and typed regressors (`Variable`, `Regressor`)
//! - explicit specification objects (`Specification`, `InteractionSpec`, `Study`)
//! - estimation outputs (`FittedModel`, `CovarianceMatrix`, `TestResult`, etc.)

pub mod types;

pub use types::*;
