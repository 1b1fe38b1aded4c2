//! Robust covariance estimators and the Wald tests that consume them.
//!
//! - `hc`: HC0 / HC1 / HC3 sandwich covariance
//! - `cluster`: entity-clustered covariance
//! - `wald`: per-coefficient and joint Wald tests

pub mod cluster;
pub mod hc;
pub mod wald;

pub use cluster::*;
pub use hc::{hc_covariance, hc_vcov, leverages};
pub use wald::*;
