//! Mathematical utilities: QR least squares and reference distributions.

pub mod dist;
pub mod ols;

pub use dist::*;
pub use ols::*;
