//! Reporting: terminal formatting and collinearity screening.

pub mod correlation;
pub mod format;

pub use correlation::*;
pub use format::*;
