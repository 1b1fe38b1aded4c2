//! Specification tests and the estimator decision they drive.
//!
//! - `breusch_pagan`: pooled vs random effects (LM)
//! - `hausman`: random vs fixed effects
//! - `serial`: Wooldridge first-difference serial correlation test
//! - `cross_section`: Pesaran CD cross-sectional dependence test
//! - `white`: White heteroskedasticity test
//! - `decision`: estimator choice with an explicit fallback
//!
//! Every test is a pure function of fitted models (and, for the serial test, the
//! panel table the model was fitted on).

pub mod breusch_pagan;
pub mod cross_section;
pub mod decision;
pub mod hausman;
pub mod serial;
pub mod white;

pub use breusch_pagan::breusch_pagan_lm;
pub use cross_section::pesaran_cd;
pub use decision::{DiagnosticReport, EstimatorDecision, LOOSE_ALPHA, run_diagnostics, select_estimator};
pub use hausman::{hausman, hausman_statistic};
pub use serial::wooldridge_serial;
pub use white::white_test;
