//! `debt-panel` library crate.
//!
//! The binary (`debtpanel`) is a thin wrapper around this library so that:
//!
//! - the estimators and tests are usable without spawning processes
//! - integration tests can drive the pipeline on synthetic panels

pub mod app;
pub mod cli;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod inference;
pub mod interaction;
pub mod io;
pub mod math;
pub mod panel;
pub mod report;
