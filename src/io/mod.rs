//! Input/output helpers.
//!
//! - panel CSV ingest + validation (`ingest`)
//! - CSV exports (`export`)
//! - JSON run summary (`summary`)

pub mod export;
pub mod ingest;
pub mod summary;

pub use export::*;
pub use ingest::*;
pub use summary::*;
