//! Panel data container and the column transformations applied before fitting.
//!
//! - `table`: the (entity, time)-indexed table with unique index pairs
//! - `centering`: NaN-aware means and centered derived columns
//! - `within`: entity demeaning (one-way fixed effects)

pub mod centering;
pub mod table;
pub mod within;

pub use centering::*;
pub use table::*;
pub use within::*;
