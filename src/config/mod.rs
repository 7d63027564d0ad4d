//! Engine configuration.

pub mod options;
pub use options::{Options, SolverChoice, TimeMethod};
