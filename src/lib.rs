//! sparsekron: adaptive sparse-grid discontinuous Galerkin time advance.
//!
//! A declarative [`PdeDescriptor`] is discretized per dimension in an
//! orthonormal multiwavelet basis, the per-term operators are applied to the
//! sparse-grid solution as sums of Kronecker products without forming them,
//! and the solution is advanced explicitly (optionally adapting the grid) or
//! implicitly with a direct or matrix-free iterative solve. Work is split
//! over a worker group behind the [`Comm`] trait: serial, in-process threads,
//! or MPI with the `mpi` feature.

pub mod adapt;
pub mod basis;
pub mod boundary;
pub mod coefficients;
pub mod config;
pub mod core;
pub mod error;
pub mod kronmult;
pub mod parallel;
pub mod pde;
pub mod solver;
pub mod time_advance;
pub mod utils;

pub use adapt::{AdaptStats, DistributedGrid, Element, ElementSet};
pub use coefficients::{CoefficientCache, Operator1d};
pub use config::{Options, SolverChoice, TimeMethod};
pub use error::{Result, SkError};
pub use kronmult::KronOperator;
pub use parallel::{Comm, SerialComm, ThreadComm};
pub use pde::{
    Boundary, BoundaryKind, Declaration, Dimension, FluxPolicy, OperatorKind, PdeDescriptor, Term,
};
pub use solver::{GmresSolver, LinearSolver, LuSolver};
pub use time_advance::{
    AdvanceState, Discretization, RunSummary, Simulation, SolutionError,
    adaptive_explicit_advance, explicit_time_advance, implicit_time_advance,
};
pub use utils::convergence::SolveStats;

#[cfg(feature = "mpi")]
pub use parallel::MpiComm;
