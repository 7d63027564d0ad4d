//! Run options for the time advance engine.
//!
//! This module provides the `Options` struct, which collects everything the
//! engine needs from the outside world that is not part of the PDE itself:
//! CFL scaling, the kronmult workspace budget, the implicit solver choice,
//! adaptivity thresholds and the maximum refinement level. Options are plain
//! data with `serde` derives so an outer command-line or file layer can fill
//! them in; the engine only ever borrows them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkError};

/// Linear solver used by the implicit time advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverChoice {
    /// Dense LU factorization of the assembled system (cached between steps).
    Direct,
    /// Restarted GMRES on the matrix-free Kronecker operator.
    Iterative,
}

/// Time integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMethod {
    Explicit,
    Implicit,
}

/// Engine options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Scaling applied to the PDE's stable timestep.
    pub cfl: f64,
    /// Fixed timestep; replaces `get_dt * cfl` when set.
    pub dt: Option<f64>,
    /// Kronmult scratch budget in MiB.
    pub workspace_mb: usize,
    pub solver: SolverChoice,
    pub time_method: TimeMethod,
    /// Enable refinement/coarsening (explicit stepping only).
    pub adapt: bool,
    /// Refine elements whose largest coefficient exceeds this fraction of the global maximum.
    pub refine_threshold: f64,
    /// Coarsen leaves whose largest coefficient is below this fraction of the global maximum.
    pub coarsen_threshold: f64,
    /// Hard cap on the per-dimension hierarchical level.
    pub max_level: usize,
    /// Bound on refine/re-step cycles inside one adaptive step.
    pub max_pseudosteps: usize,
    /// Start from the full tensor grid instead of the sparse selection rule.
    pub full_grid: bool,
    /// Krylov vectors kept before GMRES restarts.
    pub gmres_restart: usize,
    /// Relative residual tolerance for the iterative solver.
    pub solver_tolerance: f64,
    pub solver_max_iterations: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cfl: 0.01,
            dt: None,
            workspace_mb: 1000,
            solver: SolverChoice::Direct,
            time_method: TimeMethod::Explicit,
            adapt: false,
            refine_threshold: 1e-3,
            coarsen_threshold: 1e-4,
            max_level: 8,
            max_pseudosteps: 10,
            full_grid: false,
            gmres_restart: 50,
            solver_tolerance: 1e-10,
            solver_max_iterations: 1000,
        }
    }
}

impl Options {
    pub fn with_cfl(mut self, cfl: f64) -> Self {
        self.cfl = cfl;
        self
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }

    pub fn with_workspace_mb(mut self, workspace_mb: usize) -> Self {
        self.workspace_mb = workspace_mb;
        self
    }

    pub fn with_solver(mut self, solver: SolverChoice) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_time_method(mut self, method: TimeMethod) -> Self {
        self.time_method = method;
        self
    }

    /// Turn on adaptivity with the given relative thresholds.
    pub fn with_adaptivity(mut self, refine_threshold: f64, coarsen_threshold: f64) -> Self {
        self.adapt = true;
        self.refine_threshold = refine_threshold;
        self.coarsen_threshold = coarsen_threshold;
        self
    }

    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_full_grid(mut self, full_grid: bool) -> Self {
        self.full_grid = full_grid;
        self
    }

    /// Kronmult budget in bytes.
    pub fn workspace_bytes(&self) -> usize {
        self.workspace_mb.saturating_mul(1 << 20)
    }

    /// Reject option combinations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !(self.cfl > 0.0) {
            return Err(SkError::Config(format!("cfl must be positive, got {}", self.cfl)));
        }
        if let Some(dt) = self.dt {
            if !(dt > 0.0) {
                return Err(SkError::Config(format!("dt must be positive, got {dt}")));
            }
        }
        if self.adapt {
            if self.time_method == TimeMethod::Implicit {
                return Err(SkError::Config(
                    "adaptivity is only available with explicit time stepping".into(),
                ));
            }
            if !(self.refine_threshold > 0.0) || self.coarsen_threshold < 0.0 {
                return Err(SkError::Config("adaptivity thresholds must be non-negative".into()));
            }
            if self.coarsen_threshold > self.refine_threshold {
                return Err(SkError::Config(format!(
                    "coarsen threshold {} exceeds refine threshold {}",
                    self.coarsen_threshold, self.refine_threshold
                )));
            }
        }
        if self.solver == SolverChoice::Iterative && self.gmres_restart == 0 {
            return Err(SkError::Config("gmres restart length must be positive".into()));
        }
        Ok(())
    }
}
