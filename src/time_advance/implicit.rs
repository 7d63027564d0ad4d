//! Backward Euler: `(I - dt A) x' = x + dt (sources + boundaries)` at `t + dt`.

use faer::Mat;
use log::{debug, trace};

use super::Discretization;
use crate::config::{Options, SolverChoice};
use crate::core::traits::MatVec;
use crate::error::{Result, SkError};
use crate::kronmult::{KronOperator, check_workspace};
use crate::parallel::agree;
use crate::pde::PdeDescriptor;
use crate::solver::{GmresSolver, LinearSolver, LuSolver};
use crate::utils::convergence::SolveStats;

/// `x ↦ x - dt A x` over the worker group.
pub struct ImplicitOperator<'a> {
    disc: &'a Discretization,
    op: KronOperator<'a>,
    dt: f64,
}

impl<'a> ImplicitOperator<'a> {
    pub fn new(disc: &'a Discretization, dt: f64) -> Result<Self> {
        Ok(Self { disc, op: disc.operator()?, dt })
    }
}

impl MatVec<Vec<f64>> for ImplicitOperator<'_> {
    fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        let ax = self.disc.grid().exchange(&self.op.apply_local(x));
        y.iter_mut().zip(x.iter().zip(&ax)).for_each(|(yi, (xi, ai))| *yi = xi - self.dt * ai);
    }
}

/// Solver state carried between implicit steps.
#[derive(Default)]
pub struct ImplicitSystem {
    lu: LuSolver<f64>,
    last_stats: Option<SolveStats<f64>>,
}

impl ImplicitSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats of the most recent solve.
    pub fn last_stats(&self) -> Option<&SolveStats<f64>> {
        self.last_stats.as_ref()
    }

    /// Forget the cached factorization.
    pub fn invalidate(&mut self) {
        self.lu = LuSolver::new();
    }

    fn factor(&mut self, disc: &Discretization, dt: f64) -> Result<()> {
        let dof = disc.grid().dof();
        let bytes = dof.saturating_mul(dof).saturating_mul(std::mem::size_of::<f64>());
        check_workspace(bytes, disc.workspace_bytes)?;
        let op = disc.operator()?;
        let rows = disc.grid().exchange(&op.dense_rows());
        let system = Mat::from_fn(dof, dof, |i, j| {
            let id = if i == j { 1.0 } else { 0.0 };
            id - dt * rows[i * dof + j]
        });
        let result = self.lu.factor(&system);
        agree(disc.comm(), "factorization", result)?;
        debug!("factored implicit system of size {dof}");
        Ok(())
    }
}

/// One backward Euler step from `time` to `time + dt`.
///
/// With the direct solver the factorization of `I - dt A` is rebuilt when
/// `update_system` is set or nothing of the right size is cached; otherwise
/// the cached factors are reused as they are, so the caller must only clear
/// `update_system` when neither the grid, `dt` nor any time-dependent term
/// changed. The iterative solver is matrix-free and ignores the flag.
#[allow(clippy::too_many_arguments)]
pub fn implicit_time_advance(
    pde: &PdeDescriptor,
    disc: &mut Discretization,
    system: &mut ImplicitSystem,
    options: &Options,
    x: &[f64],
    time: f64,
    dt: f64,
    update_system: bool,
) -> Result<Vec<f64>> {
    let t_next = time + dt;
    disc.refresh(pde, t_next)?;
    let dof = disc.grid().dof();
    let parts = disc.parts().scaled(t_next, dof);
    let b: Vec<f64> = x.iter().zip(&parts).map(|(xi, pi)| xi + dt * pi).collect();

    match options.solver {
        SolverChoice::Direct => {
            if update_system || system.lu.factored_size() != Some(dof) {
                system.factor(disc, dt)?;
            } else {
                trace!("reusing cached factorization");
            }
            let mut out = vec![0.0; dof];
            let solved = system.lu.solve_cached(&b, &mut out);
            agree(disc.comm(), "direct solve", solved)?;
            system.last_stats = Some(SolveStats { iterations: 1, final_residual: 0.0, converged: true });
            Ok(out)
        }
        SolverChoice::Iterative => {
            let op = ImplicitOperator::new(disc, dt)?;
            let mut gmres = GmresSolver::new(
                options.gmres_restart,
                options.solver_tolerance,
                options.solver_max_iterations,
            );
            let mut out = x.to_vec();
            let stats = gmres.solve(&op, &b, &mut out)?;
            trace!("gmres: {} iterations, residual {:e}", stats.iterations, stats.final_residual);
            let outcome = if stats.converged {
                Ok(())
            } else {
                Err(SkError::SolverDivergence {
                    iterations: stats.iterations,
                    residual: stats.final_residual,
                })
            };
            system.last_stats = Some(stats);
            agree(disc.comm(), "iterative solve", outcome)?;
            Ok(out)
        }
    }
}
