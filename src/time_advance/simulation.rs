//! The run driver.
//!
//! A [`Simulation`] owns the PDE, the options, the discretization and the
//! solution, and moves through
//! `Idle → AssembleIfStale → StepCompute → [Solve | AdaptCheck] → Idle`
//! once per step. A failed step returns its error and leaves the solution,
//! time and grid as they were before the step.

use std::sync::Arc;

use log::{Level, info, log_enabled, trace, warn};

use super::{
    Discretization, ImplicitSystem, adaptive_explicit_advance, explicit_time_advance,
    implicit_time_advance,
};
use crate::adapt::{AdaptStats, DistributedGrid};
use crate::config::{Options, TimeMethod};
use crate::error::{Result, SkError};
use crate::parallel::{Comm, SerialComm};
use crate::pde::PdeDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceState {
    Idle,
    AssembleIfStale,
    StepCompute,
    Solve,
    AdaptCheck,
    Finished,
}

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub final_time: f64,
    pub elements: usize,
    pub dof: usize,
    pub refinements: usize,
    pub coarsenings: usize,
    pub limit_hits: usize,
}

/// Discrete L2 distance to the analytic solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionError {
    pub absolute: f64,
    pub relative: f64,
}

/// What the cached implicit system was built for.
#[derive(Debug, Clone, PartialEq)]
struct SystemKey {
    revision: u64,
    levels: Vec<usize>,
    dt: f64,
}

pub struct Simulation {
    pde: PdeDescriptor,
    options: Options,
    disc: Discretization,
    system: ImplicitSystem,
    system_key: Option<SystemKey>,
    x: Vec<f64>,
    time: f64,
    dt: f64,
    steps: usize,
    state: AdvanceState,
}

impl Simulation {
    pub fn new(pde: PdeDescriptor, options: Options, comm: Arc<dyn Comm>) -> Result<Self> {
        options.validate()?;
        if pde.do_poisson_solve() {
            return Err(SkError::Config(
                "coupled Poisson solves are not supported by this engine".into(),
            ));
        }
        let dt = match options.dt {
            Some(dt) => dt,
            None => {
                pde.dimensions().iter().map(|d| pde.get_dt(d)).fold(f64::INFINITY, f64::min)
                    * options.cfl
            }
        };
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SkError::Config(format!("timestep must be positive and finite, got {dt}")));
        }
        let disc = Discretization::new(&pde, &options, comm)?;
        let x = disc.initial_condition(&pde)?;
        info!(
            "sparsekron: {} dims, degree {}, {} elements ({} dof) on {} workers, dt = {dt:e}",
            pde.num_dims(),
            pde.degree(),
            disc.grid().elements().len(),
            x.len(),
            disc.comm().size()
        );
        Ok(Self {
            pde,
            options,
            disc,
            system: ImplicitSystem::new(),
            system_key: None,
            x,
            time: 0.0,
            dt,
            steps: 0,
            state: AdvanceState::Idle,
        })
    }

    /// Single-worker simulation.
    pub fn serial(pde: PdeDescriptor, options: Options) -> Result<Self> {
        Self::new(pde, options, Arc::new(SerialComm))
    }

    pub fn pde(&self) -> &PdeDescriptor {
        &self.pde
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn solution(&self) -> &[f64] {
        &self.x
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Change the timestep, e.g. to retry a failed implicit step.
    pub fn set_dt(&mut self, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SkError::Config(format!("timestep must be positive and finite, got {dt}")));
        }
        self.dt = dt;
        Ok(())
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn state(&self) -> AdvanceState {
        self.state
    }

    pub fn grid(&self) -> &DistributedGrid {
        self.disc.grid()
    }

    pub fn discretization(&self) -> &Discretization {
        &self.disc
    }

    pub fn adapt_stats(&self) -> AdaptStats {
        self.disc.grid().stats()
    }

    pub fn implicit_system(&self) -> &ImplicitSystem {
        &self.system
    }

    fn transition(&mut self, next: AdvanceState) {
        trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn system_key(&self, dt: f64) -> SystemKey {
        SystemKey {
            revision: self.disc.grid().revision(),
            levels: self.disc.cache().levels().to_vec(),
            dt,
        }
    }

    /// Whether the implicit system must be rebuilt for a step of `dt`.
    fn system_is_stale(&self, dt: f64) -> bool {
        self.pde.has_time_dependent_terms() || self.system_key.as_ref() != Some(&self.system_key(dt))
    }

    /// Advance one step, rebuilding the implicit system only when stale.
    pub fn advance(&mut self) -> Result<()> {
        let update = self.system_is_stale(self.dt);
        self.step(update)
    }

    /// Advance one step with an explicit `update_system` choice (implicit
    /// stepping only; explicit steps ignore it).
    pub fn step(&mut self, update_system: bool) -> Result<()> {
        self.step_with(self.dt, update_system)
    }

    fn step_with(&mut self, dt: f64, update_system: bool) -> Result<()> {
        let result = self.try_step(dt, update_system);
        if result.is_err() {
            self.transition(AdvanceState::Idle);
        }
        result
    }

    fn try_step(&mut self, dt: f64, update_system: bool) -> Result<()> {
        self.transition(AdvanceState::AssembleIfStale);
        self.disc.refresh(&self.pde, self.time)?;

        self.transition(AdvanceState::StepCompute);
        let next = match self.options.time_method {
            TimeMethod::Explicit if self.options.adapt => {
                let snapshot = self.disc.clone();
                let stepped = adaptive_explicit_advance(
                    &self.pde,
                    &mut self.disc,
                    &self.options,
                    &self.x,
                    self.time,
                    dt,
                );
                match stepped {
                    Ok(y) => {
                        self.transition(AdvanceState::AdaptCheck);
                        y
                    }
                    Err(e) => {
                        self.disc = snapshot;
                        return Err(e);
                    }
                }
            }
            TimeMethod::Explicit => {
                explicit_time_advance(&self.pde, &mut self.disc, &self.x, self.time, dt)?
            }
            TimeMethod::Implicit => {
                self.transition(AdvanceState::Solve);
                let y = implicit_time_advance(
                    &self.pde,
                    &mut self.disc,
                    &mut self.system,
                    &self.options,
                    &self.x,
                    self.time,
                    dt,
                    update_system,
                );
                match y {
                    Ok(y) => {
                        if update_system {
                            self.system_key = Some(self.system_key(dt));
                        }
                        y
                    }
                    Err(e) => {
                        self.system.invalidate();
                        self.system_key = None;
                        return Err(e);
                    }
                }
            }
        };

        self.x = next;
        self.time += dt;
        self.steps += 1;
        self.transition(AdvanceState::Idle);
        info!(
            "step {}: t = {:.6}, dt = {dt:e}, {} dof",
            self.steps,
            self.time,
            self.x.len()
        );
        // committed; diagnostics past this point are best effort
        if log_enabled!(Level::Info) {
            match self.solution_error() {
                Ok(Some(err)) => info!(
                    "step {}: error vs analytic solution {:e} (relative {:e})",
                    self.steps, err.absolute, err.relative
                ),
                Ok(None) => {}
                Err(e) => warn!("step {}: analytic error unavailable: {e}", self.steps),
            }
        }
        Ok(())
    }

    /// Step until `end_time` or `max_steps` steps; the last step is shortened
    /// to land on `end_time`.
    pub fn run(&mut self, end_time: f64, max_steps: usize) -> Result<RunSummary> {
        let eps = 1e-12 * end_time.abs().max(1.0);
        let mut taken = 0;
        while taken < max_steps && self.time < end_time - eps {
            let dt = self.dt.min(end_time - self.time);
            let update = self.system_is_stale(dt);
            self.step_with(dt, update)?;
            taken += 1;
        }
        self.transition(AdvanceState::Finished);
        let stats = self.adapt_stats();
        let summary = RunSummary {
            steps: taken,
            final_time: self.time,
            elements: self.disc.grid().elements().len(),
            dof: self.x.len(),
            refinements: stats.refinements,
            coarsenings: stats.coarsenings,
            limit_hits: stats.limit_hits,
        };
        info!("run finished: {summary:?}");
        Ok(summary)
    }

    /// Projection of the analytic solution at the current time, if known.
    pub fn exact_solution(&self) -> Result<Option<Vec<f64>>> {
        self.pde
            .exact_solution()
            .map(|exact| self.disc.project(&self.pde, exact, self.time))
            .transpose()
    }

    /// Distance between the solution and the projected analytic solution.
    ///
    /// The hierarchical basis is orthonormal, so the coefficient-space norm
    /// equals the L2 norm of the represented functions.
    pub fn solution_error(&self) -> Result<Option<SolutionError>> {
        let Some(exact) = self.exact_solution()? else { return Ok(None) };
        let absolute =
            self.x.iter().zip(&exact).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
        let norm = exact.iter().map(|v| v * v).sum::<f64>().sqrt();
        let relative = if norm > 0.0 { absolute / norm } else { absolute };
        Ok(Some(SolutionError { absolute, relative }))
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("time", &self.time)
            .field("dt", &self.dt)
            .field("steps", &self.steps)
            .field("state", &self.state)
            .field("dof", &self.x.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pde::catalog::continuity_1d;
    use crate::pde::{Declaration, Dimension, FluxPolicy, Term};

    #[test]
    fn poisson_coupling_is_rejected() {
        let pde = PdeDescriptor::new(
            Declaration {
                num_dims: 1,
                num_terms: 1,
                num_sources: 0,
                do_poisson_solve: true,
                has_analytic_soln: false,
            },
            vec![Dimension::new("x", 0.0, 1.0, 2, 2, |_, _| 1.0)],
            vec![vec![Term::grad("adv", 0, |_, _| 1.0, FluxPolicy::Upwind)]],
            vec![],
            None,
            |d| d.cell_width(d.level),
        )
        .unwrap();
        let err = Simulation::serial(pde, Options::default()).unwrap_err();
        assert!(matches!(err, SkError::Config(_)));
    }

    #[test]
    fn run_lands_on_end_time() {
        let pde = continuity_1d(Some(3), Some(2)).unwrap();
        let mut sim = Simulation::serial(pde, Options::default().with_dt(0.03)).unwrap();
        let summary = sim.run(0.1, 100).unwrap();
        assert_eq!(summary.steps, 4);
        approx::assert_abs_diff_eq!(summary.final_time, 0.1, epsilon = 1e-12);
        assert_eq!(sim.state(), AdvanceState::Finished);
    }

    #[test]
    fn step_budget_stops_the_run() {
        let pde = continuity_1d(Some(3), Some(2)).unwrap();
        let mut sim = Simulation::serial(pde, Options::default()).unwrap();
        let summary = sim.run(10.0, 3).unwrap();
        assert_eq!(summary.steps, 3);
        assert!(summary.final_time < 10.0);
    }
}
