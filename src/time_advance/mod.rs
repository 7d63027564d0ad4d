//! Time integration.
//!
//! [`Discretization`] bundles the state that depends on the active grid: the
//! distributed element set, the per-term operators and the unscaled source
//! and boundary parts. The advance functions borrow it, refresh whatever is
//! stale and leave the caller's solution untouched on failure.

use std::sync::Arc;

use log::debug;

use crate::adapt::{DistributedGrid, ElementSet};
use crate::basis::{WaveletTransform, project_hierarchical};
use crate::boundary::{UnscaledParts, project_separable};
use crate::coefficients::CoefficientCache;
use crate::config::Options;
use crate::error::{Result, SkError};
use crate::kronmult::KronOperator;
use crate::parallel::{Comm, agree};
use crate::pde::{PdeDescriptor, Separable};

pub mod explicit;
pub mod implicit;
pub mod simulation;

pub use explicit::{adaptive_explicit_advance, explicit_time_advance};
pub use implicit::{ImplicitOperator, ImplicitSystem, implicit_time_advance};
pub use simulation::{AdvanceState, RunSummary, Simulation, SolutionError};

/// Grid-dependent state of a run.
#[derive(Clone)]
pub struct Discretization {
    transform: WaveletTransform,
    grid: DistributedGrid,
    cache: CoefficientCache,
    parts: UnscaledParts,
    parts_revision: u64,
    workspace_bytes: usize,
}

impl std::fmt::Debug for Discretization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discretization")
            .field("grid", &self.grid)
            .field("levels", &self.cache.levels())
            .field("workspace_bytes", &self.workspace_bytes)
            .finish_non_exhaustive()
    }
}

impl Discretization {
    /// Initial grid from the dimensions' levels, operators at `t = 0`.
    pub fn new(pde: &PdeDescriptor, options: &Options, comm: Arc<dyn Comm>) -> Result<Self> {
        let levels: Vec<usize> = pde.dimensions().iter().map(|d| d.level).collect();
        if let Some(dim) = pde.dimensions().iter().find(|d| d.level > options.max_level) {
            return Err(SkError::Config(format!(
                "dimension '{}' starts at level {} above max_level {}",
                dim.name, dim.level, options.max_level
            )));
        }
        let elements =
            if options.full_grid { ElementSet::full(&levels) } else { ElementSet::sparse(&levels) };
        let grid = DistributedGrid::new(elements, pde.degree(), comm);
        let transform = WaveletTransform::new(pde.degree());
        let cache = CoefficientCache::build(pde, &transform, &grid.elements().max_levels(), 0.0)?;
        let parts = UnscaledParts::build(pde, &cache, &transform, grid.elements())?;
        let parts_revision = grid.revision();
        Ok(Self {
            transform,
            grid,
            cache,
            parts,
            parts_revision,
            workspace_bytes: options.workspace_bytes(),
        })
    }

    pub fn grid(&self) -> &DistributedGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut DistributedGrid {
        &mut self.grid
    }

    pub fn cache(&self) -> &CoefficientCache {
        &self.cache
    }

    pub fn parts(&self) -> &UnscaledParts {
        &self.parts
    }

    pub fn comm(&self) -> &dyn Comm {
        self.grid.comm()
    }

    /// Reassemble operators and parts that no longer match the grid or `time`.
    /// Returns whether anything was rebuilt.
    pub fn refresh(&mut self, pde: &PdeDescriptor, time: f64) -> Result<bool> {
        let levels = self.grid.elements().max_levels();
        let ops_changed = self.cache.update(pde, &self.transform, &levels, time)?;
        let grid_changed = self.parts_revision != self.grid.revision();
        if ops_changed || grid_changed {
            self.parts = UnscaledParts::build(pde, &self.cache, &self.transform, self.grid.elements())?;
            self.parts_revision = self.grid.revision();
            debug!("refreshed discretization at t = {time} (levels {levels:?})");
        }
        Ok(ops_changed || grid_changed)
    }

    /// Operator over the owned rows, checked against the workspace budget on
    /// every worker.
    pub fn operator(&self) -> Result<KronOperator<'_>> {
        let op = KronOperator::new(
            &self.cache,
            self.grid.elements(),
            self.grid.local_range(),
            self.workspace_bytes,
        );
        agree(self.comm(), "kronmult setup", op)
    }

    /// `A x` over the whole group.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>> {
        let op = self.operator()?;
        Ok(self.grid.exchange(&op.apply_local(x)))
    }

    /// `A x + sources(t) + boundaries(t)`.
    pub fn rhs(&self, x: &[f64], t: f64) -> Result<Vec<f64>> {
        let mut y = self.apply(x)?;
        let parts = self.parts.scaled(t, y.len());
        y.iter_mut().zip(&parts).for_each(|(a, b)| *a += b);
        Ok(y)
    }

    /// Element vector of a separable function at time `t`, time factor included.
    pub fn project(&self, pde: &PdeDescriptor, f: &Separable, t: f64) -> Result<Vec<f64>> {
        let v = project_separable(pde, &self.cache, &self.transform, self.grid.elements(), f, t)?;
        let s = (f.time)(t);
        Ok(v.into_iter().map(|c| c * s).collect())
    }

    /// Projection of the dimensions' initial conditions.
    pub fn initial_condition(&self, pde: &PdeDescriptor) -> Result<Vec<f64>> {
        let per_dim = pde
            .dimensions()
            .iter()
            .enumerate()
            .map(|(d, dim)| {
                let ic = &dim.initial_condition;
                project_hierarchical(self.cache.basis(), &self.transform, dim, self.cache.levels()[d], |x| {
                    ic(x, 0.0)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.grid.elements().combine(&per_dim, pde.degree()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;
    use crate::pde::catalog::continuity_1d;

    #[test]
    fn initial_condition_matches_exact_solution_at_zero() {
        let pde = continuity_1d(Some(3), Some(2)).unwrap();
        let disc = Discretization::new(&pde, &Options::default(), Arc::new(SerialComm)).unwrap();
        let x0 = disc.initial_condition(&pde).unwrap();
        let exact = disc.project(&pde, pde.exact_solution().unwrap(), 0.0).unwrap();
        assert_eq!(x0.len(), 16);
        for (a, b) in x0.iter().zip(&exact) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-13);
        }
    }

    #[test]
    fn levels_above_the_cap_are_rejected() {
        let pde = continuity_1d(Some(5), None).unwrap();
        let options = Options::default().with_max_level(4);
        let err = Discretization::new(&pde, &options, Arc::new(SerialComm)).unwrap_err();
        assert!(matches!(err, SkError::Config(_)));
    }
}
