//! The validated PDE value object.

use std::ops::Index;
use std::sync::Arc;

use log::warn;

use super::{Dimension, DtFn, ExactSolution, Source, Term};
use crate::error::{Result, SkError};

/// Counts and flags a PDE instance declares up front.
///
/// The supplied collections are checked against these at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub num_dims: usize,
    pub num_terms: usize,
    pub num_sources: usize,
    pub do_poisson_solve: bool,
    pub has_analytic_soln: bool,
}

/// Terms indexed by `(group, dimension)`, stored flat.
#[derive(Clone, Debug)]
pub struct TermSet {
    num_dims: usize,
    terms: Vec<Term>,
}

impl TermSet {
    fn new(groups: Vec<Vec<Term>>, num_dims: usize) -> Result<Self> {
        let mut terms = Vec::with_capacity(groups.len() * num_dims);
        for (g, group) in groups.into_iter().enumerate() {
            if group.len() != num_dims {
                return Err(SkError::Config(format!(
                    "term group {g} has {} terms, expected one per dimension ({num_dims})",
                    group.len()
                )));
            }
            for (d, term) in group.into_iter().enumerate() {
                if term.dimension != d {
                    return Err(SkError::Config(format!(
                        "term '{}' in group {g}, slot {d} claims dimension {}",
                        term.name, term.dimension
                    )));
                }
                if term.kind.is_flux_type() && term.flux.is_none() {
                    return Err(SkError::Config(format!(
                        "flux-type term '{}' has no flux policy",
                        term.name
                    )));
                }
                if !term.kind.is_flux_type() && term.flux.is_some() {
                    warn!("term '{}' is not flux-type; its flux policy is ignored", term.name);
                }
                if term.data.iter().any(|v| !v.is_finite()) {
                    return Err(SkError::Config(format!(
                        "term '{}' carries non-finite data",
                        term.name
                    )));
                }
                terms.push(term);
            }
        }
        Ok(Self { num_dims, terms })
    }

    pub fn num_groups(&self) -> usize {
        if self.num_dims == 0 { 0 } else { self.terms.len() / self.num_dims }
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    pub fn get(&self, group: usize, dim: usize) -> Option<&Term> {
        if dim >= self.num_dims || group >= self.num_groups() {
            return None;
        }
        self.terms.get(group * self.num_dims + dim)
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &Term)> {
        let n = self.num_dims;
        self.terms.iter().enumerate().map(move |(k, t)| ((k / n, k % n), t))
    }
}

impl Index<(usize, usize)> for TermSet {
    type Output = Term;

    fn index(&self, (group, dim): (usize, usize)) -> &Term {
        self.get(group, dim)
            .unwrap_or_else(|| panic!("term index ({group}, {dim}) out of bounds"))
    }
}

/// Immutable PDE description shared by reference through the engine.
#[derive(Clone)]
pub struct PdeDescriptor {
    declaration: Declaration,
    dimensions: Vec<Dimension>,
    terms: TermSet,
    sources: Vec<Source>,
    exact: Option<ExactSolution>,
    dt: DtFn,
}

impl PdeDescriptor {
    /// Validate the supplied collections against `declaration` and build the descriptor.
    pub fn new(
        declaration: Declaration,
        dimensions: Vec<Dimension>,
        terms: Vec<Vec<Term>>,
        sources: Vec<Source>,
        exact: Option<ExactSolution>,
        dt: impl Fn(&Dimension) -> f64 + Send + Sync + 'static,
    ) -> Result<Self> {
        let Declaration { num_dims, num_terms, num_sources, has_analytic_soln, .. } = declaration;
        if num_dims == 0 {
            return Err(SkError::Config("a PDE needs at least one dimension".into()));
        }
        if dimensions.len() != num_dims {
            return Err(SkError::Config(format!(
                "declared {num_dims} dimensions, supplied {}",
                dimensions.len()
            )));
        }
        if terms.len() != num_terms {
            return Err(SkError::Config(format!(
                "declared {num_terms} terms, supplied {}",
                terms.len()
            )));
        }
        if sources.len() != num_sources {
            return Err(SkError::Config(format!(
                "declared {num_sources} sources, supplied {}",
                sources.len()
            )));
        }
        for dim in &dimensions {
            dim.validate(num_dims)?;
        }
        let degree = dimensions[0].degree;
        if dimensions.iter().any(|d| d.degree != degree) {
            return Err(SkError::Config("all dimensions must share one degree".into()));
        }
        for (i, source) in sources.iter().enumerate() {
            if source.num_dims() != num_dims {
                return Err(SkError::Config(format!(
                    "source {i} has {} spatial factors, expected {num_dims}",
                    source.num_dims()
                )));
            }
        }
        if has_analytic_soln != exact.is_some() {
            return Err(SkError::Config(
                "analytic solution flag disagrees with the supplied exact solution".into(),
            ));
        }
        if let Some(exact) = &exact {
            if exact.num_dims() != num_dims {
                return Err(SkError::Config(format!(
                    "exact solution has {} spatial factors, expected {num_dims}",
                    exact.num_dims()
                )));
            }
        }
        let terms = TermSet::new(terms, num_dims)?;
        Ok(Self { declaration, dimensions, terms, sources, exact, dt: Arc::new(dt) })
    }

    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    pub fn num_dims(&self) -> usize {
        self.declaration.num_dims
    }

    pub fn num_terms(&self) -> usize {
        self.declaration.num_terms
    }

    pub fn num_sources(&self) -> usize {
        self.declaration.num_sources
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn terms(&self) -> &TermSet {
        &self.terms
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn exact_solution(&self) -> Option<&ExactSolution> {
        self.exact.as_ref()
    }

    pub fn do_poisson_solve(&self) -> bool {
        self.declaration.do_poisson_solve
    }

    pub fn has_analytic_soln(&self) -> bool {
        self.declaration.has_analytic_soln
    }

    /// Basis functions per element per dimension.
    pub fn degree(&self) -> usize {
        self.dimensions[0].degree
    }

    /// Stable timestep for `dim`, before CFL scaling.
    pub fn get_dt(&self, dim: &Dimension) -> f64 {
        (self.dt)(dim)
    }

    pub fn has_time_dependent_terms(&self) -> bool {
        self.terms.iter().any(|(_, t)| t.time_dependent)
    }
}

impl std::fmt::Debug for PdeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdeDescriptor")
            .field("declaration", &self.declaration)
            .field("dimensions", &self.dimensions)
            .field("terms", &self.terms)
            .field("num_sources", &self.sources.len())
            .finish()
    }
}
