//! Unscaled right-hand-side parts: sources and prescribed boundary values.
//!
//! Every part is a separable spatial vector over the active elements and a
//! scalar time factor. The vectors are built once per grid and operator
//! levels; each step only evaluates the time factors and sums.

use log::debug;

use crate::adapt::ElementSet;
use crate::basis::{BasisTransform, CellBasis, project_hierarchical};
use crate::coefficients::CoefficientCache;
use crate::error::Result;
use crate::pde::{BoundaryValue, Dimension, PdeDescriptor, ScalarFn, Separable, TimeFn};

/// A spatial vector and the time factor that scales it.
#[derive(Clone)]
pub struct UnscaledPart {
    pub vector: Vec<f64>,
    pub time: TimeFn,
}

impl std::fmt::Debug for UnscaledPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnscaledPart").field("len", &self.vector.len()).finish_non_exhaustive()
    }
}

/// Hierarchical projection of one spatial factor, evaluated at `t`.
pub fn project_factor(
    basis: &CellBasis,
    transform: &impl BasisTransform,
    dim: &Dimension,
    level: usize,
    factor: &ScalarFn,
    t: f64,
) -> Result<Vec<f64>> {
    project_hierarchical(basis, transform, dim, level, |x| factor(x, t))
}

/// Element vector of the separable function `f` with spatial factors at `t`
/// (its time factor is not applied).
pub fn project_separable(
    pde: &PdeDescriptor,
    cache: &CoefficientCache,
    transform: &impl BasisTransform,
    elements: &ElementSet,
    f: &Separable,
    t: f64,
) -> Result<Vec<f64>> {
    let per_dim = pde
        .dimensions()
        .iter()
        .zip(&f.spatial)
        .enumerate()
        .map(|(d, (dim, s))| project_factor(cache.basis(), transform, dim, cache.levels()[d], s, t))
        .collect::<Result<Vec<_>>>()?;
    Ok(elements.combine(&per_dim, pde.degree()))
}

fn matvec(m: &faer::Mat<f64>, x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0; m.nrows()];
    crate::core::traits::MatVec::matvec(m, &x.to_vec(), &mut y);
    y
}

#[derive(Debug, Clone, Default)]
pub struct UnscaledParts {
    pub sources: Vec<UnscaledPart>,
    pub boundaries: Vec<UnscaledPart>,
}

impl UnscaledParts {
    pub fn build(
        pde: &PdeDescriptor,
        cache: &CoefficientCache,
        transform: &impl BasisTransform,
        elements: &ElementSet,
    ) -> Result<Self> {
        let sources = pde
            .sources()
            .iter()
            .map(|s| {
                Ok(UnscaledPart {
                    vector: project_separable(pde, cache, transform, elements, s, 0.0)?,
                    time: s.time.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut boundaries = Vec::new();
        for t in 0..cache.num_groups() {
            for (d, dim) in pde.dimensions().iter().enumerate() {
                if dim.is_periodic() {
                    continue;
                }
                let sides: [(&Option<BoundaryValue>, f64, bool); 2] = [
                    (&dim.left.value, dim.domain_min, true),
                    (&dim.right.value, dim.domain_max, false),
                ];
                for (value, edge, left) in sides {
                    let Some(value) = value else { continue };
                    boundaries.push(Self::boundary_part(
                        pde, cache, transform, elements, t, d, value, edge, left,
                    )?);
                }
            }
        }
        debug!(
            "built {} source and {} boundary parts over {} elements",
            sources.len(),
            boundaries.len(),
            elements.len()
        );
        Ok(Self { sources, boundaries })
    }

    /// Term group `t` acting on the boundary value of dimension `d`: the
    /// boundary vector of `A_{t,d}` scaled by the value at the edge, and
    /// `A_{t,e}` applied to the projected factor in every other dimension.
    #[allow(clippy::too_many_arguments)]
    fn boundary_part(
        pde: &PdeDescriptor,
        cache: &CoefficientCache,
        transform: &impl BasisTransform,
        elements: &ElementSet,
        t: usize,
        d: usize,
        value: &BoundaryValue,
        edge: f64,
        left: bool,
    ) -> Result<UnscaledPart> {
        let mut per_dim = Vec::with_capacity(pde.num_dims());
        for (e, dim) in pde.dimensions().iter().enumerate() {
            let op = cache.get(t, e);
            let v = if e == d {
                let bc = if left { &op.left_bc } else { &op.right_bc };
                let scale = (value.spatial[e])(edge, 0.0);
                bc.iter().map(|b| b * scale).collect()
            } else {
                let proj =
                    project_factor(cache.basis(), transform, dim, cache.levels()[e], &value.spatial[e], 0.0)?;
                matvec(&op.matrix, &proj)
            };
            per_dim.push(v);
        }
        Ok(UnscaledPart { vector: elements.combine(&per_dim, pde.degree()), time: value.time.clone() })
    }

    /// `Σ sources·T(t) + Σ boundaries·T(t)`, accumulated in a fixed order.
    pub fn scaled(&self, t: f64, len: usize) -> Vec<f64> {
        let mut out = vec![0.0; len];
        for part in self.sources.iter().chain(&self.boundaries) {
            let s = (part.time)(t);
            out.iter_mut().zip(&part.vector).for_each(|(o, v)| *o += s * v);
        }
        out
    }
}
