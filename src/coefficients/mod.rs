//! Operator assembly: one square matrix per (term, dimension).
//!
//! Each term is discretized along its owning dimension in the per-cell
//! Legendre basis (discontinuous Galerkin) and then moved to the hierarchical
//! basis. The result is a `(2^level · degree)`-square matrix together with
//! the boundary vectors a unit prescribed value would contribute on either
//! edge. Assembly is a pure function of the dimension, the term, the level and
//! (for time-dependent terms) the time.
//!
//! - `Mass`: `∫ g φ_p φ_q`, block diagonal.
//! - `Grad`: weak form of `∂x(g f)`: `-∫ g f φ_p'` plus interface fluxes
//!   resolved by the term's [`FluxPolicy`](crate::pde::FluxPolicy).
//! - `Diffusion`: `∂x(g ∂x f)` as the product of a right-biased gradient and a
//!   left-biased, `g`-weighted divergence (local discontinuous Galerkin).
//!
//! Periodic edges wrap to the opposite interface. Dirichlet edges weight the
//! exterior trace by the prescribed value (for diffusion the value of `f` is
//! prescribed outright); neumann edges take the interior trace (for diffusion
//! the flux is prescribed outright).

use faer::Mat;
use log::debug;

use crate::basis::{BasisTransform, CellBasis};
use crate::error::{Result, SkError};
use crate::pde::{BoundaryKind, Dimension, OperatorKind, PdeDescriptor, Term};

/// A discretized term along one dimension.
#[derive(Debug, Clone)]
pub struct Operator1d {
    pub matrix: Mat<f64>,
    /// Contribution of a unit prescribed value on the left edge.
    pub left_bc: Vec<f64>,
    /// Contribution of a unit prescribed value on the right edge.
    pub right_bc: Vec<f64>,
}

impl Operator1d {
    fn zeros(n: usize) -> Self {
        Self { matrix: Mat::zeros(n, n), left_bc: vec![0.0; n], right_bc: vec![0.0; n] }
    }

    pub fn size(&self) -> usize {
        self.matrix.nrows()
    }

    /// Same operator in the hierarchical basis.
    pub fn to_hierarchical(&self, transform: &impl BasisTransform, level: usize) -> Self {
        Self {
            matrix: transform.operator_to_hierarchical(level, &self.matrix),
            left_bc: transform.to_hierarchical(level, &self.left_bc),
            right_bc: transform.to_hierarchical(level, &self.right_bc),
        }
    }

    /// `self ∘ inner`, with boundary vectors `self·bc_inner + bc_self`.
    fn compose(&self, inner: &Operator1d) -> Self {
        let n = self.size();
        let apply = |v: &[f64], own: &[f64]| -> Vec<f64> {
            (0..n)
                .map(|i| own[i] + (0..n).map(|j| self.matrix[(i, j)] * v[j]).sum::<f64>())
                .collect()
        };
        Self {
            matrix: &self.matrix * &inner.matrix,
            left_bc: apply(&inner.left_bc, &self.left_bc),
            right_bc: apply(&inner.right_bc, &self.right_bc),
        }
    }
}

/// How an edge interface resolves its trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeRule {
    /// Use the interior trace only.
    Interior,
    /// Interior trace and prescribed value, weighted like an interior interface.
    Weighted,
    /// Use the prescribed value only.
    Prescribed,
}

fn finite(dim: &Dimension, term_name: &str, x: f64, v: f64) -> Result<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SkError::Assembly(format!(
            "coefficient of term '{term_name}' is not finite at {} = {x}",
            dim.name
        )))
    }
}

/// `g` at the Gauss points of every cell.
fn sample_cells(
    basis: &CellBasis,
    dim: &Dimension,
    term_name: &str,
    level: usize,
    g: &dyn Fn(f64) -> f64,
) -> Result<Vec<Vec<f64>>> {
    let h = dim.cell_width(level);
    (0..1usize << level)
        .map(|c| {
            let a = dim.domain_min + c as f64 * h;
            basis
                .points
                .iter()
                .map(|&xi| {
                    let x = CellBasis::map(a, h, xi);
                    finite(dim, term_name, x, g(x))
                })
                .collect()
        })
        .collect()
}

/// `g` at the `2^level + 1` cell interfaces, edges included. Only flux-type
/// kinds read these.
fn sample_faces(
    dim: &Dimension,
    term_name: &str,
    level: usize,
    g: &dyn Fn(f64) -> f64,
) -> Result<Vec<f64>> {
    let h = dim.cell_width(level);
    (0..=1usize << level)
        .map(|i| {
            let x = dim.domain_min + i as f64 * h;
            finite(dim, term_name, x, g(x))
        })
        .collect()
}

fn mass_operator(basis: &CellBasis, level: usize, g_cells: &[Vec<f64>]) -> Operator1d {
    let k = basis.degree;
    let n = 1usize << level;
    let mut op = Operator1d::zeros(n * k);
    for c in 0..n {
        for (q, &w) in basis.weights.iter().enumerate() {
            let gw = 0.5 * w * g_cells[c][q];
            let v = &basis.values[q];
            for p in 0..k {
                for r in 0..k {
                    op.matrix[(c * k + p, c * k + r)] += gw * v[p] * v[r];
                }
            }
        }
    }
    op
}

/// DG discretization of `∂x(g f)` with interface weights `weights(g)` and the
/// given edge rules.
fn flux_operator(
    basis: &CellBasis,
    dim: &Dimension,
    level: usize,
    g_cells: &[Vec<f64>],
    g_faces: &[f64],
    weights: &dyn Fn(f64) -> (f64, f64),
    edge_rule: &dyn Fn(BoundaryKind) -> EdgeRule,
) -> Operator1d {
    let k = basis.degree;
    let n = 1usize << level;
    let h = dim.cell_width(level);
    let inv_sqrt_h = 1.0 / h.sqrt();
    let lt: Vec<f64> = basis.left.iter().map(|v| v * inv_sqrt_h).collect();
    let rt: Vec<f64> = basis.right.iter().map(|v| v * inv_sqrt_h).collect();
    let mut op = Operator1d::zeros(n * k);

    // volume: -∫ g f φ_p'
    for c in 0..n {
        for (q, &w) in basis.weights.iter().enumerate() {
            let gw = w * g_cells[c][q] / h;
            let v = &basis.values[q];
            let dv = &basis.derivatives[q];
            for p in 0..k {
                for r in 0..k {
                    op.matrix[(c * k + p, c * k + r)] -= gw * v[r] * dv[p];
                }
            }
        }
    }

    // interior interfaces; the periodic wrap joins cell n-1 to cell 0 at x_min
    let mut couple = |a: usize, b: usize, g: f64| {
        let (wl, wr) = weights(g);
        for p in 0..k {
            for r in 0..k {
                op.matrix[(a * k + p, a * k + r)] += rt[p] * g * wl * rt[r];
                op.matrix[(a * k + p, b * k + r)] += rt[p] * g * wr * lt[r];
                op.matrix[(b * k + p, a * k + r)] -= lt[p] * g * wl * rt[r];
                op.matrix[(b * k + p, b * k + r)] -= lt[p] * g * wr * lt[r];
            }
        }
    };
    for i in 1..n {
        couple(i - 1, i, g_faces[i]);
    }
    if dim.is_periodic() {
        couple(n - 1, 0, g_faces[0]);
        return op;
    }

    // left edge: the interior is the right side of the interface
    let g = g_faces[0];
    let (wl, wr) = weights(g);
    let (m_w, bc_w) = match edge_rule(dim.left.kind) {
        EdgeRule::Interior => (1.0, 0.0),
        EdgeRule::Weighted => (wr, wl),
        EdgeRule::Prescribed => (0.0, 1.0),
    };
    for p in 0..k {
        for r in 0..k {
            op.matrix[(p, r)] -= lt[p] * g * m_w * lt[r];
        }
        op.left_bc[p] -= lt[p] * g * bc_w;
    }

    // right edge: the interior is the left side of the interface
    let g = g_faces[n];
    let (wl, wr) = weights(g);
    let (m_w, bc_w) = match edge_rule(dim.right.kind) {
        EdgeRule::Interior => (1.0, 0.0),
        EdgeRule::Weighted => (wl, wr),
        EdgeRule::Prescribed => (0.0, 1.0),
    };
    let last = (n - 1) * k;
    for p in 0..k {
        for r in 0..k {
            op.matrix[(last + p, last + r)] += rt[p] * g * m_w * rt[r];
        }
        op.right_bc[last + p] += rt[p] * g * bc_w;
    }
    op
}

/// Assemble `term` along `dim` at `level` in the cell basis.
pub fn assemble_cells(
    basis: &CellBasis,
    dim: &Dimension,
    term: &Term,
    level: usize,
    time: f64,
) -> Result<Operator1d> {
    let g = |x: f64| term.coefficient_at(dim, x, time);
    let g_cells = sample_cells(basis, dim, &term.name, level, &g)?;
    let op = match term.kind {
        OperatorKind::Mass => mass_operator(basis, level, &g_cells),
        OperatorKind::Grad => {
            let g_faces = sample_faces(dim, &term.name, level, &g)?;
            let flux = term.flux.ok_or_else(|| {
                SkError::Config(format!("flux-type term '{}' has no flux policy", term.name))
            })?;
            flux_operator(
                basis,
                dim,
                level,
                &g_cells,
                &g_faces,
                &|g: f64| flux.trace_weights(g.signum()),
                &|kind| match kind {
                    BoundaryKind::Dirichlet => EdgeRule::Weighted,
                    _ => EdgeRule::Interior,
                },
            )
        }
        OperatorKind::Diffusion => {
            let g_faces = sample_faces(dim, &term.name, level, &g)?;
            let n = 1usize << level;
            let ones_cells = vec![vec![1.0; basis.weights.len()]; n];
            let ones_faces = vec![1.0; n + 1];
            let gradient = flux_operator(
                basis,
                dim,
                level,
                &ones_cells,
                &ones_faces,
                &|_| (0.0, 1.0),
                &|kind| match kind {
                    BoundaryKind::Dirichlet => EdgeRule::Prescribed,
                    _ => EdgeRule::Interior,
                },
            );
            let divergence = flux_operator(
                basis,
                dim,
                level,
                &g_cells,
                &g_faces,
                &|_| (1.0, 0.0),
                &|kind| match kind {
                    BoundaryKind::Neumann => EdgeRule::Prescribed,
                    _ => EdgeRule::Interior,
                },
            );
            divergence.compose(&gradient)
        }
    };
    Ok(op)
}

/// Hierarchical-basis operators for every (term group, dimension).
///
/// Rebuilt when the per-dimension levels change; time-dependent terms are
/// additionally rebuilt whenever the time moves.
#[derive(Debug, Clone)]
pub struct CoefficientCache {
    levels: Vec<usize>,
    time: f64,
    num_dims: usize,
    basis: CellBasis,
    operators: Vec<Operator1d>,
}

impl CoefficientCache {
    pub fn build(
        pde: &PdeDescriptor,
        transform: &impl BasisTransform,
        levels: &[usize],
        time: f64,
    ) -> Result<Self> {
        let basis = CellBasis::new(pde.degree());
        let mut operators = Vec::with_capacity(pde.num_terms() * pde.num_dims());
        for (_, term) in pde.terms().iter() {
            operators.push(Self::assemble(pde, transform, &basis, term, levels, time)?);
        }
        debug!("assembled {} term operators at levels {:?}", operators.len(), levels);
        Ok(Self { levels: levels.to_vec(), time, num_dims: pde.num_dims(), basis, operators })
    }

    fn assemble(
        pde: &PdeDescriptor,
        transform: &impl BasisTransform,
        basis: &CellBasis,
        term: &Term,
        levels: &[usize],
        time: f64,
    ) -> Result<Operator1d> {
        let d = term.dimension;
        let dim = &pde.dimensions()[d];
        let op = assemble_cells(basis, dim, term, levels[d], time)?;
        Ok(op.to_hierarchical(transform, levels[d]))
    }

    /// Whether [`update`](Self::update) would reassemble anything.
    pub fn is_stale(&self, pde: &PdeDescriptor, levels: &[usize], time: f64) -> bool {
        self.levels != levels || (pde.has_time_dependent_terms() && self.time != time)
    }

    /// Bring the cache up to date; returns whether any operator changed.
    pub fn update(
        &mut self,
        pde: &PdeDescriptor,
        transform: &impl BasisTransform,
        levels: &[usize],
        time: f64,
    ) -> Result<bool> {
        if !self.is_stale(pde, levels, time) {
            return Ok(false);
        }
        if self.levels != levels {
            *self = Self::build(pde, transform, levels, time)?;
            return Ok(true);
        }
        let mut rebuilt = self.operators.clone();
        for (k, (_, term)) in pde.terms().iter().enumerate() {
            if term.time_dependent {
                rebuilt[k] = Self::assemble(pde, transform, &self.basis, term, levels, time)?;
            }
        }
        self.operators = rebuilt;
        self.time = time;
        debug!("reassembled time-dependent operators at t = {time}");
        Ok(true)
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    pub fn num_groups(&self) -> usize {
        self.operators.len() / self.num_dims
    }

    pub fn basis(&self) -> &CellBasis {
        &self.basis
    }

    pub fn get(&self, group: usize, dim: usize) -> &Operator1d {
        &self.operators[group * self.num_dims + dim]
    }

    pub fn matrix(&self, group: usize, dim: usize) -> &Mat<f64> {
        &self.get(group, dim).matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pde::{Boundary, FluxPolicy};
    use approx::assert_abs_diff_eq;

    fn dim(left: Boundary, right: Boundary) -> Dimension {
        Dimension::new("x", -1.0, 1.0, 3, 2, |_, _| 0.0).with_boundaries(left, right)
    }

    fn matvec(m: &Mat<f64>, x: &[f64]) -> Vec<f64> {
        (0..m.nrows()).map(|i| (0..m.ncols()).map(|j| m[(i, j)] * x[j]).sum()).collect()
    }

    #[test]
    fn unit_mass_is_identity() {
        let basis = CellBasis::new(3);
        let d = dim(Boundary::dirichlet(), Boundary::dirichlet()).with_degree(3);
        let op = assemble_cells(&basis, &d, &Term::identity(0), 2, 0.0).unwrap();
        for i in 0..op.size() {
            for j in 0..op.size() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(op.matrix[(i, j)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn periodic_gradient_differentiates_linear_pieces() {
        // constant functions are annihilated, and the operator conserves mass
        let basis = CellBasis::new(2);
        let d = dim(Boundary::periodic(), Boundary::periodic());
        let term = Term::grad("g", 0, |_, _| 1.0, FluxPolicy::Upwind);
        let op = assemble_cells(&basis, &d, &term, 3, 0.0).unwrap();
        let h: f64 = 0.25;
        let constant: Vec<f64> = (0..8).flat_map(|_| [h.sqrt(), 0.0]).collect();
        for v in matvec(&op.matrix, &constant) {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
        let x: Vec<f64> = (0..16).map(|i| ((i * 7 % 5) as f64) - 2.0).collect();
        let y = matvec(&op.matrix, &x);
        let total: f64 = (0..8).map(|c| y[2 * c]).sum();
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn downwind_and_upwind_are_distinct() {
        let basis = CellBasis::new(2);
        let d = dim(Boundary::periodic(), Boundary::periodic());
        let up = Term::grad("u", 0, |_, _| -1.0, FluxPolicy::Upwind);
        let down = Term::grad("d", 0, |_, _| -1.0, FluxPolicy::Downwind);
        let a = assemble_cells(&basis, &d, &up, 2, 0.0).unwrap();
        let b = assemble_cells(&basis, &d, &down, 2, 0.0).unwrap();
        let diff: f64 = (0..8)
            .flat_map(|i| (0..8).map(move |j| (i, j)))
            .map(|(i, j)| (a.matrix[(i, j)] - b.matrix[(i, j)]).abs())
            .sum();
        assert!(diff > 1e-3);
    }

    #[test]
    fn periodic_diffusion_is_negative_semidefinite_and_symmetric() {
        let basis = CellBasis::new(2);
        let d = dim(Boundary::periodic(), Boundary::periodic());
        let op = assemble_cells(&basis, &d, &Term::diffusion("lap", 0, |_, _| 1.0), 3, 0.0).unwrap();
        let n = op.size();
        for i in 0..n {
            for j in 0..n {
                assert_abs_diff_eq!(op.matrix[(i, j)], op.matrix[(j, i)], epsilon = 1e-10);
            }
            assert!(op.matrix[(i, i)] <= 1e-12);
        }
    }

    #[test]
    fn dirichlet_value_enters_boundary_vector() {
        let basis = CellBasis::new(2);
        let d = dim(Boundary::dirichlet(), Boundary::dirichlet());
        let term = Term::grad("g", 0, |_, _| 1.0, FluxPolicy::Central);
        let op = assemble_cells(&basis, &d, &term, 2, 0.0).unwrap();
        assert!(op.left_bc[..2].iter().any(|v| v.abs() > 1e-12));
        assert!(op.left_bc[2..].iter().all(|v| *v == 0.0));
        assert!(op.right_bc[6..].iter().any(|v| v.abs() > 1e-12));
    }

    #[test]
    fn nan_coefficient_is_an_assembly_error() {
        let basis = CellBasis::new(2);
        let d = dim(Boundary::dirichlet(), Boundary::dirichlet());
        let term = Term::mass("bad", 0, |x, _| x.ln());
        let err = assemble_cells(&basis, &d, &term, 2, 0.0);
        assert!(matches!(err, Err(SkError::Assembly(_))));
    }

    #[test]
    fn mass_singular_at_an_edge_assembles() {
        let basis = CellBasis::new(2);
        let d = Dimension::new("x", 0.0, 1.0, 2, 2, |_, _| 0.0);
        let op = assemble_cells(&basis, &d, &Term::mass("log", 0, |x, _| x.ln()), 2, 0.0).unwrap();
        assert!((0..op.size()).all(|i| op.matrix[(i, i)].is_finite()));
        // ln x < 0 on the first cell
        assert!(op.matrix[(0, 0)] < 0.0);

        let d = Dimension::new("z", -1.0, 1.0, 2, 2, |_, _| 0.0);
        let term = Term::mass("pole", 0, |z, _| 1.0 / (1.0 - z * z));
        assert!(assemble_cells(&basis, &d, &term, 2, 0.0).is_ok());
    }

    #[test]
    fn flux_terms_still_need_finite_edge_values() {
        let basis = CellBasis::new(2);
        let d = Dimension::new("z", -1.0, 1.0, 2, 2, |_, _| 0.0);
        let term = Term::grad("pole", 0, |z, _| 1.0 / (1.0 - z * z), FluxPolicy::Upwind);
        let err = assemble_cells(&basis, &d, &term, 2, 0.0);
        assert!(matches!(err, Err(SkError::Assembly(_))));
    }

    #[test]
    fn cache_is_stale_only_on_level_change_or_time_dependence() {
        use crate::basis::WaveletTransform;
        use crate::pde::catalog::continuity_1d;

        let pde = continuity_1d(Some(2), Some(2)).unwrap();
        let transform = WaveletTransform::new(2);
        let mut cache = CoefficientCache::build(&pde, &transform, &[2], 0.0).unwrap();
        assert!(!cache.is_stale(&pde, &[2], 0.5));
        assert!(!cache.update(&pde, &transform, &[2], 0.5).unwrap());
        assert!(cache.is_stale(&pde, &[3], 0.0));
        assert!(cache.update(&pde, &transform, &[3], 0.0).unwrap());
        assert_eq!(cache.levels(), &[3]);
        assert_eq!(cache.get(0, 0).size(), 16);
        assert!(!cache.is_stale(&pde, &[3], 0.0));
    }
}
