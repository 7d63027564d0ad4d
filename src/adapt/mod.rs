//! Adaptive grid manager.
//!
//! Owns the active element set and its partition over the worker group. All
//! refine/coarsen decisions are taken from globally exchanged indicators, so
//! every worker commits the same change.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, warn};

use crate::parallel::Comm;

pub mod element;

pub use element::{Element, ElementSet};

/// Counters describing what adaptivity has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptStats {
    /// Elements added by refinement.
    pub refinements: usize,
    /// Elements removed by coarsening.
    pub coarsenings: usize,
    /// Refinement requests clamped at the maximum level.
    pub limit_hits: usize,
}

/// Balanced contiguous ranges of `n` items over `workers`.
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    let base = n / workers;
    let rem = n % workers;
    let mut start = 0;
    (0..workers)
        .map(|r| {
            let len = base + usize::from(r < rem);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Re-express `x` (laid out on `old`) on `new`.
///
/// Blocks of elements present in both sets are copied, new elements start
/// at zero and removed elements are dropped.
pub fn project(x: &[f64], old: &ElementSet, new: &ElementSet, element_size: usize) -> Vec<f64> {
    assert_eq!(x.len(), old.len() * element_size, "solution does not match the old grid");
    let mut out = vec![0.0; new.len() * element_size];
    for (j, e) in new.iter().enumerate() {
        if let Some(i) = old.index_of(e) {
            out[j * element_size..(j + 1) * element_size]
                .copy_from_slice(&x[i * element_size..(i + 1) * element_size]);
        }
    }
    out
}

/// The active grid partitioned over a worker group.
#[derive(Clone)]
pub struct DistributedGrid {
    elements: ElementSet,
    ranges: Vec<Range<usize>>,
    comm: Arc<dyn Comm>,
    element_size: usize,
    stats: AdaptStats,
    revision: u64,
}

impl std::fmt::Debug for DistributedGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedGrid")
            .field("elements", &self.elements.len())
            .field("rank", &self.comm.rank())
            .field("ranges", &self.ranges)
            .field("revision", &self.revision)
            .finish()
    }
}

impl DistributedGrid {
    pub fn new(elements: ElementSet, degree: usize, comm: Arc<dyn Comm>) -> Self {
        let element_size = degree.pow(elements.num_dims() as u32);
        let ranges = partition(elements.len(), comm.size());
        Self { elements, ranges, comm, element_size, stats: AdaptStats::default(), revision: 0 }
    }

    pub fn elements(&self) -> &ElementSet {
        &self.elements
    }

    pub fn comm(&self) -> &dyn Comm {
        self.comm.as_ref()
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Length of the (replicated) solution vector.
    pub fn dof(&self) -> usize {
        self.elements.len() * self.element_size
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Elements owned by this worker.
    pub fn local_range(&self) -> Range<usize> {
        self.ranges[self.comm.rank()].clone()
    }

    pub fn stats(&self) -> AdaptStats {
        self.stats
    }

    /// Bumped whenever the element set changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Rebalance ownership after the element count changed.
    pub fn redistribute(&mut self) {
        self.ranges = partition(self.elements.len(), self.comm.size());
        debug!(
            "rank {}: owns elements {:?} of {}",
            self.comm.rank(),
            self.local_range(),
            self.elements.len()
        );
    }

    /// Assemble the full vector from every worker's owned rows.
    pub fn exchange(&self, local: &[f64]) -> Vec<f64> {
        debug_assert_eq!(local.len(), self.local_range().len() * self.element_size);
        let full = self.comm.all_gather(local);
        debug_assert_eq!(full.len(), self.dof());
        full
    }

    /// Largest coefficient magnitude of every element, globally.
    pub fn refinement_indicator(&self, x: &[f64]) -> Vec<f64> {
        let k = self.element_size;
        let local: Vec<f64> = self
            .local_range()
            .map(|i| x[i * k..(i + 1) * k].iter().fold(0.0, |m: f64, v| m.max(v.abs())))
            .collect();
        self.exchange_scalars(&local)
    }

    fn exchange_scalars(&self, local: &[f64]) -> Vec<f64> {
        let full = self.comm.all_gather(local);
        debug_assert_eq!(full.len(), self.elements.len());
        full
    }

    fn commit(&mut self, elements: ElementSet) -> ElementSet {
        let old = std::mem::replace(&mut self.elements, elements);
        self.revision += 1;
        self.redistribute();
        debug_assert!(self.elements.is_parent_closed());
        old
    }

    /// Add the children of every element whose indicator is at least
    /// `threshold` times the global maximum.
    ///
    /// A child is admitted only once all of its parents are active (or
    /// admitted in the same pass). Returns the previous element set when the
    /// grid changed.
    pub fn refine(&mut self, x: &[f64], threshold: f64, max_level: usize) -> Option<ElementSet> {
        let indicator = self.refinement_indicator(x);
        let gmax = indicator.iter().fold(0.0f64, |m, &v| m.max(v));
        if gmax == 0.0 {
            return None;
        }
        let cut = threshold * gmax;
        let mut candidates = BTreeSet::new();
        let mut capped = 0;
        for (e, &v) in self.elements.iter().zip(&indicator) {
            if v < cut {
                continue;
            }
            let (children, hit) = e.children(max_level as u32);
            capped += usize::from(hit);
            candidates.extend(children.into_iter().filter(|c| !self.elements.contains(c)));
        }
        if capped > 0 {
            self.stats.limit_hits += capped;
            warn!("refinement clamped at max level {max_level} for {capped} elements");
        }

        let mut admitted = BTreeSet::new();
        loop {
            let ready: Vec<Element> = candidates
                .iter()
                .filter(|c| {
                    c.parents().iter().all(|p| self.elements.contains(p) || admitted.contains(p))
                })
                .cloned()
                .collect();
            if ready.is_empty() {
                break;
            }
            for c in ready {
                candidates.remove(&c);
                admitted.insert(c);
            }
        }
        if admitted.is_empty() {
            return None;
        }
        let added = admitted.len();
        let grown = self.elements.union(&admitted);
        self.stats.refinements += added;
        let old = self.commit(grown);
        debug!("refined: +{added} elements, {} active", self.elements.len());
        Some(old)
    }

    /// Remove leaf elements whose indicator is below `threshold` times the
    /// global maximum. The root element is never removed. Returns the
    /// previous element set when the grid changed.
    pub fn coarsen(&mut self, x: &[f64], threshold: f64) -> Option<ElementSet> {
        let indicator = self.refinement_indicator(x);
        let gmax = indicator.iter().fold(0.0f64, |m, &v| m.max(v));
        let cut = threshold * gmax;
        let keep: Vec<Element> = self
            .elements
            .iter()
            .zip(&indicator)
            .filter(|(e, v)| e.is_root() || **v >= cut || !self.elements.is_leaf(e))
            .map(|(e, _)| e.clone())
            .collect();
        let removed = self.elements.len() - keep.len();
        if removed == 0 {
            return None;
        }
        let shrunk = ElementSet::from_elements(self.elements.num_dims(), keep);
        self.stats.coarsenings += removed;
        let old = self.commit(shrunk);
        debug!("coarsened: -{removed} elements, {} active", self.elements.len());
        Some(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;

    fn grid(levels: &[usize], degree: usize) -> DistributedGrid {
        DistributedGrid::new(ElementSet::sparse(levels), degree, Arc::new(SerialComm))
    }

    #[test]
    fn partition_is_balanced_and_contiguous() {
        let r = partition(10, 3);
        assert_eq!(r, vec![0..4, 4..7, 7..10]);
        let r = partition(2, 4);
        assert_eq!(r.iter().map(|r| r.len()).sum::<usize>(), 2);
    }

    #[test]
    fn refine_adds_children_of_large_elements() {
        let mut g = grid(&[1], 2);
        // elements (0,0), (1,0); the level-1 element dominates
        let x = vec![0.1, 0.0, 1.0, 0.0];
        let old = g.refine(&x, 0.5, 4).expect("grid should grow");
        assert_eq!(old.len(), 2);
        assert_eq!(g.elements().len(), 4);
        assert!(g.elements().is_parent_closed());
        assert_eq!(g.stats().refinements, 2);
        assert_eq!(g.revision(), 1);
    }

    #[test]
    fn refine_respects_max_level() {
        let mut g = grid(&[2], 1);
        let x = vec![1.0; 4];
        assert!(g.refine(&x, 0.0, 2).is_none());
        assert!(g.stats().limit_hits > 0);
    }

    #[test]
    fn coarsen_removes_only_small_leaves() {
        let mut g = grid(&[2], 1);
        // (0,0) (1,0) (2,0) (2,1)
        let x = vec![1.0, 0.5, 1e-8, 0.3];
        let old = g.coarsen(&x, 1e-3).expect("one leaf is negligible");
        assert_eq!(old.len(), 4);
        assert_eq!(g.elements().len(), 3);
        assert!(g.elements().is_parent_closed());
        assert_eq!(g.stats().coarsenings, 1);
    }

    #[test]
    fn projection_to_a_superset_and_back_is_exact() {
        let small = ElementSet::sparse(&[2, 1]);
        let large = ElementSet::full(&[2, 2]);
        let x: Vec<f64> = (0..small.len() * 4).map(|i| i as f64 * 0.25 - 1.0).collect();
        let up = project(&x, &small, &large, 4);
        let back = project(&up, &large, &small, 4);
        assert_eq!(back, x);
    }
}
