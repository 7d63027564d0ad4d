//! Multi-indices and sparse-grid element sets.

use std::collections::BTreeSet;

use crate::basis::{block_offset, cells_on_level};

/// One active hierarchical basis element: a `(level, cell)` pair per dimension.
///
/// Ordering is lexicographic on levels, then cells; element sets are kept in
/// this order and the solution vector follows it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Element {
    pub levels: Vec<u32>,
    pub cells: Vec<u32>,
}

impl Element {
    pub fn new(levels: Vec<u32>, cells: Vec<u32>) -> Self {
        assert_eq!(levels.len(), cells.len(), "levels and cells must have one entry per dimension");
        debug_assert!(levels.iter().zip(&cells).all(|(&l, &c)| c < cells_on_level(l)));
        Self { levels, cells }
    }

    pub fn root(num_dims: usize) -> Self {
        Self { levels: vec![0; num_dims], cells: vec![0; num_dims] }
    }

    pub fn num_dims(&self) -> usize {
        self.levels.len()
    }

    pub fn is_root(&self) -> bool {
        self.levels.iter().all(|&l| l == 0)
    }

    pub fn max_level(&self) -> u32 {
        self.levels.iter().copied().max().unwrap_or(0)
    }

    /// Offset of this element's block in the 1D hierarchical vector of `dim`.
    pub fn block(&self, dim: usize) -> usize {
        block_offset(self.levels[dim], self.cells[dim])
    }

    /// Immediate parents, one per dimension with a positive level.
    pub fn parents(&self) -> Vec<Element> {
        (0..self.num_dims())
            .filter(|&d| self.levels[d] > 0)
            .map(|d| {
                let mut p = self.clone();
                p.levels[d] -= 1;
                p.cells[d] = if self.levels[d] == 1 { 0 } else { self.cells[d] / 2 };
                p
            })
            .collect()
    }

    /// Immediate children with every level at most `max_level`, and whether
    /// any child was dropped by the cap.
    pub fn children(&self, max_level: u32) -> (Vec<Element>, bool) {
        let mut out = Vec::new();
        let mut capped = false;
        for d in 0..self.num_dims() {
            let l = self.levels[d];
            if l + 1 > max_level {
                capped = true;
                continue;
            }
            let cells: &[u32] = if l == 0 {
                &[0]
            } else {
                &[2 * self.cells[d], 2 * self.cells[d] + 1]
            };
            for &c in cells {
                let mut child = self.clone();
                child.levels[d] = l + 1;
                child.cells[d] = c;
                out.push(child);
            }
        }
        (out, capped)
    }
}

/// Sorted, duplicate-free set of active elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSet {
    num_dims: usize,
    elements: Vec<Element>,
}

fn level_tuples(max: &[usize], admit: &dyn Fn(&[usize]) -> bool) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut cur = vec![0usize; max.len()];
    loop {
        if admit(&cur) {
            out.push(cur.clone());
        }
        // odometer over [0, max_d]
        let mut d = max.len();
        loop {
            if d == 0 {
                return out;
            }
            d -= 1;
            if cur[d] < max[d] {
                cur[d] += 1;
                break;
            }
            cur[d] = 0;
        }
    }
}

fn cell_tuples(levels: &[usize]) -> Vec<Vec<u32>> {
    let mut out = vec![Vec::new()];
    for &l in levels {
        let n = cells_on_level(l as u32);
        out = out
            .into_iter()
            .flat_map(|prefix: Vec<u32>| {
                (0..n).map(move |c| {
                    let mut t = prefix.clone();
                    t.push(c);
                    t
                })
            })
            .collect();
    }
    out
}

impl ElementSet {
    fn from_level_tuples(tuples: Vec<Vec<usize>>, num_dims: usize) -> Self {
        let mut elements = Vec::new();
        for levels in tuples {
            let lv: Vec<u32> = levels.iter().map(|&l| l as u32).collect();
            for cells in cell_tuples(&levels) {
                elements.push(Element { levels: lv.clone(), cells });
            }
        }
        Self::from_elements(num_dims, elements)
    }

    /// Standard sparse grid: `Σ l_d ≤ max_d L_d` with `l_d ≤ L_d`.
    pub fn sparse(levels: &[usize]) -> Self {
        let budget = levels.iter().copied().max().unwrap_or(0);
        let tuples = level_tuples(levels, &|l| l.iter().sum::<usize>() <= budget);
        Self::from_level_tuples(tuples, levels.len())
    }

    /// Full tensor grid: `l_d ≤ L_d`.
    pub fn full(levels: &[usize]) -> Self {
        let tuples = level_tuples(levels, &|_| true);
        Self::from_level_tuples(tuples, levels.len())
    }

    pub fn from_elements(num_dims: usize, mut elements: Vec<Element>) -> Self {
        assert!(elements.iter().all(|e| e.num_dims() == num_dims));
        elements.sort();
        elements.dedup();
        Self { num_dims, elements }
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.elements
    }

    pub fn index_of(&self, e: &Element) -> Option<usize> {
        self.elements.binary_search(e).ok()
    }

    pub fn contains(&self, e: &Element) -> bool {
        self.index_of(e).is_some()
    }

    /// Highest active level in each dimension.
    pub fn max_levels(&self) -> Vec<usize> {
        let mut out = vec![0usize; self.num_dims];
        for e in &self.elements {
            for (m, &l) in out.iter_mut().zip(&e.levels) {
                *m = (*m).max(l as usize);
            }
        }
        out
    }

    /// Every element's parents are active.
    pub fn is_parent_closed(&self) -> bool {
        self.elements.iter().all(|e| e.parents().iter().all(|p| self.contains(p)))
    }

    /// Elements with no active child.
    pub fn is_leaf(&self, e: &Element) -> bool {
        e.children(u32::MAX).0.iter().all(|c| !self.contains(c))
    }

    /// Union with `extra`, as a new set.
    pub fn union(&self, extra: &BTreeSet<Element>) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(extra.iter().cloned());
        Self::from_elements(self.num_dims, elements)
    }

    /// Tensor-product element vector from one hierarchical vector per
    /// dimension (dimension 0 slowest within each element block).
    pub fn combine(&self, per_dim: &[Vec<f64>], degree: usize) -> Vec<f64> {
        assert_eq!(per_dim.len(), self.num_dims);
        let size = degree.pow(self.num_dims as u32);
        let mut out = Vec::with_capacity(self.len() * size);
        for e in &self.elements {
            let mut block = vec![1.0];
            for (d, v) in per_dim.iter().enumerate() {
                let off = e.block(d) * degree;
                let factor = &v[off..off + degree];
                block = block.iter().flat_map(|&a| factor.iter().map(move |&b| a * b)).collect();
            }
            out.extend_from_slice(&block);
        }
        out
    }
}
