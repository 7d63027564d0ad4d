//! Worker-group communication.
//!
//! Every collective is blocking and must be entered by all workers of the
//! group in the same order. The engine keeps the solution replicated: each
//! worker computes the rows of its owned element range and an
//! [`all_gather`](Comm::all_gather) rebuilds the full vector.

use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use crate::error::{Result, SkError};

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

pub trait Comm: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);

    /// Concatenation of every worker's `local`, in rank order.
    fn all_gather(&self, local: &[f64]) -> Vec<f64>;

    fn all_reduce_sum(&self, x: f64) -> f64 {
        self.all_gather(&[x]).iter().sum()
    }

    fn all_reduce_max(&self, x: f64) -> f64 {
        self.all_gather(&[x]).into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce_sum(local)
    }
}

/// Make a fallible collective step fail on every worker together.
///
/// A worker that failed keeps its own error; healthy peers get
/// [`SkError::Aborted`].
pub fn agree<T>(comm: &dyn Comm, what: &str, result: Result<T>) -> Result<T> {
    let failed = if result.is_err() { 1.0 } else { 0.0 };
    if comm.all_reduce_max(failed) == 0.0 {
        return result;
    }
    match result {
        Err(e) => Err(e),
        Ok(_) => Err(SkError::Aborted(format!("{what} failed on a peer worker"))),
    }
}

/// Single worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn all_gather(&self, local: &[f64]) -> Vec<f64> {
        local.to_vec()
    }
    fn all_reduce_sum(&self, x: f64) -> f64 {
        x
    }
    fn all_reduce_max(&self, x: f64) -> f64 {
        x
    }
}

struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f64>>>,
}

/// In-process worker group: one handle per thread.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Handles for a group of `size` workers; hand one to each thread.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "worker group must not be empty");
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size).map(|rank| ThreadComm { rank, size, shared: Arc::clone(&shared) }).collect()
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm").field("rank", &self.rank).field("size", &self.size).finish()
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {
        self.shared.barrier.wait();
    }
    fn all_gather(&self, local: &[f64]) -> Vec<f64> {
        self.shared.slots.lock()[self.rank] = local.to_vec();
        self.shared.barrier.wait();
        let out = self.shared.slots.lock().concat();
        // nobody may overwrite a slot before everyone has read it
        self.shared.barrier.wait();
        out
    }
}
