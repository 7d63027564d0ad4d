//! MPI worker group (feature `mpi`).
//!
//! Wraps the world communicator; the `Universe` is kept alive for as long as
//! the handle so MPI is finalized only when the communicator is dropped.

use mpi::collective::SystemOperation;
use mpi::datatype::PartitionMut;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

use crate::error::{Result, SkError};

pub struct MpiComm {
    _universe: Universe,
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl MpiComm {
    /// Initialize MPI and wrap the world communicator.
    pub fn new() -> Result<Self> {
        let universe = mpi::initialize()
            .ok_or_else(|| SkError::Config("MPI has already been initialized".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { _universe: universe, world, rank, size })
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn all_gather(&self, local: &[f64]) -> Vec<f64> {
        let count = local.len() as Count;
        let mut counts = vec![0 as Count; self.size];
        self.world.all_gather_into(&count, &mut counts[..]);
        let displs: Vec<Count> = counts
            .iter()
            .scan(0, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect();
        let total: Count = counts.iter().sum();
        let mut buf = vec![0.0f64; total as usize];
        {
            let mut partition = PartitionMut::new(&mut buf[..], counts, &displs[..]);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        buf
    }

    fn all_reduce_sum(&self, x: f64) -> f64 {
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, SystemOperation::sum());
        y
    }

    fn all_reduce_max(&self, x: f64) -> f64 {
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, SystemOperation::max());
        y
    }
}
