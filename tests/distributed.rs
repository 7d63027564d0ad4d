//! A group of in-process workers reproduces the single-worker run.

mod common;

use std::sync::Arc;
use std::thread;

use approx::assert_abs_diff_eq;
use sparsekron::{Comm, Options, SerialComm, Simulation, SolverChoice, ThreadComm, TimeMethod};

fn run(comm: Arc<dyn Comm>, options: Options, steps: usize) -> Vec<f64> {
    let pde = common::advection_2d(3, 2);
    let mut sim = Simulation::new(pde, options, comm).unwrap();
    for _ in 0..steps {
        sim.advance().unwrap();
    }
    sim.solution().to_vec()
}

fn run_group(workers: usize, options: Options, steps: usize) -> Vec<Vec<f64>> {
    let handles: Vec<_> = ThreadComm::group(workers)
        .into_iter()
        .map(|comm| {
            let options = options.clone();
            thread::spawn(move || run(Arc::new(comm), options, steps))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_matches_serial(options: Options, steps: usize) {
    let serial = run(Arc::new(SerialComm), options.clone(), steps);
    for replica in run_group(3, options, steps) {
        assert_eq!(replica.len(), serial.len());
        for (a, b) in replica.iter().zip(&serial) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }
}

#[test]
fn explicit_steps_match_serial() {
    assert_matches_serial(Options::default().with_dt(1e-3), 5);
}

#[test]
fn implicit_direct_steps_match_serial() {
    let options = Options::default()
        .with_time_method(TimeMethod::Implicit)
        .with_solver(SolverChoice::Direct)
        .with_dt(1e-2);
    assert_matches_serial(options, 3);
}

#[test]
fn implicit_iterative_steps_match_serial() {
    let options = Options::default()
        .with_time_method(TimeMethod::Implicit)
        .with_solver(SolverChoice::Iterative)
        .with_dt(1e-2);
    assert_matches_serial(options, 3);
}

/// Adaptive runs stay in lockstep: every worker sees the same grid.
#[test]
fn adaptive_steps_match_serial() {
    let options = Options::default().with_dt(1e-3).with_adaptivity(1e-2, 1e-4).with_max_level(5);
    assert_matches_serial(options, 3);
}
