//! Properties of the matrix-free Kronecker operator.
//!
//! - The apply is linear in the coefficient vector.
//! - It agrees with the explicitly assembled operator rows.
//! - A workspace budget that is too small fails with the required size.

mod common;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use rand::Rng;
use sparsekron::core::traits::MatVec;
use sparsekron::kronmult::mat_from_rows;
use sparsekron::{Discretization, Options, SerialComm, Simulation, SkError};

fn random_vec(n: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.r#gen::<f64>() - 0.5).collect()
}

/// `A(αx + βy) = αAx + βAy` for random vectors and scalars on a 2D sparse grid.
#[test]
fn kronmult_is_linear() {
    let pde = common::advection_2d(3, 2);
    let disc = Discretization::new(&pde, &Options::default(), Arc::new(SerialComm)).unwrap();
    let n = disc.grid().dof();
    let (x, y) = (random_vec(n), random_vec(n));
    let mut rng = rand::thread_rng();
    let (alpha, beta) = (rng.r#gen::<f64>() * 4.0 - 2.0, rng.r#gen::<f64>() * 4.0 - 2.0);
    let combo: Vec<f64> = x.iter().zip(&y).map(|(a, b)| alpha * a + beta * b).collect();

    let lhs = disc.apply(&combo).unwrap();
    let ax = disc.apply(&x).unwrap();
    let ay = disc.apply(&y).unwrap();
    for i in 0..n {
        assert_abs_diff_eq!(lhs[i], alpha * ax[i] + beta * ay[i], epsilon = 1e-10);
    }
}

/// The matrix-free apply matches the dense rows built from the same blocks.
#[test]
fn matrix_free_matches_dense_rows() {
    let pde = common::advection_2d(2, 3);
    let disc = Discretization::new(&pde, &Options::default(), Arc::new(SerialComm)).unwrap();
    let n = disc.grid().dof();
    let op = disc.operator().unwrap();
    let dense = mat_from_rows(&op.dense_rows(), n, n);
    let x = random_vec(n);
    let mut expected = vec![0.0; n];
    dense.matvec(&x, &mut expected);
    let got = op.apply_local(&x);
    for i in 0..n {
        assert_abs_diff_eq!(got[i], expected[i], epsilon = 1e-11);
    }
}

/// With a zero budget the step fails with `ResourceExhaustion` and nothing moves.
#[test]
fn zero_workspace_is_resource_exhaustion() {
    let pde = common::advection_2d(2, 2);
    let mut sim = Simulation::serial(pde, Options::default().with_workspace_mb(0)).unwrap();
    let before = sim.solution().to_vec();
    match sim.advance() {
        Err(SkError::ResourceExhaustion { required, available }) => {
            assert_eq!(available, 0);
            assert!(required > 0);
        }
        other => panic!("expected resource exhaustion, got {other:?}"),
    }
    assert_eq!(sim.solution(), &before[..]);
    assert_eq!(sim.steps(), 0);
    assert_eq!(sim.time(), 0.0);
}
