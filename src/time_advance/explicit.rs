//! Explicit stepping: three-stage Runge-Kutta, with optional adaptivity.

use log::{debug, warn};

use super::Discretization;
use crate::adapt::project;
use crate::config::Options;
use crate::error::Result;
use crate::pde::PdeDescriptor;

fn axpy(x: &[f64], a: f64, y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| xi + a * yi).collect()
}

fn stage(disc: &mut Discretization, pde: &PdeDescriptor, x: &[f64], t: f64) -> Result<Vec<f64>> {
    disc.refresh(pde, t)?;
    disc.rhs(x, t)
}

/// One step of the third-order Runge-Kutta scheme
///
/// ```text
/// k1 = f(x, t)
/// k2 = f(x + dt/2 k1, t + dt/2)
/// k3 = f(x - dt k1 + 2 dt k2, t + dt)
/// x' = x + dt (k1 + 4 k2 + k3) / 6
/// ```
///
/// with `f(x, t) = A(t) x + sources(t) + boundaries(t)`.
pub fn explicit_time_advance(
    pde: &PdeDescriptor,
    disc: &mut Discretization,
    x: &[f64],
    time: f64,
    dt: f64,
) -> Result<Vec<f64>> {
    let k1 = stage(disc, pde, x, time)?;
    let x2 = axpy(x, 0.5 * dt, &k1);
    let k2 = stage(disc, pde, &x2, time + 0.5 * dt)?;
    let x3: Vec<f64> = x
        .iter()
        .zip(k1.iter().zip(&k2))
        .map(|(xi, (a, b))| xi - dt * a + 2.0 * dt * b)
        .collect();
    let k3 = stage(disc, pde, &x3, time + dt)?;
    Ok(x
        .iter()
        .zip(k1.iter().zip(k2.iter().zip(&k3)))
        .map(|(xi, (a, (b, c)))| xi + dt * (a / 6.0 + 2.0 * b / 3.0 + c / 6.0))
        .collect())
}

/// Explicit step on an adapted grid.
///
/// Coarsens against `x` first, then alternates steps and refinement: while
/// the stepped solution asks for new elements, the grid grows, `x` is
/// re-projected onto it and the step is redone from `time`. The loop ends
/// when a step leaves the grid unchanged or after `max_pseudosteps`
/// refinements. On return the grid in `disc` matches the returned vector.
pub fn adaptive_explicit_advance(
    pde: &PdeDescriptor,
    disc: &mut Discretization,
    options: &Options,
    x: &[f64],
    time: f64,
    dt: f64,
) -> Result<Vec<f64>> {
    let element_size = disc.grid().element_size();
    let mut x = x.to_vec();
    if let Some(old) = disc.grid_mut().coarsen(&x, options.coarsen_threshold) {
        x = project(&x, &old, disc.grid().elements(), element_size);
    }

    let mut pseudostep = 0;
    loop {
        let y = explicit_time_advance(pde, disc, &x, time, dt)?;
        if pseudostep == options.max_pseudosteps {
            warn!(
                "adaptive step at t = {time}: pseudostep budget ({}) exhausted",
                options.max_pseudosteps
            );
            return Ok(y);
        }
        let Some(old) = disc.grid_mut().refine(&y, options.refine_threshold, options.max_level)
        else {
            return Ok(y);
        };
        pseudostep += 1;
        x = project(&x, &old, disc.grid().elements(), element_size);
        debug!(
            "pseudostep {pseudostep} at t = {time}: {} elements",
            disc.grid().elements().len()
        );
    }
}
