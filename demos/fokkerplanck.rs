//! Radiation damping (Fokker-Planck 4.3) on `[-1, 1]`, stepped explicitly to
//! `t = 0.5` and compared against the analytic solution.
//!
//! ```text
//! cargo run --release --example fokkerplanck -- [level] [degree]
//! ```

use log::LevelFilter;
use simple_logger::SimpleLogger;
use sparsekron::pde::catalog::fokkerplanck_1d_4p3;
use sparsekron::{Options, Simulation};

fn main() -> sparsekron::Result<()> {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("logging disabled: {e}");
    }
    let mut args = std::env::args().skip(1).map(|a| a.parse::<usize>().ok());
    let level = args.next().flatten().unwrap_or(4);
    let degree = args.next().flatten().unwrap_or(3);

    let pde = fokkerplanck_1d_4p3(Some(level), Some(degree))?;
    let mut sim = Simulation::serial(pde, Options::default().with_cfl(0.05))?;
    println!("level {level}, degree {degree}: {} dof, dt = {:e}", sim.grid().dof(), sim.dt());

    let summary = sim.run(0.5, usize::MAX)?;
    println!("{summary:?}");
    if let Some(err) = sim.solution_error()? {
        println!("L2 error {:e} (relative {:e})", err.absolute, err.relative);
    }
    Ok(())
}
