//! Stream function of a single recirculating cell in the unit square.
//!
//! The velocity `u = (sin²(πx) sin(2πy), -sin(2πx) sin²(πy))` vanishes on the walls, so both
//! boundary treatments recover the same stream function up to a constant. Values along the
//! horizontal center line are written to standard output.
use eyre::eyre;
use log::info;
use std::f64::consts::PI;
use std::io::stdout;
use std::sync::Arc;
use streamfn::mesh::procedural::create_unit_square_tri_mesh;
use streamfn::probe::{ProbeDict, Probes};
use streamfn::space::{Function, FunctionSpace};
use streamfn::{stream_function, BoundaryMode, VelocityField};

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let cells_per_dim = 32;
    let mesh = Arc::new(create_unit_square_tri_mesh(cells_per_dim));
    let space = Arc::new(FunctionSpace::scalar(mesh.clone(), 2)?);
    let velocity = VelocityField::Components(vec![
        Function::interpolate_scalar(space.clone(), |x| (PI * x[0]).sin().powi(2) * (2.0 * PI * x[1]).sin()),
        Function::interpolate_scalar(space.clone(), |x| -(2.0 * PI * x[0]).sin() * (PI * x[1]).sin().powi(2)),
    ]);
    info!(
        "Velocity on {} triangles with {} nodes per component",
        mesh.num_cells(),
        space.num_nodes()
    );

    let center_line: Vec<f64> = (0..=10)
        .flat_map(|i| [i as f64 / 10.0, 0.5])
        .collect();
    let mut probes = ProbeDict::new();
    probes.insert("weak", Probes::new(&center_line, space.clone())?);
    probes.insert("strong", Probes::new(&center_line, space.clone())?);

    let psi_weak = stream_function(&velocity, BoundaryMode::Weak)?;
    let psi_strong = stream_function(&velocity, BoundaryMode::Strong)?;
    probes.probe([("weak", &psi_weak), ("strong", &psi_strong)])?;

    // Both solutions describe the same flow, so they may only differ by a constant
    let difference = psi_strong.coefficients() - psi_weak.coefficients();
    let spread = difference.max() - difference.min();
    info!("Spread of the difference between boundary modes: {:e}", spread);

    let center = psi_strong
        .evaluate_at_point(&[0.5, 0.5])
        .ok_or_else(|| eyre!("center of the cavity is outside the mesh"))?;
    info!("Stream function at the vortex center: {:.6}", center[0]);

    probes.dump(stdout().lock())?;
    Ok(())
}
