//! Vector potential of an ABC flow on the periodic unit cube.
use log::info;
use std::f64::consts::PI;
use std::io::stdout;
use std::sync::Arc;
use streamfn::assembly::local::curl_from_gradient;
use streamfn::mesh::procedural::create_unit_cube_tet_mesh;
use streamfn::probe::Probes;
use streamfn::space::{Function, FunctionSpace, PeriodicBoundary};
use streamfn::{stream_function_3d, VelocityField};

const A: f64 = 1.0;
const B: f64 = 0.7;
const C: f64 = 0.4;

fn abc_flow(x: &[f64]) -> [f64; 3] {
    let k = 2.0 * PI;
    [
        A * (k * x[2]).sin() + C * (k * x[1]).cos(),
        B * (k * x[0]).sin() + A * (k * x[2]).cos(),
        C * (k * x[1]).sin() + B * (k * x[0]).cos(),
    ]
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let mesh = Arc::new(create_unit_cube_tet_mesh(8));
    let space = Arc::new(FunctionSpace::scalar(mesh.clone(), 1)?);
    let components = (0..3)
        .map(|c| Function::interpolate_scalar(space.clone(), |x| abc_flow(x)[c]))
        .collect();
    let velocity = VelocityField::Components(components);

    let periodic = PeriodicBoundary::fully_periodic(vec![0.0; 3], vec![1.0; 3])?;
    let psi = stream_function_3d(&velocity, Some(&periodic))?;
    info!(
        "Vector potential with {} unknowns on {} tetrahedra",
        psi.coefficients().len(),
        mesh.num_cells()
    );

    let mut max_deviation: f64 = 0.0;
    for cell_index in 0..mesh.num_cells() {
        let lambda = [0.25; 4];
        let x = psi.space().cell_geometry(cell_index)?.map_barycentric(&lambda);
        let curl = curl_from_gradient(&psi.gradient_in_cell(cell_index, &lambda)?);
        let u = abc_flow(x.as_slice());
        for i in 0..3 {
            max_deviation = max_deviation.max((curl[i] - u[i]).abs());
        }
    }
    info!("Largest deviation of curl(psi) from u at cell centers: {:.3e}", max_deviation);

    let diagonal: Vec<f64> = (0..=8)
        .flat_map(|i| [i as f64 / 8.0; 3])
        .collect();
    let mut probes = Probes::new(&diagonal, psi.space().clone())?;
    probes.eval(&psi)?;
    probes.dump(stdout().lock())?;
    Ok(())
}
