//! Method of manufactured solutions for the two-dimensional stream function.
//!
//! The velocity is `u = (df/dy, -df/dx)` with `f = sin(πx) sin(πy)`, interpolated on Lagrange
//! spaces of increasing resolution. The recovered stream function must converge to `f`, which
//! vanishes on the boundary, or to `f - mean(f)` in weak mode.
use itertools::izip;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use streamfn::error::{estimate_H1_seminorm_error, estimate_L2_error};
use streamfn::mesh::procedural::create_unit_square_tri_mesh;
use streamfn::space::{Function, FunctionSpace};
use streamfn::{BoundaryMode, SolverSettings, StreamFunctionSolver, VelocityField};

fn sin(x: f64) -> f64 {
    x.sin()
}
fn cos(x: f64) -> f64 {
    x.cos()
}

fn f_exact(x: &[f64]) -> f64 {
    sin(PI * x[0]) * sin(PI * x[1])
}

fn f_exact_grad(x: &[f64]) -> [f64; 2] {
    [PI * cos(PI * x[0]) * sin(PI * x[1]), PI * sin(PI * x[0]) * cos(PI * x[1])]
}

/// Mean of `f` over the unit square.
const F_MEAN: f64 = 4.0 / (PI * PI);

/// For serializing to JSON for subsequent analysis/plots
#[derive(Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct ErrorSummary {
    pub name: String,
    pub L2_errors: Vec<f64>,
    pub H1_seminorm_errors: Vec<f64>,
    pub resolutions: Vec<f64>,
}

fn velocity(cells_per_dim: usize, degree: usize) -> VelocityField {
    let mesh = Arc::new(create_unit_square_tri_mesh(cells_per_dim));
    let space = Arc::new(FunctionSpace::scalar(mesh, degree).unwrap());
    VelocityField::Components(vec![
        Function::interpolate_scalar(space.clone(), |x| f_exact_grad(x)[1]),
        Function::interpolate_scalar(space, |x| -f_exact_grad(x)[0]),
    ])
}

fn solver() -> StreamFunctionSolver {
    // Tight tolerances so that the discretization error dominates
    StreamFunctionSolver::new().with_planar_settings(SolverSettings {
        relative_tolerance: 1e-12,
        absolute_tolerance: 1e-14,
        ..SolverSettings::planar_default()
    })
}

#[allow(non_snake_case)]
fn run_convergence_study(degree: usize, mode: BoundaryMode) -> ErrorSummary {
    let shift = match mode {
        BoundaryMode::Weak => F_MEAN,
        BoundaryMode::Strong => 0.0,
    };
    let resolutions = [2, 4, 8, 16];
    let mut summary = ErrorSummary {
        name: format!("P{}_{:?}", degree, mode),
        L2_errors: Vec::new(),
        H1_seminorm_errors: Vec::new(),
        resolutions: resolutions.iter().map(|&n| 1.0 / n as f64).collect(),
    };

    for &cells_per_dim in &resolutions {
        let psi = solver()
            .stream_function(&velocity(cells_per_dim, degree), mode)
            .unwrap();
        let strength = 2 * degree + 2;
        let L2_error = estimate_L2_error(&psi, |x, out| out[0] = f_exact(x) - shift, strength).unwrap();
        let H1_error = estimate_H1_seminorm_error(
            &psi,
            |x| DMatrix::from_row_slice(1, 2, &f_exact_grad(x)),
            strength,
        )
        .unwrap();
        summary.L2_errors.push(L2_error);
        summary.H1_seminorm_errors.push(H1_error);
    }
    summary
}

fn export_summary(summary: &ErrorSummary) {
    let base_path = PathBuf::from("data/convergence_tests/stream_function_2d_mms");
    std::fs::create_dir_all(&base_path).unwrap();
    let file = File::create(base_path.join(format!("{}_summary.json", summary.name))).unwrap();
    serde_json::to_writer_pretty(file, summary).unwrap();
}

/// Checks that every refinement reduces the errors at close to the optimal rate, which is
/// `k + 1` in the L2 norm and `k` in the H1 seminorm.
fn assert_optimal_convergence(summary: &ErrorSummary, degree: usize) {
    let expected_l2_ratio = 2f64.powi(degree as i32 + 1);
    let expected_h1_ratio = 2f64.powi(degree as i32);
    for (e_coarse, e_fine) in izip!(&summary.L2_errors, &summary.L2_errors[1..]) {
        let ratio = e_coarse / e_fine;
        assert!(ratio > 0.6 * expected_l2_ratio, "{}: L2 ratio {} too small", summary.name, ratio);
    }
    for (e_coarse, e_fine) in izip!(&summary.H1_seminorm_errors, &summary.H1_seminorm_errors[1..]) {
        let ratio = e_coarse / e_fine;
        assert!(ratio > 0.75 * expected_h1_ratio, "{}: H1 ratio {} too small", summary.name, ratio);
    }
}

#[test]
fn stream_function_2d_converges_strong() {
    for degree in 1..=3 {
        let summary = run_convergence_study(degree, BoundaryMode::Strong);
        export_summary(&summary);
        assert_optimal_convergence(&summary, degree);
    }
}

#[test]
fn stream_function_2d_converges_weak() {
    for degree in 1..=2 {
        let summary = run_convergence_study(degree, BoundaryMode::Weak);
        export_summary(&summary);
        assert_optimal_convergence(&summary, degree);
    }
}
