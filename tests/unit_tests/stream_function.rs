use super::{velocity_from_stream_function, velocity_from_vector_potential};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use std::sync::Arc;
use streamfn::assembly::local::curl_from_gradient;
use streamfn::mesh::procedural::{create_unit_cube_tet_mesh, create_unit_square_tri_mesh};
use streamfn::mesh::Mesh;
use streamfn::nalgebra_sparse::CsrMatrix;
use streamfn::space::{Function, FunctionSpace, PeriodicBoundary};
use streamfn::streamfn_sparse::{Gmres, SolveErrorKind};
use streamfn::{
    stream_function, stream_function_3d, BoundaryMode, PreconditionerKind, SolverMethod, SolverSettings,
    StreamFunctionError, StreamFunctionSolver, VelocityField,
};

fn direct_solver() -> StreamFunctionSolver {
    let direct = |settings: SolverSettings| SolverSettings {
        method: SolverMethod::Direct,
        ..settings
    };
    StreamFunctionSolver::new()
        .with_planar_settings(direct(SolverSettings::planar_default()))
        .with_spatial_settings(direct(SolverSettings::spatial_default()))
}

/// The triangle with vertices (0, 0), (1, 0), (0, 1), split into four by its edge midpoints.
fn reference_triangle_mesh() -> Arc<Mesh> {
    #[rustfmt::skip]
    let vertices = vec![
        0.0, 0.0,
        1.0, 0.0,
        0.0, 1.0,
        0.5, 0.0,
        0.5, 0.5,
        0.0, 0.5,
    ];
    #[rustfmt::skip]
    let cells = vec![
        0, 3, 5,
        3, 1, 4,
        5, 4, 2,
        3, 4, 5,
    ];
    Arc::new(Mesh::from_vertices_and_cells(2, vertices, cells).unwrap())
}

/// Interpolates `f` on the space of `psi` and removes its mean.
fn zero_mean_interpolant(psi: &Function, f: impl Fn(&[f64]) -> f64) -> DVector<f64> {
    let interpolant = Function::interpolate_scalar(psi.space().clone(), f);
    let mean = interpolant.mean().unwrap()[0];
    interpolant.coefficients().add_scalar(-mean)
}

/// Largest deviation of `curl(psi)` from `u` over the cell centroids.
fn max_curl_error(psi: &Function, u: impl Fn(&[f64]) -> [f64; 3]) -> f64 {
    let mesh = psi.mesh();
    let lambda = [0.25; 4];
    (0..mesh.num_cells())
        .map(|cell_index| {
            let x = psi
                .space()
                .cell_geometry(cell_index)
                .unwrap()
                .map_barycentric(&lambda);
            let curl = curl_from_gradient(&psi.gradient_in_cell(cell_index, &lambda).unwrap());
            let expected = u(x.as_slice());
            (0..3)
                .map(|i| (curl[i] - expected[i]).abs())
                .fold(0.0, f64::max)
        })
        .fold(0.0, f64::max)
}

#[test]
fn weak_mode_recovers_polynomial_stream_functions_exactly() {
    let mesh = Arc::new(create_unit_square_tri_mesh(3));
    let solver = direct_solver();

    // Stream functions of degree k, given with their gradients
    let cases: [(usize, fn(&[f64]) -> f64, fn(&[f64]) -> [f64; 2]); 3] = [
        (1, |x| 2.0 * x[0] - x[1], |_| [2.0, -1.0]),
        (2, |x| x[0] * x[0] + x[0] * x[1] - 0.5 * x[1] * x[1], |x| [2.0 * x[0] + x[1], x[0] - x[1]]),
        (3, |x| x[0].powi(3) - 3.0 * x[0] * x[1] * x[1] + x[1], |x| {
            [3.0 * x[0] * x[0] - 3.0 * x[1] * x[1], 1.0 - 6.0 * x[0] * x[1]]
        }),
    ];

    for (degree, f, gradient) in cases {
        let velocity = velocity_from_stream_function(&mesh, degree, gradient);
        let psi = solver.stream_function(&velocity, BoundaryMode::Weak).unwrap();
        assert_eq!(psi.degree(), degree);
        assert_eq!(psi.value_size(), 1);
        assert!(Arc::ptr_eq(psi.mesh(), &mesh));

        let expected = zero_mean_interpolant(&psi, f);
        assert_matrix_eq!(psi.coefficients().clone(), expected, comp = abs, tol = 1e-10);
        assert_scalar_eq!(psi.mean().unwrap()[0], 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn stream_function_gradient_matches_velocity() {
    // grad(psi) = (-u_y, u_x) holds exactly whenever psi is recovered exactly
    let mesh = Arc::new(create_unit_square_tri_mesh(2));
    let velocity = velocity_from_stream_function(&mesh, 2, |x| [x[1], x[0] + 2.0 * x[1]]);
    let psi = direct_solver()
        .stream_function(&velocity, BoundaryMode::Weak)
        .unwrap();
    let VelocityField::Components(components) = &velocity else {
        unreachable!()
    };
    let lambda = [0.2, 0.3, 0.5];
    for cell in 0..mesh.num_cells() {
        let gradient = psi.gradient_in_cell(cell, &lambda).unwrap();
        let u_x = components[0].evaluate_in_cell(cell, &lambda)[0];
        let u_y = components[1].evaluate_in_cell(cell, &lambda)[0];
        assert_scalar_eq!(gradient[(0, 0)], -u_y, comp = abs, tol = 1e-10);
        assert_scalar_eq!(gradient[(0, 1)], u_x, comp = abs, tol = 1e-10);
    }
}

#[test]
fn strong_mode_recovers_stream_function_vanishing_on_boundary() {
    // f = xy(1 - x - y) is cubic and vanishes on the boundary of the triangle
    let mesh = reference_triangle_mesh();
    let f = |x: &[f64]| x[0] * x[1] * (1.0 - x[0] - x[1]);
    let gradient = |x: &[f64]| {
        [
            x[1] * (1.0 - x[0] - x[1]) - x[0] * x[1],
            x[0] * (1.0 - x[0] - x[1]) - x[0] * x[1],
        ]
    };
    let velocity = velocity_from_stream_function(&mesh, 3, gradient);

    let psi = direct_solver()
        .stream_function(&velocity, BoundaryMode::Strong)
        .unwrap();
    let expected = Function::interpolate_scalar(psi.space().clone(), f);
    assert_matrix_eq!(psi.coefficients().clone(), expected.coefficients().clone(), comp = abs, tol = 1e-10);

    // The same field in weak mode only differs by the mean
    let psi = direct_solver()
        .stream_function(&velocity, BoundaryMode::Weak)
        .unwrap();
    assert_matrix_eq!(psi.coefficients().clone(), zero_mean_interpolant(&psi, f), comp = abs, tol = 1e-10);
}

#[test]
fn strong_mode_vanishes_on_boundary() {
    let mesh = Arc::new(create_unit_square_tri_mesh(4));
    let velocity = velocity_from_stream_function(&mesh, 2, |x| [PI * (PI * x[0]).cos(), 1.0 + x[0]]);
    let psi = direct_solver()
        .stream_function(&velocity, BoundaryMode::Strong)
        .unwrap();
    let boundary_nodes = psi.space().boundary_nodes();
    assert!(!boundary_nodes.is_empty());
    for node in boundary_nodes {
        assert_scalar_eq!(psi.coefficients()[node], 0.0, comp = abs, tol = 1e-12);
    }
    assert!(psi.coefficients().amax() > 1e-3);
}

#[test]
fn default_solver_agrees_with_direct_solve() {
    let mesh = Arc::new(create_unit_square_tri_mesh(6));
    let gradient = |x: &[f64]| {
        [
            PI * (PI * x[0]).cos() * (PI * x[1]).cos(),
            -PI * (PI * x[0]).sin() * (PI * x[1]).sin(),
        ]
    };
    let velocity = velocity_from_stream_function(&mesh, 2, gradient);

    for mode in [BoundaryMode::Weak, BoundaryMode::Strong] {
        let iterative = stream_function(&velocity, mode).unwrap();
        let direct = direct_solver().stream_function(&velocity, mode).unwrap();
        assert!(iterative.space().has_same_layout(direct.space()));
        let difference = (iterative.coefficients() - direct.coefficients()).amax();
        assert!(difference < 1e-3, "{:?}: difference {:e}", mode, difference);
    }
}

#[test]
fn packed_and_component_velocities_give_same_stream_function() {
    let mesh = Arc::new(create_unit_square_tri_mesh(3));
    let space = Arc::new(FunctionSpace::vector(mesh, 2).unwrap());
    let packed = Function::interpolate(space, |x, out| {
        out[0] = (PI * x[1]).sin();
        out[1] = x[0] * x[1];
    });
    let components = vec![packed.component(0).unwrap(), packed.component(1).unwrap()];

    let solver = direct_solver();
    let from_packed = solver
        .stream_function(&VelocityField::Packed(packed), BoundaryMode::Weak)
        .unwrap();
    let from_components = solver
        .stream_function(&VelocityField::Components(components), BoundaryMode::Weak)
        .unwrap();
    assert_matrix_eq!(
        from_packed.coefficients().clone(),
        from_components.coefficients().clone(),
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn dimension_is_checked_before_velocity() {
    let square = Arc::new(create_unit_square_tri_mesh(2));
    let cube = Arc::new(create_unit_cube_tet_mesh(1));

    // Two components on a 3D mesh is reported as a domain mismatch, not as a bad velocity
    let space = Arc::new(FunctionSpace::scalar(cube.clone(), 1).unwrap());
    let on_cube = VelocityField::Components(vec![Function::zeros(space.clone()), Function::zeros(space)]);
    let err = stream_function(&on_cube, BoundaryMode::Weak).unwrap_err();
    assert!(matches!(
        err,
        StreamFunctionError::DomainMismatch {
            expected: 2,
            actual: 3
        }
    ));
    assert_eq!(
        err.to_string(),
        "Stream function requires a 2-dimensional mesh, got dimension 3"
    );

    let on_square = velocity_from_stream_function(&square, 1, |_| [1.0, 0.0]);
    let err = stream_function_3d(&on_square, None).unwrap_err();
    assert!(matches!(
        err,
        StreamFunctionError::DomainMismatch {
            expected: 3,
            actual: 2
        }
    ));
}

#[test]
fn invalid_velocities_are_rejected() {
    let empty = VelocityField::Components(vec![]);
    assert!(matches!(
        stream_function(&empty, BoundaryMode::Weak),
        Err(StreamFunctionError::InvalidVelocity(_))
    ));
    assert!(matches!(
        stream_function_3d(&empty, None),
        Err(StreamFunctionError::InvalidVelocity(_))
    ));

    let square = Arc::new(create_unit_square_tri_mesh(2));
    let p1 = Arc::new(FunctionSpace::scalar(square.clone(), 1).unwrap());
    let p2 = Arc::new(FunctionSpace::scalar(square.clone(), 2).unwrap());
    let mixed = VelocityField::Components(vec![Function::zeros(p1.clone()), Function::zeros(p2)]);
    let err = stream_function(&mixed, BoundaryMode::Strong).unwrap_err();
    assert!(matches!(err, StreamFunctionError::InvalidVelocity(ref reason) if reason.contains("degree")));
    assert!(err.to_string().starts_with("Invalid velocity field"));

    let too_many = VelocityField::Components(vec![
        Function::zeros(p1.clone()),
        Function::zeros(p1.clone()),
        Function::zeros(p1),
    ]);
    assert!(matches!(
        stream_function(&too_many, BoundaryMode::Weak),
        Err(StreamFunctionError::InvalidVelocity(_))
    ));

    let cube = Arc::new(create_unit_cube_tet_mesh(1));
    let packed = Function::zeros(Arc::new(FunctionSpace::scalar(cube, 1).unwrap()));
    assert!(matches!(
        stream_function_3d(&VelocityField::Packed(packed), None),
        Err(StreamFunctionError::InvalidVelocity(_))
    ));
}

#[test]
fn zero_velocity_gives_zero_stream_function() {
    let mesh = Arc::new(create_unit_square_tri_mesh(3));
    let velocity = velocity_from_stream_function(&mesh, 2, |_| [0.0, 0.0]);
    for mode in [BoundaryMode::Weak, BoundaryMode::Strong] {
        let psi = stream_function(&velocity, mode).unwrap();
        assert_eq!(psi.coefficients().amax(), 0.0);
    }
}

#[test]
fn iteration_budget_exhaustion_is_reported() {
    let mesh = Arc::new(create_unit_square_tri_mesh(8));
    let velocity = velocity_from_stream_function(&mesh, 1, |x| [(PI * x[0]).cos(), x[0] * x[1]]);
    let settings = SolverSettings {
        method: SolverMethod::Gmres,
        preconditioner: PreconditionerKind::None,
        max_iterations: 1,
        ..SolverSettings::planar_default()
    };
    let solver = StreamFunctionSolver::new().with_planar_settings(settings);
    let err = solver
        .stream_function(&velocity, BoundaryMode::Weak)
        .unwrap_err();
    assert!(matches!(err, StreamFunctionError::NonConvergence { iterations: 1, .. }));

    let mesh = Arc::new(create_unit_cube_tet_mesh(2));
    let velocity = velocity_from_vector_potential(&mesh, 1, |_| [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    let settings = SolverSettings {
        preconditioner: PreconditionerKind::None,
        max_iterations: 1,
        ..SolverSettings::spatial_default()
    };
    let solver = StreamFunctionSolver::new().with_spatial_settings(settings);
    let err = solver.stream_function_3d(&velocity, None).unwrap_err();
    assert!(matches!(err, StreamFunctionError::NonConvergence { iterations: 1, .. }));
}

#[test]
fn vector_potential_of_linear_field() {
    // g = (y, z, x) is divergence free with curl(g) = (-1, -1, -1)
    let mesh = Arc::new(create_unit_cube_tet_mesh(2));
    let velocity = velocity_from_vector_potential(&mesh, 1, |_| [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    let psi = direct_solver().stream_function_3d(&velocity, None).unwrap();

    assert_eq!(psi.value_size(), 3);
    assert_eq!(psi.degree(), 1);
    assert_eq!(psi.space().num_nodes(), 27);
    assert!(max_curl_error(&psi, |_| [-1.0, -1.0, -1.0]) < 1e-9);
    assert_matrix_eq!(psi.mean().unwrap(), DVector::<f64>::zeros(3), comp = abs, tol = 1e-10);
}

#[test]
fn vector_potential_of_quadratic_field() {
    // g = (y^2, z^2, x^2) is divergence free with curl(g) = (-2z, -2x, -2y)
    let mesh = Arc::new(create_unit_cube_tet_mesh(1));
    let jacobian = |x: &[f64]| [[0.0, 2.0 * x[1], 0.0], [0.0, 0.0, 2.0 * x[2]], [2.0 * x[0], 0.0, 0.0]];
    let velocity = velocity_from_vector_potential(&mesh, 2, jacobian);
    let psi = direct_solver().stream_function_3d(&velocity, None).unwrap();

    assert_eq!(psi.degree(), 2);
    assert!(max_curl_error(&psi, |x| [-2.0 * x[2], -2.0 * x[0], -2.0 * x[1]]) < 1e-9);
    assert_matrix_eq!(psi.mean().unwrap(), DVector::<f64>::zeros(3), comp = abs, tol = 1e-10);
}

#[test]
fn default_spatial_solver_reproduces_curl() {
    let mesh = Arc::new(create_unit_cube_tet_mesh(2));
    let velocity = velocity_from_vector_potential(&mesh, 1, |_| [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    let psi = stream_function_3d(&velocity, None).unwrap();
    assert!(max_curl_error(&psi, |_| [-1.0, -1.0, -1.0]) < 1e-5);
}

#[test]
fn periodic_vector_potential() {
    // g = (sin 2πy, sin 2πz, sin 2πx) is periodic and divergence free
    let mesh = Arc::new(create_unit_cube_tet_mesh(4));
    let k = 2.0 * PI;
    let jacobian = move |x: &[f64]| {
        [
            [0.0, k * (k * x[1]).cos(), 0.0],
            [0.0, 0.0, k * (k * x[2]).cos()],
            [k * (k * x[0]).cos(), 0.0, 0.0],
        ]
    };
    let velocity = velocity_from_vector_potential(&mesh, 1, jacobian);
    let periodic = PeriodicBoundary::fully_periodic(vec![0.0; 3], vec![1.0; 3]).unwrap();

    let psi = direct_solver()
        .stream_function_3d(&velocity, Some(&periodic))
        .unwrap();
    assert!(psi.space().is_constrained());
    assert_eq!(psi.space().num_nodes(), 64);
    assert_eq!(psi.coefficients().len(), 192);
    assert_matrix_eq!(psi.mean().unwrap(), DVector::<f64>::zeros(3), comp = abs, tol = 1e-10);

    // |u| reaches 2π, which is also the error of a vanishing potential. A coarse but
    // correct potential stays well below that.
    assert!(psi.coefficients().amax() > 0.1);
    let u = |x: &[f64]| [-k * (k * x[2]).cos(), -k * (k * x[0]).cos(), -k * (k * x[1]).cos()];
    let error = max_curl_error(&psi, u);
    assert!(error < 0.6 * k, "curl error {} on periodic cube", error);
}

#[test]
fn velocity_on_mesh_without_cells() {
    let mesh = Arc::new(create_unit_square_tri_mesh(0));
    let velocity = velocity_from_stream_function(&mesh, 1, |_| [1.0, 0.0]);
    for mode in [BoundaryMode::Weak, BoundaryMode::Strong] {
        let psi = stream_function(&velocity, mode).unwrap();
        assert_eq!(psi.coefficients().len(), 0);
    }
}

#[test]
fn stagnation_is_reported_as_non_convergence() {
    // GMRES(1) cannot reduce the residual of a rotation
    let rotation = CsrMatrix::from(&DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -1.0, 0.0]));
    let b = DVector::from_column_slice(&[1.0, 0.0]);
    let mut x = DVector::zeros(2);
    let err = Gmres::new()
        .with_operator(&rotation)
        .with_restart(1)
        .solve_with_guess(&b, &mut x)
        .unwrap_err();
    assert!(matches!(err.kind, SolveErrorKind::Stagnation));
    assert!(matches!(
        StreamFunctionError::from(err),
        StreamFunctionError::NonConvergence { iterations: 1, .. }
    ));
}

#[test]
fn settings_presets() {
    insta::assert_debug_snapshot!(SolverSettings::planar_default(), @r###"
    SolverSettings {
        method: Gmres,
        preconditioner: Amg,
        monitor_convergence: false,
        max_iterations: 10000,
        relative_tolerance: 1e-6,
        absolute_tolerance: 1e-15,
        gmres_restart: 30,
    }
    "###);
    insta::assert_debug_snapshot!(SolverSettings::spatial_default(), @r###"
    SolverSettings {
        method: BiCgStab,
        preconditioner: Ilu0,
        monitor_convergence: true,
        max_iterations: 500,
        relative_tolerance: 1e-8,
        absolute_tolerance: 1e-8,
        gmres_restart: 30,
    }
    "###);
    assert_eq!(SolverSettings::default(), SolverSettings::planar_default());
    assert_eq!(StreamFunctionSolver::default().spatial_settings(), &SolverSettings::spatial_default());
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: SolverSettings = serde_json::from_str(r#"{ "method": "Direct", "max_iterations": 20 }"#).unwrap();
    assert_eq!(
        settings,
        SolverSettings {
            method: SolverMethod::Direct,
            max_iterations: 20,
            ..SolverSettings::planar_default()
        }
    );
    assert_eq!(serde_json::to_string(&BoundaryMode::default()).unwrap(), r#""Weak""#);
}
