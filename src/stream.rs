//! Stream functions of two- and three-dimensional velocity fields.
//!
//! In two dimensions the stream function is the scalar `psi` with `grad(psi) = (-u_y, u_x)`,
//! obtained from the Poisson problem `-Δpsi = curl(u)`. With [`BoundaryMode::Weak`] the
//! boundary flux `∂psi/∂n = n_y u_x - n_x u_y` is imposed naturally and the solution is fixed
//! to zero mean, while [`BoundaryMode::Strong`] sets `psi = 0` on the boundary.
//!
//! In three dimensions the stream function is the vector potential `psi` with
//! `curl(psi) = u`, found from the vector Laplacian with natural boundary terms. A constant
//! vector Lagrange multiplier removes the constant null space by requiring each component of
//! `psi` to have zero mean.
use crate::assembly::global::{
    apply_homogeneous_dirichlet_bc_csr, apply_homogeneous_dirichlet_bc_rhs, augment_with_real_multipliers,
    normalize_mean, CsrAssembler, VectorAssembler,
};
use crate::assembly::local::{
    BasisIntegralAssembler, BasisTable, BoundaryCrossAssembler, BoundaryGradientTransposeAssembler,
    CurlSourceAssembler, LaplaceAssembler,
};
use crate::space::{ConstrainedDomain, Function, FunctionSpaceBuilder};
use crate::velocity::{ResolvedVelocity, VelocityField};
use log::{debug, info};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use streamfn_sparse::precond::{AmgPreconditioner, Ilu0, Jacobi};
use streamfn_sparse::{
    solve_dense, BiCgStab, Gmres, IdentityOperator, LinearOperator, ResidualCriterion, SolveError, SolveErrorKind,
};

/// How the boundary is treated in the two-dimensional problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Natural boundary flux from the velocity, with the solution fixed to zero mean.
    #[default]
    Weak,
    /// Homogeneous Dirichlet condition on the whole boundary.
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMethod {
    /// Dense SVD solve, only suitable for small systems.
    Direct,
    Gmres,
    BiCgStab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconditionerKind {
    None,
    Jacobi,
    Ilu0,
    Amg,
}

/// Settings of the linear solver used for one of the problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub method: SolverMethod,
    pub preconditioner: PreconditionerKind,
    /// Log the residual of every iteration.
    pub monitor_convergence: bool,
    pub max_iterations: usize,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub gmres_restart: usize,
}

impl SolverSettings {
    /// GMRES with algebraic multigrid, used for the two-dimensional problem.
    pub fn planar_default() -> Self {
        Self {
            method: SolverMethod::Gmres,
            preconditioner: PreconditionerKind::Amg,
            monitor_convergence: false,
            max_iterations: 10000,
            relative_tolerance: 1e-6,
            absolute_tolerance: 1e-15,
            gmres_restart: 30,
        }
    }

    /// BiCGStab with ILU(0), used for the three-dimensional problem.
    pub fn spatial_default() -> Self {
        Self {
            method: SolverMethod::BiCgStab,
            preconditioner: PreconditionerKind::Ilu0,
            monitor_convergence: true,
            max_iterations: 500,
            relative_tolerance: 1e-8,
            absolute_tolerance: 1e-8,
            gmres_restart: 30,
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::planar_default()
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum StreamFunctionError {
    /// The mesh of the velocity field has the wrong geometric dimension.
    DomainMismatch { expected: usize, actual: usize },
    InvalidVelocity(String),
    /// The iterative solver exhausted its iteration budget or stopped making progress.
    NonConvergence { iterations: usize, residual_norm: f64 },
    Solver(String),
    Assembly(eyre::Report),
}

impl fmt::Display for StreamFunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomainMismatch { expected, actual } => write!(
                f,
                "Stream function requires a {}-dimensional mesh, got dimension {}",
                expected, actual
            ),
            Self::InvalidVelocity(reason) => write!(f, "Invalid velocity field: {}", reason),
            Self::NonConvergence {
                iterations,
                residual_norm,
            } => write!(
                f,
                "Linear solver did not converge in {} iterations (residual norm {:e})",
                iterations, residual_norm
            ),
            Self::Solver(reason) => write!(f, "Linear solver failed: {}", reason),
            Self::Assembly(report) => write!(f, "Assembly failed: {}", report),
        }
    }
}

impl std::error::Error for StreamFunctionError {}

impl From<eyre::Report> for StreamFunctionError {
    fn from(report: eyre::Report) -> Self {
        Self::Assembly(report)
    }
}

impl From<SolveError> for StreamFunctionError {
    fn from(error: SolveError) -> Self {
        match error.kind {
            SolveErrorKind::MaxIterationsReached { .. } | SolveErrorKind::Stagnation => Self::NonConvergence {
                iterations: error.output.num_iterations,
                residual_norm: error.output.residual_norm,
            },
            _ => Self::Solver(error.to_string()),
        }
    }
}

/// Computes stream functions with configurable linear solvers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFunctionSolver {
    planar: SolverSettings,
    spatial: SolverSettings,
}

impl Default for StreamFunctionSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFunctionSolver {
    pub fn new() -> Self {
        Self {
            planar: SolverSettings::planar_default(),
            spatial: SolverSettings::spatial_default(),
        }
    }

    pub fn with_planar_settings(self, planar: SolverSettings) -> Self {
        Self { planar, ..self }
    }

    pub fn with_spatial_settings(self, spatial: SolverSettings) -> Self {
        Self { spatial, ..self }
    }

    pub fn planar_settings(&self) -> &SolverSettings {
        &self.planar
    }

    pub fn spatial_settings(&self) -> &SolverSettings {
        &self.spatial
    }

    /// Computes the scalar stream function of a two-dimensional velocity field.
    ///
    /// The result lives in a scalar Lagrange space of the same degree as the velocity.
    pub fn stream_function(
        &self,
        velocity: &VelocityField,
        mode: BoundaryMode,
    ) -> Result<Function, StreamFunctionError> {
        check_dimension(velocity, 2)?;
        let velocity = ResolvedVelocity::resolve(velocity, 2).map_err(StreamFunctionError::InvalidVelocity)?;
        let space = velocity.space.clone();
        let table = BasisTable::for_products(space.basis())?;

        let mut matrix = CsrAssembler.assemble(&LaplaceAssembler::new(&space, &table, 1))?;
        let mut rhs = VectorAssembler.assemble_vector(&CurlSourceAssembler::new(&space, &velocity, &table))?;
        match mode {
            BoundaryMode::Weak => {
                VectorAssembler.assemble_vector_into(&mut rhs, &BoundaryCrossAssembler::new(&space, &velocity, &table))?;
                normalize_mean(&mut rhs);
            }
            BoundaryMode::Strong => {
                let boundary_dofs = space.boundary_dofs();
                apply_homogeneous_dirichlet_bc_csr(&mut matrix, &boundary_dofs)?;
                apply_homogeneous_dirichlet_bc_rhs(&mut rhs, &boundary_dofs);
            }
        }
        debug!(
            "Assembled 2D stream function system ({:?}): {} unknowns, {} nonzeros",
            mode,
            matrix.nrows(),
            matrix.nnz()
        );

        let coefficients = solve_linear_system(&matrix, &rhs, &self.planar)?;
        let mut psi = Function::from_coefficients(space, coefficients)?;
        // A mesh without cells has no mean to remove
        if mode == BoundaryMode::Weak && !psi.coefficients().is_empty() {
            let mean = psi.mean()?[0];
            psi.coefficients_mut().add_scalar_mut(-mean);
        }
        Ok(psi)
    }

    /// Computes the vector stream function (vector potential) of a three-dimensional
    /// velocity field.
    ///
    /// If a constrained domain is given, e.g. a [`PeriodicBoundary`](crate::space::PeriodicBoundary),
    /// the stream function is sought in the correspondingly constrained space.
    pub fn stream_function_3d(
        &self,
        velocity: &VelocityField,
        constrained_domain: Option<&dyn ConstrainedDomain>,
    ) -> Result<Function, StreamFunctionError> {
        check_dimension(velocity, 3)?;
        let velocity = ResolvedVelocity::resolve(velocity, 3).map_err(StreamFunctionError::InvalidVelocity)?;
        let mesh = velocity.space.mesh().clone();
        let space = FunctionSpaceBuilder::new(mesh, velocity.space.degree())
            .with_value_size(3)
            .with_constrained_domain(constrained_domain)
            .build()?;
        let table = BasisTable::for_products(space.basis())?;

        let assembler = CsrAssembler;
        let mut matrix = assembler.assemble(&LaplaceAssembler::new(&space, &table, 3))?;
        assembler.assemble_into_csr(&mut matrix, &BoundaryGradientTransposeAssembler::new(&space, &table))?;
        let weights = VectorAssembler.assemble_vector(&BasisIntegralAssembler::new(&space, &table))?;
        let matrix = augment_with_real_multipliers(&matrix, &weights, 3)?;

        let mut rhs = VectorAssembler.assemble_vector(&CurlSourceAssembler::new(&space, &velocity, &table))?;
        VectorAssembler.assemble_vector_into(&mut rhs, &BoundaryCrossAssembler::new(&space, &velocity, &table))?;
        let num_dofs = rhs.len();
        let rhs = rhs.resize_vertically(num_dofs + 3, 0.0);
        debug!(
            "Assembled 3D stream function system: {} unknowns, {} nonzeros",
            matrix.nrows(),
            matrix.nnz()
        );

        let solution = solve_linear_system(&matrix, &rhs, &self.spatial)?;
        let multiplier = solution.rows(num_dofs, 3);
        debug!("Lagrange multiplier magnitude: {:e}", multiplier.norm());

        let coefficients = solution.rows(0, num_dofs).clone_owned();
        Ok(Function::from_coefficients(Arc::new(space), coefficients)?)
    }
}

/// Computes the stream function of a two-dimensional velocity field with default solver
/// settings.
pub fn stream_function(velocity: &VelocityField, mode: BoundaryMode) -> Result<Function, StreamFunctionError> {
    StreamFunctionSolver::new().stream_function(velocity, mode)
}

/// Computes the vector stream function of a three-dimensional velocity field with default
/// solver settings.
pub fn stream_function_3d(
    velocity: &VelocityField,
    constrained_domain: Option<&dyn ConstrainedDomain>,
) -> Result<Function, StreamFunctionError> {
    StreamFunctionSolver::new().stream_function_3d(velocity, constrained_domain)
}

fn check_dimension(velocity: &VelocityField, expected: usize) -> Result<(), StreamFunctionError> {
    let actual = velocity
        .geometry_dim()
        .ok_or_else(|| StreamFunctionError::InvalidVelocity("velocity field has no components".to_string()))?;
    if actual != expected {
        return Err(StreamFunctionError::DomainMismatch { expected, actual });
    }
    Ok(())
}

fn solve_linear_system(
    matrix: &CsrMatrix<f64>,
    rhs: &DVector<f64>,
    settings: &SolverSettings,
) -> Result<DVector<f64>, StreamFunctionError> {
    let n = rhs.len();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }

    let method = settings.method;
    if method == SolverMethod::Direct {
        let (x, output) = solve_dense(matrix, rhs)?;
        debug!("Direct solve finished with residual norm {:e}", output.residual_norm);
        return Ok(x);
    }

    let setup_error = |err| StreamFunctionError::Solver(format!("preconditioner setup failed: {}", err));
    let preconditioner: Box<dyn LinearOperator> = match settings.preconditioner {
        PreconditionerKind::None => Box::new(IdentityOperator),
        PreconditionerKind::Jacobi => Box::new(Jacobi::from_csr(matrix).map_err(setup_error)?),
        PreconditionerKind::Ilu0 => Box::new(Ilu0::factor(matrix).map_err(setup_error)?),
        PreconditionerKind::Amg => Box::new(AmgPreconditioner::from_csr(matrix).map_err(setup_error)?),
    };
    let criterion = ResidualCriterion::new(settings.relative_tolerance, settings.absolute_tolerance);

    let mut x = DVector::zeros(n);
    let output = match method {
        SolverMethod::BiCgStab => BiCgStab::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_stopping_criterion(criterion)
            .with_max_iter(settings.max_iterations)
            .with_monitor(settings.monitor_convergence)
            .solve_with_guess(rhs, &mut x)?,
        _ => Gmres::new()
            .with_operator(matrix)
            .with_preconditioner(preconditioner)
            .with_stopping_criterion(criterion)
            .with_max_iter(settings.max_iterations)
            .with_restart(settings.gmres_restart)
            .with_monitor(settings.monitor_convergence)
            .solve_with_guess(rhs, &mut x)?,
    };
    info!(
        "{:?} ({:?}) converged in {} iterations, residual norm {:e}",
        method, settings.preconditioner, output.num_iterations, output.residual_norm
    );
    Ok(x)
}
