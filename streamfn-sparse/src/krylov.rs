use crate::{LinearOperator, OperatorError};
use core::fmt;
use nalgebra::DVector;

/// Residual tolerance `||r|| <= max(atol, rtol * ||b||)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResidualCriterion {
    pub rtol: f64,
    pub atol: f64,
}

impl ResidualCriterion {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    pub fn has_converged(&self, residual_norm: f64, b_norm: f64) -> bool {
        residual_norm <= self.atol.max(self.rtol * b_norm)
    }
}

impl Default for ResidualCriterion {
    fn default() -> Self {
        Self::new(1e-12, 1e-25)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutput {
    /// Number of Krylov iterations performed.
    pub num_iterations: usize,
    /// Norm of the residual at termination.
    ///
    /// For converged solves this is the residual tracked by the method, which may differ
    /// slightly from the true residual `b - Ax`.
    pub residual_norm: f64,
}

impl SolveOutput {
    pub(crate) fn new() -> Self {
        Self {
            num_iterations: 0,
            residual_norm: 0.0,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(OperatorError),
    PreconditionerError(OperatorError),
    MaxIterationsReached { max_iter: usize },
    /// A full restart cycle did not reduce the true residual.
    Stagnation,
    /// The method cannot make further progress, e.g. due to a vanishing inner product.
    Breakdown(&'static str),
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
            Self::Stagnation => write!(f, "Residual did not decrease over a restart cycle."),
            Self::Breakdown(reason) => write!(f, "Breakdown: {}", reason),
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError {
    pub output: SolveOutput,
    pub kind: SolveErrorKind,
}

impl SolveError {
    pub(crate) fn new(output: SolveOutput, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solve failed after {} iterations (residual norm {:e}). ",
            self.output.num_iterations, self.output.residual_norm
        )?;
        write!(f, "Error: {}", self.kind)
    }
}

impl std::error::Error for SolveError {}

/// y = Ax
pub(crate) fn apply_operator<A: LinearOperator>(
    y: &mut DVector<f64>,
    a: &A,
    x: &DVector<f64>,
) -> Result<(), OperatorError> {
    a.apply(y.as_mut_slice(), x.as_slice())
}

/// r = b - Ax
pub(crate) fn compute_residual<A: LinearOperator>(
    r: &mut DVector<f64>,
    a: &A,
    x: &DVector<f64>,
    b: &DVector<f64>,
) -> Result<(), OperatorError> {
    apply_operator(r, a, x)?;
    for (r_i, b_i) in r.iter_mut().zip(b.iter()) {
        *r_i = b_i - *r_i;
    }
    Ok(())
}
