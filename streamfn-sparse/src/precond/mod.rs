//! Preconditioners, applied as approximations of `A^-1`.
use core::fmt;

mod amg;
mod ilu;
mod jacobi;

pub use amg::*;
pub use ilu::*;
pub use jacobi::*;

/// Error produced while setting up a preconditioner.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SetupError {
    NotSquare { nrows: usize, ncols: usize },
    MissingDiagonal { row: usize },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSquare { nrows, ncols } => {
                write!(f, "Preconditioner requires a square matrix, got {}x{}", nrows, ncols)
            }
            Self::MissingDiagonal { row } => {
                write!(f, "Row {} has no diagonal entry in the sparsity pattern", row)
            }
        }
    }
}

impl std::error::Error for SetupError {}

pub(crate) fn check_square(nrows: usize, ncols: usize) -> Result<(), SetupError> {
    if nrows == ncols {
        Ok(())
    } else {
        Err(SetupError::NotSquare { nrows, ncols })
    }
}
