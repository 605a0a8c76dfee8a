use crate::precond::{check_square, SetupError};
use crate::{LinearOperator, OperatorError};
use nalgebra_sparse::CsrMatrix;

/// Diagonal (Jacobi) preconditioner.
///
/// Rows with a zero or missing diagonal entry are passed through unchanged.
#[derive(Debug, Clone)]
pub struct Jacobi {
    inverse_diagonal: Vec<f64>,
}

impl Jacobi {
    pub fn from_csr(matrix: &CsrMatrix<f64>) -> Result<Self, SetupError> {
        check_square(matrix.nrows(), matrix.ncols())?;
        let inverse_diagonal = diagonal(matrix)
            .into_iter()
            .map(|d| if d != 0.0 { 1.0 / d } else { 1.0 })
            .collect();
        Ok(Self { inverse_diagonal })
    }

    pub fn inverse_diagonal(&self) -> &[f64] {
        &self.inverse_diagonal
    }
}

impl LinearOperator for Jacobi {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        if y.len() != self.inverse_diagonal.len() || x.len() != self.inverse_diagonal.len() {
            return Err("dimension mismatch in Jacobi preconditioner".into());
        }
        for ((y_i, x_i), d_i) in y.iter_mut().zip(x).zip(&self.inverse_diagonal) {
            *y_i = d_i * x_i;
        }
        Ok(())
    }
}

/// The diagonal of a square CSR matrix, with zeros for missing entries.
pub fn diagonal(matrix: &CsrMatrix<f64>) -> Vec<f64> {
    matrix
        .row_iter()
        .enumerate()
        .map(|(i, row)| {
            row.col_indices()
                .iter()
                .position(|&j| j == i)
                .map(|k| row.values()[k])
                .unwrap_or(0.0)
        })
        .collect()
}
