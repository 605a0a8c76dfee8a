use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// Error type returned by operators.
pub type OperatorError = Box<dyn Error + Send + Sync>;

/// A linear map `y = A x`.
pub trait LinearOperator {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError>;
}

impl<'a, A> LinearOperator for &'a A
where
    A: ?Sized + LinearOperator,
{
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        <A as LinearOperator>::apply(self, y, x)
    }
}

impl<A> LinearOperator for Box<A>
where
    A: ?Sized + LinearOperator,
{
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        <A as LinearOperator>::apply(self, y, x)
    }
}

fn check_dimensions(nrows: usize, ncols: usize, y: &[f64], x: &[f64]) -> Result<(), OperatorError> {
    if y.len() != nrows || x.len() != ncols {
        Err(format!(
            "dimension mismatch: operator is {}x{}, got input of length {} and output of length {}",
            nrows,
            ncols,
            x.len(),
            y.len()
        )
        .into())
    } else {
        Ok(())
    }
}

impl LinearOperator for CsrMatrix<f64> {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        check_dimensions(self.nrows(), self.ncols(), y, x)?;
        spmv(self, y, x);
        Ok(())
    }
}

impl LinearOperator for DMatrix<f64> {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        check_dimensions(self.nrows(), self.ncols(), y, x)?;
        for (i, y_i) in y.iter_mut().enumerate() {
            *y_i = self.row(i).iter().zip(x).map(|(a, b)| a * b).sum();
        }
        Ok(())
    }
}

/// The identity operator, `y = x`.
#[derive(Debug, Copy, Clone, Default)]
pub struct IdentityOperator;

impl LinearOperator for IdentityOperator {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        check_dimensions(y.len(), y.len(), y, x)?;
        y.copy_from_slice(x);
        Ok(())
    }
}

/// Sparse matrix-vector product `y = A x`.
///
/// # Panics
///
/// Panics if the dimensions of `y` and `x` do not match the matrix.
pub fn spmv(matrix: &CsrMatrix<f64>, y: &mut [f64], x: &[f64]) {
    assert_eq!(y.len(), matrix.nrows());
    assert_eq!(x.len(), matrix.ncols());
    let offsets = matrix.row_offsets();
    let indices = matrix.col_indices();
    let values = matrix.values();
    for (i, y_i) in y.iter_mut().enumerate() {
        let range = offsets[i]..offsets[i + 1];
        *y_i = indices[range.clone()]
            .iter()
            .zip(&values[range])
            .map(|(&j, &a_ij)| a_ij * x[j])
            .sum();
    }
}
