use crate::{SolveError, SolveErrorKind, SolveOutput};
use nalgebra::DVector;
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;

/// Solves `A x = b` through a dense singular value decomposition.
///
/// Singular values below `1e-12` times the largest one are discarded, so for a consistent
/// singular system the minimum-norm solution is returned. Intended for small systems and tests.
pub fn solve_dense(matrix: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<(DVector<f64>, SolveOutput), SolveError> {
    assert_eq!(matrix.nrows(), b.len());
    let mut output = SolveOutput::new();
    let dense = convert_csr_dense(matrix);
    let svd = dense.clone().svd(true, true);
    let eps = 1e-12 * svd.singular_values.max();

    let x = svd
        .solve(b, eps)
        .map_err(|reason| SolveError::new(output.clone(), SolveErrorKind::Breakdown(reason)))?;
    output.residual_norm = (b - &dense * &x).norm();
    Ok((x, output))
}
