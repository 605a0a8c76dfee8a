use crate::precond::{check_square, SetupError};
use crate::{LinearOperator, OperatorError};
use log::warn;
use nalgebra_sparse::CsrMatrix;

/// Pivots smaller than this, relative to the largest magnitude in their row, are perturbed.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Incomplete LU factorization with zero fill-in.
///
/// `L` (unit lower triangular) and `U` share the sparsity pattern of the factored matrix.
/// Vanishing pivots are replaced by a small multiple of the row scale, which keeps the factors
/// usable for singular operators such as pure Neumann problems.
#[derive(Debug, Clone)]
pub struct Ilu0 {
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
    diagonal: Vec<usize>,
}

impl Ilu0 {
    pub fn factor(matrix: &CsrMatrix<f64>) -> Result<Self, SetupError> {
        let n = matrix.nrows();
        check_square(n, matrix.ncols())?;

        let row_offsets = matrix.row_offsets().to_vec();
        let col_indices = matrix.col_indices().to_vec();
        let mut values = matrix.values().to_vec();

        let diagonal = (0..n)
            .map(|i| {
                (row_offsets[i]..row_offsets[i + 1])
                    .find(|&idx| col_indices[idx] == i)
                    .ok_or(SetupError::MissingDiagonal { row: i })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Position of each column in the current row, or usize::MAX
        let mut position = vec![usize::MAX; n];
        let mut num_perturbed = 0;

        for i in 0..n {
            let row = row_offsets[i]..row_offsets[i + 1];
            let row_scale = values[row.clone()]
                .iter()
                .fold(0.0_f64, |max, v| max.max(v.abs()));
            for idx in row.clone() {
                position[col_indices[idx]] = idx;
            }

            for idx in row.clone() {
                let k = col_indices[idx];
                if k >= i {
                    break;
                }
                let l_ik = values[idx] / values[diagonal[k]];
                values[idx] = l_ik;
                for k_idx in (diagonal[k] + 1)..row_offsets[k + 1] {
                    let pos = position[col_indices[k_idx]];
                    if pos != usize::MAX {
                        values[pos] -= l_ik * values[k_idx];
                    }
                }
            }

            let pivot = &mut values[diagonal[i]];
            let threshold = PIVOT_TOLERANCE * row_scale;
            if pivot.abs() <= threshold || row_scale == 0.0 {
                let replacement = if row_scale == 0.0 { 1.0 } else { threshold };
                *pivot = if *pivot < 0.0 { -replacement } else { replacement };
                num_perturbed += 1;
            }

            for idx in row {
                position[col_indices[idx]] = usize::MAX;
            }
        }

        if num_perturbed > 0 {
            warn!("ILU(0): perturbed {} small pivots out of {}", num_perturbed, n);
        }

        Ok(Self {
            row_offsets,
            col_indices,
            values,
            diagonal,
        })
    }
}

impl LinearOperator for Ilu0 {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        let n = self.diagonal.len();
        if y.len() != n || x.len() != n {
            return Err("dimension mismatch in ILU(0) preconditioner".into());
        }

        // Forward substitution with unit lower triangular L
        for i in 0..n {
            let mut sum = x[i];
            for idx in self.row_offsets[i]..self.diagonal[i] {
                sum -= self.values[idx] * y[self.col_indices[idx]];
            }
            y[i] = sum;
        }

        // Backward substitution with U
        for i in (0..n).rev() {
            let mut sum = y[i];
            for idx in (self.diagonal[i] + 1)..self.row_offsets[i + 1] {
                sum -= self.values[idx] * y[self.col_indices[idx]];
            }
            y[i] = sum / self.values[self.diagonal[i]];
        }

        Ok(())
    }
}
