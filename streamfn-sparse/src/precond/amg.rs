use crate::precond::{check_square, diagonal, SetupError};
use crate::{spmv, LinearOperator, OperatorError};
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Parameters of the smoothed aggregation hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct AmgSettings {
    /// Threshold for strong connections, `|a_ij| >= theta sqrt(|a_ii a_jj|)`.
    pub strength_threshold: f64,
    pub max_levels: usize,
    /// Coarsening stops once a level has at most this many unknowns.
    pub coarse_size: usize,
    pub smoothing_steps: usize,
}

impl Default for AmgSettings {
    fn default() -> Self {
        Self {
            strength_threshold: 0.08,
            max_levels: 10,
            coarse_size: 64,
            smoothing_steps: 1,
        }
    }
}

/// Levels larger than this are not factored densely on the coarsest level.
const MAX_DENSE_COARSE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct Level {
    matrix: CsrMatrix<f64>,
    inverse_diagonal: Vec<f64>,
    omega: f64,
    prolongation: CsrMatrix<f64>,
    restriction: CsrMatrix<f64>,
}

#[derive(Debug, Clone)]
enum CoarseSolver {
    PseudoInverse(DMatrix<f64>),
    Smoother {
        matrix: CsrMatrix<f64>,
        inverse_diagonal: Vec<f64>,
        omega: f64,
    },
}

/// Smoothed aggregation algebraic multigrid, applied as a single V-cycle.
#[derive(Debug, Clone)]
pub struct AmgPreconditioner {
    levels: Vec<Level>,
    coarse: CoarseSolver,
    smoothing_steps: usize,
}

impl AmgPreconditioner {
    pub fn from_csr(matrix: &CsrMatrix<f64>) -> Result<Self, SetupError> {
        Self::with_settings(matrix, &AmgSettings::default())
    }

    pub fn with_settings(matrix: &CsrMatrix<f64>, settings: &AmgSettings) -> Result<Self, SetupError> {
        check_square(matrix.nrows(), matrix.ncols())?;

        let mut levels = Vec::new();
        let mut current = matrix.clone();
        while levels.len() + 1 < settings.max_levels.max(1) && current.nrows() > settings.coarse_size {
            let inverse_diagonal = inverse_diagonal(&current);
            let omega = jacobi_weight(&current, &inverse_diagonal);
            let strong = strong_connections(&current, settings.strength_threshold);
            let (aggregates, num_aggregates) = aggregate(&strong);
            if num_aggregates == 0 || num_aggregates >= current.nrows() {
                break;
            }

            let tentative = tentative_prolongation(&aggregates, num_aggregates);
            let prolongation = smooth_prolongation(&current, &tentative, &inverse_diagonal, omega);
            let restriction = prolongation.transpose();
            let coarse = &(&restriction * &current) * &prolongation;
            debug!(
                "AMG level {}: {} unknowns, {} nonzeros, coarsened to {}",
                levels.len(),
                current.nrows(),
                current.nnz(),
                num_aggregates
            );

            levels.push(Level {
                matrix: current,
                inverse_diagonal,
                omega,
                prolongation,
                restriction,
            });
            current = coarse;
        }

        let coarse = if current.nrows() <= MAX_DENSE_COARSE_SIZE {
            CoarseSolver::PseudoInverse(pseudo_inverse(&current))
        } else {
            let inverse_diagonal = inverse_diagonal(&current);
            let omega = jacobi_weight(&current, &inverse_diagonal);
            CoarseSolver::Smoother {
                matrix: current,
                inverse_diagonal,
                omega,
            }
        };

        Ok(Self {
            levels,
            coarse,
            smoothing_steps: settings.smoothing_steps.max(1),
        })
    }

    /// Number of levels, including the coarsest.
    pub fn num_levels(&self) -> usize {
        self.levels.len() + 1
    }

    fn dim(&self) -> usize {
        match (self.levels.first(), &self.coarse) {
            (Some(level), _) => level.matrix.nrows(),
            (None, CoarseSolver::PseudoInverse(inverse)) => inverse.nrows(),
            (None, CoarseSolver::Smoother { matrix, .. }) => matrix.nrows(),
        }
    }

    fn cycle(&self, level_index: usize, b: &[f64], x: &mut [f64]) {
        let level = match self.levels.get(level_index) {
            Some(level) => level,
            None => return self.solve_coarse(b, x),
        };

        let n = b.len();
        let mut r = vec![0.0; n];
        x.iter_mut().for_each(|x_i| *x_i = 0.0);
        for _ in 0..self.smoothing_steps {
            jacobi_sweep(&level.matrix, &level.inverse_diagonal, level.omega, b, x, &mut r);
        }

        residual(&level.matrix, b, x, &mut r);
        let nc = level.restriction.nrows();
        let mut coarse_b = vec![0.0; nc];
        let mut coarse_x = vec![0.0; nc];
        spmv(&level.restriction, &mut coarse_b, &r);
        self.cycle(level_index + 1, &coarse_b, &mut coarse_x);
        spmv(&level.prolongation, &mut r, &coarse_x);
        for (x_i, e_i) in x.iter_mut().zip(&r) {
            *x_i += e_i;
        }

        for _ in 0..self.smoothing_steps {
            jacobi_sweep(&level.matrix, &level.inverse_diagonal, level.omega, b, x, &mut r);
        }
    }

    fn solve_coarse(&self, b: &[f64], x: &mut [f64]) {
        match &self.coarse {
            CoarseSolver::PseudoInverse(inverse) => {
                let solution = inverse * DVector::from_column_slice(b);
                x.copy_from_slice(solution.as_slice());
            }
            CoarseSolver::Smoother {
                matrix,
                inverse_diagonal,
                omega,
            } => {
                let mut r = vec![0.0; b.len()];
                x.iter_mut().for_each(|x_i| *x_i = 0.0);
                for _ in 0..10 {
                    jacobi_sweep(matrix, inverse_diagonal, *omega, b, x, &mut r);
                }
            }
        }
    }
}

impl LinearOperator for AmgPreconditioner {
    fn apply(&self, y: &mut [f64], x: &[f64]) -> Result<(), OperatorError> {
        let n = self.dim();
        if y.len() != n || x.len() != n {
            return Err("dimension mismatch in AMG preconditioner".into());
        }
        self.cycle(0, x, y);
        Ok(())
    }
}

fn inverse_diagonal(matrix: &CsrMatrix<f64>) -> Vec<f64> {
    diagonal(matrix)
        .into_iter()
        .map(|d| if d != 0.0 { 1.0 / d } else { 0.0 })
        .collect()
}

/// Damping `4 / (3 rho)` where `rho` bounds the spectral radius of `D^-1 A` by Gershgorin.
fn jacobi_weight(matrix: &CsrMatrix<f64>, inverse_diagonal: &[f64]) -> f64 {
    let rho = matrix
        .row_iter()
        .zip(inverse_diagonal)
        .map(|(row, d_inv)| d_inv.abs() * row.values().iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0_f64, f64::max);
    if rho > 0.0 {
        4.0 / (3.0 * rho)
    } else {
        1.0
    }
}

/// r = b - Ax
fn residual(matrix: &CsrMatrix<f64>, b: &[f64], x: &[f64], r: &mut [f64]) {
    spmv(matrix, r, x);
    for (r_i, b_i) in r.iter_mut().zip(b) {
        *r_i = b_i - *r_i;
    }
}

/// x += omega D^-1 (b - Ax)
fn jacobi_sweep(matrix: &CsrMatrix<f64>, inverse_diagonal: &[f64], omega: f64, b: &[f64], x: &mut [f64], r: &mut [f64]) {
    residual(matrix, b, x, r);
    for ((x_i, r_i), d_inv) in x.iter_mut().zip(r.iter()).zip(inverse_diagonal) {
        *x_i += omega * d_inv * r_i;
    }
}

fn strong_connections(matrix: &CsrMatrix<f64>, theta: f64) -> Vec<Vec<usize>> {
    let diag = diagonal(matrix);
    matrix
        .row_iter()
        .enumerate()
        .map(|(i, row)| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .filter(|&(&j, &a_ij)| j != i && a_ij != 0.0 && a_ij.abs() >= theta * (diag[i] * diag[j]).abs().sqrt())
                .map(|(&j, _)| j)
                .collect()
        })
        .collect()
}

/// Greedy aggregation: root aggregates from untouched neighborhoods, attach leftovers to a
/// neighboring aggregate, and group whatever remains with its unaggregated neighbors.
fn aggregate(strong: &[Vec<usize>]) -> (Vec<usize>, usize) {
    let n = strong.len();
    let mut aggregates: Vec<Option<usize>> = vec![None; n];
    let mut count = 0;

    for i in 0..n {
        if aggregates[i].is_none()
            && !strong[i].is_empty()
            && strong[i].iter().all(|&j| aggregates[j].is_none())
        {
            aggregates[i] = Some(count);
            for &j in &strong[i] {
                aggregates[j] = Some(count);
            }
            count += 1;
        }
    }

    let rooted = aggregates.clone();
    for i in 0..n {
        if aggregates[i].is_none() {
            aggregates[i] = strong[i].iter().find_map(|&j| rooted[j]);
        }
    }

    for i in 0..n {
        if aggregates[i].is_none() {
            aggregates[i] = Some(count);
            for &j in &strong[i] {
                if aggregates[j].is_none() {
                    aggregates[j] = Some(count);
                }
            }
            count += 1;
        }
    }

    let aggregates = aggregates
        .into_iter()
        .map(|a| a.unwrap_or_default())
        .collect();
    (aggregates, count)
}

fn tentative_prolongation(aggregates: &[usize], num_aggregates: usize) -> CsrMatrix<f64> {
    let n = aggregates.len();
    let mut coo = CooMatrix::new(n, num_aggregates);
    for (i, &a) in aggregates.iter().enumerate() {
        coo.push(i, a, 1.0);
    }
    CsrMatrix::from(&coo)
}

/// P = (I - omega D^-1 A) P_tent
fn smooth_prolongation(
    matrix: &CsrMatrix<f64>,
    tentative: &CsrMatrix<f64>,
    inverse_diagonal: &[f64],
    omega: f64,
) -> CsrMatrix<f64> {
    let a_p = matrix * tentative;
    let mut coo = CooMatrix::new(tentative.nrows(), tentative.ncols());
    for (i, j, &v) in tentative.triplet_iter() {
        coo.push(i, j, v);
    }
    for (i, j, &v) in a_p.triplet_iter() {
        coo.push(i, j, -omega * inverse_diagonal[i] * v);
    }
    CsrMatrix::from(&coo)
}

fn pseudo_inverse(matrix: &CsrMatrix<f64>) -> DMatrix<f64> {
    let dense = convert_csr_dense(matrix);
    let n = dense.nrows();
    if n == 0 {
        return DMatrix::zeros(0, 0);
    }
    let svd = dense.svd(true, true);
    let max_singular_value = svd.singular_values.max();
    let eps = 1e-10 * max_singular_value;
    svd.pseudo_inverse(eps).unwrap_or_else(|_| DMatrix::zeros(n, n))
}
