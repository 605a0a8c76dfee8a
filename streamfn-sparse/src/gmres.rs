use crate::krylov::{apply_operator, compute_residual};
use crate::{IdentityOperator, LinearOperator, ResidualCriterion, SolveError, SolveErrorKind, SolveOutput};
use log::info;
use nalgebra::{DMatrix, DVector};

/// Restarted GMRES with right preconditioning.
///
/// The preconditioner `P` is applied as an approximation of `A^-1`, so that the Krylov space
/// is built for `A P` and the solution update is `x += P V y`. Convergence is measured on the
/// unpreconditioned residual `b - Ax`.
#[derive(Debug)]
pub struct Gmres<A, P> {
    operator: A,
    preconditioner: P,
    criterion: ResidualCriterion,
    max_iter: Option<usize>,
    restart: usize,
    monitor: bool,
}

impl Gmres<(), IdentityOperator> {
    pub fn new() -> Self {
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            criterion: ResidualCriterion::default(),
            max_iter: None,
            restart: 30,
            monitor: false,
        }
    }
}

impl Default for Gmres<(), IdentityOperator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Gmres<(), P> {
    pub fn with_operator<A>(self, operator: A) -> Gmres<A, P> {
        Gmres {
            operator,
            preconditioner: self.preconditioner,
            criterion: self.criterion,
            max_iter: self.max_iter,
            restart: self.restart,
            monitor: self.monitor,
        }
    }
}

impl<A, P> Gmres<A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> Gmres<A, P2> {
        Gmres {
            operator: self.operator,
            preconditioner,
            criterion: self.criterion,
            max_iter: self.max_iter,
            restart: self.restart,
            monitor: self.monitor,
        }
    }

    pub fn with_stopping_criterion(self, criterion: ResidualCriterion) -> Self {
        Self { criterion, ..self }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }

    /// Sets the dimension of the Krylov space before restarting. Values below 1 are treated as 1.
    pub fn with_restart(self, restart: usize) -> Self {
        Self {
            restart: restart.max(1),
            ..self
        }
    }

    /// Log the residual estimate of every iteration at `info` level.
    pub fn with_monitor(self, monitor: bool) -> Self {
        Self { monitor, ..self }
    }
}

/// Plane rotation `(c, s)` that zeroes `b` in `[a, b]^T`.
fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else {
        let r = a.hypot(b);
        (a / r, b / r)
    }
}

impl<A, P> Gmres<A, P>
where
    A: LinearOperator,
    P: LinearOperator,
{
    pub fn solve_with_guess(&self, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<SolveOutput, SolveError> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let n = b.len();
        let m = self.restart;
        let mut output = SolveOutput::new();

        let b_norm = b.norm();
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(output);
        }

        let mut r = DVector::zeros(n);
        let mut w = DVector::zeros(n);
        let mut z = DVector::zeros(n);
        let mut basis: Vec<DVector<f64>> = Vec::with_capacity(m + 1);
        let mut h = DMatrix::zeros(m + 1, m);
        let mut cs = vec![0.0; m];
        let mut sn = vec![0.0; m];
        let mut g = vec![0.0; m + 1];
        let mut previous_beta = f64::INFINITY;

        loop {
            if let Err(err) = compute_residual(&mut r, &self.operator, x, b) {
                return Err(SolveError::new(output, OperatorError(err)));
            }
            let beta = r.norm();
            output.residual_norm = beta;

            if self.criterion.has_converged(beta, b_norm) {
                return Ok(output);
            }
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }
            if beta >= previous_beta {
                return Err(SolveError::new(output, Stagnation));
            }
            previous_beta = beta;

            basis.clear();
            basis.push(&r / beta);
            h.fill(0.0);
            g.iter_mut().for_each(|g_i| *g_i = 0.0);
            g[0] = beta;

            let mut k = 0;
            for j in 0..m {
                // w = A P v_j
                if let Err(err) = apply_operator(&mut z, &self.preconditioner, &basis[j]) {
                    return Err(SolveError::new(output, PreconditionerError(err)));
                }
                if let Err(err) = apply_operator(&mut w, &self.operator, &z) {
                    return Err(SolveError::new(output, OperatorError(err)));
                }

                // Modified Gram-Schmidt
                for (i, v_i) in basis.iter().enumerate() {
                    let h_ij = w.dot(v_i);
                    h[(i, j)] = h_ij;
                    w.axpy(-h_ij, v_i, 1.0);
                }
                let h_next = w.norm();
                h[(j + 1, j)] = h_next;

                for i in 0..j {
                    let temp = cs[i] * h[(i, j)] + sn[i] * h[(i + 1, j)];
                    h[(i + 1, j)] = -sn[i] * h[(i, j)] + cs[i] * h[(i + 1, j)];
                    h[(i, j)] = temp;
                }
                let (c, s) = givens(h[(j, j)], h[(j + 1, j)]);
                cs[j] = c;
                sn[j] = s;
                h[(j, j)] = c * h[(j, j)] + s * h[(j + 1, j)];
                h[(j + 1, j)] = 0.0;
                g[j + 1] = -s * g[j];
                g[j] *= c;

                k = j + 1;
                output.num_iterations += 1;
                let estimate = g[j + 1].abs();
                output.residual_norm = estimate;
                if self.monitor {
                    info!("GMRES iteration {}: residual estimate {:e}", output.num_iterations, estimate);
                }

                let max_iter_reached = self
                    .max_iter
                    .map(|max_iter| output.num_iterations >= max_iter)
                    .unwrap_or(false);
                let lucky_breakdown = h_next <= f64::EPSILON * beta;
                if self.criterion.has_converged(estimate, b_norm) || lucky_breakdown || max_iter_reached {
                    break;
                }
                basis.push(&w / h_next);
            }

            // Solve the upper triangular least-squares system H y = g
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut s = g[i];
                for l in (i + 1)..k {
                    s -= h[(i, l)] * y[l];
                }
                y[i] = if h[(i, i)] != 0.0 { s / h[(i, i)] } else { 0.0 };
            }

            // x += P V y
            w.fill(0.0);
            for (y_i, v_i) in y.iter().zip(&basis) {
                w.axpy(*y_i, v_i, 1.0);
            }
            if let Err(err) = apply_operator(&mut z, &self.preconditioner, &w) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            *x += &z;
        }
    }
}
