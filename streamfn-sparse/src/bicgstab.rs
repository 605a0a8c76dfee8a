use crate::krylov::{apply_operator, compute_residual};
use crate::{IdentityOperator, LinearOperator, ResidualCriterion, SolveError, SolveErrorKind, SolveOutput};
use log::{debug, info};
use nalgebra::DVector;

/// Number of shadow residual restarts tolerated before giving up.
const MAX_BREAKDOWNS: usize = 10;

/// BiCGStab with right preconditioning.
///
/// When one of the inner products of the method vanishes, the shadow residual is reset to the
/// current residual and the iteration continues from the current iterate.
#[derive(Debug)]
pub struct BiCgStab<A, P> {
    operator: A,
    preconditioner: P,
    criterion: ResidualCriterion,
    max_iter: Option<usize>,
    monitor: bool,
}

impl BiCgStab<(), IdentityOperator> {
    pub fn new() -> Self {
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            criterion: ResidualCriterion::default(),
            max_iter: None,
            monitor: false,
        }
    }
}

impl Default for BiCgStab<(), IdentityOperator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> BiCgStab<(), P> {
    pub fn with_operator<A>(self, operator: A) -> BiCgStab<A, P> {
        BiCgStab {
            operator,
            preconditioner: self.preconditioner,
            criterion: self.criterion,
            max_iter: self.max_iter,
            monitor: self.monitor,
        }
    }
}

impl<A, P> BiCgStab<A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> BiCgStab<A, P2> {
        BiCgStab {
            operator: self.operator,
            preconditioner,
            criterion: self.criterion,
            max_iter: self.max_iter,
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

    pub fn with_monitor(self, monitor: bool) -> Self {
        Self { monitor, ..self }
    }
}

impl<A, P> BiCgStab<A, P>
where
    A: LinearOperator,
    P: LinearOperator,
{
    #[allow(non_snake_case)]
    pub fn solve_with_guess(&self, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<SolveOutput, SolveError> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let n = b.len();
        let mut output = SolveOutput::new();

        let b_norm = b.norm();
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(output);
        }

        let mut r = DVector::zeros(n);
        if let Err(err) = compute_residual(&mut r, &self.operator, x, b) {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        output.residual_norm = r.norm();
        if self.criterion.has_converged(output.residual_norm, b_norm) {
            return Ok(output);
        }

        let mut r_hat = r.clone();
        let mut p = DVector::zeros(n);
        let mut v = DVector::zeros(n);
        let mut s = DVector::zeros(n);
        let mut t = DVector::zeros(n);
        // Preconditioned directions P p and P s
        let mut Pp = DVector::zeros(n);
        let mut Ps = DVector::zeros(n);

        let (mut rho_old, mut alpha, mut omega) = (1.0, 1.0, 1.0);
        let mut restart_shadow = false;
        let mut breakdowns = 0;

        loop {
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            if restart_shadow {
                breakdowns += 1;
                if breakdowns > MAX_BREAKDOWNS {
                    return Err(SolveError::new(output, Breakdown("repeated BiCGStab breakdown")));
                }
                debug!("Restarting BiCGStab shadow residual at iteration {}", output.num_iterations);
                r_hat.copy_from(&r);
                p.fill(0.0);
                v.fill(0.0);
                rho_old = 1.0;
                alpha = 1.0;
                omega = 1.0;
                restart_shadow = false;
            }

            let rho = r_hat.dot(&r);
            if rho.abs() <= f64::EPSILON * r_hat.norm() * r.norm() {
                restart_shadow = true;
                continue;
            }

            let beta = (rho / rho_old) * (alpha / omega);
            // p = r + beta (p - omega v)
            p.axpy(-omega, &v, 1.0);
            p.axpy(1.0, &r, beta);

            if let Err(err) = apply_operator(&mut Pp, &self.preconditioner, &p) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut v, &self.operator, &Pp) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let r_hat_v = r_hat.dot(&v);
            if r_hat_v == 0.0 {
                restart_shadow = true;
                continue;
            }
            alpha = rho / r_hat_v;

            // s = r - alpha v
            s.copy_from(&r);
            s.axpy(-alpha, &v, 1.0);
            output.num_iterations += 1;

            let s_norm = s.norm();
            if self.criterion.has_converged(s_norm, b_norm) {
                x.axpy(alpha, &Pp, 1.0);
                output.residual_norm = s_norm;
                return Ok(output);
            }

            if let Err(err) = apply_operator(&mut Ps, &self.preconditioner, &s) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut t, &self.operator, &Ps) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let t_norm_squared = t.norm_squared();
            omega = if t_norm_squared > 0.0 {
                t.dot(&s) / t_norm_squared
            } else {
                0.0
            };

            x.axpy(alpha, &Pp, 1.0);
            x.axpy(omega, &Ps, 1.0);

            // r = s - omega t
            r.copy_from(&s);
            r.axpy(-omega, &t, 1.0);

            let r_norm = r.norm();
            output.residual_norm = r_norm;
            if self.monitor {
                info!("BiCGStab iteration {}: residual {:e}", output.num_iterations, r_norm);
            }
            if self.criterion.has_converged(r_norm, b_norm) {
                return Ok(output);
            }

            if omega == 0.0 {
                restart_shadow = true;
            }
            rho_old = rho;
        }
    }
}
