//! Quadrature rules for one-dimensional domains.

use crate::Rule;
use std::f64::consts::PI;

/// Recurrence relation for Legendre polynomials.
///
/// Note: we use a formula for which derivatives are *not* defined at |x| == 1, so it is only
/// suitable for evaluation in the open interval (-1, 1).
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    // p_n(x)
    p1: f64,
    // p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }

        Self { n, x, p1, p2 }
    }

    fn value(&self) -> f64 {
        self.p1
    }

    fn derivative(&self) -> f64 {
        let n = self.n as f64;
        // dp_n/dx (x) = n * (x * p_n(x) - p_{n - 1}(x)) / (x^2 - 1)
        n * (self.x * self.p1 - self.p2) / (self.x * self.x - 1.0)
    }
}

/// Gauss quadrature for the reference interval `[-1, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    // Loosely based on the procedure used in
    // Numerical Recipes, The art of Scientific Computing, Third Edition (2007)
    let m = (n + 1) / 2;

    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    // Only find the first m roots. The rest follow by symmetry
    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut recurrence = LegendreRecurrence::evaluate(n, x);

        // Newton's method. The initial guess is close enough that this converges in a handful
        // of iterations, but cap it anyway
        for _ in 0..100 {
            let dx = -recurrence.value() / recurrence.derivative();
            x += dx;
            recurrence = LegendreRecurrence::evaluate(n, x);
            if dx.abs() <= 1e-15 {
                break;
            }
        }

        let dp = recurrence.derivative();
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        points.push([x]);
        weights.push(w);
    }

    for i in m..n {
        let mirror_idx = n - i - 1;
        points.push([-points[mirror_idx][0]]);
        weights.push(weights[mirror_idx]);
    }

    assert_eq!(points.len(), n, "Internal error: incorrect number of points produced");

    (weights, points)
}

/// Gauss quadrature mapped to the unit interval `[0, 1]`.
///
/// Weights sum to one.
pub fn gauss_unit_interval(num_points: usize) -> Rule<1> {
    let (weights, points) = gauss(num_points);
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|[x]| [0.5 * (x + 1.0)]).collect();
    (weights, points)
}
