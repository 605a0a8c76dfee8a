//! Collapsed (conical product) Gauss rules for the reference segment, triangle and tetrahedron.
//!
//! The unit simplex is the image of the unit cube under the Duffy transformation
//!
//! ```text
//! x = a,  y = b (1 - a),  z = c (1 - a) (1 - b),
//! ```
//!
//! with Jacobian determinant `(1 - a)^(d - 1) (1 - b)^(d - 2)`. Tensor products of Gauss rules
//! on `[0, 1]` therefore give positive-weight rules on the simplex of any strength. They use
//! more points than the optimal symmetric rules, but are available for every strength.

use crate::univariate::gauss_unit_interval;
use crate::{Error, Rule, Rule1d, Rule2d, Rule3d};

/// Number of Gauss points per direction needed for a collapsed rule of the given strength.
///
/// The Jacobian of the collapsed map raises the degree along the first direction by `dim - 1`.
pub fn points_per_direction(dim: usize, strength: usize) -> usize {
    // 2n - 1 >= strength + dim - 1
    (strength + dim + 1) / 2
}

/// A rule for the reference segment `[0, 1]` that integrates polynomials of degree
/// `strength` exactly.
pub fn segment(strength: usize) -> Rule1d {
    gauss_unit_interval(points_per_direction(1, strength))
}

/// A rule for the reference triangle that integrates polynomials of total degree
/// `strength` exactly.
pub fn triangle(strength: usize) -> Rule2d {
    let n = points_per_direction(2, strength);
    let (weights1d, points1d) = gauss_unit_interval(n);
    let rule1d_iter = || weights1d.iter().zip(&points1d);

    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for (&wa, &[a]) in rule1d_iter() {
        for (&wb, &[b]) in rule1d_iter() {
            weights.push(wa * wb * (1.0 - a));
            points.push([a, b * (1.0 - a)]);
        }
    }

    (weights, points)
}

/// A rule for the reference tetrahedron that integrates polynomials of total degree
/// `strength` exactly.
pub fn tetrahedron(strength: usize) -> Rule3d {
    let n = points_per_direction(3, strength);
    let (weights1d, points1d) = gauss_unit_interval(n);
    let rule1d_iter = || weights1d.iter().zip(&points1d);

    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for (&wa, &[a]) in rule1d_iter() {
        for (&wb, &[b]) in rule1d_iter() {
            for (&wc, &[c]) in rule1d_iter() {
                weights.push(wa * wb * wc * (1.0 - a).powi(2) * (1.0 - b));
                points.push([a, b * (1.0 - a), c * (1.0 - a) * (1.0 - b)]);
            }
        }
    }

    (weights, points)
}

/// A rule for the reference simplex of the given dimension, with points flattened into
/// `dim`-sized chunks.
///
/// Returns [`Error::NoRuleAvailable`] for dimensions other than 1, 2 and 3.
pub fn simplex_flat(dim: usize, strength: usize) -> Result<(Vec<f64>, Vec<f64>), Error> {
    fn flatten<const D: usize>((weights, points): Rule<D>) -> (Vec<f64>, Vec<f64>) {
        let flat = points.iter().flat_map(|p| p.iter().copied()).collect();
        (weights, flat)
    }

    match dim {
        1 => Ok(flatten(segment(strength))),
        2 => Ok(flatten(triangle(strength))),
        3 => Ok(flatten(tetrahedron(strength))),
        _ => Err(Error::NoRuleAvailable),
    }
}

/// Exact integral of the monomial `x^alpha[0] * y^alpha[1] * ...` over the unit simplex
/// of dimension `alpha.len()`.
///
/// Uses the Dirichlet formula `prod(alpha_i!) / (|alpha| + d)!`.
pub fn monomial_integral(alpha: &[usize]) -> f64 {
    let factorial = |n: usize| (1..=n).map(|i| i as f64).product::<f64>();
    let d = alpha.len();
    let total: usize = alpha.iter().sum();
    alpha.iter().map(|&a| factorial(a)).product::<f64>() / factorial(total + d)
}
