//! Quadrature rules for simplicial finite element reference domains.
//!
//! The main purpose of this crate is to support the `streamfn` library, but the rules are
//! plain arrays of weights and points and may be used independently of it.
//!
//! Reference domains follow the "unit simplex" convention:
//!
//! - segment: `[0, 1]`,
//! - triangle: `{ (x, y) : x, y >= 0, x + y <= 1 }`,
//! - tetrahedron: `{ (x, y, z) : x, y, z >= 0, x + y + z <= 1 }`.
//!
//! The univariate Gauss rules in [`univariate`] are given on `[-1, 1]`, as is customary.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod simplex;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A two-dimensional point.
pub type Point2 = Point<2>;

/// A three-dimensional point.
pub type Point3 = Point<3>;

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A one-dimensional rule.
pub type Rule1d = Rule<1>;

/// A two-dimensional quadrature rule.
pub type Rule2d = Rule<2>;

/// A three-dimensional rule.
pub type Rule3d = Rule<3>;

/// Approximates the integral of `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, p)| w * f(p)).sum()
}
