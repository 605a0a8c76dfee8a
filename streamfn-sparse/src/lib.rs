//! Sparse linear solvers for `streamfn`.
//!
//! The solvers work on `f64` vectors through the [`LinearOperator`] abstraction, so the
//! same Krylov method can be combined with a CSR matrix, a dense matrix or a preconditioner.
mod bicgstab;
mod dense;
mod gmres;
mod krylov;
mod operator;
pub mod precond;

pub use bicgstab::*;
pub use dense::*;
pub use gmres::*;
pub use krylov::*;
pub use operator::*;

pub extern crate nalgebra_sparse;
