//! Stream functions of finite element velocity fields.
//!
//! The crate provides a small simplicial finite element stack (meshes, Lagrange spaces of
//! degree 1 to 3, quadrature and assembly) together with solvers that recover
//!
//! - the scalar stream function of a two-dimensional velocity field, see [`stream_function`];
//! - the vector stream function (vector potential) of a three-dimensional velocity field,
//!   see [`stream_function_3d`].
pub mod assembly;
pub mod element;
pub mod error;
pub mod mesh;
pub mod probe;
pub mod quadrature;
pub mod space;
pub mod stream;
pub mod velocity;

#[cfg(feature = "proptest")]
pub mod proptest;

pub use stream::{
    stream_function, stream_function_3d, BoundaryMode, PreconditionerKind, SolverMethod, SolverSettings,
    StreamFunctionError, StreamFunctionSolver,
};
pub use velocity::VelocityField;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate streamfn_sparse;
