//! Assembly of global matrices and vectors from per-element contributions.
//!
//! Element assemblers in [`local`] describe what a single cell (or boundary facet) contributes,
//! while the assemblers in [`global`] combine these contributions into CSR matrices and dense
//! vectors.
pub mod global;
pub mod local;
