//! Lagrange finite element spaces on simplicial meshes.
//!
//! A [`FunctionSpace`] numbers the nodes of a continuous Lagrange basis of degree 1-3 on a
//! [`Mesh`]. A node lives on the lattice of some sub-simplex (vertex, edge, face or cell
//! interior), and is identified globally by the multiset of vertices it is built from:
//! the node with barycentric lattice index `alpha` in a cell is keyed by the pairs
//! `(vertex, alpha_i)` with `alpha_i > 0`. Cells sharing a sub-simplex therefore agree on
//! its nodes without any orientation bookkeeping.
//!
//! Constraints such as periodicity are expressed by a [`ConstrainedDomain`], which replaces
//! constrained vertices by their targets before the node keys are formed.
use crate::element::{LagrangeBasis, SimplexCell};
use crate::mesh::Mesh;
use eyre::eyre;
use nalgebra::DVector;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

mod function;
mod locate;
mod periodic;

pub use function::*;
pub use locate::*;
pub use periodic::*;

/// Identification of constrained (slave) points with target (master) points, e.g. periodicity.
pub trait ConstrainedDomain: Send + Sync {
    /// Whether `x` lies on the target side of the constraint.
    fn inside(&self, x: &[f64]) -> bool;

    /// Maps a constrained point to its target, or returns `None` if `x` is not constrained.
    fn map(&self, x: &[f64]) -> Option<Vec<f64>>;
}

/// A continuous Lagrange space of scalar or vector values.
///
/// Vector-valued spaces interleave their degrees of freedom: component `c` of node `i` has
/// global index `value_size * i + c`.
#[derive(Debug, Clone)]
pub struct FunctionSpace {
    mesh: Arc<Mesh>,
    basis: LagrangeBasis,
    value_size: usize,
    cell_nodes: Vec<usize>,
    node_coordinates: Vec<f64>,
    constrained: bool,
    locator: OnceLock<CellLocator>,
}

/// Builder for [`FunctionSpace`].
pub struct FunctionSpaceBuilder<'a> {
    mesh: Arc<Mesh>,
    degree: usize,
    value_size: usize,
    constrained_domain: Option<&'a dyn ConstrainedDomain>,
}

impl<'a> FunctionSpaceBuilder<'a> {
    pub fn new(mesh: Arc<Mesh>, degree: usize) -> Self {
        Self {
            mesh,
            degree,
            value_size: 1,
            constrained_domain: None,
        }
    }

    pub fn with_value_size(self, value_size: usize) -> Self {
        Self { value_size, ..self }
    }

    pub fn with_constrained_domain(self, constrained_domain: Option<&'a dyn ConstrainedDomain>) -> Self {
        Self {
            constrained_domain,
            ..self
        }
    }

    pub fn build(self) -> eyre::Result<FunctionSpace> {
        let mesh = self.mesh;
        if self.value_size == 0 {
            return Err(eyre!("value size must be positive"));
        }
        let dim = mesh.geometry_dim();
        let basis = LagrangeBasis::new(dim, self.degree)?;
        let degree = self.degree as f64;

        let master = match self.constrained_domain {
            Some(domain) => master_vertices(&mesh, domain)?,
            None => (0..mesh.num_vertices()).collect(),
        };

        let mut node_indices: FxHashMap<Vec<(usize, usize)>, usize> = FxHashMap::default();
        let mut node_coordinates = Vec::new();
        let mut cell_nodes = Vec::with_capacity(mesh.num_cells() * basis.num_nodes());
        for cell in mesh.cell_iter() {
            for alpha in basis.nodes() {
                let mut counts = BTreeMap::new();
                for (&vertex, &a) in cell.iter().zip(alpha) {
                    if a > 0 {
                        *counts.entry(master[vertex]).or_insert(0) += a;
                    }
                }
                let key: Vec<_> = counts.into_iter().collect();

                let next_index = node_indices.len();
                let index = match node_indices.entry(key) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        let mut x = vec![0.0; dim];
                        for (&vertex, &a) in cell.iter().zip(alpha) {
                            for (x_i, v_i) in x.iter_mut().zip(mesh.vertex(vertex)) {
                                *x_i += a as f64 / degree * v_i;
                            }
                        }
                        if let Some(domain) = self.constrained_domain {
                            x = constrained_target(domain, x, dim);
                        }
                        node_coordinates.extend_from_slice(&x);
                        entry.insert(next_index);
                        next_index
                    }
                };
                cell_nodes.push(index);
            }
        }

        Ok(FunctionSpace {
            mesh,
            basis,
            value_size: self.value_size,
            cell_nodes,
            node_coordinates,
            constrained: self.constrained_domain.is_some(),
            locator: OnceLock::new(),
        })
    }
}

impl FunctionSpace {
    /// A scalar space of the given degree.
    pub fn scalar(mesh: Arc<Mesh>, degree: usize) -> eyre::Result<Self> {
        FunctionSpaceBuilder::new(mesh, degree).build()
    }

    /// A vector space with one component per spatial dimension.
    pub fn vector(mesh: Arc<Mesh>, degree: usize) -> eyre::Result<Self> {
        let dim = mesh.geometry_dim();
        FunctionSpaceBuilder::new(mesh, degree)
            .with_value_size(dim)
            .build()
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn degree(&self) -> usize {
        self.basis.degree()
    }

    pub fn basis(&self) -> &LagrangeBasis {
        &self.basis
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    pub fn num_nodes(&self) -> usize {
        self.node_coordinates.len() / self.mesh.geometry_dim()
    }

    pub fn num_dofs(&self) -> usize {
        self.value_size * self.num_nodes()
    }

    pub fn nodes_per_cell(&self) -> usize {
        self.basis.num_nodes()
    }

    /// Global node indices of the given cell, in the order of the local basis.
    pub fn cell_nodes(&self, cell_index: usize) -> &[usize] {
        let n = self.nodes_per_cell();
        &self.cell_nodes[n * cell_index..n * (cell_index + 1)]
    }

    /// Coordinates of a node. For constrained spaces, these are the coordinates of the target.
    pub fn node_coordinates(&self, node: usize) -> &[f64] {
        let dim = self.mesh.geometry_dim();
        &self.node_coordinates[dim * node..dim * (node + 1)]
    }

    pub fn cell_geometry(&self, cell_index: usize) -> eyre::Result<SimplexCell> {
        SimplexCell::from_mesh_cell(&self.mesh, cell_index)
    }

    /// Sorted indices of the nodes lying on the boundary of the mesh.
    pub fn boundary_nodes(&self) -> Vec<usize> {
        let mut nodes: Vec<_> = self
            .mesh
            .boundary_facets()
            .iter()
            .flat_map(|facet| {
                let cell_nodes = self.cell_nodes(facet.cell);
                self.basis
                    .nodes()
                    .iter()
                    .zip(cell_nodes)
                    .filter(move |(alpha, _)| alpha[facet.local_facet] == 0)
                    .map(|(_, &node)| node)
            })
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Global degrees of freedom of all components of the boundary nodes.
    pub fn boundary_dofs(&self) -> Vec<usize> {
        let s = self.value_size;
        self.boundary_nodes()
            .into_iter()
            .flat_map(|node| (0..s).map(move |c| s * node + c))
            .collect()
    }

    /// The scalar space with the same node numbering.
    pub fn scalar_subspace(&self) -> FunctionSpace {
        Self {
            value_size: 1,
            ..self.clone()
        }
    }

    /// Whether two spaces share mesh, degree and node numbering.
    pub fn has_same_layout(&self, other: &FunctionSpace) -> bool {
        same_mesh(&self.mesh, &other.mesh) && self.basis == other.basis && self.cell_nodes == other.cell_nodes
    }

    /// Finds a cell containing `x`, and the barycentric coordinates of `x` in that cell.
    pub fn locate_point(&self, x: &[f64]) -> Option<(usize, DVector<f64>)> {
        self.locator
            .get_or_init(|| CellLocator::new(&self.mesh))
            .locate(&self.mesh, x)
    }
}

/// Follows the constraint from `x` until it reaches a point that is not constrained any further.
fn constrained_target(domain: &dyn ConstrainedDomain, mut x: Vec<f64>, max_steps: usize) -> Vec<f64> {
    for _ in 0..max_steps {
        match domain.map(&x) {
            Some(y) if domain.inside(&y) => x = y,
            _ => break,
        }
    }
    x
}

/// Whether two shared meshes are the same mesh, either by identity or by value.
pub fn same_mesh(a: &Arc<Mesh>, b: &Arc<Mesh>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}
