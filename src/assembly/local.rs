use crate::space::FunctionSpace;
use nalgebra::{DMatrixViewMut, DVectorViewMut};

mod boundary;
mod elliptic;
mod quadrature_table;
mod source;

pub use boundary::*;
pub use elliptic::*;
pub use quadrature_table::*;
pub use source::*;

pub trait ElementConnectivityAssembler {
    fn solution_dim(&self) -> usize;

    fn num_elements(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn element_node_count(&self, element_index: usize) -> usize;

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize);
}

pub trait ElementMatrixAssembler: ElementConnectivityAssembler + Sync {
    /// Adds the element matrix of the given element to `output`, which has dimensions
    /// `solution_dim * element_node_count` in both directions and is zeroed beforehand.
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<f64>) -> eyre::Result<()>;
}

pub trait ElementVectorAssembler: ElementConnectivityAssembler + Sync {
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<f64>) -> eyre::Result<()>;
}

/// Connectivity of the cells of a function space, with a given number of values per node.
#[derive(Debug, Clone, Copy)]
pub struct SpaceConnectivity<'a> {
    space: &'a FunctionSpace,
    solution_dim: usize,
}

impl<'a> SpaceConnectivity<'a> {
    pub fn new(space: &'a FunctionSpace, solution_dim: usize) -> Self {
        Self { space, solution_dim }
    }
}

impl<'a> ElementConnectivityAssembler for SpaceConnectivity<'a> {
    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn num_elements(&self) -> usize {
        self.space.mesh().num_cells()
    }

    fn num_nodes(&self) -> usize {
        self.space.num_nodes()
    }

    fn element_node_count(&self, _element_index: usize) -> usize {
        self.space.nodes_per_cell()
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        output.copy_from_slice(self.space.cell_nodes(element_index));
    }
}

/// Connectivity of the boundary facets of a mesh: element `i` is boundary facet `i`, and its
/// nodes are the nodes of the cell the facet belongs to.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryFacetConnectivity<'a> {
    space: &'a FunctionSpace,
    solution_dim: usize,
}

impl<'a> BoundaryFacetConnectivity<'a> {
    pub fn new(space: &'a FunctionSpace, solution_dim: usize) -> Self {
        Self { space, solution_dim }
    }
}

impl<'a> ElementConnectivityAssembler for BoundaryFacetConnectivity<'a> {
    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn num_elements(&self) -> usize {
        self.space.mesh().boundary_facets().len()
    }

    fn num_nodes(&self) -> usize {
        self.space.num_nodes()
    }

    fn element_node_count(&self, _element_index: usize) -> usize {
        self.space.nodes_per_cell()
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        let facet = &self.space.mesh().boundary_facets()[element_index];
        output.copy_from_slice(self.space.cell_nodes(facet.cell));
    }
}
