use crate::assembly::local::{
    curl_components, BasisTable, BoundaryFacetConnectivity, ElementConnectivityAssembler, ElementMatrixAssembler,
    ElementVectorAssembler,
};
use crate::element::SimplexCell;
use crate::mesh::BoundaryFacet;
use crate::space::FunctionSpace;
use crate::velocity::ResolvedVelocity;
use nalgebra::{DMatrixViewMut, DVector, DVectorViewMut};

/// Cross product `n x u`, which is a scalar in two dimensions.
pub fn normal_cross(n: &DVector<f64>, u: &[f64]) -> Vec<f64> {
    match n.len() {
        2 => vec![n[0] * u[1] - n[1] * u[0]],
        3 => vec![
            n[1] * u[2] - n[2] * u[1],
            n[2] * u[0] - n[0] * u[2],
            n[0] * u[1] - n[1] * u[0],
        ],
        _ => Vec::new(),
    }
}

fn facet_and_cell(space: &FunctionSpace, element_index: usize) -> eyre::Result<(BoundaryFacet, SimplexCell)> {
    let facet = space.mesh().boundary_facets()[element_index];
    let cell = space.cell_geometry(facet.cell)?;
    Ok((facet, cell))
}

/// Element assembler for the boundary term `-∫_F phi_a (n x u)` over the boundary facets.
///
/// Element `i` is boundary facet `i` of the mesh. As for
/// [`CurlSourceAssembler`](super::CurlSourceAssembler), the test space may number its nodes
/// differently from the velocity space.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryCrossAssembler<'a> {
    space: &'a FunctionSpace,
    velocity: &'a ResolvedVelocity,
    table: &'a BasisTable,
}

impl<'a> BoundaryCrossAssembler<'a> {
    pub fn new(space: &'a FunctionSpace, velocity: &'a ResolvedVelocity, table: &'a BasisTable) -> Self {
        Self { space, velocity, table }
    }

    fn connectivity(&self) -> BoundaryFacetConnectivity<'a> {
        BoundaryFacetConnectivity::new(self.space, self.solution_dim())
    }
}

impl<'a> ElementConnectivityAssembler for BoundaryCrossAssembler<'a> {
    fn solution_dim(&self) -> usize {
        curl_components(self.space.mesh().geometry_dim())
    }

    fn num_elements(&self) -> usize {
        self.connectivity().num_elements()
    }

    fn num_nodes(&self) -> usize {
        self.connectivity().num_nodes()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.connectivity().element_node_count(element_index)
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        self.connectivity()
            .populate_element_nodes(output, element_index)
    }
}

impl<'a> ElementVectorAssembler for BoundaryCrossAssembler<'a> {
    fn assemble_element_vector_into(&self, element_index: usize, mut output: DVectorViewMut<f64>) -> eyre::Result<()> {
        let (facet, cell) = facet_and_cell(self.space, element_index)?;
        let normal = cell.facet_normal(facet.local_facet);
        let measure = cell.facet_measure(facet.local_facet);
        let table = self.table.facet(facet.local_facet);
        let s = self.solution_dim();

        let mut u = vec![0.0; self.velocity.num_components()];
        for q in 0..table.num_points() {
            let phi = table.values(q);
            self.velocity.evaluate(facet.cell, phi, &mut u);
            let n_cross_u = normal_cross(&normal, &u);
            let w = table.weight(q) * measure;
            for (a, phi_a) in phi.iter().enumerate() {
                for (i, v_i) in n_cross_u.iter().enumerate() {
                    output[s * a + i] -= w * phi_a * v_i;
                }
            }
        }
        Ok(())
    }
}

/// Element assembler for the boundary coupling `-∫_F phi_a n_j d(phi_b)/dx_i`, placed at
/// row `(a, i)` and column `(b, j)` of a vector-valued system.
///
/// Together with the component-wise Laplacian this gives the curl-curl form of the vector
/// Laplacian for fields with vanishing divergence.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryGradientTransposeAssembler<'a> {
    space: &'a FunctionSpace,
    table: &'a BasisTable,
}

impl<'a> BoundaryGradientTransposeAssembler<'a> {
    pub fn new(space: &'a FunctionSpace, table: &'a BasisTable) -> Self {
        Self { space, table }
    }

    fn connectivity(&self) -> BoundaryFacetConnectivity<'a> {
        BoundaryFacetConnectivity::new(self.space, self.solution_dim())
    }
}

impl<'a> ElementConnectivityAssembler for BoundaryGradientTransposeAssembler<'a> {
    fn solution_dim(&self) -> usize {
        self.space.mesh().geometry_dim()
    }

    fn num_elements(&self) -> usize {
        self.connectivity().num_elements()
    }

    fn num_nodes(&self) -> usize {
        self.connectivity().num_nodes()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.connectivity().element_node_count(element_index)
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        self.connectivity()
            .populate_element_nodes(output, element_index)
    }
}

impl<'a> ElementMatrixAssembler for BoundaryGradientTransposeAssembler<'a> {
    fn assemble_element_matrix_into(&self, element_index: usize, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        let (facet, cell) = facet_and_cell(self.space, element_index)?;
        let normal = cell.facet_normal(facet.local_facet);
        let measure = cell.facet_measure(facet.local_facet);
        let table = self.table.facet(facet.local_facet);
        let d = self.solution_dim();
        let n = self.space.nodes_per_cell();

        for q in 0..table.num_points() {
            let phi = table.values(q);
            let dphi = cell.barycentric_gradients() * table.barycentric_derivatives(q);
            let w = table.weight(q) * measure;
            for a in 0..n {
                for b in 0..n {
                    for i in 0..d {
                        for j in 0..d {
                            output[(d * a + i, d * b + j)] -= w * phi[a] * normal[j] * dphi[(i, b)];
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
