use crate::assembly::local::{BasisTable, ElementConnectivityAssembler, ElementVectorAssembler, SpaceConnectivity};
use crate::space::FunctionSpace;
use crate::velocity::ResolvedVelocity;
use eyre::bail;
use nalgebra::{DMatrix, DVectorViewMut};

/// Curl of a velocity field given its gradient `du_c / dx_j` (`components x dim`).
///
/// In two dimensions the curl is the scalar `du_y/dx - du_x/dy`.
pub fn curl_from_gradient(gradient: &DMatrix<f64>) -> Vec<f64> {
    let g = |c: usize, j: usize| gradient[(c, j)];
    match gradient.ncols() {
        2 => vec![g(1, 0) - g(0, 1)],
        3 => vec![g(2, 1) - g(1, 2), g(0, 2) - g(2, 0), g(1, 0) - g(0, 1)],
        _ => Vec::new(),
    }
}

/// Number of components of the curl of a velocity field in the given dimension.
pub fn curl_components(dim: usize) -> usize {
    match dim {
        2 => 1,
        dim => dim,
    }
}

/// Element assembler for `∫ phi_a curl(u)`, with one entry per curl component.
///
/// The test functions `phi_a` belong to `space`, which must share the cells of the velocity
/// space but may number its nodes differently (e.g. when periodicity is imposed).
#[derive(Debug, Clone, Copy)]
pub struct CurlSourceAssembler<'a> {
    space: &'a FunctionSpace,
    velocity: &'a ResolvedVelocity,
    table: &'a BasisTable,
}

impl<'a> CurlSourceAssembler<'a> {
    pub fn new(space: &'a FunctionSpace, velocity: &'a ResolvedVelocity, table: &'a BasisTable) -> Self {
        Self { space, velocity, table }
    }

    fn connectivity(&self) -> SpaceConnectivity<'a> {
        SpaceConnectivity::new(self.space, self.solution_dim())
    }
}

impl<'a> ElementConnectivityAssembler for CurlSourceAssembler<'a> {
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
        self.connectivity().populate_element_nodes(output, element_index)
    }
}

impl<'a> ElementVectorAssembler for CurlSourceAssembler<'a> {
    fn assemble_element_vector_into(&self, element_index: usize, mut output: DVectorViewMut<f64>) -> eyre::Result<()> {
        let dim = self.space.mesh().geometry_dim();
        if dim != 2 && dim != 3 {
            bail!("curl is only defined in two and three dimensions, got dimension {}", dim);
        }
        let cell = self.space.cell_geometry(element_index)?;
        let volume = self.table.volume();
        let s = self.solution_dim();

        for q in 0..volume.num_points() {
            let dphi = cell.barycentric_gradients() * volume.barycentric_derivatives(q);
            let curl = curl_from_gradient(&self.velocity.gradient(element_index, &dphi));
            let w = volume.weight(q) * cell.abs_det();
            for (a, phi_a) in volume.values(q).iter().enumerate() {
                for (i, curl_i) in curl.iter().enumerate() {
                    output[s * a + i] += w * phi_a * curl_i;
                }
            }
        }
        Ok(())
    }
}

/// Element assembler for the integrals `∫ phi_a` of the scalar basis functions.
#[derive(Debug, Clone, Copy)]
pub struct BasisIntegralAssembler<'a> {
    space: &'a FunctionSpace,
    table: &'a BasisTable,
}

impl<'a> BasisIntegralAssembler<'a> {
    pub fn new(space: &'a FunctionSpace, table: &'a BasisTable) -> Self {
        Self { space, table }
    }
}

impl<'a> ElementConnectivityAssembler for BasisIntegralAssembler<'a> {
    fn solution_dim(&self) -> usize {
        1
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

impl<'a> ElementVectorAssembler for BasisIntegralAssembler<'a> {
    fn assemble_element_vector_into(&self, element_index: usize, mut output: DVectorViewMut<f64>) -> eyre::Result<()> {
        let cell = self.space.cell_geometry(element_index)?;
        let volume = self.table.volume();
        for q in 0..volume.num_points() {
            let w = volume.weight(q) * cell.abs_det();
            for (a, phi_a) in volume.values(q).iter().enumerate() {
                output[a] += w * phi_a;
            }
        }
        Ok(())
    }
}
