use crate::assembly::local::{BasisTable, ElementConnectivityAssembler, ElementMatrixAssembler, SpaceConnectivity};
use crate::space::FunctionSpace;
use nalgebra::DMatrixViewMut;

/// Element assembler for the Laplace operator `∫ grad phi_a · grad phi_b`, applied to each of
/// `solution_dim` components independently.
#[derive(Debug, Clone, Copy)]
pub struct LaplaceAssembler<'a> {
    space: &'a FunctionSpace,
    table: &'a BasisTable,
    solution_dim: usize,
}

impl<'a> LaplaceAssembler<'a> {
    pub fn new(space: &'a FunctionSpace, table: &'a BasisTable, solution_dim: usize) -> Self {
        Self {
            space,
            table,
            solution_dim,
        }
    }

    fn connectivity(&self) -> SpaceConnectivity<'a> {
        SpaceConnectivity::new(self.space, self.solution_dim)
    }
}

impl<'a> ElementConnectivityAssembler for LaplaceAssembler<'a> {
    fn solution_dim(&self) -> usize {
        self.solution_dim
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

impl<'a> ElementMatrixAssembler for LaplaceAssembler<'a> {
    #[allow(non_snake_case)]
    fn assemble_element_matrix_into(&self, element_index: usize, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        let cell = self.space.cell_geometry(element_index)?;
        let volume = self.table.volume();
        let s = self.solution_dim;
        let n = self.space.nodes_per_cell();

        for q in 0..volume.num_points() {
            // Physical gradients G = grad(lambda) * d(phi)/d(lambda), one column per basis function
            let G = cell.barycentric_gradients() * volume.barycentric_derivatives(q);
            let GtG = G.transpose() * &G;
            let w = volume.weight(q) * cell.abs_det();
            for a in 0..n {
                for b in 0..n {
                    let contribution = w * GtG[(a, b)];
                    for i in 0..s {
                        output[(s * a + i, s * b + i)] += contribution;
                    }
                }
            }
        }
        Ok(())
    }
}
