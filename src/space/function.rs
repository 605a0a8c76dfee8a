use crate::mesh::Mesh;
use crate::quadrature::SimplexQuadrature;
use crate::space::FunctionSpace;
use eyre::{bail, eyre};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// A finite element function: a space together with one coefficient per degree of freedom.
#[derive(Debug, Clone)]
pub struct Function {
    space: Arc<FunctionSpace>,
    coefficients: DVector<f64>,
}

impl Function {
    pub fn zeros(space: Arc<FunctionSpace>) -> Self {
        let coefficients = DVector::zeros(space.num_dofs());
        Self { space, coefficients }
    }

    pub fn from_coefficients(space: Arc<FunctionSpace>, coefficients: DVector<f64>) -> eyre::Result<Self> {
        if coefficients.len() != space.num_dofs() {
            bail!(
                "space has {} degrees of freedom, but {} coefficients were given",
                space.num_dofs(),
                coefficients.len()
            );
        }
        Ok(Self { space, coefficients })
    }

    /// Nodal interpolation of `f`, which writes the `value_size` values of the function at
    /// the given point into its output slice.
    pub fn interpolate(space: Arc<FunctionSpace>, f: impl Fn(&[f64], &mut [f64])) -> Self {
        let s = space.value_size();
        let mut coefficients = DVector::zeros(space.num_dofs());
        for node in 0..space.num_nodes() {
            f(
                space.node_coordinates(node),
                &mut coefficients.as_mut_slice()[s * node..s * (node + 1)],
            );
        }
        Self { space, coefficients }
    }

    pub fn interpolate_scalar(space: Arc<FunctionSpace>, f: impl Fn(&[f64]) -> f64) -> Self {
        Self::interpolate(space, |x, out| out.fill(f(x)))
    }

    pub fn space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        self.space.mesh()
    }

    pub fn degree(&self) -> usize {
        self.space.degree()
    }

    pub fn value_size(&self) -> usize {
        self.space.value_size()
    }

    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut DVector<f64> {
        &mut self.coefficients
    }

    pub fn into_coefficients(self) -> DVector<f64> {
        self.coefficients
    }

    /// Extracts component `i` as a scalar function on the same nodes.
    pub fn component(&self, i: usize) -> eyre::Result<Function> {
        let s = self.value_size();
        if i >= s {
            bail!("component {} requested from a function with {} components", i, s);
        }
        let coefficients = DVector::from_iterator(
            self.space.num_nodes(),
            self.coefficients.iter().skip(i).step_by(s).copied(),
        );
        Ok(Function {
            space: Arc::new(self.space.scalar_subspace()),
            coefficients,
        })
    }

    /// Values of all components at the point with barycentric coordinates `lambda` in a cell.
    pub fn evaluate_in_cell(&self, cell_index: usize, lambda: &[f64]) -> DVector<f64> {
        let phi = self.space.basis().values(lambda);
        let s = self.value_size();
        let mut value = DVector::zeros(s);
        for (&node, phi_a) in self.space.cell_nodes(cell_index).iter().zip(&phi) {
            for c in 0..s {
                value[c] += phi_a * self.coefficients[s * node + c];
            }
        }
        value
    }

    /// Gradient at a point of a cell, with shape `value_size x dim`.
    pub fn gradient_in_cell(&self, cell_index: usize, lambda: &[f64]) -> eyre::Result<DMatrix<f64>> {
        let cell = self.space.cell_geometry(cell_index)?;
        let gradients = self.space.basis().gradients(&cell, lambda);
        let s = self.value_size();
        let dim = cell.dim();
        let mut gradient = DMatrix::zeros(s, dim);
        for (a, &node) in self.space.cell_nodes(cell_index).iter().enumerate() {
            for c in 0..s {
                let u = self.coefficients[s * node + c];
                for j in 0..dim {
                    gradient[(c, j)] += u * gradients[(j, a)];
                }
            }
        }
        Ok(gradient)
    }

    /// Values at an arbitrary point, or `None` if the point lies outside the mesh.
    pub fn evaluate_at_point(&self, x: &[f64]) -> Option<DVector<f64>> {
        let (cell_index, lambda) = self.space.locate_point(x)?;
        Some(self.evaluate_in_cell(cell_index, lambda.as_slice()))
    }

    /// Integral of each component over the mesh.
    pub fn integral(&self) -> eyre::Result<DVector<f64>> {
        let dim = self.mesh().geometry_dim();
        let quadrature = SimplexQuadrature::new(dim, self.degree())?;
        let mut integral = DVector::zeros(self.value_size());
        for cell_index in 0..self.mesh().num_cells() {
            let cell = self.space.cell_geometry(cell_index)?;
            for (w, lambda) in quadrature.iter() {
                integral += self.evaluate_in_cell(cell_index, lambda) * (w * cell.abs_det());
            }
        }
        Ok(integral)
    }

    /// Mean value of each component over the mesh.
    pub fn mean(&self) -> eyre::Result<DVector<f64>> {
        let mut volume = 0.0;
        for cell_index in 0..self.mesh().num_cells() {
            volume += self.space.cell_geometry(cell_index)?.volume();
        }
        if volume <= 0.0 {
            return Err(eyre!("cannot compute the mean over an empty mesh"));
        }
        Ok(self.integral()? / volume)
    }
}
