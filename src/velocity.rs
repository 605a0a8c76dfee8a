//! Velocity fields given either component-wise or as a single vector-valued function.
use crate::mesh::Mesh;
use crate::space::{same_mesh, Function, FunctionSpace};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// A velocity field, either as one scalar function per component or as a single
/// vector-valued function.
#[derive(Debug, Clone)]
pub enum VelocityField {
    Components(Vec<Function>),
    Packed(Function),
}

impl VelocityField {
    /// The mesh of the first function, if any.
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        match self {
            Self::Components(components) => components.first().map(Function::mesh),
            Self::Packed(function) => Some(function.mesh()),
        }
    }

    pub fn geometry_dim(&self) -> Option<usize> {
        self.mesh().map(|mesh| mesh.geometry_dim())
    }

    pub fn degree(&self) -> Option<usize> {
        match self {
            Self::Components(components) => components.first().map(Function::degree),
            Self::Packed(function) => Some(function.degree()),
        }
    }
}

impl From<Vec<Function>> for VelocityField {
    fn from(components: Vec<Function>) -> Self {
        Self::Components(components)
    }
}

impl From<Function> for VelocityField {
    fn from(function: Function) -> Self {
        Self::Packed(function)
    }
}

/// A velocity field brought into a uniform shape: one coefficient vector per component, all
/// over the same scalar space.
#[derive(Debug, Clone)]
pub struct ResolvedVelocity {
    pub space: Arc<FunctionSpace>,
    pub components: Vec<DVector<f64>>,
}

impl ResolvedVelocity {
    /// Checks that the field has `expected_components` compatible components.
    ///
    /// Returns a description of the first problem encountered otherwise.
    pub fn resolve(field: &VelocityField, expected_components: usize) -> Result<Self, String> {
        match field {
            VelocityField::Packed(function) => {
                if function.value_size() != expected_components {
                    return Err(format!(
                        "expected a velocity with {} components, got a function with {} components",
                        expected_components,
                        function.value_size()
                    ));
                }
                let components = (0..expected_components)
                    .map(|i| function.component(i).map(Function::into_coefficients))
                    .collect::<eyre::Result<Vec<_>>>()
                    .map_err(|err| err.to_string())?;
                Ok(Self {
                    space: Arc::new(function.space().scalar_subspace()),
                    components,
                })
            }
            VelocityField::Components(functions) => {
                let first = functions
                    .first()
                    .ok_or_else(|| "velocity field has no components".to_string())?;
                if functions.len() != expected_components {
                    return Err(format!(
                        "expected {} velocity components, got {}",
                        expected_components,
                        functions.len()
                    ));
                }
                for (i, function) in functions.iter().enumerate() {
                    if function.value_size() != 1 {
                        return Err(format!(
                            "velocity component {} is not scalar (value size {})",
                            i,
                            function.value_size()
                        ));
                    }
                    if !same_mesh(function.mesh(), first.mesh()) {
                        return Err(format!("velocity component {} is defined on a different mesh", i));
                    }
                    if function.degree() != first.degree() {
                        return Err(format!(
                            "velocity component {} has degree {}, but component 0 has degree {}",
                            i,
                            function.degree(),
                            first.degree()
                        ));
                    }
                    if !function.space().has_same_layout(first.space()) {
                        return Err(format!("velocity component {} uses a different node numbering", i));
                    }
                }
                Ok(Self {
                    space: first.space().clone(),
                    components: functions
                        .iter()
                        .map(|function| function.coefficients().clone())
                        .collect(),
                })
            }
        }
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Writes the velocity at a point of a cell into `out`, given the basis values `phi` there.
    pub fn evaluate(&self, cell_index: usize, phi: &[f64], out: &mut [f64]) {
        let nodes = self.space.cell_nodes(cell_index);
        for (out_c, u_c) in out.iter_mut().zip(&self.components) {
            *out_c = nodes.iter().zip(phi).map(|(&node, p)| p * u_c[node]).sum();
        }
    }

    /// Velocity gradient `du_c / dx_j` with shape `components x dim`, given the physical
    /// basis gradients `dphi` (shape `dim x n`) at a point of a cell.
    pub fn gradient(&self, cell_index: usize, dphi: &DMatrix<f64>) -> DMatrix<f64> {
        let nodes = self.space.cell_nodes(cell_index);
        let mut gradient = DMatrix::zeros(self.components.len(), dphi.nrows());
        for (c, u_c) in self.components.iter().enumerate() {
            for (a, &node) in nodes.iter().enumerate() {
                for j in 0..dphi.nrows() {
                    gradient[(c, j)] += u_c[node] * dphi[(j, a)];
                }
            }
        }
        gradient
    }
}
