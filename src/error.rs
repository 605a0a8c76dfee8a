//! Functionality for error estimation.
use crate::quadrature::SimplexQuadrature;
use crate::space::Function;
use nalgebra::{DMatrix, DVector};

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2}$ with a quadrature rule of the
/// given strength on every cell.
///
/// `u` writes the `value_size` components of the exact solution at a point into its output.
#[allow(non_snake_case)]
pub fn estimate_L2_error_squared(
    u_h: &Function,
    u: impl Fn(&[f64], &mut [f64]),
    quadrature_strength: usize,
) -> eyre::Result<f64> {
    let mesh = u_h.mesh();
    let quadrature = SimplexQuadrature::new(mesh.geometry_dim(), quadrature_strength)?;
    let mut u_at_x = DVector::zeros(u_h.value_size());

    let mut result = 0.0;
    for cell_index in 0..mesh.num_cells() {
        let cell = u_h.space().cell_geometry(cell_index)?;
        for (w, lambda) in quadrature.iter() {
            let x = cell.map_barycentric(lambda);
            u(x.as_slice(), u_at_x.as_mut_slice());
            let error = u_h.evaluate_in_cell(cell_index, lambda) - &u_at_x;
            result += w * error.norm_squared() * cell.abs_det();
        }
    }
    Ok(result)
}

#[allow(non_snake_case)]
pub fn estimate_L2_error(
    u_h: &Function,
    u: impl Fn(&[f64], &mut [f64]),
    quadrature_strength: usize,
) -> eyre::Result<f64> {
    estimate_L2_error_squared(u_h, u, quadrature_strength).map(f64::sqrt)
}

/// Estimate the squared $H^1$ *seminorm* error $\seminorm{u_h - u}^2_{H^1}$.
///
/// `u_grad` returns the gradient of the exact solution with shape `value_size x dim`.
#[allow(non_snake_case)]
pub fn estimate_H1_seminorm_error_squared(
    u_h: &Function,
    u_grad: impl Fn(&[f64]) -> DMatrix<f64>,
    quadrature_strength: usize,
) -> eyre::Result<f64> {
    let mesh = u_h.mesh();
    let quadrature = SimplexQuadrature::new(mesh.geometry_dim(), quadrature_strength)?;

    let mut result = 0.0;
    for cell_index in 0..mesh.num_cells() {
        let cell = u_h.space().cell_geometry(cell_index)?;
        for (w, lambda) in quadrature.iter() {
            let x = cell.map_barycentric(lambda);
            let error = u_h.gradient_in_cell(cell_index, lambda)? - u_grad(x.as_slice());
            result += w * error.norm_squared() * cell.abs_det();
        }
    }
    Ok(result)
}

#[allow(non_snake_case)]
pub fn estimate_H1_seminorm_error(
    u_h: &Function,
    u_grad: impl Fn(&[f64]) -> DMatrix<f64>,
    quadrature_strength: usize,
) -> eyre::Result<f64> {
    estimate_H1_seminorm_error_squared(u_h, u_grad, quadrature_strength).map(f64::sqrt)
}
