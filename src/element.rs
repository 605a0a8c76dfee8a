//! Affine simplex geometry and Lagrange bases in barycentric coordinates.
use crate::mesh::Mesh;
use eyre::{bail, eyre};
use nalgebra::{DMatrix, DVector};

/// Geometry of an affine simplex (segment, triangle or tetrahedron).
///
/// The reference map is `x = x_0 + J xi`, where the columns of `J` are `x_k - x_0`. Barycentric
/// coordinates are `lambda_0 = 1 - sum(xi)` and `lambda_k = xi_k`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexCell {
    vertices: DMatrix<f64>,
    jacobian_inverse: DMatrix<f64>,
    abs_det: f64,
    barycentric_gradients: DMatrix<f64>,
}

impl SimplexCell {
    /// Constructs a cell from flattened vertex coordinates, `dim` values for each of the
    /// `dim + 1` vertices.
    pub fn from_vertices(dim: usize, coordinates: &[f64]) -> eyre::Result<Self> {
        if dim == 0 || coordinates.len() != dim * (dim + 1) {
            bail!(
                "expected {} coordinates for a {}-simplex, got {}",
                dim * (dim + 1),
                dim,
                coordinates.len()
            );
        }

        let vertices = DMatrix::from_column_slice(dim, dim + 1, coordinates);
        let x0 = vertices.column(0).clone_owned();
        let jacobian = DMatrix::from_fn(dim, dim, |i, k| vertices[(i, k + 1)] - x0[i]);
        let det = jacobian.determinant();
        let scale = jacobian.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if det.abs() <= 1e-14 * scale.powi(dim as i32) || scale == 0.0 {
            return Err(eyre!("degenerate cell with Jacobian determinant {:e}", det));
        }
        let jacobian_inverse = jacobian
            .try_inverse()
            .ok_or_else(|| eyre!("cell Jacobian is not invertible"))?;

        // grad lambda_k (k >= 1) is row k - 1 of J^-1, grad lambda_0 = -sum of the others
        let mut barycentric_gradients = DMatrix::zeros(dim, dim + 1);
        for k in 1..=dim {
            for i in 0..dim {
                barycentric_gradients[(i, k)] = jacobian_inverse[(k - 1, i)];
                barycentric_gradients[(i, 0)] -= jacobian_inverse[(k - 1, i)];
            }
        }

        Ok(Self {
            vertices,
            jacobian_inverse,
            abs_det: det.abs(),
            barycentric_gradients,
        })
    }

    pub fn from_mesh_cell(mesh: &Mesh, cell_index: usize) -> eyre::Result<Self> {
        Self::from_vertices(mesh.geometry_dim(), &mesh.cell_coordinates(cell_index))
    }

    pub fn dim(&self) -> usize {
        self.vertices.nrows()
    }

    /// Absolute value of the determinant of the reference map.
    pub fn abs_det(&self) -> f64 {
        self.abs_det
    }

    pub fn volume(&self) -> f64 {
        let factorial: f64 = (1..=self.dim()).map(|i| i as f64).product();
        self.abs_det / factorial
    }

    /// Gradients of the barycentric coordinates, one column per vertex.
    pub fn barycentric_gradients(&self) -> &DMatrix<f64> {
        &self.barycentric_gradients
    }

    /// Outward unit normal of the facet opposite to local vertex `k`.
    pub fn facet_normal(&self, k: usize) -> DVector<f64> {
        let gradient = self.barycentric_gradients.column(k).clone_owned();
        let norm = gradient.norm();
        -gradient / norm
    }

    /// Measure (length or area) of the facet opposite to local vertex `k`.
    pub fn facet_measure(&self, k: usize) -> f64 {
        // |T| = |F| h_k / d and |grad lambda_k| = 1 / h_k
        self.dim() as f64 * self.volume() * self.barycentric_gradients.column(k).norm()
    }

    pub fn map_barycentric(&self, lambda: &[f64]) -> DVector<f64> {
        assert_eq!(lambda.len(), self.dim() + 1);
        &self.vertices * DVector::from_column_slice(lambda)
    }

    pub fn barycentric_coordinates(&self, x: &[f64]) -> DVector<f64> {
        let dim = self.dim();
        assert_eq!(x.len(), dim);
        let dx = DVector::from_fn(dim, |i, _| x[i] - self.vertices[(i, 0)]);
        let xi = &self.jacobian_inverse * dx;
        let mut lambda = DVector::zeros(dim + 1);
        lambda[0] = 1.0 - xi.sum();
        lambda.rows_mut(1, dim).copy_from(&xi);
        lambda
    }
}

/// A Lagrange basis of degree 1-3 on a simplex, expressed in barycentric coordinates.
///
/// Nodes are the points `alpha / k` of the barycentric lattice, where `alpha` ranges over
/// the multi-indices with `|alpha| = k`. Vertex nodes come first, in vertex order, followed
/// by the remaining nodes in lexicographically descending order of `alpha`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagrangeBasis {
    dim: usize,
    degree: usize,
    nodes: Vec<Vec<usize>>,
}

impl LagrangeBasis {
    pub fn new(dim: usize, degree: usize) -> eyre::Result<Self> {
        if !(1..=3).contains(&dim) {
            bail!("Lagrange basis is only available in dimensions 1 to 3, got {}", dim);
        }
        if !(1..=3).contains(&degree) {
            bail!("Lagrange basis is only available for degrees 1 to 3, got {}", degree);
        }

        let mut lattice = Vec::new();
        enumerate_multi_indices(dim + 1, degree, &mut Vec::new(), &mut lattice);
        let is_vertex = |alpha: &Vec<usize>| alpha.iter().any(|&a| a == degree);
        let mut nodes: Vec<_> = (0..=dim)
            .map(|i| {
                let mut alpha = vec![0; dim + 1];
                alpha[i] = degree;
                alpha
            })
            .collect();
        nodes.extend(lattice.into_iter().filter(|alpha| !is_vertex(alpha)));

        Ok(Self { dim, degree, nodes })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Lattice multi-index of each node.
    pub fn nodes(&self) -> &[Vec<usize>] {
        &self.nodes
    }

    pub fn node_barycentric(&self, node: usize) -> Vec<f64> {
        let k = self.degree as f64;
        self.nodes[node].iter().map(|&a| a as f64 / k).collect()
    }

    /// Evaluates all basis functions at the given barycentric coordinates.
    pub fn populate_values(&self, values: &mut [f64], lambda: &[f64]) {
        assert_eq!(values.len(), self.num_nodes());
        assert_eq!(lambda.len(), self.dim + 1);
        let k = self.degree as f64;
        for (value, alpha) in values.iter_mut().zip(&self.nodes) {
            *value = alpha
                .iter()
                .zip(lambda)
                .map(|(&a, &l)| factor_value(a, k, l))
                .product();
        }
    }

    pub fn values(&self, lambda: &[f64]) -> Vec<f64> {
        let mut values = vec![0.0; self.num_nodes()];
        self.populate_values(&mut values, lambda);
        values
    }

    /// Derivatives with respect to the barycentric coordinates, with shape `(dim + 1) x n`.
    pub fn barycentric_derivatives(&self, lambda: &[f64]) -> DMatrix<f64> {
        assert_eq!(lambda.len(), self.dim + 1);
        let k = self.degree as f64;
        let mut derivatives = DMatrix::zeros(self.dim + 1, self.num_nodes());
        for (node, alpha) in self.nodes.iter().enumerate() {
            let factors: Vec<f64> = alpha
                .iter()
                .zip(lambda)
                .map(|(&a, &l)| factor_value(a, k, l))
                .collect();
            for i in 0..=self.dim {
                let others: f64 = factors
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, f)| f)
                    .product();
                derivatives[(i, node)] = factor_derivative(alpha[i], k, lambda[i]) * others;
            }
        }
        derivatives
    }

    /// Physical gradients of all basis functions in the given cell, with shape `dim x n`.
    pub fn gradients(&self, cell: &SimplexCell, lambda: &[f64]) -> DMatrix<f64> {
        cell.barycentric_gradients() * self.barycentric_derivatives(lambda)
    }
}

/// `prod_{j < a} (k l - j) / (j + 1)`
fn factor_value(a: usize, k: f64, l: f64) -> f64 {
    (0..a)
        .map(|j| (k * l - j as f64) / (j as f64 + 1.0))
        .product()
}

fn factor_derivative(a: usize, k: f64, l: f64) -> f64 {
    (0..a)
        .map(|m| {
            let others: f64 = (0..a)
                .filter(|&j| j != m)
                .map(|j| (k * l - j as f64) / (j as f64 + 1.0))
                .product();
            k / (m as f64 + 1.0) * others
        })
        .sum()
}

fn enumerate_multi_indices(len: usize, remaining: usize, prefix: &mut Vec<usize>, output: &mut Vec<Vec<usize>>) {
    if prefix.len() + 1 == len {
        let mut alpha = prefix.clone();
        alpha.push(remaining);
        output.push(alpha);
        return;
    }
    for a in (0..=remaining).rev() {
        prefix.push(a);
        enumerate_multi_indices(len, remaining - a, prefix, output);
        prefix.pop();
    }
}

/// Number of nodes of the degree `k` Lagrange basis on a `d`-simplex, `binom(k + d, d)`.
pub fn lagrange_node_count(dim: usize, degree: usize) -> usize {
    (1..=dim).fold(1, |acc, i| acc * (degree + i) / i)
}
