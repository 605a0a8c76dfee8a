use crate::element::LagrangeBasis;
use crate::quadrature::SimplexQuadrature;
use nalgebra::DMatrix;

/// Basis values and barycentric derivatives tabulated at the points of a quadrature rule.
///
/// Since both the rule and the basis are expressed in barycentric coordinates, the table is
/// shared by all cells of a mesh.
#[derive(Debug, Clone)]
pub struct BasisQuadrature {
    quadrature: SimplexQuadrature,
    values: Vec<Vec<f64>>,
    derivatives: Vec<DMatrix<f64>>,
}

impl BasisQuadrature {
    pub fn new(basis: &LagrangeBasis, quadrature: SimplexQuadrature) -> Self {
        let values = quadrature
            .iter()
            .map(|(_, lambda)| basis.values(lambda))
            .collect();
        let derivatives = quadrature
            .iter()
            .map(|(_, lambda)| basis.barycentric_derivatives(lambda))
            .collect();
        Self {
            quadrature,
            values,
            derivatives,
        }
    }

    pub fn num_points(&self) -> usize {
        self.quadrature.num_points()
    }

    pub fn weight(&self, q: usize) -> f64 {
        self.quadrature.weights()[q]
    }

    pub fn values(&self, q: usize) -> &[f64] {
        &self.values[q]
    }

    /// Derivatives with respect to the barycentric coordinates, `(dim + 1) x n`.
    pub fn barycentric_derivatives(&self, q: usize) -> &DMatrix<f64> {
        &self.derivatives[q]
    }
}

/// Tabulated basis on the reference cell and on each of its facets.
#[derive(Debug, Clone)]
pub struct BasisTable {
    volume: BasisQuadrature,
    facets: Vec<BasisQuadrature>,
}

impl BasisTable {
    /// Tabulates `basis` with rules of the given strength.
    pub fn new(basis: &LagrangeBasis, strength: usize) -> eyre::Result<Self> {
        let dim = basis.dim();
        let volume = BasisQuadrature::new(basis, SimplexQuadrature::new(dim, strength)?);
        let facets = (0..=dim)
            .map(|k| Ok(BasisQuadrature::new(basis, SimplexQuadrature::facet(dim, strength, k)?)))
            .collect::<eyre::Result<_>>()?;
        Ok(Self { volume, facets })
    }

    /// Tabulation exact for products of two basis functions of the given basis.
    pub fn for_products(basis: &LagrangeBasis) -> eyre::Result<Self> {
        Self::new(basis, 2 * basis.degree())
    }

    /// Weights sum to the volume of the reference simplex.
    pub fn volume(&self) -> &BasisQuadrature {
        &self.volume
    }

    /// Weights sum to one.
    pub fn facet(&self, local_facet: usize) -> &BasisQuadrature {
        &self.facets[local_facet]
    }
}
