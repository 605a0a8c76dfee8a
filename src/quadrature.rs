//! Quadrature on reference simplices of runtime dimension, and on their facets.
use eyre::eyre;
use streamfn_quadrature::simplex::simplex_flat;

/// A quadrature rule on the reference simplex, with points given in barycentric coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexQuadrature {
    dim: usize,
    weights: Vec<f64>,
    barycentric: Vec<f64>,
}

impl SimplexQuadrature {
    /// A rule for the reference `dim`-simplex that integrates polynomials of total degree
    /// `strength` exactly.
    pub fn new(dim: usize, strength: usize) -> eyre::Result<Self> {
        let (weights, points) =
            simplex_flat(dim, strength).map_err(|err| eyre!("{} (dim = {}, strength = {})", err, dim, strength))?;
        let barycentric = points
            .chunks_exact(dim)
            .flat_map(|xi| std::iter::once(1.0 - xi.iter().sum::<f64>()).chain(xi.iter().copied()))
            .collect();
        Ok(Self {
            dim,
            weights,
            barycentric,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    /// Weights with respect to the reference simplex.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Barycentric coordinates of quadrature point `q`.
    pub fn barycentric(&self, q: usize) -> &[f64] {
        let n = self.dim + 1;
        &self.barycentric[n * q..n * (q + 1)]
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> {
        self.weights
            .iter()
            .copied()
            .zip(self.barycentric.chunks_exact(self.dim + 1))
    }

    /// Maps a rule for the reference facet of a `dim`-simplex onto the facet opposite to local
    /// vertex `local_facet`. Points are expressed in the barycentric coordinates of the cell.
    ///
    /// Weights are scaled so that they sum to one: multiply by the facet measure to integrate.
    pub fn facet(dim: usize, strength: usize, local_facet: usize) -> eyre::Result<Self> {
        if local_facet > dim {
            return Err(eyre!("a {}-simplex has no facet {}", dim, local_facet));
        }
        let facet_dim = dim - 1;
        let (weights, barycentric) = if facet_dim == 0 {
            (vec![1.0], vec![1.0])
        } else {
            let rule = Self::new(facet_dim, strength)?;
            let reference_measure: f64 = rule.weights.iter().sum();
            let weights = rule.weights.iter().map(|w| w / reference_measure).collect();
            (weights, rule.barycentric)
        };

        let mapped = barycentric
            .chunks_exact(facet_dim + 1)
            .flat_map(|mu| {
                let mut lambda = Vec::with_capacity(dim + 1);
                lambda.extend_from_slice(&mu[..local_facet]);
                lambda.push(0.0);
                lambda.extend_from_slice(&mu[local_facet..]);
                lambda
            })
            .collect();

        Ok(Self {
            dim,
            weights,
            barycentric: mapped,
        })
    }
}
