//! Conforming simplicial meshes of runtime dimension.
use eyre::{bail, eyre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod procedural;

/// A facet on the boundary of a mesh.
///
/// The facet is identified by the cell it belongs to and the local index of the cell vertex
/// opposite to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoundaryFacet {
    pub cell: usize,
    pub local_facet: usize,
}

/// A simplicial mesh: segments in 1D, triangles in 2D, tetrahedra in 3D.
///
/// Vertices are stored as a flat array of `dim` coordinates per vertex, and cells as a flat
/// array of `dim + 1` vertex indices per cell. Boundary facets are computed on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    dim: usize,
    vertices: Vec<f64>,
    cells: Vec<usize>,
    boundary_facets: Vec<BoundaryFacet>,
}

impl Mesh {
    pub fn from_vertices_and_cells(dim: usize, vertices: Vec<f64>, cells: Vec<usize>) -> eyre::Result<Self> {
        if !(1..=3).contains(&dim) {
            bail!("unsupported mesh dimension {}", dim);
        }
        if vertices.len() % dim != 0 {
            bail!(
                "vertex array of length {} is not a multiple of the dimension {}",
                vertices.len(),
                dim
            );
        }
        if cells.len() % (dim + 1) != 0 {
            bail!(
                "cell array of length {} is not a multiple of the cell size {}",
                cells.len(),
                dim + 1
            );
        }
        let num_vertices = vertices.len() / dim;
        if let Some(&index) = cells.iter().find(|&&v| v >= num_vertices) {
            return Err(eyre!(
                "cell refers to vertex {}, but the mesh only has {} vertices",
                index,
                num_vertices
            ));
        }

        Ok(Self::from_valid_parts(dim, vertices, cells))
    }

    /// Construction for arrays already known to be consistent.
    pub(crate) fn from_valid_parts(dim: usize, vertices: Vec<f64>, cells: Vec<usize>) -> Self {
        let mut mesh = Self {
            dim,
            vertices,
            cells,
            boundary_facets: Vec::new(),
        };
        mesh.boundary_facets = mesh.find_boundary_facets();
        mesh
    }

    /// Dimension of the ambient space.
    pub fn geometry_dim(&self) -> usize {
        self.dim
    }

    /// Dimension of the cells. Meshes are always volumetric, so this equals the geometry dimension.
    pub fn topology_dim(&self) -> usize {
        self.dim
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / self.dim
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len() / self.vertices_per_cell()
    }

    pub fn vertices_per_cell(&self) -> usize {
        self.dim + 1
    }

    pub fn vertex(&self, index: usize) -> &[f64] {
        &self.vertices[self.dim * index..self.dim * (index + 1)]
    }

    /// All vertex coordinates, `dim` entries per vertex.
    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    pub fn cell(&self, index: usize) -> &[usize] {
        let n = self.vertices_per_cell();
        &self.cells[n * index..n * (index + 1)]
    }

    pub fn cell_iter(&self) -> impl ExactSizeIterator<Item = &[usize]> {
        self.cells.chunks_exact(self.vertices_per_cell())
    }

    /// Coordinates of the vertices of the given cell, flattened.
    pub fn cell_coordinates(&self, index: usize) -> Vec<f64> {
        self.cell(index)
            .iter()
            .flat_map(|&v| self.vertex(v).iter().copied())
            .collect()
    }

    /// Boundary facets, sorted by cell and local facet index.
    pub fn boundary_facets(&self) -> &[BoundaryFacet] {
        &self.boundary_facets
    }

    /// Global vertex indices of a facet, in the order they appear in the cell.
    pub fn facet_vertices(&self, facet: &BoundaryFacet) -> Vec<usize> {
        self.cell(facet.cell)
            .iter()
            .enumerate()
            .filter(|&(local, _)| local != facet.local_facet)
            .map(|(_, &v)| v)
            .collect()
    }

    /// Sorted indices of all vertices that lie on a boundary facet.
    pub fn boundary_vertices(&self) -> Vec<usize> {
        let mut vertices: Vec<_> = self
            .boundary_facets
            .iter()
            .flat_map(|facet| self.facet_vertices(facet))
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    /// Applies the given transformation to every vertex. Boundary information is unaffected.
    pub fn transform_vertices(&mut self, mut transformation: impl FnMut(&mut [f64])) {
        for v in self.vertices.chunks_exact_mut(self.dim) {
            transformation(v);
        }
    }

    /// A facet is on the boundary if it is shared by exactly one cell.
    fn find_boundary_facets(&self) -> Vec<BoundaryFacet> {
        let mut facet_count = BTreeMap::new();
        for (cell_index, cell) in self.cell_iter().enumerate() {
            for local_facet in 0..cell.len() {
                let mut key: Vec<usize> = cell
                    .iter()
                    .enumerate()
                    .filter(|&(local, _)| local != local_facet)
                    .map(|(_, &v)| v)
                    .collect();
                key.sort_unstable();
                facet_count
                    .entry(key)
                    .and_modify(|(count, _)| *count += 1)
                    .or_insert((1, BoundaryFacet {
                        cell: cell_index,
                        local_facet,
                    }));
            }
        }

        let mut facets: Vec<_> = facet_count
            .into_values()
            .filter(|&(count, _)| count == 1)
            .map(|(_, facet)| facet)
            .collect();
        facets.sort_unstable();
        facets
    }
}
