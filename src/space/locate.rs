use crate::element::SimplexCell;
use crate::mesh::Mesh;
use nalgebra::DVector;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;

/// Barycentric coordinates down to this (negative) value count as inside a cell.
const INSIDE_TOLERANCE: f64 = 1e-10;

/// Accelerates point location in a mesh with an R-tree of cell bounding boxes.
///
/// Two-dimensional meshes are embedded in the plane `z = 0`.
#[derive(Debug, Clone)]
pub struct CellLocator {
    tree: RTree<GeomWithData<Rectangle<[f64; 3]>, usize>>,
}

impl CellLocator {
    pub fn new(mesh: &Mesh) -> Self {
        let dim = mesh.geometry_dim();
        let boxes = mesh
            .cell_iter()
            .enumerate()
            .map(|(cell_index, cell)| {
                let mut lower = [0.0; 3];
                let mut upper = [0.0; 3];
                for i in 0..dim {
                    let coords = cell.iter().map(|&v| mesh.vertex(v)[i]);
                    let min = coords.clone().fold(f64::INFINITY, f64::min);
                    let max = coords.fold(f64::NEG_INFINITY, f64::max);
                    // Make bounding box larger than necessary to accommodate floating point errors
                    let pad = 1e-8 * (max - min).max(f64::MIN_POSITIVE);
                    lower[i] = min - pad;
                    upper[i] = max + pad;
                }
                GeomWithData::new(Rectangle::from_corners(lower, upper), cell_index)
            })
            .collect();
        Self {
            tree: RTree::bulk_load(boxes),
        }
    }

    /// Finds the cell containing `x` together with the barycentric coordinates of `x`.
    ///
    /// Points on shared facets may belong to several cells. The cell in which `x` lies deepest
    /// is chosen, with ties resolved by the lowest cell index.
    pub fn locate(&self, mesh: &Mesh, x: &[f64]) -> Option<(usize, DVector<f64>)> {
        let dim = mesh.geometry_dim();
        if x.len() != dim {
            return None;
        }
        let mut point = [0.0; 3];
        point[..dim].copy_from_slice(x);

        let mut candidates: Vec<usize> = self
            .tree
            .locate_all_at_point(&point)
            .map(|geom| geom.data)
            .collect();
        candidates.sort_unstable();

        let mut best: Option<(usize, DVector<f64>, f64)> = None;
        for cell_index in candidates {
            let Ok(cell) = SimplexCell::from_mesh_cell(mesh, cell_index) else {
                continue;
            };
            let lambda = cell.barycentric_coordinates(x);
            let depth = lambda.min();
            let is_better = best.as_ref().map_or(true, |(_, _, best_depth)| depth > *best_depth);
            if depth >= -INSIDE_TOLERANCE && is_better {
                best = Some((cell_index, lambda, depth));
            }
        }
        best.map(|(cell_index, lambda, _)| (cell_index, lambda))
    }
}
