use crate::element::SimplexCell;
use crate::mesh::procedural::{create_box_tet_mesh, create_rectangular_tri_mesh};
use crate::mesh::Mesh;
use ::proptest::prelude::*;
use std::cmp::max;

pub fn point2() -> impl Strategy<Value = [f64; 2]> {
    // Pick a reasonably small range to pick coordinates from,
    // otherwise we can easily get floating point numbers that are
    // so ridiculously large as to break anything we might want to do with them
    let range = -10.0..10.0;
    [range.clone(), range]
}

pub fn point3() -> impl Strategy<Value = [f64; 3]> {
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range]
}

/// Triangles whose smallest angle is bounded away from zero.
pub fn triangle_cell() -> impl Strategy<Value = SimplexCell> {
    [point2(), point2(), point2()]
        .prop_filter("triangle must be well shaped", |[a, b, c]| {
            let area = 0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs();
            let longest = [(a, b), (b, c), (c, a)]
                .iter()
                .map(|(p, q)| ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt())
                .fold(0.0_f64, f64::max);
            area > 0.05 * longest * longest
        })
        .prop_filter_map("triangle must be non-degenerate", |[a, b, c]| {
            SimplexCell::from_vertices(2, &[a[0], a[1], b[0], b[1], c[0], c[1]]).ok()
        })
}

/// Tetrahedra obtained by lifting a point above an arbitrary triangle in the `xy` plane.
pub fn tetrahedron_cell() -> impl Strategy<Value = SimplexCell> {
    (triangle_cell(), point2(), 1.0..10.0)
        .prop_filter_map("tetrahedron must be non-degenerate", |(triangle, apex, height)| {
            let lambda = [1.0 / 3.0; 3];
            let centroid = triangle.map_barycentric(&lambda);
            let mut coordinates = Vec::with_capacity(12);
            for k in 0..3 {
                let mut vertex_lambda = [0.0; 3];
                vertex_lambda[k] = 1.0;
                let v = triangle.map_barycentric(&vertex_lambda);
                coordinates.extend_from_slice(&[v[0], v[1], 0.0]);
            }
            coordinates.extend_from_slice(&[centroid[0] + 0.1 * apex[0], centroid[1] + 0.1 * apex[1], height]);
            SimplexCell::from_vertices(3, &coordinates).ok()
        })
}

/// Rectangular triangle meshes with at most `max_cells` squares.
pub fn rectangular_tri_mesh(max_cells: usize) -> impl Strategy<Value = Mesh> {
    let max_cells = max(1, max_cells);
    (1..=max_cells)
        .prop_flat_map(move |nx| (Just(nx), 1..=max(1, max_cells / nx), 0.5..2.0, 0.5..2.0))
        .prop_map(|(nx, ny, width, height)| create_rectangular_tri_mesh([width, height], [nx, ny]))
}

/// Box tetrahedral meshes with at most `max_cells` cubes.
pub fn box_tet_mesh(max_cells: usize) -> impl Strategy<Value = Mesh> {
    let max_cells = max(1, max_cells);
    (1..=max_cells)
        .prop_flat_map(move |nx| (Just(nx), 1..=max(1, max_cells / nx)))
        .prop_flat_map(move |(nx, ny)| (Just(nx), Just(ny), 1..=max(1, max_cells / (nx * ny))))
        .prop_map(|(nx, ny, nz)| create_box_tet_mesh([1.0, 1.0, 1.0], [nx, ny, nz]))
}
