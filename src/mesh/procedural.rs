//! Basic procedural mesh generation routines.
use crate::mesh::Mesh;
use itertools::Itertools;

/// Creates a triangulation of the unit square `[0, 1]^2` with `cells_per_dim` squares along each
/// axis, each split into two triangles.
pub fn create_unit_square_tri_mesh(cells_per_dim: usize) -> Mesh {
    create_rectangular_tri_mesh([1.0, 1.0], [cells_per_dim, cells_per_dim])
}

/// Creates a triangulation of `[0, extents[0]] x [0, extents[1]]`.
///
/// Every square is split along the diagonal from its lower-left to its upper-right corner,
/// which makes the triangulation conforming. If any cell count is zero, the mesh is empty.
pub fn create_rectangular_tri_mesh(extents: [f64; 2], cells: [usize; 2]) -> Mesh {
    let [nx, ny] = cells;
    if nx == 0 || ny == 0 {
        return empty_mesh(2);
    }

    let (hx, hy) = (extents[0] / nx as f64, extents[1] / ny as f64);
    let mut vertices = Vec::with_capacity(2 * (nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            vertices.extend_from_slice(&[i as f64 * hx, j as f64 * hy]);
        }
    }

    let vertex_index = |i: usize, j: usize| j * (nx + 1) + i;
    let mut connectivity = Vec::with_capacity(6 * nx * ny);
    for (j, i) in (0..ny).cartesian_product(0..nx) {
        let v00 = vertex_index(i, j);
        let v10 = vertex_index(i + 1, j);
        let v01 = vertex_index(i, j + 1);
        let v11 = vertex_index(i + 1, j + 1);
        connectivity.extend_from_slice(&[v00, v10, v11]);
        connectivity.extend_from_slice(&[v00, v11, v01]);
    }

    Mesh::from_valid_parts(2, vertices, connectivity)
}

/// Creates a tetrahedralization of the unit cube `[0, 1]^3`.
pub fn create_unit_cube_tet_mesh(cells_per_dim: usize) -> Mesh {
    create_box_tet_mesh([1.0, 1.0, 1.0], [cells_per_dim, cells_per_dim, cells_per_dim])
}

/// Creates a tetrahedralization of the box `[0, extents[0]] x [0, extents[1]] x [0, extents[2]]`.
///
/// Every cube is split into six tetrahedra sharing the diagonal from `(0, 0, 0)` to `(1, 1, 1)`
/// (Kuhn subdivision). Each tetrahedron follows a monotone path along the cube edges, one per
/// permutation of the axes, so neighboring cubes match on their shared faces.
pub fn create_box_tet_mesh(extents: [f64; 3], cells: [usize; 3]) -> Mesh {
    let [nx, ny, nz] = cells;
    if nx == 0 || ny == 0 || nz == 0 {
        return empty_mesh(3);
    }

    let h = [
        extents[0] / nx as f64,
        extents[1] / ny as f64,
        extents[2] / nz as f64,
    ];
    let mut vertices = Vec::with_capacity(3 * (nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                vertices.extend_from_slice(&[i as f64 * h[0], j as f64 * h[1], k as f64 * h[2]]);
            }
        }
    }

    let vertex_index = |[i, j, k]: [usize; 3]| (k * (ny + 1) + j) * (nx + 1) + i;
    let mut connectivity = Vec::with_capacity(24 * nx * ny * nz);
    for ((k, j), i) in (0..nz).cartesian_product(0..ny).cartesian_product(0..nx) {
        for axes in (0..3).permutations(3) {
            let mut corner = [i, j, k];
            connectivity.push(vertex_index(corner));
            for axis in axes {
                corner[axis] += 1;
                connectivity.push(vertex_index(corner));
            }
        }
    }

    Mesh::from_valid_parts(3, vertices, connectivity)
}

fn empty_mesh(dim: usize) -> Mesh {
    Mesh::from_valid_parts(dim, Vec::new(), Vec::new())
}
