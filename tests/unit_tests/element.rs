use matrixcompare::{assert_matrix_eq, assert_scalar_eq, prop_assert_matrix_eq, prop_assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use streamfn::element::{lagrange_node_count, LagrangeBasis, SimplexCell};

fn reference_triangle() -> SimplexCell {
    SimplexCell::from_vertices(2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap()
}

fn reference_tetrahedron() -> SimplexCell {
    SimplexCell::from_vertices(3, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap()
}

#[test]
fn lagrange_node_counts() {
    assert_eq!(lagrange_node_count(1, 3), 4);
    assert_eq!(lagrange_node_count(2, 1), 3);
    assert_eq!(lagrange_node_count(2, 2), 6);
    assert_eq!(lagrange_node_count(2, 3), 10);
    assert_eq!(lagrange_node_count(3, 1), 4);
    assert_eq!(lagrange_node_count(3, 2), 10);
    assert_eq!(lagrange_node_count(3, 3), 20);

    for dim in 1..=3 {
        for degree in 1..=3 {
            let basis = LagrangeBasis::new(dim, degree).unwrap();
            assert_eq!(basis.num_nodes(), lagrange_node_count(dim, degree));
        }
    }
}

#[test]
fn lagrange_basis_rejects_unsupported_parameters() {
    assert!(LagrangeBasis::new(2, 0).is_err());
    assert!(LagrangeBasis::new(2, 4).is_err());
    assert!(LagrangeBasis::new(0, 1).is_err());
    assert!(LagrangeBasis::new(4, 1).is_err());
}

#[test]
fn vertex_nodes_come_first() {
    let basis = LagrangeBasis::new(2, 2).unwrap();
    let nodes = basis.nodes();
    assert_eq!(nodes[0], vec![2, 0, 0]);
    assert_eq!(nodes[1], vec![0, 2, 0]);
    assert_eq!(nodes[2], vec![0, 0, 2]);
    assert_eq!(nodes[3], vec![1, 1, 0]);
    assert_eq!(nodes[4], vec![1, 0, 1]);
    assert_eq!(nodes[5], vec![0, 1, 1]);
    assert_eq!(basis.node_barycentric(3), vec![0.5, 0.5, 0.0]);
}

#[test]
fn lagrange_basis_is_nodal() {
    for dim in 1..=3 {
        for degree in 1..=3 {
            let basis = LagrangeBasis::new(dim, degree).unwrap();
            let n = basis.num_nodes();
            let values = DMatrix::from_fn(n, n, |i, j| basis.values(&basis.node_barycentric(j))[i]);
            assert_matrix_eq!(values, DMatrix::<f64>::identity(n, n), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn reference_triangle_geometry() {
    let cell = reference_triangle();
    assert_eq!(cell.dim(), 2);
    assert_scalar_eq!(cell.abs_det(), 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(cell.volume(), 0.5, comp = abs, tol = 1e-15);

    #[rustfmt::skip]
    let expected_gradients = DMatrix::from_row_slice(2, 3, &[
        -1.0, 1.0, 0.0,
        -1.0, 0.0, 1.0,
    ]);
    assert_matrix_eq!(cell.barycentric_gradients().clone(), expected_gradients, comp = abs, tol = 1e-15);

    // Facet 0 is the hypotenuse, facet 1 lies on x = 0 and facet 2 on y = 0
    let s = 0.5_f64.sqrt();
    assert_matrix_eq!(cell.facet_normal(0), DVector::from_vec(vec![s, s]), comp = abs, tol = 1e-15);
    assert_matrix_eq!(cell.facet_normal(1), DVector::from_vec(vec![-1.0, 0.0]), comp = abs, tol = 1e-15);
    assert_matrix_eq!(cell.facet_normal(2), DVector::from_vec(vec![0.0, -1.0]), comp = abs, tol = 1e-15);
    assert_scalar_eq!(cell.facet_measure(0), 2.0_f64.sqrt(), comp = abs, tol = 1e-14);
    assert_scalar_eq!(cell.facet_measure(1), 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(cell.facet_measure(2), 1.0, comp = abs, tol = 1e-14);
}

#[test]
fn reference_tetrahedron_geometry() {
    let cell = reference_tetrahedron();
    assert_scalar_eq!(cell.volume(), 1.0 / 6.0, comp = abs, tol = 1e-15);
    let s = 1.0 / 3.0_f64.sqrt();
    assert_matrix_eq!(cell.facet_normal(0), DVector::from_vec(vec![s, s, s]), comp = abs, tol = 1e-14);
    assert_matrix_eq!(cell.facet_normal(3), DVector::from_vec(vec![0.0, 0.0, -1.0]), comp = abs, tol = 1e-14);
    assert_scalar_eq!(cell.facet_measure(0), 0.75_f64.sqrt(), comp = abs, tol = 1e-14);
    assert_scalar_eq!(cell.facet_measure(3), 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn degenerate_cells_are_rejected() {
    assert!(SimplexCell::from_vertices(2, &[0.0, 0.0, 1.0, 1.0, 2.0, 2.0]).is_err());
    assert!(SimplexCell::from_vertices(2, &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
    assert!(SimplexCell::from_vertices(2, &[0.0, 0.0, 1.0, 0.0]).is_err());
    assert!(SimplexCell::from_vertices(3, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]).is_err());
}

#[test]
fn p2_gradients_reproduce_quadratic() {
    // Interpolate f(x, y) = x^2 + 3xy - y on an arbitrary triangle and compare gradients
    let cell = SimplexCell::from_vertices(2, &[0.5, -0.2, 2.0, 0.3, 0.8, 1.7]).unwrap();
    let basis = LagrangeBasis::new(2, 2).unwrap();
    let f = |x: &DVector<f64>| x[0] * x[0] + 3.0 * x[0] * x[1] - x[1];
    let coefficients: Vec<f64> = (0..basis.num_nodes())
        .map(|i| f(&cell.map_barycentric(&basis.node_barycentric(i))))
        .collect();

    let lambda = [0.2, 0.5, 0.3];
    let x = cell.map_barycentric(&lambda);
    let gradients = basis.gradients(&cell, &lambda);
    let interpolated = gradients * DVector::from_vec(coefficients);
    let expected = DVector::from_vec(vec![2.0 * x[0] + 3.0 * x[1], 3.0 * x[0] - 1.0]);
    assert_matrix_eq!(interpolated, expected, comp = abs, tol = 1e-12);
}

proptest! {
    #[test]
    fn barycentric_coordinates_invert_map(cell in streamfn::proptest::triangle_cell(), a in 0.0..1.0, b in 0.0..1.0) {
        let lambda = [1.0 - 0.5 * (a + b), 0.5 * a, 0.5 * b];
        let x = cell.map_barycentric(&lambda);
        let recovered = cell.barycentric_coordinates(x.as_slice());
        prop_assert_matrix_eq!(recovered, DVector::from_column_slice(&lambda), comp = abs, tol = 1e-9);
    }

    #[test]
    fn triangle_basis_partition_of_unity(cell in streamfn::proptest::triangle_cell(),
                                         degree in 1..=3_usize,
                                         a in 0.0..1.0, b in 0.0..1.0) {
        let basis = LagrangeBasis::new(2, degree).unwrap();
        let lambda = [1.0 - 0.5 * (a + b), 0.5 * a, 0.5 * b];
        let sum: f64 = basis.values(&lambda).iter().sum();
        prop_assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-12);

        // Gradients of a partition of unity sum to zero
        let gradient_sum = basis.gradients(&cell, &lambda).column_sum();
        let scale = cell.barycentric_gradients().amax().max(1.0);
        prop_assert_matrix_eq!(gradient_sum / scale, DVector::<f64>::zeros(2), comp = abs, tol = 1e-10);
    }

    #[test]
    fn tetrahedron_facets_close(cell in streamfn::proptest::tetrahedron_cell()) {
        // The area-weighted outward normals of a closed surface sum to zero
        let mut sum = DVector::<f64>::zeros(3);
        let mut total_area = 0.0;
        for k in 0..4 {
            sum += cell.facet_normal(k) * cell.facet_measure(k);
            total_area += cell.facet_measure(k);
        }
        prop_assert_matrix_eq!(sum / total_area, DVector::<f64>::zeros(3), comp = abs, tol = 1e-10);

        // Normals point away from the opposite vertex
        for k in 0..4 {
            let mut vertex_lambda = [0.0; 4];
            vertex_lambda[k] = 1.0;
            let mut facet_lambda = [1.0 / 3.0; 4];
            facet_lambda[k] = 0.0;
            let outward = cell.map_barycentric(&facet_lambda) - cell.map_barycentric(&vertex_lambda);
            prop_assert!(outward.dot(&cell.facet_normal(k)) > 0.0);
        }
    }

    #[test]
    fn tetrahedron_barycentric_gradients_sum_to_zero(cell in streamfn::proptest::tetrahedron_cell()) {
        let gradients = cell.barycentric_gradients();
        let scale = gradients.amax();
        prop_assert_matrix_eq!(gradients.column_sum() / scale, DVector::<f64>::zeros(3), comp = abs, tol = 1e-12);
    }
}
