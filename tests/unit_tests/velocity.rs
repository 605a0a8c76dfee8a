use nalgebra::DMatrix;
use std::sync::Arc;
use streamfn::mesh::procedural::{create_unit_cube_tet_mesh, create_unit_square_tri_mesh};
use streamfn::space::{Function, FunctionSpace};
use streamfn::velocity::{ResolvedVelocity, VelocityField};

fn scalar_function(mesh: &Arc<streamfn::mesh::Mesh>, degree: usize, f: impl Fn(&[f64]) -> f64) -> Function {
    Function::interpolate_scalar(Arc::new(FunctionSpace::scalar(mesh.clone(), degree).unwrap()), f)
}

#[test]
fn field_metadata() {
    let mesh = Arc::new(create_unit_square_tri_mesh(2));
    let field = VelocityField::from(vec![
        scalar_function(&mesh, 2, |x| x[0]),
        scalar_function(&mesh, 2, |x| x[1]),
    ]);
    assert_eq!(field.geometry_dim(), Some(2));
    assert_eq!(field.degree(), Some(2));

    let empty = VelocityField::Components(vec![]);
    assert!(empty.mesh().is_none());
    assert_eq!(empty.degree(), None);
}

#[test]
fn packed_and_component_fields_resolve_identically() {
    let mesh = Arc::new(create_unit_square_tri_mesh(3));
    let packed_space = Arc::new(FunctionSpace::vector(mesh.clone(), 2).unwrap());
    let packed = Function::interpolate(packed_space, |x, out| {
        out[0] = x[0] * x[1];
        out[1] = 1.0 - x[0];
    });
    let components = packed.component(0).and_then(|u_x| Ok(vec![u_x, packed.component(1)?])).unwrap();

    let from_packed = ResolvedVelocity::resolve(&VelocityField::from(packed), 2).unwrap();
    let from_components = ResolvedVelocity::resolve(&VelocityField::from(components), 2).unwrap();
    assert_eq!(from_packed.num_components(), 2);
    assert!(from_packed.space.has_same_layout(&from_components.space));
    assert_eq!(from_packed.components, from_components.components);
}

#[test]
fn evaluate_and_gradient_in_cell() {
    let mesh = Arc::new(create_unit_cube_tet_mesh(1));
    let field = VelocityField::Components(vec![
        scalar_function(&mesh, 1, |x| x[1]),
        scalar_function(&mesh, 1, |x| 2.0 * x[2]),
        scalar_function(&mesh, 1, |x| x[0] - x[1]),
    ]);
    let velocity = ResolvedVelocity::resolve(&field, 3).unwrap();

    let space = velocity.space.clone();
    let lambda = [0.1, 0.2, 0.3, 0.4];
    let cell = space.cell_geometry(3).unwrap();
    let x = cell.map_barycentric(&lambda);
    let phi = space.basis().values(&lambda);
    let mut u = [0.0; 3];
    velocity.evaluate(3, &phi, &mut u);
    let expected = [x[1], 2.0 * x[2], x[0] - x[1]];
    for c in 0..3 {
        assert!((u[c] - expected[c]).abs() < 1e-12);
    }

    let dphi = space.basis().gradients(&cell, &lambda);
    let gradient = velocity.gradient(3, &dphi);
    #[rustfmt::skip]
    let expected_gradient = DMatrix::from_row_slice(3, 3, &[
        0.0,  1.0, 0.0,
        0.0,  0.0, 2.0,
        1.0, -1.0, 0.0,
    ]);
    assert!((gradient - expected_gradient).amax() < 1e-12);
}

#[test]
fn invalid_fields_are_rejected() {
    let square = Arc::new(create_unit_square_tri_mesh(2));
    let other_square = Arc::new(create_unit_square_tri_mesh(3));
    let u = || scalar_function(&square, 1, |x| x[0]);

    let message = |field: VelocityField, components: usize| ResolvedVelocity::resolve(&field, components).unwrap_err();

    assert!(message(VelocityField::Components(vec![]), 2).contains("no components"));
    assert!(message(VelocityField::Components(vec![u()]), 2).contains("expected 2 velocity components, got 1"));
    assert!(message(VelocityField::Components(vec![u(), u(), u()]), 2).contains("got 3"));
    assert!(message(
        VelocityField::Components(vec![u(), scalar_function(&other_square, 1, |x| x[1])]),
        2
    )
    .contains("different mesh"));
    assert!(message(
        VelocityField::Components(vec![u(), scalar_function(&square, 2, |x| x[1])]),
        2
    )
    .contains("degree"));

    let vector = Function::zeros(Arc::new(FunctionSpace::vector(square.clone(), 1).unwrap()));
    assert!(message(VelocityField::Components(vec![u(), vector.clone()]), 2).contains("not scalar"));
    assert!(message(VelocityField::Packed(vector), 3).contains("2 components"));
    assert!(message(VelocityField::Packed(u()), 2).contains("1 components"));
}

#[test]
fn meshes_equal_by_value_are_compatible() {
    // Two separately constructed but identical meshes describe the same domain
    let first = Arc::new(create_unit_square_tri_mesh(2));
    let second = Arc::new(create_unit_square_tri_mesh(2));
    let field = VelocityField::Components(vec![
        scalar_function(&first, 1, |x| x[0]),
        scalar_function(&second, 1, |x| x[1]),
    ]);
    assert!(ResolvedVelocity::resolve(&field, 2).is_ok());
}
