use crate::assembly::local::{ElementConnectivityAssembler, ElementMatrixAssembler, ElementVectorAssembler};
use eyre::{bail, eyre};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::collections::BTreeSet;

/// An assembler for CSR matrices.
///
/// Element matrices are computed in parallel and accumulated into the global matrix
/// sequentially.
#[derive(Debug, Clone, Default)]
pub struct CsrAssembler;

impl CsrAssembler {
    pub fn assemble_pattern<A>(&self, element_assembler: &A) -> eyre::Result<SparsityPattern>
    where
        A: ElementConnectivityAssembler + ?Sized,
    {
        // Collecting into a BTreeSet stores each matrix entry exactly once, and gives the
        // entries in row-major order
        let sdim = element_assembler.solution_dim();
        let mut matrix_entries = BTreeSet::new();
        let mut element_global_nodes = Vec::new();
        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            element_global_nodes.resize(element_node_count, usize::MAX);
            element_assembler.populate_element_nodes(&mut element_global_nodes, i);

            for node_i in &element_global_nodes {
                for node_j in &element_global_nodes {
                    for s_i in 0..sdim {
                        for s_j in 0..sdim {
                            matrix_entries.insert((sdim * node_i + s_i, sdim * node_j + s_j));
                        }
                    }
                }
            }
        }

        let num_rows = sdim * element_assembler.num_nodes();
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            while i + 1 > offsets.len() {
                // Loop to correctly handle consecutive empty rows
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }
        while offsets.len() < (num_rows + 1) {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .map_err(|err| eyre!("invalid sparsity pattern: {}", err))
    }

    pub fn assemble(&self, element_assembler: &dyn ElementMatrixAssembler) -> eyre::Result<CsrMatrix<f64>> {
        let pattern = self.assemble_pattern(element_assembler)?;
        let initial_matrix_values = vec![0.0; pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .map_err(|err| eyre!("failed to create CSR matrix: {}", err))?;
        self.assemble_into_csr(&mut matrix, element_assembler)?;
        Ok(matrix)
    }

    /// Adds the element contributions to an existing matrix, whose sparsity pattern must
    /// contain every entry the elements touch.
    pub fn assemble_into_csr(
        &self,
        csr: &mut CsrMatrix<f64>,
        element_assembler: &dyn ElementMatrixAssembler,
    ) -> eyre::Result<()> {
        let sdim = element_assembler.solution_dim();
        let expected_dim = sdim * element_assembler.num_nodes();
        if csr.nrows() != expected_dim || csr.ncols() != expected_dim {
            bail!(
                "matrix has dimensions {}x{}, but the assembler expects {}x{}",
                csr.nrows(),
                csr.ncols(),
                expected_dim,
                expected_dim
            );
        }

        let element_matrices = (0..element_assembler.num_elements())
            .into_par_iter()
            .map(|i| -> eyre::Result<(Vec<usize>, DMatrix<f64>)> {
                let element_node_count = element_assembler.element_node_count(i);
                let element_matrix_dim = sdim * element_node_count;
                let mut element_global_nodes = vec![0; element_node_count];
                let mut element_matrix = DMatrix::zeros(element_matrix_dim, element_matrix_dim);
                element_assembler.assemble_element_matrix_into(i, DMatrixViewMut::from(&mut element_matrix))?;
                element_assembler.populate_element_nodes(&mut element_global_nodes, i);
                Ok((element_global_nodes, element_matrix))
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        for (element_global_nodes, element_matrix) in element_matrices {
            for (local_node_i, &global_node_i) in element_global_nodes.iter().enumerate() {
                for s_i in 0..sdim {
                    let row_index = sdim * global_node_i + s_i;
                    let mut csr_row = csr.row_mut(row_index);
                    let (column_indices, values) = csr_row.cols_and_values_mut();
                    for (local_node_j, &global_node_j) in element_global_nodes.iter().enumerate() {
                        for s_j in 0..sdim {
                            let column_index = sdim * global_node_j + s_j;
                            let idx = column_indices.binary_search(&column_index).map_err(|_| {
                                eyre!("entry ({}, {}) is not part of the sparsity pattern", row_index, column_index)
                            })?;
                            values[idx] += element_matrix[(sdim * local_node_i + s_i, sdim * local_node_j + s_j)];
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// An assembler for dense global vectors.
#[derive(Debug, Clone, Default)]
pub struct VectorAssembler;

impl VectorAssembler {
    pub fn assemble_vector(&self, element_assembler: &dyn ElementVectorAssembler) -> eyre::Result<DVector<f64>> {
        let n = element_assembler.solution_dim() * element_assembler.num_nodes();
        let mut output = DVector::zeros(n);
        self.assemble_vector_into(&mut output, element_assembler)?;
        Ok(output)
    }

    pub fn assemble_vector_into(
        &self,
        output: &mut DVector<f64>,
        element_assembler: &dyn ElementVectorAssembler,
    ) -> eyre::Result<()> {
        let sdim = element_assembler.solution_dim();
        let n = sdim * element_assembler.num_nodes();
        if output.len() != n {
            bail!("output vector has length {}, but the assembler expects {}", output.len(), n);
        }

        let element_vectors = (0..element_assembler.num_elements())
            .into_par_iter()
            .map(|i| -> eyre::Result<(Vec<usize>, DVector<f64>)> {
                let element_node_count = element_assembler.element_node_count(i);
                let mut element_global_nodes = vec![0; element_node_count];
                let mut element_vector = DVector::zeros(sdim * element_node_count);
                element_assembler.assemble_element_vector_into(i, DVectorViewMut::from(&mut element_vector))?;
                element_assembler.populate_element_nodes(&mut element_global_nodes, i);
                Ok((element_global_nodes, element_vector))
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        for (element_global_nodes, element_vector) in element_vectors {
            for (local_node, &global_node) in element_global_nodes.iter().enumerate() {
                for s in 0..sdim {
                    output[sdim * global_node + s] += element_vector[sdim * local_node + s];
                }
            }
        }
        Ok(())
    }
}

/// Imposes homogeneous Dirichlet conditions on the given degrees of freedom by zeroing their
/// rows and columns and placing a representative scale on the diagonal.
///
/// The sparsity pattern of the matrix is assumed to be symmetric.
pub fn apply_homogeneous_dirichlet_bc_csr(matrix: &mut CsrMatrix<f64>, dofs: &[usize]) -> eyre::Result<()> {
    let n = matrix.nrows();
    if let Some(&dof) = dofs.iter().find(|&&dof| dof >= n) {
        bail!("Dirichlet degree of freedom {} is out of bounds for a matrix with {} rows", dof, n);
    }

    // Setting the diagonal to 1 would ignore the scaling of the matrix, so take the first
    // non-zero diagonal entry as a representative scale
    let scale = (0..n)
        .filter_map(|i| {
            let row = matrix.row(i);
            row.col_indices()
                .iter()
                .position(|&j| j == i)
                .map(|idx| row.values()[idx].abs())
        })
        .find(|&d| d != 0.0)
        .unwrap_or(1.0);

    // If we zero (r, c) for a Dirichlet row r, the symmetric pattern tells us that row c
    // has an entry in column r which must also be zeroed
    let mut dirichlet_membership = vec![false; n];
    let mut rows_to_visit = vec![false; n];
    for &row_idx in dofs {
        dirichlet_membership[row_idx] = true;
        let mut row = matrix.row_mut(row_idx);
        let (cols, values) = row.cols_and_values_mut();
        let mut has_diagonal = false;
        for (&col_idx, val) in cols.iter().zip(values) {
            if col_idx == row_idx {
                *val = scale;
                has_diagonal = true;
            } else {
                *val = 0.0;
                rows_to_visit[col_idx] = true;
            }
        }
        if !has_diagonal {
            bail!("row {} has no diagonal entry in the sparsity pattern", row_idx);
        }
    }

    for row_index in (0..n).filter(|&i| rows_to_visit[i] && !dirichlet_membership[i]) {
        let mut row = matrix.row_mut(row_index);
        let (cols, values) = row.cols_and_values_mut();
        for (&col_idx, val) in cols.iter().zip(values) {
            if dirichlet_membership[col_idx] {
                *val = 0.0;
            }
        }
    }
    Ok(())
}

pub fn apply_homogeneous_dirichlet_bc_rhs(rhs: &mut DVector<f64>, dofs: &[usize]) {
    for &dof in dofs {
        rhs[dof] = 0.0;
    }
}

/// Subtracts the arithmetic mean of the entries from every entry.
pub fn normalize_mean(v: &mut DVector<f64>) {
    if v.is_empty() {
        return;
    }
    let mean = v.mean();
    v.add_scalar_mut(-mean);
}

/// Extends an interleaved system with `value_size` Lagrange multipliers, one per component,
/// enforcing `sum_a weights[a] x[value_size * a + c] = 0` for each component `c`.
///
/// The multipliers are appended after the existing unknowns, and their diagonal block is
/// stored as explicit zeros.
pub fn augment_with_real_multipliers(
    matrix: &CsrMatrix<f64>,
    weights: &DVector<f64>,
    value_size: usize,
) -> eyre::Result<CsrMatrix<f64>> {
    let n = matrix.nrows();
    if value_size == 0 || weights.len() * value_size != n || matrix.ncols() != n {
        bail!(
            "cannot augment a {}x{} matrix with {} weights and value size {}",
            matrix.nrows(),
            matrix.ncols(),
            weights.len(),
            value_size
        );
    }

    let dim = n + value_size;
    let mut offsets = Vec::with_capacity(dim + 1);
    let mut indices = Vec::with_capacity(matrix.nnz() + 2 * n + value_size);
    let mut values = Vec::with_capacity(indices.capacity());

    offsets.push(0);
    for (i, row) in matrix.row_iter().enumerate() {
        indices.extend_from_slice(row.col_indices());
        values.extend_from_slice(row.values());
        indices.push(n + i % value_size);
        values.push(weights[i / value_size]);
        offsets.push(indices.len());
    }
    for c in 0..value_size {
        for (a, &w) in weights.iter().enumerate() {
            indices.push(value_size * a + c);
            values.push(w);
        }
        indices.push(n + c);
        values.push(0.0);
        offsets.push(indices.len());
    }

    CsrMatrix::try_from_csr_data(dim, dim, offsets, indices, values)
        .map_err(|err| eyre!("failed to create augmented matrix: {}", err))
}
