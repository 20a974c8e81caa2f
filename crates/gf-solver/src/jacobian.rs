//! Sparse Jacobian assembly and the central-difference Jacobian used to
//! check it.

use crate::error::SolverResult;
use nalgebra::{DMatrix, DVector};

/// Jacobian of one operating point in triplet form.
///
/// Duplicate `(row, col)` entries are summed on conversion.
#[derive(Debug, Clone, Default)]
pub struct SparseJacobian {
    dim: usize,
    triplets: Vec<(usize, usize, f64)>,
}

impl SparseJacobian {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            triplets: Vec::new(),
        }
    }

    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        Self {
            dim,
            triplets: Vec::with_capacity(capacity),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push((row, col, value));
    }

    pub fn triplets(&self) -> &[(usize, usize, f64)] {
        &self.triplets
    }

    /// Divide every entry of each row by its scale.
    pub fn scale_rows(&mut self, scales: &[f64]) {
        for (row, _, value) in &mut self.triplets {
            *value /= scales[*row];
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(self.dim, self.dim);
        for &(row, col, value) in &self.triplets {
            m[(row, col)] += value;
        }
        m
    }
}

/// Compute Jacobian using central finite differences (more accurate but 2x cost).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let n = x.len();
    let m = f(x)?.len();
    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let dx = epsilon * x[j].abs().max(1.0);

        let mut x_plus = x.clone();
        x_plus[j] += dx;
        let mut x_minus = x.clone();
        x_minus[j] -= dx;

        let df = (f(&x_plus)? - f(&x_minus)?) / (2.0 * dx);
        jac.set_column(j, &df);
    }

    Ok(jac)
}
