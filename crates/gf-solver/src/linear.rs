//! Linear solve of the Newton correction.

use nalgebra::DVector;

use crate::error::{SolverError, SolverResult};
use crate::jacobian::SparseJacobian;

/// Solves `J dx = rhs` for one operating point.
pub trait LinearSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, jac: &SparseJacobian, rhs: &DVector<f64>) -> SolverResult<DVector<f64>>;
}

/// Dense LU with partial pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLu;

impl LinearSolver for DenseLu {
    fn name(&self) -> &'static str {
        "dense-lu"
    }

    fn solve(&self, jac: &SparseJacobian, rhs: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let dx = jac
            .to_dense()
            .lu()
            .solve(rhs)
            .ok_or(SolverError::SingularJacobian)?;
        if dx.iter().all(|v| v.is_finite()) {
            Ok(dx)
        } else {
            Err(SolverError::SingularJacobian)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_system() {
        let mut jac = SparseJacobian::new(2);
        jac.push(0, 0, 2.0);
        jac.push(0, 1, 1.0);
        jac.push(1, 0, 1.0);
        jac.push(1, 1, 3.0);
        let rhs = DVector::from_vec(vec![3.0, 5.0]);
        let dx = DenseLu.solve(&jac, &rhs).unwrap();
        assert!((dx[0] - 0.8).abs() < 1e-12);
        assert!((dx[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let mut jac = SparseJacobian::new(2);
        jac.push(0, 0, 1.0);
        jac.push(0, 1, -1.0);
        jac.push(1, 0, -1.0);
        jac.push(1, 1, 1.0);
        let rhs = DVector::from_vec(vec![1.0, 0.0]);
        assert!(matches!(
            DenseLu.solve(&jac, &rhs),
            Err(SolverError::SingularJacobian)
        ));
    }
}
