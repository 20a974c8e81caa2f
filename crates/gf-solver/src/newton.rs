//! Newton solver with bounded steps and a bus-voltage guard.

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::bounds::BoundsEnforcer;
use crate::error::{SolverError, SolverResult};
use crate::jacobian::SparseJacobian;
use crate::linear::LinearSolver;

/// Newton solver configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for the scaled residual norm
    pub abs_tol: f64,
    /// Relative tolerance against the starting residual norm
    pub rel_tol: f64,
    /// Iterations on which devices re-solve their dependent unknowns first
    pub max_sub_solves: usize,
    /// Smallest accepted bus voltage as a fraction of its base
    pub min_voltage_fraction: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-8,
            rel_tol: 1e-10,
            max_sub_solves: 0,
            min_voltage_fraction: 0.1,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

/// Newton iteration result.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// Solution vector of each operating point
    pub x: Vec<DVector<f64>>,
    /// Final residual norm over all points
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
}

/// A square nonlinear system solved independently at each operating point.
pub trait NonlinearSystem: Sync {
    fn num_points(&self) -> usize;

    fn num_vars(&self) -> usize;

    /// Scaled residual and Jacobian at one point.
    fn evaluate(
        &self,
        point: usize,
        x: &DVector<f64>,
    ) -> SolverResult<(DVector<f64>, SparseJacobian)>;

    /// Per-variable `(lower, upper)`; `None` when free.
    fn bounds(&self, point: usize) -> Vec<Option<(f64, f64)>> {
        let _ = point;
        vec![None; self.num_vars()]
    }

    /// Recompute dependent unknowns before an evaluation.
    fn sub_solve(&self, _point: usize, _x: &mut DVector<f64>) -> SolverResult<()> {
        Ok(())
    }

    /// Smallest voltage relative to its base; steps that push it below the
    /// configured minimum are backtracked.
    fn voltage_fraction(&self, _point: usize, _x: &DVector<f64>) -> f64 {
        f64::INFINITY
    }
}

/// Newton solver over every operating point at once.
///
/// Each iteration evaluates all points in parallel, checks the residual norm
/// taken over all points, then steps each point with the linear solver and
/// bounds enforcer. Steps that collapse a bus voltage are halved until the
/// guard holds.
pub fn newton_solve<S: NonlinearSystem>(
    system: &S,
    x0: Vec<DVector<f64>>,
    config: &NewtonConfig,
    linear: &dyn LinearSolver,
    bounds: &dyn BoundsEnforcer,
) -> SolverResult<NewtonResult> {
    if x0.len() != system.num_points() || x0.iter().any(|x| x.len() != system.num_vars()) {
        return Err(SolverError::Setup {
            what: format!(
                "initial state must be {} points of {} variables",
                system.num_points(),
                system.num_vars()
            ),
        });
    }

    let mut x = x0;
    let point_bounds: Vec<_> = (0..system.num_points()).map(|p| system.bounds(p)).collect();
    let mut r0_norm = None;
    let mut r_norm = f64::NAN;

    for iter in 0..=config.max_iterations {
        if iter < config.max_sub_solves {
            x.par_iter_mut()
                .enumerate()
                .try_for_each(|(p, xp)| system.sub_solve(p, xp))?;
        }

        let evals = x
            .par_iter()
            .enumerate()
            .map(|(p, xp)| system.evaluate(p, xp))
            .collect::<SolverResult<Vec<_>>>()?;

        r_norm = evals
            .iter()
            .map(|(r, _)| r.norm_squared())
            .sum::<f64>()
            .sqrt();
        if !r_norm.is_finite() {
            return Err(SolverError::Numeric {
                what: format!("residual norm is {} at iteration {}", r_norm, iter),
            });
        }
        let r0 = *r0_norm.get_or_insert(r_norm);

        // Check convergence
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0 {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
            });
        }
        if iter == config.max_iterations {
            break;
        }

        let alphas = x
            .par_iter_mut()
            .zip(evals.par_iter())
            .enumerate()
            .map(|(p, (xp, (r, jac)))| {
                // Solve J * dx = -r
                let dx = linear.solve(jac, &(-r))?;
                guarded_step(system, p, xp, &dx, &point_bounds[p], bounds, config)
            })
            .collect::<SolverResult<Vec<f64>>>()?;

        debug!(
            iteration = iter,
            residual_norm = r_norm,
            step_scale = alphas.iter().copied().fold(1.0, f64::min),
            "newton iteration"
        );
    }

    Err(SolverError::NonConvergence {
        iterations: config.max_iterations,
        residual_norm: r_norm,
    })
}

/// Apply a bounded step, halving it while any bus voltage falls under the guard.
fn guarded_step<S: NonlinearSystem>(
    system: &S,
    point: usize,
    x: &mut DVector<f64>,
    dx: &DVector<f64>,
    bounds: &[Option<(f64, f64)>],
    enforcer: &dyn BoundsEnforcer,
    config: &NewtonConfig,
) -> SolverResult<f64> {
    let x_old = x.clone();
    let mut shrink = 1.0;
    let mut alpha = enforcer.apply(x, dx, bounds);

    for _ in 0..config.max_line_search_iters {
        if system.voltage_fraction(point, x) >= config.min_voltage_fraction {
            return Ok(alpha * shrink);
        }
        shrink *= config.line_search_beta;
        warn!(point, shrink, "bus voltage below guard, backtracking");
        x.copy_from(&x_old);
        alpha = enforcer.apply(x, &(dx * shrink), bounds);
    }

    if system.voltage_fraction(point, x) >= config.min_voltage_fraction {
        Ok(alpha * shrink)
    } else {
        Err(SolverError::Numeric {
            what: format!("bus voltage collapsed at point {}", point),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::ScalarBounds;
    use crate::linear::DenseLu;

    /// x^2 - c = 0 at each point. A positive `floor` makes x act as a voltage
    /// with that base.
    struct Roots {
        targets: Vec<f64>,
        floor: f64,
    }

    impl NonlinearSystem for Roots {
        fn num_points(&self) -> usize {
            self.targets.len()
        }

        fn num_vars(&self) -> usize {
            1
        }

        fn evaluate(
            &self,
            point: usize,
            x: &DVector<f64>,
        ) -> SolverResult<(DVector<f64>, SparseJacobian)> {
            let mut jac = SparseJacobian::new(1);
            jac.push(0, 0, 2.0 * x[0]);
            Ok((DVector::from_element(1, x[0] * x[0] - self.targets[point]), jac))
        }

        fn voltage_fraction(&self, _point: usize, x: &DVector<f64>) -> f64 {
            if self.floor > 0.0 {
                x[0] / self.floor
            } else {
                f64::INFINITY
            }
        }
    }

    fn solve(system: &Roots, x0: f64, config: &NewtonConfig) -> SolverResult<NewtonResult> {
        let x0 = vec![DVector::from_element(1, x0); system.num_points()];
        newton_solve(system, x0, config, &DenseLu, &ScalarBounds)
    }

    #[test]
    fn simple_quadratic() {
        // Solve x^2 - 4 = 0, x > 0
        let system = Roots {
            targets: vec![4.0],
            floor: 0.0,
        };
        let result = solve(&system, 3.0, &NewtonConfig::default()).unwrap();
        assert!((result.x[0][0] - 2.0).abs() < 1e-9);
        assert!(result.iterations > 0);
    }

    #[test]
    fn points_are_solved_together() {
        let system = Roots {
            targets: vec![4.0, 9.0, 16.0],
            floor: 0.0,
        };
        let result = solve(&system, 3.0, &NewtonConfig::default()).unwrap();
        for (x, expected) in result.x.iter().zip([2.0, 3.0, 4.0]) {
            assert!((x[0] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn collapsed_voltage_is_a_numeric_error() {
        // every shrunken step from -0.5 stays negative
        let system = Roots {
            targets: vec![4.0],
            floor: 1.0,
        };
        assert!(matches!(
            solve(&system, -0.5, &NewtonConfig::default()),
            Err(SolverError::Numeric { .. })
        ));
    }

    #[test]
    fn iteration_limit_is_non_convergence() {
        let system = Roots {
            targets: vec![-1.0],
            floor: 0.0,
        };
        let config = NewtonConfig {
            max_iterations: 5,
            ..NewtonConfig::default()
        };
        match solve(&system, 3.0, &config) {
            Err(SolverError::NonConvergence { iterations, .. }) => assert_eq!(iterations, 5),
            other => panic!("expected non-convergence, got {:?}", other.map(|r| r.x)),
        }
    }

    #[test]
    fn already_converged_takes_no_iterations() {
        let system = Roots {
            targets: vec![4.0],
            floor: 0.0,
        };
        let result = solve(&system, 2.0, &NewtonConfig::default()).unwrap();
        assert_eq!(result.iterations, 0);
    }
}
