//! High-level solver interface.

use nalgebra::DVector;
use tracing::{info, info_span, warn};

use crate::bounds::{BoundsEnforcer, ScalarBounds};
use crate::error::{SolverError, SolverResult};
use crate::initialization::InitializationStrategy;
use crate::linear::{DenseLu, LinearSolver};
use crate::network::NetworkSystem;
use crate::newton::{NewtonConfig, NonlinearSystem, newton_solve};
use crate::problem::LoadFlowProblem;
use crate::solution::LoadFlowSolution;

/// Everything that tunes a solve besides the problem itself.
pub struct SolveOptions {
    pub strategy: InitializationStrategy,
    /// Overrides the strategy's configuration when set.
    pub config: Option<NewtonConfig>,
    pub linear_solver: Box<dyn LinearSolver>,
    pub bounds: Box<dyn BoundsEnforcer>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            strategy: InitializationStrategy::default(),
            config: None,
            linear_solver: Box::new(DenseLu),
            bounds: Box::new(ScalarBounds),
        }
    }
}

impl SolveOptions {
    pub fn with_strategy(mut self, strategy: InitializationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_config(mut self, config: NewtonConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_linear_solver(mut self, solver: Box<dyn LinearSolver>) -> Self {
        self.linear_solver = solver;
        self
    }

    pub fn with_bounds(mut self, bounds: Box<dyn BoundsEnforcer>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Configuration in effect: the override, else the strategy's.
    pub fn newton_config(&self) -> NewtonConfig {
        self.config
            .clone()
            .unwrap_or_else(|| self.strategy.to_newton_config())
    }
}

/// Solve a load-flow problem at every operating point.
///
/// This function:
/// 1. Validates the problem setup
/// 2. Starts from a flat voltage profile and device guesses, or from a
///    previous solution when one is given
/// 3. Runs Newton iterations until the scaled residual norm meets tolerance
///
/// # Arguments
/// * `problem` - The load-flow problem to solve
/// * `config` - Optional Newton solver configuration
/// * `warm_start` - Optional previous solution of the same network
pub fn solve(
    problem: &LoadFlowProblem<'_>,
    config: Option<NewtonConfig>,
    warm_start: Option<&LoadFlowSolution>,
) -> SolverResult<LoadFlowSolution> {
    let options = SolveOptions {
        config,
        ..SolveOptions::default()
    };
    solve_with_options(problem, &options, warm_start)
}

/// Solve with the configuration of an initialization strategy.
pub fn solve_with_strategy(
    problem: &LoadFlowProblem<'_>,
    strategy: InitializationStrategy,
    warm_start: Option<&LoadFlowSolution>,
) -> SolverResult<LoadFlowSolution> {
    let options = SolveOptions::default().with_strategy(strategy);
    solve_with_options(problem, &options, warm_start)
}

/// Solve with explicit options.
pub fn solve_with_options(
    problem: &LoadFlowProblem<'_>,
    options: &SolveOptions,
    warm_start: Option<&LoadFlowSolution>,
) -> SolverResult<LoadFlowSolution> {
    let span = info_span!(
        "load_flow",
        buses = problem.graph.buses().len(),
        elements = problem.graph.elements().len(),
        points = problem.num_points,
        strategy = options.strategy.as_str(),
        linear = options.linear_solver.name(),
        bounds = options.bounds.name(),
    );
    let _enter = span.enter();

    problem.validate()?;
    let system = NetworkSystem::new(problem)?;
    let config = options.newton_config();

    let x0 = match warm_start {
        Some(prev) => warm_start_state(prev, &system)?,
        None => (0..problem.num_points)
            .map(|p| system.initial_guess(p))
            .collect::<SolverResult<Vec<_>>>()?,
    };

    match newton_solve(
        &system,
        x0,
        &config,
        options.linear_solver.as_ref(),
        options.bounds.as_ref(),
    ) {
        Ok(result) => {
            info!(
                iterations = result.iterations,
                residual_norm = result.residual_norm,
                "load flow converged"
            );
            LoadFlowSolution::from_result(&system, result)
        }
        Err(e) => {
            warn!(error = %e, "load flow failed");
            Err(e)
        }
    }
}

/// Convert a previous solution back into a starting state.
fn warm_start_state(
    prev: &LoadFlowSolution,
    system: &NetworkSystem<'_, '_>,
) -> SolverResult<Vec<DVector<f64>>> {
    let num_vars = system.num_vars();
    let num_points = system.num_points();
    if prev.num_points() != num_points || prev.state.iter().any(|x| x.len() != num_vars) {
        return Err(SolverError::Setup {
            what: format!(
                "warm start does not match the network: expected {} points of {} variables",
                num_points, num_vars
            ),
        });
    }
    Ok(prev.state_vectors())
}
