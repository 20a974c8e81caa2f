//! Initialization strategy for solver startup behavior.
//!
//! A strategy decides how hard the solver works to reach a consistent
//! starting state before plain Newton steps take over. It maps to a
//! [`NewtonConfig`] and is reported in the solve span.

use crate::newton::NewtonConfig;

/// Initialization strategy for solver startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitializationStrategy {
    /// Device guesses only, then plain Newton iterations.
    ///
    /// Best for: networks whose configured guesses are close to the solution
    #[default]
    Strict,

    /// Device guesses, then the first iterations let implicit devices
    /// recompute their dependent unknowns (generator and converter powers)
    /// from the current voltages and currents before each evaluation.
    ///
    /// Best for: hybrid networks with rough power guesses
    Relaxed,
}

impl InitializationStrategy {
    /// Convert strategy to human-readable name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            InitializationStrategy::Strict => "Strict",
            InitializationStrategy::Relaxed => "Relaxed",
        }
    }

    /// Generate Newton solver configuration appropriate for this strategy.
    pub fn to_newton_config(&self) -> NewtonConfig {
        match self {
            InitializationStrategy::Strict => NewtonConfig::default(),
            InitializationStrategy::Relaxed => NewtonConfig {
                max_iterations: 100,
                max_sub_solves: 3,
                ..NewtonConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_has_no_sub_solves() {
        let config = InitializationStrategy::Strict.to_newton_config();
        assert_eq!(config.max_sub_solves, 0);
        assert_eq!(config, NewtonConfig::default());
    }

    #[test]
    fn relaxed_sub_solves_and_allows_more_iterations() {
        let strict = InitializationStrategy::Strict.to_newton_config();
        let relaxed = InitializationStrategy::Relaxed.to_newton_config();
        assert!(relaxed.max_sub_solves > 0);
        assert!(relaxed.max_iterations > strict.max_iterations);
        assert_eq!(relaxed.abs_tol, strict.abs_tol);
    }

    #[test]
    fn strategy_names_are_stable() {
        assert_eq!(InitializationStrategy::Strict.as_str(), "Strict");
        assert_eq!(InitializationStrategy::Relaxed.as_str(), "Relaxed");
    }

    #[test]
    fn default_is_strict() {
        assert_eq!(
            InitializationStrategy::default(),
            InitializationStrategy::Strict
        );
    }
}
