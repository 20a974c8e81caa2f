//! Error types for solver operations.

use gf_core::error::GfError;
use gf_devices::DeviceError;
use gf_graph::GraphError;
use thiserror::Error;

/// Errors that can occur while setting up or solving a load flow.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    Setup { what: String },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Core error: {0}")]
    Core(#[from] GfError),

    #[error("Singular Jacobian")]
    SingularJacobian,

    #[error("No convergence after {iterations} iterations (residual norm {residual_norm:e})")]
    NonConvergence {
        iterations: usize,
        residual_norm: f64,
    },

    #[error("Numeric error: {what}")]
    Numeric { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// True when the solve stopped on a numerical failure rather than running
    /// out of iterations.
    pub fn is_evaluation_failure(&self) -> bool {
        match self {
            SolverError::Device(e) => e.is_evaluation_failure(),
            SolverError::SingularJacobian | SolverError::Numeric { .. } => true,
            _ => false,
        }
    }
}

impl From<SolverError> for GfError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Setup { .. } => GfError::InvalidArg {
                what: "problem setup",
            },
            SolverError::Device(inner) => inner.into(),
            SolverError::Graph(inner) => inner.into(),
            SolverError::Core(inner) => inner,
            SolverError::SingularJacobian => GfError::Invariant {
                what: "singular Jacobian",
            },
            SolverError::NonConvergence { .. } => GfError::Invariant {
                what: "convergence",
            },
            SolverError::Numeric { .. } => GfError::Invariant { what: "numeric" },
        }
    }
}
