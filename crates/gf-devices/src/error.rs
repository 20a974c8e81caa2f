//! Error types for device models.

use gf_core::error::GfError;
use thiserror::Error;

/// Errors raised by device construction and evaluation.
///
/// `NonPhysical`, `InvalidArg`, `UnknownMode` and `Core` are configuration
/// errors reported before a solve starts. `Singular` and `Domain` come out of
/// residual evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Singular evaluation: {what}")]
    Singular { what: &'static str },

    #[error("Domain error: {what} (value={value})")]
    Domain { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown {kind} mode '{value}'")]
    UnknownMode { kind: &'static str, value: String },

    #[error(transparent)]
    Core(#[from] GfError),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// True for numerical failures detected while evaluating equations.
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(
            self,
            DeviceError::Singular { .. } | DeviceError::Domain { .. }
        )
    }
}

impl From<DeviceError> for GfError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::NonPhysical { what } => GfError::InvalidArg { what },
            DeviceError::Singular { what } => GfError::Invariant { what },
            DeviceError::Domain { what, .. } => GfError::InvalidArg { what },
            DeviceError::InvalidArg { what } => GfError::InvalidArg { what },
            DeviceError::UnknownMode { .. } => GfError::InvalidArg {
                what: "unknown device mode",
            },
            DeviceError::Core(inner) => inner,
        }
    }
}
