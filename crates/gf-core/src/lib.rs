//! gf-core: stable foundation for gridflow.
//!
//! Contains:
//! - units (uom SI electrical types + constructors)
//! - numeric (Real + tolerances + float and angle helpers)
//! - ids (stable compact IDs for buses, devices and terminals)
//! - points (per-operating-point parameter arrays and bounds)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod points;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{GfError, GfResult};
pub use ids::*;
pub use numeric::*;
pub use points::{Bounds, PointArray};
pub use units::*;
