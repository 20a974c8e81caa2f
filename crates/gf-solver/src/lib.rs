//! Newton-Raphson load-flow solver for hybrid AC/DC networks.
//!
//! The unknowns are the bus voltages (real and imaginary parts on AC buses,
//! the voltage on DC buses) plus the unknowns each implicit device declares.
//! Bus rows are Kirchhoff's current law over the currents devices draw;
//! device rows are the device's own equations. All operating points of a
//! problem share the topology and are iterated together.

pub mod bounds;
pub mod error;
pub mod initialization;
pub mod jacobian;
pub mod layout;
pub mod linear;
pub mod network;
pub mod newton;
pub mod problem;
pub mod solution;
pub mod solve;

pub use bounds::{BoundsEnforcer, ScalarBounds, VectorBounds};
pub use error::{SolverError, SolverResult};
pub use initialization::InitializationStrategy;
pub use jacobian::{SparseJacobian, central_difference_jacobian};
pub use layout::{DeviceBlock, Layout};
pub use linear::{DenseLu, LinearSolver};
pub use network::NetworkSystem;
pub use newton::{NewtonConfig, NewtonResult, NonlinearSystem, newton_solve};
pub use problem::LoadFlowProblem;
pub use solution::{BusReport, DeviceReport, LoadFlowSolution, Quantity};
pub use solve::{SolveOptions, solve, solve_with_options, solve_with_strategy};
