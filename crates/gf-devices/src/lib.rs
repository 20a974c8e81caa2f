//! gf-devices: device models for hybrid AC/DC load flow.
//!
//! Every device implements [`Device`]: it reads its terminal voltages and its
//! own unknowns, writes the currents it draws from each bus, the residuals of
//! its own equations, and analytic partials on a sparse pattern it declares
//! once. Explicit devices (lines, loads, injections) own no unknowns.

pub mod bus;
pub mod common;
pub mod converter;
pub mod error;
pub mod generator;
pub mod injection;
pub mod inverter;
pub mod line;
pub mod load;
pub mod rectifier;
pub mod traits;

pub use bus::{BusBalance, INCIDENT_CURRENT_PARTIAL};
pub use converter::{Converter, DEFAULT_KSC, FlowDirection, PhaseMode, direction, loss_residual};
pub use error::{DeviceError, DeviceResult};
pub use generator::{AcGenerator, DcGenerator, GeneratorMode};
pub use injection::{AcCurrentInjection, DcCurrentInjection};
pub use inverter::{Inverter, InverterControl, InverterMode};
pub use line::{AcLine, AcLineFlow, AcLineSensitivity, DcLine};
pub use load::{AcLoad, DcLoad};
pub use rectifier::Rectifier;
pub use traits::{
    Col, Device, Evaluation, LocalJacobian, Output, Partial, ResidualScale, Row, Terminals, Unit,
    UnknownSpec, voltage_slots,
};
