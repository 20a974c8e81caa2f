//! Converged load-flow results.

use gf_core::units::{Angle, Voltage, degrees, volts};
use gf_core::{BusId, DeviceId};
use gf_graph::BusKind;
use nalgebra::DVector;
use num_complex::Complex64;

use crate::error::SolverResult;
use crate::network::NetworkSystem;
use crate::newton::NewtonResult;

/// A named value with its unit symbol.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantity {
    pub name: String,
    pub unit: String,
    pub value: f64,
}

/// Solved voltage of one bus at every operating point.
///
/// DC voltages are stored on the real axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusReport {
    pub id: BusId,
    pub name: String,
    pub kind: BusKind,
    pub voltages: Vec<Complex64>,
}

/// Solved unknowns and derived outputs of one device, per operating point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceReport {
    pub id: DeviceId,
    pub name: String,
    pub unknowns: Vec<Vec<Quantity>>,
    pub outputs: Vec<Vec<Quantity>>,
}

impl DeviceReport {
    /// Look up a value by name, outputs first.
    pub fn value(&self, name: &str, point: usize) -> Option<f64> {
        let find = |rows: &[Vec<Quantity>]| {
            rows.get(point)?
                .iter()
                .find(|q| q.name == name)
                .map(|q| q.value)
        };
        find(&self.outputs).or_else(|| find(&self.unknowns))
    }
}

/// Load-flow solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadFlowSolution {
    pub iterations: usize,
    pub residual_norm: f64,
    pub buses: Vec<BusReport>,
    pub devices: Vec<DeviceReport>,
    /// Raw solver state per point, used to warm-start a later solve.
    pub state: Vec<Vec<f64>>,
}

impl LoadFlowSolution {
    pub(crate) fn from_result(system: &NetworkSystem<'_, '_>, result: NewtonResult) -> SolverResult<Self> {
        let layout = system.layout();

        let buses = system
            .buses()
            .iter()
            .map(|bus| {
                let k = layout.bus_var(bus.id);
                let voltages = result
                    .x
                    .iter()
                    .map(|x| match bus.kind {
                        BusKind::Ac => Complex64::new(x[k], x[k + 1]),
                        BusKind::Dc => Complex64::new(x[k], 0.0),
                    })
                    .collect();
                BusReport {
                    id: bus.id,
                    name: bus.name.clone(),
                    kind: bus.kind,
                    voltages,
                }
            })
            .collect();

        let per_point = result
            .x
            .iter()
            .enumerate()
            .map(|(p, x)| system.outputs(p, x))
            .collect::<SolverResult<Vec<_>>>()?;

        let devices = layout
            .blocks()
            .iter()
            .enumerate()
            .map(|(d, block)| DeviceReport {
                id: block.id,
                name: block.name.clone(),
                unknowns: result
                    .x
                    .iter()
                    .map(|x| {
                        block
                            .unknowns
                            .iter()
                            .zip(&x.as_slice()[block.range()])
                            .map(|(spec, &value)| Quantity {
                                name: spec.name.to_string(),
                                unit: spec.unit.symbol().to_string(),
                                value,
                            })
                            .collect()
                    })
                    .collect(),
                outputs: per_point
                    .iter()
                    .map(|outputs| {
                        outputs[d]
                            .iter()
                            .map(|o| Quantity {
                                name: o.name.to_string(),
                                unit: o.unit.symbol().to_string(),
                                value: o.value,
                            })
                            .collect()
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            iterations: result.iterations,
            residual_norm: result.residual_norm,
            buses,
            devices,
            state: result.x.iter().map(|x| x.as_slice().to_vec()).collect(),
        })
    }

    pub fn num_points(&self) -> usize {
        self.state.len()
    }

    pub fn bus(&self, name: &str) -> Option<&BusReport> {
        self.buses.iter().find(|b| b.name == name)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceReport> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Complex voltage of a bus by name.
    pub fn bus_voltage(&self, bus: &str, point: usize) -> Option<Complex64> {
        self.bus(bus)?.voltages.get(point).copied()
    }

    pub fn voltage_magnitude(&self, bus: &str, point: usize) -> Option<Voltage> {
        self.bus_voltage(bus, point).map(|v| volts(v.norm()))
    }

    pub fn voltage_angle(&self, bus: &str, point: usize) -> Option<Angle> {
        self.bus_voltage(bus, point)
            .map(|v| degrees(v.arg().to_degrees()))
    }

    /// Device unknown or output by name.
    pub fn device_value(&self, device: &str, quantity: &str, point: usize) -> Option<f64> {
        self.device(device)?.value(quantity, point)
    }

    pub(crate) fn state_vectors(&self) -> Vec<DVector<f64>> {
        self.state
            .iter()
            .map(|x| DVector::from_column_slice(x))
            .collect()
    }
}
