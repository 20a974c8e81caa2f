//! Variable layout of the per-point unknown vector.
//!
//! Bus voltages come first in bus order (AC: `Re V, Im V`; DC: `V`), then the
//! unknowns of each device in element order. Bus balance rows share their
//! index with the bus voltage variables; device residual rows share theirs
//! with the device's unknowns.

use gf_core::{BusId, DeviceId};
use gf_devices::{Device, UnknownSpec};
use gf_graph::{Bus, BusBase, Graph};

use crate::error::{SolverError, SolverResult};
use crate::problem::LoadFlowProblem;

/// Where one device's variables live in the global vector.
#[derive(Debug, Clone)]
pub struct DeviceBlock {
    pub id: DeviceId,
    pub name: String,
    /// Bus of each terminal, in terminal order.
    pub buses: Vec<BusId>,
    /// Global variable index of each voltage slot.
    pub slot_vars: Vec<usize>,
    /// Base of each terminal's bus.
    pub bases: Vec<BusBase>,
    /// First global index of the device's own unknowns.
    pub offset: usize,
    pub unknowns: Vec<UnknownSpec>,
}

impl DeviceBlock {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.unknowns.len()
    }
}

/// Global variable and row layout shared by every operating point.
#[derive(Debug, Clone)]
pub struct Layout {
    bus_offsets: Vec<usize>,
    blocks: Vec<DeviceBlock>,
    row_scales: Vec<f64>,
    num_vars: usize,
}

impl Layout {
    /// Lay out a validated problem.
    pub fn new(problem: &LoadFlowProblem<'_>) -> SolverResult<Self> {
        let graph = problem.graph;
        let mut offset = 0;
        let mut bus_offsets = Vec::with_capacity(graph.buses().len());
        let mut row_scales = Vec::new();
        for bus in graph.buses() {
            bus_offsets.push(offset);
            offset += bus.kind.width();
            row_scales.extend(std::iter::repeat_n(bus.base.i(), bus.kind.width()));
        }

        let mut blocks = Vec::with_capacity(graph.elements().len());
        for element in graph.elements() {
            let device = device_for(problem, element.id)?;
            let buses = graph.element_buses(element.id).ok_or_else(|| SolverError::Setup {
                what: format!("Element '{}' has a dangling terminal", element.name),
            })?;

            let mut slot_vars = Vec::new();
            let mut bases = Vec::with_capacity(buses.len());
            for &bus_id in &buses {
                let bus = bus_of(graph, bus_id)?;
                let start = bus_offsets[bus_id.slot()];
                slot_vars.extend(start..start + bus.kind.width());
                bases.push(bus.base);
            }

            let unknowns = device.unknowns();
            for spec in &unknowns {
                row_scales.push(spec.scale.reference(&bases));
            }
            blocks.push(DeviceBlock {
                id: element.id,
                name: element.name.clone(),
                buses,
                slot_vars,
                bases,
                offset,
                unknowns,
            });
            offset += blocks.last().map_or(0, |b| b.unknowns.len());
        }

        Ok(Self {
            bus_offsets,
            blocks,
            row_scales,
            num_vars: offset,
        })
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn blocks(&self) -> &[DeviceBlock] {
        &self.blocks
    }

    /// First variable index of a bus.
    pub fn bus_var(&self, bus: BusId) -> usize {
        self.bus_offsets[bus.slot()]
    }

    /// Reference value each row is divided by.
    pub fn row_scales(&self) -> &[f64] {
        &self.row_scales
    }

    /// Per-variable `(lower, upper)` at one operating point; `None` when free.
    pub fn bounds(&self, point: usize) -> Vec<Option<(f64, f64)>> {
        let mut out = vec![None; self.num_vars];
        for block in &self.blocks {
            for (k, spec) in block.unknowns.iter().enumerate() {
                out[block.offset + k] = spec.bounds.as_ref().map(|b| b.at(point));
            }
        }
        out
    }
}

pub(crate) fn device_for<'p>(
    problem: &'p LoadFlowProblem<'_>,
    id: DeviceId,
) -> SolverResult<&'p dyn Device> {
    problem
        .devices
        .get(&id)
        .map(|d| d.as_ref())
        .ok_or_else(|| SolverError::Setup {
            what: format!("Element {} has no device", id),
        })
}

fn bus_of(graph: &Graph, id: BusId) -> SolverResult<&Bus> {
    graph.bus(id).ok_or_else(|| SolverError::Setup {
        what: format!("Bus {} not found", id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::units::{megawatts, volts};
    use gf_devices::{AcGenerator, Converter, DcLoad, PhaseMode};
    use gf_graph::{BusKind, GraphBuilder};

    #[test]
    fn buses_first_then_devices_in_element_order() {
        let ac = BusBase::new(volts(4160.0), megawatts(10.0)).unwrap();
        let dc = BusBase::new(volts(6800.0), megawatts(10.0)).unwrap();
        let mut b = GraphBuilder::new();
        let a = b.add_bus("A", BusKind::Ac, ac);
        let d = b.add_bus("D", BusKind::Dc, dc);
        let gen_id = b.add_element("slack", &[a]);
        let conv = b.add_element("conv", &[a, d]);
        let load = b.add_element("load", &[d]);
        let graph = b.build().unwrap();

        let mut problem = LoadFlowProblem::new(&graph, 1);
        problem
            .add_device(gen_id, Box::new(AcGenerator::slack("slack", 4160.0, 0.0).unwrap()))
            .unwrap();
        problem
            .add_device(
                conv,
                Box::new(Converter::new("conv", 0.99, 0.98, 0.95, PhaseMode::Lead).unwrap()),
            )
            .unwrap();
        problem
            .add_device(load, Box::new(DcLoad::new("load", 1.0e6)))
            .unwrap();

        let layout = Layout::new(&problem).unwrap();
        assert_eq!(layout.bus_var(a), 0);
        assert_eq!(layout.bus_var(d), 2);
        assert_eq!(layout.num_vars(), 3 + 4 + 6);

        let blocks = layout.blocks();
        assert_eq!(blocks[0].offset, 3);
        assert_eq!(blocks[1].offset, 7);
        assert_eq!(blocks[1].slot_vars, vec![0, 1, 2]);
        assert_eq!(blocks[2].unknowns.len(), 0);

        let scales = layout.row_scales();
        assert_eq!(scales[0], 10.0e6 / 4160.0);
        assert_eq!(scales[2], 10.0e6 / 6800.0);
        // slack: |V| row scaled by the bus voltage, phase row unscaled
        assert_eq!(scales[3], 4160.0);
        assert_eq!(scales[4], 1.0);
        // converter: I_dc row is the modulation law, scaled by the DC voltage
        assert_eq!(scales[7], 6800.0);
    }
}
