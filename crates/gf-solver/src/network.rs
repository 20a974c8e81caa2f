//! Global residual and Jacobian assembly over a validated problem.
//!
//! Each operating point is evaluated independently: devices read their
//! terminal voltage slots and own unknowns from the point's state vector and
//! return currents, residuals and local partials. Currents are summed into the
//! bus balances; local partials are mapped into global coordinates. Every row
//! is divided by its reference scale so that volts, amperes and watts share one
//! norm.

use gf_devices::{
    BusBalance, Col, Device, Evaluation, INCIDENT_CURRENT_PARTIAL, Output, Row, Terminals,
};
use gf_graph::{Bus, BusKind};
use nalgebra::DVector;
use tracing::warn;

use crate::error::{SolverError, SolverResult};
use crate::jacobian::SparseJacobian;
use crate::layout::{DeviceBlock, Layout, device_for};
use crate::newton::NonlinearSystem;
use crate::problem::LoadFlowProblem;

/// A load-flow problem prepared for Newton iteration.
pub struct NetworkSystem<'p, 'g> {
    problem: &'p LoadFlowProblem<'g>,
    layout: Layout,
    /// Device of each layout block, in element order.
    devices: Vec<&'p dyn Device>,
    /// Declared partials over all devices.
    nnz: usize,
}

impl<'p, 'g> NetworkSystem<'p, 'g> {
    /// Lay out the problem. Call [`LoadFlowProblem::validate`] first.
    pub fn new(problem: &'p LoadFlowProblem<'g>) -> SolverResult<Self> {
        let layout = Layout::new(problem)?;
        let devices = layout
            .blocks()
            .iter()
            .map(|block| device_for(problem, block.id))
            .collect::<SolverResult<Vec<_>>>()?;
        let nnz = devices.iter().map(|d| d.partials().len()).sum();
        Ok(Self {
            problem,
            layout,
            devices,
            nnz,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn buses(&self) -> &[Bus] {
        self.problem.graph.buses()
    }

    /// Flat start: every bus at its base voltage with zero angle, then each
    /// device's own guess, clamped into its bounds.
    pub fn initial_guess(&self, point: usize) -> SolverResult<DVector<f64>> {
        let mut x = DVector::zeros(self.layout.num_vars());
        for bus in self.buses() {
            x[self.layout.bus_var(bus.id)] = bus.base.v();
        }

        for (block, device) in self.layout.blocks().iter().zip(&self.devices) {
            let voltages = slot_voltages(block, &x);
            let terminals = Terminals {
                voltages: &voltages,
                bases: &block.bases,
            };
            device
                .guess(point, terminals, &mut x.as_mut_slice()[block.range()])
                .map_err(|e| device_failure(block, point, e))?;
        }
        self.clamp(point, &mut x);
        Ok(x)
    }

    /// Let implicit devices recompute dependent unknowns from the iterate.
    pub fn sub_solve(&self, point: usize, x: &mut DVector<f64>) -> SolverResult<()> {
        for (block, device) in self.layout.blocks().iter().zip(&self.devices) {
            let voltages = slot_voltages(block, x);
            let terminals = Terminals {
                voltages: &voltages,
                bases: &block.bases,
            };
            device
                .solve_local(point, terminals, &mut x.as_mut_slice()[block.range()])
                .map_err(|e| device_failure(block, point, e))?;
        }
        self.clamp(point, x);
        Ok(())
    }

    /// Scaled residual and Jacobian at one operating point.
    pub fn evaluate(
        &self,
        point: usize,
        x: &DVector<f64>,
    ) -> SolverResult<(DVector<f64>, SparseJacobian)> {
        let n = self.layout.num_vars();
        let scales = self.layout.row_scales();
        let mut r = DVector::zeros(n);
        let mut jac = SparseJacobian::with_capacity(n, self.nnz);
        let mut balances: Vec<BusBalance> =
            self.buses().iter().map(|b| BusBalance::new(b.kind)).collect();

        for (block, device) in self.layout.blocks().iter().zip(&self.devices) {
            let voltages = slot_voltages(block, x);
            let terminals = Terminals {
                voltages: &voltages,
                bases: &block.bases,
            };
            let mut out = Evaluation::for_device(*device);
            device
                .evaluate(point, terminals, &x.as_slice()[block.range()], &mut out)
                .map_err(|e| device_failure(block, point, e))?;

            if let Some((row, col)) = out.jacobian.undeclared().first() {
                return Err(SolverError::Setup {
                    what: format!(
                        "Device '{}' wrote undeclared partial {:?}/{:?}",
                        block.name, row, col
                    ),
                });
            }

            let mut slot = 0;
            for bus in self.terminal_buses(block) {
                for component in 0..bus.kind.width() {
                    balances[bus.id.slot()].draw_component(component, out.currents[slot]);
                    slot += 1;
                }
            }
            for (k, res) in out.residuals.iter().enumerate() {
                r[block.offset + k] = res / scales[block.offset + k];
            }

            for (row, col, value) in out.jacobian.entries() {
                let (global_row, value) = match row {
                    Row::Current(s) => (block.slot_vars[s], value * INCIDENT_CURRENT_PARTIAL),
                    Row::Residual(k) => (block.offset + k, value),
                };
                let global_col = match col {
                    Col::Voltage(s) => block.slot_vars[s],
                    Col::Unknown(k) => block.offset + k,
                };
                jac.push(global_row, global_col, value);
            }
        }

        for (bus, balance) in self.buses().iter().zip(&balances) {
            let start = self.layout.bus_var(bus.id);
            for (k, res) in balance.scaled(&bus.base).enumerate() {
                r[start + k] = res;
            }
        }
        jac.scale_rows(scales);
        Ok((r, jac))
    }

    /// Scaled residual only.
    pub fn residual(&self, point: usize, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
        self.evaluate(point, x).map(|(r, _)| r)
    }

    /// Smallest bus voltage relative to its base. DC voltages keep their sign.
    pub fn voltage_fraction(&self, x: &DVector<f64>) -> f64 {
        self.buses()
            .iter()
            .map(|bus| {
                let k = self.layout.bus_var(bus.id);
                let v = match bus.kind {
                    BusKind::Ac => x[k].hypot(x[k + 1]),
                    BusKind::Dc => x[k],
                };
                v / bus.base.v()
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Derived quantities of every device, in element order.
    pub fn outputs(&self, point: usize, x: &DVector<f64>) -> SolverResult<Vec<Vec<Output>>> {
        self.layout
            .blocks()
            .iter()
            .zip(&self.devices)
            .map(|(block, device)| {
                let voltages = slot_voltages(block, x);
                let terminals = Terminals {
                    voltages: &voltages,
                    bases: &block.bases,
                };
                device
                    .outputs(point, terminals, &x.as_slice()[block.range()])
                    .map_err(|e| device_failure(block, point, e))
            })
            .collect()
    }

    fn terminal_buses<'a>(&'a self, block: &'a DeviceBlock) -> impl Iterator<Item = &'a Bus> + 'a {
        let buses = self.buses();
        block.buses.iter().map(move |id| &buses[id.slot()])
    }

    fn clamp(&self, point: usize, x: &mut DVector<f64>) {
        for (v, b) in x.iter_mut().zip(self.layout.bounds(point)) {
            if let Some((lo, hi)) = b {
                *v = v.clamp(lo, hi);
            }
        }
    }
}

impl NonlinearSystem for NetworkSystem<'_, '_> {
    fn num_points(&self) -> usize {
        self.problem.num_points
    }

    fn num_vars(&self) -> usize {
        self.layout.num_vars()
    }

    fn evaluate(
        &self,
        point: usize,
        x: &DVector<f64>,
    ) -> SolverResult<(DVector<f64>, SparseJacobian)> {
        NetworkSystem::evaluate(self, point, x)
    }

    fn bounds(&self, point: usize) -> Vec<Option<(f64, f64)>> {
        self.layout.bounds(point)
    }

    fn sub_solve(&self, point: usize, x: &mut DVector<f64>) -> SolverResult<()> {
        NetworkSystem::sub_solve(self, point, x)
    }

    fn voltage_fraction(&self, _point: usize, x: &DVector<f64>) -> f64 {
        NetworkSystem::voltage_fraction(self, x)
    }
}

fn slot_voltages(block: &DeviceBlock, x: &DVector<f64>) -> Vec<f64> {
    block.slot_vars.iter().map(|&k| x[k]).collect()
}

fn device_failure(block: &DeviceBlock, point: usize, e: gf_devices::DeviceError) -> SolverError {
    warn!(device = %block.name, point, error = %e, "device evaluation failed");
    SolverError::Device(e)
}
