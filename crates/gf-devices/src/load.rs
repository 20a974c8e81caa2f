//! Constant-power loads.

use gf_core::PointArray;
use gf_graph::BusKind;
use num_complex::Complex64;

use crate::common::{PowerCurrent, check_voltage, phasor};
use crate::error::DeviceResult;
use crate::traits::{Col, Device, Evaluation, Output, Partial, Row, Terminals, Unit};

/// AC load consuming `P + jQ` regardless of voltage.
#[derive(Debug, Clone)]
pub struct AcLoad {
    name: String,
    /// Active power consumed (W)
    pub p: PointArray,
    /// Reactive power consumed (var)
    pub q: PointArray,
}

impl AcLoad {
    pub fn new(name: impl Into<String>, p: impl Into<PointArray>, q: impl Into<PointArray>) -> Self {
        Self {
            name: name.into(),
            p: p.into(),
            q: q.into(),
        }
    }

    pub fn power(&self, point: usize) -> Complex64 {
        Complex64::new(self.p.at(point), self.q.at(point))
    }
}

impl Device for AcLoad {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Ac]
    }

    fn partials(&self) -> Vec<Partial> {
        vec![
            Partial::varying(Row::Current(0), Col::Voltage(0)),
            Partial::varying(Row::Current(0), Col::Voltage(1)),
            Partial::varying(Row::Current(1), Col::Voltage(0)),
            Partial::varying(Row::Current(1), Col::Voltage(1)),
        ]
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        vec![("P", &self.p), ("Q", &self.q)]
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, 0);
        let pc = PowerCurrent::new(v, self.power(point), "AC load terminal voltage")?;
        out.currents[0] = pc.current.re;
        out.currents[1] = pc.current.im;

        let jac = &mut out.jacobian;
        jac.set(Row::Current(0), Col::Voltage(0), pc.d_vr.re);
        jac.set(Row::Current(0), Col::Voltage(1), pc.d_vi.re);
        jac.set(Row::Current(1), Col::Voltage(0), pc.d_vr.im);
        jac.set(Row::Current(1), Col::Voltage(1), pc.d_vi.im);
        Ok(())
    }

    fn outputs(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = phasor(terminals.voltages, 0);
        let pc = PowerCurrent::new(v, self.power(point), "AC load terminal voltage")?;
        Ok(vec![
            Output::new("P", Unit::Watt, self.p.at(point)),
            Output::new("Q", Unit::Var, self.q.at(point)),
            Output::new("I", Unit::Ampere, pc.current.norm()),
        ])
    }
}

/// DC load consuming `P` regardless of voltage.
#[derive(Debug, Clone)]
pub struct DcLoad {
    name: String,
    /// Power consumed (W)
    pub p: PointArray,
}

impl DcLoad {
    pub fn new(name: impl Into<String>, p: impl Into<PointArray>) -> Self {
        Self {
            name: name.into(),
            p: p.into(),
        }
    }
}

impl Device for DcLoad {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Dc]
    }

    fn partials(&self) -> Vec<Partial> {
        vec![Partial::varying(Row::Current(0), Col::Voltage(0))]
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        vec![("P", &self.p)]
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = terminals.voltages[0];
        check_voltage(v.abs(), "DC load terminal voltage")?;
        let p = self.p.at(point);
        out.currents[0] = p / v;
        out.jacobian
            .set(Row::Current(0), Col::Voltage(0), -p / (v * v));
        Ok(())
    }

    fn outputs(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = terminals.voltages[0];
        check_voltage(v.abs(), "DC load terminal voltage")?;
        let p = self.p.at(point);
        Ok(vec![
            Output::new("P", Unit::Watt, p),
            Output::new("I", Unit::Ampere, p / v),
        ])
    }
}
