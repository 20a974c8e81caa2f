//! AC-to-DC rectifier: an AC load, a DC source and a fixed power-factor law.

use gf_core::{Bounds, PointArray};
use gf_graph::BusKind;
use num_complex::Complex64;

use crate::common::{
    PowerCurrent, check_param, check_voltage, default_power_guess, magnitude, pf_ratio, phasor,
};
use crate::error::DeviceResult;
use crate::traits::{
    Col, Device, Evaluation, Output, Partial, ResidualScale, Row, Terminals, Unit, UnknownSpec,
};

// Voltage slots: [Vr, Vi, Vdc]
const VR: usize = 0;
const VI: usize = 1;
const VDC: usize = 2;

// Unknowns: [I_dc, P_dc, P_ac, Vm_dc, Q_ac, P_loss]
const IDC: usize = 0;
const PDC: usize = 1;
const PAC: usize = 2;
const VM_DC: usize = 3;
const QAC: usize = 4;
const PLOSS: usize = 5;

/// Rectifier between an AC terminal and a DC terminal.
///
/// The DC voltage follows `|V_ac| M`, the AC side draws `P_dc / eff` at the
/// configured power factor.
#[derive(Debug, Clone)]
pub struct Rectifier {
    name: String,
    /// Modulation index
    pub m: PointArray,
    /// Efficiency in (0, 1]
    pub eff: PointArray,
    pub pf: PointArray,
    p_guess: Option<PointArray>,
    p_bounds: Option<Bounds>,
}

impl Rectifier {
    pub fn new(
        name: impl Into<String>,
        m: impl Into<PointArray>,
        eff: impl Into<PointArray>,
        pf: impl Into<PointArray>,
    ) -> DeviceResult<Self> {
        let m = m.into();
        let eff = eff.into();
        check_param(&m, |v| v > 0.0, "modulation index must be positive")?;
        check_param(&eff, |v| v > 0.0 && v <= 1.0, "efficiency must be in (0, 1]")?;
        Ok(Self {
            name: name.into(),
            m,
            eff,
            pf: pf.into(),
            p_guess: None,
            p_bounds: None,
        })
    }

    /// Starting DC power drawn (negative when supplying the DC bus).
    pub fn with_power_guess(mut self, p_dc: impl Into<PointArray>) -> Self {
        self.p_guess = Some(p_dc.into());
        self
    }

    pub fn with_p_bounds(mut self, bounds: Bounds) -> Self {
        self.p_bounds = Some(bounds);
        self
    }
}

impl Device for Rectifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Ac, BusKind::Dc]
    }

    fn unknowns(&self) -> Vec<UnknownSpec> {
        vec![
            UnknownSpec::new("I_dc", Unit::Ampere, ResidualScale::Voltage(1)),
            UnknownSpec::new("P_dc", Unit::Watt, ResidualScale::Power(1))
                .bounded(self.p_bounds.clone()),
            UnknownSpec::new("P_ac", Unit::Watt, ResidualScale::Power(0)),
            UnknownSpec::new("Vm_dc", Unit::Volt, ResidualScale::Voltage(1)),
            UnknownSpec::new("Q_ac", Unit::Var, ResidualScale::Power(0)),
            UnknownSpec::new("P_loss", Unit::Watt, ResidualScale::Power(0)),
        ]
    }

    fn partials(&self) -> Vec<Partial> {
        let mut out = vec![
            Partial::constant(Row::Current(VDC), Col::Unknown(IDC), 1.0),
            Partial::constant(Row::Residual(0), Col::Unknown(VM_DC), 1.0),
            Partial::constant(Row::Residual(0), Col::Voltage(VDC), -1.0),
            Partial::varying(Row::Residual(1), Col::Voltage(VDC)),
            Partial::varying(Row::Residual(1), Col::Unknown(IDC)),
            Partial::constant(Row::Residual(1), Col::Unknown(PDC), -1.0),
            Partial::varying(Row::Residual(2), Col::Unknown(PDC)),
            Partial::constant(Row::Residual(2), Col::Unknown(PAC), 1.0),
            Partial::varying(Row::Residual(3), Col::Voltage(VR)),
            Partial::varying(Row::Residual(3), Col::Voltage(VI)),
            Partial::constant(Row::Residual(3), Col::Unknown(VM_DC), -1.0),
            Partial::varying(Row::Residual(4), Col::Unknown(PAC)),
            Partial::constant(Row::Residual(4), Col::Unknown(QAC), -1.0),
            Partial::constant(Row::Residual(5), Col::Unknown(PAC), 1.0),
            Partial::constant(Row::Residual(5), Col::Unknown(PDC), 1.0),
            Partial::constant(Row::Residual(5), Col::Unknown(PLOSS), -1.0),
        ];
        for row in [VR, VI] {
            for col in [
                Col::Voltage(VR),
                Col::Voltage(VI),
                Col::Unknown(PAC),
                Col::Unknown(QAC),
            ] {
                out.push(Partial::varying(Row::Current(row), col));
            }
        }
        out
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        let mut out = vec![("M", &self.m), ("efficiency", &self.eff), ("PF", &self.pf)];
        if let Some(g) = &self.p_guess {
            out.push(("P_dc guess", g));
        }
        out
    }

    fn guess(&self, point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, VR);
        let v_dc = terminals.voltages[VDC];
        check_voltage(v_dc.abs(), "rectifier DC voltage")?;
        let k = pf_ratio(self.pf.at(point))?;
        let p_dc = self
            .p_guess
            .as_ref()
            .map_or_else(|| default_power_guess(terminals.bases[1].s()), |g| g.at(point));
        let p_ac = -p_dc / self.eff.at(point);
        x[IDC] = p_dc / v_dc;
        x[PDC] = p_dc;
        x[PAC] = p_ac;
        x[VM_DC] = v.norm() * self.m.at(point);
        x[QAC] = p_ac * k;
        x[PLOSS] = p_ac + p_dc;
        Ok(())
    }

    fn solve_local(&self, _point: usize, _terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        x[PLOSS] = x[PAC] + x[PDC];
        Ok(())
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, VR);
        let v_dc = terminals.voltages[VDC];
        let (m, eff) = (self.m.at(point), self.eff.at(point));
        let k = pf_ratio(self.pf.at(point))?;
        let pc = PowerCurrent::new(v, Complex64::new(x[PAC], x[QAC]), "rectifier AC voltage")?;

        out.currents[VR] = pc.current.re;
        out.currents[VI] = pc.current.im;
        out.currents[VDC] = x[IDC];

        let jac = &mut out.jacobian;
        let parts: [fn(Complex64) -> f64; 2] = [|c| c.re, |c| c.im];
        for (row, part) in [VR, VI].into_iter().zip(parts) {
            jac.set(Row::Current(row), Col::Voltage(VR), part(pc.d_vr));
            jac.set(Row::Current(row), Col::Voltage(VI), part(pc.d_vi));
            jac.set(Row::Current(row), Col::Unknown(PAC), part(pc.d_p));
            jac.set(Row::Current(row), Col::Unknown(QAC), part(pc.d_q));
        }

        out.residuals[0] = x[VM_DC] - v_dc;

        out.residuals[1] = v_dc * x[IDC] - x[PDC];
        jac.set(Row::Residual(1), Col::Voltage(VDC), x[IDC]);
        jac.set(Row::Residual(1), Col::Unknown(IDC), v_dc);

        out.residuals[2] = x[PDC] / eff + x[PAC];
        jac.set(Row::Residual(2), Col::Unknown(PDC), 1.0 / eff);

        let (vm, dvm) = magnitude(v, "rectifier AC voltage")?;
        out.residuals[3] = vm * m - x[VM_DC];
        jac.set(Row::Residual(3), Col::Voltage(VR), m * dvm[0]);
        jac.set(Row::Residual(3), Col::Voltage(VI), m * dvm[1]);

        out.residuals[4] = x[PAC] * k - x[QAC];
        jac.set(Row::Residual(4), Col::Unknown(PAC), k);

        out.residuals[5] = x[PAC] + x[PDC] - x[PLOSS];
        Ok(())
    }

    fn outputs(
        &self,
        _point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        Ok(vec![
            Output::new("P_ac", Unit::Watt, x[PAC]),
            Output::new("Q_ac", Unit::Var, x[QAC]),
            Output::new("P_dc", Unit::Watt, terminals.voltages[VDC] * x[IDC]),
            Output::new("P_loss", Unit::Watt, x[PAC] + x[PDC]),
        ])
    }
}
