//! DC-to-AC inverter.
//!
//! The inverter bundles a DC load, an AC source and a control law into one
//! device. Phase and power-factor control own the AC current and a full set of
//! AC quantities; fixed power-factor control owns only the three powers and the
//! loss and derives the AC current from them.

use std::fmt;
use std::str::FromStr;

use gf_core::numeric::wrap_degrees;
use gf_core::{Bounds, PointArray};
use gf_graph::BusKind;
use num_complex::Complex64;

use crate::common::{
    ComplexPower, GUESS_POWER_FACTOR, PowerCurrent, check_param, check_voltage,
    default_power_guess, magnitude, pf_angle, pf_ratio, phase_deg, phasor,
};
use crate::converter::PhaseMode;
use crate::error::{DeviceError, DeviceResult};
use crate::traits::{
    Col, Device, Evaluation, Output, Partial, ResidualScale, Row, Terminals, Unit, UnknownSpec,
};

/// Control mode name, for configuration input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverterMode {
    Phase,
    PowerFactor,
    FixedPowerFactor,
}

impl FromStr for InverterMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Phase" | "phase" => Ok(InverterMode::Phase),
            "PF" | "pf" => Ok(InverterMode::PowerFactor),
            "FixedPF" | "fixedpf" => Ok(InverterMode::FixedPowerFactor),
            _ => Err(DeviceError::UnknownMode {
                kind: "inverter",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for InverterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InverterMode::Phase => write!(f, "Phase"),
            InverterMode::PowerFactor => write!(f, "PF"),
            InverterMode::FixedPowerFactor => write!(f, "FixedPF"),
        }
    }
}

/// Inverter control law with its set-points.
#[derive(Debug, Clone)]
pub enum InverterControl {
    /// AC voltage phase held at `theta_deg`.
    Phase { theta_deg: PointArray },
    /// `P_ac / |S_ac|` held at `pf`.
    PowerFactor { pf: PointArray },
    /// `P_ac k + sign(mode) Q_ac = 0` with `k = tan(acos pf)`.
    FixedPowerFactor { pf: PointArray, mode: PhaseMode },
}

impl InverterControl {
    pub fn mode(&self) -> InverterMode {
        match self {
            InverterControl::Phase { .. } => InverterMode::Phase,
            InverterControl::PowerFactor { .. } => InverterMode::PowerFactor,
            InverterControl::FixedPowerFactor { .. } => InverterMode::FixedPowerFactor,
        }
    }
}

// Voltage slots: [Vdc, Vr, Vi]
const VDC: usize = 0;
const VR: usize = 1;
const VI: usize = 2;

const AC_VOLTAGE_COLS: [Col; 2] = [Col::Voltage(VR), Col::Voltage(VI)];

// Phase / PF unknowns
const IR: usize = 0;
const II: usize = 1;
const PAC: usize = 2;
const QAC: usize = 3;
const PDC: usize = 4;
const VM: usize = 5;
const THETA: usize = 6;
const PLOSS: usize = 7;

// Fixed power-factor unknowns
const F_PDC: usize = 0;
const F_PAC: usize = 1;
const F_QAC: usize = 2;
const F_PLOSS: usize = 3;

/// Inverter between a DC terminal and an AC terminal.
#[derive(Debug, Clone)]
pub struct Inverter {
    name: String,
    /// Modulation index, `Vm_ac = M V_dc`
    pub m: PointArray,
    /// Efficiency in (0, 1]
    pub eff: PointArray,
    pub control: InverterControl,
    q_bounds: Option<Bounds>,
    ac_guess: Option<PointArray>,
    dc_guess: Option<PointArray>,
}

impl Inverter {
    pub fn new(
        name: impl Into<String>,
        m: impl Into<PointArray>,
        eff: impl Into<PointArray>,
        control: InverterControl,
    ) -> DeviceResult<Self> {
        let m = m.into();
        let eff = eff.into();
        check_param(&m, |v| v > 0.0, "modulation index must be positive")?;
        check_param(&eff, |v| v > 0.0 && v <= 1.0, "efficiency must be in (0, 1]")?;
        Ok(Self {
            name: name.into(),
            m,
            eff,
            control,
            q_bounds: None,
            ac_guess: None,
            dc_guess: None,
        })
    }

    /// Starting AC real power (phase and power-factor control).
    pub fn with_ac_power_guess(mut self, p: impl Into<PointArray>) -> Self {
        self.ac_guess = Some(p.into());
        self
    }

    /// Starting DC power (fixed power-factor control).
    pub fn with_dc_power_guess(mut self, p: impl Into<PointArray>) -> Self {
        self.dc_guess = Some(p.into());
        self
    }

    pub fn with_q_bounds(mut self, bounds: Bounds) -> Self {
        self.q_bounds = Some(bounds);
        self
    }

    pub fn mode(&self) -> InverterMode {
        self.control.mode()
    }

    fn is_fixed(&self) -> bool {
        matches!(self.control, InverterControl::FixedPowerFactor { .. })
    }

    fn ac_partials(out: &mut Vec<Partial>, row: usize) {
        for col in [
            Col::Voltage(VR),
            Col::Voltage(VI),
            Col::Unknown(IR),
            Col::Unknown(II),
        ] {
            out.push(Partial::varying(Row::Residual(row), col));
        }
    }

    fn dc_current(out: &mut Evaluation, v_dc: f64, p_dc: f64, col: usize) -> DeviceResult<()> {
        check_voltage(v_dc.abs(), "inverter DC voltage")?;
        out.currents[VDC] = p_dc / v_dc;
        out.jacobian
            .set(Row::Current(VDC), Col::Unknown(col), 1.0 / v_dc);
        out.jacobian
            .set(Row::Current(VDC), Col::Voltage(VDC), -p_dc / (v_dc * v_dc));
        Ok(())
    }

    fn evaluate_controlled(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v_dc = terminals.voltages[VDC];
        let v = phasor(terminals.voltages, VR);
        let (m, eff) = (self.m.at(point), self.eff.at(point));
        let power = ComplexPower::new(v, Complex64::new(x[IR], x[II]));

        Self::dc_current(out, v_dc, x[PDC], PDC)?;
        out.currents[VR] = x[IR];
        out.currents[VI] = x[II];

        let jac = &mut out.jacobian;
        let (vm, dvm) = magnitude(v, "inverter AC voltage")?;
        out.residuals[0] = x[VM] - vm;
        let (phase, dphase) = phase_deg(v, "inverter AC voltage")?;
        out.residuals[1] = wrap_degrees(x[THETA] - phase);
        for (k, &col) in AC_VOLTAGE_COLS.iter().enumerate() {
            jac.set(Row::Residual(0), col, -dvm[k]);
            jac.set(Row::Residual(1), col, -dphase[k]);
        }

        out.residuals[2] = power.s.re - x[PAC];
        out.residuals[3] = power.s.im - x[QAC];
        let cols = [
            Col::Voltage(VR),
            Col::Voltage(VI),
            Col::Unknown(IR),
            Col::Unknown(II),
        ];
        for (k, col) in cols.into_iter().enumerate() {
            jac.set(Row::Residual(2), col, power.dp[k]);
            jac.set(Row::Residual(3), col, power.dq[k]);
        }

        out.residuals[4] = x[PAC] / eff + x[PDC];
        jac.set(Row::Residual(4), Col::Unknown(PAC), 1.0 / eff);

        out.residuals[5] = v_dc * m - x[VM];
        jac.set(Row::Residual(5), Col::Voltage(VDC), m);

        match &self.control {
            InverterControl::Phase { theta_deg } => {
                out.residuals[6] = theta_deg.at(point) - x[THETA];
            }
            InverterControl::PowerFactor { pf } => {
                let pf = pf.at(point);
                pf_angle(pf)?;
                let (p, q) = (x[PAC], x[QAC]);
                let s = p.hypot(q);
                if s == 0.0 {
                    return Err(DeviceError::Singular {
                        what: "inverter AC power is zero",
                    });
                }
                out.residuals[6] = p / s - pf;
                let s3 = s * s * s;
                jac.set(Row::Residual(6), Col::Unknown(PAC), q * q / s3);
                jac.set(Row::Residual(6), Col::Unknown(QAC), -p * q / s3);
            }
            InverterControl::FixedPowerFactor { .. } => {
                return Err(DeviceError::InvalidArg {
                    what: "fixed power-factor inverter has no phase unknowns",
                });
            }
        }

        out.residuals[7] = x[PAC] + x[PDC] - x[PLOSS];
        Ok(())
    }

    fn evaluate_fixed(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let InverterControl::FixedPowerFactor { pf, mode } = &self.control else {
            return Err(DeviceError::InvalidArg {
                what: "inverter is not under fixed power-factor control",
            });
        };
        let v_dc = terminals.voltages[VDC];
        let v = phasor(terminals.voltages, VR);
        let (m, eff) = (self.m.at(point), self.eff.at(point));
        let k = pf_ratio(pf.at(point))?;
        let s = Complex64::new(x[F_PAC], x[F_QAC]);
        let pc = PowerCurrent::new(v, s, "inverter AC voltage")?;

        Self::dc_current(out, v_dc, x[F_PDC], F_PDC)?;
        out.currents[VR] = pc.current.re;
        out.currents[VI] = pc.current.im;

        let jac = &mut out.jacobian;
        for (row, part) in [(VR, 0), (VI, 1)] {
            let pick = |c: Complex64| if part == 0 { c.re } else { c.im };
            jac.set(Row::Current(row), Col::Voltage(VR), pick(pc.d_vr));
            jac.set(Row::Current(row), Col::Voltage(VI), pick(pc.d_vi));
            jac.set(Row::Current(row), Col::Unknown(F_PAC), pick(pc.d_p));
            jac.set(Row::Current(row), Col::Unknown(F_QAC), pick(pc.d_q));
        }

        let (vm, dvm) = magnitude(v, "inverter AC voltage")?;
        out.residuals[0] = v_dc * m - vm;
        jac.set(Row::Residual(0), Col::Voltage(VDC), m);
        jac.set(Row::Residual(0), Col::Voltage(VR), -dvm[0]);
        jac.set(Row::Residual(0), Col::Voltage(VI), -dvm[1]);

        out.residuals[1] = x[F_PAC] + x[F_PDC] * eff;
        jac.set(Row::Residual(1), Col::Unknown(F_PDC), eff);

        out.residuals[2] = x[F_PAC] * k + mode.sign() * x[F_QAC];
        jac.set(Row::Residual(2), Col::Unknown(F_PAC), k);

        out.residuals[3] = x[F_PAC] + x[F_PDC] - x[F_PLOSS];
        Ok(())
    }
}

impl Device for Inverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Dc, BusKind::Ac]
    }

    fn unknowns(&self) -> Vec<UnknownSpec> {
        let q_bounds = self.q_bounds.clone();
        if self.is_fixed() {
            return vec![
                UnknownSpec::new("P_dc", Unit::Watt, ResidualScale::Voltage(1)),
                UnknownSpec::new("P_ac", Unit::Watt, ResidualScale::Power(1)),
                UnknownSpec::new("Q_ac", Unit::Var, ResidualScale::Power(1)).bounded(q_bounds),
                UnknownSpec::new("P_loss", Unit::Watt, ResidualScale::Power(1)),
            ];
        }
        vec![
            UnknownSpec::new("Ir", Unit::Ampere, ResidualScale::Voltage(1)),
            UnknownSpec::new("Ii", Unit::Ampere, ResidualScale::Unity),
            UnknownSpec::new("P_ac", Unit::Watt, ResidualScale::Power(1)),
            UnknownSpec::new("Q_ac", Unit::Var, ResidualScale::Power(1)).bounded(q_bounds),
            UnknownSpec::new("P_dc", Unit::Watt, ResidualScale::Power(0)),
            UnknownSpec::new("Vm_ac", Unit::Volt, ResidualScale::Voltage(1)),
            UnknownSpec::new("theta", Unit::Degree, ResidualScale::Unity),
            UnknownSpec::new("P_loss", Unit::Watt, ResidualScale::Power(1)),
        ]
    }

    fn partials(&self) -> Vec<Partial> {
        if let InverterControl::FixedPowerFactor { mode, .. } = self.control {
            let mut out = vec![
                Partial::varying(Row::Current(VDC), Col::Voltage(VDC)),
                Partial::varying(Row::Current(VDC), Col::Unknown(F_PDC)),
                Partial::varying(Row::Residual(0), Col::Voltage(VDC)),
                Partial::varying(Row::Residual(0), Col::Voltage(VR)),
                Partial::varying(Row::Residual(0), Col::Voltage(VI)),
                Partial::constant(Row::Residual(1), Col::Unknown(F_PAC), 1.0),
                Partial::varying(Row::Residual(1), Col::Unknown(F_PDC)),
                Partial::varying(Row::Residual(2), Col::Unknown(F_PAC)),
                Partial::constant(Row::Residual(2), Col::Unknown(F_QAC), mode.sign()),
                Partial::constant(Row::Residual(3), Col::Unknown(F_PAC), 1.0),
                Partial::constant(Row::Residual(3), Col::Unknown(F_PDC), 1.0),
                Partial::constant(Row::Residual(3), Col::Unknown(F_PLOSS), -1.0),
            ];
            for row in [VR, VI] {
                for col in [
                    Col::Voltage(VR),
                    Col::Voltage(VI),
                    Col::Unknown(F_PAC),
                    Col::Unknown(F_QAC),
                ] {
                    out.push(Partial::varying(Row::Current(row), col));
                }
            }
            return out;
        }

        let mut out = vec![
            Partial::varying(Row::Current(VDC), Col::Voltage(VDC)),
            Partial::varying(Row::Current(VDC), Col::Unknown(PDC)),
            Partial::constant(Row::Current(VR), Col::Unknown(IR), 1.0),
            Partial::constant(Row::Current(VI), Col::Unknown(II), 1.0),
            Partial::constant(Row::Residual(0), Col::Unknown(VM), 1.0),
            Partial::constant(Row::Residual(1), Col::Unknown(THETA), 1.0),
            Partial::constant(Row::Residual(2), Col::Unknown(PAC), -1.0),
            Partial::constant(Row::Residual(3), Col::Unknown(QAC), -1.0),
            Partial::varying(Row::Residual(4), Col::Unknown(PAC)),
            Partial::constant(Row::Residual(4), Col::Unknown(PDC), 1.0),
            Partial::varying(Row::Residual(5), Col::Voltage(VDC)),
            Partial::constant(Row::Residual(5), Col::Unknown(VM), -1.0),
            Partial::constant(Row::Residual(7), Col::Unknown(PAC), 1.0),
            Partial::constant(Row::Residual(7), Col::Unknown(PDC), 1.0),
            Partial::constant(Row::Residual(7), Col::Unknown(PLOSS), -1.0),
        ];
        for row in [0, 1] {
            out.extend(AC_VOLTAGE_COLS.iter().map(|&c| Partial::varying(Row::Residual(row), c)));
        }
        Self::ac_partials(&mut out, 2);
        Self::ac_partials(&mut out, 3);
        match self.control {
            InverterControl::Phase { .. } => {
                out.push(Partial::constant(Row::Residual(6), Col::Unknown(THETA), -1.0));
            }
            _ => {
                out.push(Partial::varying(Row::Residual(6), Col::Unknown(PAC)));
                out.push(Partial::varying(Row::Residual(6), Col::Unknown(QAC)));
            }
        }
        out
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        let mut out = vec![("M", &self.m), ("efficiency", &self.eff)];
        match &self.control {
            InverterControl::Phase { theta_deg } => out.push(("theta", theta_deg)),
            InverterControl::PowerFactor { pf } | InverterControl::FixedPowerFactor { pf, .. } => {
                out.push(("PF", pf))
            }
        }
        if let Some(g) = &self.ac_guess {
            out.push(("P_ac guess", g));
        }
        if let Some(g) = &self.dc_guess {
            out.push(("P_dc guess", g));
        }
        out
    }

    fn guess(&self, point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v_dc = terminals.voltages[VDC];
        let v = phasor(terminals.voltages, VR);
        let (m, eff) = (self.m.at(point), self.eff.at(point));

        if let InverterControl::FixedPowerFactor { pf, mode } = &self.control {
            let k = pf_ratio(pf.at(point))?;
            let p_dc = self
                .dc_guess
                .as_ref()
                .map_or_else(|| -default_power_guess(terminals.bases[0].s()), |g| g.at(point));
            let p_ac = -p_dc * eff;
            x[F_PDC] = p_dc;
            x[F_PAC] = p_ac;
            x[F_QAC] = -mode.sign() * p_ac * k;
            x[F_PLOSS] = p_ac + p_dc;
            return Ok(());
        }

        let p = self
            .ac_guess
            .as_ref()
            .map_or_else(|| default_power_guess(terminals.bases[1].s()), |g| g.at(point));
        let s = Complex64::new(p, p * pf_ratio(GUESS_POWER_FACTOR)?);
        let i = PowerCurrent::new(v, s, "inverter AC voltage")?.current;
        let p_dc = -s.re / eff;
        x[IR] = i.re;
        x[II] = i.im;
        x[PAC] = s.re;
        x[QAC] = s.im;
        x[PDC] = p_dc;
        x[VM] = v_dc * m;
        x[THETA] = match &self.control {
            InverterControl::Phase { theta_deg } => theta_deg.at(point),
            _ => phase_deg(v, "inverter AC voltage")?.0,
        };
        x[PLOSS] = s.re + p_dc;
        Ok(())
    }

    fn solve_local(&self, _point: usize, _terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        if self.is_fixed() {
            x[F_PLOSS] = x[F_PAC] + x[F_PDC];
        } else {
            x[PLOSS] = x[PAC] + x[PDC];
        }
        Ok(())
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        check_voltage(
            phasor(terminals.voltages, VR).norm(),
            "inverter AC voltage",
        )?;
        if self.is_fixed() {
            self.evaluate_fixed(point, terminals, x, out)
        } else {
            self.evaluate_controlled(point, terminals, x, out)
        }
    }

    fn outputs(
        &self,
        _point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = phasor(terminals.voltages, VR);
        let (p_ac, q_ac, p_dc) = if self.is_fixed() {
            (x[F_PAC], x[F_QAC], x[F_PDC])
        } else {
            (x[PAC], x[QAC], x[PDC])
        };
        Ok(vec![
            Output::new("P_ac", Unit::Watt, p_ac),
            Output::new("Q_ac", Unit::Var, q_ac),
            Output::new("P_dc", Unit::Watt, p_dc),
            Output::new("P_loss", Unit::Watt, p_ac + p_dc),
            Output::new("Vm_ac", Unit::Volt, v.norm()),
        ])
    }
}
