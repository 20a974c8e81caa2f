//! Bidirectional AC/DC converter.
//!
//! The converter owns both terminal currents and closes them with five laws:
//! DC power balance, AC power balance (real and reactive), the modulation law
//! `|V_ac| = Ksc M V_dc`, the power-factor angle of the AC power, and a loss
//! law whose form depends on the active power-flow direction. The direction is
//! recomputed from the current iterate on every evaluation, so the Jacobian is
//! only valid on the side of the switching surface the iterate sits on.

use std::fmt;
use std::str::FromStr;

use gf_core::PointArray;
use gf_core::numeric::wrap_radians;
use gf_graph::BusKind;
use num_complex::Complex64;

use crate::common::{
    ComplexPower, PowerCurrent, check_param, check_voltage, default_power_guess, magnitude,
    pf_angle, pf_ratio, phasor,
};
use crate::error::{DeviceError, DeviceResult};
use crate::traits::{
    Col, Device, Evaluation, Output, Partial, ResidualScale, Row, Terminals, Unit, UnknownSpec,
};

/// Converter constant relating AC magnitude to `M V_dc`.
pub const DEFAULT_KSC: f64 = 0.611764706;

/// Sign of the power-factor angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMode {
    Lead,
    Lag,
}

impl PhaseMode {
    /// `+1` for Lead, `-1` for Lag.
    pub fn sign(self) -> f64 {
        match self {
            PhaseMode::Lead => 1.0,
            PhaseMode::Lag => -1.0,
        }
    }
}

impl FromStr for PhaseMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(PhaseMode::Lead),
            "lag" => Ok(PhaseMode::Lag),
            _ => Err(DeviceError::UnknownMode {
                kind: "phase",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseMode::Lead => write!(f, "Lead"),
            PhaseMode::Lag => write!(f, "Lag"),
        }
    }
}

/// Active power-flow direction of a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    AcToDc,
    DcToAc,
}

impl FlowDirection {
    /// `+1` for AC to DC, `-1` for DC to AC.
    pub fn sign(self) -> f64 {
        match self {
            FlowDirection::AcToDc => 1.0,
            FlowDirection::DcToAc => -1.0,
        }
    }
}

/// Direction implied by the real power drawn on each side.
///
/// The side with the larger magnitude is the input. Ties count as DC to AC.
pub fn direction(p_ac: f64, p_dc: f64) -> FlowDirection {
    if p_ac.abs() > p_dc.abs() {
        FlowDirection::AcToDc
    } else {
        FlowDirection::DcToAc
    }
}

/// Loss-law residual for the active direction.
pub fn loss_residual(p_ac: f64, p_dc: f64, eff: f64) -> (f64, FlowDirection) {
    let dir = direction(p_ac, p_dc);
    let r = match dir {
        FlowDirection::AcToDc => p_ac * eff + p_dc,
        FlowDirection::DcToAc => p_ac + p_dc * eff,
    };
    (r, dir)
}

// Voltage slots: [Vr, Vi, Vdc]
const VR: usize = 0;
const VI: usize = 1;
const VDC: usize = 2;

// Unknowns: [I_dc, Ir, Ii, P_dc, P_ac, Q_ac]
const IDC: usize = 0;
const IR: usize = 1;
const II: usize = 2;
const PDC: usize = 3;
const PAC: usize = 4;
const QAC: usize = 5;

// Residual rows
const MODULATION: usize = 0;
const LOSS: usize = 1;
const PHASE: usize = 2;
const DC_BALANCE: usize = 3;
const P_BALANCE: usize = 4;
const Q_BALANCE: usize = 5;

const AC_COLS: [Col; 4] = [
    Col::Voltage(VR),
    Col::Voltage(VI),
    Col::Unknown(IR),
    Col::Unknown(II),
];

/// AC/DC converter between an AC terminal and a DC terminal.
#[derive(Debug, Clone)]
pub struct Converter {
    name: String,
    /// Modulation index
    pub m: PointArray,
    /// Efficiency in (0, 1]
    pub eff: PointArray,
    /// Signed power factor; the sign selects the half-plane of the AC power.
    pub pf: PointArray,
    pub phase_mode: PhaseMode,
    pub ksc: PointArray,
    p_ac_guess: Option<PointArray>,
    p_dc_guess: Option<PointArray>,
}

impl Converter {
    pub fn new(
        name: impl Into<String>,
        m: impl Into<PointArray>,
        eff: impl Into<PointArray>,
        pf: impl Into<PointArray>,
        phase_mode: PhaseMode,
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
            phase_mode,
            ksc: PointArray::scalar(DEFAULT_KSC),
            p_ac_guess: None,
            p_dc_guess: None,
        })
    }

    pub fn with_ksc(mut self, ksc: impl Into<PointArray>) -> DeviceResult<Self> {
        let ksc = ksc.into();
        check_param(&ksc, |v| v > 0.0, "converter constant must be positive")?;
        self.ksc = ksc;
        Ok(self)
    }

    /// Starting real power drawn on the AC and DC sides.
    ///
    /// The signs select which direction branch the first iterate sits on.
    pub fn with_power_guesses(
        mut self,
        p_ac: impl Into<PointArray>,
        p_dc: impl Into<PointArray>,
    ) -> Self {
        self.p_ac_guess = Some(p_ac.into());
        self.p_dc_guess = Some(p_dc.into());
        self
    }

    fn target_angle(&self, point: usize) -> DeviceResult<f64> {
        Ok(self.phase_mode.sign() * pf_angle(self.pf.at(point))?)
    }
}

impl Device for Converter {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Ac, BusKind::Dc]
    }

    fn unknowns(&self) -> Vec<UnknownSpec> {
        vec![
            UnknownSpec::new("I_dc", Unit::Ampere, ResidualScale::Voltage(1)),
            UnknownSpec::new("Ir", Unit::Ampere, ResidualScale::Power(0)),
            UnknownSpec::new("Ii", Unit::Ampere, ResidualScale::Unity),
            UnknownSpec::new("P_dc", Unit::Watt, ResidualScale::Power(1)),
            UnknownSpec::new("P_ac", Unit::Watt, ResidualScale::Power(0)),
            UnknownSpec::new("Q_ac", Unit::Var, ResidualScale::Power(0)),
        ]
    }

    fn partials(&self) -> Vec<Partial> {
        let mut out = vec![
            Partial::constant(Row::Current(VR), Col::Unknown(IR), 1.0),
            Partial::constant(Row::Current(VI), Col::Unknown(II), 1.0),
            Partial::constant(Row::Current(VDC), Col::Unknown(IDC), 1.0),
            Partial::varying(Row::Residual(MODULATION), Col::Voltage(VR)),
            Partial::varying(Row::Residual(MODULATION), Col::Voltage(VI)),
            Partial::varying(Row::Residual(MODULATION), Col::Voltage(VDC)),
            Partial::varying(Row::Residual(LOSS), Col::Voltage(VDC)),
            Partial::varying(Row::Residual(LOSS), Col::Unknown(IDC)),
            Partial::varying(Row::Residual(DC_BALANCE), Col::Voltage(VDC)),
            Partial::varying(Row::Residual(DC_BALANCE), Col::Unknown(IDC)),
            Partial::constant(Row::Residual(DC_BALANCE), Col::Unknown(PDC), -1.0),
            Partial::constant(Row::Residual(P_BALANCE), Col::Unknown(PAC), -1.0),
            Partial::constant(Row::Residual(Q_BALANCE), Col::Unknown(QAC), -1.0),
        ];
        for row in [LOSS, PHASE, P_BALANCE, Q_BALANCE] {
            out.extend(AC_COLS.iter().map(|&c| Partial::varying(Row::Residual(row), c)));
        }
        out
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        let mut out = vec![
            ("M", &self.m),
            ("efficiency", &self.eff),
            ("PF", &self.pf),
            ("Ksc", &self.ksc),
        ];
        if let Some(g) = &self.p_ac_guess {
            out.push(("P_ac guess", g));
        }
        if let Some(g) = &self.p_dc_guess {
            out.push(("P_dc guess", g));
        }
        out
    }

    fn guess(&self, point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, VR);
        let v_dc = terminals.voltages[VDC];
        check_voltage(v_dc.abs(), "converter DC voltage")?;

        let p_ac = self
            .p_ac_guess
            .as_ref()
            .map_or_else(|| default_power_guess(terminals.bases[0].s()), |g| g.at(point));
        let p_dc = self
            .p_dc_guess
            .as_ref()
            .map_or_else(|| default_power_guess(terminals.bases[1].s()), |g| g.at(point));

        let s = Complex64::new(p_ac, p_ac * pf_ratio(self.pf.at(point))?);
        let i = PowerCurrent::new(v, s, "converter AC voltage")?.current;
        x[IDC] = p_dc / v_dc;
        x[IR] = i.re;
        x[II] = i.im;
        x[PDC] = p_dc;
        x[PAC] = s.re;
        x[QAC] = s.im;
        Ok(())
    }

    fn solve_local(&self, _point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, VR);
        let s = ComplexPower::new(v, Complex64::new(x[IR], x[II])).s;
        x[PDC] = terminals.voltages[VDC] * x[IDC];
        x[PAC] = s.re;
        x[QAC] = s.im;
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
        check_voltage(v.norm(), "converter AC voltage")?;
        let theta = self.target_angle(point)?;
        let (m, eff, ksc) = (self.m.at(point), self.eff.at(point), self.ksc.at(point));

        let power = ComplexPower::new(v, Complex64::new(x[IR], x[II]));
        let (p, q) = (power.s.re, power.s.im);
        let p_dc = v_dc * x[IDC];

        out.currents[VR] = x[IR];
        out.currents[VI] = x[II];
        out.currents[VDC] = x[IDC];

        let jac = &mut out.jacobian;

        let (vm, dvm) = magnitude(v, "converter AC voltage")?;
        out.residuals[MODULATION] = vm - ksc * m * v_dc;
        jac.set(Row::Residual(MODULATION), Col::Voltage(VR), dvm[0]);
        jac.set(Row::Residual(MODULATION), Col::Voltage(VI), dvm[1]);
        jac.set(Row::Residual(MODULATION), Col::Voltage(VDC), -ksc * m);

        let (loss, dir) = loss_residual(p, p_dc, eff);
        out.residuals[LOSS] = loss;
        let (ac_factor, dc_factor) = match dir {
            FlowDirection::AcToDc => (eff, 1.0),
            FlowDirection::DcToAc => (1.0, eff),
        };
        for (col, d) in AC_COLS.into_iter().zip(power.dp) {
            jac.set(Row::Residual(LOSS), col, d * ac_factor);
        }
        jac.set(Row::Residual(LOSS), Col::Voltage(VDC), x[IDC] * dc_factor);
        jac.set(Row::Residual(LOSS), Col::Unknown(IDC), v_dc * dc_factor);

        let s2 = p * p + q * q;
        if s2 == 0.0 {
            return Err(DeviceError::Singular {
                what: "converter AC power is zero",
            });
        }
        out.residuals[PHASE] = wrap_radians(theta - q.atan2(p));
        for (k, &col) in AC_COLS.iter().enumerate() {
            let d = -(p * power.dq[k] - q * power.dp[k]) / s2;
            jac.set(Row::Residual(PHASE), col, d);
        }

        out.residuals[DC_BALANCE] = p_dc - x[PDC];
        jac.set(Row::Residual(DC_BALANCE), Col::Voltage(VDC), x[IDC]);
        jac.set(Row::Residual(DC_BALANCE), Col::Unknown(IDC), v_dc);

        out.residuals[P_BALANCE] = p - x[PAC];
        out.residuals[Q_BALANCE] = q - x[QAC];
        for (k, &col) in AC_COLS.iter().enumerate() {
            jac.set(Row::Residual(P_BALANCE), col, power.dp[k]);
            jac.set(Row::Residual(Q_BALANCE), col, power.dq[k]);
        }
        Ok(())
    }

    fn outputs(
        &self,
        _point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = phasor(terminals.voltages, VR);
        let p = ComplexPower::new(v, Complex64::new(x[IR], x[II])).s.re;
        let p_dc = terminals.voltages[VDC] * x[IDC];
        Ok(vec![
            Output::new("P_loss", Unit::Watt, p + p_dc),
            Output::new("direction", Unit::Unitless, direction(p, p_dc).sign()),
            Output::new("Vm_ac", Unit::Volt, v.norm()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::units::{megawatts, volts};
    use gf_graph::BusBase;

    fn bases() -> [BusBase; 2] {
        let b = BusBase::new(volts(5000.0), megawatts(10.0)).unwrap();
        [b, b]
    }

    #[test]
    fn branch_selection_around_switching_surface() {
        assert_eq!(direction(1.0e6, -0.98e6), FlowDirection::AcToDc);
        assert_eq!(direction(-0.98e6, 1.0e6), FlowDirection::DcToAc);
        // ties go to the DC-to-AC branch
        assert_eq!(direction(1.0e6, -1.0e6), FlowDirection::DcToAc);
        assert_eq!(direction(1.0e6 + 1.0, -1.0e6), FlowDirection::AcToDc);

        let (r, dir) = loss_residual(1.0e6, -0.98e6, 0.98);
        assert_eq!(dir, FlowDirection::AcToDc);
        assert!(r.abs() < 1e-6);
        let (r, dir) = loss_residual(-0.98e6, 1.0e6, 0.98);
        assert_eq!(dir, FlowDirection::DcToAc);
        assert!(r.abs() < 1e-6);
    }

    #[test]
    fn phase_mode_parsing() {
        assert_eq!("Lead".parse::<PhaseMode>().unwrap(), PhaseMode::Lead);
        assert_eq!("lag".parse::<PhaseMode>().unwrap(), PhaseMode::Lag);
        assert!(matches!(
            "sideways".parse::<PhaseMode>(),
            Err(DeviceError::UnknownMode { kind: "phase", .. })
        ));
    }

    #[test]
    fn invalid_power_factor_is_a_domain_error() {
        let conv = Converter::new("C", 0.99, 0.98, 1.2, PhaseMode::Lead).unwrap();
        let v = [4100.0, -290.0, 6790.0];
        let bases = bases();
        let t = Terminals {
            voltages: &v,
            bases: &bases,
        };
        let mut out = Evaluation::for_device(&conv);
        let x = [-94.5, 155.1, -63.5, -0.64e6, 0.65e6, 0.21e6];
        assert!(matches!(
            conv.evaluate(0, t, &x, &mut out),
            Err(DeviceError::Domain { .. })
        ));
        let mut g = [0.0; 6];
        assert!(conv.guess(0, t, &mut g).is_err());
    }

    #[test]
    fn construction_checks() {
        assert!(Converter::new("C", 0.0, 0.98, 0.95, PhaseMode::Lead).is_err());
        assert!(Converter::new("C", 0.99, 1.5, 0.95, PhaseMode::Lead).is_err());
        let conv = Converter::new("C", 0.99, 0.98, 0.95, PhaseMode::Lead).unwrap();
        assert!(conv.clone().with_ksc(-1.0).is_err());
        assert_eq!(conv.ksc.at(0), DEFAULT_KSC);
    }

    #[test]
    fn guess_is_consistent_with_balances() {
        let conv = Converter::new("C", 0.99, 0.98, 0.95, PhaseMode::Lead)
            .unwrap()
            .with_power_guesses(0.65e6, -0.64e6);
        let v = [5000.0, 0.0, 5000.0];
        let bases = bases();
        let t = Terminals {
            voltages: &v,
            bases: &bases,
        };
        let mut x = [0.0; 6];
        conv.guess(0, t, &mut x).unwrap();
        let mut out = Evaluation::for_device(&conv);
        conv.evaluate(0, t, &x, &mut out).unwrap();
        assert!(out.residuals[DC_BALANCE].abs() < 1e-6);
        assert!(out.residuals[P_BALANCE].abs() < 1e-6);
        assert!(out.residuals[Q_BALANCE].abs() < 1e-6);
        // guess sits on the Lead angle
        assert!(out.residuals[PHASE].abs() < 1e-12);
        assert!(out.jacobian.undeclared().is_empty());

        let outputs = conv.outputs(0, t, &x).unwrap();
        let dir = outputs.iter().find(|o| o.name == "direction").unwrap();
        assert_eq!(dir.value, 1.0);
    }
}
