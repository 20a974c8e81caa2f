//! AC (Slack, P-V) and DC generators.
//!
//! Generators are implicit devices: they own their terminal current and the
//! power they deliver, and close those unknowns with set-point equations.

use std::fmt;
use std::str::FromStr;

use gf_core::numeric::wrap_degrees;
use gf_core::{Bounds, PointArray};
use gf_graph::BusKind;
use num_complex::Complex64;

use crate::common::{
    ComplexPower, GUESS_POWER_FACTOR, PowerCurrent, check_param, check_voltage,
    default_power_guess, magnitude, pf_ratio, phase_deg, phasor,
};
use crate::error::{DeviceError, DeviceResult};
use crate::traits::{
    Col, Device, Evaluation, Output, Partial, ResidualScale, Row, Terminals, Unit, UnknownSpec,
};

/// Control mode of an AC generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Fixes voltage magnitude and phase.
    Slack,
    /// Fixes voltage magnitude and real power.
    Pv,
}

impl FromStr for GeneratorMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SLACK" => Ok(GeneratorMode::Slack),
            "P-V" | "PV" => Ok(GeneratorMode::Pv),
            _ => Err(DeviceError::UnknownMode {
                kind: "generator",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for GeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorMode::Slack => write!(f, "Slack"),
            GeneratorMode::Pv => write!(f, "P-V"),
        }
    }
}

#[derive(Debug, Clone)]
enum AcControl {
    Slack {
        theta_deg: PointArray,
        p_guess: Option<PointArray>,
        p_bounds: Option<Bounds>,
    },
    Pv {
        p: PointArray,
    },
}

// Unknown order: [Ir, Ii, P, Q]
const IR: usize = 0;
const II: usize = 1;
const P: usize = 2;
const Q: usize = 3;

/// Generator on an AC bus.
///
/// Unknowns are the delivered current `Ir + j Ii` (as drawn from the bus, so
/// negative when generating) and the complex power `P + jQ` it draws.
#[derive(Debug, Clone)]
pub struct AcGenerator {
    name: String,
    /// Voltage magnitude set-point (V)
    pub vm: PointArray,
    control: AcControl,
    q_bounds: Option<Bounds>,
}

impl AcGenerator {
    /// Build from a mode and its set-point: phase in degrees for Slack, real
    /// power in watts for P-V.
    pub fn new(
        name: impl Into<String>,
        mode: GeneratorMode,
        vm: impl Into<PointArray>,
        setpoint: impl Into<PointArray>,
    ) -> DeviceResult<Self> {
        let vm = vm.into();
        check_param(&vm, |v| v > 0.0, "generator voltage set-point must be positive")?;
        let control = match mode {
            GeneratorMode::Slack => AcControl::Slack {
                theta_deg: setpoint.into(),
                p_guess: None,
                p_bounds: None,
            },
            GeneratorMode::Pv => AcControl::Pv { p: setpoint.into() },
        };
        Ok(Self {
            name: name.into(),
            vm,
            control,
            q_bounds: None,
        })
    }

    pub fn slack(
        name: impl Into<String>,
        vm: impl Into<PointArray>,
        theta_deg: impl Into<PointArray>,
    ) -> DeviceResult<Self> {
        Self::new(name, GeneratorMode::Slack, vm, theta_deg)
    }

    pub fn pv(
        name: impl Into<String>,
        vm: impl Into<PointArray>,
        p: impl Into<PointArray>,
    ) -> DeviceResult<Self> {
        Self::new(name, GeneratorMode::Pv, vm, p)
    }

    /// Starting real power for a slack generator. Ignored in P-V mode.
    pub fn with_power_guess(mut self, guess: impl Into<PointArray>) -> Self {
        if let AcControl::Slack { p_guess, .. } = &mut self.control {
            *p_guess = Some(guess.into());
        }
        self
    }

    /// Bound the real power. Only a slack generator has free real power.
    pub fn with_p_bounds(mut self, bounds: Bounds) -> DeviceResult<Self> {
        match &mut self.control {
            AcControl::Slack { p_bounds, .. } => {
                *p_bounds = Some(bounds);
                Ok(self)
            }
            AcControl::Pv { .. } => Err(DeviceError::InvalidArg {
                what: "P-V generator real power is fixed and cannot be bounded",
            }),
        }
    }

    pub fn with_q_bounds(mut self, bounds: Bounds) -> Self {
        self.q_bounds = Some(bounds);
        self
    }

    pub fn mode(&self) -> GeneratorMode {
        match self.control {
            AcControl::Slack { .. } => GeneratorMode::Slack,
            AcControl::Pv { .. } => GeneratorMode::Pv,
        }
    }

    fn initial_power(&self, point: usize, s_base: f64) -> f64 {
        match &self.control {
            AcControl::Slack { p_guess, .. } => p_guess
                .as_ref()
                .map_or_else(|| default_power_guess(s_base), |g| g.at(point)),
            AcControl::Pv { p } => p.at(point),
        }
    }
}

impl Device for AcGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Ac]
    }

    fn unknowns(&self) -> Vec<UnknownSpec> {
        let (phase_scale, p_bounds) = match &self.control {
            AcControl::Slack { p_bounds, .. } => (ResidualScale::Unity, p_bounds.clone()),
            AcControl::Pv { .. } => (ResidualScale::Power(0), None),
        };
        vec![
            UnknownSpec::new("Ir", Unit::Ampere, ResidualScale::Voltage(0)),
            UnknownSpec::new("Ii", Unit::Ampere, phase_scale),
            UnknownSpec::new("P", Unit::Watt, ResidualScale::Power(0)).bounded(p_bounds),
            UnknownSpec::new("Q", Unit::Var, ResidualScale::Power(0))
                .bounded(self.q_bounds.clone()),
        ]
    }

    fn partials(&self) -> Vec<Partial> {
        let mut out = vec![
            Partial::constant(Row::Current(0), Col::Unknown(IR), 1.0),
            Partial::constant(Row::Current(1), Col::Unknown(II), 1.0),
            Partial::varying(Row::Residual(0), Col::Voltage(0)),
            Partial::varying(Row::Residual(0), Col::Voltage(1)),
            Partial::varying(Row::Residual(1), Col::Voltage(0)),
            Partial::varying(Row::Residual(1), Col::Voltage(1)),
            Partial::constant(Row::Residual(P), Col::Unknown(P), -1.0),
            Partial::constant(Row::Residual(Q), Col::Unknown(Q), -1.0),
        ];
        if let AcControl::Pv { .. } = self.control {
            out.push(Partial::varying(Row::Residual(1), Col::Unknown(IR)));
            out.push(Partial::varying(Row::Residual(1), Col::Unknown(II)));
        }
        for row in [P, Q] {
            out.push(Partial::varying(Row::Residual(row), Col::Voltage(0)));
            out.push(Partial::varying(Row::Residual(row), Col::Voltage(1)));
            out.push(Partial::varying(Row::Residual(row), Col::Unknown(IR)));
            out.push(Partial::varying(Row::Residual(row), Col::Unknown(II)));
        }
        out
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        let mut out = vec![("Vm", &self.vm)];
        match &self.control {
            AcControl::Slack {
                theta_deg, p_guess, ..
            } => {
                out.push(("theta", theta_deg));
                if let Some(g) = p_guess {
                    out.push(("P guess", g));
                }
            }
            AcControl::Pv { p } => out.push(("P", p)),
        }
        out
    }

    fn guess(&self, point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, 0);
        let p0 = self.initial_power(point, terminals.bases[0].s());
        let s = Complex64::new(p0, p0 * pf_ratio(GUESS_POWER_FACTOR)?);
        let i = PowerCurrent::new(v, s, "generator terminal voltage")?.current;
        x[IR] = i.re;
        x[II] = i.im;
        x[P] = s.re;
        x[Q] = s.im;
        Ok(())
    }

    fn solve_local(&self, _point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, 0);
        let s = ComplexPower::new(v, Complex64::new(x[IR], x[II])).s;
        x[P] = s.re;
        x[Q] = s.im;
        Ok(())
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = phasor(terminals.voltages, 0);
        check_voltage(v.norm(), "generator terminal voltage")?;
        let i = Complex64::new(x[IR], x[II]);
        let power = ComplexPower::new(v, i);

        out.currents[0] = i.re;
        out.currents[1] = i.im;

        let jac = &mut out.jacobian;
        let (vm, dvm) = magnitude(v, "generator terminal voltage")?;
        out.residuals[0] = self.vm.at(point) - vm;
        jac.set(Row::Residual(0), Col::Voltage(0), -dvm[0]);
        jac.set(Row::Residual(0), Col::Voltage(1), -dvm[1]);

        match &self.control {
            AcControl::Slack { theta_deg, .. } => {
                let (phase, dphase) = phase_deg(v, "generator terminal voltage")?;
                out.residuals[1] = wrap_degrees(theta_deg.at(point) - phase);
                jac.set(Row::Residual(1), Col::Voltage(0), -dphase[0]);
                jac.set(Row::Residual(1), Col::Voltage(1), -dphase[1]);
            }
            AcControl::Pv { p } => {
                out.residuals[1] = p.at(point) - power.s.re;
                let cols = [Col::Voltage(0), Col::Voltage(1), Col::Unknown(IR), Col::Unknown(II)];
                for (col, d) in cols.into_iter().zip(power.dp) {
                    jac.set(Row::Residual(1), col, -d);
                }
            }
        }

        out.residuals[P] = power.s.re - x[P];
        out.residuals[Q] = power.s.im - x[Q];
        let cols = [Col::Voltage(0), Col::Voltage(1), Col::Unknown(IR), Col::Unknown(II)];
        for (k, col) in cols.into_iter().enumerate() {
            jac.set(Row::Residual(P), col, power.dp[k]);
            jac.set(Row::Residual(Q), col, power.dq[k]);
        }
        Ok(())
    }

    fn outputs(
        &self,
        _point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = phasor(terminals.voltages, 0);
        let s = ComplexPower::new(v, Complex64::new(x[IR], x[II])).s;
        Ok(vec![
            Output::new("P", Unit::Watt, s.re),
            Output::new("Q", Unit::Var, s.im),
            Output::new("Vm", Unit::Volt, v.norm()),
        ])
    }
}

/// Generator holding a DC bus at a voltage set-point.
///
/// Unknowns are the current `I` it draws and the power `P = V I` it draws.
#[derive(Debug, Clone)]
pub struct DcGenerator {
    name: String,
    /// Voltage set-point (V)
    pub v_set: PointArray,
    p_guess: Option<PointArray>,
    p_bounds: Option<Bounds>,
}

impl DcGenerator {
    pub fn new(name: impl Into<String>, v_set: impl Into<PointArray>) -> DeviceResult<Self> {
        let v_set = v_set.into();
        check_param(&v_set, |v| v > 0.0, "DC generator voltage set-point must be positive")?;
        Ok(Self {
            name: name.into(),
            v_set,
            p_guess: None,
            p_bounds: None,
        })
    }

    pub fn with_power_guess(mut self, guess: impl Into<PointArray>) -> Self {
        self.p_guess = Some(guess.into());
        self
    }

    pub fn with_p_bounds(mut self, bounds: Bounds) -> Self {
        self.p_bounds = Some(bounds);
        self
    }
}

impl Device for DcGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Dc]
    }

    fn unknowns(&self) -> Vec<UnknownSpec> {
        vec![
            UnknownSpec::new("I", Unit::Ampere, ResidualScale::Voltage(0)),
            UnknownSpec::new("P", Unit::Watt, ResidualScale::Power(0))
                .bounded(self.p_bounds.clone()),
        ]
    }

    fn partials(&self) -> Vec<Partial> {
        vec![
            Partial::constant(Row::Current(0), Col::Unknown(0), 1.0),
            Partial::constant(Row::Residual(0), Col::Voltage(0), -1.0),
            Partial::varying(Row::Residual(1), Col::Voltage(0)),
            Partial::varying(Row::Residual(1), Col::Unknown(0)),
            Partial::constant(Row::Residual(1), Col::Unknown(1), -1.0),
        ]
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        let mut out = vec![("V", &self.v_set)];
        if let Some(g) = &self.p_guess {
            out.push(("P guess", g));
        }
        out
    }

    fn guess(&self, point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        let v = terminals.voltages[0];
        check_voltage(v.abs(), "DC generator terminal voltage")?;
        let p = self
            .p_guess
            .as_ref()
            .map_or_else(|| default_power_guess(terminals.bases[0].s()), |g| g.at(point));
        x[0] = p / v;
        x[1] = p;
        Ok(())
    }

    fn solve_local(&self, _point: usize, terminals: Terminals<'_>, x: &mut [f64]) -> DeviceResult<()> {
        x[1] = terminals.voltages[0] * x[0];
        Ok(())
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = terminals.voltages[0];
        out.currents[0] = x[0];
        out.residuals[0] = self.v_set.at(point) - v;
        out.residuals[1] = v * x[0] - x[1];
        out.jacobian.set(Row::Residual(1), Col::Voltage(0), x[0]);
        out.jacobian.set(Row::Residual(1), Col::Unknown(0), v);
        Ok(())
    }

    fn outputs(
        &self,
        _point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        Ok(vec![Output::new("P", Unit::Watt, terminals.voltages[0] * x[0])])
    }
}
