//! AC and DC line models.
//!
//! Lines are explicit: no owned unknowns. The current drawn at the `in`
//! terminal is `Y (V_in - V_out)` and the `out` terminal draws the negative.

use gf_core::PointArray;
use gf_graph::BusKind;
use num_complex::Complex64;

use crate::common::{check_param, phasor};
use crate::error::{DeviceError, DeviceResult};
use crate::traits::{Col, Device, Evaluation, Output, Partial, Row, Terminals, Unit};

/// Flow through a line at one operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcLineFlow {
    pub i_in: Complex64,
    pub i_out: Complex64,
    pub s_in: Complex64,
    pub s_out: Complex64,
    pub loss: Complex64,
}

/// Sensitivity of the `in` current with respect to R and X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcLineSensitivity {
    pub di_dr: Complex64,
    pub di_dx: Complex64,
}

/// Series R + jX branch between two AC buses.
#[derive(Debug, Clone)]
pub struct AcLine {
    name: String,
    /// Resistance (ohm)
    pub r: PointArray,
    /// Reactance (ohm)
    pub x: PointArray,
}

impl AcLine {
    /// Create a line. R must be non-negative and R + jX must be non-zero at every point.
    pub fn new(
        name: impl Into<String>,
        r: impl Into<PointArray>,
        x: impl Into<PointArray>,
    ) -> DeviceResult<Self> {
        let r = r.into();
        let x = x.into();
        check_param(&r, |v| v >= 0.0, "line resistance must be non-negative")?;
        if !r.is_broadcast() && !x.is_broadcast() {
            x.check_len(r.len(), "line reactance")?;
        }
        let n = r.len().max(x.len());
        if (0..n).any(|p| r.at(p) == 0.0 && x.at(p) == 0.0) {
            return Err(DeviceError::NonPhysical {
                what: "line impedance must be non-zero",
            });
        }
        Ok(Self {
            name: name.into(),
            r,
            x,
        })
    }

    pub fn impedance(&self, point: usize) -> Complex64 {
        Complex64::new(self.r.at(point), self.x.at(point))
    }

    pub fn admittance(&self, point: usize) -> Complex64 {
        self.impedance(point).inv()
    }

    pub fn flow(&self, point: usize, v_in: Complex64, v_out: Complex64) -> AcLineFlow {
        let i_in = self.admittance(point) * (v_in - v_out);
        let i_out = -i_in;
        let s_in = v_in * i_in.conj();
        let s_out = v_out * i_out.conj();
        AcLineFlow {
            i_in,
            i_out,
            s_in,
            s_out,
            loss: s_in + s_out,
        }
    }

    /// dI_in/dR and dI_in/dX from dY/dR = -1/Z^2 and dY/dX = -j/Z^2.
    pub fn sensitivity(
        &self,
        point: usize,
        v_in: Complex64,
        v_out: Complex64,
    ) -> AcLineSensitivity {
        let z = self.impedance(point);
        let dv = v_in - v_out;
        let inv_z2 = (z * z).inv();
        AcLineSensitivity {
            di_dr: -inv_z2 * dv,
            di_dx: -Complex64::i() * inv_z2 * dv,
        }
    }
}

impl Device for AcLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Ac, BusKind::Ac]
    }

    fn partials(&self) -> Vec<Partial> {
        let mut out = Vec::with_capacity(16);
        for row in 0..4 {
            for col in 0..4 {
                out.push(Partial::varying(Row::Current(row), Col::Voltage(col)));
            }
        }
        out
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        vec![("R", &self.r), ("X", &self.x)]
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = terminals.voltages;
        let flow = self.flow(point, phasor(v, 0), phasor(v, 2));
        out.currents[0] = flow.i_in.re;
        out.currents[1] = flow.i_in.im;
        out.currents[2] = flow.i_out.re;
        out.currents[3] = flow.i_out.im;

        // dI/dVr = Y, dI/dVi = jY; the out terminal and the out voltage flip signs
        let y = self.admittance(point);
        let (g, b) = (y.re, y.im);
        for (row_re, row_im, row_sign) in [(0, 1, 1.0), (2, 3, -1.0)] {
            for (col_re, col_im, col_sign) in [(0, 1, 1.0), (2, 3, -1.0)] {
                let s = row_sign * col_sign;
                let jac = &mut out.jacobian;
                jac.set(Row::Current(row_re), Col::Voltage(col_re), s * g);
                jac.set(Row::Current(row_re), Col::Voltage(col_im), -s * b);
                jac.set(Row::Current(row_im), Col::Voltage(col_re), s * b);
                jac.set(Row::Current(row_im), Col::Voltage(col_im), s * g);
            }
        }
        Ok(())
    }

    fn outputs(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = terminals.voltages;
        let flow = self.flow(point, phasor(v, 0), phasor(v, 2));
        Ok(vec![
            Output::new("P_in", Unit::Watt, flow.s_in.re),
            Output::new("Q_in", Unit::Var, flow.s_in.im),
            Output::new("P_out", Unit::Watt, flow.s_out.re),
            Output::new("Q_out", Unit::Var, flow.s_out.im),
            Output::new("P_loss", Unit::Watt, flow.loss.re),
            Output::new("Q_loss", Unit::Var, flow.loss.im),
        ])
    }
}

/// Resistive branch between two DC buses.
#[derive(Debug, Clone)]
pub struct DcLine {
    name: String,
    /// Resistance (ohm)
    pub r: PointArray,
}

impl DcLine {
    pub fn new(name: impl Into<String>, r: impl Into<PointArray>) -> DeviceResult<Self> {
        let r = r.into();
        check_param(&r, |v| v > 0.0, "DC line resistance must be positive")?;
        Ok(Self {
            name: name.into(),
            r,
        })
    }

    /// Current drawn at the `in` terminal.
    pub fn current(&self, point: usize, v_in: f64, v_out: f64) -> f64 {
        (v_in - v_out) / self.r.at(point)
    }
}

impl Device for DcLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Dc, BusKind::Dc]
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
        vec![("R", &self.r)]
    }

    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        let v = terminals.voltages;
        let i = self.current(point, v[0], v[1]);
        out.currents[0] = i;
        out.currents[1] = -i;

        let g = 1.0 / self.r.at(point);
        let jac = &mut out.jacobian;
        jac.set(Row::Current(0), Col::Voltage(0), g);
        jac.set(Row::Current(0), Col::Voltage(1), -g);
        jac.set(Row::Current(1), Col::Voltage(0), -g);
        jac.set(Row::Current(1), Col::Voltage(1), g);
        Ok(())
    }

    fn outputs(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = terminals.voltages;
        let i = self.current(point, v[0], v[1]);
        let p_in = v[0] * i;
        let p_out = -v[1] * i;
        Ok(vec![
            Output::new("I", Unit::Ampere, i),
            Output::new("P_in", Unit::Watt, p_in),
            Output::new("P_out", Unit::Watt, p_out),
            Output::new("P_loss", Unit::Watt, p_in + p_out),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_impedance_is_rejected() {
        assert!(matches!(
            AcLine::new("bad", 0.0, 0.0),
            Err(DeviceError::NonPhysical { .. })
        ));
        assert!(AcLine::new("neg", -0.1, 0.2).is_err());
        assert!(AcLine::new("pure reactance", 0.0, 0.2).is_ok());
        assert!(DcLine::new("bad", 0.0).is_err());

        let r = PointArray::new(vec![0.1, 0.0]).unwrap();
        let x = PointArray::new(vec![0.0, 0.0]).unwrap();
        assert!(AcLine::new("second point shorted", r, x).is_err());
    }

    #[test]
    fn flow_matches_ohms_law() {
        let line = AcLine::new("L", 0.02, 0.04).unwrap();
        let v_in = Complex64::new(1.05, 0.0);
        let v_out = Complex64::new(0.98, -0.06);
        let flow = line.flow(0, v_in, v_out);
        let expected = (v_in - v_out) / Complex64::new(0.02, 0.04);
        assert!((flow.i_in - expected).norm() < 1e-12);
        // I^2 R loss
        assert!((flow.loss.re - flow.i_in.norm_sqr() * 0.02).abs() < 1e-9);
        assert!((flow.loss.im - flow.i_in.norm_sqr() * 0.04).abs() < 1e-9);
    }

    #[test]
    fn sensitivity_matches_finite_difference() {
        let v_in = Complex64::new(4100.0, -120.0);
        let v_out = Complex64::new(3980.0, -310.0);
        let line = AcLine::new("L", 0.3, 0.7).unwrap();
        let sens = line.sensitivity(0, v_in, v_out);

        let h = 1e-7;
        let dr = (AcLine::new("L", 0.3 + h, 0.7).unwrap().flow(0, v_in, v_out).i_in
            - AcLine::new("L", 0.3 - h, 0.7).unwrap().flow(0, v_in, v_out).i_in)
            / (2.0 * h);
        let dx = (AcLine::new("L", 0.3, 0.7 + h).unwrap().flow(0, v_in, v_out).i_in
            - AcLine::new("L", 0.3, 0.7 - h).unwrap().flow(0, v_in, v_out).i_in)
            / (2.0 * h);
        assert!((sens.di_dr - dr).norm() < 1e-4 * dr.norm());
        assert!((sens.di_dx - dx).norm() < 1e-4 * dx.norm());
    }

    #[test]
    fn dc_line_outputs() {
        let line = DcLine::new("D", 0.5).unwrap();
        let bases = [];
        let v = [6800.0, 6790.0];
        let outputs = line
            .outputs(
                0,
                Terminals {
                    voltages: &v,
                    bases: &bases,
                },
                &[],
            )
            .unwrap();
        let loss = outputs.iter().find(|o| o.name == "P_loss").unwrap().value;
        assert!((loss - 20.0 * 20.0 * 0.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn equal_terminal_voltages_carry_no_loss(
            vr in -1.0e4_f64..1.0e4,
            vi in -1.0e4_f64..1.0e4,
            r in 0.0_f64..10.0,
            x in 1.0e-3_f64..10.0,
        ) {
            let line = AcLine::new("L", r, x).unwrap();
            let v = Complex64::new(vr, vi);
            let flow = line.flow(0, v, v);
            prop_assert_eq!(flow.loss.re, 0.0);
            prop_assert_eq!(flow.loss.im, 0.0);
            prop_assert_eq!(flow.i_in.re, -flow.i_out.re);
            prop_assert_eq!(flow.i_in.im, -flow.i_out.im);
        }

        #[test]
        fn dc_equal_voltages_carry_no_current(v in 1.0_f64..1.0e4, r in 1.0e-3_f64..10.0) {
            let line = DcLine::new("D", r).unwrap();
            prop_assert_eq!(line.current(0, v, v), 0.0);
        }
    }
}
