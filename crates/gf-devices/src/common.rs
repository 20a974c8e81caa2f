//! Common utilities for device equations.

use gf_core::PointArray;
use num_complex::Complex64;

use crate::error::{DeviceError, DeviceResult};

/// Smallest voltage magnitude (V) a device will divide by.
pub const EPSILON_VOLTAGE: f64 = 1e-9;

/// Power factor assumed when a device has to invent a starting current.
pub const GUESS_POWER_FACTOR: f64 = 0.95;

/// Share of the bus base power used as a default power guess.
pub const DEFAULT_GUESS_FRACTION: f64 = 0.1;

/// Reject a parameter array containing a value that fails `pred`.
pub fn check_param(
    values: &PointArray,
    pred: impl Fn(f64) -> bool,
    what: &'static str,
) -> DeviceResult<()> {
    if values.all(pred) {
        Ok(())
    } else {
        Err(DeviceError::NonPhysical { what })
    }
}

/// Guard against dividing by a collapsed voltage.
pub fn check_voltage(magnitude: f64, what: &'static str) -> DeviceResult<()> {
    if magnitude.is_finite() && magnitude > EPSILON_VOLTAGE {
        Ok(())
    } else {
        Err(DeviceError::Singular { what })
    }
}

/// Read an AC phasor from two consecutive voltage slots.
pub fn phasor(v: &[f64], slot: usize) -> Complex64 {
    Complex64::new(v[slot], v[slot + 1])
}

/// Reactive-to-active power ratio `tan(acos(pf))` of a power factor.
pub fn pf_ratio(pf: f64) -> DeviceResult<f64> {
    if !pf.is_finite() || pf.abs() > 1.0 || pf == 0.0 {
        return Err(DeviceError::Domain {
            what: "power factor outside [-1, 0) U (0, 1]",
            value: pf,
        });
    }
    Ok((1.0 / (pf * pf) - 1.0).sqrt())
}

/// Phase angle `acos(pf)` in radians.
pub fn pf_angle(pf: f64) -> DeviceResult<f64> {
    if !pf.is_finite() || pf.abs() > 1.0 {
        return Err(DeviceError::Domain {
            what: "power factor outside [-1, 1]",
            value: pf,
        });
    }
    Ok(pf.acos())
}

/// Default power guess for a device on a bus with base power `s_base`.
pub fn default_power_guess(s_base: f64) -> f64 {
    -DEFAULT_GUESS_FRACTION * s_base
}

/// Complex power `S = V * conj(I)` with its partials.
///
/// Partial arrays are ordered `[Vr, Vi, Ir, Ii]`.
#[derive(Debug, Clone, Copy)]
pub struct ComplexPower {
    pub s: Complex64,
    pub dp: [f64; 4],
    pub dq: [f64; 4],
}

impl ComplexPower {
    pub fn new(v: Complex64, i: Complex64) -> Self {
        let s = v * i.conj();
        Self {
            s,
            dp: [i.re, i.im, v.re, v.im],
            dq: [-i.im, i.re, v.im, -v.re],
        }
    }
}

/// Current `I = conj(S / V)` drawn by a fixed complex power, with its partials.
#[derive(Debug, Clone, Copy)]
pub struct PowerCurrent {
    pub current: Complex64,
    pub d_vr: Complex64,
    pub d_vi: Complex64,
    pub d_p: Complex64,
    pub d_q: Complex64,
}

impl PowerCurrent {
    pub fn new(v: Complex64, s: Complex64, what: &'static str) -> DeviceResult<Self> {
        check_voltage(v.norm(), what)?;
        let v_conj = v.conj();
        let v_conj_sq = v_conj * v_conj;
        let s_conj = s.conj();
        Ok(Self {
            current: s_conj / v_conj,
            d_vr: -s_conj / v_conj_sq,
            d_vi: Complex64::i() * s_conj / v_conj_sq,
            d_p: 1.0 / v_conj,
            d_q: -Complex64::i() / v_conj,
        })
    }
}

/// Magnitude of a phasor and its partials `[d/dVr, d/dVi]`.
pub fn magnitude(v: Complex64, what: &'static str) -> DeviceResult<(f64, [f64; 2])> {
    let vm = v.norm();
    check_voltage(vm, what)?;
    Ok((vm, [v.re / vm, v.im / vm]))
}

/// Phase of a phasor in degrees and its partials `[d/dVr, d/dVi]`.
pub fn phase_deg(v: Complex64, what: &'static str) -> DeviceResult<(f64, [f64; 2])> {
    check_voltage(v.norm(), what)?;
    let vm2 = v.norm_sqr();
    Ok((
        v.im.atan2(v.re).to_degrees(),
        [(-v.im / vm2).to_degrees(), (v.re / vm2).to_degrees()],
    ))
}
