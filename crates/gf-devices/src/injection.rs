//! Fixed current injections.
//!
//! An injection delivers a prescribed current into its bus, so the current it
//! draws is the negative of the injected value and carries no partials.

use gf_core::PointArray;
use gf_graph::BusKind;

use crate::error::DeviceResult;
use crate::traits::{Device, Evaluation, Output, Partial, Terminals, Unit};

/// Current source injecting `I_re + j I_im` into an AC bus.
#[derive(Debug, Clone)]
pub struct AcCurrentInjection {
    name: String,
    /// Injected real current (A)
    pub i_re: PointArray,
    /// Injected imaginary current (A)
    pub i_im: PointArray,
}

impl AcCurrentInjection {
    pub fn new(
        name: impl Into<String>,
        i_re: impl Into<PointArray>,
        i_im: impl Into<PointArray>,
    ) -> Self {
        Self {
            name: name.into(),
            i_re: i_re.into(),
            i_im: i_im.into(),
        }
    }
}

impl Device for AcCurrentInjection {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Ac]
    }

    fn partials(&self) -> Vec<Partial> {
        Vec::new()
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        vec![("I_re", &self.i_re), ("I_im", &self.i_im)]
    }

    fn evaluate(
        &self,
        point: usize,
        _terminals: Terminals<'_>,
        _x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        out.currents[0] = -self.i_re.at(point);
        out.currents[1] = -self.i_im.at(point);
        Ok(())
    }

    fn outputs(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        let v = terminals.voltages;
        let (ir, ii) = (self.i_re.at(point), self.i_im.at(point));
        // S delivered = V * conj(I_injected)
        Ok(vec![
            Output::new("P", Unit::Watt, v[0] * ir + v[1] * ii),
            Output::new("Q", Unit::Var, v[1] * ir - v[0] * ii),
        ])
    }
}

/// Current source injecting `I` into a DC bus.
#[derive(Debug, Clone)]
pub struct DcCurrentInjection {
    name: String,
    /// Injected current (A)
    pub i: PointArray,
}

impl DcCurrentInjection {
    pub fn new(name: impl Into<String>, i: impl Into<PointArray>) -> Self {
        Self {
            name: name.into(),
            i: i.into(),
        }
    }
}

impl Device for DcCurrentInjection {
    fn name(&self) -> &str {
        &self.name
    }

    fn terminal_kinds(&self) -> &'static [BusKind] {
        &[BusKind::Dc]
    }

    fn partials(&self) -> Vec<Partial> {
        Vec::new()
    }

    fn parameters(&self) -> Vec<(&'static str, &PointArray)> {
        vec![("I", &self.i)]
    }

    fn evaluate(
        &self,
        point: usize,
        _terminals: Terminals<'_>,
        _x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()> {
        out.currents[0] = -self.i.at(point);
        Ok(())
    }

    fn outputs(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        Ok(vec![Output::new(
            "P",
            Unit::Watt,
            terminals.voltages[0] * self.i.at(point),
        )])
    }
}
