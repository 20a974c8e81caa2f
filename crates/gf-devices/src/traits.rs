//! Core traits and declaration types for device models.
//!
//! A device sees its terminal voltages as a flat slice of *voltage slots*: an
//! AC terminal contributes `(Re V, Im V)`, a DC terminal contributes `V`, in
//! terminal order. It writes back one current per slot (the current drawn from
//! the bus into the device), one residual per owned unknown, and the entries of
//! its local Jacobian block.

use gf_core::{Bounds, PointArray};
use gf_graph::{BusBase, BusKind};

use crate::error::DeviceResult;

/// Physical unit of a device unknown or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Volt,
    Ampere,
    Watt,
    Var,
    Degree,
    Radian,
    Unitless,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::Var => "var",
            Unit::Degree => "deg",
            Unit::Radian => "rad",
            Unit::Unitless => "",
        }
    }
}

/// Reference value an unknown's residual is divided by.
///
/// The terminal index selects which bus base applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualScale {
    Voltage(usize),
    Current(usize),
    Power(usize),
    Unity,
}

impl ResidualScale {
    /// Resolve against the bases of the device's terminal buses.
    pub fn reference(self, bases: &[BusBase]) -> f64 {
        match self {
            ResidualScale::Voltage(t) => bases[t].v(),
            ResidualScale::Current(t) => bases[t].i(),
            ResidualScale::Power(t) => bases[t].s(),
            ResidualScale::Unity => 1.0,
        }
    }
}

/// Declaration of one device-owned unknown (and its residual row).
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownSpec {
    pub name: &'static str,
    pub unit: Unit,
    pub scale: ResidualScale,
    pub bounds: Option<Bounds>,
}

impl UnknownSpec {
    pub fn new(name: &'static str, unit: Unit, scale: ResidualScale) -> Self {
        Self {
            name,
            unit,
            scale,
            bounds: None,
        }
    }

    pub fn bounded(mut self, bounds: Option<Bounds>) -> Self {
        self.bounds = bounds;
        self
    }
}

/// Row of a device's local Jacobian block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Row {
    /// Current written into voltage slot `n`'s bus balance.
    Current(usize),
    /// Residual of owned unknown `n`.
    Residual(usize),
}

/// Column of a device's local Jacobian block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Col {
    /// Terminal voltage slot `n`.
    Voltage(usize),
    /// Owned unknown `n`.
    Unknown(usize),
}

/// One declared entry of the sparse partial-derivative pattern.
///
/// `constant` entries are filled once and never written by `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub row: Row,
    pub col: Col,
    pub constant: Option<f64>,
}

impl Partial {
    pub fn varying(row: Row, col: Col) -> Self {
        Self {
            row,
            col,
            constant: None,
        }
    }

    pub fn constant(row: Row, col: Col, value: f64) -> Self {
        Self {
            row,
            col,
            constant: Some(value),
        }
    }
}

/// Values of a device's local Jacobian block, laid out on its declared pattern.
#[derive(Debug, Clone)]
pub struct LocalJacobian {
    pattern: Vec<(Row, Col)>,
    constants: Vec<Option<f64>>,
    values: Vec<f64>,
    undeclared: Vec<(Row, Col)>,
}

impl LocalJacobian {
    /// Build from a declaration list. Duplicate pairs keep their first entry.
    pub fn from_partials(partials: &[Partial]) -> Self {
        let mut sorted: Vec<Partial> = partials.to_vec();
        sorted.sort_by_key(|p| (p.row, p.col));
        sorted.dedup_by_key(|p| (p.row, p.col));

        let pattern = sorted.iter().map(|p| (p.row, p.col)).collect();
        let constants: Vec<Option<f64>> = sorted.iter().map(|p| p.constant).collect();
        let values = constants.iter().map(|c| c.unwrap_or(0.0)).collect();
        Self {
            pattern,
            constants,
            values,
            undeclared: Vec::new(),
        }
    }

    /// Restore constants and zero every varying entry.
    pub fn reset(&mut self) {
        for (v, c) in self.values.iter_mut().zip(&self.constants) {
            *v = c.unwrap_or(0.0);
        }
        self.undeclared.clear();
    }

    /// Write a varying entry. Writes outside the pattern are recorded, not stored.
    pub fn set(&mut self, row: Row, col: Col, value: f64) {
        match self.pattern.binary_search(&(row, col)) {
            Ok(k) => self.values[k] = value,
            Err(_) => self.undeclared.push((row, col)),
        }
    }

    pub fn get(&self, row: Row, col: Col) -> Option<f64> {
        self.pattern
            .binary_search(&(row, col))
            .ok()
            .map(|k| self.values[k])
    }

    pub fn pattern(&self) -> &[(Row, Col)] {
        &self.pattern
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn entries(&self) -> impl Iterator<Item = (Row, Col, f64)> + '_ {
        self.pattern
            .iter()
            .zip(&self.values)
            .map(|(&(r, c), &v)| (r, c, v))
    }

    /// Entries written by `evaluate` that were never declared.
    pub fn undeclared(&self) -> &[(Row, Col)] {
        &self.undeclared
    }
}

/// Output buffer of one device evaluation at one operating point.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Current per voltage slot, drawn from the bus into the device.
    pub currents: Vec<f64>,
    /// Residual per owned unknown (unscaled).
    pub residuals: Vec<f64>,
    pub jacobian: LocalJacobian,
}

impl Evaluation {
    pub fn for_device(device: &dyn Device) -> Self {
        Self {
            currents: vec![0.0; voltage_slots(device.terminal_kinds())],
            residuals: vec![0.0; device.unknowns().len()],
            jacobian: LocalJacobian::from_partials(&device.partials()),
        }
    }

    pub fn reset(&mut self) {
        self.currents.iter_mut().for_each(|c| *c = 0.0);
        self.residuals.iter_mut().for_each(|r| *r = 0.0);
        self.jacobian.reset();
    }
}

/// What a device can see of its terminals at one operating point.
#[derive(Debug, Clone, Copy)]
pub struct Terminals<'a> {
    /// Voltage slots in terminal order.
    pub voltages: &'a [f64],
    /// Base of each terminal's bus.
    pub bases: &'a [BusBase],
}

/// A computed, reportable device quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Output {
    pub name: &'static str,
    pub unit: Unit,
    pub value: f64,
}

impl Output {
    pub fn new(name: &'static str, unit: Unit, value: f64) -> Self {
        Self { name, unit, value }
    }
}

/// Number of voltage slots for a terminal kind list.
pub fn voltage_slots(kinds: &[BusKind]) -> usize {
    kinds.iter().map(|k| k.width()).sum()
}

/// A network device contributing currents and equations to the load flow.
///
/// Devices are deterministic functions of their terminal voltages, their own
/// unknowns, and their parameters at one operating point, suitable for
/// parallel evaluation across points.
pub trait Device: Send + Sync {
    /// Device name for debugging and identification.
    fn name(&self) -> &str;

    /// Bus kind required at each terminal, in terminal order.
    fn terminal_kinds(&self) -> &'static [BusKind];

    /// Owned unknowns. Explicit devices have none.
    fn unknowns(&self) -> Vec<UnknownSpec> {
        Vec::new()
    }

    /// Sparse pattern of the local Jacobian block, declared once.
    fn partials(&self) -> Vec<Partial>;

    /// Named per-point parameters, for point-count validation.
    fn parameters(&self) -> Vec<(&'static str, &PointArray)>;

    /// Verify every parameter is finite and every parameter and bound fits
    /// `num_points` operating points.
    fn check_points(&self, num_points: usize) -> DeviceResult<()> {
        for (what, values) in self.parameters() {
            values.check_finite(what)?;
            values.check_len(num_points, what)?;
        }
        for spec in self.unknowns() {
            if let Some(bounds) = &spec.bounds {
                bounds.check_len(num_points)?;
            }
        }
        Ok(())
    }

    /// Starting values for owned unknowns, before the first iteration.
    fn guess(&self, _point: usize, _terminals: Terminals<'_>, _x: &mut [f64]) -> DeviceResult<()> {
        Ok(())
    }

    /// Make dependent unknowns consistent with the current iterate.
    ///
    /// Called on sub-solve iterations only. Default is a no-op.
    fn solve_local(
        &self,
        _point: usize,
        _terminals: Terminals<'_>,
        _x: &mut [f64],
    ) -> DeviceResult<()> {
        Ok(())
    }

    /// Evaluate currents, residuals and local partials.
    fn evaluate(
        &self,
        point: usize,
        terminals: Terminals<'_>,
        x: &[f64],
        out: &mut Evaluation,
    ) -> DeviceResult<()>;

    /// Derived quantities for reporting. Default is none.
    fn outputs(
        &self,
        _point: usize,
        _terminals: Terminals<'_>,
        _x: &[f64],
    ) -> DeviceResult<Vec<Output>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_jacobian_constants_survive_reset() {
        let mut jac = LocalJacobian::from_partials(&[
            Partial::varying(Row::Residual(0), Col::Voltage(0)),
            Partial::constant(Row::Current(0), Col::Unknown(0), 1.0),
        ]);
        jac.set(Row::Residual(0), Col::Voltage(0), 3.5);
        assert_eq!(jac.get(Row::Residual(0), Col::Voltage(0)), Some(3.5));
        jac.reset();
        assert_eq!(jac.get(Row::Residual(0), Col::Voltage(0)), Some(0.0));
        assert_eq!(jac.get(Row::Current(0), Col::Unknown(0)), Some(1.0));
    }

    #[test]
    fn undeclared_writes_are_recorded() {
        let mut jac =
            LocalJacobian::from_partials(&[Partial::varying(Row::Residual(0), Col::Unknown(0))]);
        jac.set(Row::Residual(1), Col::Unknown(0), 1.0);
        assert_eq!(jac.undeclared(), &[(Row::Residual(1), Col::Unknown(0))]);
        assert_eq!(jac.get(Row::Residual(1), Col::Unknown(0)), None);
    }

    #[test]
    fn duplicate_declarations_collapse() {
        let jac = LocalJacobian::from_partials(&[
            Partial::varying(Row::Current(0), Col::Voltage(1)),
            Partial::varying(Row::Current(0), Col::Voltage(1)),
        ]);
        assert_eq!(jac.pattern().len(), 1);
    }

    #[test]
    fn slots_per_kind() {
        assert_eq!(voltage_slots(&[BusKind::Ac, BusKind::Dc]), 3);
        assert_eq!(voltage_slots(&[BusKind::Dc, BusKind::Dc]), 2);
    }
}
