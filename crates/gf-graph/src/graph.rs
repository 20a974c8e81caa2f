//! Core graph data structures.

use gf_core::units::{Power, Voltage};
use gf_core::{BusId, DeviceId, GfError, GfResult, Real, TerminalId};

/// Electrical kind of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusKind {
    /// Phasor voltage, stored as (real, imaginary).
    Ac,
    /// Scalar voltage.
    Dc,
}

impl BusKind {
    /// Number of scalar voltage components (and balance equations) on a bus of this kind.
    pub fn width(self) -> usize {
        match self {
            BusKind::Ac => 2,
            BusKind::Dc => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BusKind::Ac => "AC",
            BusKind::Dc => "DC",
        }
    }
}

/// Per-unit base of a bus, used to scale every equation that lives on it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusBase {
    pub voltage: Voltage,
    pub power: Power,
}

impl BusBase {
    /// Create a base; both values must be positive and finite.
    pub fn new(voltage: Voltage, power: Power) -> GfResult<Self> {
        for (value, what) in [
            (voltage.value, "base voltage"),
            (power.value, "base power"),
        ] {
            gf_core::ensure_finite(value, what)?;
            if value <= 0.0 {
                return Err(GfError::InvalidArg {
                    what: "bus base values must be positive",
                });
            }
        }
        Ok(Self { voltage, power })
    }

    /// Base voltage in volts.
    pub fn v(&self) -> Real {
        self.voltage.value
    }

    /// Base power in watts (or VA).
    pub fn s(&self) -> Real {
        self.power.value
    }

    /// Base current in amperes.
    pub fn i(&self) -> Real {
        self.s() / self.v()
    }
}

/// A bus: a point where attached devices share one voltage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub kind: BusKind,
    pub base: BusBase,
}

/// A terminal connects one slot of an element to a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Terminal {
    pub id: TerminalId,
    pub element: DeviceId,
    pub bus: BusId,
    /// Position of this terminal in its element's terminal list.
    pub slot: usize,
}

/// A network element (line, load, generator, converter...) by topology only.
///
/// The device model attached to it lives in the solver problem; the graph only
/// knows which buses it touches and in which order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Element {
    pub id: DeviceId,
    pub name: String,
    pub terminals: Vec<TerminalId>,
}

/// The graph: a validated, immutable collection of buses, elements, and terminals.
///
/// Buses are an arena addressed by `BusId`; elements hold ids, never buses.
/// Bus to terminal adjacency is stored compactly (CSR offsets).
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) buses: Vec<Bus>,
    pub(crate) elements: Vec<Element>,
    pub(crate) terminals: Vec<Terminal>,

    /// Bus i's terminals are in bus_terminals[bus_terminal_offsets[i]..bus_terminal_offsets[i+1]].
    pub(crate) bus_terminal_offsets: Vec<usize>,

    /// Flat list of terminal IDs incident to buses (sorted by bus then terminal).
    pub(crate) bus_terminals: Vec<TerminalId>,
}

impl Graph {
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// Get a bus by ID (returns None if ID out of bounds).
    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.slot())
    }

    /// Get an element by ID (returns None if ID out of bounds).
    pub fn element(&self, id: DeviceId) -> Option<&Element> {
        self.elements.get(id.slot())
    }

    pub fn terminal(&self, id: TerminalId) -> Option<&Terminal> {
        self.terminals.get(id.slot())
    }

    /// Terminal IDs incident to a bus.
    pub fn bus_terminals(&self, bus: BusId) -> &[TerminalId] {
        let idx = bus.slot();
        if idx >= self.buses.len() {
            return &[];
        }
        let start = self.bus_terminal_offsets[idx];
        let end = self.bus_terminal_offsets[idx + 1];
        &self.bus_terminals[start..end]
    }

    /// Bus attached to terminal `slot` of an element.
    pub fn element_bus(&self, element: DeviceId, slot: usize) -> Option<BusId> {
        let elem = self.element(element)?;
        let terminal = self.terminal(*elem.terminals.get(slot)?)?;
        Some(terminal.bus)
    }

    /// All buses of an element, in terminal order.
    pub fn element_buses(&self, element: DeviceId) -> Option<Vec<BusId>> {
        let elem = self.element(element)?;
        elem.terminals
            .iter()
            .map(|&t| self.terminal(t).map(|term| term.bus))
            .collect()
    }

    /// Find a bus by name.
    pub fn bus_by_name(&self, name: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.name == name)
    }

    /// Find an element by name.
    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::Id;
    use gf_core::units::{megawatts, volts};

    #[test]
    fn bus_kind_width() {
        assert_eq!(BusKind::Ac.width(), 2);
        assert_eq!(BusKind::Dc.width(), 1);
        assert_ne!(BusKind::Ac, BusKind::Dc);
    }

    #[test]
    fn base_current() {
        let base = BusBase::new(volts(5000.0), megawatts(10.0)).unwrap();
        assert_eq!(base.i(), 2000.0);
    }

    #[test]
    fn base_rejects_non_positive() {
        assert!(BusBase::new(volts(0.0), megawatts(10.0)).is_err());
        assert!(BusBase::new(volts(4160.0), megawatts(-1.0)).is_err());
        assert!(BusBase::new(volts(f64::NAN), megawatts(1.0)).is_err());
    }

    #[test]
    fn element_terminal_order() {
        let elem = Element {
            id: Id::from_index(0),
            name: "Line".into(),
            terminals: vec![Id::from_index(10), Id::from_index(11)],
        };
        assert_eq!(elem.terminals[0].index(), 10);
        assert_eq!(elem.terminals[1].index(), 11);
    }
}
