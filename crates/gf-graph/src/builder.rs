//! Incremental graph builder.

use std::collections::HashMap;

use gf_core::{BusId, DeviceId, TerminalId};

use crate::error::GraphResult;
use crate::graph::{Bus, BusBase, BusKind, Element, Graph, Terminal};
use crate::validate;

/// Builder for constructing a graph incrementally.
///
/// Use `add_bus` and `add_element` to build up the network,
/// then call `build()` to validate and freeze it into an immutable `Graph`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    buses: Vec<Bus>,
    elements: Vec<Element>,
    terminals: Vec<Terminal>,
    next_bus_id: u32,
    next_element_id: u32,
    next_terminal_id: u32,
}

impl GraphBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bus to the graph and return its ID.
    pub fn add_bus(&mut self, name: impl Into<String>, kind: BusKind, base: BusBase) -> BusId {
        let id = BusId::from_index(self.next_bus_id);
        self.next_bus_id += 1;
        self.buses.push(Bus {
            id,
            name: name.into(),
            kind,
            base,
        });
        id
    }

    /// Add an element attached to `buses`, in terminal order.
    ///
    /// Creates one terminal per bus. Returns the element ID.
    pub fn add_element(&mut self, name: impl Into<String>, buses: &[BusId]) -> DeviceId {
        let element_id = DeviceId::from_index(self.next_element_id);
        self.next_element_id += 1;

        let mut terminals = Vec::with_capacity(buses.len());
        for (slot, &bus) in buses.iter().enumerate() {
            let terminal_id = TerminalId::from_index(self.next_terminal_id);
            self.next_terminal_id += 1;
            self.terminals.push(Terminal {
                id: terminal_id,
                element: element_id,
                bus,
                slot,
            });
            terminals.push(terminal_id);
        }

        self.elements.push(Element {
            id: element_id,
            name: name.into(),
            terminals,
        });

        element_id
    }

    /// Build and validate the graph, returning an immutable `Graph`.
    ///
    /// This performs validation and constructs compact adjacency lists.
    pub fn build(self) -> GraphResult<Graph> {
        validate::validate_structure(&self.buses, &self.elements, &self.terminals)?;

        let (bus_terminal_offsets, bus_terminals) =
            Self::build_adjacency(&self.buses, &self.terminals);

        validate::validate_adjacency(
            &self.buses,
            &self.terminals,
            &bus_terminal_offsets,
            &bus_terminals,
        )?;
        validate::validate_connectivity(&self.buses, &bus_terminal_offsets)?;

        Ok(Graph {
            buses: self.buses,
            elements: self.elements,
            terminals: self.terminals,
            bus_terminal_offsets,
            bus_terminals,
        })
    }

    /// Build compact adjacency lists: for each bus, collect its incident terminals.
    fn build_adjacency(buses: &[Bus], terminals: &[Terminal]) -> (Vec<usize>, Vec<TerminalId>) {
        let mut bus_to_terminals: HashMap<BusId, Vec<TerminalId>> = HashMap::new();
        for terminal in terminals {
            bus_to_terminals
                .entry(terminal.bus)
                .or_default()
                .push(terminal.id);
        }

        // Sort each bus's terminal list for determinism
        for list in bus_to_terminals.values_mut() {
            list.sort_by_key(|t| t.index());
        }

        let mut offsets = Vec::with_capacity(buses.len() + 1);
        let mut flat = Vec::new();
        offsets.push(0);

        for bus in buses {
            if let Some(list) = bus_to_terminals.get(&bus.id) {
                flat.extend_from_slice(list);
            }
            offsets.push(flat.len());
        }

        (offsets, flat)
    }
}
