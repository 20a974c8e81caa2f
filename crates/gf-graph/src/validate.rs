//! Graph validation logic.

use std::collections::HashSet;

use gf_core::{BusId, DeviceId, TerminalId};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Bus, BusKind, Element, Graph, Terminal};

/// Validate the graph structure: all references exist, terminals are consistent, etc.
pub(crate) fn validate_structure(
    buses: &[Bus],
    elements: &[Element],
    terminals: &[Terminal],
) -> GraphResult<()> {
    // Terminal IDs are contiguous and match their indices
    for (i, terminal) in terminals.iter().enumerate() {
        if terminal.id.slot() != i {
            return Err(GraphError::InconsistentAdjacency {
                terminal: terminal.id,
                bus: terminal.bus,
            });
        }
    }

    for terminal in terminals {
        if terminal.bus.slot() >= buses.len() {
            return Err(GraphError::InvalidBusRef {
                terminal: terminal.id,
                bus: terminal.bus,
            });
        }
        if terminal.element.slot() >= elements.len() {
            return Err(GraphError::InvalidElementRef {
                terminal: terminal.id,
                element: terminal.element,
            });
        }
    }

    for element in elements {
        if element.terminals.is_empty() {
            return Err(GraphError::NoTerminals {
                element: element.id,
            });
        }

        for (slot, &terminal_id) in element.terminals.iter().enumerate() {
            let Some(terminal) = terminals.get(terminal_id.slot()) else {
                return Err(GraphError::InvalidElementRef {
                    terminal: terminal_id,
                    element: element.id,
                });
            };
            if terminal.element != element.id || terminal.slot != slot {
                return Err(GraphError::TerminalElementMismatch {
                    terminal: terminal_id,
                    expected: element.id,
                    actual: terminal.element,
                });
            }
        }
    }

    Ok(())
}

/// Validate adjacency lists for consistency.
pub(crate) fn validate_adjacency(
    buses: &[Bus],
    terminals: &[Terminal],
    bus_terminal_offsets: &[usize],
    bus_terminals: &[TerminalId],
) -> GraphResult<()> {
    if bus_terminal_offsets.len() != buses.len() + 1 {
        return Err(GraphError::InconsistentAdjacency {
            terminal: TerminalId::from_index(0),
            bus: buses.first().map_or(BusId::from_index(0), |b| b.id),
        });
    }

    for bus in buses {
        let idx = bus.id.slot();
        let start = bus_terminal_offsets[idx];
        let end = bus_terminal_offsets[idx + 1];

        for &terminal_id in &bus_terminals[start..end] {
            match terminals.get(terminal_id.slot()) {
                Some(terminal) if terminal.bus == bus.id => {}
                _ => {
                    return Err(GraphError::InconsistentAdjacency {
                        terminal: terminal_id,
                        bus: bus.id,
                    });
                }
            }
        }
    }

    // Every terminal appears in exactly one bus's adjacency list
    let mut seen: HashSet<TerminalId> = HashSet::new();
    for &terminal_id in bus_terminals {
        if !seen.insert(terminal_id) {
            return Err(GraphError::InconsistentAdjacency {
                terminal: terminal_id,
                bus: terminals[terminal_id.slot()].bus,
            });
        }
    }
    for terminal in terminals {
        if !seen.contains(&terminal.id) {
            return Err(GraphError::InconsistentAdjacency {
                terminal: terminal.id,
                bus: terminal.bus,
            });
        }
    }

    Ok(())
}

/// Every bus needs at least one incident terminal, otherwise its balance
/// equations are identically zero and the Jacobian is singular.
pub(crate) fn validate_connectivity(
    buses: &[Bus],
    bus_terminal_offsets: &[usize],
) -> GraphResult<()> {
    for bus in buses {
        let idx = bus.id.slot();
        if bus_terminal_offsets[idx] == bus_terminal_offsets[idx + 1] {
            return Err(GraphError::IsolatedBus {
                bus: bus.id,
                name: bus.name.clone(),
            });
        }
    }
    Ok(())
}

impl Graph {
    /// Check that `element` has exactly the terminal kinds a device expects.
    pub fn check_terminal_kinds(&self, element: DeviceId, expected: &[BusKind]) -> GraphResult<()> {
        let elem = self
            .element(element)
            .ok_or(GraphError::IdNotFound { what: "element" })?;
        if elem.terminals.len() != expected.len() {
            return Err(GraphError::TerminalCount {
                element,
                expected: expected.len(),
                actual: elem.terminals.len(),
            });
        }
        for (slot, &kind) in expected.iter().enumerate() {
            let bus = self
                .element_bus(element, slot)
                .and_then(|b| self.bus(b))
                .ok_or(GraphError::IdNotFound { what: "terminal bus" })?;
            if bus.kind != kind {
                return Err(GraphError::KindMismatch {
                    element,
                    slot,
                    expected: kind,
                    actual: bus.kind,
                });
            }
        }
        Ok(())
    }
}
