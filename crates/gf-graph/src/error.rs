//! Graph-specific error types.

use gf_core::{BusId, DeviceId, GfError, TerminalId};

use crate::graph::BusKind;

pub type GraphResult<T> = Result<T, GraphError>;

/// Graph construction and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A terminal refers to a bus that doesn't exist.
    InvalidBusRef { terminal: TerminalId, bus: BusId },

    /// A terminal refers to an element that doesn't exist.
    InvalidElementRef {
        terminal: TerminalId,
        element: DeviceId,
    },

    /// An element was declared without any terminal.
    NoTerminals { element: DeviceId },

    /// A terminal's element field doesn't match the element listing it.
    TerminalElementMismatch {
        terminal: TerminalId,
        expected: DeviceId,
        actual: DeviceId,
    },

    /// Adjacency list is inconsistent (terminal in bus list but doesn't reference the bus).
    InconsistentAdjacency { terminal: TerminalId, bus: BusId },

    /// A bus has no incident terminals, so its balance equation is empty.
    IsolatedBus { bus: BusId, name: String },

    /// An element has a different number of terminals than its device needs.
    TerminalCount {
        element: DeviceId,
        expected: usize,
        actual: usize,
    },

    /// A terminal is attached to a bus of the wrong kind.
    KindMismatch {
        element: DeviceId,
        slot: usize,
        expected: BusKind,
        actual: BusKind,
    },

    /// ID not found in the graph.
    IdNotFound { what: &'static str },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::InvalidBusRef { terminal, bus } => {
                write!(f, "Terminal {} refers to non-existent bus {}", terminal, bus)
            }
            GraphError::InvalidElementRef { terminal, element } => {
                write!(
                    f,
                    "Terminal {} refers to non-existent element {}",
                    terminal, element
                )
            }
            GraphError::NoTerminals { element } => {
                write!(f, "Element {} has no terminals", element)
            }
            GraphError::TerminalElementMismatch {
                terminal,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Terminal {} should belong to element {} but references {}",
                    terminal, expected, actual
                )
            }
            GraphError::InconsistentAdjacency { terminal, bus } => {
                write!(
                    f,
                    "Terminal {} in bus {}'s adjacency list but doesn't reference that bus",
                    terminal, bus
                )
            }
            GraphError::IsolatedBus { bus, name } => {
                write!(f, "Bus {} ('{}') has no connected devices", bus, name)
            }
            GraphError::TerminalCount {
                element,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Element {} has {} terminals (expected {})",
                    element, actual, expected
                )
            }
            GraphError::KindMismatch {
                element,
                slot,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Element {} terminal {} needs a {} bus but is attached to a {} bus",
                    element,
                    slot,
                    expected.as_str(),
                    actual.as_str()
                )
            }
            GraphError::IdNotFound { what } => {
                write!(f, "{} not found in graph", what)
            }
        }
    }
}

impl std::error::Error for GraphError {}

impl From<GraphError> for GfError {
    fn from(err: GraphError) -> Self {
        GfError::Topology(err.to_string())
    }
}
