//! gf-graph: network topology layer for gridflow.
//!
//! Provides:
//! - Core graph data structures (Bus, Element, Terminal, Graph)
//! - Incremental graph builder with validation
//! - Terminal kind checks used when devices are attached to elements
//!
//! # Example
//!
//! ```
//! use gf_core::units::{megawatts, volts};
//! use gf_graph::{BusBase, BusKind, GraphBuilder};
//!
//! let base = BusBase::new(volts(4160.0), megawatts(10.0)).unwrap();
//! let mut builder = GraphBuilder::new();
//! let b1 = builder.add_bus("Grid", BusKind::Ac, base);
//! let b2 = builder.add_bus("Feeder", BusKind::Ac, base);
//! let line = builder.add_element("Line 1-2", &[b1, b2]);
//! builder.add_element("Slack", &[b1]);
//! builder.add_element("Load", &[b2]);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.buses().len(), 2);
//! assert_eq!(graph.elements().len(), 3);
//! assert_eq!(graph.element_bus(line, 1), Some(b2));
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::GraphBuilder;
pub use error::{GraphError, GraphResult};
pub use graph::{Bus, BusBase, BusKind, Element, Graph, Terminal};
