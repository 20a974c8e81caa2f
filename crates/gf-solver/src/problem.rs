//! Problem definition for load-flow solving.

use std::collections::HashMap;

use gf_core::DeviceId;
use gf_devices::Device;
use gf_graph::{Graph, GraphError};

use crate::error::{SolverError, SolverResult};

/// A load-flow problem: a topology plus one device model per element,
/// solved at `num_points` independent operating points.
pub struct LoadFlowProblem<'a> {
    /// Network topology
    pub graph: &'a Graph,

    /// Device models indexed by element id
    pub devices: HashMap<DeviceId, Box<dyn Device>>,

    /// Number of operating points
    pub num_points: usize,
}

impl<'a> LoadFlowProblem<'a> {
    pub fn new(graph: &'a Graph, num_points: usize) -> Self {
        Self {
            graph,
            devices: HashMap::new(),
            num_points,
        }
    }

    /// Attach the device model for an element.
    pub fn add_device(&mut self, id: DeviceId, device: Box<dyn Device>) -> SolverResult<()> {
        if self.graph.element(id).is_none() {
            return Err(GraphError::IdNotFound { what: "element" }.into());
        }
        if self.devices.contains_key(&id) {
            return Err(SolverError::Setup {
                what: format!("Element {} already has a device", id),
            });
        }
        self.devices.insert(id, device);
        Ok(())
    }

    /// Attach a device to the element with the given name.
    pub fn add_device_by_name(&mut self, name: &str, device: Box<dyn Device>) -> SolverResult<()> {
        let id = self
            .graph
            .element_by_name(name)
            .map(|e| e.id)
            .ok_or_else(|| SolverError::Setup {
                what: format!("No element named '{}'", name),
            })?;
        self.add_device(id, device)
    }

    /// Validate problem setup.
    pub fn validate(&self) -> SolverResult<()> {
        if self.num_points == 0 {
            return Err(SolverError::Setup {
                what: "at least one operating point is required".to_string(),
            });
        }

        for element in self.graph.elements() {
            let device = self
                .devices
                .get(&element.id)
                .ok_or_else(|| SolverError::Setup {
                    what: format!("Element '{}' has no device", element.name),
                })?;
            self.graph
                .check_terminal_kinds(element.id, device.terminal_kinds())?;
            device.check_points(self.num_points)?;
        }

        Ok(())
    }
}
