mod coercion;
mod execution;
mod instructions;
mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::tooling::{ToolDescriptor, ToolTransport};

pub(crate) use coercion::coerce_arguments;
pub(crate) use parser::parse_message;

/// The immutable per-session view of the tool catalogue plus the transport
/// used to dispatch calls. Lookup is case-insensitive on tool name.
pub(crate) struct ToolRuntime {
    descriptors: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    transport: Arc<dyn ToolTransport>,
}

impl ToolRuntime {
    pub(crate) fn new(descriptors: Vec<ToolDescriptor>, transport: Arc<dyn ToolTransport>) -> Self {
        let index = descriptors
            .iter()
            .enumerate()
            .map(|(position, descriptor)| (descriptor.name.to_lowercase(), position))
            .collect();

        Self {
            descriptors,
            index,
            transport,
        }
    }

    pub(crate) fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index
            .get(&name.to_lowercase())
            .map(|&position| &self.descriptors[position])
    }

    pub(crate) fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }
}
