// procedural/link.rs — directed wires between ports

use super::port::{NodeRef, PortDirection, PortId};
use crate::error::{ProcError, Result};

/// The upstream end of a link: an output port on a regular module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Source {
    pub module: usize,
    pub port: usize,
}

/// The downstream end of a link: an input port on a module or output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sink {
    pub node: NodeRef,
    pub port: usize,
}

/// A wire from one module's output port to another node's input port.
///
/// Several links may share a source; a sink accepts at most one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub from: Source,
    pub to: Sink,
}

impl Link {
    /// Build a link between two port addresses. `from` must be an output port
    /// of a regular module and `to` an input port.
    pub fn new(from: PortId, to: PortId) -> Result<Self> {
        if from.direction != PortDirection::Output || to.direction != PortDirection::Input {
            return Err(ProcError::PortDirection);
        }
        let NodeRef::Module(module) = from.node else {
            // Output modules have no output ports.
            return Err(ProcError::PortDirection);
        };
        Ok(Self {
            from: Source {
                module,
                port: from.index,
            },
            to: Sink {
                node: to.node,
                port: to.index,
            },
        })
    }

    /// `module.output[port] -> target.input[input]`.
    pub fn between(module: usize, port: usize, target: usize, input: usize) -> Self {
        Self {
            from: Source { module, port },
            to: Sink {
                node: NodeRef::Module(target),
                port: input,
            },
        }
    }

    /// `module.output[port] -> outputs[slot]`.
    pub fn to_output(module: usize, port: usize, slot: usize) -> Self {
        Self {
            from: Source { module, port },
            to: Sink {
                node: NodeRef::Output(slot),
                port: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_to_output_is_rejected() {
        let err = Link::new(PortId::input(0, 0), PortId::output(1, 0)).unwrap_err();
        assert!(matches!(err, ProcError::PortDirection));
    }

    #[test]
    fn output_slot_cannot_be_a_source() {
        let from = PortId {
            node: NodeRef::Output(0),
            direction: PortDirection::Output,
            index: 0,
        };
        assert!(Link::new(from, PortId::input(1, 0)).is_err());
    }

    #[test]
    fn well_formed_link() {
        let link = Link::new(PortId::output(2, 1), PortId::output_slot(3)).unwrap();
        assert_eq!(link, Link::to_output(2, 1, 3));
    }
}
