// procedural/port.rs — typed connection points
//
// Ports are static descriptions attached to a module kind. They never own
// links: a port is addressed by (node, direction, index) and the wiring lives
// in the Procedure's input tables.

use crate::math::RGBColor;

/// The kind of value carried across a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Number,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

/// Edge of the module box a port is drawn on. Layout only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSide {
    Left,
    Right,
    Top,
    Bottom,
}

/// What an unconnected input reads as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortDefault {
    /// A constant, zero error, zero gradient.
    Value(f64),
    /// A constant color.
    Color(RGBColor),
    /// The sample point's coordinate on axis 0, 1 or 2. Its error is half the
    /// footprint on that axis plus the blur, and its gradient is the unit axis.
    Coordinate(usize),
}

/// A typed, named connection point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Port {
    pub value_type: ValueType,
    pub direction: PortDirection,
    pub side: PortSide,
    pub name: &'static str,
    /// Suggested value range for editors; not enforced.
    pub range: Option<(f64, f64)>,
    pub default: PortDefault,
}

impl Port {
    pub const fn number_in(name: &'static str, default: f64) -> Self {
        Self {
            value_type: ValueType::Number,
            direction: PortDirection::Input,
            side: PortSide::Left,
            name,
            range: None,
            default: PortDefault::Value(default),
        }
    }

    pub const fn coordinate_in(name: &'static str, axis: usize) -> Self {
        Self {
            value_type: ValueType::Number,
            direction: PortDirection::Input,
            side: PortSide::Left,
            name,
            range: None,
            default: PortDefault::Coordinate(axis),
        }
    }

    pub const fn color_in(name: &'static str, default: RGBColor) -> Self {
        Self {
            value_type: ValueType::Color,
            direction: PortDirection::Input,
            side: PortSide::Left,
            name,
            range: None,
            default: PortDefault::Color(default),
        }
    }

    pub const fn number_out(name: &'static str) -> Self {
        Self {
            value_type: ValueType::Number,
            direction: PortDirection::Output,
            side: PortSide::Right,
            name,
            range: None,
            default: PortDefault::Value(0.0),
        }
    }

    pub const fn color_out(name: &'static str) -> Self {
        Self {
            value_type: ValueType::Color,
            direction: PortDirection::Output,
            side: PortSide::Right,
            name,
            range: None,
            default: PortDefault::Color(RGBColor::BLACK),
        }
    }

    pub const fn on(mut self, side: PortSide) -> Self {
        self.side = side;
        self
    }

    pub const fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// A node in the graph: a regular module or an output module slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Module(usize),
    Output(usize),
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRef::Module(i) => write!(f, "module {i}"),
            NodeRef::Output(i) => write!(f, "output {i}"),
        }
    }
}

/// Full address of one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    pub node: NodeRef,
    pub direction: PortDirection,
    pub index: usize,
}

impl PortId {
    pub fn output(module: usize, index: usize) -> Self {
        Self {
            node: NodeRef::Module(module),
            direction: PortDirection::Output,
            index,
        }
    }

    pub fn input(module: usize, index: usize) -> Self {
        Self {
            node: NodeRef::Module(module),
            direction: PortDirection::Input,
            index,
        }
    }

    /// The single input port of an output module.
    pub fn output_slot(slot: usize) -> Self {
        Self {
            node: NodeRef::Output(slot),
            direction: PortDirection::Input,
            index: 0,
        }
    }
}
