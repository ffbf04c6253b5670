// procedural/graph.rs — JSON graph descriptions → Procedure
//
// Editors describe a procedure as a flat { nodes, edges } document. Nodes
// carry a module type name, a layout position and a free-form `fields` map
// of parameters; edges connect named (or numbered) handles. Loading goes
// through the same `add_module` / `add_link` path as programmatic edits, so
// the usual wiring checks (port ranges, cycles) apply. Unlike an interactive
// edit, a document that wires one input twice is rejected rather than having
// the later edge replace the earlier one.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::image::ImageLibrary;
use super::link::{Link, Sink};
use super::module::{Module, ModuleKind, OutputModule};
use super::port::Port;
use super::procedure::Procedure;
use crate::error::{ProcError, Result};
use crate::math::RGBColor;

/// Module parameters keyed by field name.
pub type Fields = HashMap<String, Value>;

// ── Field helpers ───────────────────────────────────────────────────

pub(crate) fn field_f64(fields: &Fields, key: &str, default: f64) -> f64 {
    fields.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

pub(crate) fn field_i32(fields: &Fields, key: &str, default: i32) -> i32 {
    fields
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(default)
}

pub(crate) fn field_str<'a>(fields: &'a Fields, key: &str, default: &'a str) -> &'a str {
    fields.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

pub(crate) fn field_bool(fields: &Fields, key: &str, default: bool) -> bool {
    fields.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// A color given as `{ "r", "g", "b" }` or `[r, g, b]`.
pub(crate) fn field_color(fields: &Fields, key: &str, default: RGBColor) -> RGBColor {
    let channel = |v: Option<&Value>, d: f32| v.and_then(|v| v.as_f64()).map_or(d, |c| c as f32);
    match fields.get(key) {
        Some(Value::Object(obj)) => RGBColor::new(
            channel(obj.get("r"), default.red),
            channel(obj.get("g"), default.green),
            channel(obj.get("b"), default.blue),
        ),
        Some(Value::Array(arr)) if arr.len() == 3 => RGBColor::new(
            channel(arr.first(), default.red),
            channel(arr.get(1), default.green),
            channel(arr.get(2), default.blue),
        ),
        _ => default,
    }
}

// ── Description ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A port reference by name or by index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Handle {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphNode {
    pub id: String,
    /// Module type, short (`"Sum"`) or fully qualified.
    #[serde(rename = "type")]
    pub module_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub fields: Fields,
}

/// `source` is a node id. `target` is a node id or the name of an output
/// module. Missing handles mean port 0.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    #[serde(rename = "sourceHandle", default)]
    pub source_handle: Option<Handle>,
    pub target: String,
    #[serde(rename = "targetHandle", default)]
    pub target_handle: Option<Handle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDescription {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphDescription {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProcError::Graph(e.to_string()))
    }
}

fn resolve_handle(handle: Option<&Handle>, ports: &[Port], node: &str, kind: &str) -> Result<usize> {
    match handle {
        None => Ok(0),
        Some(Handle::Index(i)) => Ok(*i),
        Some(Handle::Name(name)) => ports
            .iter()
            .position(|p| p.name == name)
            .or_else(|| name.parse().ok())
            .ok_or_else(|| ProcError::Graph(format!("node '{node}' has no {kind} '{name}'"))),
    }
}

// ── Loading ─────────────────────────────────────────────────────────

impl Procedure {
    /// Build a procedure around `outputs` from a graph description. Image
    /// fields index into `images`.
    pub fn from_graph(
        outputs: Vec<OutputModule>,
        description: &GraphDescription,
        images: &ImageLibrary,
    ) -> Result<Procedure> {
        let mut procedure = Procedure::new(outputs);
        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(description.nodes.len());

        for node in &description.nodes {
            let mut kind = ModuleKind::from_type_name(&node.module_type)
                .ok_or_else(|| ProcError::UnknownModule(node.module_type.clone()))?;
            kind.apply_fields(&node.fields, images)?;
            let module = Module::at(kind, node.position.x.round() as i32, node.position.y.round() as i32);
            let index = procedure.add_module(module);
            if index_of.insert(node.id.as_str(), index).is_some() {
                return Err(ProcError::Graph(format!("duplicate node id '{}'", node.id)));
            }
        }

        let mut wired: HashMap<Sink, &str> = HashMap::with_capacity(description.edges.len());
        for edge in &description.edges {
            let &from = index_of
                .get(edge.source.as_str())
                .ok_or_else(|| ProcError::Graph(format!("edge from unknown node '{}'", edge.source)))?;
            let from_port = resolve_handle(
                edge.source_handle.as_ref(),
                procedure.modules()[from].output_ports(),
                &edge.source,
                "output",
            )?;
            let link = if let Some(&to) = index_of.get(edge.target.as_str()) {
                let to_port = resolve_handle(
                    edge.target_handle.as_ref(),
                    procedure.modules()[to].input_ports(),
                    &edge.target,
                    "input",
                )?;
                Link::between(from, from_port, to, to_port)
            } else {
                let slot = procedure
                    .outputs()
                    .iter()
                    .position(|o| o.name == edge.target)
                    .ok_or_else(|| ProcError::Graph(format!("edge to unknown node '{}'", edge.target)))?;
                Link::to_output(from, from_port, slot)
            };
            if let Some(previous) = wired.insert(link.to, edge.source.as_str()) {
                return Err(ProcError::Graph(format!(
                    "input {} of '{}' is linked from both '{previous}' and '{}'",
                    link.to.port, edge.target, edge.source
                )));
            }
            procedure.add_link(link)?;
        }

        log::debug!(
            "loaded graph: {} modules, {} links",
            procedure.modules().len(),
            procedure.links().len()
        );
        Ok(procedure)
    }

    /// [`Procedure::from_graph`] from JSON text.
    pub fn from_json(outputs: Vec<OutputModule>, text: &str, images: &ImageLibrary) -> Result<Procedure> {
        Procedure::from_graph(outputs, &GraphDescription::from_json(text)?, images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn field_helpers_fall_back_to_defaults() {
        let f = fields(json!({ "A": 2.5, "N": 7, "S": "hi", "B": true }));
        assert_eq!(field_f64(&f, "A", 0.0), 2.5);
        assert_eq!(field_f64(&f, "missing", 1.5), 1.5);
        assert_eq!(field_i32(&f, "N", 0), 7);
        assert_eq!(field_i32(&f, "A", 3), 3);
        assert_eq!(field_str(&f, "S", "x"), "hi");
        assert!(field_bool(&f, "B", false));
    }

    #[test]
    fn colors_parse_from_objects_and_arrays() {
        let f = fields(json!({ "C": { "r": 0.5, "g": 0.25 }, "D": [1.0, 0.0, 0.5] }));
        assert_eq!(field_color(&f, "C", RGBColor::WHITE), RGBColor::new(0.5, 0.25, 1.0));
        assert_eq!(field_color(&f, "D", RGBColor::BLACK), RGBColor::new(1.0, 0.0, 0.5));
        assert_eq!(field_color(&f, "E", RGBColor::WHITE), RGBColor::WHITE);
    }

    #[test]
    fn handles_accept_names_and_indices() {
        let text = r#"{ "nodes": [], "edges": [
            { "source": "a", "sourceHandle": 1, "target": "b", "targetHandle": "Value 2" },
            { "source": "a", "target": "b" }
        ] }"#;
        let d = GraphDescription::from_json(text).unwrap();
        assert_eq!(d.edges[0].source_handle, Some(Handle::Index(1)));
        assert_eq!(d.edges[0].target_handle, Some(Handle::Name("Value 2".into())));
        assert!(d.edges[1].target_handle.is_none());
    }
}
