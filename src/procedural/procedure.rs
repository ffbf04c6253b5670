// procedural/procedure.rs — the module graph container
//
// A Procedure owns an arena of modules, the ordered link list, and a fixed
// array of output modules supplied by its owner (a texture, a material).
// Wiring is stored twice: the ordered `links` list (persisted, user-visible)
// and per-module input tables derived from it (used by evaluation). Every
// mutation goes through methods that keep the two in step.
//
// Evaluation is pull-based. `init_for_point` moves the memo to a new
// generation, and the `output_*` accessors walk upstream on demand.
//
// A Procedure is not shareable across threads while evaluating: the memo is
// mutable state. Render workers take their own copy through `worker_copy`.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use smallvec::SmallVec;

use super::eval::{EvalState, Evaluator, InputTable};
use super::image::{ImageLibrary, ImageMap};
use super::link::{Link, Sink, Source};
use super::module::{Module, ModuleKind, OutputModule};
use super::point::PointInfo;
use super::port::NodeRef;
use super::stream::{DataReader, DataWriter};
use crate::error::{ProcError, Result};
use crate::math::{RGBColor, Vec3};

/// The only binary format version this crate reads and writes.
pub const FORMAT_VERSION: i16 = 0;

fn next_revision() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// A Parameter module as seen by the procedure's owner.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureParameter {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    /// Position in `PointInfo::param`.
    pub index: usize,
}

#[derive(Debug)]
pub struct Procedure {
    modules: Vec<Module>,
    inputs: Vec<InputTable>,
    links: Vec<Link>,
    outputs: Vec<OutputModule>,
    output_inputs: Vec<Option<Source>>,
    state: EvalState,
    revision: u64,
}

impl Procedure {
    /// An empty procedure around the owner's output modules.
    pub fn new(outputs: Vec<OutputModule>) -> Self {
        let output_inputs = vec![None; outputs.len()];
        Self {
            modules: Vec::new(),
            inputs: Vec::new(),
            links: Vec::new(),
            outputs,
            output_inputs,
            state: EvalState::new(),
            revision: next_revision(),
        }
    }

    // ── Accessors ──

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get(index)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn outputs(&self) -> &[OutputModule] {
        &self.outputs
    }

    pub fn output(&self, slot: usize) -> Option<&OutputModule> {
        self.outputs.get(slot)
    }

    /// Token that changes on every structural or parameter mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn module_index(&self, module: &Module) -> Option<usize> {
        self.modules.iter().position(|m| m.id() == module.id())
    }

    pub fn output_index(&self, output: &OutputModule) -> Option<usize> {
        self.outputs.iter().position(|o| o.id() == output.id())
    }

    /// The output port feeding an input, if linked.
    pub fn input_source(&self, module: usize, input: usize) -> Option<Source> {
        self.inputs.get(module).and_then(|t| t.get(input)).copied().flatten()
    }

    pub fn output_source(&self, slot: usize) -> Option<Source> {
        self.output_inputs.get(slot).copied().flatten()
    }

    fn touch(&mut self) {
        self.revision = next_revision();
        self.state.invalidate();
    }

    /// Derive input tables from the link list.
    fn rebuild_tables(&mut self) {
        self.inputs = self
            .modules
            .iter()
            .map(|m| SmallVec::from_elem(None, m.input_ports().len()))
            .collect();
        self.output_inputs = vec![None; self.outputs.len()];
        for link in &self.links {
            match link.to.node {
                NodeRef::Module(t) => {
                    if let Some(slot) = self.inputs.get_mut(t).and_then(|s| s.get_mut(link.to.port)) {
                        *slot = Some(link.from);
                    }
                }
                NodeRef::Output(s) => {
                    if let Some(slot) = self.output_inputs.get_mut(s) {
                        *slot = Some(link.from);
                    }
                }
            }
        }
    }

    /// Give every Parameter module its dense index.
    fn refresh_parameters(&mut self) {
        let mut next = 0;
        for module in &mut self.modules {
            if let ModuleKind::Parameter(p) = &mut module.kind {
                p.set_index(next);
                next += 1;
            }
        }
    }

    fn structure_changed(&mut self) {
        self.rebuild_tables();
        self.state.rebuild(&self.modules);
        self.refresh_parameters();
        self.touch();
    }

    // ── Modules ──

    /// Append a module and return its index.
    pub fn add_module(&mut self, module: Module) -> usize {
        self.inputs.push(SmallVec::from_elem(None, module.input_ports().len()));
        self.modules.push(module);
        self.state.rebuild(&self.modules);
        self.refresh_parameters();
        self.touch();
        self.modules.len() - 1
    }

    /// Remove a module, severing every link to or from it. Later modules
    /// shift down by one.
    pub fn delete_module(&mut self, index: usize) -> Result<Module> {
        if index >= self.modules.len() {
            return Err(ProcError::IndexOutOfBounds {
                what: "module",
                index,
                len: self.modules.len(),
            });
        }
        let before = self.links.len();
        self.links
            .retain(|l| l.from.module != index && l.to.node != NodeRef::Module(index));
        for link in &mut self.links {
            if link.from.module > index {
                link.from.module -= 1;
            }
            if let NodeRef::Module(t) = &mut link.to.node {
                if *t > index {
                    *t -= 1;
                }
            }
        }
        let removed = self.modules.remove(index);
        debug!(
            "deleted module {index} ({}), severed {} links",
            removed.name(),
            before - self.links.len()
        );
        self.structure_changed();
        Ok(removed)
    }

    /// Change a module's parameters or position in place. Links to ports
    /// that no longer exist afterwards are dropped.
    pub fn edit_module<F: FnOnce(&mut Module)>(&mut self, index: usize, edit: F) -> Result<()> {
        let len = self.modules.len();
        let module = self.modules.get_mut(index).ok_or(ProcError::IndexOutOfBounds {
            what: "module",
            index,
            len,
        })?;
        edit(module);
        let modules = &self.modules;
        self.links.retain(|l| {
            let from_ok = modules
                .get(l.from.module)
                .is_some_and(|m| l.from.port < m.output_ports().len());
            let to_ok = match l.to.node {
                NodeRef::Module(t) => modules.get(t).is_some_and(|m| l.to.port < m.input_ports().len()),
                NodeRef::Output(_) => true,
            };
            from_ok && to_ok
        });
        self.structure_changed();
        Ok(())
    }

    // ── Links ──

    fn check_link(&self, link: &Link) -> Result<()> {
        let from = self.modules.get(link.from.module).ok_or(ProcError::IndexOutOfBounds {
            what: "module",
            index: link.from.module,
            len: self.modules.len(),
        })?;
        if link.from.port >= from.output_ports().len() {
            return Err(ProcError::InvalidPort {
                node: NodeRef::Module(link.from.module).to_string(),
                port: link.from.port,
            });
        }
        let input_count = match link.to.node {
            NodeRef::Module(t) => self
                .modules
                .get(t)
                .ok_or(ProcError::IndexOutOfBounds {
                    what: "module",
                    index: t,
                    len: self.modules.len(),
                })?
                .input_ports()
                .len(),
            NodeRef::Output(s) => self
                .outputs
                .get(s)
                .ok_or(ProcError::IndexOutOfBounds {
                    what: "output",
                    index: s,
                    len: self.outputs.len(),
                })?
                .input_ports()
                .len(),
        };
        if link.to.port >= input_count {
            return Err(ProcError::InvalidPort {
                node: link.to.node.to_string(),
                port: link.to.port,
            });
        }
        Ok(())
    }

    /// Whether `target` is `start` or lies upstream of it.
    fn upstream_of(&self, start: usize, target: usize) -> bool {
        let mut seen = vec![false; self.modules.len()];
        let mut stack = vec![start];
        while let Some(m) = stack.pop() {
            if m == target {
                return true;
            }
            if std::mem::replace(&mut seen[m], true) {
                continue;
            }
            stack.extend(self.inputs[m].iter().flatten().map(|s| s.module));
        }
        false
    }

    /// Add a link. A link into an occupied input replaces the old one. Links
    /// that would close a cycle are rejected.
    pub fn add_link(&mut self, link: Link) -> Result<()> {
        self.check_link(&link)?;
        if let NodeRef::Module(t) = link.to.node {
            if self.upstream_of(link.from.module, t) {
                warn!("rejected link {} -> {}: cycle", link.from.module, link.to.node);
                return Err(ProcError::CycleDetected {
                    from: link.from.module,
                    to: link.to.node.to_string(),
                });
            }
        }
        if let Some(old) = self.links.iter().position(|l| l.to == link.to) {
            warn!("replacing link into {} input {}", link.to.node, link.to.port);
            self.links.remove(old);
        }
        match link.to.node {
            NodeRef::Module(t) => self.inputs[t][link.to.port] = Some(link.from),
            NodeRef::Output(s) => self.output_inputs[s] = Some(link.from),
        }
        self.links.push(link);
        self.touch();
        Ok(())
    }

    /// `module.output[port] -> target.input[input]`.
    pub fn connect(&mut self, module: usize, port: usize, target: usize, input: usize) -> Result<()> {
        self.add_link(Link::between(module, port, target, input))
    }

    /// `module.output[port] -> outputs[slot]`.
    pub fn connect_output(&mut self, module: usize, port: usize, slot: usize) -> Result<()> {
        self.add_link(Link::to_output(module, port, slot))
    }

    /// Remove link `index` and clear the input it fed.
    pub fn delete_link(&mut self, index: usize) -> Result<Link> {
        if index >= self.links.len() {
            return Err(ProcError::IndexOutOfBounds {
                what: "link",
                index,
                len: self.links.len(),
            });
        }
        let link = self.links.remove(index);
        let Sink { node, port } = link.to;
        match node {
            NodeRef::Module(t) => self.inputs[t][port] = None,
            NodeRef::Output(s) => self.output_inputs[s] = None,
        }
        self.touch();
        Ok(link)
    }

    /// Whether the wiring contains a cycle. Stays false when the graph is
    /// built through `add_link`.
    pub fn check_feedback(&self) -> bool {
        has_cycle(&self.inputs)
    }

    // ── Evaluation ──

    fn evaluator(&mut self) -> Evaluator<'_> {
        Evaluator {
            modules: &self.modules,
            inputs: &self.inputs,
            outputs: &self.outputs,
            output_inputs: &self.output_inputs,
            state: &mut self.state,
        }
    }

    /// Begin evaluating at a new point. No module is evaluated here.
    pub fn init_for_point(&mut self, point: PointInfo) {
        self.state.init(point);
    }

    pub fn output_value(&mut self, slot: usize) -> f64 {
        self.evaluator().output_value(slot)
    }

    pub fn output_error(&mut self, slot: usize) -> f64 {
        self.evaluator().output_error(slot)
    }

    pub fn output_gradient(&mut self, slot: usize) -> Vec3 {
        self.evaluator().output_gradient(slot)
    }

    pub fn output_color(&mut self, slot: usize) -> RGBColor {
        self.evaluator().output_color(slot)
    }

    /// Value of one module output at the current point.
    pub fn module_value(&mut self, module: usize, output: usize, blur: f64) -> f64 {
        self.evaluator().value(module, output, blur)
    }

    pub fn module_color(&mut self, module: usize, output: usize, blur: f64) -> RGBColor {
        self.evaluator().color(module, output, blur)
    }

    /// How many times outputs of `module` were computed, rather than read
    /// back from the memo, since the last `init_for_point`.
    pub fn computations(&self, module: usize) -> u32 {
        self.state.computations(module)
    }

    // ── Copies ──

    fn copy_graph(&mut self, source: &Procedure) {
        self.modules = source.modules.iter().map(Module::duplicate).collect();
        self.links = source.links.clone();
        self.structure_changed();
    }

    /// Replace this procedure's modules and links with duplicates of
    /// `source`'s. Output modules keep their identity.
    pub fn copy_from(&mut self, source: &Procedure) -> Result<()> {
        if source.outputs.len() != self.outputs.len() {
            return Err(ProcError::OutputShapeMismatch {
                expected: self.outputs.len(),
                found: source.outputs.len(),
            });
        }
        self.copy_graph(source);
        Ok(())
    }

    /// An independent copy for one render worker.
    pub fn worker_copy(&self) -> Procedure {
        let mut copy = Procedure::new(self.outputs.iter().map(OutputModule::duplicate).collect());
        copy.copy_graph(self);
        copy
    }

    // ── Owner queries ──

    /// Parameter modules in module order. Their indices into
    /// `PointInfo::param` are dense and match this order.
    pub fn texture_parameters(&self) -> Vec<TextureParameter> {
        self.modules
            .iter()
            .filter_map(|m| match &m.kind {
                ModuleKind::Parameter(p) => Some(p),
                _ => None,
            })
            .enumerate()
            .map(|(index, p)| TextureParameter {
                name: p.name.clone(),
                min: p.min,
                max: p.max,
                default: p.default,
                index,
            })
            .collect()
    }

    pub fn uses_image(&self, image: &ImageMap) -> bool {
        self.modules.iter().any(|m| m.kind.uses_image(image))
    }

    // ── Binary format ──

    /// Serialize modules and links. Image references are written as indices
    /// into `images`.
    pub fn write_to<W: Write>(&self, out: W, images: &ImageLibrary) -> Result<()> {
        let mut w = DataWriter::new(out);
        w.write_i16(FORMAT_VERSION)?;
        w.write_index(self.modules.len())?;
        for module in &self.modules {
            w.write_utf(&module.stream_type_name())?;
            w.write_i32(module.position.0)?;
            w.write_i32(module.position.1)?;
            module.kind.write_params(&mut w, images)?;
        }
        w.write_index(self.links.len())?;
        for link in &self.links {
            w.write_index(link.from.module)?;
            w.write_index(link.from.port)?;
            match link.to.node {
                NodeRef::Output(s) => {
                    let s = i32::try_from(s)
                        .map_err(|_| ProcError::InvalidFormat(format!("output slot {s} exceeds i32")))?;
                    w.write_i32(-s - 1)?;
                }
                NodeRef::Module(t) => {
                    w.write_index(t)?;
                    w.write_index(link.to.port)?;
                }
            }
        }
        w.flush()?;
        debug!("wrote procedure: {} modules, {} links", self.modules.len(), self.links.len());
        Ok(())
    }

    /// Replace this procedure's modules and links from a stream. The output
    /// modules must already match the writer's. On any error the procedure
    /// is left unchanged.
    pub fn read_from<R: Read>(&mut self, input: R, images: &ImageLibrary) -> Result<()> {
        let mut r = DataReader::new(input);
        let version = r.read_i16()?;
        if version != FORMAT_VERSION {
            return Err(ProcError::UnsupportedVersion(version));
        }

        let count = r.read_count("module")?;
        let mut modules = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let name = r.read_utf()?;
            let mut kind = ModuleKind::from_type_name(&name).ok_or(ProcError::UnknownModule(name))?;
            let x = r.read_i32()?;
            let y = r.read_i32()?;
            kind.read_params(&mut r, images)?;
            modules.push(Module::at(kind, x, y));
        }

        let count = r.read_count("link")?;
        let mut links: Vec<Link> = Vec::with_capacity(count.min(4096));
        let mut inputs: Vec<InputTable> = modules
            .iter()
            .map(|m| SmallVec::from_elem(None, m.input_ports().len()))
            .collect();
        let mut output_linked = vec![false; self.outputs.len()];
        for _ in 0..count {
            let from = stream_index(r.read_i32()?, modules.len(), "source module")?;
            let port = stream_index(r.read_i32()?, modules[from].output_ports().len(), "source port")?;
            let dest = r.read_i32()?;
            let link = if dest < 0 {
                let slot = stream_index(-(dest + 1), self.outputs.len(), "output slot")?;
                if std::mem::replace(&mut output_linked[slot], true) {
                    return Err(ProcError::InvalidFormat(format!("output {slot} linked twice")));
                }
                Link::to_output(from, port, slot)
            } else {
                let to = stream_index(dest, modules.len(), "destination module")?;
                let input = stream_index(r.read_i32()?, inputs[to].len(), "destination port")?;
                if inputs[to][input].replace(Source { module: from, port }).is_some() {
                    return Err(ProcError::InvalidFormat(format!("module {to} input {input} linked twice")));
                }
                Link::between(from, port, to, input)
            };
            links.push(link);
        }
        if has_cycle(&inputs) {
            return Err(ProcError::InvalidFormat("link table contains a cycle".into()));
        }

        debug!("read procedure: {} modules, {} links", modules.len(), links.len());
        self.modules = modules;
        self.links = links;
        self.structure_changed();
        Ok(())
    }
}

fn stream_index(v: i32, len: usize, what: &str) -> Result<usize> {
    usize::try_from(v)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| ProcError::InvalidFormat(format!("{what} index {v} out of range (len {len})")))
}

/// Kahn's algorithm over module-to-module wiring.
fn has_cycle(inputs: &[InputTable]) -> bool {
    let n = inputs.len();
    let mut pending = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (m, table) in inputs.iter().enumerate() {
        for src in table.iter().flatten() {
            if src.module < n {
                pending[m] += 1;
                dependents[src.module].push(m);
            }
        }
    }
    let mut ready: Vec<usize> = (0..n).filter(|&m| pending[m] == 0).collect();
    let mut visited = 0;
    while let Some(m) = ready.pop() {
        visited += 1;
        for &d in &dependents[m] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.push(d);
            }
        }
    }
    visited < n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedural::modules::{CoordinateAxis, CoordinateModule, NumberModule, ParameterModule, SumModule};

    fn number_outputs(n: usize) -> Vec<OutputModule> {
        (0..n).map(|i| OutputModule::number(format!("out{i}"), 0.0)).collect()
    }

    /// x + 2 -> out0
    fn sample() -> Procedure {
        let mut p = Procedure::new(number_outputs(2));
        let x = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
        let two = p.add_module(Module::new(NumberModule { value: 2.0 }));
        let sum = p.add_module(Module::new(SumModule));
        p.connect(x, 0, sum, 0).unwrap();
        p.connect(two, 0, sum, 1).unwrap();
        p.connect_output(sum, 0, 0).unwrap();
        p
    }

    #[test]
    fn evaluates_through_links() {
        let mut p = sample();
        p.init_for_point(PointInfo::at(3.0, 0.0, 0.0));
        assert_eq!(p.output_value(0), 5.0);
        assert_eq!(p.output_gradient(0), Vec3::X);
        // Unconnected output reports its default.
        assert_eq!(p.output_value(1), 0.0);
    }

    #[test]
    fn add_then_delete_link_restores_state() {
        let mut p = sample();
        let before = p.links().len();
        p.connect_output(1, 0, 1).unwrap();
        assert!(p.output_source(1).is_some());
        p.delete_link(p.links().len() - 1).unwrap();
        assert!(p.output_source(1).is_none());
        assert_eq!(p.links().len(), before);
    }

    #[test]
    fn delete_out_of_range_fails() {
        let mut p = sample();
        assert!(matches!(p.delete_link(10), Err(ProcError::IndexOutOfBounds { what: "link", .. })));
        assert!(matches!(p.delete_module(10), Err(ProcError::IndexOutOfBounds { what: "module", .. })));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut p = sample();
        // sum -> x is impossible (x has no inputs); build a real loop instead.
        let a = p.add_module(Module::new(SumModule));
        let b = p.add_module(Module::new(SumModule));
        p.connect(a, 0, b, 0).unwrap();
        let err = p.connect(b, 0, a, 0).unwrap_err();
        assert!(matches!(err, ProcError::CycleDetected { .. }));
        assert!(matches!(p.connect(a, 0, a, 1), Err(ProcError::CycleDetected { .. })));
        assert!(!p.check_feedback());
    }

    #[test]
    fn occupied_input_is_replaced() {
        let mut p = sample();
        let three = p.add_module(Module::new(NumberModule { value: 3.0 }));
        let links = p.links().len();
        p.connect(three, 0, 2, 1).unwrap();
        assert_eq!(p.links().len(), links);
        p.init_for_point(PointInfo::at(1.0, 0.0, 0.0));
        assert_eq!(p.output_value(0), 4.0);
    }

    #[test]
    fn bad_ports_are_rejected() {
        let mut p = sample();
        assert!(matches!(p.connect(0, 5, 2, 0), Err(ProcError::InvalidPort { .. })));
        assert!(matches!(p.connect(0, 0, 2, 9), Err(ProcError::InvalidPort { .. })));
        assert!(matches!(p.connect_output(0, 0, 7), Err(ProcError::IndexOutOfBounds { what: "output", .. })));
    }

    #[test]
    fn delete_module_severs_and_renumbers() {
        let mut p = sample();
        p.delete_module(0).unwrap();
        assert_eq!(p.modules().len(), 2);
        // Only two -> sum and sum -> out0 remain, renumbered.
        assert_eq!(p.links(), &[Link::between(0, 0, 1, 1), Link::to_output(1, 0, 0)]);
        assert!(p.input_source(1, 0).is_none());
        p.init_for_point(PointInfo::at(3.0, 0.0, 0.0));
        assert_eq!(p.output_value(0), 2.0);
    }

    #[test]
    fn lookups_of_absent_items_are_none() {
        let p = sample();
        let stray = Module::new(SumModule);
        assert_eq!(p.module_index(&stray), None);
        assert_eq!(p.module_index(&p.modules()[2]), Some(2));
        assert_eq!(p.output_index(&OutputModule::number("other", 0.0)), None);
        assert_eq!(p.output_index(&p.outputs()[1]), Some(1));
    }

    #[test]
    fn revision_changes_on_mutation() {
        let mut p = sample();
        let r = p.revision();
        p.add_module(Module::new(SumModule));
        assert_ne!(p.revision(), r);
        let r = p.revision();
        p.edit_module(1, |m| m.position = (5, 5)).unwrap();
        assert_ne!(p.revision(), r);
    }

    #[test]
    fn parameters_get_dense_indices() {
        let mut p = Procedure::new(number_outputs(1));
        p.add_module(Module::new(ParameterModule::new("a", 0.0, 1.0, 0.25)));
        p.add_module(Module::new(SumModule));
        let b = p.add_module(Module::new(ParameterModule::new("b", 0.0, 1.0, 0.5)));
        let params = p.texture_parameters();
        assert_eq!(params.len(), 2);
        assert_eq!((params[1].name.as_str(), params[1].index), ("b", 1));
        p.connect_output(b, 0, 0).unwrap();
        p.init_for_point(PointInfo::at(0.0, 0.0, 0.0).with_params(&[0.1, 0.9]));
        assert_eq!(p.output_value(0), 0.9);
        p.delete_module(0).unwrap();
        p.init_for_point(PointInfo::at(0.0, 0.0, 0.0).with_params(&[0.1, 0.9]));
        assert_eq!(p.output_value(0), 0.1);
    }

    #[test]
    fn copy_requires_matching_outputs() {
        let src = sample();
        let mut dst = Procedure::new(number_outputs(3));
        assert!(matches!(
            dst.copy_from(&src),
            Err(ProcError::OutputShapeMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn copy_keeps_output_identity() {
        let src = sample();
        let mut dst = Procedure::new(number_outputs(2));
        let out_id = dst.outputs()[0].id();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.outputs()[0].id(), out_id);
        assert_eq!(dst.links(), src.links());
        assert_ne!(dst.modules()[0].id(), src.modules()[0].id());
    }

    #[test]
    fn stream_round_trip() {
        let src = sample();
        let images = ImageLibrary::new();
        let mut buf = Vec::new();
        src.write_to(&mut buf, &images).unwrap();
        let mut dst = Procedure::new(number_outputs(2));
        dst.read_from(buf.as_slice(), &images).unwrap();
        assert_eq!(dst.modules().len(), 3);
        assert_eq!(dst.links(), src.links());
        dst.init_for_point(PointInfo::at(-1.0, 0.0, 0.0));
        assert_eq!(dst.output_value(0), 1.0);
    }

    #[test]
    fn failed_read_leaves_procedure_untouched() {
        let src = sample();
        let images = ImageLibrary::new();
        let mut buf = Vec::new();
        src.write_to(&mut buf, &images).unwrap();
        buf.truncate(buf.len() - 3);
        let mut dst = sample();
        let revision = dst.revision();
        assert!(dst.read_from(buf.as_slice(), &images).is_err());
        assert_eq!(dst.modules().len(), 3);
        assert_eq!(dst.revision(), revision);
    }

    #[test]
    fn cyclic_link_table_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut w = DataWriter::new(&mut buf);
            w.write_i16(0).unwrap();
            w.write_i32(2).unwrap();
            for _ in 0..2 {
                w.write_utf("artofillusion.procedural.SumModule").unwrap();
                w.write_i32(0).unwrap();
                w.write_i32(0).unwrap();
            }
            w.write_i32(2).unwrap();
            for (a, b) in [(0, 1), (1, 0)] {
                w.write_i32(a).unwrap();
                w.write_i32(0).unwrap();
                w.write_i32(b).unwrap();
                w.write_i32(0).unwrap();
            }
        }
        let mut p = Procedure::new(number_outputs(1));
        let err = p.read_from(buf.as_slice(), &ImageLibrary::new()).unwrap_err();
        assert!(matches!(err, ProcError::InvalidFormat(_)));
    }

    #[test]
    fn has_cycle_detects_loops() {
        let mut inputs: Vec<InputTable> = vec![SmallVec::from_elem(None, 1); 2];
        assert!(!has_cycle(&inputs));
        inputs[1][0] = Some(Source { module: 0, port: 0 });
        assert!(!has_cycle(&inputs));
        inputs[0][0] = Some(Source { module: 1, port: 0 });
        assert!(has_cycle(&inputs));
    }
}
