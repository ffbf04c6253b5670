// procedural/eval.rs — lazy pull evaluation with per-point memoization
//
// `EvalState` holds one memo slot per (module, output port, capability). A
// slot is valid when its generation stamp equals the current generation and
// its blur equals the requested blur. Moving to a new sample point is an O(1)
// generation bump instead of a reset pass over every module.
//
// `Evaluator` borrows the procedure's immutable graph alongside the mutable
// memo. Module kinds receive it and pull their inputs through it, so the
// graph is walked on demand from whichever output is queried.

use smallvec::SmallVec;

use super::link::Source;
use super::module::{Module, OutputModule};
use super::point::PointInfo;
use super::port::{PortDefault, ValueType};
use crate::math::{RGBColor, Vec3};

/// Per-module input wiring, parallel to the module's input ports.
pub(crate) type InputTable = SmallVec<[Option<Source>; 4]>;

// ── Memo ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Memo<T: Copy + Default> {
    gen: u32,
    blur: u64,
    value: T,
}

impl<T: Copy + Default> Memo<T> {
    #[inline]
    fn get(&self, gen: u32, blur: f64) -> Option<T> {
        if self.gen == gen && self.blur == blur.to_bits() {
            Some(self.value)
        } else {
            None
        }
    }

    #[inline]
    fn set(&mut self, gen: u32, blur: f64, value: T) {
        self.gen = gen;
        self.blur = blur.to_bits();
        self.value = value;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PortMemo {
    value: Memo<f64>,
    error: Memo<f64>,
    gradient: Memo<Vec3>,
    color: Memo<RGBColor>,
}

/// Memo storage and the current sample point.
#[derive(Debug, Clone)]
pub(crate) struct EvalState {
    memo: Vec<SmallVec<[PortMemo; 1]>>,
    /// Per module: generation stamp and memo misses counted under it.
    computed: Vec<(u32, u32)>,
    /// Generation of the current point. Starts at 1 so zeroed slots are stale.
    current_gen: u32,
    point: PointInfo,
}

impl EvalState {
    pub(crate) fn new() -> Self {
        Self {
            memo: Vec::new(),
            computed: Vec::new(),
            current_gen: 1,
            point: PointInfo::default(),
        }
    }

    /// Start a new sample point.
    pub(crate) fn init(&mut self, point: PointInfo) {
        self.point = point;
        self.invalidate();
    }

    /// Drop every memoized result.
    pub(crate) fn invalidate(&mut self) {
        self.current_gen = self.current_gen.wrapping_add(1);
        if self.current_gen == 0 {
            for slots in &mut self.memo {
                slots.iter_mut().for_each(|s| *s = PortMemo::default());
            }
            self.computed.iter_mut().for_each(|c| *c = (0, 0));
            self.current_gen = 1;
        }
    }

    /// Resize the memo to match the module list.
    pub(crate) fn rebuild(&mut self, modules: &[Module]) {
        self.memo = modules
            .iter()
            .map(|m| SmallVec::from_elem(PortMemo::default(), m.output_ports().len()))
            .collect();
        self.computed = vec![(0, 0); modules.len()];
        self.invalidate();
    }

    pub(crate) fn point(&self) -> &PointInfo {
        &self.point
    }

    /// Outputs of `module` computed (rather than read from the memo) since
    /// the last `init`.
    pub(crate) fn computations(&self, module: usize) -> u32 {
        self.computed
            .get(module)
            .filter(|c| c.0 == self.current_gen)
            .map_or(0, |c| c.1)
    }

    #[inline]
    fn record(&mut self, module: usize) {
        let gen = self.current_gen;
        if let Some(c) = self.computed.get_mut(module) {
            if c.0 != gen {
                *c = (gen, 0);
            }
            c.1 += 1;
        }
    }

    #[inline]
    fn slot(&mut self, module: usize, output: usize) -> Option<&mut PortMemo> {
        self.memo.get_mut(module).and_then(|s| s.get_mut(output))
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

/// Pull-based evaluator over one procedure.
pub struct Evaluator<'a> {
    pub(crate) modules: &'a [Module],
    pub(crate) inputs: &'a [InputTable],
    pub(crate) outputs: &'a [OutputModule],
    pub(crate) output_inputs: &'a [Option<Source>],
    pub(crate) state: &'a mut EvalState,
}

impl<'a> Evaluator<'a> {
    pub fn point(&self) -> &PointInfo {
        self.state.point()
    }

    fn output_type(&self, module: usize, output: usize) -> Option<ValueType> {
        self.modules
            .get(module)
            .and_then(|m| m.output_ports().get(output))
            .map(|p| p.value_type)
    }

    /// Average value of a module output over the footprint. A COLOR output
    /// reads as its brightness.
    pub fn value(&mut self, module: usize, output: usize, blur: f64) -> f64 {
        let gen = self.state.current_gen;
        if let Some(v) = self.state.slot(module, output).and_then(|s| s.value.get(gen, blur)) {
            return v;
        }
        let modules = self.modules;
        self.state.record(module);
        let v = match self.output_type(module, output) {
            Some(ValueType::Number) => match modules[module].kind.as_number() {
                Some(src) => src.value(self, module, output, blur),
                None => 0.0,
            },
            Some(ValueType::Color) => self.color(module, output, blur).brightness() as f64,
            None => return 0.0,
        };
        if let Some(s) = self.state.slot(module, output) {
            s.value.set(gen, blur, v);
        }
        v
    }

    /// Non-negative half-width error bound of a module output.
    pub fn error(&mut self, module: usize, output: usize, blur: f64) -> f64 {
        let gen = self.state.current_gen;
        if let Some(v) = self.state.slot(module, output).and_then(|s| s.error.get(gen, blur)) {
            return v;
        }
        let modules = self.modules;
        self.state.record(module);
        let e = match self.output_type(module, output) {
            Some(ValueType::Number) => match modules[module].kind.as_number() {
                Some(src) => src.error(self, module, output, blur),
                None => 0.0,
            },
            _ => 0.0,
        };
        // NaN.max(0.0) is 0.0
        let e = e.abs().max(0.0);
        if let Some(s) = self.state.slot(module, output) {
            s.error.set(gen, blur, e);
        }
        e
    }

    /// Spatial gradient of a module output.
    pub fn gradient(&mut self, module: usize, output: usize, blur: f64) -> Vec3 {
        let gen = self.state.current_gen;
        if let Some(v) = self.state.slot(module, output).and_then(|s| s.gradient.get(gen, blur)) {
            return v;
        }
        let modules = self.modules;
        self.state.record(module);
        let g = match self.output_type(module, output) {
            Some(ValueType::Number) => match modules[module].kind.as_number() {
                Some(src) => src.gradient(self, module, output, blur),
                None => Vec3::ZERO,
            },
            _ => Vec3::ZERO,
        };
        if let Some(s) = self.state.slot(module, output) {
            s.gradient.set(gen, blur, g);
        }
        g
    }

    /// Color of a module output. A NUMBER output reads as gray.
    pub fn color(&mut self, module: usize, output: usize, blur: f64) -> RGBColor {
        let gen = self.state.current_gen;
        if let Some(v) = self.state.slot(module, output).and_then(|s| s.color.get(gen, blur)) {
            return v;
        }
        let modules = self.modules;
        self.state.record(module);
        let c = match self.output_type(module, output) {
            Some(ValueType::Color) => match modules[module].kind.as_color() {
                Some(src) => src.color(self, module, output, blur),
                None => RGBColor::BLACK,
            },
            Some(ValueType::Number) => RGBColor::gray(self.value(module, output, blur)),
            None => return RGBColor::BLACK,
        };
        if let Some(s) = self.state.slot(module, output) {
            s.color.set(gen, blur, c);
        }
        c
    }

    // ── Inputs ──

    #[inline]
    fn source(&self, module: usize, input: usize) -> Option<Source> {
        self.inputs.get(module).and_then(|t| t.get(input)).copied().flatten()
    }

    fn input_default(&self, module: usize, input: usize) -> PortDefault {
        self.modules[module]
            .input_ports()
            .get(input)
            .map(|p| p.default)
            .unwrap_or(PortDefault::Value(0.0))
    }

    pub fn is_connected(&self, module: usize, input: usize) -> bool {
        self.source(module, input).is_some()
    }

    /// Value arriving at an input, or the port's default.
    pub fn input_value(&mut self, module: usize, input: usize, blur: f64) -> f64 {
        if let Some(src) = self.source(module, input) {
            return self.value(src.module, src.port, blur);
        }
        match self.input_default(module, input) {
            PortDefault::Value(v) => v,
            PortDefault::Color(c) => c.brightness() as f64,
            PortDefault::Coordinate(axis) => self.point().coord(axis),
        }
    }

    pub fn input_error(&mut self, module: usize, input: usize, blur: f64) -> f64 {
        if let Some(src) = self.source(module, input) {
            return self.error(src.module, src.port, blur);
        }
        match self.input_default(module, input) {
            PortDefault::Coordinate(axis) => 0.5 * self.point().size(axis) + blur,
            _ => 0.0,
        }
    }

    pub fn input_gradient(&mut self, module: usize, input: usize, blur: f64) -> Vec3 {
        if let Some(src) = self.source(module, input) {
            return self.gradient(src.module, src.port, blur);
        }
        match self.input_default(module, input) {
            PortDefault::Coordinate(axis) => Vec3::axis(axis),
            _ => Vec3::ZERO,
        }
    }

    pub fn input_color(&mut self, module: usize, input: usize, blur: f64) -> RGBColor {
        if let Some(src) = self.source(module, input) {
            return self.color(src.module, src.port, blur);
        }
        match self.input_default(module, input) {
            PortDefault::Color(c) => c,
            PortDefault::Value(v) => RGBColor::gray(v),
            PortDefault::Coordinate(axis) => RGBColor::gray(self.point().coord(axis)),
        }
    }

    /// Chain a derivative taken with respect to inputs 0..3 through those
    /// inputs' spatial gradients.
    pub fn chain_inputs(&mut self, module: usize, first_input: usize, d: Vec3, blur: f64) -> Vec3 {
        let mut g = Vec3::ZERO;
        for axis in 0..3 {
            if d[axis] != 0.0 {
                g += self.input_gradient(module, first_input + axis, blur) * d[axis];
            }
        }
        g
    }

    // ── Output modules ──

    /// Value of output module `slot`, or its default when unconnected.
    pub fn output_value(&mut self, slot: usize) -> f64 {
        match self.output_inputs.get(slot).copied().flatten() {
            Some(src) => self.value(src.module, src.port, 0.0),
            None => self.outputs.get(slot).map_or(0.0, |o| o.default_value),
        }
    }

    pub fn output_error(&mut self, slot: usize) -> f64 {
        match self.output_inputs.get(slot).copied().flatten() {
            Some(src) => self.error(src.module, src.port, 0.0),
            None => 0.0,
        }
    }

    pub fn output_gradient(&mut self, slot: usize) -> Vec3 {
        match self.output_inputs.get(slot).copied().flatten() {
            Some(src) => self.gradient(src.module, src.port, 0.0),
            None => Vec3::ZERO,
        }
    }

    pub fn output_color(&mut self, slot: usize) -> RGBColor {
        match self.output_inputs.get(slot).copied().flatten() {
            Some(src) => self.color(src.module, src.port, 0.0),
            None => self.outputs.get(slot).map_or(RGBColor::BLACK, |o| o.default_color),
        }
    }
}
