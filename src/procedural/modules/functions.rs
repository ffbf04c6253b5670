// procedural/modules/functions.rs — single-input functions, shaping curves
// and user expressions
//
// Nonlinear functions with bounded range (Exp, Sine, Cosine) report the
// average over the input's error interval instead of the point value, so a
// wide footprint fades toward the mean rather than aliasing.

use std::io::{Read, Write};

use super::box_clamp;
use crate::error::Result;
use crate::math::{Dual3, Interval, Vec3};
use crate::procedural::eval::Evaluator;
use crate::procedural::expr::{bias, bias_slope, gain, gain_slope, Program, VAR_COUNT};
use crate::procedural::graph::{field_f64, field_str, Fields};
use crate::procedural::image::ImageLibrary;
use crate::procedural::module::{ModuleType, NumberSource};
use crate::procedural::port::{Port, PortSide};
use crate::procedural::stream::{DataReader, DataWriter};

const ONE_INPUT: [Port; 1] = [Port::number_in("Input", 0.0)];
const OUTPUT: [Port; 1] = [Port::number_out("Output")];

// ── Abs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsModule;

impl NumberSource for AbsModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_value(id, 0, blur).abs()
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_error(id, 0, blur)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let g = ev.input_gradient(id, 0, blur);
        if ev.input_value(id, 0, blur) < 0.0 {
            -g
        } else {
            g
        }
    }
}

stateless_kind!(AbsModule, "Abs", ONE_INPUT, OUTPUT, number);

// ── Exp ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpModule;

fn averaged_exp(v: f64, e: f64) -> f64 {
    if e == 0.0 {
        v.exp()
    } else {
        ((v + e).exp() - (v - e).exp()) / (2.0 * e)
    }
}

impl NumberSource for ExpModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        averaged_exp(v, e)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let e = ev.input_error(id, 0, blur);
        e * ev.value(id, 0, blur)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        // The averaged exponential is its own derivative.
        let scale = ev.value(id, 0, blur);
        ev.input_gradient(id, 0, blur) * scale
    }
}

stateless_kind!(ExpModule, "Exp", ONE_INPUT, OUTPUT, number);

// ── Log ─────────────────────────────────────────────────────────────

/// Natural log; 0 for non-positive input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogModule;

impl NumberSource for LogModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        if v <= 0.0 {
            0.0
        } else {
            v.ln()
        }
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        if v <= 0.0 {
            return 0.0;
        }
        ev.input_error(id, 0, blur) / v
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let v = ev.input_value(id, 0, blur);
        if v <= 0.0 {
            return Vec3::ZERO;
        }
        ev.input_gradient(id, 0, blur) * (1.0 / v)
    }
}

stateless_kind!(LogModule, "Log", ONE_INPUT, OUTPUT, number);

// ── Sine / Cosine ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SineModule;

impl NumberSource for SineModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        if e == 0.0 {
            return v.sin();
        }
        ((v - e).cos() - (v + e).cos()) / (2.0 * e)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        (v.cos() * e).abs().min(1.0)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let v = ev.input_value(id, 0, blur);
        ev.input_gradient(id, 0, blur) * v.cos()
    }
}

stateless_kind!(SineModule, "Sine", ONE_INPUT, OUTPUT, number);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CosineModule;

impl NumberSource for CosineModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        if e == 0.0 {
            return v.cos();
        }
        ((v + e).sin() - (v - e).sin()) / (2.0 * e)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        (v.sin() * e).abs().min(1.0)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let v = ev.input_value(id, 0, blur);
        ev.input_gradient(id, 0, blur) * -v.sin()
    }
}

stateless_kind!(CosineModule, "Cosine", ONE_INPUT, OUTPUT, number);

// ── Sqrt ────────────────────────────────────────────────────────────

/// Square root; 0 for negative input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqrtModule;

impl NumberSource for SqrtModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_value(id, 0, blur).max(0.0).sqrt()
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        Interval::around(v, e).sqrt().half_width()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let v = ev.input_value(id, 0, blur);
        if v <= 0.0 {
            return Vec3::ZERO;
        }
        ev.input_gradient(id, 0, blur) * (0.5 / v.sqrt())
    }
}

stateless_kind!(SqrtModule, "Sqrt", ONE_INPUT, OUTPUT, number);

// ── Clip ────────────────────────────────────────────────────────────

/// Clamp to `[min, max]`, smoothed over the input's error.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipModule {
    pub min: f64,
    pub max: f64,
}

impl Default for ClipModule {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ClipModule {
    fn filtered(&self, ev: &mut Evaluator<'_>, id: usize, blur: f64) -> super::Filtered {
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        box_clamp(v, e, self.min, self.max)
    }
}

impl NumberSource for ClipModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        self.filtered(ev, id, blur).value
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        self.filtered(ev, id, blur).error
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let slope = self.filtered(ev, id, blur).slope;
        ev.input_gradient(id, 0, blur) * slope
    }
}

impl ModuleType for ClipModule {
    const TYPE_NAME: &'static str = "Clip";

    fn inputs(&self) -> &'static [Port] {
        &ONE_INPUT
    }

    fn outputs(&self) -> &'static [Port] {
        &OUTPUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_f64(self.min)?;
        out.write_f64(self.max)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.min = input.read_f64()?;
        self.max = input.read_f64()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.min = field_f64(fields, "Min", self.min);
        self.max = field_f64(fields, "Max", self.max);
        Ok(())
    }
}

// ── ScaleShift ──────────────────────────────────────────────────────

/// `input * scale + shift`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleShiftModule {
    pub scale: f64,
    pub shift: f64,
}

impl Default for ScaleShiftModule {
    fn default() -> Self {
        Self {
            scale: 1.0,
            shift: 0.0,
        }
    }
}

impl NumberSource for ScaleShiftModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_value(id, 0, blur) * self.scale + self.shift
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_error(id, 0, blur) * self.scale.abs()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        ev.input_gradient(id, 0, blur) * self.scale
    }
}

impl ModuleType for ScaleShiftModule {
    const TYPE_NAME: &'static str = "ScaleShift";

    fn inputs(&self) -> &'static [Port] {
        &ONE_INPUT
    }

    fn outputs(&self) -> &'static [Port] {
        &OUTPUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_f64(self.scale)?;
        out.write_f64(self.shift)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.scale = input.read_f64()?;
        self.shift = input.read_f64()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.scale = field_f64(fields, "Scale", self.scale);
        self.shift = field_f64(fields, "Shift", self.shift);
        Ok(())
    }
}

// ── Bias / Gain ─────────────────────────────────────────────────────

const BIAS_IN: [Port; 2] = [
    Port::number_in("Input", 0.0),
    Port::number_in("Bias", 0.5).on(PortSide::Bottom).with_range(0.0, 1.0),
];
const GAIN_IN: [Port; 2] = [
    Port::number_in("Input", 0.0),
    Port::number_in("Gain", 0.5).on(PortSide::Bottom).with_range(0.0, 1.0),
];

/// Value and error of a monotone shaping curve over [0, 1].
fn shaped(ev: &mut Evaluator<'_>, id: usize, blur: f64, curve: fn(f64, f64) -> f64) -> (f64, f64) {
    let v = ev.input_value(id, 0, blur).clamp(0.0, 1.0);
    let e = ev.input_error(id, 0, blur);
    let p = ev.input_value(id, 1, blur);
    let spread = curve((v + e).min(1.0), p) - curve((v - e).max(0.0), p);
    (curve(v, p), 0.5 * spread.abs())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiasModule;

impl NumberSource for BiasModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        shaped(ev, id, blur, bias).0
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        shaped(ev, id, blur, bias).1
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let v = ev.input_value(id, 0, blur);
        let b = ev.input_value(id, 1, blur);
        ev.input_gradient(id, 0, blur) * bias_slope(v, b)
    }
}

stateless_kind!(BiasModule, "Bias", BIAS_IN, OUTPUT, number);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainModule;

impl NumberSource for GainModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        shaped(ev, id, blur, gain).0
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        shaped(ev, id, blur, gain).1
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let v = ev.input_value(id, 0, blur);
        if !(0.0..=1.0).contains(&v) {
            return Vec3::ZERO;
        }
        let g = ev.input_value(id, 1, blur);
        ev.input_gradient(id, 0, blur) * gain_slope(v, g)
    }
}

stateless_kind!(GainModule, "Gain", GAIN_IN, OUTPUT, number);

// ── Interp ──────────────────────────────────────────────────────────

const INTERP_IN: [Port; 3] = [
    Port::number_in("Value 1", 0.0).on(PortSide::Top),
    Port::number_in("Value 2", 1.0).on(PortSide::Bottom),
    Port::number_in("Fraction", 0.0).with_range(0.0, 1.0),
];
const INTERP_OUT: [Port; 1] = [Port::number_out("Interpolate")];

/// Linear blend of two values by a fraction clipped to [0, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpModule;

impl InterpModule {
    fn fraction(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> super::Filtered {
        let f = ev.input_value(id, 2, blur);
        let e = ev.input_error(id, 2, blur);
        box_clamp(f, e, 0.0, 1.0)
    }
}

impl NumberSource for InterpModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let f = Self::fraction(ev, id, blur).value;
        // Skip pulling an input whose weight is zero.
        let v1 = if f == 1.0 { 0.0 } else { ev.input_value(id, 0, blur) };
        let v2 = if f == 0.0 { 0.0 } else { ev.input_value(id, 1, blur) };
        (1.0 - f) * v1 + f * v2
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let frac = Self::fraction(ev, id, blur);
        let f = frac.value;
        let e1 = ev.input_error(id, 0, blur);
        let e2 = ev.input_error(id, 1, blur);
        let spread = ev.input_value(id, 1, blur) - ev.input_value(id, 0, blur);
        (1.0 - f) * e1 + f * e2 + (spread * frac.error).abs()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let frac = Self::fraction(ev, id, blur);
        let f = frac.value;
        let mut g = Vec3::ZERO;
        if f != 1.0 {
            g += ev.input_gradient(id, 0, blur) * (1.0 - f);
        }
        if f != 0.0 {
            g += ev.input_gradient(id, 1, blur) * f;
        }
        if frac.slope != 0.0 {
            let spread = ev.input_value(id, 1, blur) - ev.input_value(id, 0, blur);
            g += ev.input_gradient(id, 2, blur) * (spread * frac.slope);
        }
        g
    }
}

stateless_kind!(InterpModule, "Interp", INTERP_IN, INTERP_OUT, number);

// ── Blur ────────────────────────────────────────────────────────────

const BLUR_IN: [Port; 2] = [
    Port::number_in("Blur", 0.05).on(PortSide::Bottom),
    Port::number_in("Input", 0.0),
];

/// Re-evaluates its input with extra blur added to the footprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlurModule;

fn blurred(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> f64 {
    blur + ev.input_value(id, 0, blur).max(0.0)
}

impl NumberSource for BlurModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let b = blurred(ev, id, blur);
        ev.input_value(id, 1, b)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let b = blurred(ev, id, blur);
        ev.input_error(id, 1, b)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let b = blurred(ev, id, blur);
        ev.input_gradient(id, 1, b)
    }
}

stateless_kind!(BlurModule, "Blur", BLUR_IN, OUTPUT, number);

// ── Expr ────────────────────────────────────────────────────────────

const EXPR_IN: [Port; 3] = [
    Port::number_in("Value 1", 0.0),
    Port::number_in("Value 2", 0.0),
    Port::number_in("Value 3", 0.0),
];

/// A user-written formula over x, y, z, t and three inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprModule {
    source: String,
    program: Program,
}

impl Default for ExprModule {
    fn default() -> Self {
        Self {
            source: "x".into(),
            program: Program::variable(0),
        }
    }
}

impl ExprModule {
    pub fn new(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            program: Program::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the formula. On a parse error the module is unchanged.
    pub fn set_source(&mut self, source: &str) -> Result<()> {
        self.program = Program::parse(source)?;
        self.source = source.to_string();
        Ok(())
    }

    fn duals(&self, ev: &mut Evaluator<'_>, id: usize, blur: f64) -> [Dual3; VAR_COUNT] {
        let p = ev.point();
        let mut vars = [
            Dual3::new(p.x, Vec3::X),
            Dual3::new(p.y, Vec3::Y),
            Dual3::new(p.z, Vec3::Z),
            Dual3::constant(p.t),
            Dual3::constant(0.0),
            Dual3::constant(0.0),
            Dual3::constant(0.0),
        ];
        for i in 0..3 {
            if self.program.uses(4 + i) {
                vars[4 + i] = Dual3::new(ev.input_value(id, i, blur), ev.input_gradient(id, i, blur));
            }
        }
        vars
    }

    fn footprint(ev: &Evaluator<'_>, blur: f64) -> Vec3 {
        let p = ev.point();
        Vec3::new(
            0.5 * p.xsize + blur,
            0.5 * p.ysize + blur,
            0.5 * p.zsize + blur,
        )
    }
}

impl NumberSource for ExprModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let vars = self.duals(ev, id, blur);
        self.program.eval(&vars).val
    }

    /// Half-width of an interval evaluation over the footprint. Where the
    /// interval blows up (a division through zero) the gradient gives a
    /// first-order estimate instead.
    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let size = Self::footprint(ev, blur);
        let p = ev.point().clone();
        let mut vars = [
            Interval::around(p.x, size.x),
            Interval::around(p.y, size.y),
            Interval::around(p.z, size.z),
            Interval::point(p.t),
            Interval::point(0.0),
            Interval::point(0.0),
            Interval::point(0.0),
        ];
        for i in 0..3 {
            if self.program.uses(4 + i) {
                vars[4 + i] = Interval::around(ev.input_value(id, i, blur), ev.input_error(id, i, blur));
            }
        }
        let w = self.program.eval(&vars).half_width();
        if w.is_finite() {
            return w;
        }
        let g = self.gradient(ev, id, 0, blur);
        (g.x * size.x).abs() + (g.y * size.y).abs() + (g.z * size.z).abs()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let vars = self.duals(ev, id, blur);
        self.program.eval(&vars).grad
    }
}

impl ModuleType for ExprModule {
    const TYPE_NAME: &'static str = "Expr";

    fn inputs(&self) -> &'static [Port] {
        &EXPR_IN
    }

    fn outputs(&self) -> &'static [Port] {
        &OUTPUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_utf(&self.source)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        let source = input.read_utf()?;
        self.set_source(&source)
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        if fields.contains_key("Expression") {
            let source = field_str(fields, "Expression", "x").to_string();
            self.set_source(&source)?;
        }
        Ok(())
    }
}
