// procedural/modules/arithmetic.rs — two-input numeric operators
//
// Errors propagate as first-order bounds from the input errors; gradients by
// the chain rule. Unconnected inputs read as their port defaults.

use super::{wrap_fraction, Filtered};
use crate::math::{Dual3, Interval, Vec3};
use crate::procedural::eval::Evaluator;
use crate::procedural::module::NumberSource;
use crate::procedural::port::{Port, PortSide};

const TWO_VALUES: [Port; 2] = [
    Port::number_in("Value 1", 0.0).on(PortSide::Top),
    Port::number_in("Value 2", 0.0).on(PortSide::Bottom),
];

/// Inputs 0 and 1 with their errors.
struct Operands {
    a: f64,
    b: f64,
    ea: f64,
    eb: f64,
}

fn operands(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> Operands {
    Operands {
        a: ev.input_value(id, 0, blur),
        b: ev.input_value(id, 1, blur),
        ea: ev.input_error(id, 0, blur),
        eb: ev.input_error(id, 1, blur),
    }
}

fn dual_input(ev: &mut Evaluator<'_>, id: usize, input: usize, blur: f64) -> Dual3 {
    Dual3::new(ev.input_value(id, input, blur), ev.input_gradient(id, input, blur))
}

// ── Sum / Difference / Product ──────────────────────────────────────

const SUM_OUT: [Port; 1] = [Port::number_out("Sum")];
const DIFFERENCE_OUT: [Port; 1] = [Port::number_out("Difference")];
const PRODUCT_OUT: [Port; 1] = [Port::number_out("Product")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SumModule;

impl NumberSource for SumModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_value(id, 0, blur) + ev.input_value(id, 1, blur)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_error(id, 0, blur) + ev.input_error(id, 1, blur)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        ev.input_gradient(id, 0, blur) + ev.input_gradient(id, 1, blur)
    }
}

stateless_kind!(SumModule, "Sum", TWO_VALUES, SUM_OUT, number);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DifferenceModule;

impl NumberSource for DifferenceModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_value(id, 0, blur) - ev.input_value(id, 1, blur)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_error(id, 0, blur) + ev.input_error(id, 1, blur)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        ev.input_gradient(id, 0, blur) - ev.input_gradient(id, 1, blur)
    }
}

stateless_kind!(DifferenceModule, "Difference", TWO_VALUES, DIFFERENCE_OUT, number);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductModule;

impl NumberSource for ProductModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        ev.input_value(id, 0, blur) * ev.input_value(id, 1, blur)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let o = operands(ev, id, blur);
        (o.a * o.eb).abs() + (o.b * o.ea).abs()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let a = dual_input(ev, id, 0, blur);
        let b = dual_input(ev, id, 1, blur);
        (a * b).grad
    }
}

stateless_kind!(ProductModule, "Product", TWO_VALUES, PRODUCT_OUT, number);

// ── Ratio ───────────────────────────────────────────────────────────

const RATIO_IN: [Port; 2] = [
    Port::number_in("Numerator", 0.0).on(PortSide::Top),
    Port::number_in("Denominator", 1.0).on(PortSide::Bottom),
];
const RATIO_OUT: [Port; 1] = [Port::number_out("Ratio")];

/// `a / b`, with 0 for a zero denominator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatioModule;

impl NumberSource for RatioModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let b = ev.input_value(id, 1, blur);
        if b == 0.0 {
            return 0.0;
        }
        ev.input_value(id, 0, blur) / b
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let o = operands(ev, id, blur);
        if o.b == 0.0 {
            return 0.0;
        }
        (o.ea + (o.a / o.b).abs() * o.eb) / o.b.abs()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let a = dual_input(ev, id, 0, blur);
        let b = dual_input(ev, id, 1, blur);
        (a / b).grad
    }
}

stateless_kind!(RatioModule, "Ratio", RATIO_IN, RATIO_OUT, number);

// ── Mod ─────────────────────────────────────────────────────────────

const MOD_IN: [Port; 2] = [
    Port::number_in("Value", 0.0).on(PortSide::Top),
    Port::number_in("Modulus", 1.0).on(PortSide::Bottom),
];
const MOD_OUT: [Port; 1] = [Port::number_out("Output")];

/// Floor-style remainder, box-filtered over the input's error so the
/// sawtooth antialiases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModModule;

impl ModModule {
    fn filtered(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> Option<(f64, Filtered)> {
        let m = ev.input_value(id, 1, blur);
        if m == 0.0 {
            return None;
        }
        let v = ev.input_value(id, 0, blur);
        let e = ev.input_error(id, 0, blur);
        Some((m, wrap_fraction(v / m, e / m.abs())))
    }
}

impl NumberSource for ModModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        Self::filtered(ev, id, blur).map_or(0.0, |(m, f)| m * f.value)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        Self::filtered(ev, id, blur).map_or(0.0, |(m, f)| m.abs() * f.error)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        match Self::filtered(ev, id, blur) {
            Some((_, f)) => ev.input_gradient(id, 0, blur) * f.slope,
            None => Vec3::ZERO,
        }
    }
}

stateless_kind!(ModModule, "Mod", MOD_IN, MOD_OUT, number);

// ── Min / Max ───────────────────────────────────────────────────────

const MIN_OUT: [Port; 1] = [Port::number_out("Minimum")];
const MAX_OUT: [Port; 1] = [Port::number_out("Maximum")];

/// Index of the selected input: the smaller one for `Min`, the larger for
/// `Max`. Ties select input 0.
fn select(ev: &mut Evaluator<'_>, id: usize, blur: f64, larger: bool) -> usize {
    let a = ev.input_value(id, 0, blur);
    let b = ev.input_value(id, 1, blur);
    let pick_b = if larger { b > a } else { b < a };
    usize::from(pick_b)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinModule;

impl NumberSource for MinModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let i = select(ev, id, blur, false);
        ev.input_value(id, i, blur)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let i = select(ev, id, blur, false);
        ev.input_error(id, i, blur)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let i = select(ev, id, blur, false);
        ev.input_gradient(id, i, blur)
    }
}

stateless_kind!(MinModule, "Min", TWO_VALUES, MIN_OUT, number);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxModule;

impl NumberSource for MaxModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let i = select(ev, id, blur, true);
        ev.input_value(id, i, blur)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let i = select(ev, id, blur, true);
        ev.input_error(id, i, blur)
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let i = select(ev, id, blur, true);
        ev.input_gradient(id, i, blur)
    }
}

stateless_kind!(MaxModule, "Max", TWO_VALUES, MAX_OUT, number);

// ── Power ───────────────────────────────────────────────────────────

/// Integer exponent, when `b` is a constant whole number.
fn integer_exponent(b: f64, constant: bool) -> Option<i32> {
    (constant && b.fract() == 0.0 && b.abs() <= i32::MAX as f64).then_some(b as i32)
}

/// `a^b`. A constant whole exponent gives the true power; otherwise the odd
/// extension `sign(a) * |a|^b` keeps the result real for negative bases.
fn signed_pow(a: f64, b: f64, constant_exponent: bool) -> f64 {
    match integer_exponent(b, constant_exponent) {
        Some(n) => a.powi(n),
        None => a.signum() * a.abs().powf(b),
    }
}

pub(crate) fn signed_pow_dual(a: Dual3, b: Dual3, constant_exponent: bool) -> Dual3 {
    if let Some(n) = integer_exponent(b.val, constant_exponent) {
        let val = a.val.powi(n);
        let d = if n == 0 { 0.0 } else { n as f64 * a.val.powi(n - 1) };
        return a.chain(val, d);
    }
    let mag = a.val.abs();
    if mag == 0.0 {
        let d = if b.val == 1.0 { 1.0 } else { 0.0 };
        return a.chain(0.0, d);
    }
    let val = a.val.signum() * mag.powf(b.val);
    let da = b.val * mag.powf(b.val - 1.0);
    let db = val * mag.ln();
    Dual3::new(val, a.grad * da + b.grad * db)
}

pub(crate) fn signed_pow_interval(a: Interval, b: Interval, constant_exponent: bool) -> Interval {
    if b.lo == b.hi {
        if let Some(n) = integer_exponent(b.lo, constant_exponent) {
            return a.powi(n);
        }
        return a.signed_powf(b.lo);
    }
    if a.contains(0.0) && b.lo < 0.0 {
        return Interval::EVERYTHING;
    }
    // Monotone in each argument separately, so the corners bound the box.
    Interval::corners(a, b, |x, y| x.signum() * x.abs().powf(y))
}

const POWER_IN: [Port; 2] = [
    Port::number_in("Base", 1.0).on(PortSide::Top),
    Port::number_in("Exponent", 1.0).on(PortSide::Bottom),
];
const POWER_OUT: [Port; 1] = [Port::number_out("Power")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerModule;

impl NumberSource for PowerModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let o = operands(ev, id, blur);
        signed_pow(o.a, o.b, o.eb == 0.0)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        let o = operands(ev, id, blur);
        let range = signed_pow_interval(
            Interval::around(o.a, o.ea),
            Interval::around(o.b, o.eb),
            o.eb == 0.0,
        );
        let w = range.half_width();
        if w.is_finite() {
            return w;
        }
        let d = signed_pow_dual(
            Dual3::new(o.a, Vec3::X),
            Dual3::new(o.b, Vec3::Y),
            o.eb == 0.0,
        );
        (d.grad.x * o.ea).abs() + (d.grad.y * o.eb).abs()
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        let a = dual_input(ev, id, 0, blur);
        let b = dual_input(ev, id, 1, blur);
        let eb = ev.input_error(id, 1, blur);
        signed_pow_dual(a, b, eb == 0.0).grad
    }
}

stateless_kind!(PowerModule, "Power", POWER_IN, POWER_OUT, number);
