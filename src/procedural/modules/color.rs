// procedural/modules/color.rs — color algebra and color construction

use crate::math::RGBColor;
use crate::procedural::eval::Evaluator;
use crate::procedural::module::ColorSource;
use crate::procedural::port::{Port, PortSide};

const fn color_pair(default: RGBColor) -> [Port; 2] {
    [
        Port::color_in("Color 1", default).on(PortSide::Top),
        Port::color_in("Color 2", default).on(PortSide::Bottom),
    ]
}

const BLACK_PAIR: [Port; 2] = color_pair(RGBColor::BLACK);
const WHITE_PAIR: [Port; 2] = color_pair(RGBColor::WHITE);

fn both(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> (RGBColor, RGBColor) {
    (ev.input_color(id, 0, blur), ev.input_color(id, 1, blur))
}

// ── Sum / Product / Difference ──────────────────────────────────────

const SUM_OUT: [Port; 1] = [Port::color_out("Sum")];
const PRODUCT_OUT: [Port; 1] = [Port::color_out("Product")];
const DIFFERENCE_OUT: [Port; 1] = [Port::color_out("Difference")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorSumModule;

impl ColorSource for ColorSumModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let (a, b) = both(ev, id, blur);
        a + b
    }
}

stateless_kind!(ColorSumModule, "ColorSum", BLACK_PAIR, SUM_OUT, color);

/// Component-wise product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorProductModule;

impl ColorSource for ColorProductModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let (a, b) = both(ev, id, blur);
        a * b
    }
}

stateless_kind!(ColorProductModule, "ColorProduct", WHITE_PAIR, PRODUCT_OUT, color);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorDifferenceModule;

impl ColorSource for ColorDifferenceModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let (a, b) = both(ev, id, blur);
        a - b
    }
}

stateless_kind!(ColorDifferenceModule, "ColorDifference", BLACK_PAIR, DIFFERENCE_OUT, color);

// ── Scale ───────────────────────────────────────────────────────────

const SCALE_IN: [Port; 2] = [
    Port::color_in("Color", RGBColor::WHITE).on(PortSide::Top),
    Port::number_in("Scale", 1.0).on(PortSide::Bottom),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorScaleModule;

impl ColorSource for ColorScaleModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let c = ev.input_color(id, 0, blur);
        c.scale(ev.input_value(id, 1, blur) as f32)
    }
}

stateless_kind!(ColorScaleModule, "ColorScale", SCALE_IN, PRODUCT_OUT, color);

// ── Darken / Lighten ────────────────────────────────────────────────

const DARKER_OUT: [Port; 1] = [Port::color_out("Darker")];
const LIGHTER_OUT: [Port; 1] = [Port::color_out("Lighter")];

/// The darker input by brightness; ties go to color 2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorDarkenModule;

impl ColorSource for ColorDarkenModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let (a, b) = both(ev, id, blur);
        if a.brightness() < b.brightness() {
            a
        } else {
            b
        }
    }
}

stateless_kind!(ColorDarkenModule, "ColorDarken", WHITE_PAIR, DARKER_OUT, color);

/// The lighter input by brightness; ties go to color 2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorLightenModule;

impl ColorSource for ColorLightenModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let (a, b) = both(ev, id, blur);
        if a.brightness() > b.brightness() {
            a
        } else {
            b
        }
    }
}

stateless_kind!(ColorLightenModule, "ColorLighten", BLACK_PAIR, LIGHTER_OUT, color);

// ── Blend ───────────────────────────────────────────────────────────

const BLEND_IN: [Port; 3] = [
    Port::color_in("Color 1", RGBColor::BLACK).on(PortSide::Top),
    Port::color_in("Color 2", RGBColor::WHITE).on(PortSide::Bottom),
    Port::number_in("Fraction", 0.5).with_range(0.0, 1.0),
];
const BLEND_OUT: [Port; 1] = [Port::color_out("Blend")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendModule;

impl ColorSource for BlendModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let f = ev.input_value(id, 2, blur).clamp(0.0, 1.0);
        // Skip pulling an input whose weight is zero.
        if f == 0.0 {
            return ev.input_color(id, 0, blur);
        }
        if f == 1.0 {
            return ev.input_color(id, 1, blur);
        }
        let (a, b) = both(ev, id, blur);
        a.lerp(b, f as f32)
    }
}

stateless_kind!(BlendModule, "Blend", BLEND_IN, BLEND_OUT, color);

// ── RGB / HSV ───────────────────────────────────────────────────────

const RGB_IN: [Port; 3] = [
    Port::number_in("Red", 0.0),
    Port::number_in("Green", 0.0),
    Port::number_in("Blue", 0.0),
];
const HSV_IN: [Port; 3] = [
    Port::number_in("Hue", 1.0),
    Port::number_in("Saturation", 1.0).with_range(0.0, 1.0),
    Port::number_in("Value", 1.0),
];
const COLOR_OUT: [Port; 1] = [Port::color_out("Color")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RGBModule;

impl ColorSource for RGBModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        RGBColor::new(
            ev.input_value(id, 0, blur) as f32,
            ev.input_value(id, 1, blur) as f32,
            ev.input_value(id, 2, blur) as f32,
        )
    }
}

stateless_kind!(RGBModule, "RGB", RGB_IN, COLOR_OUT, color);

/// Hue in turns (wrapped to [0, 1)), saturation clamped to [0, 1], value.
///
/// A blurred hue is approximated by averaging the colors at the two ends of
/// its error interval, with the half-width capped at a quarter turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HSVModule;

impl ColorSource for HSVModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let hue = ev.input_value(id, 0, blur);
        let saturation = ev.input_value(id, 1, blur).clamp(0.0, 1.0) as f32;
        let value = ev.input_value(id, 2, blur) as f32;
        let hue_error = (0.5 * ev.input_error(id, 0, blur)).min(0.25);
        let turn = |h: f64| ((h - h.floor()) * 360.0) as f32;
        if hue_error == 0.0 {
            return RGBColor::from_hsv(turn(hue), saturation, value);
        }
        let lo = RGBColor::from_hsv(turn(hue - hue_error), saturation, value);
        let hi = RGBColor::from_hsv(turn(hue + hue_error), saturation, value);
        lo.lerp(hi, 0.5)
    }
}

stateless_kind!(HSVModule, "HSV", HSV_IN, COLOR_OUT, color);
