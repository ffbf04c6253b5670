// procedural/modules/values.rs — constants and point sources
//
// Kinds with no inputs. Their outputs come from their own parameters or from
// the sample point itself.

use std::io::{Read, Write};

use crate::error::{ProcError, Result};
use crate::math::{RGBColor, Vec3};
use crate::procedural::eval::Evaluator;
use crate::procedural::graph::{field_color, field_f64, field_str, Fields};
use crate::procedural::image::ImageLibrary;
use crate::procedural::module::{ColorSource, ModuleType, NumberSource};
use crate::procedural::port::Port;
use crate::procedural::stream::{DataReader, DataWriter};

const NO_PORTS: [Port; 0] = [];
const VALUE_OUT: [Port; 1] = [Port::number_out("Value")];

// ── Number ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberModule {
    pub value: f64,
}

impl NumberSource for NumberModule {
    fn value(&self, _ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> f64 {
        self.value
    }
}

impl ModuleType for NumberModule {
    const TYPE_NAME: &'static str = "Number";

    fn inputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn outputs(&self) -> &'static [Port] {
        &VALUE_OUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_f64(self.value)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.value = input.read_f64()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.value = field_f64(fields, "Value", self.value);
        Ok(())
    }
}

// ── Color ───────────────────────────────────────────────────────────

const COLOR_OUT: [Port; 1] = [Port::color_out("Color")];

#[derive(Debug, Clone, PartialEq)]
pub struct ColorModule {
    pub color: RGBColor,
}

impl Default for ColorModule {
    fn default() -> Self {
        Self {
            color: RGBColor::WHITE,
        }
    }
}

impl ColorSource for ColorModule {
    fn color(&self, _ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> RGBColor {
        self.color
    }
}

impl ModuleType for ColorModule {
    const TYPE_NAME: &'static str = "Color";

    fn inputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn outputs(&self) -> &'static [Port] {
        &COLOR_OUT
    }

    fn as_color(&self) -> Option<&dyn ColorSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_color(self.color)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.color = input.read_color()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.color = field_color(fields, "Color", self.color);
        Ok(())
    }
}

// ── Parameter ───────────────────────────────────────────────────────

/// A named per-object value supplied through `PointInfo::param`.
///
/// `index` is the module's position among the procedure's Parameter modules.
/// The procedure keeps it current; it is not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterModule {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    index: Option<usize>,
}

impl Default for ParameterModule {
    fn default() -> Self {
        Self {
            name: "Parameter".into(),
            min: 0.0,
            max: 1.0,
            default: 0.0,
            index: None,
        }
    }
}

impl ParameterModule {
    pub fn new(name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            default,
            index: None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }
}

impl NumberSource for ParameterModule {
    fn value(&self, ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> f64 {
        self.index
            .and_then(|i| ev.point().param.get(i).copied())
            .unwrap_or(self.default)
    }
}

impl ModuleType for ParameterModule {
    const TYPE_NAME: &'static str = "Parameter";

    fn inputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn outputs(&self) -> &'static [Port] {
        &VALUE_OUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_utf(&self.name)?;
        out.write_f64(self.min)?;
        out.write_f64(self.max)?;
        out.write_f64(self.default)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.name = input.read_utf()?;
        self.min = input.read_f64()?;
        self.max = input.read_f64()?;
        self.default = input.read_f64()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.name = field_str(fields, "Name", &self.name).to_string();
        self.min = field_f64(fields, "Min", self.min);
        self.max = field_f64(fields, "Max", self.max);
        self.default = field_f64(fields, "Default", self.default);
        if self.min > self.max {
            return Err(ProcError::Graph(format!(
                "parameter '{}' has min {} above max {}",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }
}

// ── Coordinate ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinateAxis {
    #[default]
    X,
    Y,
    Z,
    T,
}

impl CoordinateAxis {
    fn from_index(i: i32) -> Option<Self> {
        match i {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            3 => Some(Self::T),
            _ => None,
        }
    }

    fn index(self) -> i32 {
        self as i32
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "X" => Some(Self::X),
            "Y" => Some(Self::Y),
            "Z" => Some(Self::Z),
            "T" | "TIME" => Some(Self::T),
            _ => None,
        }
    }
}

const X_OUT: [Port; 1] = [Port::number_out("X")];
const Y_OUT: [Port; 1] = [Port::number_out("Y")];
const Z_OUT: [Port; 1] = [Port::number_out("Z")];
const T_OUT: [Port; 1] = [Port::number_out("Time")];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateModule {
    pub axis: CoordinateAxis,
}

impl CoordinateModule {
    pub fn new(axis: CoordinateAxis) -> Self {
        Self { axis }
    }
}

impl NumberSource for CoordinateModule {
    fn value(&self, ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> f64 {
        let p = ev.point();
        match self.axis {
            CoordinateAxis::X => p.x,
            CoordinateAxis::Y => p.y,
            CoordinateAxis::Z => p.z,
            CoordinateAxis::T => p.t,
        }
    }

    fn error(&self, ev: &mut Evaluator<'_>, _id: usize, _output: usize, blur: f64) -> f64 {
        let p = ev.point();
        match self.axis {
            CoordinateAxis::X => 0.5 * p.xsize + blur,
            CoordinateAxis::Y => 0.5 * p.ysize + blur,
            CoordinateAxis::Z => 0.5 * p.zsize + blur,
            CoordinateAxis::T => 0.0,
        }
    }

    fn gradient(&self, _ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> Vec3 {
        match self.axis {
            CoordinateAxis::X => Vec3::X,
            CoordinateAxis::Y => Vec3::Y,
            CoordinateAxis::Z => Vec3::Z,
            CoordinateAxis::T => Vec3::ZERO,
        }
    }
}

impl ModuleType for CoordinateModule {
    const TYPE_NAME: &'static str = "Coordinate";

    fn inputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn outputs(&self) -> &'static [Port] {
        match self.axis {
            CoordinateAxis::X => &X_OUT,
            CoordinateAxis::Y => &Y_OUT,
            CoordinateAxis::Z => &Z_OUT,
            CoordinateAxis::T => &T_OUT,
        }
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_i32(self.axis.index())
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        let i = input.read_i32()?;
        self.axis = CoordinateAxis::from_index(i)
            .ok_or_else(|| ProcError::InvalidFormat(format!("coordinate axis {i}")))?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        if let Some(name) = fields.get("Axis").and_then(|v| v.as_str()) {
            self.axis = CoordinateAxis::from_name(name)
                .ok_or_else(|| ProcError::Graph(format!("unknown coordinate axis '{name}'")))?;
        }
        Ok(())
    }
}

// ── ViewAngle ───────────────────────────────────────────────────────

const ANGLE_OUT: [Port; 1] = [Port::number_out("Angle")];

/// Cosine of the angle between the view direction and the surface normal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewAngleModule;

impl NumberSource for ViewAngleModule {
    fn value(&self, ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> f64 {
        ev.point().viewangle
    }
}

impl ModuleType for ViewAngleModule {
    const TYPE_NAME: &'static str = "ViewAngle";

    fn inputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn outputs(&self) -> &'static [Port] {
        &ANGLE_OUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }
}

// ── Comment ─────────────────────────────────────────────────────────

/// Free text shown in the editor. No ports.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentModule {
    pub text: String,
}

impl Default for CommentModule {
    fn default() -> Self {
        Self {
            text: "Double-click to set comment".into(),
        }
    }
}

impl ModuleType for CommentModule {
    const TYPE_NAME: &'static str = "Comment";

    fn inputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn outputs(&self) -> &'static [Port] {
        &NO_PORTS
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_utf(&self.text)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.text = input.read_utf()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.text = field_str(fields, "Text", &self.text).to_string();
        Ok(())
    }
}
