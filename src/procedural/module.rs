// procedural/module.rs — module instances and the closed set of module kinds
//
// A `Module` is a node in the graph: a kind (with its parameters), a layout
// position and an identity. Kinds are a closed enum; each variant wraps a
// parameter struct implementing `ModuleType`. Evaluation is split by
// capability: kinds producing NUMBER outputs implement `NumberSource`, kinds
// producing COLOR outputs implement `ColorSource`, and a few implement both.
//
// Modules hold no wiring and no evaluation state. The Procedure stores links
// as index tables and the Evaluator keeps the per-point memo.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use super::eval::Evaluator;
use super::graph::Fields;
use super::image::{ImageLibrary, ImageMap};
use super::modules::*;
use super::port::{Port, ValueType};
use super::stream::{DataReader, DataWriter};
use crate::error::Result;
use crate::math::{RGBColor, Vec3};

/// Package prefix of type names in the binary stream.
pub const TYPE_PREFIX: &str = "artofillusion.procedural.";

// ── Capabilities ────────────────────────────────────────────────────

/// Evaluation of NUMBER outputs. `id` is the module's index in its
/// procedure, used to pull inputs through the evaluator.
pub trait NumberSource {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> f64;

    /// Conservative half-width of the output over the footprint.
    fn error(&self, _ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> f64 {
        0.0
    }

    fn gradient(&self, _ev: &mut Evaluator<'_>, _id: usize, _output: usize, _blur: f64) -> Vec3 {
        Vec3::ZERO
    }
}

/// Evaluation of COLOR outputs.
pub trait ColorSource {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> RGBColor;
}

/// Static description and persistence of one module kind.
pub trait ModuleType: Default + Clone + std::fmt::Debug + Send + Sync {
    /// Short stable name, e.g. `"Sum"`. The stream form is
    /// `TYPE_PREFIX + TYPE_NAME + "Module"`.
    const TYPE_NAME: &'static str;

    fn inputs(&self) -> &'static [Port];

    fn outputs(&self) -> &'static [Port];

    fn as_number(&self) -> Option<&dyn NumberSource> {
        None
    }

    fn as_color(&self) -> Option<&dyn ColorSource> {
        None
    }

    /// Module-specific parameters only; position and wiring belong to the
    /// procedure.
    fn write_params<W: Write>(&self, _out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        Ok(())
    }

    fn read_params<R: Read>(&mut self, _input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        Ok(())
    }

    /// Set parameters from a JSON graph description.
    fn apply_fields(&mut self, _fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        Ok(())
    }

    fn uses_image(&self, _image: &ImageMap) -> bool {
        false
    }
}

/// Strip a package prefix and a `Module` suffix: both
/// `artofillusion.procedural.SumModule` and `Sum` give `Sum`.
pub fn short_type_name(name: &str) -> &str {
    let short = name.rsplit('.').next().unwrap_or(name);
    short.strip_suffix("Module").unwrap_or(short)
}

macro_rules! module_kinds {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// Every built-in module kind.
        #[derive(Debug, Clone)]
        pub enum ModuleKind {
            $($variant($ty),)*
        }

        impl ModuleKind {
            /// Short names of every kind, in catalog order.
            pub const TYPE_NAMES: &'static [&'static str] = &[$(<$ty as ModuleType>::TYPE_NAME,)*];

            /// Default-constructed kind for a short or fully-qualified name.
            pub fn from_type_name(name: &str) -> Option<ModuleKind> {
                let short = short_type_name(name);
                $(
                    if short == <$ty as ModuleType>::TYPE_NAME {
                        return Some(ModuleKind::$variant(<$ty>::default()));
                    }
                )*
                None
            }

            pub fn type_name(&self) -> &'static str {
                match self {
                    $(ModuleKind::$variant(_) => <$ty as ModuleType>::TYPE_NAME,)*
                }
            }

            pub fn inputs(&self) -> &'static [Port] {
                match self {
                    $(ModuleKind::$variant(m) => m.inputs(),)*
                }
            }

            pub fn outputs(&self) -> &'static [Port] {
                match self {
                    $(ModuleKind::$variant(m) => m.outputs(),)*
                }
            }

            pub fn as_number(&self) -> Option<&dyn NumberSource> {
                match self {
                    $(ModuleKind::$variant(m) => m.as_number(),)*
                }
            }

            pub fn as_color(&self) -> Option<&dyn ColorSource> {
                match self {
                    $(ModuleKind::$variant(m) => m.as_color(),)*
                }
            }

            pub fn write_params<W: Write>(&self, out: &mut DataWriter<W>, images: &ImageLibrary) -> Result<()> {
                match self {
                    $(ModuleKind::$variant(m) => m.write_params(out, images),)*
                }
            }

            pub fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, images: &ImageLibrary) -> Result<()> {
                match self {
                    $(ModuleKind::$variant(m) => m.read_params(input, images),)*
                }
            }

            pub fn apply_fields(&mut self, fields: &Fields, images: &ImageLibrary) -> Result<()> {
                match self {
                    $(ModuleKind::$variant(m) => m.apply_fields(fields, images),)*
                }
            }

            pub fn uses_image(&self, image: &ImageMap) -> bool {
                match self {
                    $(ModuleKind::$variant(m) => m.uses_image(image),)*
                }
            }
        }

        $(
            impl From<$ty> for ModuleKind {
                fn from(m: $ty) -> Self {
                    ModuleKind::$variant(m)
                }
            }
        )*
    };
}

module_kinds! {
    // values
    Number => NumberModule,
    Color => ColorModule,
    Parameter => ParameterModule,
    Coordinate => CoordinateModule,
    ViewAngle => ViewAngleModule,
    Comment => CommentModule,
    // arithmetic
    Sum => SumModule,
    Difference => DifferenceModule,
    Product => ProductModule,
    Ratio => RatioModule,
    Mod => ModModule,
    Min => MinModule,
    Max => MaxModule,
    Power => PowerModule,
    // functions
    Abs => AbsModule,
    Exp => ExpModule,
    Log => LogModule,
    Sine => SineModule,
    Cosine => CosineModule,
    Sqrt => SqrtModule,
    Clip => ClipModule,
    ScaleShift => ScaleShiftModule,
    Bias => BiasModule,
    Gain => GainModule,
    Interp => InterpModule,
    Blur => BlurModule,
    Expr => ExprModule,
    // color
    ColorSum => ColorSumModule,
    ColorProduct => ColorProductModule,
    ColorDifference => ColorDifferenceModule,
    ColorScale => ColorScaleModule,
    ColorDarken => ColorDarkenModule,
    ColorLighten => ColorLightenModule,
    Blend => BlendModule,
    Rgb => RGBModule,
    Hsv => HSVModule,
    // patterns
    Noise => NoiseModule,
    Turbulence => TurbulenceModule,
    Cells => CellsModule,
    Wood => WoodModule,
    Checker => CheckerModule,
    // images
    Image => ImageModule,
}

// ── Module instances ────────────────────────────────────────────────

/// Identity of a module instance. Duplicates receive fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

impl ModuleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ModuleId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node in the procedure graph.
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    /// Layout position in the editor. Persisted, never used by evaluation.
    pub position: (i32, i32),
    pub kind: ModuleKind,
}

impl Module {
    pub fn new(kind: impl Into<ModuleKind>) -> Self {
        Self::at(kind, 0, 0)
    }

    pub fn at(kind: impl Into<ModuleKind>, x: i32, y: i32) -> Self {
        Self {
            id: ModuleId::next(),
            position: (x, y),
            kind: kind.into(),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Fully-qualified type name as written to streams.
    pub fn stream_type_name(&self) -> String {
        format!("{TYPE_PREFIX}{}Module", self.kind.type_name())
    }

    pub fn input_ports(&self) -> &'static [Port] {
        self.kind.inputs()
    }

    pub fn output_ports(&self) -> &'static [Port] {
        self.kind.outputs()
    }

    /// Same kind, parameters and position under a new identity.
    pub fn duplicate(&self) -> Module {
        Module {
            id: ModuleId::next(),
            position: self.position,
            kind: self.kind.clone(),
        }
    }
}

// ── Output modules ──────────────────────────────────────────────────

const NUMBER_OUTPUT_INPUT: [Port; 1] = [Port::number_in("Input", 0.0)];
const COLOR_OUTPUT_INPUT: [Port; 1] = [Port::color_in("Input", RGBColor::BLACK)];

/// A designated root of the graph. It has one input and no outputs, and
/// reports its default when that input is unconnected.
#[derive(Debug)]
pub struct OutputModule {
    id: ModuleId,
    pub name: String,
    pub value_type: ValueType,
    pub default_value: f64,
    pub default_color: RGBColor,
    pub position: (i32, i32),
}

impl OutputModule {
    pub fn number(name: impl Into<String>, default_value: f64) -> Self {
        Self {
            id: ModuleId::next(),
            name: name.into(),
            value_type: ValueType::Number,
            default_value,
            default_color: RGBColor::gray(default_value),
            position: (0, 0),
        }
    }

    pub fn color(name: impl Into<String>, default_color: RGBColor) -> Self {
        Self {
            id: ModuleId::next(),
            name: name.into(),
            value_type: ValueType::Color,
            default_value: default_color.brightness() as f64,
            default_color,
            position: (0, 0),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn input_ports(&self) -> &'static [Port] {
        match self.value_type {
            ValueType::Number => &NUMBER_OUTPUT_INPUT,
            ValueType::Color => &COLOR_OUTPUT_INPUT,
        }
    }

    pub fn duplicate(&self) -> OutputModule {
        OutputModule {
            id: ModuleId::next(),
            name: self.name.clone(),
            value_type: self.value_type,
            default_value: self.default_value,
            default_color: self.default_color,
            position: self.position,
        }
    }
}
