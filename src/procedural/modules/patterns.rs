// procedural/modules/patterns.rs — noise, turbulence, cells, wood and checker
//
// Pattern kinds read their sample position from inputs X, Y and Z, which
// default to the point coordinates. The antialiasing footprint on each axis
// is the error of that input, so a pattern fed through other modules still
// filters against the width of the region it actually covers.

use std::io::{Read, Write};

use crate::error::{ProcError, Result};
use crate::math::Vec3;
use crate::procedural::eval::Evaluator;
use crate::procedural::graph::{field_f64, field_i32, field_str, Fields};
use crate::procedural::image::ImageLibrary;
use crate::procedural::module::{ModuleType, NumberSource};
use crate::procedural::noise::{cell_value, feature_point, Octaves};
use crate::procedural::port::Port;
use crate::procedural::stream::{DataReader, DataWriter};

use super::wrap_fraction;

/// Octave counts above this add nothing visible and only cost time.
const MAX_OCTAVES: i32 = 32;

const FRACTAL_IN: [Port; 4] = [
    Port::coordinate_in("X", 0),
    Port::coordinate_in("Y", 1),
    Port::coordinate_in("Z", 2),
    Port::number_in("Noise Ratio", 0.5).with_range(0.0, 1.0),
];
const XYZ_IN: [Port; 3] = [
    Port::coordinate_in("X", 0),
    Port::coordinate_in("Y", 1),
    Port::coordinate_in("Z", 2),
];

/// Position and per-axis half-footprint read from inputs 0..3.
fn sample_position(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> (Vec3, Vec3) {
    let p = Vec3::new(
        ev.input_value(id, 0, blur),
        ev.input_value(id, 1, blur),
        ev.input_value(id, 2, blur),
    );
    let size = Vec3::new(
        ev.input_error(id, 0, blur),
        ev.input_error(id, 1, blur),
        ev.input_error(id, 2, blur),
    );
    (p, size)
}

fn checked_octaves(octaves: i32) -> Result<i32> {
    if (0..=MAX_OCTAVES).contains(&octaves) {
        Ok(octaves)
    } else {
        Err(ProcError::InvalidFormat(format!("octave count {octaves} out of range")))
    }
}

// ── Noise / Turbulence ──────────────────────────────────────────────

/// Shared evaluation of the two fractal kinds.
fn fractal(
    ev: &mut Evaluator<'_>,
    id: usize,
    blur: f64,
    amplitude: f64,
    octaves: i32,
) -> (Octaves, Vec3, Vec3) {
    let (p, size) = sample_position(ev, id, blur);
    let octaves = Octaves {
        amplitude,
        octaves: octaves.max(0) as u32,
        persistence: ev.input_value(id, 3, blur),
        footprint: size.max_abs(),
    };
    (octaves, p, size)
}

/// Half the spread of the sum across the footprint, one axis at a time.
fn finite_difference_error(octaves: &Octaves, p: Vec3, size: Vec3, absolute: bool) -> f64 {
    let mut error = 0.0;
    for axis in 0..3 {
        if size[axis] > 0.0 {
            let step = Vec3::axis(axis) * size[axis];
            let (hi, _) = octaves.sum(p + step, absolute);
            let (lo, _) = octaves.sum(p - step, absolute);
            error += 0.5 * (hi - lo).abs();
        }
    }
    error
}

macro_rules! fractal_kind {
    ($(#[$doc:meta])* $ty:ident, $name:literal, $output:literal, $absolute:expr, $default_octaves:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $ty {
            pub amplitude: f64,
            pub octaves: i32,
        }

        impl Default for $ty {
            fn default() -> Self {
                Self {
                    amplitude: 1.0,
                    octaves: $default_octaves,
                }
            }
        }

        impl NumberSource for $ty {
            fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
                let (octaves, p, _) = fractal(ev, id, blur, self.amplitude, self.octaves);
                octaves.sum(p, $absolute).0
            }

            fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
                let (octaves, p, size) = fractal(ev, id, blur, self.amplitude, self.octaves);
                finite_difference_error(&octaves, p, size, $absolute)
            }

            fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
                let (octaves, p, _) = fractal(ev, id, blur, self.amplitude, self.octaves);
                let (_, d) = octaves.sum(p, $absolute);
                ev.chain_inputs(id, 0, d, blur)
            }
        }

        impl ModuleType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn inputs(&self) -> &'static [Port] {
                &FRACTAL_IN
            }

            fn outputs(&self) -> &'static [Port] {
                const OUT: [Port; 1] = [Port::number_out($output)];
                &OUT
            }

            fn as_number(&self) -> Option<&dyn NumberSource> {
                Some(self)
            }

            fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
                out.write_i32(self.octaves)?;
                out.write_f64(self.amplitude)
            }

            fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
                self.octaves = checked_octaves(input.read_i32()?)?;
                self.amplitude = input.read_f64()?;
                Ok(())
            }

            fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
                self.amplitude = field_f64(fields, "Amplitude", self.amplitude);
                self.octaves = checked_octaves(field_i32(fields, "Octaves", self.octaves))
                    .map_err(|e| ProcError::Graph(e.to_string()))?;
                Ok(())
            }
        }
    };
}

fractal_kind!(
    /// Fractal simplex noise. Octaves finer than the footprint are faded out.
    NoiseModule,
    "Noise",
    "Noise",
    false,
    3
);

fractal_kind!(
    /// Sum of absolute octaves of simplex noise.
    TurbulenceModule,
    "Turbulence",
    "Turbulence",
    true,
    3
);

// ── Cells ───────────────────────────────────────────────────────────

/// Distance metric for the cellular pattern. The discriminant is the
/// stream value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellMetric {
    #[default]
    Euclidean = 0,
    CityBlock = 1,
    Chessboard = 2,
}

impl CellMetric {
    pub fn from_index(i: i32) -> Option<Self> {
        match i {
            0 => Some(CellMetric::Euclidean),
            1 => Some(CellMetric::CityBlock),
            2 => Some(CellMetric::Chessboard),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Euclidean" => Some(CellMetric::Euclidean),
            "CityBlock" | "City Block" => Some(CellMetric::CityBlock),
            "Chessboard" | "Chess Board" => Some(CellMetric::Chessboard),
            _ => None,
        }
    }

    /// Distance from `p` to `q` and its gradient with respect to `p`.
    fn distance(self, p: Vec3, q: Vec3) -> (f64, Vec3) {
        let d = p - q;
        let sign = |v: f64| if v < 0.0 { -1.0 } else { 1.0 };
        match self {
            CellMetric::Euclidean => {
                let len = d.length();
                let g = if len > 0.0 { d * (1.0 / len) } else { Vec3::ZERO };
                (len, g)
            }
            CellMetric::CityBlock => (
                d.x.abs() + d.y.abs() + d.z.abs(),
                Vec3::new(sign(d.x), sign(d.y), sign(d.z)),
            ),
            CellMetric::Chessboard => {
                let (ax, ay, az) = (d.x.abs(), d.y.abs(), d.z.abs());
                if ax >= ay && ax >= az {
                    (ax, Vec3::new(sign(d.x), 0.0, 0.0))
                } else if ay >= az {
                    (ay, Vec3::new(0.0, sign(d.y), 0.0))
                } else {
                    (az, Vec3::new(0.0, 0.0, sign(d.z)))
                }
            }
        }
    }
}

/// The two nearest feature points around `p`.
#[derive(Debug, Clone, Copy)]
struct Nearest {
    id: [u32; 2],
    distance: [f64; 2],
    gradient: [Vec3; 2],
}

fn nearest_features(p: Vec3, metric: CellMetric) -> Nearest {
    let mut best = Nearest {
        id: [0; 2],
        distance: [f64::INFINITY; 2],
        gradient: [Vec3::ZERO; 2],
    };
    let (cx, cy, cz) = (p.x.floor() as i64, p.y.floor() as i64, p.z.floor() as i64);
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                let (id, q) = feature_point(cx + dx, cy + dy, cz + dz);
                let (dist, grad) = metric.distance(p, q);
                if dist < best.distance[0] {
                    best.id[1] = best.id[0];
                    best.distance[1] = best.distance[0];
                    best.gradient[1] = best.gradient[0];
                    best.id[0] = id;
                    best.distance[0] = dist;
                    best.gradient[0] = grad;
                } else if dist < best.distance[1] {
                    best.id[1] = id;
                    best.distance[1] = dist;
                    best.gradient[1] = grad;
                }
            }
        }
    }
    best
}

const CELLS_OUT: [Port; 3] = [
    Port::number_out("Cell"),
    Port::number_out("Distance 1"),
    Port::number_out("Distance 2"),
];

/// Worley cellular pattern.
///
/// `Cell` is a stable random value per nearest feature point. Within one
/// footprint of the border between two cells it blends toward the
/// neighbouring cell's value so edges do not alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellsModule {
    pub metric: CellMetric,
}

impl CellsModule {
    fn evaluate(&self, ev: &mut Evaluator<'_>, id: usize, blur: f64) -> (Nearest, f64) {
        let (p, size) = sample_position(ev, id, blur);
        (nearest_features(p, self.metric), size.max_abs())
    }
}

impl NumberSource for CellsModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> f64 {
        let (n, footprint) = self.evaluate(ev, id, blur);
        match output {
            0 => {
                let cell = cell_value(n.id[0]);
                let gap = n.distance[1] - n.distance[0];
                if gap >= footprint {
                    return cell;
                }
                let weight = 0.5 + 0.5 * gap / footprint;
                weight * cell + (1.0 - weight) * cell_value(n.id[1])
            }
            1 => n.distance[0],
            _ => n.distance[1],
        }
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> f64 {
        let (n, footprint) = self.evaluate(ev, id, blur);
        if output > 0 {
            return footprint;
        }
        if n.distance[1] - n.distance[0] >= footprint {
            0.0
        } else {
            0.5 * (cell_value(n.id[0]) - cell_value(n.id[1])).abs()
        }
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> Vec3 {
        if output == 0 {
            return Vec3::ZERO;
        }
        let (n, _) = self.evaluate(ev, id, blur);
        ev.chain_inputs(id, 0, n.gradient[output - 1], blur)
    }
}

impl ModuleType for CellsModule {
    const TYPE_NAME: &'static str = "Cells";

    fn inputs(&self) -> &'static [Port] {
        &XYZ_IN
    }

    fn outputs(&self) -> &'static [Port] {
        &CELLS_OUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_i32(self.metric as i32)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        let m = input.read_i32()?;
        self.metric = CellMetric::from_index(m)
            .ok_or_else(|| ProcError::InvalidFormat(format!("unknown cell metric {m}")))?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        if fields.contains_key("Metric") {
            let name = field_str(fields, "Metric", "Euclidean");
            self.metric = CellMetric::from_name(name)
                .ok_or_else(|| ProcError::Graph(format!("unknown cell metric '{name}'")))?;
        }
        Ok(())
    }
}

// ── Wood ────────────────────────────────────────────────────────────

const WOOD_IN: [Port; 4] = [
    Port::coordinate_in("X", 0),
    Port::coordinate_in("Y", 1),
    Port::coordinate_in("Z", 2),
    Port::number_in("Noise", 0.5).with_range(0.0, 1.0),
];
const WOOD_OUT: [Port; 1] = [Port::number_out("Value")];

/// Concentric rings around the Z axis, perturbed by turbulence. The output
/// is the fractional ring coordinate, box-filtered over the footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct WoodModule {
    pub octaves: i32,
    pub amplitude: f64,
    /// Distance between rings.
    pub spacing: f64,
}

impl Default for WoodModule {
    fn default() -> Self {
        Self {
            octaves: 2,
            amplitude: 1.0,
            spacing: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WoodSample {
    value: f64,
    error: f64,
    gradient: Vec3,
}

impl WoodModule {
    fn evaluate(&self, ev: &mut Evaluator<'_>, id: usize, blur: f64) -> WoodSample {
        let (p, size) = sample_position(ev, id, blur);
        let turbulence = Octaves {
            amplitude: 0.5 * self.amplitude,
            octaves: self.octaves.max(0) as u32,
            persistence: ev.input_value(id, 3, blur),
            footprint: size.max_abs(),
        };
        let (turb, turb_grad) = turbulence.sum(p, true);
        let r = (p.x * p.x + p.y * p.y).sqrt();
        if r == 0.0 {
            return WoodSample {
                value: 0.5,
                error: 0.5,
                gradient: Vec3::ZERO,
            };
        }
        let rings = if self.spacing > 0.0 { 1.0 / self.spacing } else { 0.0 };
        let d = Vec3::new(p.x / r * rings, p.y / r * rings, 0.0) + turb_grad;
        let error = (size.x * d.x).abs() + (size.y * d.y).abs() + (size.z * d.z).abs();
        let f = wrap_fraction(r * rings + turb, error);
        let gradient = ev.chain_inputs(id, 0, d * f.slope, blur);
        WoodSample {
            value: f.value,
            error: f.error,
            gradient,
        }
    }
}

impl NumberSource for WoodModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        self.evaluate(ev, id, blur).value
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        self.evaluate(ev, id, blur).error
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> Vec3 {
        self.evaluate(ev, id, blur).gradient
    }
}

impl ModuleType for WoodModule {
    const TYPE_NAME: &'static str = "Wood";

    fn inputs(&self) -> &'static [Port] {
        &WOOD_IN
    }

    fn outputs(&self) -> &'static [Port] {
        &WOOD_OUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, _images: &ImageLibrary) -> Result<()> {
        out.write_i32(self.octaves)?;
        out.write_f64(self.amplitude)?;
        out.write_f64(self.spacing)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, _images: &ImageLibrary) -> Result<()> {
        self.octaves = checked_octaves(input.read_i32()?)?;
        self.amplitude = input.read_f64()?;
        self.spacing = input.read_f64()?;
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, _images: &ImageLibrary) -> Result<()> {
        self.octaves = checked_octaves(field_i32(fields, "Octaves", self.octaves))
            .map_err(|e| ProcError::Graph(e.to_string()))?;
        self.amplitude = field_f64(fields, "Amplitude", self.amplitude);
        self.spacing = field_f64(fields, "Spacing", self.spacing);
        Ok(())
    }
}

// ── Checker ─────────────────────────────────────────────────────────

const CHECKER_OUT: [Port; 1] = [Port::number_out("Value")];

/// 1 on cells whose integer coordinates sum to an odd number, 0 otherwise.
/// A footprint crossing a cell face averages to 0.5.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckerModule;

impl CheckerModule {
    fn evaluate(ev: &mut Evaluator<'_>, id: usize, blur: f64) -> (f64, f64) {
        let (p, size) = sample_position(ev, id, blur);
        let straddles = (0..3).any(|a| (p[a] - size[a]).floor() != (p[a] + size[a]).floor());
        if straddles {
            return (0.5, 0.5);
        }
        let parity = (p.x.floor() as i64 + p.y.floor() as i64 + p.z.floor() as i64).rem_euclid(2);
        (parity as f64, 0.0)
    }
}

impl NumberSource for CheckerModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        Self::evaluate(ev, id, blur).0
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> f64 {
        Self::evaluate(ev, id, blur).1
    }
}

stateless_kind!(CheckerModule, "Checker", XYZ_IN, CHECKER_OUT, number);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_and_indices() {
        assert_eq!(CellMetric::from_index(1), Some(CellMetric::CityBlock));
        assert_eq!(CellMetric::from_index(7), None);
        assert_eq!(CellMetric::from_name("Chess Board"), Some(CellMetric::Chessboard));
        assert_eq!(CellMetric::Chessboard as i32, 2);
    }

    #[test]
    fn metrics_measure_expected_distances() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        let q = Vec3::new(0.0, 0.0, 1.0);
        assert!((CellMetric::Euclidean.distance(p, q).0 - 3.0).abs() < 1e-12);
        assert_eq!(CellMetric::CityBlock.distance(p, q).0, 5.0);
        let (d, g) = CellMetric::Chessboard.distance(p, q);
        assert_eq!(d, 2.0);
        assert_eq!(g, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn nearest_features_are_ordered() {
        for i in 0..20 {
            let p = Vec3::new(i as f64 * 0.37, -(i as f64) * 0.61, 1.5);
            let n = nearest_features(p, CellMetric::Euclidean);
            assert!(n.distance[0] <= n.distance[1]);
            // The nearest feature is never farther than a lattice diagonal.
            assert!(n.distance[0] < 3f64.sqrt() + 1e-9);
        }
    }

    #[test]
    fn octave_counts_are_bounded() {
        assert!(checked_octaves(4).is_ok());
        assert!(checked_octaves(-1).is_err());
        assert!(checked_octaves(MAX_OCTAVES + 1).is_err());
    }
}
