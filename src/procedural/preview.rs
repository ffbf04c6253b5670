// procedural/preview.rs — parallel evaluation of one output over a grid
//
// Samples an output module over an NxN grid in the XY plane at fixed z and
// time. Rows are distributed by rayon; each rayon job works on its own
// worker copy of the procedure, so the template is only read.

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use super::point::PointInfo;
use super::port::ValueType;
use super::procedure::Procedure;

/// What to sample. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Output module slot to sample.
    pub output: usize,
    /// Samples per side.
    pub resolution: u32,
    pub range_min: f64,
    pub range_max: f64,
    pub z: f64,
    pub time: f64,
}

impl Default for PreviewRequest {
    fn default() -> Self {
        Self {
            output: 0,
            resolution: 64,
            range_min: -1.0,
            range_max: 1.0,
            z: 0.0,
            time: 0.0,
        }
    }
}

/// Row-major samples, row 0 at `y = range_min`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResult {
    pub resolution: u32,
    /// Output values (brightness for a COLOR output).
    pub values: Vec<f32>,
    /// RGB triples, present for a COLOR output.
    pub colors: Option<Vec<[f32; 3]>>,
    pub min_value: f32,
    pub max_value: f32,
}

/// Evaluate output `request.output` over the request's grid. Each sample's
/// footprint is one grid step.
pub fn evaluate_preview(procedure: &Procedure, request: &PreviewRequest) -> PreviewResult {
    let n = request.resolution as usize;
    let step = if n > 0 {
        (request.range_max - request.range_min) / n as f64
    } else {
        0.0
    };
    let is_color = procedure
        .output(request.output)
        .is_some_and(|o| o.value_type == ValueType::Color);

    let rows: Vec<(Vec<f32>, Vec<[f32; 3]>)> = (0..n)
        .into_par_iter()
        .map_init(
            || procedure.worker_copy(),
            |copy, row| {
                let y = request.range_min + (row as f64 + 0.5) * step;
                let mut values = Vec::with_capacity(n);
                let mut colors = Vec::with_capacity(if is_color { n } else { 0 });
                for col in 0..n {
                    let x = request.range_min + (col as f64 + 0.5) * step;
                    let point = PointInfo::at(x, y, request.z)
                        .with_size(step.abs())
                        .with_time(request.time);
                    copy.init_for_point(point);
                    if is_color {
                        let c = copy.output_color(request.output);
                        values.push(c.brightness());
                        colors.push([c.red, c.green, c.blue]);
                    } else {
                        values.push(copy.output_value(request.output) as f32);
                    }
                }
                (values, colors)
            },
        )
        .collect();

    let mut values = Vec::with_capacity(n * n);
    let mut colors = Vec::with_capacity(if is_color { n * n } else { 0 });
    for (row_values, row_colors) in rows {
        values.extend(row_values);
        colors.extend(row_colors);
    }
    let (min_value, max_value) = if values.is_empty() {
        (0.0, 0.0)
    } else {
        values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    };

    PreviewResult {
        resolution: request.resolution,
        values,
        colors: is_color.then_some(colors),
        min_value,
        max_value,
    }
}

/// Like [`evaluate_preview`], but runs the rows on `pool` when one is given
/// (see [`RenderConfig::thread_pool`](crate::RenderConfig::thread_pool)).
pub fn evaluate_preview_on(
    pool: Option<&ThreadPool>,
    procedure: &Procedure,
    request: &PreviewRequest,
) -> PreviewResult {
    match pool {
        Some(pool) => pool.install(|| evaluate_preview(procedure, request)),
        None => evaluate_preview(procedure, request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RGBColor;
    use crate::procedural::module::{Module, OutputModule};
    use crate::procedural::modules::{ColorModule, CoordinateAxis, CoordinateModule};

    #[test]
    fn coordinate_preview_is_row_major() {
        let mut p = Procedure::new(vec![OutputModule::number("out", 0.0)]);
        let x = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
        p.connect_output(x, 0, 0).unwrap();
        let request = PreviewRequest {
            resolution: 2,
            range_min: -10.0,
            range_max: 10.0,
            ..PreviewRequest::default()
        };
        let r = evaluate_preview(&p, &request);
        assert_eq!(r.values, vec![-5.0, 5.0, -5.0, 5.0]);
        assert_eq!((r.min_value, r.max_value), (-5.0, 5.0));
        assert!(r.colors.is_none());
    }

    #[test]
    fn color_output_fills_colors() {
        let mut p = Procedure::new(vec![OutputModule::color("diffuse", RGBColor::BLACK)]);
        let c = p.add_module(Module::new(ColorModule {
            color: RGBColor::new(0.0, 0.5, 1.0),
        }));
        p.connect_output(c, 0, 0).unwrap();
        let r = evaluate_preview(&p, &PreviewRequest { resolution: 3, ..PreviewRequest::default() });
        let colors = r.colors.unwrap();
        assert_eq!(colors.len(), 9);
        assert!(colors.iter().all(|&c| c == [0.0, 0.5, 1.0]));
        assert!((r.values[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_thread_pool_matches_global_pool() {
        let mut p = Procedure::new(vec![OutputModule::number("out", 0.0)]);
        let x = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
        p.connect_output(x, 0, 0).unwrap();
        let request = PreviewRequest { resolution: 9, ..PreviewRequest::default() };

        let config = crate::RenderConfig {
            threads: Some(1),
            ..crate::RenderConfig::default()
        };
        let pool = config.thread_pool().unwrap();
        assert_eq!(pool.as_ref().map(|p| p.current_num_threads()), Some(1));
        assert_eq!(
            evaluate_preview_on(pool.as_ref(), &p, &request),
            evaluate_preview(&p, &request)
        );
    }

    #[test]
    fn zero_resolution_is_empty() {
        let p = Procedure::new(vec![OutputModule::number("out", 3.0)]);
        let r = evaluate_preview(&p, &PreviewRequest { resolution: 0, ..PreviewRequest::default() });
        assert!(r.values.is_empty());
        assert_eq!(r.min_value, 0.0);
    }
}
