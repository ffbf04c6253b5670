// procedural/modules/image.rs — image map lookup
//
// The Image kind maps inputs X and Y (scaled by the module's x/y scale) onto
// an `ImageMap` in the unit square, with optional tiling and mirroring per
// axis. Map space has y pointing up; row 0 of the image is its top edge.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{ProcError, Result};
use crate::math::{RGBColor, Vec3};
use crate::procedural::eval::Evaluator;
use crate::procedural::graph::{field_bool, field_f64, field_i32, field_str, Fields};
use crate::procedural::image::{ImageLibrary, ImageMap, ImageSample};
use crate::procedural::module::{ColorSource, ModuleType, NumberSource};
use crate::procedural::port::Port;
use crate::procedural::stream::{DataReader, DataWriter};

/// Parameter block tag written ahead of the map index.
const STREAM_VERSION: i32 = -2;

const IMAGE_IN: [Port; 2] = [Port::coordinate_in("X", 0), Port::coordinate_in("Y", 1)];
const IMAGE_OUT: [Port; 5] = [
    Port::color_out("Color"),
    Port::number_out("Component 1"),
    Port::number_out("Component 2"),
    Port::number_out("Component 3"),
    Port::number_out("Mask"),
];

/// How the three component outputs decompose the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorModel {
    #[default]
    Rgb = 0,
    Hsv = 1,
    Hls = 2,
}

impl ColorModel {
    pub fn from_index(i: i32) -> Option<Self> {
        match i {
            0 => Some(ColorModel::Rgb),
            1 => Some(ColorModel::Hsv),
            2 => Some(ColorModel::Hls),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "RGB" => Some(ColorModel::Rgb),
            "HSV" => Some(ColorModel::Hsv),
            "HLS" => Some(ColorModel::Hls),
            _ => None,
        }
    }

    /// Components in [0, 1] for in-range colors. Hue is given in turns.
    fn components(self, c: RGBColor) -> [f64; 3] {
        match self {
            ColorModel::Rgb => [c.red as f64, c.green as f64, c.blue as f64],
            ColorModel::Hsv => {
                let [h, s, v] = c.to_hsv();
                [h as f64 / 360.0, s as f64, v as f64]
            }
            ColorModel::Hls => {
                let [h, l, s] = c.to_hls();
                [h as f64 / 360.0, l as f64, s as f64]
            }
        }
    }
}

/// Looks up a color in an image map.
#[derive(Debug, Clone)]
pub struct ImageModule {
    pub map: Option<Arc<ImageMap>>,
    pub x_scale: f64,
    pub y_scale: f64,
    pub tile_x: bool,
    pub tile_y: bool,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub color_model: ColorModel,
}

impl Default for ImageModule {
    fn default() -> Self {
        Self {
            map: None,
            x_scale: 1.0,
            y_scale: 1.0,
            tile_x: true,
            tile_y: true,
            mirror_x: false,
            mirror_y: false,
            color_model: ColorModel::Rgb,
        }
    }
}

/// Fold a map coordinate into [0, 1]. Mirroring reflects every other tile.
fn fold(v: f64, mirror: bool) -> f64 {
    let f = v.floor();
    if mirror && (f as i64).rem_euclid(2) == 0 {
        1.0 + f - v
    } else {
        v - f
    }
}

impl ImageModule {
    pub fn with_map(map: Arc<ImageMap>) -> Self {
        Self {
            map: Some(map),
            ..Self::default()
        }
    }

    fn inverse_scale(s: f64) -> f64 {
        if s != 0.0 {
            1.0 / s
        } else {
            0.0
        }
    }

    /// Sample at a point in map space, or `None` outside an untiled axis.
    fn lookup(&self, map: &ImageMap, x: f64, y: f64) -> Option<ImageSample> {
        let outside = (!self.tile_x && !(0.0..=1.0).contains(&x)) || (!self.tile_y && !(0.0..=1.0).contains(&y));
        if outside {
            return None;
        }
        let u = if self.tile_x { fold(x, self.mirror_x) } else { x };
        let v = if self.tile_y { fold(y, self.mirror_y) } else { y };
        Some(map.sample(u, 1.0 - v))
    }

    /// Map-space position and half-footprint of the current point.
    fn position(&self, ev: &mut Evaluator<'_>, id: usize, blur: f64) -> (f64, f64, f64, f64) {
        let xi = Self::inverse_scale(self.x_scale);
        let yi = Self::inverse_scale(self.y_scale);
        (
            ev.input_value(id, 0, blur) * xi,
            ev.input_value(id, 1, blur) * yi,
            ev.input_error(id, 0, blur) * xi.abs(),
            ev.input_error(id, 1, blur) * yi.abs(),
        )
    }

    /// Number output `which` (1..=4) of a sample.
    fn component(&self, sample: Option<ImageSample>, which: usize) -> f64 {
        match sample {
            None => 0.0,
            Some(s) if which >= 4 => s.alpha as f64,
            Some(s) => self.color_model.components(s.color)[which - 1],
        }
    }
}

impl ColorSource for ImageModule {
    fn color(&self, ev: &mut Evaluator<'_>, id: usize, _output: usize, blur: f64) -> RGBColor {
        let Some(map) = self.map.as_deref() else {
            return RGBColor::BLACK;
        };
        let (x, y, _, _) = self.position(ev, id, blur);
        self.lookup(map, x, y).map_or(RGBColor::BLACK, |s| s.color)
    }
}

impl NumberSource for ImageModule {
    fn value(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> f64 {
        let Some(map) = self.map.as_deref() else {
            return 0.0;
        };
        let (x, y, _, _) = self.position(ev, id, blur);
        self.component(self.lookup(map, x, y), output)
    }

    fn error(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> f64 {
        let Some(map) = self.map.as_deref() else {
            return 0.0;
        };
        let (x, y, sx, sy) = self.position(ev, id, blur);
        let at = |dx: f64, dy: f64| self.component(self.lookup(map, x + dx, y + dy), output);
        0.5 * ((at(sx, 0.0) - at(-sx, 0.0)).abs() + (at(0.0, sy) - at(0.0, -sy)).abs())
    }

    fn gradient(&self, ev: &mut Evaluator<'_>, id: usize, output: usize, blur: f64) -> Vec3 {
        let Some(map) = self.map.as_deref() else {
            return Vec3::ZERO;
        };
        let (x, y, _, _) = self.position(ev, id, blur);
        // Half a pixel along the longer image axis.
        let h = 0.5 / map.width().max(map.height()) as f64;
        let at = |dx: f64, dy: f64| self.component(self.lookup(map, x + dx, y + dy), output);
        let du = (at(h, 0.0) - at(-h, 0.0)) / (2.0 * h) * Self::inverse_scale(self.x_scale);
        let dv = (at(0.0, h) - at(0.0, -h)) / (2.0 * h) * Self::inverse_scale(self.y_scale);
        let mut g = Vec3::ZERO;
        if du != 0.0 {
            g += ev.input_gradient(id, 0, blur) * du;
        }
        if dv != 0.0 {
            g += ev.input_gradient(id, 1, blur) * dv;
        }
        g
    }
}

impl ModuleType for ImageModule {
    const TYPE_NAME: &'static str = "Image";

    fn inputs(&self) -> &'static [Port] {
        &IMAGE_IN
    }

    fn outputs(&self) -> &'static [Port] {
        &IMAGE_OUT
    }

    fn as_number(&self) -> Option<&dyn NumberSource> {
        Some(self)
    }

    fn as_color(&self) -> Option<&dyn ColorSource> {
        Some(self)
    }

    fn write_params<W: Write>(&self, out: &mut DataWriter<W>, images: &ImageLibrary) -> Result<()> {
        out.write_i32(STREAM_VERSION)?;
        let index = match &self.map {
            None => -1,
            Some(map) => {
                let i = images
                    .index_of(map)
                    .ok_or_else(|| ProcError::InvalidFormat("image map is not in the library".into()))?;
                i32::try_from(i).map_err(|_| ProcError::InvalidFormat(format!("image index {i} too large")))?
            }
        };
        out.write_i32(index)?;
        out.write_f64(self.x_scale)?;
        out.write_f64(self.y_scale)?;
        out.write_bool(self.tile_x)?;
        out.write_bool(self.tile_y)?;
        out.write_bool(self.mirror_x)?;
        out.write_bool(self.mirror_y)?;
        out.write_i32(self.color_model as i32)
    }

    fn read_params<R: Read>(&mut self, input: &mut DataReader<R>, images: &ImageLibrary) -> Result<()> {
        let version = input.read_i32()?;
        if version < STREAM_VERSION {
            return Err(ProcError::InvalidFormat(format!("image module version {version}")));
        }
        // Older blocks carry the index in place of the version tag.
        let index = if version > STREAM_VERSION { version } else { input.read_i32()? };
        self.map = if index < 0 {
            None
        } else {
            let map = images.get(index as usize).ok_or(ProcError::IndexOutOfBounds {
                what: "image",
                index: index as usize,
                len: images.len(),
            })?;
            Some(Arc::clone(map))
        };
        self.x_scale = input.read_f64()?;
        self.y_scale = input.read_f64()?;
        self.tile_x = input.read_bool()?;
        self.tile_y = input.read_bool()?;
        self.mirror_x = input.read_bool()?;
        self.mirror_y = input.read_bool()?;
        self.color_model = if version == STREAM_VERSION {
            let m = input.read_i32()?;
            ColorModel::from_index(m).ok_or_else(|| ProcError::InvalidFormat(format!("unknown color model {m}")))?
        } else {
            ColorModel::Rgb
        };
        Ok(())
    }

    fn apply_fields(&mut self, fields: &Fields, images: &ImageLibrary) -> Result<()> {
        let index = field_i32(fields, "Image", -1);
        if index >= 0 {
            let map = images
                .get(index as usize)
                .ok_or_else(|| ProcError::Graph(format!("image {index} is not in the library")))?;
            self.map = Some(Arc::clone(map));
        }
        self.x_scale = field_f64(fields, "XScale", self.x_scale);
        self.y_scale = field_f64(fields, "YScale", self.y_scale);
        self.tile_x = field_bool(fields, "TileX", self.tile_x);
        self.tile_y = field_bool(fields, "TileY", self.tile_y);
        self.mirror_x = field_bool(fields, "MirrorX", self.mirror_x);
        self.mirror_y = field_bool(fields, "MirrorY", self.mirror_y);
        if fields.contains_key("ColorModel") {
            let name = field_str(fields, "ColorModel", "RGB");
            self.color_model = ColorModel::from_name(name)
                .ok_or_else(|| ProcError::Graph(format!("unknown color model '{name}'")))?;
        }
        Ok(())
    }

    fn uses_image(&self, image: &ImageMap) -> bool {
        self.map.as_deref().is_some_and(|m| std::ptr::eq(m, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_wraps_and_mirrors() {
        assert!((fold(1.25, false) - 0.25).abs() < 1e-12);
        assert!((fold(-0.25, false) - 0.75).abs() < 1e-12);
        // Tile 0 is reflected, tile 1 is not.
        assert!((fold(0.25, true) - 0.75).abs() < 1e-12);
        assert!((fold(1.25, true) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn untiled_lookup_outside_is_none() {
        let map = ImageMap::solid(RGBColor::WHITE);
        let module = ImageModule {
            tile_x: false,
            ..ImageModule::default()
        };
        assert!(module.lookup(&map, 1.5, 0.5).is_none());
        assert!(module.lookup(&map, 0.5, 1.5).is_some());
    }

    #[test]
    fn hsv_components_are_in_turns() {
        let c = ColorModel::Hsv.components(RGBColor::new(0.0, 1.0, 0.0));
        assert!((c[0] - 1.0 / 3.0).abs() < 1e-5);
        assert!((c[1] - 1.0).abs() < 1e-6);
        assert!((c[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uses_image_is_by_identity() {
        let map = Arc::new(ImageMap::solid(RGBColor::WHITE));
        let other = ImageMap::solid(RGBColor::WHITE);
        let module = ImageModule::with_map(Arc::clone(&map));
        assert!(module.uses_image(&map));
        assert!(!module.uses_image(&other));
    }
}
