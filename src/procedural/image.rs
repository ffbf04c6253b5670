// procedural/image.rs — image maps referenced by Image modules
//
// Image data lives outside the procedure. Modules hold an `Arc<ImageMap>`;
// the stream format stores an index into an `ImageLibrary` supplied by the
// owner, so the same library must be passed to read and write.

use std::sync::Arc;

use crate::math::RGBColor;

/// A decoded bitmap with 3 (RGB) or 4 (RGBA) f32 channels per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMap {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
}

/// Result of one lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSample {
    pub color: RGBColor,
    pub alpha: f32,
}

impl ImageSample {
    pub const EMPTY: ImageSample = ImageSample {
        color: RGBColor::BLACK,
        alpha: 0.0,
    };
}

impl ImageMap {
    /// Build from row-major pixel data. Returns `None` when the buffer does
    /// not match the dimensions or the channel count is not 3 or 4.
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Option<Self> {
        if width == 0 || height == 0 || !(3..=4).contains(&channels) {
            return None;
        }
        if data.len() != width * height * channels {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Single-color image.
    pub fn solid(color: RGBColor) -> Self {
        Self {
            width: 1,
            height: 1,
            channels: 3,
            data: vec![color.red, color.green, color.blue],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    fn pixel(&self, x: usize, y: usize) -> ImageSample {
        let i = (y * self.width + x) * self.channels;
        let alpha = if self.channels == 4 { self.data[i + 3] } else { 1.0 };
        ImageSample {
            color: RGBColor::new(self.data[i], self.data[i + 1], self.data[i + 2]),
            alpha,
        }
    }

    /// Bilinear lookup at `(u, v)` in [0, 1]², with `v = 0` at the top row.
    /// Coordinates are clamped to the image.
    pub fn sample(&self, u: f64, v: f64) -> ImageSample {
        let fx = (u.clamp(0.0, 1.0) * self.width as f64 - 0.5).max(0.0);
        let fy = (v.clamp(0.0, 1.0) * self.height as f64 - 0.5).max(0.0);
        let x0 = (fx.floor() as usize).min(self.width - 1);
        let y0 = (fy.floor() as usize).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = (fx - x0 as f64).clamp(0.0, 1.0) as f32;
        let ty = (fy - y0 as f64).clamp(0.0, 1.0) as f32;
        let mix = |a: ImageSample, b: ImageSample, t: f32| ImageSample {
            color: a.color.lerp(b.color, t),
            alpha: a.alpha + (b.alpha - a.alpha) * t,
        };
        let top = mix(self.pixel(x0, y0), self.pixel(x1, y0), tx);
        let bottom = mix(self.pixel(x0, y1), self.pixel(x1, y1), tx);
        mix(top, bottom, ty)
    }
}

/// The ordered set of images a procedure may reference by index.
#[derive(Debug, Clone, Default)]
pub struct ImageLibrary {
    images: Vec<Arc<ImageMap>>,
}

impl ImageLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image and return its index.
    pub fn add(&mut self, image: ImageMap) -> usize {
        self.images.push(Arc::new(image));
        self.images.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ImageMap>> {
        self.images.get(index)
    }

    /// Index of an image by identity.
    pub fn index_of(&self, image: &Arc<ImageMap>) -> Option<usize> {
        self.images.iter().position(|i| Arc::ptr_eq(i, image))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker2x2() -> ImageMap {
        #[rustfmt::skip]
        let data = vec![
            1.0, 0.0, 0.0,   0.0, 1.0, 0.0,
            0.0, 0.0, 1.0,   1.0, 1.0, 1.0,
        ];
        ImageMap::new(2, 2, 3, data).unwrap()
    }

    #[test]
    fn pixel_centres_are_exact() {
        let img = checker2x2();
        assert_eq!(img.sample(0.25, 0.25).color, RGBColor::new(1.0, 0.0, 0.0));
        assert_eq!(img.sample(0.75, 0.75).color, RGBColor::WHITE);
    }

    #[test]
    fn midpoint_blends_neighbours() {
        let img = checker2x2();
        let c = img.sample(0.5, 0.25).color;
        assert!((c.red - 0.5).abs() < 1e-6 && (c.green - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(ImageMap::new(2, 2, 3, vec![0.0; 5]).is_none());
        assert!(ImageMap::new(1, 1, 2, vec![0.0; 2]).is_none());
    }

    #[test]
    fn library_finds_by_identity() {
        let mut lib = ImageLibrary::new();
        lib.add(ImageMap::solid(RGBColor::WHITE));
        let idx = lib.add(ImageMap::solid(RGBColor::WHITE));
        let img = lib.get(idx).unwrap().clone();
        assert_eq!(lib.index_of(&img), Some(1));
        let stranger = Arc::new(ImageMap::solid(RGBColor::WHITE));
        assert_eq!(lib.index_of(&stranger), None);
    }
}
