// math/color.rs — linear RGB color with HSV / HLS conversion
//
// Components are f32 and unclamped: procedural graphs routinely produce
// values outside [0, 1] (emissive colors, scaled sums).

use std::ops::{Add, AddAssign, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RGBColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl RGBColor {
    pub const BLACK: RGBColor = RGBColor::new(0.0, 0.0, 0.0);
    pub const WHITE: RGBColor = RGBColor::new(1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Gray level `v` on all three channels.
    #[inline]
    pub fn gray(v: f64) -> Self {
        let v = v as f32;
        Self::new(v, v, v)
    }

    /// Mean of the three channels.
    #[inline]
    pub fn brightness(self) -> f32 {
        (self.red + self.green + self.blue) / 3.0
    }

    #[inline]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.red * s, self.green * s, self.blue * s)
    }

    /// Linear interpolation: `self` at `t = 0`, `other` at `t = 1`.
    #[inline]
    pub fn lerp(self, other: RGBColor, t: f32) -> Self {
        self.scale(1.0 - t) + other.scale(t)
    }

    #[inline]
    pub fn channel(self, i: usize) -> f32 {
        match i {
            0 => self.red,
            1 => self.green,
            _ => self.blue,
        }
    }

    /// Build from hue (degrees), saturation and value.
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        if saturation <= 0.0 {
            return Self::new(value, value, value);
        }
        let h = (hue / 60.0).rem_euclid(6.0);
        let sector = h.floor();
        let f = h - sector;
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * f);
        let t = value * (1.0 - saturation * (1.0 - f));
        match sector as i32 {
            0 => Self::new(value, t, p),
            1 => Self::new(q, value, p),
            2 => Self::new(p, value, t),
            3 => Self::new(p, q, value),
            4 => Self::new(t, p, value),
            _ => Self::new(value, p, q),
        }
    }

    /// Hue (degrees), saturation, value.
    pub fn to_hsv(self) -> [f32; 3] {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        let delta = max - min;
        let s = if max > 0.0 { delta / max } else { 0.0 };
        [hue_of(self, max, delta), s, max]
    }

    /// Build from hue (degrees), lightness and saturation.
    pub fn from_hls(hue: f32, lightness: f32, saturation: f32) -> Self {
        if saturation <= 0.0 {
            return Self::new(lightness, lightness, lightness);
        }
        let m2 = if lightness <= 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let m1 = 2.0 * lightness - m2;
        Self::new(
            hls_channel(m1, m2, hue + 120.0),
            hls_channel(m1, m2, hue),
            hls_channel(m1, m2, hue - 120.0),
        )
    }

    /// Hue (degrees), lightness, saturation.
    pub fn to_hls(self) -> [f32; 3] {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        let delta = max - min;
        let l = 0.5 * (max + min);
        let s = if delta == 0.0 {
            0.0
        } else if l <= 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };
        [hue_of(self, max, delta), l, s]
    }
}

fn hue_of(c: RGBColor, max: f32, delta: f32) -> f32 {
    if delta == 0.0 {
        return 0.0;
    }
    let h = if max == c.red {
        (c.green - c.blue) / delta
    } else if max == c.green {
        2.0 + (c.blue - c.red) / delta
    } else {
        4.0 + (c.red - c.green) / delta
    };
    (h * 60.0).rem_euclid(360.0)
}

fn hls_channel(m1: f32, m2: f32, hue: f32) -> f32 {
    let h = hue.rem_euclid(360.0);
    if h < 60.0 {
        m1 + (m2 - m1) * h / 60.0
    } else if h < 180.0 {
        m2
    } else if h < 240.0 {
        m1 + (m2 - m1) * (240.0 - h) / 60.0
    } else {
        m1
    }
}

impl Add for RGBColor {
    type Output = RGBColor;
    #[inline]
    fn add(self, o: RGBColor) -> RGBColor {
        RGBColor::new(self.red + o.red, self.green + o.green, self.blue + o.blue)
    }
}

impl AddAssign for RGBColor {
    #[inline]
    fn add_assign(&mut self, o: RGBColor) {
        *self = *self + o;
    }
}

impl Sub for RGBColor {
    type Output = RGBColor;
    #[inline]
    fn sub(self, o: RGBColor) -> RGBColor {
        RGBColor::new(self.red - o.red, self.green - o.green, self.blue - o.blue)
    }
}

/// Component-wise product.
impl Mul for RGBColor {
    type Output = RGBColor;
    #[inline]
    fn mul(self, o: RGBColor) -> RGBColor {
        RGBColor::new(self.red * o.red, self.green * o.green, self.blue * o.blue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: RGBColor, b: RGBColor) -> bool {
        (a.red - b.red).abs() < 1e-5
            && (a.green - b.green).abs() < 1e-5
            && (a.blue - b.blue).abs() < 1e-5
    }

    #[test]
    fn hsv_primaries() {
        assert!(close(RGBColor::from_hsv(0.0, 1.0, 1.0), RGBColor::new(1.0, 0.0, 0.0)));
        assert!(close(RGBColor::from_hsv(120.0, 1.0, 1.0), RGBColor::new(0.0, 1.0, 0.0)));
        assert!(close(RGBColor::from_hsv(240.0, 1.0, 1.0), RGBColor::new(0.0, 0.0, 1.0)));
        assert!(close(RGBColor::from_hsv(360.0, 1.0, 1.0), RGBColor::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn hsv_roundtrip() {
        let c = RGBColor::new(0.2, 0.7, 0.4);
        let [h, s, v] = c.to_hsv();
        assert!(close(RGBColor::from_hsv(h, s, v), c));
    }

    #[test]
    fn hls_roundtrip() {
        let c = RGBColor::new(0.9, 0.3, 0.5);
        let [h, l, s] = c.to_hls();
        assert!(close(RGBColor::from_hls(h, l, s), c));
    }

    #[test]
    fn brightness_is_channel_mean() {
        assert!((RGBColor::new(0.3, 0.6, 0.9).brightness() - 0.6).abs() < 1e-6);
    }
}
