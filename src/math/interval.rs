// math/interval.rs — conservative interval arithmetic
//
// Used to bound an expression over the antialiasing footprint: each input is
// widened to `[v - e, v + e]` and the half-width of the result becomes the
// output's error estimate.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A closed interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub const EVERYTHING: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    #[inline]
    pub fn new(lo: f64, hi: f64) -> Self {
        debug_assert!(!(lo > hi), "lo ({lo}) > hi ({hi})");
        Self { lo, hi }
    }

    #[inline]
    pub fn point(v: f64) -> Self {
        Self { lo: v, hi: v }
    }

    /// `[center - half_width, center + half_width]`.
    #[inline]
    pub fn around(center: f64, half_width: f64) -> Self {
        let w = half_width.abs();
        Self::new(center - w, center + w)
    }

    #[inline]
    pub fn half_width(self) -> f64 {
        0.5 * (self.hi - self.lo)
    }

    #[inline]
    pub fn contains(self, v: f64) -> bool {
        self.lo <= v && v <= self.hi
    }

    /// Hull of the images of the endpoints under a monotone function.
    #[inline]
    fn monotone(self, f: impl Fn(f64) -> f64) -> Self {
        let a = f(self.lo);
        let b = f(self.hi);
        Self::new(a.min(b), a.max(b))
    }

    pub fn abs(self) -> Self {
        if self.lo >= 0.0 {
            self
        } else if self.hi <= 0.0 {
            -self
        } else {
            Self::new(0.0, self.hi.max(-self.lo))
        }
    }

    pub fn min(self, o: Self) -> Self {
        Self::new(self.lo.min(o.lo), self.hi.min(o.hi))
    }

    pub fn max(self, o: Self) -> Self {
        Self::new(self.lo.max(o.lo), self.hi.max(o.hi))
    }

    pub fn exp(self) -> Self {
        Self::new(self.lo.exp(), self.hi.exp())
    }

    /// Natural log; the non-positive part of the domain maps to 0.
    pub fn ln(self) -> Self {
        self.monotone(|v| if v > 0.0 { v.ln() } else { 0.0 })
    }

    /// Square root; negative inputs map to 0.
    pub fn sqrt(self) -> Self {
        Self::new(self.lo.max(0.0).sqrt(), self.hi.max(0.0).sqrt())
    }

    pub fn sin(self) -> Self {
        (self - Interval::point(FRAC_PI_2)).cos()
    }

    pub fn cos(self) -> Self {
        if self.hi - self.lo >= TAU {
            return Self::new(-1.0, 1.0);
        }
        let mut lo = self.lo.cos().min(self.hi.cos());
        let mut hi = self.lo.cos().max(self.hi.cos());
        // Extremes of cos sit at multiples of pi.
        let first = (self.lo / PI).ceil() as i64;
        let last = (self.hi / PI).floor() as i64;
        for k in first..=last {
            if k.rem_euclid(2) == 0 {
                hi = 1.0;
            } else {
                lo = -1.0;
            }
        }
        Self::new(lo, hi)
    }

    /// Odd extension of `|x|^p` with a constant exponent.
    pub fn signed_powf(self, p: f64) -> Self {
        let f = |v: f64| v.signum() * v.abs().powf(p);
        if p >= 0.0 || self.lo > 0.0 || self.hi < 0.0 {
            return self.monotone(f);
        }
        Self::EVERYTHING
    }

    /// Integer power.
    pub fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::point(1.0);
        }
        if n < 0 {
            return Self::point(1.0) / self.powi(-n);
        }
        if n % 2 == 1 {
            return self.monotone(|v| v.powi(n));
        }
        let a = self.abs();
        Self::new(a.lo.powi(n), a.hi.powi(n))
    }

    /// Floor-style remainder. When the interval spans a wrap point the result
    /// covers the whole period.
    pub fn rem(self, m: f64) -> Self {
        if m == 0.0 {
            return Self::point(0.0);
        }
        let m = m.abs();
        if (self.lo / m).floor() != (self.hi / m).floor() {
            return Self::new(0.0, m);
        }
        Self::new(self.lo.rem_euclid(m), self.hi.rem_euclid(m))
    }

    /// Hull of `f` applied at the four corners of a 2D box.
    pub fn corners(a: Interval, b: Interval, f: impl Fn(f64, f64) -> f64) -> Interval {
        let vals = [f(a.lo, b.lo), f(a.lo, b.hi), f(a.hi, b.lo), f(a.hi, b.hi)];
        let lo = vals.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Interval::new(lo, hi)
    }
}

impl Add for Interval {
    type Output = Interval;
    #[inline]
    fn add(self, o: Interval) -> Interval {
        Interval::new(self.lo + o.lo, self.hi + o.hi)
    }
}

impl Sub for Interval {
    type Output = Interval;
    #[inline]
    fn sub(self, o: Interval) -> Interval {
        Interval::new(self.lo - o.hi, self.hi - o.lo)
    }
}

impl Mul for Interval {
    type Output = Interval;
    fn mul(self, o: Interval) -> Interval {
        Interval::corners(self, o, |a, b| {
            let p = a * b;
            // 0 * inf contributes 0, not NaN
            if p.is_nan() {
                0.0
            } else {
                p
            }
        })
    }
}

impl Div for Interval {
    type Output = Interval;
    fn div(self, o: Interval) -> Interval {
        if o.contains(0.0) {
            return Interval::EVERYTHING;
        }
        self * Interval::new(1.0 / o.hi, 1.0 / o.lo)
    }
}

impl Neg for Interval {
    type Output = Interval;
    #[inline]
    fn neg(self) -> Interval {
        Interval::new(-self.hi, -self.lo)
    }
}
