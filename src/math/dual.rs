// math/dual.rs — forward-mode value + spatial gradient

use super::Vec3;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A value together with its gradient with respect to (x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual3 {
    pub val: f64,
    pub grad: Vec3,
}

impl Dual3 {
    #[inline]
    pub fn constant(val: f64) -> Self {
        Self {
            val,
            grad: Vec3::ZERO,
        }
    }

    #[inline]
    pub fn new(val: f64, grad: Vec3) -> Self {
        Self { val, grad }
    }

    /// Apply a scalar function with known derivative `df` at `self.val`.
    #[inline]
    pub fn chain(self, val: f64, df: f64) -> Self {
        Self::new(val, self.grad * df)
    }

    pub fn abs(self) -> Self {
        if self.val < 0.0 {
            -self
        } else {
            self
        }
    }

    pub fn sqrt(self) -> Self {
        if self.val <= 0.0 {
            return Self::constant(0.0);
        }
        let r = self.val.sqrt();
        self.chain(r, 0.5 / r)
    }

    pub fn exp(self) -> Self {
        let e = self.val.exp();
        self.chain(e, e)
    }

    pub fn ln(self) -> Self {
        if self.val <= 0.0 {
            return Self::constant(0.0);
        }
        self.chain(self.val.ln(), 1.0 / self.val)
    }

    pub fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }

    pub fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }

    pub fn min(self, o: Self) -> Self {
        if o.val < self.val {
            o
        } else {
            self
        }
    }

    pub fn max(self, o: Self) -> Self {
        if o.val > self.val {
            o
        } else {
            self
        }
    }

    /// `atan2(self, x)`.
    pub fn atan2(self, x: Self) -> Self {
        let r2 = self.val * self.val + x.val * x.val;
        if r2 == 0.0 {
            return Self::constant(0.0);
        }
        let grad = (self.grad * x.val - x.grad * self.val) * (1.0 / r2);
        Self::new(self.val.atan2(x.val), grad)
    }
}

impl Add for Dual3 {
    type Output = Dual3;
    #[inline]
    fn add(self, o: Dual3) -> Dual3 {
        Dual3::new(self.val + o.val, self.grad + o.grad)
    }
}

impl Sub for Dual3 {
    type Output = Dual3;
    #[inline]
    fn sub(self, o: Dual3) -> Dual3 {
        Dual3::new(self.val - o.val, self.grad - o.grad)
    }
}

impl Mul for Dual3 {
    type Output = Dual3;
    #[inline]
    fn mul(self, o: Dual3) -> Dual3 {
        Dual3::new(self.val * o.val, self.grad * o.val + o.grad * self.val)
    }
}

/// Division by zero yields a constant zero.
impl Div for Dual3 {
    type Output = Dual3;
    #[inline]
    fn div(self, o: Dual3) -> Dual3 {
        if o.val == 0.0 {
            return Dual3::constant(0.0);
        }
        let inv = 1.0 / o.val;
        Dual3::new(
            self.val * inv,
            (self.grad * o.val - o.grad * self.val) * (inv * inv),
        )
    }
}

impl Neg for Dual3 {
    type Output = Dual3;
    #[inline]
    fn neg(self) -> Dual3 {
        Dual3::new(-self.val, -self.grad)
    }
}
