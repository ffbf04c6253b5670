// procedural/modules — the built-in module catalog
//
// Each file groups kinds by family. Every kind is a small parameter struct
// with static port tables; evaluation pulls inputs through the Evaluator and
// never stores per-point state of its own.

/// `ModuleType` for parameterless kinds: static ports plus capabilities.
macro_rules! stateless_kind {
    ($ty:ident, $name:literal, $inputs:expr, $outputs:expr, number) => {
        impl $crate::procedural::module::ModuleType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn inputs(&self) -> &'static [$crate::procedural::port::Port] {
                &$inputs
            }

            fn outputs(&self) -> &'static [$crate::procedural::port::Port] {
                &$outputs
            }

            fn as_number(&self) -> Option<&dyn $crate::procedural::module::NumberSource> {
                Some(self)
            }
        }
    };
    ($ty:ident, $name:literal, $inputs:expr, $outputs:expr, color) => {
        impl $crate::procedural::module::ModuleType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn inputs(&self) -> &'static [$crate::procedural::port::Port] {
                &$inputs
            }

            fn outputs(&self) -> &'static [$crate::procedural::port::Port] {
                &$outputs
            }

            fn as_color(&self) -> Option<&dyn $crate::procedural::module::ColorSource> {
                Some(self)
            }
        }
    };
}

mod arithmetic;
mod color;
mod functions;
mod image;
mod patterns;
mod values;

pub use arithmetic::*;
pub use color::*;
pub use functions::*;
pub use image::*;
pub use patterns::*;
pub use values::*;

pub(crate) use arithmetic::{signed_pow_dual, signed_pow_interval};

// ── Box filters ─────────────────────────────────────────────────────
//
// Several kinds replace a discontinuous function by its average over the
// input's error interval [v - e, v + e]. The derivative of that average with
// respect to v is (f(v + e) - f(v - e)) / 2e, which the kinds use to scale
// their input gradient.

/// Box-filtered result of a scalar function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Filtered {
    pub value: f64,
    pub error: f64,
    /// d(value)/d(input)
    pub slope: f64,
}

/// Fractional part `v - floor(v)` averaged over `[v - e, v + e]`.
pub(crate) fn wrap_fraction(v: f64, e: f64) -> Filtered {
    if e <= 0.0 {
        return Filtered {
            value: v - v.floor(),
            error: 0.0,
            slope: 1.0,
        };
    }
    // Antiderivative of frac(x): floor(x)/2 + frac(x)²/2
    let integral = |x: f64| {
        let f = x - x.floor();
        0.5 * x.floor() + 0.5 * f * f
    };
    let frac = |x: f64| x - x.floor();
    let (lo, hi) = (v - e, v + e);
    let straddles = lo.floor() != hi.floor();
    Filtered {
        value: (integral(hi) - integral(lo)) / (2.0 * e),
        error: if straddles { 0.5 } else { e.min(0.5) },
        slope: (frac(hi) - frac(lo)) / (2.0 * e),
    }
}

/// `clamp(v, lo, hi)` averaged over `[v - e, v + e]`.
pub(crate) fn box_clamp(v: f64, e: f64, lo: f64, hi: f64) -> Filtered {
    if hi <= lo {
        return Filtered {
            value: lo,
            error: 0.0,
            slope: 0.0,
        };
    }
    if e <= 0.0 {
        let inside = v > lo && v < hi;
        return Filtered {
            value: v.clamp(lo, hi),
            error: 0.0,
            slope: if inside { 1.0 } else { 0.0 },
        };
    }
    // Antiderivative of clamp(x, lo, hi), anchored at lo.
    let integral = |x: f64| {
        if x < lo {
            lo * (x - lo)
        } else if x <= hi {
            0.5 * (x * x - lo * lo)
        } else {
            0.5 * (hi * hi - lo * lo) + hi * (x - hi)
        }
    };
    let (a, b) = (v - e, v + e);
    let value = (integral(b) - integral(a)) / (2.0 * e);
    let ca = a.clamp(lo, hi);
    let cb = b.clamp(lo, hi);
    Filtered {
        value,
        error: 0.5 * (cb - ca),
        slope: (cb - ca) / (2.0 * e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unblurred_fraction_is_exact() {
        let f = wrap_fraction(2.75, 0.0);
        assert!((f.value - 0.75).abs() < 1e-12);
        assert_eq!(f.slope, 1.0);
        let f = wrap_fraction(-0.25, 0.0);
        assert!((f.value - 0.75).abs() < 1e-12);
    }

    #[test]
    fn wide_fraction_tends_to_half() {
        let f = wrap_fraction(0.3, 20.0);
        assert!((f.value - 0.5).abs() < 0.01);
        assert_eq!(f.error, 0.5);
    }

    #[test]
    fn fraction_inside_one_period_is_linear() {
        let f = wrap_fraction(0.5, 0.1);
        assert!((f.value - 0.5).abs() < 1e-12);
        assert!((f.slope - 1.0).abs() < 1e-12);
    }

    #[test]
    fn box_clamp_matches_clamp_away_from_edges() {
        let f = box_clamp(0.5, 0.1, 0.0, 1.0);
        assert!((f.value - 0.5).abs() < 1e-12);
        assert!((f.slope - 1.0).abs() < 1e-12);
        let f = box_clamp(3.0, 0.1, 0.0, 1.0);
        assert!((f.value - 1.0).abs() < 1e-12);
        assert_eq!(f.slope, 0.0);
    }

    #[test]
    fn box_clamp_straddling_edge_is_smoothed() {
        // Half of [-0.5, 0.5] clamps to 0, the other half averages 0.25.
        let f = box_clamp(0.0, 0.5, 0.0, 1.0);
        assert!((f.value - 0.125).abs() < 1e-12);
        assert!((f.slope - 0.5).abs() < 1e-12);
    }
}
