// procedural/noise.rs — simplex noise, fractal sums and cell hashing
//
// The pattern modules (Noise, Turbulence, Wood, Cells) are built on these
// primitives. The permutation table is built once from a fixed seed so every
// procedure (and every worker copy of it) sees the same noise field.

use std::sync::OnceLock;

use crate::math::Vec3;

// ── Gradient vectors ────────────────────────────────────────────────

// 12 gradient directions (edges of a cube)
const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// Seed of the shared noise field.
const NOISE_SEED: i32 = 0;

// ── Mulberry32 PRNG ─────────────────────────────────────────────────

/// Small, fast, deterministic PRNG. Used for the permutation table, for
/// per-cell random values, and by tests that need reproducible randomness.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: i32) -> Self {
        Self { state: seed as u32 }
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b79f5);
        let mut t: u32 = (self.state ^ (self.state >> 15)).wrapping_mul(1 | self.state);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        ((t ^ (t >> 14)) as f64) / 4294967296.0
    }

    /// Next value in [lo, hi).
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ── Permutation table ───────────────────────────────────────────────

/// 512-entry permutation table: a Fisher-Yates shuffle of 0..255, doubled
/// so lookups never need a modulus.
pub fn build_perm_table(seed: i32) -> [u8; 512] {
    let mut rng = Mulberry32::new(seed);
    let mut perm = [0u8; 512];

    for i in 0..256u16 {
        perm[i as usize] = i as u8;
    }

    for i in (1..=255usize).rev() {
        let j = (rng.next_f64() * (i as f64 + 1.0)).floor() as usize;
        perm.swap(i, j);
    }

    for i in 0..256 {
        perm[i + 256] = perm[i];
    }

    perm
}

/// The shared permutation table.
pub fn perm_table() -> &'static [u8; 512] {
    static PERM: OnceLock<[u8; 512]> = OnceLock::new();
    PERM.get_or_init(|| build_perm_table(NOISE_SEED))
}

// ── 3D Simplex Noise ────────────────────────────────────────────────

const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

/// 3D simplex noise in approximately [-1, 1], with its analytic gradient.
pub fn simplex_3d(perm: &[u8; 512], p: Vec3) -> (f64, Vec3) {
    let (x, y, z) = (p.x, p.y, p.z);

    // Skew input to simplex cell coordinates
    let s = (x + y + z) * F3;
    let i = (x + s).floor() as i64;
    let j = (y + s).floor() as i64;
    let k = (z + s).floor() as i64;

    // Unskew to find cell origin
    let t = (i + j + k) as f64 * G3;
    let x0 = x - (i as f64 - t);
    let y0 = y - (j as f64 - t);
    let z0 = z - (k as f64 - t);

    // Which tetrahedron
    let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
        if y0 >= z0 {
            (1, 0, 0, 1, 1, 0)
        } else if x0 >= z0 {
            (1, 0, 0, 1, 0, 1)
        } else {
            (0, 0, 1, 1, 0, 1)
        }
    } else if y0 < z0 {
        (0, 0, 1, 0, 1, 1)
    } else if x0 < z0 {
        (0, 1, 0, 0, 1, 1)
    } else {
        (0, 1, 0, 1, 1, 0)
    };

    let corners = [
        Vec3::new(x0, y0, z0),
        Vec3::new(x0 - i1 as f64 + G3, y0 - j1 as f64 + G3, z0 - k1 as f64 + G3),
        Vec3::new(
            x0 - i2 as f64 + 2.0 * G3,
            y0 - j2 as f64 + 2.0 * G3,
            z0 - k2 as f64 + 2.0 * G3,
        ),
        Vec3::new(x0 - 1.0 + 3.0 * G3, y0 - 1.0 + 3.0 * G3, z0 - 1.0 + 3.0 * G3),
    ];

    let ii = (i & 255) as usize;
    let jj = (j & 255) as usize;
    let kk = (k & 255) as usize;
    let grads = [
        perm[ii + perm[jj + perm[kk] as usize] as usize] % 12,
        perm[ii + i1 + perm[jj + j1 + perm[kk + k1] as usize] as usize] % 12,
        perm[ii + i2 + perm[jj + j2 + perm[kk + k2] as usize] as usize] % 12,
        perm[ii + 1 + perm[jj + 1 + perm[kk + 1] as usize] as usize] % 12,
    ];

    // Corner contributions (kernel radius = 0.6)
    let mut value = 0.0;
    let mut grad = Vec3::ZERO;
    for (d, gi) in corners.iter().zip(grads) {
        let t = 0.6 - d.length2();
        if t < 0.0 {
            continue;
        }
        let g = GRAD3[gi as usize];
        let g = Vec3::new(g[0], g[1], g[2]);
        let gd = g.dot(*d);
        let t2 = t * t;
        let t4 = t2 * t2;
        value += t4 * gd;
        // d/dp (t^4 * g.d) = -8 t^3 (g.d) d + t^4 g
        grad += *d * (-8.0 * t2 * t * gd) + g * t4;
    }

    (32.0 * value, grad * 32.0)
}

// ── Fractal sums ────────────────────────────────────────────────────

/// Offset applied before sampling so the fractal origin is not a lattice point.
const FRACTAL_OFFSET: f64 = 123.456;

/// Octave weighting shared by the fractal sums.
#[derive(Debug, Clone, Copy)]
pub struct Octaves {
    pub amplitude: f64,
    pub octaves: u32,
    /// Amplitude ratio between successive octaves.
    pub persistence: f64,
    /// Largest half-footprint across the three axes. Octaves whose frequency
    /// exceeds the footprint are faded out and then dropped.
    pub footprint: f64,
}

impl Octaves {
    /// Frequency limit for the footprint.
    fn cutoff(&self) -> f64 {
        if self.footprint > 0.0 {
            0.5 / self.footprint
        } else {
            f64::INFINITY
        }
    }

    /// Sum of `amplitude * persistence^i * noise(2^i p)`, with gradient. When
    /// `absolute` is set each octave contributes its absolute value.
    pub fn sum(&self, p: Vec3, absolute: bool) -> (f64, Vec3) {
        let perm = perm_table();
        let cutoff = self.cutoff();
        let offset = Vec3::new(FRACTAL_OFFSET, FRACTAL_OFFSET, FRACTAL_OFFSET);
        let mut amp = self.amplitude;
        let mut scale = 1.0;
        let mut value = 0.0;
        let mut grad = Vec3::ZERO;
        for _ in 0..self.octaves {
            if scale >= cutoff {
                break;
            }
            let (n, g) = simplex_3d(perm, p * scale + offset);
            let mut d = amp * n;
            let mut dg = g * (amp * scale);
            if absolute && d < 0.0 {
                d = -d;
                dg = -dg;
            }
            if scale > 0.5 * cutoff {
                let fade = 2.0 * (1.0 - scale / cutoff);
                d *= fade;
                dg *= fade;
            }
            value += d;
            grad += dg;
            amp *= self.persistence;
            scale *= 2.0;
        }
        (value, grad)
    }
}

// ── Cell hashing ────────────────────────────────────────────────────

/// Integer hash of a lattice cell.
pub fn hash3(x: i64, y: i64, z: i64) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^ (h >> 16)
}

/// Stable value in [0, 1) for a cell id.
pub fn cell_value(id: u32) -> f64 {
    let mut rng = Mulberry32::new(id as i32);
    rng.next_f64();
    rng.next_f64()
}

/// Feature point of a lattice cell, in world coordinates.
pub fn feature_point(x: i64, y: i64, z: i64) -> (u32, Vec3) {
    let id = hash3(x, y, z);
    let mut rng = Mulberry32::new(id as i32);
    let p = Vec3::new(
        x as f64 + rng.next_f64(),
        y as f64 + rng.next_f64(),
        z as f64 + rng.next_f64(),
    );
    (id, p)
}
