// procedural/point.rs — the per-sample query

use smallvec::SmallVec;

/// Everything a procedure needs to know about one sample: where it is, how
/// large its antialiasing footprint is, when it is, and any per-object
/// parameter values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointInfo {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub xsize: f64,
    pub ysize: f64,
    pub zsize: f64,
    pub viewangle: f64,
    pub t: f64,
    pub param: SmallVec<[f64; 4]>,
}

impl PointInfo {
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    /// Same footprint on all three axes.
    pub fn with_size(mut self, size: f64) -> Self {
        self.xsize = size;
        self.ysize = size;
        self.zsize = size;
        self
    }

    pub fn with_time(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    pub fn with_params(mut self, params: &[f64]) -> Self {
        self.param = SmallVec::from_slice(params);
        self
    }

    /// Coordinate on axis 0, 1 or 2.
    #[inline]
    pub fn coord(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Footprint on axis 0, 1 or 2.
    #[inline]
    pub fn size(&self, axis: usize) -> f64 {
        match axis {
            0 => self.xsize,
            1 => self.ysize,
            _ => self.zsize,
        }
    }
}
