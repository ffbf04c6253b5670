// raytracer/bounds.rs — axis-aligned bounding boxes

use crate::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box; the identity for [`BoundingBox::union`].
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|a| self.min[a] > self.max[a])
    }

    pub fn union(&self, o: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        for a in 0..3 {
            out.min[a] = out.min[a].min(o.min[a]);
            out.max[a] = out.max[a].max(o.max[a]);
        }
        out
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Closed-box overlap. Boxes sharing only a face count as overlapping.
    pub fn intersects(&self, o: &BoundingBox) -> bool {
        (0..3).all(|a| self.min[a] <= o.max[a] && o.min[a] <= self.max[a])
    }

    /// Closed containment.
    pub fn contains_closed(&self, p: Vec3) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }

    /// Octant `i` of the box split at `mid`. Bit 0 selects the upper half in
    /// x, bit 1 in y, bit 2 in z. Faces are copied from `self` or `mid`
    /// exactly, so siblings share bit-identical faces.
    pub fn octant(&self, mid: Vec3, i: usize) -> BoundingBox {
        let mut out = *self;
        for a in 0..3 {
            if i & (1 << a) != 0 {
                out.min[a] = mid[a];
            } else {
                out.max[a] = mid[a];
            }
        }
        out
    }
}
