// raytracer/ray.rs — a ray with its slab-test helpers

use crate::math::Vec3;

use super::bounds::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Expected to be unit length. Distances reported by intersection tests
    /// are measured in multiples of it.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Parametric range `[t_enter, t_exit]` over which the ray is inside the
    /// closed box, clipped to `t >= 0` on the exit side only. An axis with a
    /// zero direction component constrains nothing when the origin lies
    /// within the slab and rejects the ray otherwise.
    pub fn slab_interval(&self, b: &BoundingBox) -> Option<(f64, f64)> {
        let mut t_enter = f64::NEG_INFINITY;
        let mut t_exit = f64::INFINITY;
        for axis in 0..3 {
            let o = self.origin[axis];
            let d = self.direction[axis];
            if d == 0.0 {
                if o < b.min[axis] || o > b.max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (b.min[axis] - o) / d;
            let t2 = (b.max[axis] - o) / d;
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
        }
        (t_enter <= t_exit && t_exit >= 0.0).then_some((t_enter, t_exit))
    }

    /// Whether any point of the ray at `t >= 0` lies in the closed box.
    pub fn intersects(&self, b: &BoundingBox) -> bool {
        self.slab_interval(b).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn slab_reports_entry_and_exit() {
        let ray = Ray::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::X);
        let (t0, t1) = ray.slab_interval(&unit_box()).unwrap();
        assert_eq!((t0, t1), (1.0, 2.0));
    }

    #[test]
    fn box_behind_the_origin_is_missed() {
        let ray = Ray::new(Vec3::new(2.0, 0.5, 0.5), Vec3::X);
        assert!(!ray.intersects(&unit_box()));
        let inside = Ray::new(Vec3::new(0.5, 0.5, 0.5), Vec3::X);
        assert!(inside.intersects(&unit_box()));
    }

    #[test]
    fn axis_parallel_ray_outside_slab_misses() {
        let ray = Ray::new(Vec3::new(-1.0, 2.0, 0.5), Vec3::X);
        assert!(!ray.intersects(&unit_box()));
    }
}
