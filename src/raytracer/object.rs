// raytracer/object.rs — renderable primitives and their ray hits
//
// An `RTObject` is an immutable per-render wrapper around a scene primitive
// and its local↔world transforms. `check_intersection` reports up to two
// hits as a `SurfaceIntersection` that borrows the object; surface
// properties are computed from it on demand.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::math::{Mat4, RGBColor, Vec3};
use crate::procedural::PointInfo;

use super::bounds::BoundingBox;
use super::ray::Ray;
use super::texture::{TextureMapping, TextureSpec, TextureWorkers};

pub trait RTObject: Send + Sync + fmt::Debug {
    fn bounds(&self) -> BoundingBox;

    fn check_intersection(&self, ray: &Ray) -> SurfaceIntersection<'_>;

    fn texture_mapping(&self) -> &dyn TextureMapping;

    /// World → local.
    fn to_local(&self) -> &Mat4;

    /// Local → world.
    fn from_local(&self) -> &Mat4;

    /// Geometric normal at a point on the surface.
    fn normal_at(&self, point: Vec3) -> Vec3;

    /// Per-object texture parameter values.
    fn params(&self) -> &[f64] {
        &[]
    }

    fn is_bump_mapped(&self) -> bool {
        self.texture_mapping().has_bump()
    }
}

// ── Intersection ────────────────────────────────────────────────────

/// Up to two hits of one ray against one object, nearest first.
pub struct SurfaceIntersection<'a> {
    object: Option<&'a dyn RTObject>,
    count: usize,
    dist: [f64; 2],
    points: [Vec3; 2],
    true_normal: [OnceCell<Vec3>; 2],
}

impl fmt::Debug for SurfaceIntersection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceIntersection")
            .field("count", &self.count)
            .field("dist", &&self.dist[..self.count])
            .field("points", &&self.points[..self.count])
            .finish()
    }
}

impl<'a> SurfaceIntersection<'a> {
    /// The miss result. It references no object and reports no hits.
    pub fn none() -> Self {
        Self {
            object: None,
            count: 0,
            dist: [0.0; 2],
            points: [Vec3::ZERO; 2],
            true_normal: [OnceCell::new(), OnceCell::new()],
        }
    }

    /// `count` hits (1 or 2); unused slots are ignored.
    pub fn new(object: &'a dyn RTObject, count: usize, points: [Vec3; 2], dist: [f64; 2]) -> Self {
        Self {
            object: Some(object),
            count: count.min(2),
            dist,
            points,
            true_normal: [OnceCell::new(), OnceCell::new()],
        }
    }

    pub fn is_none(&self) -> bool {
        self.count == 0
    }

    pub fn object(&self) -> Option<&'a dyn RTObject> {
        self.object
    }

    pub fn num_intersections(&self) -> usize {
        self.count
    }

    pub fn intersection_point(&self, n: usize) -> Vec3 {
        self.points[n.min(1)]
    }

    pub fn intersection_dist(&self, n: usize) -> f64 {
        self.dist[n.min(1)]
    }

    /// Un-bumped normal at the first hit, computed on first use.
    pub fn true_normal(&self) -> Vec3 {
        self.true_normal_at(0)
    }

    /// Un-bumped normal at hit `n`.
    pub fn true_normal_at(&self, n: usize) -> Vec3 {
        let n = n.min(1);
        match self.object {
            Some(obj) => *self.true_normal[n].get_or_init(|| obj.normal_at(self.points[n])),
            None => Vec3::ZERO,
        }
    }

    fn texture_point(&self, obj: &dyn RTObject, n: usize, angle: f64, size: f64, time: f64) -> PointInfo {
        let mut pos = self.intersection_point(n);
        if !obj.texture_mapping().is_uniform() {
            pos = obj.to_local().transform(pos);
        }
        let mut point = PointInfo::at(pos.x, pos.y, pos.z)
            .with_size(size)
            .with_time(time)
            .with_params(obj.params());
        point.viewangle = angle;
        point
    }

    /// Texture at hit `n` and the shading normal there. The shading normal
    /// is the true normal perturbed by the texture's bump gradient, which is
    /// returned in world space.
    pub fn intersection_properties(
        &self,
        workers: &mut TextureWorkers,
        n: usize,
        view_dir: Vec3,
        size: f64,
        time: f64,
    ) -> (TextureSpec, Vec3) {
        let Some(obj) = self.object else {
            return (TextureSpec::default(), Vec3::ZERO);
        };
        let mut normal = self.true_normal_at(n);
        let point = self.texture_point(obj, n, -normal.dot(view_dir), size, time);
        let mut spec = obj.texture_mapping().texture_spec(workers, &point);
        if obj.is_bump_mapped() {
            let bump = obj.from_local().transform_direction(spec.bump_grad);
            spec.bump_grad = bump;
            normal = (normal * (bump.dot(normal) + 1.0) - bump).normalize();
        }
        (spec, normal)
    }

    /// Transparent color at hit `n`.
    pub fn intersection_transparency(
        &self,
        workers: &mut TextureWorkers,
        n: usize,
        angle: f64,
        size: f64,
        time: f64,
    ) -> RGBColor {
        let Some(obj) = self.object else {
            return RGBColor::BLACK;
        };
        let point = self.texture_point(obj, n, angle, size, time);
        obj.texture_mapping().transparency(workers, &point)
    }
}

// ── Sphere ──────────────────────────────────────────────────────────

const SPHERE_TOL: f64 = 1e-12;

/// A true sphere (equal radii) placed by `from_local`.
#[derive(Debug, Clone)]
pub struct RTSphere {
    center: Vec3,
    radius: f64,
    r2: f64,
    /// Band around the surface inside which a ray origin counts as on it.
    tol: f64,
    texture: Arc<dyn TextureMapping>,
    params: Vec<f64>,
    bump_mapped: bool,
    from_local: Mat4,
    to_local: Mat4,
}

impl RTSphere {
    pub fn new(
        radius: f64,
        from_local: Mat4,
        to_local: Mat4,
        texture: Arc<dyn TextureMapping>,
        params: Vec<f64>,
    ) -> Self {
        let w = from_local.m[3][3];
        let center = from_local.translation_part() * (1.0 / w);
        let r2 = radius * radius;
        let t = from_local.translation_part();
        let tol = (t.x.abs().max(t.y.abs()).max(t.z.abs()) + radius).max(r2) * SPHERE_TOL;
        let bump_mapped = texture.has_bump();
        Self {
            center,
            radius,
            r2,
            tol,
            texture,
            params,
            bump_mapped,
            from_local,
            to_local,
        }
    }

    /// A sphere translated to `center`.
    pub fn at(center: Vec3, radius: f64, texture: Arc<dyn TextureMapping>) -> Self {
        Self::new(
            radius,
            Mat4::translation(center),
            Mat4::translation(-center),
            texture,
            Vec::new(),
        )
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Snap a point onto the surface to undo roundoff.
    fn project(&self, p: Vec3) -> Vec3 {
        let d = p - self.center;
        self.center + d * (self.radius / d.length())
    }
}

impl RTObject for RTSphere {
    fn bounds(&self) -> BoundingBox {
        let r = Vec3::new(self.radius, self.radius, self.radius);
        BoundingBox::new(self.center - r, self.center + r)
    }

    fn check_intersection(&self, ray: &Ray) -> SurfaceIntersection<'_> {
        let v = self.center - ray.origin;
        let b = ray.direction.dot(v);
        let c = v.length2() - self.r2;
        let (count, t1, t2) = if c > self.tol {
            // Origin outside: zero or two hits.
            if b <= 0.0 {
                return SurfaceIntersection::none();
            }
            let d = b * b - c;
            if d < 0.0 {
                return SurfaceIntersection::none();
            }
            let root = d.sqrt();
            (2, b - root, b + root)
        } else if c < -self.tol {
            // Origin inside: the exit point only.
            let d = b * b - c;
            if d < 0.0 {
                return SurfaceIntersection::none();
            }
            (1, b + d.sqrt(), 0.0)
        } else {
            // Origin on the surface: the far side, if heading inward.
            if b <= 0.0 {
                return SurfaceIntersection::none();
            }
            let d = b * b - c;
            if d < 0.0 {
                return SurfaceIntersection::none();
            }
            (1, b + d.sqrt(), 0.0)
        };
        let p1 = self.project(ray.at(t1));
        let p2 = if count == 2 { self.project(ray.at(t2)) } else { Vec3::ZERO };
        SurfaceIntersection::new(self, count, [p1, p2], [t1, t2])
    }

    fn texture_mapping(&self) -> &dyn TextureMapping {
        self.texture.as_ref()
    }

    fn to_local(&self) -> &Mat4 {
        &self.to_local
    }

    fn from_local(&self) -> &Mat4 {
        &self.from_local
    }

    fn normal_at(&self, point: Vec3) -> Vec3 {
        (point - self.center).normalize()
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn is_bump_mapped(&self) -> bool {
        self.bump_mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raytracer::texture::UniformTexture;

    fn unit_sphere() -> RTSphere {
        RTSphere::at(Vec3::ZERO, 1.0, Arc::new(UniformTexture::default()))
    }

    #[test]
    fn ray_through_center_hits_twice() {
        let s = unit_sphere();
        let hit = s.check_intersection(&Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z));
        assert_eq!(hit.num_intersections(), 2);
        assert!((hit.intersection_dist(0) - 1.0).abs() < 1e-12);
        assert!((hit.intersection_dist(1) - 3.0).abs() < 1e-12);
        for n in 0..2 {
            assert!((hit.intersection_point(n).length() - 1.0).abs() < 1e-12);
        }
        assert_eq!(hit.true_normal(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn pointing_away_misses() {
        let s = unit_sphere();
        let hit = s.check_intersection(&Ray::new(Vec3::new(0.0, 0.0, -2.0), -Vec3::Z));
        assert!(hit.is_none());
        assert!(hit.object().is_none());
        let wide = s.check_intersection(&Ray::new(Vec3::new(0.0, 2.0, -2.0), Vec3::Z));
        assert!(wide.is_none());
    }

    #[test]
    fn inside_origin_reports_exit_only() {
        let s = unit_sphere();
        let hit = s.check_intersection(&Ray::new(Vec3::ZERO, Vec3::X));
        assert_eq!(hit.num_intersections(), 1);
        assert!((hit.intersection_dist(0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn origin_on_surface_sees_the_far_side() {
        let s = unit_sphere();
        let hit = s.check_intersection(&Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::Z));
        assert_eq!(hit.num_intersections(), 1);
        assert!((hit.intersection_dist(0) - 2.0).abs() < 1e-12);
        let leaving = s.check_intersection(&Ray::new(Vec3::new(0.0, 0.0, -1.0), -Vec3::Z));
        assert!(leaving.is_none());
    }

    #[test]
    fn translated_sphere_bounds_and_properties() {
        let s = RTSphere::at(Vec3::new(5.0, 0.0, 0.0), 0.5, Arc::new(UniformTexture::default()));
        let b = s.bounds();
        assert_eq!(b.min, Vec3::new(4.5, -0.5, -0.5));
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let hit = s.check_intersection(&ray);
        assert!((hit.intersection_dist(0) - 4.5).abs() < 1e-12);
        let (spec, n) = hit.intersection_properties(&mut TextureWorkers::new(), 0, ray.direction, 0.0, 0.0);
        assert_eq!(spec.diffuse, RGBColor::WHITE);
        assert_eq!(n, hit.true_normal());
    }

    #[test]
    fn second_hit_has_its_own_normal() {
        let s = unit_sphere();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);
        let hit = s.check_intersection(&ray);
        assert_eq!(hit.true_normal_at(1), Vec3::Z);
        assert_eq!(hit.true_normal_at(0), -Vec3::Z);
        let mut workers = TextureWorkers::new();
        let (_, far) = hit.intersection_properties(&mut workers, 1, ray.direction, 0.0, 0.0);
        let (_, near) = hit.intersection_properties(&mut workers, 0, ray.direction, 0.0, 0.0);
        assert_eq!(far, Vec3::Z);
        assert_eq!(near, -Vec3::Z);
    }
}
