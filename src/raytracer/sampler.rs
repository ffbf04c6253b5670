// raytracer/sampler.rs — nearest surface along each ray, in parallel
//
// Ties the two halves together: the octree locates the hit, and the hit's
// texture is evaluated through the worker's procedure copies. Each rayon
// job owns one RenderWorkspace for all the rays it handles.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::math::Vec3;

use super::object::{RTObject, SurfaceIntersection};
use super::octree::Octree;
use super::ray::Ray;
use super::texture::TextureSpec;
use super::workspace::RenderWorkspace;

/// The surface seen along one ray.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceHit {
    /// Index into the sampler's object list.
    pub object: usize,
    pub distance: f64,
    pub position: Vec3,
    pub true_normal: Vec3,
    /// Shading normal, after bump mapping.
    pub normal: Vec3,
    pub spec: TextureSpec,
}

#[derive(Debug)]
pub struct SurfaceSampler {
    objects: Vec<Box<dyn RTObject>>,
    octree: Octree,
    config: RenderConfig,
    /// Set when the config asks for a fixed thread count.
    pool: Option<ThreadPool>,
    /// Antialiasing footprint handed to textures, before the config's
    /// multiplier.
    pub footprint: f64,
    pub time: f64,
}

impl SurfaceSampler {
    /// Index `objects`. Fails only if the config's thread pool cannot be
    /// built.
    pub fn new(objects: Vec<Box<dyn RTObject>>, config: RenderConfig) -> Result<Self> {
        let octree = Octree::build(&objects, &config.octree);
        let pool = config.thread_pool()?;
        Ok(Self {
            objects,
            octree,
            config,
            pool,
            footprint: 0.0,
            time: 0.0,
        })
    }

    pub fn objects(&self) -> &[Box<dyn RTObject>] {
        &self.objects
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Nearest intersection along `ray`. Within each leaf only hits whose
    /// position lies in that leaf are accepted, so the first leaf with an
    /// accepted hit holds the nearest surface.
    fn nearest(&self, ray: &Ray) -> Option<(usize, usize, SurfaceIntersection<'_>)> {
        for leaf in self.octree.traverse(ray) {
            let node = self.octree.node(leaf);
            let bounds = node.bounds();
            let mut best: Option<(usize, usize, SurfaceIntersection<'_>)> = None;
            for &index in node.objects().unwrap_or(&[]) {
                let hit = self.objects[index].check_intersection(ray);
                let Some(n) = (0..hit.num_intersections()).find(|&n| {
                    hit.intersection_dist(n) >= 0.0 && bounds.contains_closed(hit.intersection_point(n))
                }) else {
                    continue;
                };
                let closer = best
                    .as_ref()
                    .map_or(true, |(_, bn, b)| hit.intersection_dist(n) < b.intersection_dist(*bn));
                if closer {
                    best = Some((index, n, hit));
                }
            }
            if best.is_some() {
                return best;
            }
        }
        None
    }

    /// Trace one ray with a caller-owned workspace. Results are also left
    /// in the workspace's depth-0 slots.
    pub fn first_hit(&self, ray: &Ray, ws: &mut RenderWorkspace) -> Option<SurfaceHit> {
        ws.ray[0] = *ray;
        let Some((object, n, hit)) = self.nearest(ray) else {
            ws.first_object_hit = None;
            return None;
        };
        let size = self.footprint * self.config.antialiasing;
        let (spec, normal) = hit.intersection_properties(&mut ws.textures, n, ray.direction, size, self.time);
        let surface = SurfaceHit {
            object,
            distance: hit.intersection_dist(n),
            position: hit.intersection_point(n),
            true_normal: hit.true_normal_at(n),
            normal,
            spec,
        };
        ws.first_object_hit = Some(object);
        ws.pos[0] = surface.position;
        ws.true_normal[0] = surface.true_normal;
        ws.normal[0] = surface.normal;
        ws.surf_spec[0] = surface.spec;
        Some(surface)
    }

    /// Trace every ray. Results are in input order.
    pub fn sample(&self, rays: &[Ray]) -> Vec<Option<SurfaceHit>> {
        let trace = || -> Vec<Option<SurfaceHit>> {
            rays.par_iter()
                .map_init(
                    || RenderWorkspace::new(&self.config),
                    |ws, ray| self.first_hit(ray, ws),
                )
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(trace),
            None => trace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;
    use crate::raytracer::bounds::BoundingBox;
    use crate::raytracer::object::RTSphere;
    use crate::raytracer::texture::{TextureMapping, UniformTexture};
    use std::sync::Arc;

    fn row_of_spheres() -> SurfaceSampler {
        let tex = Arc::new(UniformTexture::default());
        let objects: Vec<Box<dyn RTObject>> = (0..6)
            .map(|i| Box::new(RTSphere::at(Vec3::new(i as f64 * 3.0, 0.0, 0.0), 1.0, tex.clone())) as Box<dyn RTObject>)
            .collect();
        let mut config = RenderConfig::default();
        config.octree.max_leaf_objects = 1;
        SurfaceSampler::new(objects, config).unwrap()
    }

    #[test]
    fn nearest_sphere_along_the_row() {
        let sampler = row_of_spheres();
        assert!(sampler.octree().leaves().len() > 1);
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let mut ws = RenderWorkspace::new(sampler.config());
        let hit = sampler.first_hit(&ray, &mut ws).unwrap();
        assert_eq!(hit.object, 0);
        assert!((hit.distance - 4.0).abs() < 1e-9);
        assert_eq!(ws.first_object_hit, Some(0));

        let back = Ray::new(Vec3::new(25.0, 0.0, 0.0), -Vec3::X);
        assert_eq!(sampler.first_hit(&back, &mut ws).unwrap().object, 5);
    }

    #[test]
    fn parallel_sample_matches_serial() {
        let sampler = row_of_spheres();
        let rays: Vec<Ray> = (0..40)
            .map(|i| Ray::new(Vec3::new(i as f64 * 0.4 - 1.0, 0.3, -10.0), Vec3::Z))
            .collect();
        let parallel = sampler.sample(&rays);
        let mut ws = RenderWorkspace::new(sampler.config());
        for (ray, got) in rays.iter().zip(&parallel) {
            assert_eq!(got, &sampler.first_hit(ray, &mut ws));
        }
        assert!(parallel.iter().any(Option::is_some));
        assert!(parallel.iter().any(Option::is_none));
    }

    #[test]
    fn single_thread_pool_matches_global_pool() {
        let global = row_of_spheres();
        let mut config = global.config().clone();
        config.threads = Some(1);
        let objects: Vec<Box<dyn RTObject>> = (0..6)
            .map(|i| {
                let tex = Arc::new(UniformTexture::default());
                Box::new(RTSphere::at(Vec3::new(i as f64 * 3.0, 0.0, 0.0), 1.0, tex)) as Box<dyn RTObject>
            })
            .collect();
        let single = SurfaceSampler::new(objects, config).unwrap();
        let rays: Vec<Ray> = (0..40)
            .map(|i| Ray::new(Vec3::new(i as f64 * 0.4 - 1.0, -0.2, -10.0), Vec3::Z))
            .collect();
        assert_eq!(single.sample(&rays), global.sample(&rays));
    }

    /// A sphere that reports both roots, including one behind the ray.
    #[derive(Debug)]
    struct BothRoots(RTSphere);

    impl RTObject for BothRoots {
        fn bounds(&self) -> BoundingBox {
            self.0.bounds()
        }

        fn check_intersection(&self, ray: &Ray) -> SurfaceIntersection<'_> {
            let v = self.0.center() - ray.origin;
            let b = ray.direction.dot(v);
            let d = b * b - (v.length2() - self.0.radius() * self.0.radius());
            if d < 0.0 {
                return SurfaceIntersection::none();
            }
            let (t1, t2) = (b - d.sqrt(), b + d.sqrt());
            SurfaceIntersection::new(self, 2, [ray.at(t1), ray.at(t2)], [t1, t2])
        }

        fn texture_mapping(&self) -> &dyn TextureMapping {
            self.0.texture_mapping()
        }

        fn to_local(&self) -> &Mat4 {
            self.0.to_local()
        }

        fn from_local(&self) -> &Mat4 {
            self.0.from_local()
        }

        fn normal_at(&self, point: Vec3) -> Vec3 {
            self.0.normal_at(point)
        }
    }

    #[test]
    fn accepted_second_hit_shades_with_its_own_normal() {
        let sphere = RTSphere::at(Vec3::ZERO, 1.0, Arc::new(UniformTexture::default()));
        let objects: Vec<Box<dyn RTObject>> = vec![Box::new(BothRoots(sphere))];
        let sampler = SurfaceSampler::new(objects, RenderConfig::default()).unwrap();
        let mut ws = RenderWorkspace::new(sampler.config());

        let hit = sampler.first_hit(&Ray::new(Vec3::ZERO, Vec3::X), &mut ws).unwrap();
        assert_eq!(hit.distance, 1.0);
        assert_eq!(hit.position, Vec3::X);
        assert_eq!(hit.true_normal, Vec3::X);
        assert_eq!(hit.normal, Vec3::X);
        assert_eq!(ws.true_normal[0], Vec3::X);
    }
}
