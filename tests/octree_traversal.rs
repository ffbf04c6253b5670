//! Integration tests for the octree over a scene of spheres.
//!
//! These tests verify:
//!   1. `find_node` returns the unique leaf containing any point inside the
//!      root, and nothing outside it
//!   2. Ray traversal visits exactly the leaves whose boxes the ray touches,
//!      without revisiting a leaf and without looping
//!   3. The sampler's nearest hit agrees with a brute-force search over all
//!      objects

use std::collections::BTreeSet;
use std::sync::Arc;

use procgraph::math::Vec3;
use procgraph::procedural::noise::Mulberry32;
use procgraph::raytracer::{NodeId, Octree, RTObject, RTSphere, Ray, RenderWorkspace, SurfaceSampler, UniformTexture};
use procgraph::{OctreeConfig, RenderConfig};

// ── Helpers ────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 100 spheres in the z = 0 plane, 100 in the y = 0 plane and 500 spread
/// through the volume, all inside [0, 10]^3 give or take their radius.
fn scene() -> Vec<Box<dyn RTObject>> {
    let tex = Arc::new(UniformTexture::default());
    let mut rng = Mulberry32::new(1234);
    let mut objects: Vec<Box<dyn RTObject>> = Vec::with_capacity(700);
    let mut push = |c: Vec3| objects.push(Box::new(RTSphere::at(c, 0.5, tex.clone())));
    for _ in 0..100 {
        push(Vec3::new(rng.range(0.0, 10.0), rng.range(0.0, 10.0), 0.0));
    }
    for _ in 0..100 {
        push(Vec3::new(rng.range(0.0, 10.0), 0.0, rng.range(0.0, 10.0)));
    }
    for _ in 0..500 {
        push(Vec3::new(rng.range(0.0, 10.0), rng.range(0.0, 10.0), rng.range(0.0, 10.0)));
    }
    objects
}

fn random_unit(rng: &mut Mulberry32) -> Vec3 {
    loop {
        let v = Vec3::new(rng.range(-0.5, 0.5), rng.range(-0.5, 0.5), rng.range(-0.5, 0.5));
        if v.length2() > 1e-6 {
            return v.normalize();
        }
    }
}

/// Rays starting on a shell around the scene center, some pointing in and
/// some pointing away.
fn random_rays(seed: i32, n: usize) -> Vec<Ray> {
    let mut rng = Mulberry32::new(seed);
    let center = Vec3::new(5.0, 5.0, 5.0);
    (0..n)
        .map(|_| {
            let origin = center + random_unit(&mut rng) * 10.0;
            Ray::new(origin, random_unit(&mut rng))
        })
        .collect()
}

fn brute_force_leaves(tree: &Octree, ray: &Ray) -> BTreeSet<NodeId> {
    tree.leaves()
        .iter()
        .copied()
        .filter(|&leaf| ray.intersects(tree.node(leaf).bounds()))
        .collect()
}

// ── Point location ─────────────────────────────────────────────────

#[test]
fn points_land_in_their_leaf() {
    init_logging();
    let objects = scene();
    let tree = Octree::build(&objects, &OctreeConfig::default());
    assert!(tree.leaves().len() > 8);

    let b = *tree.bounds();
    let mut rng = Mulberry32::new(99);
    for _ in 0..1000 {
        let p = Vec3::new(
            rng.range(b.min.x, b.max.x),
            rng.range(b.min.y, b.max.y),
            rng.range(b.min.z, b.max.z),
        );
        let leaf = tree.find_node(p).expect("point inside the root");
        assert!(tree.node(leaf).is_leaf());
        assert!(tree.contains(leaf, p));
        let holders = tree.leaves().iter().filter(|&&l| tree.contains(l, p)).count();
        assert_eq!(holders, 1);
    }

    for _ in 0..1000 {
        let p = Vec3::new(rng.range(-5.0, 15.0), rng.range(-5.0, 15.0), rng.range(-5.0, 15.0));
        assert_eq!(tree.find_node(p).is_some(), tree.contains(tree.root(), p));
    }
}

#[test]
fn root_corners_resolve() {
    let objects = scene();
    let tree = Octree::build(&objects, &OctreeConfig::default());
    let b = *tree.bounds();
    assert!(tree.find_node(b.min).is_some());
    assert!(tree.find_node(b.max).is_some());
    assert!(tree.find_node(b.max + Vec3::new(1e-9, 0.0, 0.0)).is_none());
}

// ── Traversal ──────────────────────────────────────────────────────

#[test]
fn traversal_visits_exactly_the_touched_leaves() {
    init_logging();
    let objects = scene();
    let tree = Octree::build(&objects, &OctreeConfig::default());

    for ray in random_rays(42, 1000) {
        let visited: Vec<NodeId> = tree.traverse(&ray).collect();
        assert!(visited.len() <= tree.leaves().len());
        for pair in visited.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        let unique: BTreeSet<NodeId> = visited.iter().copied().collect();
        assert_eq!(unique.len(), visited.len(), "a leaf was visited twice");
        assert_eq!(unique, brute_force_leaves(&tree, &ray));
        let entries: Vec<f64> = visited
            .iter()
            .map(|&leaf| ray.slab_interval(tree.node(leaf).bounds()).map_or(f64::NAN, |(t, _)| t))
            .collect();
        for pair in entries.windows(2) {
            assert!(pair[0] <= pair[1], "leaves out of order: {pair:?}");
        }
    }
}

#[test]
fn rays_in_split_planes_match_brute_force() {
    let objects = scene();
    let tree = Octree::build(&objects, &OctreeConfig::default());
    let b = *tree.bounds();
    let mid = b.center();
    // Rays running exactly along the root's midplanes and their crossings.
    for ray in [
        Ray::new(Vec3::new(b.min.x - 1.0, mid.y, mid.z), Vec3::X),
        Ray::new(Vec3::new(mid.x, b.max.y + 1.0, mid.z), -Vec3::Y),
        Ray::new(Vec3::new(mid.x, mid.y, b.min.z - 1.0), Vec3::Z),
        Ray::new(Vec3::new(b.min.x - 1.0, 3.0, mid.z), Vec3::new(1.0, 0.5, 0.0).normalize()),
        Ray::new(Vec3::new(mid.x, b.min.y - 1.0, b.min.z - 1.0), Vec3::new(0.0, 1.0, 1.0).normalize()),
    ] {
        let visited: Vec<NodeId> = tree.traverse(&ray).collect();
        let unique: BTreeSet<NodeId> = visited.iter().copied().collect();
        assert!(!visited.is_empty());
        assert_eq!(unique.len(), visited.len());
        assert_eq!(unique, brute_force_leaves(&tree, &ray));
    }
}

// ── Sampling ───────────────────────────────────────────────────────

#[test]
fn sampler_agrees_with_brute_force() {
    let sampler = SurfaceSampler::new(scene(), RenderConfig::default()).unwrap();
    let rays = random_rays(7, 300);
    let hits = sampler.sample(&rays);
    let mut ws = RenderWorkspace::new(sampler.config());

    for (ray, hit) in rays.iter().zip(&hits) {
        let nearest = sampler
            .objects()
            .iter()
            .filter_map(|o| {
                let s = o.check_intersection(ray);
                (0..s.num_intersections())
                    .map(|n| s.intersection_dist(n))
                    .find(|&d| d >= 0.0)
            })
            .fold(f64::INFINITY, f64::min);

        match hit {
            Some(hit) => {
                assert!((hit.distance - nearest).abs() < 1e-9);
                assert!((hit.normal.length() - 1.0).abs() < 1e-9);
            }
            None => assert!(nearest.is_infinite()),
        }
        assert_eq!(hit, &sampler.first_hit(ray, &mut ws));
    }
}
