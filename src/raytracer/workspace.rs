// raytracer/workspace.rs — per-worker scratch space
//
// One workspace per render worker, allocated once and reused for every ray
// that worker traces. Per-depth arrays hold `max_ray_depth + 1` entries
// (depth 0 is the primary ray). The material-change stack is the only
// structure that grows.

use log::debug;

use crate::config::RenderConfig;
use crate::math::{RGBColor, Vec3};

use super::ray::Ray;
use super::texture::{TextureSpec, TextureWorkers};

const INITIAL_MATERIAL_CHANGES: usize = 16;

/// A point where a ray enters or leaves a material.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaterialIntersection {
    pub distance: f64,
    /// Object whose material starts or ends here.
    pub object: Option<usize>,
    pub entering: bool,
}

#[derive(Debug)]
pub struct RenderWorkspace {
    max_ray_depth: usize,
    pub ray: Vec<Ray>,
    pub color: Vec<RGBColor>,
    pub ray_intensity: Vec<RGBColor>,
    pub surf_spec: Vec<TextureSpec>,
    pub pos: Vec<Vec3>,
    pub normal: Vec<Vec3>,
    pub true_normal: Vec<Vec3>,
    pub transparency: Vec<f64>,
    pub first_object_hit: Option<usize>,
    mat_change: Vec<MaterialIntersection>,
    /// This worker's procedure copies.
    pub textures: TextureWorkers,
}

impl RenderWorkspace {
    pub fn new(config: &RenderConfig) -> Self {
        Self::with_depth(config.max_ray_depth)
    }

    pub fn with_depth(max_ray_depth: usize) -> Self {
        let n = max_ray_depth + 1;
        Self {
            max_ray_depth,
            ray: vec![Ray::new(Vec3::ZERO, Vec3::Z); n],
            color: vec![RGBColor::BLACK; n],
            ray_intensity: vec![RGBColor::BLACK; n],
            surf_spec: vec![TextureSpec::default(); n],
            pos: vec![Vec3::ZERO; n],
            normal: vec![Vec3::ZERO; n],
            true_normal: vec![Vec3::ZERO; n],
            transparency: vec![0.0; n],
            first_object_hit: None,
            mat_change: vec![MaterialIntersection::default(); INITIAL_MATERIAL_CHANGES],
            textures: TextureWorkers::new(),
        }
    }

    pub fn max_ray_depth(&self) -> usize {
        self.max_ray_depth
    }

    pub fn material_changes(&self) -> &[MaterialIntersection] {
        &self.mat_change
    }

    pub fn material_changes_mut(&mut self) -> &mut [MaterialIntersection] {
        &mut self.mat_change
    }

    /// Double the material-change stack, keeping existing entries.
    pub fn increase_material_change_length(&mut self) {
        let len = self.mat_change.len().max(1) * 2;
        self.mat_change.resize(len, MaterialIntersection::default());
    }

    /// Release the workspace after rendering. Consuming `self` rules out
    /// reuse.
    pub fn cleanup(self) {
        debug!(
            "releasing render workspace: {} procedure copies, {} material slots",
            self.textures.len(),
            self.mat_change.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_depth_arrays_include_primary_ray() {
        let ws = RenderWorkspace::new(&RenderConfig::default());
        assert_eq!(ws.max_ray_depth(), 8);
        for len in [
            ws.ray.len(),
            ws.color.len(),
            ws.ray_intensity.len(),
            ws.surf_spec.len(),
            ws.pos.len(),
            ws.normal.len(),
            ws.true_normal.len(),
            ws.transparency.len(),
        ] {
            assert_eq!(len, 9);
        }
    }

    #[test]
    fn material_stack_doubles_and_keeps_entries() {
        let mut ws = RenderWorkspace::with_depth(0);
        assert_eq!(ws.material_changes().len(), 16);
        ws.material_changes_mut()[3].distance = 2.5;
        ws.increase_material_change_length();
        assert_eq!(ws.material_changes().len(), 32);
        assert_eq!(ws.material_changes()[3].distance, 2.5);
        ws.increase_material_change_length();
        assert_eq!(ws.material_changes().len(), 64);
        ws.cleanup();
    }
}
