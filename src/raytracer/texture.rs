// raytracer/texture.rs — surface properties at a hit point
//
// A `TextureMapping` turns a point (in the object's local space for
// procedural textures, world space for uniform ones) into a `TextureSpec`.
// Procedural textures evaluate their procedure through the calling worker's
// `TextureWorkers`, never through the shared template.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ProcError, Result};
use crate::math::{RGBColor, Vec3};
use crate::procedural::{OutputModule, PointInfo, Procedure, WorkerProcedures};

/// Surface description consumed by shading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureSpec {
    pub diffuse: RGBColor,
    pub specular: RGBColor,
    pub transparent: RGBColor,
    pub emissive: RGBColor,
    pub hilight: RGBColor,
    pub roughness: f64,
    pub cloudiness: f64,
    /// Bump gradient. Local space as produced by a mapping; intersection
    /// code rewrites it into world space.
    pub bump_grad: Vec3,
}

/// Raw channel values before the energy split.
#[derive(Debug, Clone, Copy)]
struct Channels {
    diffuse: RGBColor,
    specular: RGBColor,
    transparent: RGBColor,
    emissive: RGBColor,
    transparency: f64,
    specularity: f64,
    shininess: f64,
    roughness: f64,
    cloudiness: f64,
}

impl TextureSpec {
    fn from_channels(c: Channels) -> Self {
        let t = c.transparency.clamp(0.0, 1.0) as f32;
        let s = c.specularity.clamp(0.0, 1.0) as f32;
        let h = c.shininess.clamp(0.0, 1.0) as f32;
        TextureSpec {
            diffuse: c.diffuse.scale((1.0 - t) * (1.0 - s)),
            specular: c.specular.scale((1.0 - t) * s),
            hilight: c.specular.scale((1.0 - t) * h),
            transparent: c.transparent.scale(t),
            emissive: c.emissive,
            roughness: c.roughness.clamp(0.0, 1.0),
            cloudiness: c.cloudiness.clamp(0.0, 1.0),
            bump_grad: Vec3::ZERO,
        }
    }
}

/// Parts of a texture a renderer may skip when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureComponent {
    Diffuse,
    Specular,
    Transparent,
    Hilight,
    Emissive,
    Bump,
    Displacement,
}

/// Identity of a procedural texture, used to key worker copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TextureId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// One worker's procedure copies, keyed by texture.
pub type TextureWorkers = WorkerProcedures<TextureId>;

pub trait TextureMapping: Send + Sync + std::fmt::Debug {
    fn texture_spec(&self, workers: &mut TextureWorkers, point: &PointInfo) -> TextureSpec;

    /// Transparent color times transparency, without the rest of the spec.
    fn transparency(&self, workers: &mut TextureWorkers, point: &PointInfo) -> RGBColor;

    fn has_component(&self, component: TextureComponent) -> bool;

    fn has_bump(&self) -> bool {
        self.has_component(TextureComponent::Bump)
    }

    /// Uniform mappings ignore position, so callers may skip the transform
    /// into local space.
    fn is_uniform(&self) -> bool {
        false
    }
}

// ── Uniform ─────────────────────────────────────────────────────────

/// The same surface everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformTexture {
    pub diffuse_color: RGBColor,
    pub specular_color: RGBColor,
    pub transparent_color: RGBColor,
    pub emissive_color: RGBColor,
    pub transparency: f64,
    pub specularity: f64,
    pub shininess: f64,
    pub roughness: f64,
    pub cloudiness: f64,
}

impl Default for UniformTexture {
    fn default() -> Self {
        Self {
            diffuse_color: RGBColor::WHITE,
            specular_color: RGBColor::WHITE,
            transparent_color: RGBColor::WHITE,
            emissive_color: RGBColor::BLACK,
            transparency: 0.0,
            specularity: 0.0,
            shininess: 0.0,
            roughness: 0.0,
            cloudiness: 0.0,
        }
    }
}

impl UniformTexture {
    fn channels(&self) -> Channels {
        Channels {
            diffuse: self.diffuse_color,
            specular: self.specular_color,
            transparent: self.transparent_color,
            emissive: self.emissive_color,
            transparency: self.transparency,
            specularity: self.specularity,
            shininess: self.shininess,
            roughness: self.roughness,
            cloudiness: self.cloudiness,
        }
    }
}

impl TextureMapping for UniformTexture {
    fn texture_spec(&self, _workers: &mut TextureWorkers, _point: &PointInfo) -> TextureSpec {
        TextureSpec::from_channels(self.channels())
    }

    fn transparency(&self, _workers: &mut TextureWorkers, _point: &PointInfo) -> RGBColor {
        self.transparent_color.scale(self.transparency.clamp(0.0, 1.0) as f32)
    }

    fn has_component(&self, component: TextureComponent) -> bool {
        match component {
            TextureComponent::Diffuse => true,
            TextureComponent::Specular => self.specularity != 0.0,
            TextureComponent::Transparent => self.transparency != 0.0,
            TextureComponent::Hilight => self.shininess != 0.0,
            TextureComponent::Emissive => self.emissive_color != RGBColor::BLACK,
            TextureComponent::Bump | TextureComponent::Displacement => false,
        }
    }

    fn is_uniform(&self) -> bool {
        true
    }
}

// ── Procedural ──────────────────────────────────────────────────────

/// A texture computed by a procedure with the standard eleven outputs.
#[derive(Debug)]
pub struct ProceduralTexture {
    id: TextureId,
    procedure: Procedure,
    /// Multiplier on the footprint passed to the procedure.
    pub antialiasing: f64,
}

impl ProceduralTexture {
    pub const DIFFUSE: usize = 0;
    pub const SPECULAR: usize = 1;
    pub const TRANSPARENT: usize = 2;
    pub const EMISSIVE: usize = 3;
    pub const TRANSPARENCY: usize = 4;
    pub const SPECULARITY: usize = 5;
    pub const SHININESS: usize = 6;
    pub const ROUGHNESS: usize = 7;
    pub const CLOUDINESS: usize = 8;
    pub const BUMP_HEIGHT: usize = 9;
    pub const DISPLACEMENT: usize = 10;

    /// Output modules in slot order, with their defaults.
    pub fn output_modules() -> Vec<OutputModule> {
        vec![
            OutputModule::color("Diffuse", RGBColor::WHITE),
            OutputModule::color("Specular", RGBColor::WHITE),
            OutputModule::color("Transparent", RGBColor::WHITE),
            OutputModule::color("Emissive", RGBColor::BLACK),
            OutputModule::number("Transparency", 0.0),
            OutputModule::number("Specularity", 0.0),
            OutputModule::number("Shininess", 0.0),
            OutputModule::number("Roughness", 0.0),
            OutputModule::number("Cloudiness", 0.0),
            OutputModule::number("BumpHeight", 0.0),
            OutputModule::number("Displacement", 0.0),
        ]
    }

    /// A texture with an unwired procedure: plain white diffuse.
    pub fn new() -> Self {
        Self {
            id: TextureId::next(),
            procedure: Procedure::new(Self::output_modules()),
            antialiasing: 1.0,
        }
    }

    /// Wrap an existing procedure, which must have the eleven outputs.
    pub fn from_procedure(procedure: Procedure) -> Result<Self> {
        let expected = Self::output_modules().len();
        if procedure.outputs().len() != expected {
            return Err(ProcError::OutputShapeMismatch {
                expected,
                found: procedure.outputs().len(),
            });
        }
        Ok(Self {
            id: TextureId::next(),
            procedure,
            antialiasing: 1.0,
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    /// Edits bump the procedure's revision; worker copies rebuild on their
    /// next lookup.
    pub fn procedure_mut(&mut self) -> &mut Procedure {
        &mut self.procedure
    }

    fn prepare<'w>(&self, workers: &'w mut TextureWorkers, point: &PointInfo) -> &'w mut Procedure {
        let copy = workers.get(self.id, &self.procedure);
        let mut point = point.clone();
        point.xsize *= self.antialiasing;
        point.ysize *= self.antialiasing;
        point.zsize *= self.antialiasing;
        copy.init_for_point(point);
        copy
    }

    /// Displacement output at `point`.
    pub fn displacement(&self, workers: &mut TextureWorkers, point: &PointInfo) -> f64 {
        self.prepare(workers, point).output_value(Self::DISPLACEMENT)
    }
}

impl Default for ProceduralTexture {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureMapping for ProceduralTexture {
    fn texture_spec(&self, workers: &mut TextureWorkers, point: &PointInfo) -> TextureSpec {
        let pr = self.prepare(workers, point);
        let channels = Channels {
            diffuse: pr.output_color(Self::DIFFUSE),
            specular: pr.output_color(Self::SPECULAR),
            transparent: pr.output_color(Self::TRANSPARENT),
            emissive: pr.output_color(Self::EMISSIVE),
            transparency: pr.output_value(Self::TRANSPARENCY),
            specularity: pr.output_value(Self::SPECULARITY),
            shininess: pr.output_value(Self::SHININESS),
            roughness: pr.output_value(Self::ROUGHNESS),
            cloudiness: pr.output_value(Self::CLOUDINESS),
        };
        let mut spec = TextureSpec::from_channels(channels);
        spec.bump_grad = pr.output_gradient(Self::BUMP_HEIGHT) * 0.04;
        spec
    }

    fn transparency(&self, workers: &mut TextureWorkers, point: &PointInfo) -> RGBColor {
        let pr = self.prepare(workers, point);
        let t = pr.output_value(Self::TRANSPARENCY).clamp(0.0, 1.0);
        pr.output_color(Self::TRANSPARENT).scale(t as f32)
    }

    fn has_component(&self, component: TextureComponent) -> bool {
        let wired = |slot| self.procedure.output_source(slot).is_some();
        match component {
            TextureComponent::Diffuse => true,
            TextureComponent::Specular => wired(Self::SPECULARITY),
            TextureComponent::Transparent => wired(Self::TRANSPARENCY),
            TextureComponent::Hilight => wired(Self::SHININESS),
            TextureComponent::Emissive => wired(Self::EMISSIVE),
            TextureComponent::Bump => wired(Self::BUMP_HEIGHT),
            TextureComponent::Displacement => wired(Self::DISPLACEMENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedural::modules::{CoordinateAxis, CoordinateModule, NumberModule};
    use crate::procedural::Module;

    #[test]
    fn uniform_splits_energy() {
        let tex = UniformTexture {
            transparency: 0.5,
            specularity: 0.5,
            shininess: 1.0,
            ..UniformTexture::default()
        };
        let spec = tex.texture_spec(&mut TextureWorkers::new(), &PointInfo::default());
        assert_eq!(spec.diffuse, RGBColor::gray(0.25));
        assert_eq!(spec.specular, RGBColor::gray(0.25));
        assert_eq!(spec.hilight, RGBColor::gray(0.5));
        assert_eq!(spec.transparent, RGBColor::gray(0.5));
        assert!(tex.has_component(TextureComponent::Transparent));
        assert!(!tex.has_bump());
    }

    #[test]
    fn unwired_procedural_texture_is_white_diffuse() {
        let tex = ProceduralTexture::new();
        let mut workers = TextureWorkers::new();
        let spec = tex.texture_spec(&mut workers, &PointInfo::at(1.0, 2.0, 3.0));
        assert_eq!(spec.diffuse, RGBColor::WHITE);
        assert_eq!(spec.transparent, RGBColor::BLACK);
        assert_eq!(spec.bump_grad, Vec3::ZERO);
        assert_eq!(workers.len(), 1);
    }

    #[test]
    fn transparency_is_clamped() {
        let mut tex = ProceduralTexture::new();
        let pr = tex.procedure_mut();
        let n = pr.add_module(Module::new(NumberModule { value: 3.0 }));
        pr.connect_output(n, 0, ProceduralTexture::TRANSPARENCY).unwrap();
        let mut workers = TextureWorkers::new();
        let spec = tex.texture_spec(&mut workers, &PointInfo::default());
        assert_eq!(spec.diffuse, RGBColor::BLACK);
        assert_eq!(spec.transparent, RGBColor::WHITE);
        assert_eq!(tex.transparency(&mut workers, &PointInfo::default()), RGBColor::WHITE);
        assert!(tex.has_component(TextureComponent::Transparent));
    }

    #[test]
    fn bump_gradient_is_scaled() {
        let mut tex = ProceduralTexture::new();
        let pr = tex.procedure_mut();
        let x = pr.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
        pr.connect_output(x, 0, ProceduralTexture::BUMP_HEIGHT).unwrap();
        assert!(tex.has_bump());
        let spec = tex.texture_spec(&mut TextureWorkers::new(), &PointInfo::at(0.5, 0.0, 0.0));
        assert!((spec.bump_grad.x - 0.04).abs() < 1e-12);
        assert_eq!(spec.bump_grad.y, 0.0);
    }

    #[test]
    fn wrong_output_shape_is_rejected() {
        let p = Procedure::new(vec![OutputModule::number("only", 0.0)]);
        assert!(matches!(
            ProceduralTexture::from_procedure(p),
            Err(ProcError::OutputShapeMismatch { expected: 11, found: 1 })
        ));
    }
}
