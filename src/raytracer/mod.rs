// raytracer/mod.rs — locating surface points for procedural evaluation
//
// The octree and primitives are built once per render and shared read-only
// by every worker. Anything mutable during tracing (scratch arrays and
// procedure copies) lives in a worker-owned RenderWorkspace.

pub mod bounds;
pub mod object;
pub mod octree;
pub mod ray;
pub mod sampler;
pub mod texture;
pub mod workspace;

pub use bounds::BoundingBox;
pub use object::{RTObject, RTSphere, SurfaceIntersection};
pub use octree::{NodeId, Octree, OctreeNode, Traversal};
pub use ray::Ray;
pub use sampler::{SurfaceHit, SurfaceSampler};
pub use texture::{
    ProceduralTexture, TextureComponent, TextureId, TextureMapping, TextureSpec, TextureWorkers, UniformTexture,
};
pub use workspace::{MaterialIntersection, RenderWorkspace};
