// lib.rs — procedural evaluation graph + raytracer spatial core
//
// `procedural` holds the typed module graph that computes numbers, colors and
// gradients at a 3D point. `raytracer` holds the octree, primitive
// intersection and per-worker scratch state that locate those points.

pub mod config;
pub mod error;
pub mod math;
pub mod procedural;
pub mod raytracer;

pub use config::{OctreeConfig, RenderConfig};
pub use error::{ProcError, Result};
