// math/mod.rs — small numeric types shared by the graph and the raytracer

pub mod color;
pub mod dual;
pub mod interval;
pub mod mat4;
pub mod vec3;

pub use color::RGBColor;
pub use dual::Dual3;
pub use interval::Interval;
pub use mat4::Mat4;
pub use vec3::Vec3;
