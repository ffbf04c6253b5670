// procedural/mod.rs — typed module graphs evaluated at a point
//
// A `Procedure` owns modules, links and a fixed list of output modules.
// Renderers call `init_for_point` then pull outputs; every module output is
// memoized per point. Worker copies, previews and the preview cache build on
// top of that.

pub mod cache;
pub mod eval;
pub mod expr;
pub mod graph;
pub mod image;
pub mod link;
pub mod module;
pub mod modules;
pub mod noise;
pub mod point;
pub mod port;
pub mod preview;
pub mod procedure;
pub mod stream;
pub mod worker;

pub use cache::{hash_preview_request, PreviewCache};
pub use eval::Evaluator;
pub use graph::{Fields, GraphDescription, GraphEdge, GraphNode, Handle};
pub use image::{ImageLibrary, ImageMap, ImageSample};
pub use link::{Link, Sink, Source};
pub use module::{ColorSource, Module, ModuleId, ModuleKind, ModuleType, NumberSource, OutputModule};
pub use point::PointInfo;
pub use port::{NodeRef, Port, PortDefault, PortDirection, PortId, PortSide, ValueType};
pub use preview::{evaluate_preview, evaluate_preview_on, PreviewRequest, PreviewResult};
pub use procedure::{Procedure, TextureParameter, FORMAT_VERSION};
pub use worker::WorkerProcedures;
