pub mod camera;
pub mod gpu_context;
pub mod mesh_pipeline;
pub mod scene_renderer;
pub mod vertex;

pub use camera::{Camera3D, CameraUniform};
pub use gpu_context::GpuContext;
pub use mesh_pipeline::MeshPipeline;
pub use scene_renderer::{SceneMeshes, SceneRenderer};
pub use vertex::MeshVertex;
