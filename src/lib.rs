pub mod bake;
pub mod blob;
pub mod kernel;
pub mod math;
pub mod sampling;
pub mod scene;
pub mod shading;
pub mod texture;
pub mod traversal;

pub use kernel::{Film, RenderSettings, RenderSummary};
pub use scene::ModelResource;
