pub mod constants;
pub mod settings;

pub use settings::{PipelineConfig, RenderConfig, ServiceConfig};
