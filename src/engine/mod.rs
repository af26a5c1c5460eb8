// * The Engine
// * Rendering, selector inference, pagination and the per-request pipeline

pub mod fallback;
pub mod fingerprint;
pub mod inference;
pub mod normalization;
pub mod pagination;
pub mod pipeline;
pub mod renderer;

// * Re-exports for convenient access
pub use inference::{SelectorInference, TextCompleter};
pub use pagination::{Affordance, PageState, PaginationController};
pub use pipeline::{ExtractionRequest, PipelineError, ReviewPipeline, ValidatedRequest};
pub use renderer::{AdvanceTarget, ChromiumRenderer, PageRenderer, RenderError};
