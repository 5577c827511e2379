//! Configuration loading for pipeline tunables, following the same
//! file-then-env-then-default precedence the graph connection layer uses.

pub mod pipeline;

pub use pipeline::{load_pipeline_config, PipelineConfig};
