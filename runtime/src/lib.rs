//! # orderstream runtime
//!
//! The moving parts of the service:
//!
//! - [`IngestionPipeline`]: consume → decode → validate → persist → cache,
//!   one message at a time, until shutdown
//! - [`metrics`]: Prometheus exporter and the counters the pipeline records

pub mod metrics;
pub mod pipeline;

pub use pipeline::{IngestionPipeline, Outcome, PipelineState, PipelineStats};
