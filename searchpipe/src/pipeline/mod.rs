//! Pipeline composition and execution.
//!
//! This module provides:
//! - The immutable, composable [`PipelineContext`]
//! - Pipeline [`Settings`] with replace/merge semantics
//! - Result-budget partitioning across searchers
//! - The run engine (bind, fan out, merge, post-process)

mod budget;
mod context;
pub(crate) mod engine;
mod settings;


pub use budget::partition_budget;
pub use context::{PipelineContext, ServiceEntry, DEFAULT_MAXIMUM_RESULTS};
pub use engine::{RunReport, RunSummary, ServiceFailure};
pub use settings::{ConfigMode, FailureMode, Settings, DEFAULT_MAX_RECURSION_DEPTH};
