//! # Searchpipe
//!
//! Aggregates results from multiple independent search providers, merges
//! them under a result budget and refines the merged set through a chain of
//! post-processors.
//!
//! Searchpipe provides:
//!
//! - **Immutable composition**: a [`PipelineContext`](pipeline::PipelineContext)
//!   is built by operators that each return a new context
//! - **Concurrent fan-out**: every searcher runs as its own task and the merge
//!   keeps registration order
//! - **Result budgets**: a global ceiling split across searchers
//! - **Sequential post-processing**: dedup, reorder, fuzzy filtering,
//!   metadata enrichment and query refinement
//! - **Events**: observers watch a run without coupling to it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use searchpipe::prelude::*;
//!
//! let context = PipelineContext::default_pipeline()
//!     .with(MySearcher::new())?
//!     .with_listener(|event| println!("{}", event.event_type()));
//!
//! let records = context.run("rust async runtime").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod services;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{EventKind, PipelineEvent, ResultRecord};
    pub use crate::errors::{ErrorInfo, PipelineError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::http::{FetchResult, Fetcher};
    pub use crate::pipeline::{
        ConfigMode, FailureMode, PipelineContext, RunReport, Settings,
    };
    pub use crate::processors::{Dedup, Fuzzy, Refine, Reorder};
    pub use crate::registry::{service_registry, ServiceRegistry, ServiceSettings};
    pub use crate::services::{
        PostProcessor, ProcessOutcome, RunState, RuntimeBudget, Searcher, Service, ServiceRole,
    };
}

/// Version of the searchpipe crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
