//! Core value types for searchpipe.
//!
//! This module contains the types threaded through every run:
//! - The immutable result record
//! - Pipeline events raised while a run progresses

mod event;
mod record;

pub use event::{EventKind, PipelineEvent};
pub use record::ResultRecord;
