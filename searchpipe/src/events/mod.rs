//! Event notification for observers of a run.
//!
//! Observers implement [`EventSink`] and are registered on a
//! [`PipelineContext`](crate::pipeline::PipelineContext). Each run copies
//! them into its own [`EventBus`], which is torn down when the run ends.

mod bus;
mod sink;

pub use bus::EventBus;
pub use sink::{CollectingEventSink, EventSink, FnEventSink, LoggingEventSink, NoOpEventSink};
