//! Event sink trait and implementations.

use crate::core::PipelineEvent;
use std::fmt;
use tracing::{debug, info, trace, Level};

/// Trait for observers that receive pipeline events.
///
/// Sinks are registered on a [`PipelineContext`](crate::pipeline::PipelineContext)
/// and invoked from searcher tasks as well as the engine itself, so
/// implementations must be cheap and must never panic.
pub trait EventSink: Send + Sync {
    /// Delivers an event without blocking.
    fn try_emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        match self.level {
            Level::TRACE => {
                trace!(event_type, run_id = %event.run_id, depth = event.depth, kind = ?event.kind, "Event: {}", event_type);
            }
            Level::DEBUG => {
                debug!(event_type, run_id = %event.run_id, depth = event.depth, kind = ?event.kind, "Event: {}", event_type);
            }
            _ => {
                info!(event_type, run_id = %event.run_id, depth = event.depth, kind = ?event.kind, "Event: {}", event_type);
            }
        }
    }
}

/// Adapts a closure into an event sink.
pub struct FnEventSink<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    func: F,
}

impl<F> FnEventSink<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    /// Wraps `func` as a sink.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnEventSink<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEventSink").finish_non_exhaustive()
    }
}

impl<F> EventSink for FnEventSink<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn try_emit(&self, event: &PipelineEvent) {
        (self.func)(event);
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the dotted types of all collected events, in arrival order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(PipelineEvent::event_type).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn begin() -> PipelineEvent {
        PipelineEvent::new(
            Uuid::new_v4(),
            0,
            EventKind::SearchBegin {
                query: "q".to_string(),
            },
        )
    }

    fn end() -> PipelineEvent {
        PipelineEvent::new(
            Uuid::new_v4(),
            0,
            EventKind::SearchEnd {
                result_count: 0,
                duration_ms: 0.0,
            },
        )
    }

    #[test]
    fn test_noop_and_logging_sinks() {
        NoOpEventSink.try_emit(&begin());
        LoggingEventSink::default().try_emit(&begin());
        LoggingEventSink::debug().try_emit(&end());
    }

    #[test]
    fn test_fn_sink() {
        let count = AtomicUsize::new(0);
        let sink = FnEventSink::new(|_event: &PipelineEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        sink.try_emit(&begin());
        sink.try_emit(&end());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.try_emit(&begin());
        sink.try_emit(&end());

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["search.begin", "search.end"]);
        assert_eq!(sink.events_of_type("search.").len(), 2);
        assert!(sink.events_of_type("result.").is_empty());

        sink.clear();
        assert!(sink.is_empty());
    }
}
