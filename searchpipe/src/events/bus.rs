//! Per-run event relay.

use super::EventSink;
use crate::core::{EventKind, PipelineEvent, ResultRecord};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Fans pipeline events out to the observers registered on a context.
///
/// A bus is created at the start of each run with a snapshot of the
/// context's observers and dropped when the run ends. When events are
/// disabled in the run's settings every publish is a no-op.
pub struct EventBus {
    run_id: Uuid,
    depth: usize,
    enabled: bool,
    observers: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    /// Creates a bus for one run.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        depth: usize,
        enabled: bool,
        observers: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            run_id,
            depth,
            enabled,
            observers,
        }
    }

    /// Creates a bus that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Uuid::nil(), 0, false, Vec::new())
    }

    /// Returns the run this bus belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns true if events are delivered.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the number of observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Delivers an event to every observer.
    pub fn publish(&self, kind: EventKind) {
        if !self.enabled || self.observers.is_empty() {
            return;
        }
        let event = PipelineEvent::new(self.run_id, self.depth, kind);
        for observer in &self.observers {
            observer.try_emit(&event);
        }
    }

    /// Raises `SearchBegin`.
    pub fn search_begin(&self, query: &str) {
        self.publish(EventKind::SearchBegin {
            query: query.to_string(),
        });
    }

    /// Raises `SearchEnd`.
    pub fn search_end(&self, result_count: usize, duration_ms: f64) {
        self.publish(EventKind::SearchEnd {
            result_count,
            duration_ms,
        });
    }

    /// Raises `ServiceLoad`.
    pub fn service_load(&self, service: &str, budget: Option<usize>) {
        self.publish(EventKind::ServiceLoad {
            service: service.to_string(),
            budget,
        });
    }

    /// Raises `ResultCreated`.
    pub fn result_created(&self, record: &ResultRecord) {
        self.publish(EventKind::ResultCreated {
            record: record.clone(),
        });
    }

    /// Raises `ResultProcessed`.
    pub fn result_processed(&self, service: &str, record: &ResultRecord) {
        self.publish(EventKind::ResultProcessed {
            service: service.to_string(),
            record: record.clone(),
        });
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("run_id", &self.run_id)
            .field("depth", &self.depth)
            .field("enabled", &self.enabled)
            .field("observer_count", &self.observers.len())
            .finish()
    }
}
