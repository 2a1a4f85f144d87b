//! Pipeline event type raised by the engine and by individual services.

use super::ResultRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A run started.
    SearchBegin {
        /// The run's query.
        query: String,
    },
    /// A run finished successfully.
    SearchEnd {
        /// Number of records returned.
        result_count: usize,
        /// Wall-clock duration of the run.
        duration_ms: f64,
    },
    /// A service was bound to the run.
    ServiceLoad {
        /// The service name.
        service: String,
        /// The service's share of the result budget, if bounded.
        budget: Option<usize>,
    },
    /// A searcher produced a record.
    ResultCreated {
        /// The produced record.
        record: ResultRecord,
    },
    /// A post-processor emitted a record.
    ResultProcessed {
        /// The post-processor name.
        service: String,
        /// The emitted record.
        record: ResultRecord,
    },
}

/// An event emitted during a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// The run that raised the event.
    pub run_id: Uuid,
    /// Nesting depth of the run (0 for top-level runs).
    pub depth: usize,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl PipelineEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(run_id: Uuid, depth: usize, kind: EventKind) -> Self {
        Self {
            run_id,
            depth,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Returns the dotted event type (e.g., "search.begin").
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            EventKind::SearchBegin { .. } => "search.begin",
            EventKind::SearchEnd { .. } => "search.end",
            EventKind::ServiceLoad { .. } => "service.load",
            EventKind::ResultCreated { .. } => "result.created",
            EventKind::ResultProcessed { .. } => "result.processed",
        }
    }

    /// Returns the record carried by this event, if any.
    #[must_use]
    pub fn record(&self) -> Option<&ResultRecord> {
        match &self.kind {
            EventKind::ResultCreated { record } | EventKind::ResultProcessed { record, .. } => {
                Some(record)
            }
            _ => None,
        }
    }

    /// Converts the event to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.event_type()));
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("depth".to_string(), serde_json::json!(self.depth));
        map.insert(
            "timestamp".to_string(),
            serde_json::json!(self.timestamp.to_rfc3339()),
        );
        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&self.kind) {
            for (key, value) in fields {
                if key != "kind" {
                    map.insert(key, value);
                }
            }
        }
        map
    }
}
