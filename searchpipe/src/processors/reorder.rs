//! Round-robin interleaving of searcher outputs.

use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::registry::ServiceRegistry;
use crate::services::{PostProcessor, ProcessOutcome, RunState, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Settings for [`Reorder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderSettings {
    /// Raise `ResultProcessed` for every emitted record.
    pub publish_events: bool,
}

/// Interleaves producers by their local rank.
///
/// Records are ordered by `index`; records sharing an index keep the order in
/// which their originators first appear in the input. The result is every
/// searcher's top hit, then every second hit, and so on.
#[derive(Debug, Default)]
pub struct Reorder {
    settings: ReorderSettings,
}

impl Reorder {
    /// Registry name.
    pub const NAME: &'static str = "reorder";

    /// Creates a reorder processor.
    #[must_use]
    pub fn new(settings: ReorderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PostProcessor for Reorder {
    async fn process(
        &self,
        mut records: Vec<ResultRecord>,
        _run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        let mut rank: HashMap<String, usize> = HashMap::new();
        for record in &records {
            let next = rank.len();
            rank.entry(record.originator().to_string()).or_insert(next);
        }

        records.sort_by_key(|r| (r.index(), rank.get(r.originator()).copied().unwrap_or(usize::MAX)));
        Ok(records.into())
    }
}

impl Service for Reorder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_post_processor(&self) -> Option<&dyn PostProcessor> {
        Some(self)
    }

    fn publishes_events(&self) -> bool {
        self.settings.publish_events
    }
}

/// Registers [`Reorder`] under [`Reorder::NAME`].
pub fn register(registry: &ServiceRegistry) {
    registry.register(Reorder::NAME, Reorder::new);
}
