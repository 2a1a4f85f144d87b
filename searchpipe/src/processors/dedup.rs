//! Duplicate removal by canonical URL.

use super::url_normalize::normalize_url;
use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::registry::ServiceRegistry;
use crate::services::{PostProcessor, ProcessOutcome, RunState, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Settings for [`Dedup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Raise `ResultProcessed` for every kept record.
    pub publish_events: bool,
}

/// Drops every record whose canonical URL was already seen.
///
/// The first occurrence wins and the relative order of the kept records is
/// unchanged.
#[derive(Debug, Default)]
pub struct Dedup {
    settings: DedupSettings,
}

impl Dedup {
    /// Registry name.
    pub const NAME: &'static str = "dedup";

    /// Creates a dedup processor.
    #[must_use]
    pub fn new(settings: DedupSettings) -> Self {
        Self { settings }
    }

    /// The processor's settings.
    #[must_use]
    pub fn settings(&self) -> &DedupSettings {
        &self.settings
    }
}

#[async_trait]
impl PostProcessor for Dedup {
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        _run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        let mut seen = HashSet::with_capacity(records.len());
        let kept: Vec<ResultRecord> = records
            .into_iter()
            .filter(|record| seen.insert(normalize_url(record.url())))
            .collect();
        Ok(kept.into())
    }
}

impl Service for Dedup {
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

/// Registers [`Dedup`] under [`Dedup::NAME`].
pub fn register(registry: &ServiceRegistry) {
    registry.register(Dedup::NAME, Dedup::new);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_urls, sample_records};

    #[tokio::test]
    async fn test_one_repeat_among_k_leaves_k_minus_one() {
        let mut records = sample_records("alpha", 4).unwrap();
        records.push(ResultRecord::new("beta", 0, "https://ALPHA.example.com/result/2/").unwrap());
        let k = records.len();

        let run = RunState::detached(Dedup::NAME, "rust");
        let output = Dedup::default().process(records, &run).await.unwrap().into_records();

        assert_eq!(output.len(), k - 1);
        assert!(output.iter().all(|r| r.originator() == "alpha"));
    }

    #[tokio::test]
    async fn test_first_occurrence_wins() {
        let records = vec![
            ResultRecord::new("a", 0, "https://x.example/page?utm_source=a").unwrap(),
            ResultRecord::new("b", 0, "https://y.example/").unwrap(),
            ResultRecord::new("b", 1, "https://x.example/page").unwrap(),
        ];
        let run = RunState::detached(Dedup::NAME, "rust");
        let output = Dedup::default().process(records, &run).await.unwrap().into_records();

        assert_urls(&output, &["https://x.example/page?utm_source=a", "https://y.example/"]);
    }

    #[test]
    fn test_registration() {
        let registry = ServiceRegistry::new();
        register(&registry);
        let service = registry.create("DEDUP", None).unwrap();
        assert!(service.is::<Dedup>());
        assert!(!service.publishes_events());
    }
}
