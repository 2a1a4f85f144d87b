//! Query refinement through nested runs.

use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::registry::ServiceRegistry;
use crate::services::{PostProcessor, ProcessOutcome, RunState, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Settings for [`Refine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineSettings {
    /// Terms appended to the query, one nested run per term.
    pub terms: Vec<String>,
    /// Refine only while the run's depth is below this.
    pub max_passes: usize,
    /// Raise `ResultProcessed` for every emitted record.
    pub publish_events: bool,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            max_passes: 1,
            publish_events: false,
        }
    }
}

impl RefineSettings {
    /// Creates settings refining with `terms`.
    #[must_use]
    pub fn with_terms<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Re-runs the whole pipeline with `"{query} {term}"` for every configured
/// term and supersedes its input with the concatenated results.
///
/// Nested runs see the same pipeline, this processor included, one level
/// deeper. Refinement stops once the depth reaches `max_passes`, and the
/// context's recursion limit bounds it regardless.
#[derive(Debug, Default)]
pub struct Refine {
    settings: RefineSettings,
}

impl Refine {
    /// Registry name.
    pub const NAME: &'static str = "refine";

    /// Creates a refine processor.
    #[must_use]
    pub fn new(settings: RefineSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PostProcessor for Refine {
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        if self.settings.terms.is_empty() || run.depth() >= self.settings.max_passes {
            return Ok(records.into());
        }

        let mut refined = Vec::new();
        for term in &self.settings.terms {
            let query = format!("{} {}", run.query(), term.trim());
            refined.extend(run.rerun(&query).await?);
        }
        tracing::debug!(
            run_id = %run.run_id(),
            depth = run.depth(),
            replaced = records.len(),
            refined = refined.len(),
            "Refined query results"
        );
        Ok(ProcessOutcome::Superseded(refined))
    }
}

impl Service for Refine {
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

/// Registers [`Refine`] under [`Refine::NAME`].
pub fn register(registry: &ServiceRegistry) {
    registry.register(Refine::NAME, Refine::new);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_records;

    #[tokio::test]
    async fn test_passes_through_without_terms() {
        let run = RunState::detached(Refine::NAME, "rust");
        let records = sample_records("alpha", 2).unwrap();
        let outcome = Refine::default().process(records.clone(), &run).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Records(records));
    }

    #[tokio::test]
    async fn test_detached_rerun_fails() {
        let run = RunState::detached(Refine::NAME, "rust");
        let refine = Refine::new(RefineSettings::with_terms(["async"]));
        let err = refine.process(Vec::new(), &run).await.unwrap_err();
        assert!(matches!(err, PipelineError::RecursionLimit { .. }));
    }

    #[test]
    fn test_settings() {
        let settings = RefineSettings::with_terms(["a", "b"]);
        assert_eq!(settings.terms, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(settings.max_passes, 1);
    }
}
