//! Per-run, per-service binding state.

use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::events::EventBus;
use crate::http::Fetcher;
use crate::pipeline::{engine, PipelineContext};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// A service's share of one run: the active query and its result ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeBudget {
    /// The query being run.
    pub query: String,
    /// Maximum records this service may contribute. `None` is unbounded.
    pub max_results: Option<usize>,
}

impl RuntimeBudget {
    /// Creates a new budget.
    #[must_use]
    pub fn new(query: impl Into<String>, max_results: Option<usize>) -> Self {
        Self {
            query: query.into(),
            max_results,
        }
    }

    /// Returns true if the budget has a ceiling.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.max_results.is_some()
    }
}

/// Everything a service sees of the run it is bound to.
///
/// The engine creates one `RunState` per service when a run starts and
/// attaches it only to that run's working copy of the context. The
/// back-reference to the working copy is weak, so it stops resolving once
/// the run has finished.
pub struct RunState {
    run_id: Uuid,
    depth: usize,
    service_name: String,
    budget: RuntimeBudget,
    context: Weak<PipelineContext>,
    bus: Arc<EventBus>,
    fetcher: Option<Arc<dyn Fetcher>>,
    request_timeout: Option<Duration>,
    recursion_limit: usize,
}

impl RunState {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: Uuid,
        depth: usize,
        service_name: impl Into<String>,
        budget: RuntimeBudget,
        context: Weak<PipelineContext>,
        bus: Arc<EventBus>,
        fetcher: Option<Arc<dyn Fetcher>>,
        request_timeout: Option<Duration>,
        recursion_limit: usize,
    ) -> Self {
        Self {
            run_id,
            depth,
            service_name: service_name.into(),
            budget,
            context,
            bus,
            fetcher,
            request_timeout,
            recursion_limit,
        }
    }

    /// Creates a state that is not attached to any run.
    ///
    /// Useful for exercising a service directly; [`RunState::rerun`] fails
    /// on a detached state.
    #[must_use]
    pub fn detached(service_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(
            Uuid::new_v4(),
            0,
            service_name,
            RuntimeBudget::new(query, None),
            Weak::new(),
            Arc::new(EventBus::disabled()),
            None,
            None,
            0,
        )
    }

    /// Attaches a transport handle.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[cfg(test)]
    pub(crate) fn attach(mut self, context: Weak<PipelineContext>) -> Self {
        self.context = context;
        self
    }

    /// Sets the result ceiling.
    #[must_use]
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.budget.max_results = max_results;
        self
    }

    /// The run's identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Nesting depth of the run (0 for top-level runs).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The name of the service this state is bound to.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The active query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.budget.query
    }

    /// The service's runtime budget.
    #[must_use]
    pub fn budget(&self) -> &RuntimeBudget {
        &self.budget
    }

    /// The service's result ceiling, if bounded.
    #[must_use]
    pub fn max_results(&self) -> Option<usize> {
        self.budget.max_results
    }

    /// The per-request timeout services should apply to network calls.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// The transport handle supplied by the context, if any.
    #[must_use]
    pub fn fetcher(&self) -> Option<&Arc<dyn Fetcher>> {
        self.fetcher.as_ref()
    }

    /// The run's event bus, for services that raise their own events.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Resolves the back-reference to the run's working context.
    ///
    /// Returns `None` once the run has ended.
    #[must_use]
    pub fn context(&self) -> Option<Arc<PipelineContext>> {
        self.context.upgrade()
    }

    /// Returns true while the owning run is alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.context.strong_count() > 0
    }

    /// Runs the whole pipeline again for `query`, one level deeper.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RecursionLimit`] when the nested run would
    /// exceed the configured depth, [`PipelineError::Processor`] when the
    /// owning run is gone, or any error the nested run fails with.
    pub fn rerun<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResultRecord>, PipelineError>> {
        async move {
            let next_depth = self.depth + 1;
            if next_depth > self.recursion_limit {
                return Err(PipelineError::RecursionLimit {
                    service: self.service_name.clone(),
                    depth: next_depth,
                    limit: self.recursion_limit,
                });
            }

            let context = self.context().ok_or_else(|| {
                PipelineError::processor(&self.service_name, "the owning run has already ended")
            })?;

            tracing::debug!(
                run_id = %self.run_id,
                service = %self.service_name,
                depth = next_depth,
                "Starting nested run"
            );

            let report = engine::execute(&context, query, next_depth).await?;
            Ok(report.records)
        }
        .boxed()
    }
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("run_id", &self.run_id)
            .field("depth", &self.depth)
            .field("service_name", &self.service_name)
            .field("budget", &self.budget)
            .field("attached", &self.is_attached())
            .field("has_fetcher", &self.fetcher.is_some())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_state() {
        let state = RunState::detached("dedup", "rust").with_max_results(Some(3));

        assert_eq!(state.query(), "rust");
        assert_eq!(state.service_name(), "dedup");
        assert_eq!(state.max_results(), Some(3));
        assert!(state.budget().is_bounded());
        assert!(!state.is_attached());
        assert!(state.context().is_none());
        assert!(state.fetcher().is_none());
        assert_eq!(state.depth(), 0);
    }

    #[tokio::test]
    async fn test_rerun_on_detached_state_fails() {
        let state = RunState::detached("refine", "rust");
        // A detached state has a recursion limit of zero.
        let err = state.rerun("rust lang").await.unwrap_err();
        assert!(matches!(err, PipelineError::RecursionLimit { depth: 1, limit: 0, .. }));
    }

    #[test]
    fn test_unbounded_budget() {
        let budget = RuntimeBudget::new("q", None);
        assert!(!budget.is_bounded());
    }
}
