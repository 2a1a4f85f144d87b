//! Run execution: bind, fan out, merge, post-process.

use super::budget::partition_budget;
use super::context::PipelineContext;
use super::settings::FailureMode;
use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::events::EventBus;
use crate::observability::SpanTimer;
use crate::services::{ProcessOutcome, RunState, RuntimeBudget, Service};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A searcher failure isolated by [`FailureMode::BestEffort`].
#[derive(Debug, Clone)]
pub struct ServiceFailure {
    /// The failing searcher.
    pub service: String,
    /// The error it failed with.
    pub error: PipelineError,
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The run's identifier.
    pub run_id: Uuid,
    /// The query that was run.
    pub query: String,
    /// Nesting depth of the run.
    pub depth: usize,
    /// The final record sequence.
    pub records: Vec<ResultRecord>,
    /// Records each searcher contributed after budgeting, in registration order.
    pub searcher_counts: Vec<(String, usize)>,
    /// Searchers that failed in best-effort mode.
    pub failures: Vec<ServiceFailure>,
    /// Wall-clock duration of the run.
    pub duration_ms: f64,
}

impl RunReport {
    /// Returns true if no searcher failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns a JSON-friendly summary without the records.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            depth: self.depth,
            result_count: self.records.len(),
            searcher_counts: self.searcher_counts.clone(),
            failed_services: self.failures.iter().map(|f| f.service.clone()).collect(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Serializable summary of a [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// The run's identifier.
    pub run_id: Uuid,
    /// Nesting depth of the run.
    pub depth: usize,
    /// Number of records returned.
    pub result_count: usize,
    /// Records each searcher contributed.
    pub searcher_counts: Vec<(String, usize)>,
    /// Searchers that failed in best-effort mode.
    pub failed_services: Vec<String>,
    /// Wall-clock duration of the run.
    pub duration_ms: f64,
}

/// Runs `context` for `query` at nesting `depth`.
///
/// The caller's context is never modified: services are bound on a working
/// copy that lives only as long as this call.
pub(crate) fn execute<'a>(
    context: &'a PipelineContext,
    query: &'a str,
    depth: usize,
) -> BoxFuture<'a, Result<RunReport, PipelineError>> {
    async move {
        if query.trim().is_empty() {
            return Err(PipelineError::invalid_query("query must not be empty"));
        }

        let timer = SpanTimer::start("pipeline.run");
        let settings = context.settings().clone();
        let run_id = Uuid::new_v4();
        let bus = Arc::new(EventBus::new(
            run_id,
            depth,
            settings.events_enabled(),
            context.observers().to_vec(),
        ));

        info!(
            %run_id,
            depth,
            query_len = query.len(),
            services = context.len(),
            "Starting search run"
        );
        bus.search_begin(query);

        // Bind
        let mut shares = partition_budget(settings.maximum_results, context.searcher_count()).into_iter();
        let budgets: Vec<Option<usize>> = context
            .entries()
            .iter()
            .map(|entry| {
                if entry.service().as_searcher().is_some() {
                    shares.next().flatten()
                } else {
                    None
                }
            })
            .collect();

        let working = context.bind(query, |position, entry, back_reference| {
            RunState::new(
                run_id,
                depth,
                entry.name(),
                RuntimeBudget::new(query, budgets[position]),
                back_reference,
                Arc::clone(&bus),
                context.fetcher().cloned(),
                settings.request_timeout(),
                settings.recursion_limit(),
            )
        });
        for (entry, budget) in working.entries().iter().zip(&budgets) {
            bus.service_load(entry.name(), *budget);
        }

        // Fan out
        let mut tasks = SearcherTasks::default();
        for entry in working.entries() {
            if entry.service().as_searcher().is_none() {
                continue;
            }
            let Some(run) = entry.binding() else {
                continue;
            };
            tasks.spawn(
                entry.name(),
                run_searcher(Arc::clone(entry.service()), Arc::clone(run), settings.budget_enforced()),
            );
        }
        let (names, outcomes) = tasks.join().await;

        // Merge
        let mut merged = Vec::new();
        let mut searcher_counts = Vec::with_capacity(names.len());
        let mut failures = Vec::new();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            let result = outcome
                .map_err(|e| PipelineError::Task(format!("searcher '{name}': {e}")))
                .and_then(|records| records);
            match result {
                Ok(records) => {
                    searcher_counts.push((name, records.len()));
                    merged.extend(records);
                }
                Err(error) if settings.failure_mode() == FailureMode::BestEffort => {
                    warn!(%run_id, service = %name, error = %error, "Searcher failed, continuing without it");
                    searcher_counts.push((name.clone(), 0));
                    failures.push(ServiceFailure {
                        service: name,
                        error,
                    });
                }
                Err(error) => {
                    debug!(%run_id, service = %name, error = %error, "Searcher failed, aborting run");
                    return Err(error);
                }
            }
        }
        if settings.budget_enforced() {
            if let Some(maximum) = settings.maximum_results {
                merged.truncate(maximum);
            }
        }
        debug!(%run_id, merged = merged.len(), "Merged searcher output");

        // Post-process
        let mut records = merged;
        for entry in working.entries() {
            let (Some(processor), Some(run)) = (entry.service().as_post_processor(), entry.binding())
            else {
                continue;
            };

            let stage_timer = SpanTimer::start(entry.name());
            let input_len = records.len();
            match processor.process(records, run).await? {
                ProcessOutcome::Records(output) => {
                    if entry.service().publishes_events() {
                        for record in &output {
                            bus.result_processed(entry.name(), record);
                        }
                    }
                    debug!(
                        %run_id,
                        service = entry.name(),
                        input = input_len,
                        output = output.len(),
                        duration_ms = stage_timer.finish(),
                        "Processor finished"
                    );
                    records = output;
                }
                ProcessOutcome::Superseded(output) => {
                    debug!(
                        %run_id,
                        service = entry.name(),
                        input = input_len,
                        output = output.len(),
                        duration_ms = stage_timer.finish(),
                        "Processor superseded the run output"
                    );
                    records = output;
                }
            }
        }

        let duration_ms = timer.finish();
        bus.search_end(records.len(), duration_ms);
        info!(
            %run_id,
            depth,
            results = records.len(),
            failures = failures.len(),
            duration_ms,
            "Search run finished"
        );
        drop(working);

        Ok(RunReport {
            run_id,
            query: query.to_string(),
            depth,
            records,
            searcher_counts,
            failures,
            duration_ms,
        })
    }
    .boxed()
}

type SearcherOutput = Result<Vec<ResultRecord>, PipelineError>;

/// The searcher tasks of one run, in registration order.
///
/// Dropping the group aborts every task still running, so a run whose
/// future is dropped stops its searchers and raises no further events.
#[derive(Default)]
struct SearcherTasks {
    names: Vec<String>,
    handles: Vec<JoinHandle<SearcherOutput>>,
}

impl SearcherTasks {
    fn spawn<F>(&mut self, name: &str, task: F)
    where
        F: Future<Output = SearcherOutput> + Send + 'static,
    {
        self.names.push(name.to_string());
        self.handles.push(tokio::spawn(task));
    }

    /// Waits for every task. Outcomes are returned in spawn order.
    async fn join(mut self) -> (Vec<String>, Vec<Result<SearcherOutput, JoinError>>) {
        let outcomes = join_all(self.handles.iter_mut()).await;
        (std::mem::take(&mut self.names), outcomes)
    }
}

impl Drop for SearcherTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn run_searcher(
    service: Arc<dyn Service>,
    run: Arc<RunState>,
    enforce_budget: bool,
) -> Result<Vec<ResultRecord>, PipelineError> {
    let Some(searcher) = service.as_searcher() else {
        return Ok(Vec::new());
    };

    let timer = SpanTimer::start(run.service_name());
    let mut records = searcher.search(run.query(), &run).await?;
    let produced = records.len();
    if let (true, Some(budget)) = (enforce_budget, run.max_results()) {
        records.truncate(budget);
    }
    for record in &records {
        run.events().result_created(record);
    }

    debug!(
        run_id = %run.run_id(),
        service = run.service_name(),
        produced,
        kept = records.len(),
        duration_ms = timer.finish(),
        "Searcher finished"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ConfigMode, Settings};
    use crate::testing::{searcher_context, FailingSearcher, StaticSearcher};

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let context = searcher_context(&[("alpha", 1)]).unwrap();
        for query in ["", "   "] {
            let err = execute(&context, query, 0).await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidQuery { .. }));
        }
    }

    #[tokio::test]
    async fn test_query_reaches_searchers_unchanged() {
        let alpha = Arc::new(StaticSearcher::with_count("alpha", 1));
        let context = PipelineContext::new().with_shared(alpha.clone()).unwrap();

        let report = execute(&context, "  rust async ", 0).await.unwrap();

        assert_eq!(alpha.calls()[0].query, "  rust async ");
        assert_eq!(report.query, "  rust async ");
    }

    #[tokio::test]
    async fn test_report_counts() {
        let context = searcher_context(&[("alpha", 3), ("beta", 2)]).unwrap();
        let report = execute(&context, "rust", 0).await.unwrap();

        assert_eq!(report.records.len(), 5);
        assert_eq!(
            report.searcher_counts,
            vec![("alpha".to_string(), 3), ("beta".to_string(), 2)]
        );
        assert!(report.is_complete());
        assert_eq!(report.query, "rust");
        assert_eq!(report.summary().result_count, 5);
    }

    #[tokio::test]
    async fn test_best_effort_records_failure() {
        let context = PipelineContext::new()
            .with(FailingSearcher::new("broken", "timed out"))
            .unwrap()
            .with(StaticSearcher::with_count("beta", 2))
            .unwrap()
            .with_configuration(
                Settings::new().with_failure_mode(FailureMode::BestEffort),
                ConfigMode::Merge,
            )
            .unwrap();

        let report = execute(&context, "rust", 0).await.unwrap();
        assert_eq!(report.records.len(), 2);
        assert!(!report.is_complete());
        assert_eq!(report.failures[0].service, "broken");
        assert_eq!(report.summary().failed_services, vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn test_unenforced_budget_is_advisory() {
        let alpha = Arc::new(StaticSearcher::with_count("alpha", 3));
        let context = PipelineContext::new()
            .with_shared(alpha.clone())
            .unwrap()
            .with(StaticSearcher::with_count("beta", 3))
            .unwrap()
            .with_configuration(
                Settings::new().with_maximum_results(4).with_enforce_budget(false),
                ConfigMode::Replace,
            )
            .unwrap();

        let report = execute(&context, "rust", 0).await.unwrap();
        assert_eq!(report.records.len(), 6);
        assert_eq!(alpha.calls()[0].budget, Some(2));
    }
}
