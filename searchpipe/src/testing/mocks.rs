//! Fake searchers and processors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::fixtures::sample_url;
use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::services::{PostProcessor, ProcessOutcome, RunState, Searcher, Service};

/// What a fake searcher saw when it was called.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    /// The query passed to `search`.
    pub query: String,
    /// The searcher's budget for the run.
    pub budget: Option<usize>,
    /// Nesting depth of the run.
    pub depth: usize,
    /// Whether the run state resolved its back-reference.
    pub attached: bool,
}

/// A searcher that returns a fixed list of results.
#[derive(Debug)]
pub struct StaticSearcher {
    name: String,
    entries: Vec<(String, String)>,
    calls: Mutex<Vec<SearchCall>>,
}

impl StaticSearcher {
    /// Creates a searcher returning one record per `(url, description)` pair.
    #[must_use]
    pub fn new<U, D>(name: impl Into<String>, entries: impl IntoIterator<Item = (U, D)>) -> Self
    where
        U: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            entries: entries
                .into_iter()
                .map(|(url, description)| (url.into(), description.into()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a searcher returning `count` distinct records.
    #[must_use]
    pub fn with_count(name: impl Into<String>, count: usize) -> Self {
        let name = name.into();
        let entries: Vec<(String, String)> = (0..count)
            .map(|i| (sample_url(&name, i), format!("{name} result {i}")))
            .collect();
        Self::new(name, entries)
    }

    /// Creates a searcher returning one record per URL with empty descriptions.
    #[must_use]
    pub fn with_urls<U: Into<String>>(name: impl Into<String>, urls: impl IntoIterator<Item = U>) -> Self {
        Self::new(name, urls.into_iter().map(|url| (url, String::new())))
    }

    /// Number of records the searcher returns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the searcher returns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn build(&self, query: &str, run: &RunState) -> Result<Vec<ResultRecord>, PipelineError> {
        self.calls.lock().push(SearchCall {
            query: query.to_string(),
            budget: run.max_results(),
            depth: run.depth(),
            attached: run.is_attached(),
        });

        self.entries
            .iter()
            .enumerate()
            .map(|(index, (url, description))| {
                Ok(ResultRecord::new(&self.name, index, url)?.with_description(description))
            })
            .collect()
    }
}

#[async_trait]
impl Searcher for StaticSearcher {
    async fn search(&self, query: &str, run: &RunState) -> Result<Vec<ResultRecord>, PipelineError> {
        self.build(query, run)
    }
}

impl Service for StaticSearcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_searcher(&self) -> Option<&dyn Searcher> {
        Some(self)
    }
}

/// A searcher that always fails with a provider error.
#[derive(Debug)]
pub struct FailingSearcher {
    name: String,
    message: String,
}

impl FailingSearcher {
    /// Creates a new failing searcher.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Searcher for FailingSearcher {
    async fn search(&self, _query: &str, _run: &RunState) -> Result<Vec<ResultRecord>, PipelineError> {
        Err(PipelineError::provider(&self.name, &self.message))
    }
}

impl Service for FailingSearcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_searcher(&self) -> Option<&dyn Searcher> {
        Some(self)
    }
}

/// A searcher that waits before returning its results.
#[derive(Debug)]
pub struct SlowSearcher {
    inner: StaticSearcher,
    delay: Duration,
}

impl SlowSearcher {
    /// Creates a searcher returning `count` records after `delay`.
    #[must_use]
    pub fn new(name: impl Into<String>, count: usize, delay: Duration) -> Self {
        Self {
            inner: StaticSearcher::with_count(name, count),
            delay,
        }
    }

    /// Creates a slow searcher with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, count: usize, ms: u64) -> Self {
        Self::new(name, count, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Searcher for SlowSearcher {
    async fn search(&self, query: &str, run: &RunState) -> Result<Vec<ResultRecord>, PipelineError> {
        tokio::time::sleep(self.delay).await;
        self.inner.build(query, run)
    }
}

impl Service for SlowSearcher {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn as_searcher(&self) -> Option<&dyn Searcher> {
        Some(self)
    }
}

/// What a recording processor saw when it was called.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCall {
    /// The run that called the processor.
    pub run_id: Uuid,
    /// The run's query.
    pub query: String,
    /// Nesting depth of the run.
    pub depth: usize,
    /// URLs of the input records, in order.
    pub input: Vec<String>,
    /// Whether the run state resolved its back-reference.
    pub attached: bool,
}

/// A pass-through processor that records every call.
#[derive(Debug)]
pub struct RecordingProcessor {
    name: String,
    publishes: bool,
    calls: Mutex<Vec<ProcessCall>>,
}

impl RecordingProcessor {
    /// Creates a new recording processor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            publishes: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a recording processor that publishes `ResultProcessed` events.
    #[must_use]
    pub fn publishing(name: impl Into<String>) -> Self {
        Self {
            publishes: true,
            ..Self::new(name)
        }
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<ProcessCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PostProcessor for RecordingProcessor {
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        self.calls.lock().push(ProcessCall {
            run_id: run.run_id(),
            query: run.query().to_string(),
            depth: run.depth(),
            input: records.iter().map(|r| r.url().to_string()).collect(),
            attached: run.is_attached(),
        });
        Ok(records.into())
    }
}

impl Service for RecordingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_post_processor(&self) -> Option<&dyn PostProcessor> {
        Some(self)
    }

    fn publishes_events(&self) -> bool {
        self.publishes
    }
}

/// A processor backed by a closure.
pub struct FnProcessor<F>
where
    F: Fn(Vec<ResultRecord>) -> Result<Vec<ResultRecord>, PipelineError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(Vec<ResultRecord>) -> Result<Vec<ResultRecord>, PipelineError> + Send + Sync,
{
    /// Wraps `func` as a processor.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnProcessor<F>
where
    F: Fn(Vec<ResultRecord>) -> Result<Vec<ResultRecord>, PipelineError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> PostProcessor for FnProcessor<F>
where
    F: Fn(Vec<ResultRecord>) -> Result<Vec<ResultRecord>, PipelineError> + Send + Sync,
{
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        _run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        (self.func)(records).map(ProcessOutcome::Records)
    }
}

impl<F> Service for FnProcessor<F>
where
    F: Fn(Vec<ResultRecord>) -> Result<Vec<ResultRecord>, PipelineError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn as_post_processor(&self) -> Option<&dyn PostProcessor> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_searcher() {
        let searcher = StaticSearcher::with_count("alpha", 3);
        let run = RunState::detached("alpha", "rust").with_max_results(Some(2));

        let records = searcher.search("rust", &run).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].index(), 2);
        assert_eq!(records[0].originator(), "alpha");
        assert_eq!(records[1].description(), "alpha result 1");

        let calls = searcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].budget, Some(2));
        assert!(!calls[0].attached);
    }

    #[tokio::test]
    async fn test_failing_searcher() {
        let searcher = FailingSearcher::new("broken", "503");
        let run = RunState::detached("broken", "rust");
        let err = searcher.search("rust", &run).await.unwrap_err();
        assert!(matches!(err, PipelineError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_slow_searcher() {
        let searcher = SlowSearcher::with_delay_ms("slow", 2, 10);
        let run = RunState::detached("slow", "rust");
        let start = std::time::Instant::now();
        let records = searcher.search("rust", &run).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_recording_processor() {
        let processor = RecordingProcessor::publishing("rec");
        let run = RunState::detached("rec", "rust");
        let records = vec![ResultRecord::new("a", 0, "https://a.example/").unwrap()];

        let outcome = processor.process(records.clone(), &run).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Records(records));
        assert_eq!(processor.call_count(), 1);
        assert_eq!(processor.calls()[0].input, vec!["https://a.example/"]);
        assert!(processor.publishes_events());
    }

    #[tokio::test]
    async fn test_fn_processor() {
        let processor = FnProcessor::new("reverse", |mut records: Vec<ResultRecord>| {
            records.reverse();
            Ok(records)
        });
        let run = RunState::detached("reverse", "rust");
        let records = vec![
            ResultRecord::new("a", 0, "https://a.example/0").unwrap(),
            ResultRecord::new("a", 1, "https://a.example/1").unwrap(),
        ];

        let output = processor.process(records, &run).await.unwrap().into_records();
        assert_eq!(output[0].index(), 1);
    }
}
