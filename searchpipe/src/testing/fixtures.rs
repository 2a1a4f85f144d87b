//! Test fixtures for building records and contexts.

use std::sync::Arc;

use super::mocks::StaticSearcher;
use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::events::CollectingEventSink;
use crate::pipeline::PipelineContext;

/// Returns the URL a fake searcher uses for its `index`-th result.
#[must_use]
pub fn sample_url(originator: &str, index: usize) -> String {
    format!("https://{originator}.example.com/result/{index}")
}

/// Builds `count` records for `originator`, indexed from zero.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidRecord`] if `originator` is empty.
pub fn sample_records(originator: &str, count: usize) -> Result<Vec<ResultRecord>, PipelineError> {
    (0..count)
        .map(|index| ResultRecord::new(originator, index, sample_url(originator, index)))
        .collect()
}

/// Builds a context with one [`StaticSearcher`] per `(name, count)` pair.
///
/// # Errors
///
/// Propagates composition errors.
pub fn searcher_context(searchers: &[(&str, usize)]) -> Result<PipelineContext, PipelineError> {
    searchers
        .iter()
        .try_fold(PipelineContext::new(), |context, (name, count)| {
            context.with(StaticSearcher::with_count(*name, *count))
        })
}

/// Attaches a collecting sink to `context`.
#[must_use]
pub fn with_collector(context: &PipelineContext) -> (PipelineContext, Arc<CollectingEventSink>) {
    let sink = Arc::new(CollectingEventSink::new());
    let context = context.with_observer(sink.clone());
    (context, sink)
}
