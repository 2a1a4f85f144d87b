//! Testing utilities for searchpipe pipelines.
//!
//! This module provides:
//! - Fake searchers and processors
//! - Record and context fixtures
//! - Assertions over record sequences

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_index_order, assert_originator_blocks, assert_unique_urls, assert_urls,
};
pub use fixtures::{sample_records, sample_url, searcher_context, with_collector};
pub use mocks::{
    FailingSearcher, FnProcessor, ProcessCall, RecordingProcessor, SearchCall, SlowSearcher,
    StaticSearcher,
};
