//! Page metadata enrichment.

use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::registry::ServiceRegistry;
use crate::services::{PostProcessor, ProcessOutcome, RunState, Service};
use async_trait::async_trait;
use futures::future::join_all;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// Settings for [`Metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Also replace empty record descriptions with the page's meta description.
    pub fill_descriptions: bool,
    /// Raise `ResultProcessed` for every emitted record.
    pub publish_events: bool,
}

/// Title and description read from a page's `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    /// Contents of `<title>`.
    pub title: String,
    /// Contents of `<meta name="description">`.
    pub description: String,
}

impl PageMetadata {
    /// Extracts metadata from an HTML document.
    #[must_use]
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        Self {
            title: select_text(&document, "title"),
            description: select_attr(&document, r#"meta[name="description"]"#, "content"),
        }
    }
}

fn select_text(document: &Html, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_owned()
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
        .trim()
        .to_owned()
}

/// Fetches every record's page through the run's fetcher and attaches the
/// page title and description as the record's data.
///
/// Records whose page cannot be fetched, or is not HTML, are kept unchanged.
#[derive(Debug, Default)]
pub struct Metadata {
    settings: MetadataSettings,
}

impl Metadata {
    /// Registry name.
    pub const NAME: &'static str = "metadata";

    /// Creates a metadata processor.
    #[must_use]
    pub fn new(settings: MetadataSettings) -> Self {
        Self { settings }
    }

    fn enrich(&self, record: &ResultRecord, metadata: &PageMetadata) -> ResultRecord {
        let mut enriched = record.with_data(serde_json::json!({
            "title": metadata.title,
            "description": metadata.description,
        }));
        if self.settings.fill_descriptions
            && enriched.description().is_empty()
            && !metadata.description.is_empty()
        {
            enriched = enriched.with_description(&metadata.description);
        }
        enriched
    }
}

#[async_trait]
impl PostProcessor for Metadata {
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        let fetcher = run.fetcher().ok_or_else(|| {
            PipelineError::processor(Self::NAME, "no fetcher configured on the pipeline")
        })?;

        let timeout = run.request_timeout();
        let fetches = records.iter().map(|r| fetcher.fetch(r.url(), timeout));
        let pages = join_all(fetches).await;

        let enriched = records
            .iter()
            .zip(pages)
            .map(|(record, page)| match page {
                Ok(page) if page.is_success() && page.is_html() => {
                    self.enrich(record, &PageMetadata::from_html(&page.text))
                }
                Ok(page) => {
                    tracing::debug!(url = record.url(), status = page.status_code, "Skipping non-HTML page");
                    record.clone()
                }
                Err(error) => {
                    tracing::debug!(url = record.url(), error = %error, "Metadata fetch failed");
                    record.clone()
                }
            })
            .collect::<Vec<_>>();
        Ok(enriched.into())
    }
}

impl Service for Metadata {
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

/// Registers [`Metadata`] under [`Metadata::NAME`].
pub fn register(registry: &ServiceRegistry) {
    registry.register(Metadata::NAME, Metadata::new);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FetchResult, Fetcher, MockFetcher};
    use std::sync::Arc;

    const PAGE: &str = r#"<html><head>
        <title> Tokio </title>
        <meta name="description" content="An async runtime">
        </head><body></body></html>"#;

    fn html(url: &str) -> FetchResult {
        FetchResult {
            status_code: 200,
            final_url: url.to_string(),
            content_type: Some("text/html".to_string()),
            text: PAGE.to_string(),
            duration_ms: 1.0,
        }
    }

    #[test]
    fn test_page_metadata() {
        let metadata = PageMetadata::from_html(PAGE);
        assert_eq!(metadata.title, "Tokio");
        assert_eq!(metadata.description, "An async runtime");
        assert_eq!(PageMetadata::from_html("<p>bare</p>"), PageMetadata::default());
    }

    #[tokio::test]
    async fn test_enriches_and_keeps_failures() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|url, _| {
            if url.contains("down") {
                Err(PipelineError::http(url, "connection refused"))
            } else {
                Ok(html(url))
            }
        });
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
        let run = RunState::detached(Metadata::NAME, "rust").with_fetcher(fetcher);

        let records = vec![
            ResultRecord::new("a", 0, "https://up.example/").unwrap(),
            ResultRecord::new("a", 1, "https://down.example/").unwrap(),
        ];
        let processor = Metadata::new(MetadataSettings {
            fill_descriptions: true,
            ..MetadataSettings::default()
        });
        let output = processor.process(records, &run).await.unwrap().into_records();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].data().unwrap()["title"], "Tokio");
        assert_eq!(output[0].description(), "An async runtime");
        assert!(output[1].data().is_none());
    }

    #[tokio::test]
    async fn test_requires_fetcher() {
        let run = RunState::detached(Metadata::NAME, "rust");
        let err = Metadata::default().process(Vec::new(), &run).await.unwrap_err();
        assert!(matches!(err, PipelineError::Processor { .. }));
    }
}
