//! Transport handle supplied to services at bind time.
//!
//! A pipeline context may carry one [`Fetcher`]. The engine hands it to every
//! service's [`RunState`](crate::services::RunState) together with the
//! configured request timeout.

use crate::errors::PipelineError;
use async_trait::async_trait;
use std::time::Duration;

/// Result of a fetch operation.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// HTTP status code.
    pub status_code: u16,
    /// Final URL after redirects.
    pub final_url: String,
    /// Content type from headers.
    pub content_type: Option<String>,
    /// Response body as text.
    pub text: String,
    /// Time taken to fetch in milliseconds.
    pub duration_ms: f64,
}

impl FetchResult {
    /// Whether the response is HTML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
    }

    /// Whether the fetch was successful (2xx status).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Protocol for fetching pages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a URL, giving up after `timeout` if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] on transport failure or timeout.
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<FetchResult, PipelineError>;
}

#[cfg(feature = "http")]
pub use client::HttpFetcher;

#[cfg(feature = "http")]
mod client {
    use super::{FetchResult, Fetcher};
    use crate::errors::PipelineError;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    const USER_AGENT: &str = concat!("searchpipe/", env!("CARGO_PKG_VERSION"));

    /// A [`Fetcher`] backed by a shared [`reqwest::Client`].
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        /// Builds a fetcher with a default client.
        ///
        /// # Errors
        ///
        /// Returns [`PipelineError::Http`] if the client cannot be constructed.
        pub fn new() -> Result<Self, PipelineError> {
            let client = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .map_err(|e| PipelineError::http("", format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }

        /// Wraps an existing client.
        #[must_use]
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Fetcher for HttpFetcher {
        async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<FetchResult, PipelineError> {
            let start = Instant::now();
            let mut request = self.client.get(url);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PipelineError::http(url, e.to_string()))?;

            let status_code = response.status().as_u16();
            let final_url = response.url().to_string();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response
                .text()
                .await
                .map_err(|e| PipelineError::http(url, e.to_string()))?;

            tracing::debug!(url, status_code, bytes = text.len(), "Fetched page");

            Ok(FetchResult {
                status_code,
                final_url,
                content_type,
                text,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            })
        }
    }
}
