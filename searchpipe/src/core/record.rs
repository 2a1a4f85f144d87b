//! The result record threaded through every stage of a run.

use crate::errors::PipelineError;
use serde::Serialize;

/// A single search result produced by a searcher.
///
/// Records are immutable once built. Processors that need to change a
/// record derive a new one with [`ResultRecord::with_description`] or
/// [`ResultRecord::with_data`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    originator: String,
    index: usize,
    url: String,
    description: String,
    data: Option<serde_json::Value>,
}

impl ResultRecord {
    /// Creates a new record.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRecord`] if `originator` or `url` is empty.
    pub fn new(
        originator: impl Into<String>,
        index: usize,
        url: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let originator = originator.into();
        let url = url.into();

        if originator.trim().is_empty() {
            return Err(PipelineError::InvalidRecord(
                "originator must not be empty".to_string(),
            ));
        }
        if url.trim().is_empty() {
            return Err(PipelineError::InvalidRecord(format!(
                "record {index} from '{originator}' has an empty url"
            )));
        }

        Ok(Self {
            originator,
            index,
            url,
            description: String::new(),
            data: None,
        })
    }

    /// Returns a copy of this record with a new description.
    #[must_use]
    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }

    /// Returns a copy of this record with a new data payload.
    #[must_use]
    pub fn with_data(&self, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..self.clone()
        }
    }

    /// The identifier of the service that produced this record.
    #[must_use]
    pub fn originator(&self) -> &str {
        &self.originator
    }

    /// The producer-local ordinal.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The result URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The result description. May be empty.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The producer-defined payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = ResultRecord::new("bing", 3, "https://example.com")
            .unwrap()
            .with_description("An example");

        assert_eq!(record.originator(), "bing");
        assert_eq!(record.index(), 3);
        assert_eq!(record.url(), "https://example.com");
        assert_eq!(record.description(), "An example");
        assert!(record.data().is_none());
    }

    #[test]
    fn test_record_rejects_empty_fields() {
        assert!(ResultRecord::new("", 0, "https://example.com").is_err());
        assert!(ResultRecord::new("bing", 0, "  ").is_err());
    }

    #[test]
    fn test_with_data_leaves_original_untouched() {
        let original = ResultRecord::new("ddg", 0, "https://example.com").unwrap();
        let enriched = original.with_data(serde_json::json!({"title": "Example"}));

        assert!(original.data().is_none());
        assert_eq!(enriched.data(), Some(&serde_json::json!({"title": "Example"})));
        assert_eq!(enriched.url(), original.url());
        assert_eq!(enriched.index(), original.index());
    }

    #[test]
    fn test_record_serializes() {
        let record = ResultRecord::new("ddg", 1, "https://example.com").unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["originator"], "ddg");
        assert_eq!(value["index"], 1);
        assert_eq!(value["data"], serde_json::Value::Null);
    }
}
