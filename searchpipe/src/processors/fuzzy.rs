//! Relevance filtering by approximate token matching.

use crate::core::ResultRecord;
use crate::errors::PipelineError;
use crate::registry::ServiceRegistry;
use crate::services::{PostProcessor, ProcessOutcome, RunState, Service};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Settings for [`Fuzzy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzySettings {
    /// Minimum similarity in `[0, 1]` a record needs to be kept.
    pub threshold: f64,
    /// Pattern that splits text into tokens.
    pub token_pattern: String,
    /// Raise `ResultProcessed` for every kept record.
    pub publish_events: bool,
}

impl Default for FuzzySettings {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            token_pattern: r"\w+".to_string(),
            publish_events: false,
        }
    }
}

/// Keeps records whose description and URL resemble the query.
///
/// Each query token is matched against its closest token in the record's
/// description and URL by normalised Levenshtein similarity. A record's
/// score is the mean over the query tokens.
#[derive(Debug)]
pub struct Fuzzy {
    settings: FuzzySettings,
    tokenizer: Regex,
}

impl Fuzzy {
    /// Registry name.
    pub const NAME: &'static str = "fuzzy";

    /// Creates a fuzzy filter.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] if `threshold` is outside
    /// `[0, 1]` or `token_pattern` does not compile.
    pub fn try_new(settings: FuzzySettings) -> Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&settings.threshold) {
            return Err(PipelineError::InvalidSettings(format!(
                "fuzzy threshold must be within [0, 1], got {}",
                settings.threshold
            )));
        }
        let tokenizer = Regex::new(&settings.token_pattern).map_err(|e| {
            PipelineError::InvalidSettings(format!("invalid fuzzy token pattern: {e}"))
        })?;
        Ok(Self {
            settings,
            tokenizer,
        })
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &FuzzySettings {
        &self.settings
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        self.tokenizer
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    /// Scores `record` against the query tokens.
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, query_tokens: &[String], record: &ResultRecord) -> f64 {
        let haystack = format!("{} {}", record.description(), record.url());
        let candidates = self.tokens(&haystack);
        if candidates.is_empty() {
            return 0.0;
        }

        let total: f64 = query_tokens
            .iter()
            .map(|q| {
                candidates
                    .iter()
                    .map(|c| similarity(q, c))
                    .fold(0.0, f64::max)
            })
            .sum();
        total / query_tokens.len() as f64
    }
}

#[async_trait]
impl PostProcessor for Fuzzy {
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError> {
        let query_tokens = self.tokens(run.query());
        if query_tokens.is_empty() {
            return Ok(records.into());
        }

        let kept: Vec<ResultRecord> = records
            .into_iter()
            .filter(|r| self.score(&query_tokens, r) >= self.settings.threshold)
            .collect();
        Ok(kept.into())
    }
}

impl Service for Fuzzy {
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

/// Normalised Levenshtein similarity in `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Edit distance between `a` and `b`, counted in chars.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Registers [`Fuzzy`] under [`Fuzzy::NAME`].
pub fn register(registry: &ServiceRegistry) {
    registry.try_register(Fuzzy::NAME, Fuzzy::try_new);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, description: &str) -> ResultRecord {
        ResultRecord::new("alpha", 0, url).unwrap().with_description(description)
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("abcd", "abcx") - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_filters_unrelated_records() {
        let records = vec![
            record("https://a.example/tokio", "Tokio async runtime for Rust"),
            record("https://b.example/cake", "Chocolate cake recipe"),
        ];
        let run = RunState::detached(Fuzzy::NAME, "rust async");
        let fuzzy = Fuzzy::try_new(FuzzySettings {
            threshold: 0.8,
            ..FuzzySettings::default()
        })
        .unwrap();

        let output = fuzzy.process(records, &run).await.unwrap().into_records();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].url(), "https://a.example/tokio");
    }

    #[tokio::test]
    async fn test_tolerates_typos() {
        let records = vec![record("https://a.example/", "asynchronous rust")];
        let run = RunState::detached(Fuzzy::NAME, "rsut");
        let output = Fuzzy::try_new(FuzzySettings {
            threshold: 0.5,
            ..FuzzySettings::default()
        })
        .unwrap()
        .process(records, &run)
        .await
        .unwrap()
        .into_records();
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_invalid_settings_rejected_at_construction() {
        let err = Fuzzy::try_new(FuzzySettings {
            token_pattern: "(".to_string(),
            ..FuzzySettings::default()
        })
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
        assert!(err.is_configuration());

        for threshold in [-0.1, 1.5, f64::NAN] {
            let result = Fuzzy::try_new(FuzzySettings {
                threshold,
                ..FuzzySettings::default()
            });
            assert!(result.is_err(), "threshold {threshold} accepted");
        }

        assert!(Fuzzy::try_new(FuzzySettings::default()).is_ok());
    }
}
