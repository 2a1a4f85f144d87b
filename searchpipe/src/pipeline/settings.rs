//! Pipeline-wide settings.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default limit on nested runs started by superseding processors.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 4;

/// How to handle searcher failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Fail the run with the first searcher error, in registration order (default).
    #[default]
    FailFast,
    /// Log a failing searcher, substitute an empty result set and continue.
    BestEffort,
}

/// How [`PipelineContext::with_configuration`](super::PipelineContext::with_configuration)
/// combines settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigMode {
    /// Discard the current settings.
    #[default]
    Replace,
    /// Take every field that is set on the new settings, keep the rest.
    Merge,
}

/// Immutable settings carried by a pipeline context.
///
/// Every field is optional so that merging is a uniform field-by-field
/// "set value wins" operation. Accessors apply the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Ceiling on the total number of records a run returns.
    pub maximum_results: Option<usize>,
    /// Timeout applied by services to each network request.
    pub request_timeout_ms: Option<u64>,
    /// Whether the run raises events.
    pub emit_events: Option<bool>,
    /// Whether the merged sequence is truncated to `maximum_results`.
    pub enforce_budget: Option<bool>,
    /// How searcher failures are handled.
    pub failure_mode: Option<FailureMode>,
    /// Deepest nested run a superseding processor may start.
    pub max_recursion_depth: Option<usize>,
}

impl Settings {
    /// Creates empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result ceiling.
    #[must_use]
    pub fn with_maximum_results(mut self, maximum: usize) -> Self {
        self.maximum_results = Some(maximum);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    /// Enables or disables events.
    #[must_use]
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.emit_events = Some(enabled);
        self
    }

    /// Enables or disables truncation of the merged sequence.
    #[must_use]
    pub fn with_enforce_budget(mut self, enforce: bool) -> Self {
        self.enforce_budget = Some(enforce);
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = Some(mode);
        self
    }

    /// Sets the recursion limit.
    #[must_use]
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = Some(depth);
        self
    }

    /// Returns true if events are enabled.
    #[must_use]
    pub fn events_enabled(&self) -> bool {
        self.emit_events.unwrap_or(false)
    }

    /// Returns true if the merged sequence is truncated to the ceiling.
    #[must_use]
    pub fn budget_enforced(&self) -> bool {
        self.enforce_budget.unwrap_or(true)
    }

    /// Returns the failure mode.
    #[must_use]
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode.unwrap_or_default()
    }

    /// Returns the recursion limit.
    #[must_use]
    pub fn recursion_limit(&self) -> usize {
        self.max_recursion_depth.unwrap_or(DEFAULT_MAX_RECURSION_DEPTH)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Merges `other` over `self`; fields set on `other` win.
    #[must_use]
    pub fn merge(&self, other: &Settings) -> Settings {
        Settings {
            maximum_results: other.maximum_results.or(self.maximum_results),
            request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
            emit_events: other.emit_events.or(self.emit_events),
            enforce_budget: other.enforce_budget.or(self.enforce_budget),
            failure_mode: other.failure_mode.or(self.failure_mode),
            max_recursion_depth: other.max_recursion_depth.or(self.max_recursion_depth),
        }
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] if a set field is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.maximum_results == Some(0) {
            return Err(PipelineError::InvalidSettings(
                "maximum_results must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(PipelineError::InvalidSettings(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_recursion_depth == Some(0) {
            return Err(PipelineError::InvalidSettings(
                "max_recursion_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] if the JSON is malformed or
    /// fails validation.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| PipelineError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(!settings.events_enabled());
        assert!(settings.budget_enforced());
        assert_eq!(settings.failure_mode(), FailureMode::FailFast);
        assert_eq!(settings.recursion_limit(), DEFAULT_MAX_RECURSION_DEPTH);
        assert!(settings.request_timeout().is_none());
    }

    #[test]
    fn test_merge_set_fields_win() {
        let base = Settings::new()
            .with_maximum_results(10)
            .with_events(true)
            .with_request_timeout_ms(500);
        let overlay = Settings::new().with_maximum_results(20).with_events(false);

        let merged = base.merge(&overlay);
        assert_eq!(merged.maximum_results, Some(20));
        assert_eq!(merged.emit_events, Some(false));
        assert_eq!(merged.request_timeout_ms, Some(500));
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(Settings::new().with_maximum_results(0).validate().is_err());
        assert!(Settings::new().with_request_timeout_ms(0).validate().is_err());
        assert!(Settings::new().with_max_recursion_depth(0).validate().is_err());
        assert!(Settings::new().with_maximum_results(1).validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let settings =
            Settings::from_json(r#"{"maximum_results": 25, "failure_mode": "best_effort"}"#).unwrap();
        assert_eq!(settings.maximum_results, Some(25));
        assert_eq!(settings.failure_mode(), FailureMode::BestEffort);
        assert_eq!(settings.emit_events, None);

        assert!(Settings::from_json(r#"{"maximum_results": 0}"#).is_err());
        assert!(Settings::from_json("not json").is_err());
    }

    #[test]
    fn test_request_timeout() {
        let settings = Settings::new().with_request_timeout_ms(1500);
        assert_eq!(settings.request_timeout(), Some(Duration::from_millis(1500)));
    }
}
