//! Error types for the searchpipe engine.
//!
//! Errors fall into two classes. Configuration errors are raised by the
//! composition operators on [`PipelineContext`](crate::pipeline::PipelineContext)
//! and are never retried. Execution errors fail a run as a whole.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for searchpipe operations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The query passed to a run was empty or whitespace-only.
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Why the query was rejected.
        reason: String,
    },

    /// A searcher failed to fetch or parse its provider's results.
    #[error("Provider error from '{service}': {message}")]
    Provider {
        /// The failing searcher.
        service: String,
        /// The provider's failure message.
        message: String,
    },

    /// A post-processor failed.
    #[error("Processor error from '{service}': {message}")]
    Processor {
        /// The failing post-processor.
        service: String,
        /// The failure message.
        message: String,
    },

    /// A reentrant run went deeper than the configured limit.
    #[error("Recursion limit exceeded in '{service}': depth {depth} exceeds limit {limit}")]
    RecursionLimit {
        /// The service that requested the nested run.
        service: String,
        /// The depth the nested run would have had.
        depth: usize,
        /// The configured limit.
        limit: usize,
    },

    /// The service implements neither the searcher nor the post-processor role.
    #[error("Unsupported service type: '{service}' is neither a searcher nor a post-processor")]
    UnsupportedServiceType {
        /// The rejected service.
        service: String,
    },

    /// No implementation is registered under the requested name or type.
    #[error("Service not found: no implementation registered for '{name}'")]
    ServiceNotFound {
        /// The requested name or type.
        name: String,
    },

    /// The settings supplied to a factory have the wrong type.
    #[error("Settings type mismatch for '{service}': expected {expected}, got {actual}")]
    SettingsTypeMismatch {
        /// The service being constructed.
        service: String,
        /// The settings type the constructor expects.
        expected: String,
        /// The settings type that was supplied.
        actual: String,
    },

    /// A removal target is not part of the pipeline.
    #[error("Service not registered: '{target}' is not part of this pipeline")]
    ServiceNotRegistered {
        /// The requested type or name.
        target: String,
    },

    /// The same service instance was added twice.
    #[error("Duplicate service instance: this '{service}' instance is already in the pipeline")]
    DuplicateInstance {
        /// The service name.
        service: String,
    },

    /// A result record violated its invariants.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Pipeline settings failed to parse or validate.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// An HTTP transport failure.
    #[error("HTTP error for '{url}': {message}")]
    Http {
        /// The requested URL.
        url: String,
        /// The transport failure message.
        message: String,
    },

    /// A fan-out task panicked or was aborted.
    #[error("Search task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Creates an invalid query error.
    #[must_use]
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }

    /// Creates a provider error.
    #[must_use]
    pub fn provider(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a processor error.
    #[must_use]
    pub fn processor(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processor {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a service not found error.
    #[must_use]
    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::ServiceNotFound { name: name.into() }
    }

    /// Creates a service not registered error.
    #[must_use]
    pub fn service_not_registered(target: impl Into<String>) -> Self {
        Self::ServiceNotRegistered {
            target: target.into(),
        }
    }

    /// Creates an HTTP error.
    #[must_use]
    pub fn http(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors raised by composition operators.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedServiceType { .. }
                | Self::ServiceNotFound { .. }
                | Self::SettingsTypeMismatch { .. }
                | Self::ServiceNotRegistered { .. }
                | Self::DuplicateInstance { .. }
                | Self::InvalidSettings(_)
        )
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "PIPELINE-INVALID_QUERY",
            Self::Provider { .. } => "PIPELINE-PROVIDER",
            Self::Processor { .. } => "PIPELINE-PROCESSOR",
            Self::RecursionLimit { .. } => "PIPELINE-RECURSION_LIMIT",
            Self::UnsupportedServiceType { .. } => "CONFIG-UNSUPPORTED_SERVICE",
            Self::ServiceNotFound { .. } => "CONFIG-SERVICE_NOT_FOUND",
            Self::SettingsTypeMismatch { .. } => "CONFIG-SETTINGS_MISMATCH",
            Self::ServiceNotRegistered { .. } => "CONFIG-SERVICE_NOT_REGISTERED",
            Self::DuplicateInstance { .. } => "CONFIG-DUPLICATE_INSTANCE",
            Self::InvalidRecord(_) => "PIPELINE-INVALID_RECORD",
            Self::InvalidSettings(_) => "CONFIG-INVALID_SETTINGS",
            Self::Http { .. } => "PIPELINE-HTTP",
            Self::Task(_) => "PIPELINE-TASK",
        }
    }

    /// Returns diagnostic metadata for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.code(), self.to_string());
        match ErrorSuggestions::get(self.code()) {
            Some(hint) => info.with_fix_hint(hint),
            None => info,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert(
            "configuration".to_string(),
            serde_json::json!(self.is_configuration()),
        );

        match self {
            Self::Provider { service, .. }
            | Self::Processor { service, .. }
            | Self::RecursionLimit { service, .. }
            | Self::UnsupportedServiceType { service }
            | Self::SettingsTypeMismatch { service, .. }
            | Self::DuplicateInstance { service } => {
                map.insert("service".to_string(), serde_json::json!(service));
            }
            Self::ServiceNotFound { name } => {
                map.insert("service".to_string(), serde_json::json!(name));
            }
            Self::ServiceNotRegistered { target } => {
                map.insert("service".to_string(), serde_json::json!(target));
            }
            _ => {}
        }

        map
    }
}

/// Metadata about an error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-SERVICE_NOT_FOUND").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Provides default suggestions for common error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "PIPELINE-INVALID_QUERY" => Some("Pass a query containing at least one non-whitespace character."),
            "PIPELINE-RECURSION_LIMIT" => Some(
                "A post-processor keeps re-running the pipeline. Bound its passes or \
                 raise max_recursion_depth.",
            ),
            "CONFIG-UNSUPPORTED_SERVICE" => Some(
                "Return Some(self) from as_searcher() or as_post_processor() in the service implementation.",
            ),
            "CONFIG-SERVICE_NOT_FOUND" => Some(
                "Register a factory for the name with ServiceRegistry::register before composing. \
                 Names are matched case-insensitively.",
            ),
            "CONFIG-SETTINGS_MISMATCH" => Some(
                "Wrap the settings struct the service constructor expects in ServiceSettings::new.",
            ),
            "CONFIG-SERVICE_NOT_REGISTERED" => Some(
                "Only services added to this context can be removed. Check the name or type.",
            ),
            "CONFIG-DUPLICATE_INSTANCE" => Some(
                "Create a new instance instead of adding the same Arc twice.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(PipelineError::service_not_found("bing").is_configuration());
        assert!(PipelineError::service_not_registered("dedup").is_configuration());
        assert!(!PipelineError::invalid_query("empty").is_configuration());
        assert!(!PipelineError::provider("bing", "timeout").is_configuration());
        assert!(!PipelineError::processor("dedup", "boom").is_configuration());
    }

    #[test]
    fn test_display_messages() {
        let err = PipelineError::provider("google", "HTTP 429");
        assert_eq!(err.to_string(), "Provider error from 'google': HTTP 429");

        let err = PipelineError::SettingsTypeMismatch {
            service: "fuzzy".to_string(),
            expected: "FuzzySettings".to_string(),
            actual: "u32".to_string(),
        };
        assert!(err.to_string().contains("expected FuzzySettings, got u32"));
    }

    #[test]
    fn test_error_info_has_hint() {
        let info = PipelineError::service_not_found("yahoo").error_info();
        assert_eq!(info.code, "CONFIG-SERVICE_NOT_FOUND");
        assert!(info.summary.contains("yahoo"));
        assert!(info.fix_hint.is_some());

        let info = PipelineError::Task("join".to_string()).error_info();
        assert!(info.fix_hint.is_none());
    }

    #[test]
    fn test_to_dict() {
        let dict = PipelineError::processor("refine", "boom").to_dict();
        assert_eq!(dict.get("code").unwrap(), "PIPELINE-PROCESSOR");
        assert_eq!(dict.get("service").unwrap(), "refine");
        assert_eq!(dict.get("configuration").unwrap(), false);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
    }
}
