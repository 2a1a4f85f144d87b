//! Service capability contracts.
//!
//! A service is any plugin registered on a pipeline. It takes part in a run
//! through one or both capability roles:
//!
//! - [`Searcher`]: produces ranked records for a query from one provider
//! - [`PostProcessor`]: transforms the merged record sequence
//!
//! Services are shared immutably between contexts. Everything that belongs
//! to one run (query, budget, back-reference to the run) lives in the
//! [`RunState`] the engine passes to each call.

mod state;

pub use state::{RunState, RuntimeBudget};

use crate::core::ResultRecord;
use crate::errors::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::{self, Debug};

/// Upcast helper so type-based lookups work on `dyn Service`.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A plugin that can be registered on a pipeline.
pub trait Service: AsAny + Send + Sync + Debug {
    /// Returns the stable name used for name-based lookup and removal.
    fn name(&self) -> &str;

    /// Returns the searcher role, if this service has one.
    fn as_searcher(&self) -> Option<&dyn Searcher> {
        None
    }

    /// Returns the post-processor role, if this service has one.
    fn as_post_processor(&self) -> Option<&dyn PostProcessor> {
        None
    }

    /// Whether this service's per-record completion raises `ResultProcessed`.
    fn publishes_events(&self) -> bool {
        false
    }
}

impl dyn Service {
    /// Returns true if the concrete type behind this service is `T`.
    #[must_use]
    pub fn is<T: Service>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Returns the concrete service if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Service>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns true if this service fulfils `role`.
    #[must_use]
    pub fn has_role(&self, role: ServiceRole) -> bool {
        match role {
            ServiceRole::Searcher => self.as_searcher().is_some(),
            ServiceRole::PostProcessor => self.as_post_processor().is_some(),
        }
    }

    /// Returns every role this service fulfils.
    #[must_use]
    pub fn roles(&self) -> Vec<ServiceRole> {
        ServiceRole::all()
            .iter()
            .copied()
            .filter(|role| self.has_role(*role))
            .collect()
    }
}

/// The capability roles a service can fulfil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// Produces records from a query.
    Searcher,
    /// Transforms a record sequence.
    PostProcessor,
}

impl ServiceRole {
    /// Returns all roles.
    #[must_use]
    pub fn all() -> &'static [ServiceRole] {
        &[Self::Searcher, Self::PostProcessor]
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searcher => f.write_str("searcher"),
            Self::PostProcessor => f.write_str("post-processor"),
        }
    }
}

/// Produces result records for a query from one external provider.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Searches the provider.
    ///
    /// Records must be indexed `0..N-1` in the provider's own ranking order.
    /// The engine keeps that order and caps the output at the searcher's
    /// budget (see [`RunState::budget`]).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Provider`] on an irrecoverable fetch or parse failure.
    async fn search(&self, query: &str, run: &RunState) -> Result<Vec<ResultRecord>, PipelineError>;
}

/// What a post-processor hands to the next stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The transformed sequence.
    Records(Vec<ResultRecord>),
    /// The output of a nested run that replaces the input wholesale.
    Superseded(Vec<ResultRecord>),
}

impl ProcessOutcome {
    /// Returns the records, whichever variant carries them.
    #[must_use]
    pub fn into_records(self) -> Vec<ResultRecord> {
        match self {
            Self::Records(records) | Self::Superseded(records) => records,
        }
    }

    /// Returns true for [`ProcessOutcome::Superseded`].
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

impl From<Vec<ResultRecord>> for ProcessOutcome {
    fn from(records: Vec<ResultRecord>) -> Self {
        Self::Records(records)
    }
}

/// Transforms an already-merged record sequence.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Processes the output of the previous stage.
    ///
    /// A processor may drop, reorder or derive records. A processor that
    /// needs a fresh run (e.g. re-querying with derived terms) calls
    /// [`RunState::rerun`] and returns [`ProcessOutcome::Superseded`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Processor`] when the transformation fails.
    async fn process(
        &self,
        records: Vec<ResultRecord>,
        run: &RunState,
    ) -> Result<ProcessOutcome, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Both;

    #[async_trait]
    impl Searcher for Both {
        async fn search(&self, _query: &str, _run: &RunState) -> Result<Vec<ResultRecord>, PipelineError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl PostProcessor for Both {
        async fn process(
            &self,
            records: Vec<ResultRecord>,
            _run: &RunState,
        ) -> Result<ProcessOutcome, PipelineError> {
            Ok(records.into())
        }
    }

    impl Service for Both {
        fn name(&self) -> &str {
            "both"
        }

        fn as_searcher(&self) -> Option<&dyn Searcher> {
            Some(self)
        }

        fn as_post_processor(&self) -> Option<&dyn PostProcessor> {
            Some(self)
        }
    }

    #[derive(Debug)]
    struct Neither;

    impl Service for Neither {
        fn name(&self) -> &str {
            "neither"
        }
    }

    #[test]
    fn test_roles() {
        let both: &dyn Service = &Both;
        assert_eq!(both.roles(), vec![ServiceRole::Searcher, ServiceRole::PostProcessor]);
        assert!(!both.publishes_events());

        let neither: &dyn Service = &Neither;
        assert!(neither.roles().is_empty());
    }

    #[test]
    fn test_type_checks() {
        let both: &dyn Service = &Both;
        assert!(both.is::<Both>());
        assert!(!both.is::<Neither>());
        assert!(both.downcast_ref::<Both>().is_some());
    }

    #[test]
    fn test_process_outcome() {
        let outcome = ProcessOutcome::Superseded(Vec::new());
        assert!(outcome.is_superseded());
        assert!(outcome.into_records().is_empty());
        assert!(!ProcessOutcome::from(Vec::new()).is_superseded());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(ServiceRole::Searcher.to_string(), "searcher");
        assert_eq!(ServiceRole::PostProcessor.to_string(), "post-processor");
    }
}
