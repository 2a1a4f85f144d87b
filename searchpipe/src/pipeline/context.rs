//! The immutable, composable pipeline configuration.

use super::engine::{self, RunReport};
use super::settings::{ConfigMode, Settings};
use crate::core::{PipelineEvent, ResultRecord};
use crate::errors::PipelineError;
use crate::events::{EventSink, FnEventSink};
use crate::http::Fetcher;
use crate::processors::{Dedup, Reorder};
use crate::registry::{service_registry, ServiceRegistry, ServiceSettings};
use crate::services::{RunState, Service, ServiceRole};
use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

/// Result ceiling of [`PipelineContext::default_pipeline`].
pub const DEFAULT_MAXIMUM_RESULTS: usize = 50;

/// A service registered on a context, plus its binding to a run.
///
/// Entries on a context held by a caller are never bound. Only the working
/// copy the engine builds for one run carries bindings.
#[derive(Clone)]
pub struct ServiceEntry {
    service: Arc<dyn Service>,
    binding: Option<Arc<RunState>>,
}

impl ServiceEntry {
    fn unbound(service: Arc<dyn Service>) -> Self {
        Self {
            service,
            binding: None,
        }
    }

    /// The service.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    /// The service's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// The run state bound to this service, if any.
    #[must_use]
    pub fn binding(&self) -> Option<&Arc<RunState>> {
        self.binding.as_ref()
    }

    /// Returns true if the entry is bound to a run.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    fn is_same_instance(&self, other: &Arc<dyn Service>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.service).cast::<()>(),
            Arc::as_ptr(other).cast::<()>(),
        )
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("service", &self.service)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// An ordered list of services plus the settings that drive a run.
///
/// Contexts are values: every composition operator returns a new context and
/// leaves the receiver untouched. Running a context never changes it either,
/// so one context can be run many times, from many tasks at once.
///
/// ```rust,ignore
/// let context = PipelineContext::new()
///     .with(MySearcher::new())?
///     .with_named("dedup", None)?
///     .with_configuration(Settings::new().with_maximum_results(20), ConfigMode::Merge)?;
///
/// let records = context.run("rust async").await?;
/// ```
#[derive(Default)]
pub struct PipelineContext {
    services: Vec<ServiceEntry>,
    settings: Settings,
    query: Option<String>,
    observers: Vec<Arc<dyn EventSink>>,
    fetcher: Option<Arc<dyn Fetcher>>,
}

impl PipelineContext {
    /// Creates an empty context with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh context with the default processors.
    ///
    /// The context deduplicates and interleaves results, returns at most
    /// [`DEFAULT_MAXIMUM_RESULTS`] records and raises events. Add searchers
    /// with [`PipelineContext::with`].
    #[must_use]
    pub fn default_pipeline() -> Self {
        Self {
            services: vec![
                ServiceEntry::unbound(Arc::new(Dedup::default())),
                ServiceEntry::unbound(Arc::new(Reorder::default())),
            ],
            settings: Settings::new()
                .with_maximum_results(DEFAULT_MAXIMUM_RESULTS)
                .with_events(true),
            ..Self::default()
        }
    }

    fn derive(&self, services: Vec<ServiceEntry>) -> Self {
        Self {
            services,
            settings: self.settings.clone(),
            query: None,
            observers: self.observers.clone(),
            fetcher: self.fetcher.clone(),
        }
    }

    fn unbound_entries(&self) -> Vec<ServiceEntry> {
        self.services
            .iter()
            .map(|e| ServiceEntry::unbound(Arc::clone(&e.service)))
            .collect()
    }

    /// Appends a service.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedServiceType`] if the service is
    /// neither a searcher nor a post-processor.
    pub fn with<S: Service + 'static>(&self, service: S) -> Result<Self, PipelineError> {
        self.with_shared(Arc::new(service))
    }

    /// Appends a shared service instance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedServiceType`] if the service is
    /// neither a searcher nor a post-processor, or
    /// [`PipelineError::DuplicateInstance`] if this exact instance is already
    /// part of the context.
    pub fn with_shared(&self, service: Arc<dyn Service>) -> Result<Self, PipelineError> {
        if service.roles().is_empty() {
            return Err(PipelineError::UnsupportedServiceType {
                service: service.name().to_string(),
            });
        }
        if self.services.iter().any(|e| e.is_same_instance(&service)) {
            return Err(PipelineError::DuplicateInstance {
                service: service.name().to_string(),
            });
        }

        let mut services = self.unbound_entries();
        services.push(ServiceEntry::unbound(service));
        Ok(self.derive(services))
    }

    /// Appends the service registered under `name` in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ServiceNotFound`],
    /// [`PipelineError::SettingsTypeMismatch`] or any error of
    /// [`PipelineContext::with_shared`].
    pub fn with_named(
        &self,
        name: &str,
        settings: Option<ServiceSettings>,
    ) -> Result<Self, PipelineError> {
        self.with_named_in(&service_registry(), name, settings.as_ref())
    }

    /// Appends the service registered under `name` in `registry`.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineContext::with_named`].
    pub fn with_named_in(
        &self,
        registry: &ServiceRegistry,
        name: &str,
        settings: Option<&ServiceSettings>,
    ) -> Result<Self, PipelineError> {
        let service = registry.create(name, settings)?;
        self.with_shared(service)
    }

    /// Appends the service registered for type `S` in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineContext::with_named`].
    pub fn with_type<S: Service + 'static>(
        &self,
        settings: Option<ServiceSettings>,
    ) -> Result<Self, PipelineError> {
        self.with_type_in::<S>(&service_registry(), settings.as_ref())
    }

    /// Appends the service registered for type `S` in `registry`.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineContext::with_named`].
    pub fn with_type_in<S: Service + 'static>(
        &self,
        registry: &ServiceRegistry,
        settings: Option<&ServiceSettings>,
    ) -> Result<Self, PipelineError> {
        let service = registry.create_type::<S>(settings)?;
        self.with_shared(service)
    }

    fn without_position(&self, position: usize) -> Self {
        let mut services = self.unbound_entries();
        services.remove(position);
        self.derive(services)
    }

    /// Removes the first service of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ServiceNotRegistered`] if no service has type `S`.
    pub fn without<S: Service + 'static>(&self) -> Result<Self, PipelineError> {
        let position = self
            .services
            .iter()
            .position(|e| e.service.is::<S>())
            .ok_or_else(|| PipelineError::service_not_registered(type_name::<S>()))?;
        Ok(self.without_position(position))
    }

    /// Removes the first service named `name` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ServiceNotRegistered`] if no service has that name.
    pub fn without_named(&self, name: &str) -> Result<Self, PipelineError> {
        let position = self
            .services
            .iter()
            .position(|e| e.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| PipelineError::service_not_registered(name))?;
        Ok(self.without_position(position))
    }

    /// Removes every service that fulfils `role`.
    ///
    /// A service with both roles is removed by either.
    #[must_use]
    pub fn without_all(&self, role: ServiceRole) -> Self {
        let services = self
            .unbound_entries()
            .into_iter()
            .filter(|e| !e.service.has_role(role))
            .collect();
        self.derive(services)
    }

    /// Replaces or merges the settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] if the resulting settings
    /// fail validation.
    pub fn with_configuration(
        &self,
        settings: Settings,
        mode: ConfigMode,
    ) -> Result<Self, PipelineError> {
        let settings = match mode {
            ConfigMode::Replace => settings,
            ConfigMode::Merge => self.settings.merge(&settings),
        };
        settings.validate()?;

        let mut context = self.derive(self.unbound_entries());
        context.settings = settings;
        Ok(context)
    }

    /// Adds an observer that receives every event of every later run.
    #[must_use]
    pub fn with_observer(&self, observer: Arc<dyn EventSink>) -> Self {
        let mut context = self.clone();
        context.observers.push(observer);
        context
    }

    /// Adds a closure as an observer.
    #[must_use]
    pub fn with_listener<F>(&self, listener: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.with_observer(Arc::new(FnEventSink::new(listener)))
    }

    /// Sets the transport handle passed to services at bind time.
    #[must_use]
    pub fn with_fetcher(&self, fetcher: Arc<dyn Fetcher>) -> Self {
        let mut context = self.clone();
        context.fetcher = Some(fetcher);
        context
    }

    /// The registered services, in registration order.
    #[must_use]
    pub fn entries(&self) -> &[ServiceEntry] {
        &self.services
    }

    /// The names of the registered services, in registration order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(ServiceEntry::name).collect()
    }

    /// Returns true if some service is named `name` (case-insensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services
            .iter()
            .any(|e| e.name().eq_ignore_ascii_case(name))
    }

    /// The settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The bound query. Only set on a run's working copy.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns true if this context is a run's working copy.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.query.is_some() || self.services.iter().any(ServiceEntry::is_bound)
    }

    /// The registered observers.
    #[must_use]
    pub fn observers(&self) -> &[Arc<dyn EventSink>] {
        &self.observers
    }

    /// The transport handle, if any.
    #[must_use]
    pub fn fetcher(&self) -> Option<&Arc<dyn Fetcher>> {
        self.fetcher.as_ref()
    }

    /// Number of services that fulfil the searcher role.
    #[must_use]
    pub fn searcher_count(&self) -> usize {
        self.services
            .iter()
            .filter(|e| e.service.has_role(ServiceRole::Searcher))
            .count()
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Builds a run's working copy, binding each service to the state
    /// `bind` returns for it.
    pub(super) fn bind<F>(&self, query: &str, mut bind: F) -> Arc<Self>
    where
        F: FnMut(usize, &ServiceEntry, Weak<Self>) -> RunState,
    {
        Arc::new_cyclic(|weak| Self {
            services: self
                .services
                .iter()
                .enumerate()
                .map(|(position, entry)| ServiceEntry {
                    service: Arc::clone(&entry.service),
                    binding: Some(Arc::new(bind(position, entry, weak.clone()))),
                })
                .collect(),
            settings: self.settings.clone(),
            query: Some(query.to_string()),
            observers: self.observers.clone(),
            fetcher: self.fetcher.clone(),
        })
    }

    /// Runs the pipeline for `query` and returns the final records.
    ///
    /// The query reaches every service exactly as given. Dropping the
    /// returned future aborts the run's searcher tasks.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidQuery`] for an empty or
    /// whitespace-only query, or the first searcher or processor failure.
    pub async fn run(&self, query: &str) -> Result<Vec<ResultRecord>, PipelineError> {
        Ok(self.run_with_report(query).await?.records)
    }

    /// Runs the pipeline for `query` and returns a full report.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineContext::run`].
    pub async fn run_with_report(&self, query: &str) -> Result<RunReport, PipelineError> {
        engine::execute(self, query, 0).await
    }
}

impl Clone for PipelineContext {
    /// Copies services, settings and observers. Run bindings and the bound
    /// query are not copied.
    fn clone(&self) -> Self {
        self.derive(self.unbound_entries())
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("services", &self.service_names())
            .field("settings", &self.settings)
            .field("query", &self.query)
            .field("observer_count", &self.observers.len())
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}
