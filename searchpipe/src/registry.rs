//! Name-to-factory registry for constructing services.
//!
//! Each plugin module registers a factory under a stable name. Contexts
//! resolve services through a registry by case-insensitive name or by Rust
//! type, passing opaque settings that the factory type-checks.

use crate::errors::PipelineError;
use crate::services::Service;
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Opaque construction-time settings for a service.
#[derive(Clone)]
pub struct ServiceSettings {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ServiceSettings {
    /// Wraps a settings value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the Rust type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Returns a copy of the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Builds a service from optional settings.
pub type ServiceFactory =
    Arc<dyn Fn(Option<&ServiceSettings>) -> Result<Arc<dyn Service>, PipelineError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    factory: ServiceFactory,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// In-memory registry of service factories.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: RwLock<Vec<Registration>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in processors.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::processors::register_builtins(&registry);
        registry
    }

    /// Registers `ctor` under `name`, taking settings of type `T`.
    ///
    /// Creating the service without settings passes `T::default()`. A
    /// registration with the same name (case-insensitive) is replaced.
    pub fn register<S, T, F>(&self, name: impl Into<String>, ctor: F)
    where
        S: Service + 'static,
        T: Any + Default + Clone + Send + Sync,
        F: Fn(T) -> S + Send + Sync + 'static,
    {
        self.try_register(name, move |settings: T| Ok(ctor(settings)));
    }

    /// Registers a constructor that validates its settings.
    ///
    /// Errors from `ctor` are returned by [`ServiceRegistry::create`], so
    /// invalid settings are reported when the service is composed rather
    /// than when it runs.
    pub fn try_register<S, T, F>(&self, name: impl Into<String>, ctor: F)
    where
        S: Service + 'static,
        T: Any + Default + Clone + Send + Sync,
        F: Fn(T) -> Result<S, PipelineError> + Send + Sync + 'static,
    {
        let name = name.into();
        let service_name = name.clone();
        let factory: ServiceFactory = Arc::new(
            move |settings: Option<&ServiceSettings>| -> Result<Arc<dyn Service>, PipelineError> {
                let typed = match settings {
                    None => T::default(),
                    Some(settings) => settings.downcast::<T>().ok_or_else(|| {
                        PipelineError::SettingsTypeMismatch {
                            service: service_name.clone(),
                            expected: type_name::<T>().to_string(),
                            actual: settings.type_name().to_string(),
                        }
                    })?,
                };
                let service: Arc<dyn Service> = Arc::new(ctor(typed)?);
                Ok(service)
            },
        );

        self.insert(Registration {
            name,
            type_id: TypeId::of::<S>(),
            type_name: type_name::<S>(),
            factory,
        });
    }

    /// Registers a service that takes no settings.
    pub fn register_default<S>(&self, name: impl Into<String>)
    where
        S: Service + Default + 'static,
    {
        self.register::<S, (), _>(name, |()| S::default());
    }

    fn insert(&self, registration: Registration) {
        let mut entries = self.entries.write();
        entries.retain(|e| !e.name.eq_ignore_ascii_case(&registration.name));
        tracing::debug!(name = %registration.name, ty = registration.type_name, "Registered service");
        entries.push(registration);
    }

    /// Constructs the service registered under `name` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ServiceNotFound`] if nothing is registered
    /// under `name`, or [`PipelineError::SettingsTypeMismatch`] if the
    /// settings are not of the type the factory expects.
    pub fn create(
        &self,
        name: &str,
        settings: Option<&ServiceSettings>,
    ) -> Result<Arc<dyn Service>, PipelineError> {
        let factory = self
            .entries
            .read()
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.factory.clone())
            .ok_or_else(|| PipelineError::service_not_found(name))?;
        factory(settings)
    }

    /// Constructs the service registered for type `S`.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceRegistry::create`].
    pub fn create_type<S: Service + 'static>(
        &self,
        settings: Option<&ServiceSettings>,
    ) -> Result<Arc<dyn Service>, PipelineError> {
        let type_id = TypeId::of::<S>();
        let factory = self
            .entries
            .read()
            .iter()
            .find(|e| e.type_id == type_id)
            .map(|e| e.factory.clone())
            .ok_or_else(|| PipelineError::service_not_found(type_name::<S>()))?;
        factory(settings)
    }

    /// Returns true if a service is registered under `name` (case-insensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Returns the registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name.clone()).collect()
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Process-wide registry, pre-populated with the built-in processors.
pub static REGISTRY: LazyLock<Arc<ServiceRegistry>> =
    LazyLock::new(|| Arc::new(ServiceRegistry::with_builtins()));

/// Returns the process-wide registry.
#[must_use]
pub fn service_registry() -> Arc<ServiceRegistry> {
    Arc::clone(&REGISTRY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticSearcher;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct EchoSettings {
        count: usize,
    }

    fn registry() -> ServiceRegistry {
        let registry = ServiceRegistry::new();
        registry.register("Echo", |settings: EchoSettings| {
            StaticSearcher::with_count("echo", settings.count)
        });
        registry
    }

    #[test]
    fn test_create_by_name_is_case_insensitive() {
        let registry = registry();
        let service = registry.create("ECHO", None).unwrap();
        assert_eq!(service.name(), "echo");
        assert!(registry.contains("echo"));
        assert!(!registry.contains("bing"));
    }

    #[test]
    fn test_create_with_settings() {
        let registry = registry();
        let settings = ServiceSettings::new(EchoSettings { count: 3 });
        let service = registry.create("echo", Some(&settings)).unwrap();
        let searcher = service.downcast_ref::<StaticSearcher>().unwrap();
        assert_eq!(searcher.len(), 3);
    }

    #[test]
    fn test_create_unknown_name() {
        let err = registry().create("nope", None).unwrap_err();
        assert!(matches!(err, PipelineError::ServiceNotFound { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_settings_type_mismatch() {
        let settings = ServiceSettings::new(42_u32);
        let err = registry().create("echo", Some(&settings)).unwrap_err();
        match err {
            PipelineError::SettingsTypeMismatch { service, actual, .. } => {
                assert_eq!(service, "Echo");
                assert_eq!(actual, "u32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_try_register_rejects_settings_at_create() {
        let registry = ServiceRegistry::new();
        registry.try_register("echo", |settings: EchoSettings| {
            if settings.count == 0 {
                return Err(PipelineError::InvalidSettings("count must be positive".to_string()));
            }
            Ok(StaticSearcher::with_count("echo", settings.count))
        });

        let err = registry.create("echo", None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
        assert!(err.is_configuration());

        let settings = ServiceSettings::new(EchoSettings { count: 2 });
        assert!(registry.create("echo", Some(&settings)).is_ok());
    }

    #[test]
    fn test_create_by_type() {
        let registry = registry();
        let service = registry.create_type::<StaticSearcher>(None).unwrap();
        assert!(service.is::<StaticSearcher>());
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = registry();
        registry.register("echo", |_: ()| StaticSearcher::with_count("replaced", 1));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.create("echo", None).unwrap().name(), "replaced");
    }

    #[test]
    fn test_global_registry_has_builtins() {
        let registry = service_registry();
        assert!(registry.contains("dedup"));
        assert!(registry.contains("reorder"));
        assert!(registry.contains("fuzzy"));
        assert!(registry.contains("refine"));
    }

    #[test]
    fn test_settings_wrapper() {
        let settings = ServiceSettings::new(EchoSettings { count: 2 });
        assert!(settings.is::<EchoSettings>());
        assert_eq!(settings.downcast::<EchoSettings>(), Some(EchoSettings { count: 2 }));
        assert_eq!(settings.downcast::<u8>(), None);
    }
}
