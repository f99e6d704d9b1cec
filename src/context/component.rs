//! Components and the registry of component kinds.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::schema::ServiceConfig;
use crate::error::BoxError;
use crate::generation::Artifact;

/// A lifecycle-managed unit instantiated for one service.
pub trait Component: Send + fmt::Debug {
    fn start(&mut self) -> Result<(), BoxError>;

    fn stop(&mut self) -> Result<(), BoxError>;
}

/// Creates components of one kind.
///
/// `dependencies` are the artifacts the service's `requires` list resolved to,
/// in declaration order.
pub trait ComponentFactory: Send + Sync {
    fn create(
        &self,
        service: &ServiceConfig,
        dependencies: &[Artifact],
    ) -> Result<Box<dyn Component>, BoxError>;
}

impl<F> ComponentFactory for F
where
    F: Fn(&ServiceConfig, &[Artifact]) -> Result<Box<dyn Component>, BoxError> + Send + Sync,
{
    fn create(
        &self,
        service: &ServiceConfig,
        dependencies: &[Artifact],
    ) -> Result<Box<dyn Component>, BoxError> {
        self(service, dependencies)
    }
}

/// Component kinds available to configuration documents.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, Arc<dyn ComponentFactory>>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `log` kind.
    pub fn with_builtins() -> Self {
        Self::new().with(LOG_COMPONENT, LogComponent::factory)
    }

    /// Register `factory` under `kind`, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<String>, factory: impl ComponentFactory + 'static) {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn with(mut self, kind: impl Into<String>, factory: impl ComponentFactory + 'static) -> Self {
        self.register(kind, factory);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ComponentFactory>> {
        self.factories.get(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Kind name of [`LogComponent`].
pub const LOG_COMPONENT: &str = "log";

/// Logs its lifecycle transitions and resolved dependencies.
#[derive(Debug)]
pub struct LogComponent {
    service: String,
    dependencies: Vec<String>,
}

impl LogComponent {
    fn factory(
        service: &ServiceConfig,
        dependencies: &[Artifact],
    ) -> Result<Box<dyn Component>, BoxError> {
        Ok(Box::new(LogComponent {
            service: service.name.clone(),
            dependencies: dependencies
                .iter()
                .map(|a| a.location().to_string())
                .collect(),
        }))
    }
}

impl Component for LogComponent {
    fn start(&mut self) -> Result<(), BoxError> {
        tracing::info!(
            service = %self.service,
            dependencies = ?self.dependencies,
            "Service started"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        tracing::info!(service = %self.service, "Service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inert;

    impl Component for Inert {
        fn start(&mut self) -> Result<(), BoxError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_closures_are_factories() {
        let registry = ComponentRegistry::with_builtins().with(
            "inert",
            |_: &ServiceConfig, _: &[Artifact]| -> Result<Box<dyn Component>, BoxError> {
                Ok(Box::new(Inert))
            },
        );

        assert_eq!(registry.kinds(), vec!["inert", "log"]);
        let factory = registry.get("inert").unwrap();
        let mut component = factory
            .create(&ServiceConfig::new("svc", "inert"), &[])
            .unwrap();
        assert!(component.start().is_ok());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_log_component_records_dependencies() {
        let artifact = Artifact::from_path("/app/lib/a.jar").unwrap();
        let mut component = LogComponent::factory(&ServiceConfig::new("svc", "log"), &[artifact]).unwrap();
        assert!(format!("{component:?}").contains("file:///app/lib/a.jar"));
        assert!(component.start().is_ok());
        assert!(component.stop().is_ok());
    }
}
