//! Context construction.

use std::sync::Arc;

use crate::config::loader::load_config;
use crate::config::resource::ConfigResource;
use crate::context::component::ComponentRegistry;
use crate::context::endpoint::EndpointRegistry;
use crate::context::runtime::{RuntimeContext, Service};
use crate::error::ConfigurationError;
use crate::generation::{Artifact, Generation};

/// Builds stopped runtime contexts from configuration resources.
///
/// The builder holds no per-build state; the supervisor calls it once per
/// generation with the same resources and a fresh generation.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    registry: Arc<ComponentRegistry>,
}

impl ContextBuilder {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// `default` first, then `resources` in order.
    pub fn layered_resources(
        resources: &[ConfigResource],
        default: Option<&ConfigResource>,
    ) -> Vec<ConfigResource> {
        default.into_iter().chain(resources).cloned().collect()
    }

    /// Build a context in the `Built` state against `generation`'s scope.
    pub fn build(
        &self,
        resources: &[ConfigResource],
        default: Option<&ConfigResource>,
        generation: &Generation,
    ) -> Result<RuntimeContext, ConfigurationError> {
        if resources.is_empty() {
            return Err(ConfigurationError::NoResources);
        }
        let layered = Self::layered_resources(resources, default);
        let config = load_config(&layered)?;
        let scope = generation.scope();

        let mut services = Vec::new();
        for service in config.enabled_services() {
            let factory = self.registry.get(&service.component).ok_or_else(|| {
                ConfigurationError::UnknownComponent {
                    service: service.name.clone(),
                    component: service.component.clone(),
                }
            })?;

            let dependencies = service
                .requires
                .iter()
                .map(|symbol| {
                    scope.resolve(symbol).cloned().ok_or_else(|| {
                        ConfigurationError::UnresolvedArtifact {
                            service: service.name.clone(),
                            artifact: symbol.clone(),
                            generation: generation.number(),
                        }
                    })
                })
                .collect::<Result<Vec<Artifact>, _>>()?;

            let component = factory.create(service, &dependencies).map_err(|source| {
                ConfigurationError::Component {
                    service: service.name.clone(),
                    source,
                }
            })?;

            tracing::debug!(
                service = %service.name,
                component = %service.component,
                dependencies = dependencies.len(),
                "Service instantiated"
            );
            services.push(Service::new(service.name.clone(), component));
        }

        let endpoints = EndpointRegistry::new();
        for endpoint in &config.endpoints {
            endpoints.register(endpoint);
        }

        tracing::info!(
            context = %config.context.name,
            generation = generation.number(),
            resources = ?layered.iter().map(ConfigResource::name).collect::<Vec<_>>(),
            services = services.len(),
            endpoints = endpoints.len(),
            "Runtime context built"
        );

        Ok(RuntimeContext::new(
            config.context.name,
            generation.number(),
            Arc::clone(scope),
            services,
            endpoints,
        ))
    }
}
