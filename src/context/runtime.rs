//! The runtime context and its lifecycle.
//!
//! # States
//! - Built: services instantiated, nothing started
//! - Running: every service started, endpoints marked started
//! - Disposed: services stopped and dropped (terminal)
//!
//! # State Transitions
//! ```text
//! Built → Running: start() succeeds
//! Built → Built: start() fails, already started services are stopped again
//! any → Disposed: dispose(), best-effort and idempotent
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::context::component::Component;
use crate::context::endpoint::EndpointRegistry;
use crate::error::LifecycleError;
use crate::generation::{Artifact, ResolutionScope};

/// Lifecycle state of a [`RuntimeContext`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Built = 0,
    Running = 1,
    Disposed = 2,
}

impl From<u8> for ContextState {
    fn from(val: u8) -> Self {
        match val {
            1 => ContextState::Running,
            2 => ContextState::Disposed,
            _ => ContextState::Built,
        }
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextState::Built => "built",
            ContextState::Running => "running",
            ContextState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// A service slot: the component plus whether it is currently started.
#[derive(Debug)]
pub(crate) struct Service {
    pub(crate) name: String,
    pub(crate) component: Box<dyn Component>,
    pub(crate) started: bool,
}

impl Service {
    pub(crate) fn new(name: String, component: Box<dyn Component>) -> Self {
        Self {
            name,
            component,
            started: false,
        }
    }
}

/// A fully constructed application runtime for one generation.
#[derive(Debug)]
pub struct RuntimeContext {
    id: Uuid,
    name: String,
    generation: u64,
    scope: Arc<ResolutionScope>,
    state: AtomicU8,
    services: Mutex<Vec<Service>>,
    endpoints: EndpointRegistry,
}

impl RuntimeContext {
    pub(crate) fn new(
        name: String,
        generation: u64,
        scope: Arc<ResolutionScope>,
        services: Vec<Service>,
        endpoints: EndpointRegistry,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            generation,
            scope,
            state: AtomicU8::new(ContextState::Built as u8),
            services: Mutex::new(services),
            endpoints,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of the generation this context was built against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ContextState {
        ContextState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ContextState::Running
    }

    pub fn scope(&self) -> &Arc<ResolutionScope> {
        &self.scope
    }

    /// Resolve an artifact symbol through this context's generation scope.
    pub fn resolve(&self, symbol: &str) -> Option<&Artifact> {
        self.scope.resolve(symbol)
    }

    /// Service names in start order. Empty once disposed.
    pub fn service_names(&self) -> Vec<String> {
        self.lock_services().iter().map(|s| s.name.clone()).collect()
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// Whether `endpoint` is registered and its service is started.
    pub fn is_endpoint_started(&self, endpoint: &str) -> bool {
        self.endpoints.is_started(endpoint)
    }

    /// Start every service in declaration order.
    ///
    /// On failure the services started so far are stopped in reverse order and
    /// the context stays `Built`, ready to be disposed.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut services = self.lock_services();

        let state = self.state();
        if state != ContextState::Built {
            return Err(LifecycleError::InvalidTransition {
                context: self.name.clone(),
                action: "start",
                state,
            });
        }

        tracing::info!(
            context = %self.name,
            context_id = %self.id,
            generation = self.generation,
            services = services.len(),
            "Starting runtime context"
        );

        let mut failure = None;
        for service in services.iter_mut() {
            match service.component.start() {
                Ok(()) => {
                    service.started = true;
                    self.endpoints.set_service_started(&service.name, true);
                }
                Err(source) => {
                    failure = Some(LifecycleError::Start {
                        service: service.name.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        if let Some(err) = failure {
            tracing::error!(
                context = %self.name,
                generation = self.generation,
                error = %err,
                "Runtime context failed to start, stopping started services"
            );
            for stop_err in self.stop_started(&mut services) {
                tracing::warn!(context = %self.name, error = %stop_err, "Rollback stop failed");
            }
            return Err(err);
        }

        self.state.store(ContextState::Running as u8, Ordering::Release);
        tracing::info!(context = %self.name, generation = self.generation, "Runtime context running");
        Ok(())
    }

    /// Stop and release everything the context owns.
    ///
    /// Safe in any state, including after a failed `start`. Every service is
    /// attempted even when an earlier one fails; the failures are returned
    /// together.
    pub fn dispose(&self) -> Result<(), LifecycleError> {
        let mut services = self.lock_services();

        let previous = ContextState::from(
            self.state.swap(ContextState::Disposed as u8, Ordering::AcqRel),
        );
        if previous == ContextState::Disposed {
            return Ok(());
        }

        tracing::info!(
            context = %self.name,
            context_id = %self.id,
            generation = self.generation,
            from = %previous,
            "Disposing runtime context"
        );

        self.endpoints.stop_all();
        let failures = self.stop_started(&mut services);
        services.clear();
        self.endpoints.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Teardown {
                context: self.name.clone(),
                failures,
            })
        }
    }

    fn stop_started(&self, services: &mut [Service]) -> Vec<LifecycleError> {
        let mut failures = Vec::new();
        for service in services.iter_mut().rev().filter(|s| s.started) {
            service.started = false;
            self.endpoints.set_service_started(&service.name, false);
            if let Err(source) = service.component.stop() {
                failures.push(LifecycleError::Stop {
                    service: service.name.clone(),
                    source,
                });
            }
        }
        failures
    }

    fn lock_services(&self) -> MutexGuard<'_, Vec<Service>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        if self.state() != ContextState::Disposed {
            if let Err(e) = self.dispose() {
                tracing::warn!(context = %self.name, error = %e, "Dispose on drop failed");
            }
        }
    }
}
