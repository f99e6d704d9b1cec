//! Endpoint registry.
//!
//! Transports outside the supervisor only need to ask whether an endpoint is
//! started before delivering to it; the registry answers that without taking
//! the context's service lock.

use dashmap::DashMap;

use crate::config::schema::EndpointConfig;

/// Registered endpoint and its started flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub service: String,
    pub address: String,
    pub started: bool,
}

/// Thread-safe map of endpoint name -> endpoint.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    entries: DashMap<String, Endpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a (stopped) endpoint.
    pub fn register(&self, config: &EndpointConfig) {
        self.entries.insert(
            config.name.clone(),
            Endpoint {
                name: config.name.clone(),
                service: config.service.clone(),
                address: config.address.clone(),
                started: false,
            },
        );
    }

    pub fn is_started(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.started)
    }

    pub fn get(&self, name: &str) -> Option<Endpoint> {
        self.entries.get(name).map(|e| e.value().clone())
    }

    /// Flip the started flag of every endpoint owned by `service`.
    pub fn set_service_started(&self, service: &str, started: bool) {
        for mut entry in self.entries.iter_mut() {
            if entry.service == service {
                entry.started = started;
            }
        }
    }

    pub fn stop_all(&self) {
        for mut entry in self.entries.iter_mut() {
            entry.started = false;
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Endpoint names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
