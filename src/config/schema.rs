//! Configuration schema definitions.
//!
//! This module defines the document a runtime context is built from.
//! All types derive Serde traits for deserialization from TOML resources.

use serde::{Deserialize, Serialize};

/// Root of a (merged) context configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContextConfig {
    /// Context-wide settings.
    pub context: ContextSettings,

    /// Services to instantiate, in start order.
    #[serde(rename = "service")]
    pub services: Vec<ServiceConfig>,

    /// Endpoints exposed by those services.
    #[serde(rename = "endpoint")]
    pub endpoints: Vec<EndpointConfig>,
}

impl ContextConfig {
    /// Services that take part in the context.
    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.iter().filter(|s| s.enabled)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Context-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Context name used in logs.
    pub name: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            name: "runtime".to_string(),
        }
    }
}

/// A service declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name.
    pub name: String,

    /// Component kind, looked up in the component registry.
    pub component: String,

    /// Artifact symbols resolved through the generation's scope.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Disabled services are skipped when building.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form settings handed to the component factory.
    #[serde(default)]
    pub properties: toml::Table,
}

fn default_enabled() -> bool {
    true
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            requires: Vec::new(),
            enabled: true,
            properties: toml::Table::new(),
        }
    }

    /// Boolean property lookup, `false` when absent or not a boolean.
    pub fn flag(&self, key: &str) -> bool {
        self.properties
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(false)
    }

    /// String property lookup.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(toml::Value::as_str)
    }
}

/// An endpoint declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unique endpoint name.
    pub name: String,

    /// Owning service.
    pub service: String,

    /// Transport address, opaque to the supervisor (e.g. "vm://orders").
    pub address: String,

    #[serde(default)]
    pub properties: toml::Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_uses_defaults() {
        let config: ContextConfig = toml::from_str("").unwrap();
        assert_eq!(config.context.name, "runtime");
        assert!(config.services.is_empty());
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config: ContextConfig = toml::from_str(
            r#"
            [context]
            name = "orders"

            [[service]]
            name = "ingest"
            component = "log"
            requires = ["orders-core"]
            [service.properties]
            verbose = true

            [[service]]
            name = "audit"
            component = "log"
            enabled = false

            [[endpoint]]
            name = "ingest-in"
            service = "ingest"
            address = "vm://ingest"
            "#,
        )
        .unwrap();

        assert_eq!(config.context.name, "orders");
        assert_eq!(config.services.len(), 2);
        let ingest = config.service("ingest").unwrap();
        assert_eq!(ingest.requires, vec!["orders-core".to_string()]);
        assert!(ingest.flag("verbose"));
        assert!(!ingest.flag("missing"));
        assert_eq!(
            config.enabled_services().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["ingest"]
        );
        assert_eq!(config.endpoints[0].address, "vm://ingest");
    }
}
