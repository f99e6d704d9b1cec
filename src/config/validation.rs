//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (endpoints reference enabled services)
//! - Detect duplicate names
//! - Validate supervisor settings ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ContextConfig → Result<(), Vec<ValidationError>>
//! - Component kinds and artifacts are checked later, against the registry and scope

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::ContextConfig;
use crate::config::settings::SupervisorSettings;

/// A single semantic problem in a configuration document or settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("context name must not be empty")]
    EmptyContextName,

    #[error("service #{0} has an empty name")]
    EmptyServiceName(usize),

    #[error("service {0} is declared more than once")]
    DuplicateService(String),

    #[error("service {0} has an empty component kind")]
    EmptyComponent(String),

    #[error("service {0} lists an empty artifact requirement")]
    EmptyRequirement(String),

    #[error("endpoint #{0} has an empty name")]
    EmptyEndpointName(usize),

    #[error("endpoint {0} is declared more than once")]
    DuplicateEndpoint(String),

    #[error("endpoint {0} has an empty address")]
    EmptyAddress(String),

    #[error("endpoint {endpoint} references unknown service {service}")]
    UnknownService { endpoint: String, service: String },

    #[error("endpoint {endpoint} references disabled service {service}")]
    DisabledService { endpoint: String, service: String },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("library directory name must be a single non-empty path component without surrounding whitespace")]
    InvalidLibraryDirName,

    #[error("artifact extension must not be empty")]
    EmptyArtifactExtension,
}

/// Validate a merged context configuration.
pub fn validate_config(config: &ContextConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.context.name.trim().is_empty() {
        errors.push(ValidationError::EmptyContextName);
    }

    let mut service_names = HashSet::new();
    for (index, service) in config.services.iter().enumerate() {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName(index));
            continue;
        }
        if !service_names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if service.component.trim().is_empty() {
            errors.push(ValidationError::EmptyComponent(service.name.clone()));
        }
        if service.requires.iter().any(|r| r.trim().is_empty()) {
            errors.push(ValidationError::EmptyRequirement(service.name.clone()));
        }
    }

    let mut endpoint_names = HashSet::new();
    for (index, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.name.trim().is_empty() {
            errors.push(ValidationError::EmptyEndpointName(index));
            continue;
        }
        if !endpoint_names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.name.clone()));
        }
        if endpoint.address.trim().is_empty() {
            errors.push(ValidationError::EmptyAddress(endpoint.name.clone()));
        }
        match config.service(&endpoint.service) {
            None => errors.push(ValidationError::UnknownService {
                endpoint: endpoint.name.clone(),
                service: endpoint.service.clone(),
            }),
            Some(service) if !service.enabled => errors.push(ValidationError::DisabledService {
                endpoint: endpoint.name.clone(),
                service: endpoint.service.clone(),
            }),
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate supervisor settings.
pub fn validate_settings(settings: &SupervisorSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    let name = settings.library_dir_name.as_str();
    if name.trim().is_empty()
        || name.trim() != name
        || name.contains(['/', '\\'])
        || name == "."
        || name == ".."
    {
        errors.push(ValidationError::InvalidLibraryDirName);
    }

    if settings.artifact_extension.trim_start_matches('.').is_empty() {
        errors.push(ValidationError::EmptyArtifactExtension);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EndpointConfig, ServiceConfig};

    fn endpoint(name: &str, service: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            service: service.into(),
            address: format!("vm://{name}"),
            properties: toml::Table::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = ContextConfig::default();
        config.services.push(ServiceConfig::new("ingest", "log"));
        config.endpoints.push(endpoint("ingest-in", "ingest"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ContextConfig::default();
        config.context.name = " ".into();
        config.services.push(ServiceConfig::new("ingest", "log"));
        config.services.push(ServiceConfig::new("ingest", ""));
        let mut audit = ServiceConfig::new("audit", "log");
        audit.enabled = false;
        config.services.push(audit);
        config.endpoints.push(endpoint("a", "missing"));
        config.endpoints.push(endpoint("b", "audit"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyContextName,
                ValidationError::DuplicateService("ingest".into()),
                ValidationError::EmptyComponent("ingest".into()),
                ValidationError::UnknownService {
                    endpoint: "a".into(),
                    service: "missing".into()
                },
                ValidationError::DisabledService {
                    endpoint: "b".into(),
                    service: "audit".into()
                },
            ]
        );
    }

    #[test]
    fn test_settings_validation() {
        assert!(validate_settings(&SupervisorSettings::default()).is_ok());

        let settings = SupervisorSettings {
            poll_interval_ms: 0,
            library_dir_name: "../lib".into(),
            artifact_extension: ".".into(),
            ..SupervisorSettings::default()
        };
        assert_eq!(
            validate_settings(&settings).unwrap_err(),
            vec![
                ValidationError::ZeroPollInterval,
                ValidationError::InvalidLibraryDirName,
                ValidationError::EmptyArtifactExtension,
            ]
        );
    }

    #[test]
    fn test_library_dir_name_with_whitespace() {
        for name in ["lib ", " lib", "\tlib", "  "] {
            let settings = SupervisorSettings {
                library_dir_name: name.into(),
                ..SupervisorSettings::default()
            };
            assert_eq!(
                validate_settings(&settings).unwrap_err(),
                vec![ValidationError::InvalidLibraryDirName],
                "{name:?}"
            );
        }
    }
}
