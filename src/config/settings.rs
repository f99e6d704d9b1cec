//! Supervisor settings.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::validate_settings;
use crate::error::ConfigurationError;

/// What happens to the running context when a reload attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Dispose first, then build; a failure leaves no current context and stops reloading.
    #[default]
    FailFast,
    /// Build first; a failure keeps (or restores) the previous generation and keeps watching.
    RetainPrevious,
}

/// Tunables of a [`ReloadSupervisor`](crate::supervisor::ReloadSupervisor).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Modification poll interval, in milliseconds.
    pub poll_interval_ms: u64,

    /// Name of the library directory next to the monitored resource.
    pub library_dir_name: String,

    /// File extension of dependency artifacts (without the dot).
    pub artifact_extension: String,

    /// Layer the built-in defaults document beneath the configured resources.
    pub use_default_resource: bool,

    pub failure_policy: FailurePolicy,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            library_dir_name: "lib".to_string(),
            artifact_extension: "jar".to_string(),
            use_default_resource: true,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl SupervisorSettings {
    /// Load and validate settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let resource = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            resource: resource.clone(),
            source,
        })?;
        let settings: SupervisorSettings = toml::from_str(&content)
            .map_err(|source| ConfigurationError::Parse { resource, source })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_settings(self).map_err(ConfigurationError::Settings)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Artifact extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.artifact_extension.trim_start_matches('.')
    }
}
