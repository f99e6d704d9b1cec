//! Error taxonomy for the supervisor and its collaborators.
//!
//! # Categories
//! - `ResourceAccessError`: filesystem problems (library directory, monitored resource)
//! - `ConfigurationError`: anything wrong with the documents a context is built from
//! - `LifecycleError`: start/dispose failures of a built context
//! - `SupervisorError`: what the supervisor's public operations return

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::context::ContextState;

/// Boxed error returned by component implementations and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Filesystem access failures.
#[derive(Debug, Error)]
pub enum ResourceAccessError {
    /// The library directory exists but cannot be listed.
    #[error("library directory {path} is not readable: {source}")]
    LibraryDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The monitored resource is missing or its timestamp cannot be read.
    #[error("monitored resource {path} is not readable: {source}")]
    MonitoredResource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The monitored resource has no containing directory to look for `lib` in.
    #[error("monitored resource {0} has no parent directory")]
    NoParentDirectory(PathBuf),

    /// An artifact path could not be expressed as a `file://` URL.
    #[error("artifact path {0} cannot be converted to a file URL")]
    ArtifactLocation(PathBuf),
}

/// Problems building a runtime context from its configuration resources.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no configuration resources supplied")]
    NoResources,

    #[error("failed to read configuration resource {resource}: {source}")]
    Read {
        resource: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration resource {resource}: {source}")]
    Parse {
        resource: String,
        #[source]
        source: toml::de::Error,
    },

    /// The merged document does not match the configuration schema.
    #[error("merged configuration does not match the schema: {0}")]
    Schema(#[source] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("service {service} uses unknown component kind {component}")]
    UnknownComponent { service: String, component: String },

    #[error("service {service} requires artifact {artifact}, which generation {generation} does not provide")]
    UnresolvedArtifact {
        service: String,
        artifact: String,
        generation: u64,
    },

    #[error("component for service {service} could not be created: {source}")]
    Component {
        service: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid supervisor settings: {}", join_errors(.0))]
    Settings(Vec<ValidationError>),
}

/// Failures while starting or disposing a runtime context.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot {action} context {context} while it is {state}")]
    InvalidTransition {
        context: String,
        action: &'static str,
        state: ContextState,
    },

    #[error("service {service} failed to start: {source}")]
    Start {
        service: String,
        #[source]
        source: BoxError,
    },

    #[error("service {service} failed to stop: {source}")]
    Stop {
        service: String,
        #[source]
        source: BoxError,
    },

    #[error("teardown of context {context} reported {} failure(s): {}", .failures.len(), join_errors(.failures))]
    Teardown {
        context: String,
        failures: Vec<LifecycleError>,
    },
}

/// Errors returned by [`ReloadSupervisor`](crate::supervisor::ReloadSupervisor) operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    ResourceAccess(#[from] ResourceAccessError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("supervisor is already initialised")]
    AlreadyInitialised,

    #[error("supervisor has not been initialised")]
    NotInitialised,

    #[error("supervisor has been shut down")]
    Terminated,

    #[error("a reload is already in progress")]
    ReloadInProgress,

    #[error("supervisor must be initialised from within a Tokio runtime")]
    NoRuntime,

    /// A reload attempt towards `generation` failed.
    #[error("reload to generation {generation} failed: {source}")]
    Reload {
        generation: u64,
        #[source]
        source: Box<SupervisorError>,
    },
}

impl SupervisorError {
    /// Wrap an error as the failure of a reload attempt.
    pub fn reload(generation: u64, source: impl Into<SupervisorError>) -> Self {
        SupervisorError::Reload {
            generation,
            source: Box::new(source.into()),
        }
    }
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
