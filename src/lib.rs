//! Hot-reload supervisor library.
//!
//! Keeps a runtime context, built from configuration resources, running
//! against a generation of dependency artifacts discovered in a library
//! directory. When the monitored resource's timestamp advances, the current
//! context is torn down and a new one is built against a freshly scanned
//! generation.

// Core subsystems
pub mod config;
pub mod context;
pub mod generation;
pub mod supervisor;
pub mod watcher;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::{ConfigResource, FailurePolicy, SupervisorSettings};
pub use context::{Component, ComponentFactory, ComponentRegistry, ContextState, RuntimeContext};
pub use error::{SupervisorError, SupervisorResult};
pub use generation::{Artifact, Generation, ResolutionScope};
pub use supervisor::{ReloadEvent, ReloadSupervisor, SupervisorState};
