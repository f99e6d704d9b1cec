//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! [defaults.toml] + config resources (TOML, in layering order)
//!     → loader.rs (read, parse, deep-merge)
//!     → validation.rs (semantic checks)
//!     → ContextConfig (validated, immutable)
//!     → context builder instantiates services from it
//!
//! On reload signal:
//!     the same resources are read again
//!     → loader.rs / validation.rs
//!     → a brand new ContextConfig for the new generation
//! ```
//!
//! # Design Decisions
//! - Resources are identities, not contents; they are re-read on every build
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Supervisor settings live apart from the documents they supervise

pub mod loader;
pub mod resource;
pub mod schema;
pub mod settings;
pub mod validation;

pub use resource::ConfigResource;
pub use schema::{ContextConfig, ContextSettings, EndpointConfig, ServiceConfig};
pub use settings::{FailurePolicy, SupervisorSettings};
