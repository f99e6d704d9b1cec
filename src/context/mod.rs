//! Runtime context subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigResources (+ built-in defaults) + Generation
//!     → builder.rs (load, validate, instantiate components)
//!     → RuntimeContext (Built)
//!     → start()   → Running
//!     → dispose() → Disposed
//! ```
//!
//! # Design Decisions
//! - The builder is a standalone capability; the supervisor composes it
//! - Component kinds come from an explicit registry, never from ambient state
//! - Teardown is best-effort: every started service gets its stop call
//! - Endpoint started flags are readable without the service lock

pub mod builder;
pub mod component;
pub mod endpoint;
pub mod runtime;

pub use builder::ContextBuilder;
pub use component::{Component, ComponentFactory, ComponentRegistry, LogComponent};
pub use endpoint::{Endpoint, EndpointRegistry};
pub use runtime::{ContextState, RuntimeContext};
