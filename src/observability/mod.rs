//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! supervisor, generation factory, watcher, runtime context
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (reload counters, generation gauges, durations)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (generation, context, path) on every lifecycle event
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
