//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → Supervisor → initialise generation 0 → wait for signals
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shut the supervisor down
//!     SIGHUP → reload_now
//! ```
//!
//! # Design Decisions
//! - Any startup error is fatal
//! - Reloads requested by signal run on the blocking pool; component
//!   start/stop calls are synchronous

pub mod signals;
pub mod startup;

pub use signals::{SignalKind, Signals};
pub use startup::run;
