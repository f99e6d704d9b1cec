//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a reload, not shutdown
//! - Only Ctrl+C is available off Unix

use std::io;

/// What a received signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Terminate,
    Reload,
}

/// Registered signal streams.
#[derive(Debug)]
pub struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl Signals {
    /// Register the handlers. Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind as UnixSignal};

        Ok(Self {
            terminate: signal(UnixSignal::terminate())?,
            hangup: signal(UnixSignal::hangup())?,
        })
    }

    #[cfg(not(unix))]
    pub fn new() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> io::Result<SignalKind> {
        let kind = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                SignalKind::Terminate
            }
            _ = self.terminate.recv() => SignalKind::Terminate,
            _ = self.hangup.recv() => SignalKind::Reload,
        };
        tracing::info!(signal = ?kind, "Signal received");
        Ok(kind)
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> io::Result<SignalKind> {
        tokio::signal::ctrl_c().await?;
        tracing::info!(signal = ?SignalKind::Terminate, "Signal received");
        Ok(SignalKind::Terminate)
    }
}
