//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialise the supervisor (generation 0 running, watcher armed)
//! - Serve signals until asked to terminate
//! - Shut the supervisor down on the way out

use std::path::Path;

use crate::config::ConfigResource;
use crate::error::BoxError;
use crate::lifecycle::signals::{SignalKind, Signals};
use crate::supervisor::{ReloadEvent, ReloadSupervisor};

/// Run `supervisor` until SIGTERM or Ctrl+C.
///
/// A failed initialisation is returned immediately. Failed reloads are
/// logged and the loop keeps running, so a later SIGHUP can recover a
/// faulted supervisor.
pub async fn run(
    supervisor: ReloadSupervisor,
    resources: Vec<ConfigResource>,
    monitored: &Path,
) -> Result<(), BoxError> {
    let mut signals = Signals::new()?;
    let mut events = supervisor.subscribe();

    supervisor.initialise(resources, monitored)?;

    loop {
        tokio::select! {
            signal = signals.recv() => match signal? {
                SignalKind::Reload => {
                    if let Err(err) = reload_blocking(&supervisor).await {
                        tracing::warn!(error = %err, "Requested reload did not complete");
                    }
                }
                SignalKind::Terminate => break,
            },
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Event log lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Shutting down");
    let supervisor_for_shutdown = supervisor.clone();
    tokio::task::spawn_blocking(move || supervisor_for_shutdown.shutdown()).await??;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn reload_blocking(
    supervisor: &ReloadSupervisor,
) -> Result<u64, BoxError> {
    let supervisor = supervisor.clone();
    Ok(tokio::task::spawn_blocking(move || supervisor.reload_now()).await??)
}

fn log_event(event: &ReloadEvent) {
    match event {
        ReloadEvent::Initialised { generation, artifacts } => {
            tracing::debug!(generation, artifacts = artifacts.len(), "Event: initialised");
        }
        ReloadEvent::Reloaded { previous, generation, trigger, .. } => {
            tracing::debug!(?previous, generation, ?trigger, "Event: reloaded");
        }
        ReloadEvent::DisposeFailed { generation, .. } => {
            tracing::debug!(generation, "Event: dispose failed");
        }
        ReloadEvent::ReloadFailed { attempted, retained, .. } => {
            tracing::debug!(attempted, ?retained, "Event: reload failed");
        }
        ReloadEvent::WatchFailed { .. } => tracing::debug!("Event: watch failed"),
        ReloadEvent::ShutDown => tracing::debug!("Event: shut down"),
    }
}
