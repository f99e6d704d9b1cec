//! Monitored resource watcher.
//!
//! # Responsibilities
//! - Poll one file's modification timestamp on a fixed interval
//! - Fire the change callback at most once per watcher
//! - Stop on cancel, including a cancel issued from inside the callback
//!
//! # Design Decisions
//! - Polling, not OS notifications: the contract is "strictly newer mtime"
//! - Single-shot: the owner starts a fresh watcher per generation
//! - The callback runs on the poll task itself, so a long callback delays
//!   nothing but this watcher
//! - Timestamp granularity is the filesystem's; coarse clocks can miss changes

pub mod guard;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};

use crate::error::ResourceAccessError;
pub use guard::SingleShot;

/// The polled resource and the last timestamp observed for it.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    path: PathBuf,
    last_modified: SystemTime,
}

impl WatchTarget {
    /// Capture the current timestamp of `path` as the baseline.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ResourceAccessError> {
        let path = path.into();
        let last_modified = Self::modified_time(&path)?;
        Ok(Self {
            path,
            last_modified,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Read the modification timestamp of `path`.
    pub fn modified_time(path: &Path) -> Result<SystemTime, ResourceAccessError> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|source| ResourceAccessError::MonitoredResource {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Re-read the timestamp; `true` if it is strictly newer than the last one.
    pub fn refresh(&mut self) -> Result<bool, ResourceAccessError> {
        let modified = Self::modified_time(&self.path)?;
        if modified > self.last_modified {
            self.last_modified = modified;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    cancelled: AtomicBool,
    stop: Notify,
    fired: SingleShot,
}

/// Control handle of a running watcher.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    shared: Arc<Shared>,
}

impl WatchHandle {
    /// Stop polling. Idempotent; safe to call from the change callback.
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::AcqRel) {
            self.shared.stop.notify_one();
            tracing::debug!(path = %self.shared.path.display(), "Watcher cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    pub fn has_fired(&self) -> bool {
        self.shared.fired.has_fired()
    }

    /// Still polling and able to fire.
    pub fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.has_fired()
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Unchanged,
    Fired,
    Suppressed,
    Unreadable,
}

struct Poller<F> {
    target: WatchTarget,
    shared: Arc<Shared>,
    on_change: F,
}

impl<F> Poller<F>
where
    F: Fn(&WatchTarget),
{
    fn tick(&mut self) -> Tick {
        match self.target.refresh() {
            Ok(false) => Tick::Unchanged,
            Ok(true) => {
                if self.shared.cancelled.load(Ordering::Acquire) || !self.shared.fired.try_fire() {
                    tracing::debug!(path = %self.target.path().display(), "Duplicate change signal suppressed");
                    return Tick::Suppressed;
                }
                tracing::info!(path = %self.target.path().display(), "Monitored resource changed");
                (self.on_change)(&self.target);
                Tick::Fired
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll monitored resource");
                Tick::Unreadable
            }
        }
    }
}

/// Starts single-shot polling watchers.
#[derive(Debug)]
pub struct ResourceWatcher;

impl ResourceWatcher {
    /// Start watching on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn start<F>(target: WatchTarget, poll_interval: Duration, on_change: F) -> WatchHandle
    where
        F: Fn(&WatchTarget) + Send + Sync + 'static,
    {
        Self::start_on(&Handle::current(), target, poll_interval, on_change)
    }

    /// Start watching on `runtime`. The first poll happens immediately.
    pub fn start_on<F>(
        runtime: &Handle,
        target: WatchTarget,
        poll_interval: Duration,
        on_change: F,
    ) -> WatchHandle
    where
        F: Fn(&WatchTarget) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            path: target.path().to_path_buf(),
            cancelled: AtomicBool::new(false),
            stop: Notify::new(),
            fired: SingleShot::new(),
        });
        let poller = Poller {
            target,
            shared: Arc::clone(&shared),
            on_change,
        };
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        tracing::info!(
            path = %shared.path.display(),
            interval_ms = poll_interval.as_millis() as u64,
            "Watching resource for changes"
        );
        runtime.spawn(poll_loop(poller, poll_interval));

        WatchHandle { shared }
    }
}

async fn poll_loop<F>(mut poller: Poller<F>, poll_interval: Duration)
where
    F: Fn(&WatchTarget) + Send + Sync + 'static,
{
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shared = Arc::clone(&poller.shared);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shared.stop.notified() => break,
        }
        if shared.cancelled.load(Ordering::Acquire) {
            break;
        }
        match poller.tick() {
            Tick::Fired | Tick::Suppressed => break,
            Tick::Unchanged | Tick::Unreadable => {}
        }
    }

    tracing::debug!(path = %shared.path.display(), "Watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn bump(path: &Path, secs: u64) {
        let current = fs::metadata(path).unwrap().modified().unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(current + Duration::from_secs(secs))
            .unwrap();
    }

    fn poller<F: Fn(&WatchTarget)>(path: &Path, on_change: F) -> Poller<F> {
        let target = WatchTarget::new(path).unwrap();
        let shared = Arc::new(Shared {
            path: path.to_path_buf(),
            cancelled: AtomicBool::new(false),
            stop: Notify::new(),
            fired: SingleShot::new(),
        });
        Poller {
            target,
            shared,
            on_change,
        }
    }

    #[test]
    fn test_refresh_detects_strictly_newer_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let mut target = WatchTarget::new(&path).unwrap();
        assert!(!target.refresh().unwrap());
        bump(&path, 2);
        assert!(target.refresh().unwrap());
        assert!(!target.refresh().unwrap());
    }

    #[test]
    fn test_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            WatchTarget::new(dir.path().join("absent.toml")),
            Err(ResourceAccessError::MonitoredResource { .. })
        ));
    }

    #[test]
    fn test_repeated_changes_fire_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let calls = AtomicUsize::new(0);
        let mut poller = poller(&path, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });

        let mut ticks = Vec::new();
        for _ in 0..5 {
            bump(&path, 2);
            ticks.push(poller.tick());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ticks[0], Tick::Fired);
        assert!(ticks[1..].iter().all(|t| *t == Tick::Suppressed));
    }

    #[test]
    fn test_unreadable_resource_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let calls = AtomicUsize::new(0);
        let mut poller = poller(&path, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        fs::remove_file(&path).unwrap();

        assert_eq!(poller.tick(), Tick::Unreadable);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!poller.shared.fired.has_fired());
    }

    #[tokio::test]
    async fn test_watcher_fires_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = ResourceWatcher::start(
            WatchTarget::new(&path).unwrap(),
            Duration::from_millis(10),
            move |target| {
                let _ = tx.send(target.path().to_path_buf());
            },
        );
        assert!(handle.is_active());

        bump(&path, 2);
        let fired = time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(fired, Some(path.clone()));
        assert!(handle.has_fired());
        assert!(!handle.is_active());

        // The poll task has ended and dropped the callback, closing the channel.
        bump(&path, 2);
        let next = time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_cancel_from_inside_callback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let slot: Arc<std::sync::Mutex<Option<WatchHandle>>> = Arc::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let callback_slot = Arc::clone(&slot);
        let handle = ResourceWatcher::start(
            WatchTarget::new(&path).unwrap(),
            Duration::from_millis(10),
            move |_| {
                if let Some(handle) = callback_slot.lock().unwrap().as_ref() {
                    handle.cancel();
                    handle.cancel();
                }
                let _ = tx.send(());
            },
        );
        *slot.lock().unwrap() = Some(handle.clone());

        bump(&path, 2);
        time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_watcher_never_fires() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let handle = ResourceWatcher::start(
            WatchTarget::new(&path).unwrap(),
            Duration::from_millis(10),
            move |_| {
                let _ = tx.send(());
            },
        );
        handle.cancel();
        handle.cancel();
        bump(&path, 2);

        // Channel closes when the stopped poll task drops the callback.
        let next = time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(next, None);
        assert!(!handle.has_fired());
    }
}
