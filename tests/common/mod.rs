//! Shared utilities for supervisor integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tokio::sync::broadcast;

use reload_supervisor::config::{ConfigResource, FailurePolicy, ServiceConfig, SupervisorSettings};
use reload_supervisor::context::{Component, ComponentRegistry};
use reload_supervisor::error::BoxError;
use reload_supervisor::generation::Artifact;
use reload_supervisor::supervisor::ReloadEvent;

pub const POLL_INTERVAL_MS: u64 = 25;

/// Settings with a short poll interval.
pub fn settings(policy: FailurePolicy) -> SupervisorSettings {
    SupervisorSettings {
        poll_interval_ms: POLL_INTERVAL_MS,
        failure_policy: policy,
        ..Default::default()
    }
}

/// `<tmp>/app/config.toml` next to `<tmp>/app/lib`.
pub struct AppFixture {
    _dir: TempDir,
    pub app: PathBuf,
    pub config: PathBuf,
    pub lib: PathBuf,
    touches: AtomicU64,
}

impl AppFixture {
    pub fn new(config: &str) -> Self {
        let fixture = Self::without_lib(config);
        fs::create_dir_all(&fixture.lib).unwrap();
        fixture
    }

    pub fn without_lib(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(&app).unwrap();
        let config_path = app.join("config.toml");
        fs::write(&config_path, config).unwrap();
        Self {
            lib: app.join("lib"),
            config: config_path,
            app,
            _dir: dir,
            touches: AtomicU64::new(0),
        }
    }

    pub fn resources(&self) -> Vec<ConfigResource> {
        vec![ConfigResource::file(&self.config)]
    }

    pub fn add_artifact(&self, name: &str) -> &Self {
        fs::write(self.lib.join(name), name.as_bytes()).unwrap();
        self
    }

    pub fn remove_artifact(&self, name: &str) {
        fs::remove_file(self.lib.join(name)).unwrap();
    }

    /// Swap the library directory for a regular file of the same name.
    pub fn replace_lib_with_file(&self) {
        fs::remove_dir_all(&self.lib).unwrap();
        fs::write(&self.lib, b"not a directory").unwrap();
    }

    /// Replace the configuration in one step, with a newer timestamp.
    pub fn rewrite_config(&self, contents: &str) {
        let staged = self.app.join("config.toml.staged");
        fs::write(&staged, contents).unwrap();
        self.set_next_mtime(&staged);
        fs::rename(&staged, &self.config).unwrap();
    }

    /// Advance the configuration's timestamp past anything seen before.
    pub fn touch(&self) {
        self.set_next_mtime(&self.config);
    }

    fn set_next_mtime(&self, path: &Path) {
        let step = self.touches.fetch_add(1, Ordering::SeqCst) + 1;
        let mtime = SystemTime::now() + Duration::from_secs(60 * step);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }
}

/// Records recorder component lifecycle calls, in order.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    start_failures: Arc<AtomicUsize>,
    start_panics: Arc<AtomicUsize>,
}

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    /// Make the next `n` recorder starts fail, whatever their configuration.
    pub fn fail_next_starts(&self, n: usize) {
        self.start_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` recorder starts panic.
    pub fn panic_next_starts(&self, n: usize) {
        self.start_panics.store(n, Ordering::SeqCst);
    }

    fn record(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    fn take_start_failure(&self) -> bool {
        take_one(&self.start_failures)
    }

    fn take_start_panic(&self) -> bool {
        take_one(&self.start_panics)
    }

    /// Built-ins plus the `recorder` kind.
    ///
    /// Recorder properties: `fail_start`, `fail_stop`.
    pub fn registry(&self) -> ComponentRegistry {
        let journal = self.clone();
        ComponentRegistry::with_builtins().with(
            "recorder",
            move |service: &ServiceConfig, deps: &[Artifact]| -> Result<Box<dyn Component>, BoxError> {
                Ok(Box::new(Recorder {
                    service: service.name.clone(),
                    dependencies: deps.iter().map(|a| a.file_name().to_string()).collect(),
                    fail_start: service.flag("fail_start"),
                    fail_stop: service.flag("fail_stop"),
                    journal: journal.clone(),
                }))
            },
        )
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Debug)]
struct Recorder {
    service: String,
    dependencies: Vec<String>,
    fail_start: bool,
    fail_stop: bool,
    journal: Journal,
}

impl Component for Recorder {
    fn start(&mut self) -> Result<(), BoxError> {
        if self.journal.take_start_panic() {
            self.journal.record(format!("start-panicked:{}", self.service));
            panic!("{} panicked while starting", self.service);
        }
        if self.fail_start || self.journal.take_start_failure() {
            self.journal.record(format!("start-failed:{}", self.service));
            return Err(format!("{} refused to start", self.service).into());
        }
        self.journal.record(format!(
            "start:{}[{}]",
            self.service,
            self.dependencies.join(",")
        ));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.journal.record(format!("stop:{}", self.service));
        if self.fail_stop {
            return Err(format!("{} refused to stop", self.service).into());
        }
        Ok(())
    }
}

/// Next event, failing the test after a generous timeout.
pub async fn next_event(events: &mut broadcast::Receiver<ReloadEvent>) -> ReloadEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for a supervisor event")
        .expect("event channel closed")
}

/// `true` if nothing arrives within `window`.
pub async fn quiet_for(events: &mut broadcast::Receiver<ReloadEvent>, window: Duration) -> bool {
    tokio::time::timeout(window, events.recv()).await.is_err()
}

/// Several poll intervals.
pub fn settle() -> Duration {
    Duration::from_millis(POLL_INTERVAL_MS * 12)
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
