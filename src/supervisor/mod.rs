//! Hot-reload supervisor.
//!
//! # Data Flow
//! ```text
//! initialise(resources, monitored)
//!     → library dir = <monitored parent>/lib
//!     → generation 0 → ContextBuilder → start → install → arm watcher
//!
//! watcher fires (or reload_now)
//!     → reload.rs (gate, cancel watcher, dispose/build per FailurePolicy)
//!     → install new context → arm a fresh watcher
//!     → ReloadEvent on the broadcast channel
//! ```
//!
//! # Design Decisions
//! - One reload at a time: an atomic gate plus the control lock held throughout
//! - Readers see the current context through an `ArcSwapOption`, never a lock
//! - The watcher callback holds a `Weak` reference; dropping the supervisor
//!   stops it
//! - Generation numbers are claimed per attempt and never reused

mod reload;
pub mod state;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::config::{ConfigResource, SupervisorSettings};
use crate::context::{ComponentRegistry, ContextBuilder, RuntimeContext};
use crate::error::{
    ConfigurationError, LifecycleError, ResourceAccessError, SupervisorError, SupervisorResult,
};
use crate::generation::{Generation, GenerationFactory, ResolutionScope};
use crate::observability::metrics;
use crate::watcher::{ResourceWatcher, WatchHandle, WatchTarget};

pub use state::{ReloadEvent, ReloadGate, ReloadPermit, ReloadTrigger, SupervisorState};
use state::StateCell;

const EVENT_CAPACITY: usize = 64;

/// Builder for [`ReloadSupervisor`].
#[derive(Debug, Default)]
pub struct SupervisorBuilder {
    settings: SupervisorSettings,
    registry: Option<ComponentRegistry>,
    parent_scope: Option<Arc<ResolutionScope>>,
    default_resource: Option<ConfigResource>,
}

impl SupervisorBuilder {
    pub fn settings(mut self, settings: SupervisorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Component kinds available to services. Defaults to the built-ins.
    pub fn registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Scope every generation falls back to. Defaults to an empty root scope.
    pub fn parent_scope(mut self, scope: Arc<ResolutionScope>) -> Self {
        self.parent_scope = Some(scope);
        self
    }

    /// Replace the built-in defaults document. Ignored when
    /// `use_default_resource` is off.
    pub fn default_resource(mut self, resource: ConfigResource) -> Self {
        self.default_resource = Some(resource);
        self
    }

    pub fn build(self) -> Result<ReloadSupervisor, ConfigurationError> {
        self.settings.validate()?;

        let default_resource = self
            .settings
            .use_default_resource
            .then(|| self.default_resource.unwrap_or_else(ConfigResource::builtin_defaults));
        let registry = self.registry.unwrap_or_else(ComponentRegistry::with_builtins);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Inner {
            builder: ContextBuilder::new(registry),
            generations: GenerationFactory::new(self.settings.extension()),
            parent_scope: self.parent_scope.unwrap_or_else(ResolutionScope::root),
            default_resource,
            settings: self.settings,
            state: StateCell::new(SupervisorState::Uninitialised),
            gate: ReloadGate::default(),
            current: ArcSwapOption::empty(),
            generation: ArcSwapOption::empty(),
            control: Mutex::new(Control::default()),
            events,
        };
        Ok(ReloadSupervisor {
            inner: Arc::new(inner),
        })
    }
}

/// What a reload rebuilds from; fixed at initialisation.
#[derive(Debug, Clone)]
struct Plan {
    resources: Vec<ConfigResource>,
    monitored: PathBuf,
    library_dir: PathBuf,
}

#[derive(Debug, Default)]
struct Control {
    plan: Option<Plan>,
    watcher: Option<WatchHandle>,
    runtime: Option<Handle>,
}

struct Inner {
    settings: SupervisorSettings,
    builder: ContextBuilder,
    generations: GenerationFactory,
    parent_scope: Arc<ResolutionScope>,
    default_resource: Option<ConfigResource>,
    state: StateCell,
    gate: ReloadGate,
    current: ArcSwapOption<RuntimeContext>,
    generation: ArcSwapOption<Generation>,
    control: Mutex<Control>,
    events: broadcast::Sender<ReloadEvent>,
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ReloadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn install(&self, generation: Arc<Generation>, context: Arc<RuntimeContext>) {
        self.generation.store(Some(generation));
        self.current.store(Some(context));
    }

    /// Scan `number`, build against it and start. A context that fails to
    /// start is disposed before the error is returned.
    fn build_and_start(
        &self,
        plan: &Plan,
        number: u64,
    ) -> SupervisorResult<(Arc<Generation>, Arc<RuntimeContext>)> {
        let generation =
            self.generations
                .build_numbered(number, &plan.library_dir, &self.parent_scope)?;
        let context = self.build_context(plan, &generation)?;
        let context = Self::start_or_discard(context)?;
        Ok((Arc::new(generation), context))
    }

    /// Start `context`; one that fails to start is disposed before the error
    /// is returned.
    fn start_or_discard(context: RuntimeContext) -> Result<Arc<RuntimeContext>, LifecycleError> {
        if let Err(err) = context.start() {
            discard(&context);
            return Err(err);
        }
        Ok(Arc::new(context))
    }

    fn build_context(
        &self,
        plan: &Plan,
        generation: &Generation,
    ) -> Result<RuntimeContext, ConfigurationError> {
        self.builder
            .build(&plan.resources, self.default_resource.as_ref(), generation)
    }

    /// Start a fresh single-shot watcher on the monitored resource.
    fn arm_watcher(self: &Arc<Self>, control: &mut Control, target: WatchTarget) {
        let Some(runtime) = control.runtime.as_ref() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let handle = ResourceWatcher::start_on(
            runtime,
            target,
            self.settings.poll_interval(),
            move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_resource_changed();
                }
            },
        );
        if let Some(previous) = control.watcher.replace(handle) {
            previous.cancel();
        }
    }

    fn cancel_watcher(control: &mut Control) {
        if let Some(watcher) = control.watcher.take() {
            watcher.cancel();
        }
    }

    fn on_resource_changed(self: &Arc<Self>) {
        // Failures are logged and published by `reload` itself.
        if let Err(SupervisorError::ReloadInProgress) = self.reload(ReloadTrigger::ResourceChanged) {
            tracing::debug!("Change signal ignored, reload already in progress");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        Self::cancel_watcher(control);
    }
}

/// Dispose a context that never became current, logging teardown failures.
fn discard(context: &RuntimeContext) {
    if let Err(err) = context.dispose() {
        tracing::warn!(
            context = %context.name(),
            generation = context.generation(),
            error = %err,
            "Teardown of discarded context reported failures"
        );
    }
}

/// `<parent of monitored>/<name>`; a bare file name resolves against `.`.
pub fn library_dir_for(monitored: &Path, name: &str) -> Result<PathBuf, ResourceAccessError> {
    match monitored.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(Path::new(".").join(name)),
        Some(parent) => Ok(parent.join(name)),
        None => Err(ResourceAccessError::NoParentDirectory(
            monitored.to_path_buf(),
        )),
    }
}

/// Keeps one runtime context running and rebuilds it, against a fresh
/// library generation, whenever the monitored resource changes.
///
/// Cheap to clone; clones share the same supervisor.
#[derive(Clone)]
pub struct ReloadSupervisor {
    inner: Arc<Inner>,
}

impl ReloadSupervisor {
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::default()
    }

    /// Supervisor with `settings`, the built-in component kinds and a root scope.
    pub fn new(settings: SupervisorSettings) -> Result<Self, ConfigurationError> {
        Self::builder().settings(settings).build()
    }

    /// Build and start generation 0, then begin watching `monitored`.
    ///
    /// `monitored` is normally the first entry of `resources`. Must be called
    /// from within a Tokio runtime; the watcher runs on it. On failure the
    /// supervisor is back to `Uninitialised` with no context and no watcher.
    pub fn initialise(
        &self,
        resources: Vec<ConfigResource>,
        monitored: impl AsRef<Path>,
    ) -> SupervisorResult<()> {
        let inner = &self.inner;
        let mut control = inner.lock_control();

        match inner.state.get() {
            SupervisorState::Uninitialised => {}
            SupervisorState::Terminal => return Err(SupervisorError::Terminated),
            _ => return Err(SupervisorError::AlreadyInitialised),
        }
        let runtime = Handle::try_current().map_err(|_| SupervisorError::NoRuntime)?;
        if resources.is_empty() {
            return Err(ConfigurationError::NoResources.into());
        }

        let monitored = monitored.as_ref().to_path_buf();
        let library_dir = library_dir_for(&monitored, &inner.settings.library_dir_name)?;
        let target = WatchTarget::new(&monitored)?;
        let plan = Plan {
            resources,
            monitored,
            library_dir,
        };

        tracing::info!(
            monitored = %plan.monitored.display(),
            library_dir = %plan.library_dir.display(),
            resources = ?plan.resources.iter().map(ConfigResource::name).collect::<Vec<_>>(),
            policy = ?inner.settings.failure_policy,
            "Initialising supervisor"
        );

        inner.state.set(SupervisorState::Building);
        let number = inner.generations.reserve_number();
        let (generation, context) = match inner.build_and_start(&plan, number) {
            Ok(built) => built,
            Err(err) => {
                inner.state.set(SupervisorState::Uninitialised);
                tracing::error!(generation = number, error = %err, "Initial context failed");
                return Err(err);
            }
        };

        let artifacts = artifact_names(&generation);
        metrics::record_generation(number, artifacts.len());
        inner.install(generation, context);
        control.plan = Some(plan);
        control.runtime = Some(runtime);
        inner.arm_watcher(&mut control, target);
        inner.state.set(SupervisorState::Running);

        tracing::info!(generation = number, artifacts = ?artifacts, "Supervisor running");
        inner.emit(ReloadEvent::Initialised {
            generation: number,
            artifacts,
        });
        Ok(())
    }

    /// Reload immediately, as if the monitored resource had changed.
    ///
    /// Also the way out of `Faulted`. Returns the number of the generation
    /// now running.
    pub fn reload_now(&self) -> SupervisorResult<u64> {
        self.inner.reload(ReloadTrigger::Manual)
    }

    /// Stop watching and dispose the current context. Idempotent.
    ///
    /// Waits for an in-flight reload to finish first.
    pub fn shutdown(&self) -> SupervisorResult<()> {
        let inner = &self.inner;
        let mut control = inner.lock_control();
        if inner.state.get() == SupervisorState::Terminal {
            return Ok(());
        }

        Inner::cancel_watcher(&mut control);
        control.plan = None;
        control.runtime = None;

        let result = match inner.current.swap(None) {
            Some(context) => context.dispose().map_err(SupervisorError::from),
            None => Ok(()),
        };
        inner.generation.store(None);
        inner.state.set(SupervisorState::Terminal);

        match &result {
            Ok(()) => tracing::info!("Supervisor shut down"),
            Err(err) => tracing::warn!(error = %err, "Supervisor shut down with teardown failures"),
        }
        inner.emit(ReloadEvent::ShutDown);
        result
    }

    /// The running context, if any.
    pub fn current(&self) -> Option<Arc<RuntimeContext>> {
        self.inner.current.load_full()
    }

    /// The generation the current context was built against.
    pub fn current_generation(&self) -> Option<Arc<Generation>> {
        self.inner.generation.load_full()
    }

    pub fn generation(&self) -> Option<u64> {
        self.current_generation().map(|g| g.number())
    }

    pub fn state(&self) -> SupervisorState {
        self.inner.state.get()
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    /// Library directory derived at initialisation. Blocks while a reload runs.
    pub fn library_dir(&self) -> Option<PathBuf> {
        let control = self.inner.lock_control();
        control.plan.as_ref().map(|p| p.library_dir.clone())
    }

    /// Monitored resource given at initialisation. Blocks while a reload runs.
    pub fn monitored_resource(&self) -> Option<PathBuf> {
        let control = self.inner.lock_control();
        control.plan.as_ref().map(|p| p.monitored.clone())
    }

    /// Whether a watcher is armed and able to fire.
    pub fn is_watching(&self) -> bool {
        let control = self.inner.lock_control();
        control.watcher.as_ref().is_some_and(WatchHandle::is_active)
    }

    pub fn is_reloading(&self) -> bool {
        self.inner.gate.is_busy()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.inner.events.subscribe()
    }
}

impl fmt::Debug for ReloadSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadSupervisor")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("policy", &self.inner.settings.failure_policy)
            .finish()
    }
}

fn artifact_names(generation: &Generation) -> Vec<String> {
    generation
        .artifact_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}
