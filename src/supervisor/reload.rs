//! The reload sequence.
//!
//! Fail-fast:       cancel watcher → scan generation → dispose current →
//!                  build context → start → install → arm watcher
//! Retain-previous: cancel watcher → scan generation → build context →
//!                  dispose current → start (or restore previous) → arm watcher
//!
//! A scan failure never touches the running context under either policy.

use std::sync::Arc;
use std::time::Instant;

use crate::config::FailurePolicy;
use crate::error::{SupervisorError, SupervisorResult};
use crate::generation::Generation;
use crate::observability::metrics;
use crate::watcher::WatchTarget;

use super::state::FaultOnUnwind;
use super::{artifact_names, Control, Inner, Plan, ReloadEvent, ReloadTrigger, SupervisorState};

/// A failed attempt and the generation left running, if any.
struct ReloadFailure {
    error: SupervisorError,
    retained: Option<u64>,
}

impl ReloadFailure {
    fn faulted(error: impl Into<SupervisorError>) -> Self {
        Self {
            error: error.into(),
            retained: None,
        }
    }
}

impl Inner {
    pub(super) fn reload(self: &Arc<Self>, trigger: ReloadTrigger) -> SupervisorResult<u64> {
        let Some(_permit) = self.gate.try_enter() else {
            return Err(SupervisorError::ReloadInProgress);
        };
        let mut control = self.lock_control();

        // The gate is held, so `Reloading` here can only be left over from an
        // attempt that unwound; it recovers like `Faulted`.
        match self.state.get() {
            SupervisorState::Running | SupervisorState::Faulted | SupervisorState::Reloading => {}
            SupervisorState::Terminal => return Err(SupervisorError::Terminated),
            SupervisorState::Uninitialised | SupervisorState::Building => {
                return Err(SupervisorError::NotInitialised)
            }
        }
        let plan = control.plan.clone().ok_or(SupervisorError::NotInitialised)?;

        Self::cancel_watcher(&mut control);
        self.state.set(SupervisorState::Reloading);
        let unwind_guard = FaultOnUnwind::new(&self.state);
        let number = self.generations.reserve_number();
        let previous = self.generation.load_full();
        let started = Instant::now();

        tracing::info!(
            generation = number,
            previous = ?previous.as_ref().map(|g| g.number()),
            trigger = ?trigger,
            policy = ?self.settings.failure_policy,
            "Reloading runtime context"
        );

        let outcome = match self.settings.failure_policy {
            FailurePolicy::FailFast => self.replace_fail_fast(&plan, number),
            FailurePolicy::RetainPrevious => self.replace_retaining(&plan, number, previous.clone()),
        };
        unwind_guard.disarm();
        metrics::record_reload_duration(started);

        match outcome {
            Ok(generation) => {
                let artifacts = artifact_names(&generation);
                metrics::record_reload("success");
                metrics::record_generation(number, artifacts.len());
                self.state.set(SupervisorState::Running);
                self.rearm(&mut control, &plan);

                tracing::info!(
                    generation = number,
                    artifacts = ?artifacts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Reload complete"
                );
                self.emit(ReloadEvent::Reloaded {
                    previous: previous.map(|g| g.number()),
                    generation: number,
                    artifacts,
                    trigger,
                });
                Ok(number)
            }
            Err(ReloadFailure { error, retained }) => {
                let error = SupervisorError::reload(number, error);
                match retained {
                    Some(running) => {
                        metrics::record_reload("retained");
                        self.state.set(SupervisorState::Running);
                        self.rearm(&mut control, &plan);
                        tracing::error!(
                            generation = number,
                            retained = running,
                            error = %error,
                            "Reload failed, previous generation kept running"
                        );
                    }
                    None => {
                        metrics::record_reload("failure");
                        self.state.set(SupervisorState::Faulted);
                        tracing::error!(
                            generation = number,
                            error = %error,
                            "Reload failed, no context running and watching stopped"
                        );
                    }
                }
                self.emit(ReloadEvent::ReloadFailed {
                    attempted: number,
                    error: error.to_string(),
                    retained,
                });
                Err(error)
            }
        }
    }

    /// Scan, then tear down, then build. A scan failure keeps the current
    /// context; any later failure leaves nothing running.
    fn replace_fail_fast(&self, plan: &Plan, number: u64) -> Result<Arc<Generation>, ReloadFailure> {
        let generation = self.scan(plan, number)?;

        self.dispose_current();
        self.generation.store(None);

        let context = self
            .build_context(plan, &generation)
            .map_err(ReloadFailure::faulted)?;
        let context = Self::start_or_discard(context).map_err(ReloadFailure::faulted)?;

        let generation = Arc::new(generation);
        self.install(Arc::clone(&generation), context);
        Ok(generation)
    }

    /// Scan the library directory into generation `number`. On failure the
    /// running context, if any, is reported as retained.
    fn scan(&self, plan: &Plan, number: u64) -> Result<Generation, ReloadFailure> {
        self.generations
            .build_numbered(number, &plan.library_dir, &self.parent_scope)
            .map_err(|e| ReloadFailure {
                error: e.into(),
                retained: self.current.load_full().map(|c| c.generation()),
            })
    }

    /// Build while the current context keeps serving; swap only once the
    /// replacement is ready.
    fn replace_retaining(
        &self,
        plan: &Plan,
        number: u64,
        previous: Option<Arc<Generation>>,
    ) -> Result<Arc<Generation>, ReloadFailure> {
        let generation = self.scan(plan, number)?;
        let context = self
            .build_context(plan, &generation)
            .map_err(|e| ReloadFailure {
                error: e.into(),
                retained: self.current.load_full().map(|c| c.generation()),
            })?;

        self.dispose_current();
        self.generation.store(None);

        let context = match Self::start_or_discard(context) {
            Ok(context) => context,
            Err(err) => {
                let retained = previous.and_then(|prev| self.restore(plan, prev));
                return Err(ReloadFailure {
                    error: err.into(),
                    retained,
                });
            }
        };

        let generation = Arc::new(generation);
        self.install(Arc::clone(&generation), context);
        Ok(generation)
    }

    /// Rebuild and start a context against `previous`, re-reading the resources.
    fn restore(&self, plan: &Plan, previous: Arc<Generation>) -> Option<u64> {
        let number = previous.number();
        let context = match self.build_context(plan, &previous) {
            Ok(context) => context,
            Err(err) => {
                tracing::error!(generation = number, error = %err, "Could not rebuild previous generation");
                return None;
            }
        };
        let context = match Self::start_or_discard(context) {
            Ok(context) => context,
            Err(err) => {
                tracing::error!(generation = number, error = %err, "Could not restart previous generation");
                return None;
            }
        };

        tracing::warn!(generation = number, "Previous generation restored");
        self.install(previous, context);
        Some(number)
    }

    /// Swap the current context out, then dispose it. Teardown failures are
    /// reported and otherwise ignored.
    fn dispose_current(&self) {
        let Some(old) = self.current.swap(None) else {
            return;
        };
        if let Err(err) = old.dispose() {
            metrics::record_dispose_failure();
            tracing::warn!(
                context = %old.name(),
                generation = old.generation(),
                error = %err,
                "Superseded context reported teardown failures, continuing"
            );
            self.emit(ReloadEvent::DisposeFailed {
                generation: old.generation(),
                error: err.to_string(),
            });
        }
    }

    /// Watch again from the resource's current timestamp.
    fn rearm(self: &Arc<Self>, control: &mut Control, plan: &Plan) {
        match WatchTarget::new(&plan.monitored) {
            Ok(target) => self.arm_watcher(control, target),
            Err(err) => {
                tracing::error!(error = %err, "Monitored resource unreadable, watching stopped");
                self.emit(ReloadEvent::WatchFailed {
                    error: err.to_string(),
                });
            }
        }
    }
}
