//! Supervisor state machine, reload gate and events.
//!
//! # States
//! ```text
//! Uninitialised → Building → Running ⇄ Reloading → … → Terminal
//!                     │                     │
//!                     └→ Uninitialised      └→ Faulted (fail-fast reload failure
//!                                                        or a reload that unwound)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle state of a [`ReloadSupervisor`](super::ReloadSupervisor).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Uninitialised = 0,
    Building = 1,
    Running = 2,
    Reloading = 3,
    /// A reload failed under the fail-fast policy, or unwound; no watcher.
    Faulted = 4,
    Terminal = 5,
}

impl From<u8> for SupervisorState {
    fn from(val: u8) -> Self {
        match val {
            1 => SupervisorState::Building,
            2 => SupervisorState::Running,
            3 => SupervisorState::Reloading,
            4 => SupervisorState::Faulted,
            5 => SupervisorState::Terminal,
            _ => SupervisorState::Uninitialised,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Uninitialised => "uninitialised",
            SupervisorState::Building => "building",
            SupervisorState::Running => "running",
            SupervisorState::Reloading => "reloading",
            SupervisorState::Faulted => "faulted",
            SupervisorState::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`SupervisorState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SupervisorState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> SupervisorState {
        SupervisorState::from(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SupervisorState) {
        let previous = SupervisorState::from(self.0.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Supervisor state changed");
        }
    }
}

/// Reload-in-progress flag: an `idle → reloading` compare-and-swap.
#[derive(Debug, Default)]
pub struct ReloadGate {
    busy: AtomicBool,
}

impl ReloadGate {
    /// Enter the gate, or `None` if a reload already holds it.
    pub fn try_enter(&self) -> Option<ReloadPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReloadPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one reload; reopens the gate on drop.
#[derive(Debug)]
pub struct ReloadPermit<'a> {
    gate: &'a ReloadGate,
}

impl Drop for ReloadPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Leaves the supervisor `Faulted` if dropped before `disarm`, i.e. when a
/// reload unwinds (a component panicked) without recording its outcome.
#[derive(Debug)]
pub(crate) struct FaultOnUnwind<'a> {
    state: &'a StateCell,
    armed: bool,
}

impl<'a> FaultOnUnwind<'a> {
    pub(crate) fn new(state: &'a StateCell) -> Self {
        Self { state, armed: true }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FaultOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.set(SupervisorState::Faulted);
            tracing::error!("Reload aborted before completing, supervisor faulted");
        }
    }
}

/// What started a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// The watcher saw a newer timestamp on the monitored resource.
    ResourceChanged,
    /// `reload_now` (e.g. SIGHUP).
    Manual,
}

/// Notifications published on the supervisor's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Generation 0 is running.
    Initialised {
        generation: u64,
        artifacts: Vec<String>,
    },
    /// A new generation replaced `previous`.
    Reloaded {
        previous: Option<u64>,
        generation: u64,
        artifacts: Vec<String>,
        trigger: ReloadTrigger,
    },
    /// The superseded context reported teardown failures; the reload went on.
    DisposeFailed { generation: u64, error: String },
    /// A reload attempt failed. `retained` names the generation still running, if any.
    ReloadFailed {
        attempted: u64,
        error: String,
        retained: Option<u64>,
    },
    /// The reload succeeded but the monitored resource could not be watched again.
    WatchFailed { error: String },
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            SupervisorState::Uninitialised,
            SupervisorState::Building,
            SupervisorState::Running,
            SupervisorState::Reloading,
            SupervisorState::Faulted,
            SupervisorState::Terminal,
        ] {
            assert_eq!(SupervisorState::from(state as u8), state);
        }
    }

    #[test]
    fn test_gate_admits_one_holder() {
        let gate = ReloadGate::default();
        let permit = gate.try_enter().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_enter().is_none());
        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_some());
    }

    #[test]
    fn test_fault_on_unwind() {
        let state = StateCell::new(SupervisorState::Reloading);
        FaultOnUnwind::new(&state).disarm();
        assert_eq!(state.get(), SupervisorState::Reloading);

        let result = std::panic::catch_unwind(|| {
            let _guard = FaultOnUnwind::new(&state);
            panic!("component blew up");
        });
        assert!(result.is_err());
        assert_eq!(state.get(), SupervisorState::Faulted);
    }
}
