use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    BootstrapError, LibraryLoadSequencer, LibrarySpec, PermissionGate, PermissionState, Result,
};

/// Lifecycle phase of the bootstrap sequence.
///
/// Transitions are monotonic: `NotStarted -> PermissionPending ->
/// LibrariesLoading -> Ready | Failed`, and both `Ready` and `Failed` are
/// final for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BootstrapStatus {
    #[default]
    NotStarted,
    PermissionPending,
    LibrariesLoading,
    Ready,
    Failed {
        reason: String,
    },
}

impl BootstrapStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for BootstrapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::PermissionPending => write!(f, "permission_pending"),
            Self::LibrariesLoading => write!(f, "libraries_loading"),
            Self::Ready => write!(f, "ready"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Host-side listener for bootstrap milestones.
///
/// `native_ready` is the signal the engine waits for before touching any
/// native symbol. The other callbacks carry host diagnostics and default to
/// no-ops.
pub trait BootstrapObserver: Send + Sync {
    /// Every library in the chain is resident.
    fn native_ready(&self);

    /// The capture permission request was answered.
    fn permission_resolved(&self, _state: PermissionState) {}

    /// Library loading failed and the bootstrap is over.
    fn bootstrap_failed(&self, _error: &BootstrapError) {}
}

/// Drives the permission gate and the load sequencer through one bootstrap.
///
/// The permission answer is asynchronous and never blocks library loading;
/// capture-dependent code re-queries [`Self::permission_status`] on its own
/// schedule.
pub struct BootstrapController {
    gate: PermissionGate,
    sequencer: LibraryLoadSequencer,
    observer: Arc<dyn BootstrapObserver>,
    status: BootstrapStatus,
}

impl BootstrapController {
    /// Takes ownership of a gate and an already configured sequencer.
    pub fn new(
        gate: PermissionGate,
        sequencer: LibraryLoadSequencer,
        observer: Arc<dyn BootstrapObserver>,
    ) -> Self {
        Self {
            gate,
            sequencer,
            observer,
            status: BootstrapStatus::NotStarted,
        }
    }

    /// Runs the bootstrap once: request the capture permission, then load
    /// the native chain.
    ///
    /// Any later call, whatever the outcome of the first, is a logged no-op
    /// returning `Ok`. The ready signal fires exactly once, only after every
    /// library loaded; a denied or unanswered permission does not prevent
    /// it. A load failure is reported to the observer and returned.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.status, BootstrapStatus::NotStarted) {
            tracing::debug!(status = %self.status, "bootstrap already started, ignoring");
            return Ok(());
        }

        self.set_status(BootstrapStatus::PermissionPending);
        self.gate.request_if_needed();

        self.set_status(BootstrapStatus::LibrariesLoading);
        match self.sequencer.run() {
            Ok(()) => {
                self.set_status(BootstrapStatus::Ready);
                self.observer.native_ready();
                Ok(())
            }
            Err(error) => {
                self.set_status(BootstrapStatus::Failed {
                    reason: error.to_string(),
                });
                self.observer.bootstrap_failed(&error);
                Err(error)
            }
        }
    }

    /// Forwards the host's permission callback to the gate. Accepted results
    /// are announced through the observer; stale or duplicate deliveries die
    /// here quietly.
    pub fn on_permission_result(&mut self, request_id: u32, granted: bool) {
        if let Some(state) = self.gate.on_result(request_id, granted) {
            self.observer.permission_resolved(state);
        }
    }

    /// Records an externally observed revocation of the capture permission.
    pub fn record_permission_revocation(&mut self) {
        self.gate.record_revocation();
    }

    pub fn status(&self) -> &BootstrapStatus {
        &self.status
    }

    pub fn permission_status(&self) -> PermissionState {
        self.gate.check_status()
    }

    /// Returns the configured chain with per-entry load flags.
    pub fn libraries(&self) -> &[LibrarySpec] {
        self.sequencer.specs()
    }

    fn set_status(&mut self, next: BootstrapStatus) {
        tracing::debug!(from = %self.status, to = %next, "bootstrap status change");
        self.status = next;
    }
}

impl fmt::Debug for BootstrapController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapController")
            .field("status", &self.status)
            .field("gate", &self.gate)
            .field("sequencer", &self.sequencer)
            .finish()
    }
}
