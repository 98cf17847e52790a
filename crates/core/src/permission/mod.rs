use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Request ids are handed out from 1; 0 never identifies a real request.
const FIRST_REQUEST_ID: u32 = 1;

/// Runtime authorization state for microphone capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermissionState {
    /// No grant/deny answer has been delivered yet.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    /// Returns `true` once the host has delivered a grant or a deny.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// Outbound request to the host permission subsystem. The `id` keys the
/// inbound callback to the dispatch that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: u32,
    pub capability: String,
}

/// Host permission subsystem boundary.
///
/// `dispatch` must return promptly; the grant/deny answer arrives later
/// through [`PermissionGate::on_result`] with the request id echoed back.
pub trait PermissionHost: Send + Sync {
    fn dispatch(&self, request: PermissionRequest);
}

/// Tracks capture authorization and the lifecycle of the single outstanding
/// permission request.
///
/// The gate is the sole owner of the recorded [`PermissionState`]; the host
/// pushes results in, nothing in here probes the platform. An unresolved
/// request leaves the state `Unknown` indefinitely, which callers treat the
/// same as a denial until told otherwise.
pub struct PermissionGate {
    host: Arc<dyn PermissionHost>,
    capability: String,
    state: PermissionState,
    pending: Option<u32>,
    next_request_id: u32,
}

impl PermissionGate {
    pub fn new(host: Arc<dyn PermissionHost>, capability: impl Into<String>) -> Self {
        Self {
            host,
            capability: capability.into(),
            state: PermissionState::Unknown,
            pending: None,
            next_request_id: FIRST_REQUEST_ID,
        }
    }

    /// Synchronous, side-effect-free query of the recorded authorization.
    pub fn check_status(&self) -> PermissionState {
        self.state
    }

    /// Id of the outstanding request, if one is in flight.
    pub fn pending_request(&self) -> Option<u32> {
        self.pending
    }

    /// Dispatches a request to the host unless the state is already resolved
    /// or a request is outstanding. Repeat calls made before the host answers
    /// coalesce into the request already in flight.
    pub fn request_if_needed(&mut self) {
        if self.state.is_resolved() {
            tracing::debug!(state = %self.state, "capture permission already resolved");
            return;
        }
        if let Some(request_id) = self.pending {
            tracing::debug!(request_id, "capture permission request already in flight");
            return;
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending = Some(request_id);
        tracing::info!(
            request_id,
            capability = %self.capability,
            "requesting capture permission"
        );
        self.host.dispatch(PermissionRequest {
            id: request_id,
            capability: self.capability.clone(),
        });
    }

    /// Records the host's grant/deny answer for the outstanding request and
    /// returns the newly recorded state.
    ///
    /// Only the pending id is accepted. A duplicate delivery, a mismatched
    /// id, or an unsolicited result keeps the first recorded value, logs the
    /// inconsistency, and returns `None`.
    pub fn on_result(&mut self, request_id: u32, granted: bool) -> Option<PermissionState> {
        match self.pending {
            Some(id) if id == request_id => {
                self.pending = None;
                self.state = if granted {
                    PermissionState::Granted
                } else {
                    PermissionState::Denied
                };
                tracing::info!(request_id, state = %self.state, "capture permission resolved");
                Some(self.state)
            }
            Some(outstanding) => {
                tracing::warn!(
                    request_id,
                    outstanding,
                    "permission result for an unknown request, ignoring"
                );
                None
            }
            None => {
                tracing::warn!(
                    request_id,
                    state = %self.state,
                    "permission result without an outstanding request, keeping recorded state"
                );
                None
            }
        }
    }

    /// Records an externally observed revocation. Only `Granted` can move to
    /// `Denied` here; every other state is left untouched.
    pub fn record_revocation(&mut self) {
        if self.state == PermissionState::Granted {
            self.state = PermissionState::Denied;
            tracing::warn!("capture permission revoked by the host");
        }
    }
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("capability", &self.capability)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish()
    }
}
