//! Event reconciler for one deployment attempt
//!
//! Folds the raw event stream into a canonical, monotonically-improving
//! view: one entry per step name in first-seen order, plus an overall
//! status that latches once terminal. The server is trusted as the
//! ordering authority; events are applied in arrival order and never
//! reordered here.

use tracing::{debug, error, info, warn};

use crate::models::deployment::{StepEvent, StepStatus, TerminalResult};

/// Overall status of the tracked deployment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    /// No attempt started yet
    Idle,

    /// Attempt started, events expected
    InProgress,

    /// Terminal: deployment succeeded
    Success,

    /// Terminal: deployment failed
    Failed,
}

/// One reconciled step: at most one entry per step name ever exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledStep {
    pub step: String,
    pub status: StepStatus,
    pub message: Option<String>,
}

/// Canonical state of the current deployment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentState {
    pub status: DeployStatus,

    /// Insertion order is first-seen order; the canonical step ordering is
    /// not transmitted by the protocol.
    pub steps: Vec<ReconciledStep>,

    /// Set if and only if `status` is terminal; immutable once set.
    pub result: Option<TerminalResult>,
}

impl DeploymentState {
    fn idle() -> Self {
        Self {
            status: DeployStatus::Idle,
            steps: Vec::new(),
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DeployStatus::Success | DeployStatus::Failed)
    }
}

/// Reconciler over the deployment event stream
#[derive(Debug)]
pub struct Reconciler {
    state: DeploymentState,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            state: DeploymentState::idle(),
        }
    }

    /// Current canonical state
    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    /// Owned copy for rendering outside the event-loop callbacks
    pub fn snapshot(&self) -> DeploymentState {
        self.state.clone()
    }

    /// Begin a new attempt: clears steps and result from any previous
    /// attempt and enters `InProgress`. Called once per user-initiated
    /// deployment, before events are expected.
    pub fn start(&mut self) {
        if self.state.status == DeployStatus::InProgress {
            warn!("Restarting reconciler while an attempt is in progress");
        }
        self.state = DeploymentState {
            status: DeployStatus::InProgress,
            steps: Vec::new(),
            result: None,
        };
    }

    /// Apply one progress event: update the step in place if its name was
    /// seen before (last-write-wins, keeping its original position),
    /// otherwise append it. Dropped outside `InProgress` so a late or
    /// re-delivered event can never disturb a terminal state.
    pub fn apply_step(&mut self, event: StepEvent) {
        if self.state.status != DeployStatus::InProgress {
            debug!(
                "Dropping step event for '{}' while {:?}",
                event.step, self.state.status
            );
            return;
        }

        match self.state.steps.iter_mut().find(|s| s.step == event.step) {
            Some(existing) => {
                existing.status = event.status;
                existing.message = event.message;
            }
            None => self.state.steps.push(ReconciledStep {
                step: event.step,
                status: event.status,
                message: event.message,
            }),
        }
    }

    /// Apply the terminal event. A repeated terminal (transport retry) or
    /// one arriving outside `InProgress` is logged and ignored. A terminal
    /// arriving before any step event (fast-fail) is valid: the result
    /// alone is authoritative.
    pub fn apply_terminal(&mut self, result: TerminalResult) {
        if self.state.status != DeployStatus::InProgress {
            debug!(
                "Ignoring terminal event while {:?} (duplicate delivery?)",
                self.state.status
            );
            return;
        }

        if result.success {
            info!(
                "Deployment succeeded{}",
                result
                    .url
                    .as_deref()
                    .map(|url| format!(": {}", url))
                    .unwrap_or_default()
            );
            self.state.status = DeployStatus::Success;
        } else {
            error!(
                "Deployment failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
            self.state.status = DeployStatus::Failed;
        }
        self.state.result = Some(result);
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
