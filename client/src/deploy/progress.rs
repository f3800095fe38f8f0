//! Derived progress view
//!
//! A pure projection of `DeploymentState`: no state of its own, identical
//! output for identical input, recomputed on every render.

use std::fmt;

use crate::deploy::catalog::StepCatalog;
use crate::deploy::reconciler::{DeployStatus, DeploymentState};

/// Tri-state label for the overall attempt (plus idle before start)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Idle,
    Deploying,
    Succeeded,
    Failed,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::Idle => "idle",
            Badge::Deploying => "deploying",
            Badge::Succeeded => "succeeded",
            Badge::Failed => "failed",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived, read-only progress figures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    /// Steps reported as `success` so far
    pub completed: usize,

    /// Expected step count from the canonical catalog, not the count of
    /// steps seen so far
    pub total: usize,

    /// `100 * completed / total`
    pub percentage: u8,

    pub badge: Badge,
}

/// Compute the progress view for a state against the step catalog
pub fn derive(state: &DeploymentState, catalog: &StepCatalog) -> ProgressView {
    let completed = state
        .steps
        .iter()
        .filter(|step| step.status.is_success())
        .count();
    let total = catalog.len();
    let percentage = if total == 0 {
        0
    } else {
        ((100 * completed / total).min(100)) as u8
    };

    let badge = match state.status {
        DeployStatus::Idle => Badge::Idle,
        DeployStatus::InProgress => Badge::Deploying,
        DeployStatus::Success => Badge::Succeeded,
        DeployStatus::Failed => Badge::Failed,
    };

    ProgressView {
        completed,
        total,
        percentage,
        badge,
    }
}
