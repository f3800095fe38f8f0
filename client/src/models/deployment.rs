//! Deployment wire models

use serde::{Deserialize, Serialize};

/// Status of a single deployment step as reported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Success,
    Error,

    /// Any status string this client version does not know about.
    /// Treated as a non-terminal intermediate state rather than a
    /// protocol failure.
    #[serde(other)]
    Unknown,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }
}

/// A progress event for one named deployment step
///
/// Step identity is the name, not a position: the orchestrator may re-emit
/// the same step (e.g. a retried sub-step) and does not transmit a canonical
/// step order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Server-defined step name, e.g. "Docker Installation"
    pub step: String,

    /// Reported status
    pub status: StepStatus,

    /// Optional human-readable detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Final outcome of a deployment attempt, delivered once by the terminal
/// `deployment_complete` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalResult {
    /// Whether the deployment succeeded
    #[serde(default)]
    pub success: bool,

    /// Public URL of the deployed application (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// AWS instance ID hosting the application (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Name of the running container (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Failure reason (failure only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for the deployment submission endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    /// GitHub repository URL to deploy
    pub github_url: String,

    /// Custom instance name (auto-generated by the server when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,

    /// Container port (server default when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,

    /// Host port (server default when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
}

/// Response from the deployment submission endpoint
///
/// `success` here means "accepted for processing" only; the actual outcome
/// arrives exclusively via the event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployResponse {
    #[serde(default)]
    pub success: bool,

    pub message: Option<String>,

    pub error: Option<String>,

    /// Correlation hint for the event stream; not all server versions
    /// return one.
    pub deployment_id: Option<String>,
}
