//! Event-stream message framing

use serde::{Deserialize, Serialize};

use crate::models::deployment::{StepEvent, TerminalResult};

/// Kind of a server event, used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    DeploymentProgress,
    DeploymentComplete,
}

/// Event received from the deployment server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake acknowledgement
    Connected { message: Option<String> },

    /// Progress update for one deployment step
    DeploymentProgress(StepEvent),

    /// Terminal event carrying the final outcome
    DeploymentComplete(TerminalResult),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Connected { .. } => EventKind::Connected,
            ServerEvent::DeploymentProgress(_) => EventKind::DeploymentProgress,
            ServerEvent::DeploymentComplete(_) => EventKind::DeploymentComplete,
        }
    }
}

/// Message sent from the client to the deployment server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Correlation hint for the active deployment. The base protocol does
    /// not require the server to filter by it, as only one deployment is
    /// tracked per session.
    SubscribeDeployment { deployment_id: String },
}
