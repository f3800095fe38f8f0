//! Application configuration options

use std::time::Duration;

use crate::deploy::catalog::StepCatalog;
use crate::socket::manager::SocketOptions;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Deployment server base URL
    pub backend_base_url: String,

    /// Socket manager options
    pub socket: SocketOptions,

    /// Canonical step catalog used for percentage computation
    pub catalog: StepCatalog,

    /// Wait after opening the event stream before submitting, so the
    /// first progress events are not emitted into a half-open connection
    pub settle_delay: Duration,

    /// Poll cadence of the progress renderer
    pub render_interval: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:5000".to_string(),
            socket: SocketOptions::default(),
            catalog: StepCatalog::default(),
            settle_delay: Duration::from_millis(500),
            render_interval: Duration::from_millis(200),
        }
    }
}
