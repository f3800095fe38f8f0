//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::app::render::Renderer;
use crate::deploy::binder::DeployBinder;
use crate::deploy::progress;
use crate::deploy::reconciler::DeployStatus;
use crate::errors::ClientError;
use crate::http::client::HttpClient;
use crate::models::deployment::DeployRequest;
use crate::socket::manager::SocketManager;
use crate::socket::transport::WsTransport;

/// Run one deployment attempt end to end: open the event stream, submit
/// the request, and render progress until a terminal outcome.
///
/// Returns the final status; an interrupt simply stops tracking, the
/// remote deployment continues unaffected.
pub async fn run(
    options: AppOptions,
    request: DeployRequest,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<DeployStatus, ClientError> {
    info!("Initializing deployment client...");

    let http_client = HttpClient::new(&options.backend_base_url)?;
    let transport = Arc::new(WsTransport::new(&options.backend_base_url)?);
    let socket = Arc::new(SocketManager::new(transport, options.socket.clone()));
    let mut binder = DeployBinder::new(socket.clone());

    binder.activate().await?;

    // Let the just-opened connection settle before the server starts
    // emitting progress for our request.
    tokio::time::sleep(options.settle_delay).await;

    info!("Submitting deployment for {}", request.github_url);
    match http_client.submit_deployment(&request).await {
        Ok(response) if response.success => {
            info!(
                "Deployment accepted: {}",
                response.message.as_deref().unwrap_or("started")
            );
            if let Some(deployment_id) = response.deployment_id.as_deref() {
                socket.announce_deployment(deployment_id);
            }
        }
        Ok(response) => {
            let reason = response
                .error
                .unwrap_or_else(|| "deployment request rejected".to_string());
            binder.fail_submission(reason);
        }
        Err(e) => binder.fail_submission(e.to_string()),
    }

    let status = tokio::select! {
        status = watch_progress(&binder, &socket, &options) => status,
        _ = shutdown_signal => {
            info!("Interrupted; the remote deployment continues unaffected");
            binder.snapshot().status
        }
    };

    binder.deactivate();
    socket.disconnect().await;

    Ok(status)
}

/// Render reconciled state until the attempt is terminal or the socket
/// manager has exhausted its reconnect attempts.
async fn watch_progress(
    binder: &DeployBinder,
    socket: &SocketManager,
    options: &AppOptions,
) -> DeployStatus {
    let mut renderer = Renderer::new();
    let changed = binder.changed();

    loop {
        let state = binder.snapshot();
        renderer.render(&state);

        if state.is_terminal() {
            let view = progress::derive(&state, &options.catalog);
            renderer.render_summary(&state, &view);
            return state.status;
        }

        if !socket.is_connected() && !socket.is_active().await {
            // Reconnects exhausted mid-attempt: we cannot tell whether the
            // deployment is still running or finished while unreachable.
            renderer.warn_connection_gap();
            return state.status;
        }

        tokio::select! {
            _ = changed.notified() => {}
            _ = tokio::time::sleep(options.render_interval) => {}
        }
    }
}
