//! Lifecycle binder
//!
//! Couples the reconciler to the socket manager for the lifetime of one
//! deploy view. Keeps the exact callback handles it registered so that
//! deactivation removes those and only those; the socket manager may be
//! shared with other concurrently-active views.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::debug;

use crate::deploy::reconciler::{DeploymentState, Reconciler};
use crate::errors::ClientError;
use crate::models::deployment::TerminalResult;
use crate::socket::events::{EventKind, ServerEvent};
use crate::socket::manager::{EventCallback, SocketManager};

/// Binds one deployment attempt to the shared socket manager
pub struct DeployBinder {
    socket: Arc<SocketManager>,
    reconciler: Arc<Mutex<Reconciler>>,
    changed: Arc<Notify>,
    progress_cb: Option<EventCallback>,
    complete_cb: Option<EventCallback>,
}

impl DeployBinder {
    pub fn new(socket: Arc<SocketManager>) -> Self {
        Self {
            socket,
            reconciler: Arc::new(Mutex::new(Reconciler::new())),
            changed: Arc::new(Notify::new()),
            progress_cb: None,
            complete_cb: None,
        }
    }

    /// Arm tracking for a new deployment attempt: ensures the socket is
    /// connecting (without blocking on connectivity), registers the two
    /// event callbacks, and resets the reconciler to a fresh attempt.
    ///
    /// Calling this again for a "deploy again" fully re-arms: previous
    /// registrations are dropped first and the step sequence starts empty.
    pub async fn activate(&mut self) -> Result<(), ClientError> {
        self.deactivate();

        let reconciler = self.reconciler.clone();
        let changed = self.changed.clone();
        let progress_cb: EventCallback = Arc::new(move |event: &ServerEvent| {
            if let ServerEvent::DeploymentProgress(evt) = event {
                reconciler
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .apply_step(evt.clone());
                changed.notify_waiters();
            }
        });

        let reconciler = self.reconciler.clone();
        let changed = self.changed.clone();
        let complete_cb: EventCallback = Arc::new(move |event: &ServerEvent| {
            if let ServerEvent::DeploymentComplete(result) = event {
                reconciler
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .apply_terminal(result.clone());
                changed.notify_waiters();
            }
        });

        self.socket
            .subscribe(EventKind::DeploymentProgress, progress_cb.clone())
            .await?;
        self.socket
            .subscribe(EventKind::DeploymentComplete, complete_cb.clone())
            .await?;
        self.progress_cb = Some(progress_cb);
        self.complete_cb = Some(complete_cb);

        self.reconciler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .start();
        self.changed.notify_waiters();
        debug!("Deploy binder activated");
        Ok(())
    }

    /// Remove exactly the callbacks this binder registered. Safe to call
    /// when not activated. The socket connection itself stays up; it is
    /// owned by the session, not this view.
    pub fn deactivate(&mut self) {
        if let Some(cb) = self.progress_cb.take() {
            self.socket.unsubscribe(EventKind::DeploymentProgress, &cb);
        }
        if let Some(cb) = self.complete_cb.take() {
            self.socket.unsubscribe(EventKind::DeploymentComplete, &cb);
        }
    }

    /// Owned copy of the current attempt state
    pub fn snapshot(&self) -> DeploymentState {
        self.reconciler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Notifier pulsed whenever the attempt state changes
    pub fn changed(&self) -> Arc<Notify> {
        self.changed.clone()
    }

    /// Record a submission that never made it to the event stream as an
    /// immediately failed attempt.
    pub fn fail_submission(&self, error: String) {
        self.reconciler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply_terminal(TerminalResult {
                success: false,
                error: Some(error),
                ..TerminalResult::default()
            });
        self.changed.notify_waiters();
    }
}

impl Drop for DeployBinder {
    fn drop(&mut self) {
        self.deactivate();
    }
}
