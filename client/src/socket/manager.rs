//! Event-stream connection manager
//!
//! Owns one persistent, auto-reconnecting connection to the deployment
//! server and dispatches incoming events to registered callbacks. One
//! instance is shared per session and survives across deployment attempts;
//! it is constructed at the composition root and passed to whoever needs
//! it rather than living in a global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::ClientError;
use crate::socket::events::{ClientMessage, EventKind, ServerEvent};
use crate::socket::transport::Transport;

/// Callback invoked for each delivered event.
///
/// Identity is the `Arc` allocation: subscribing the same `Arc` twice does
/// not double-deliver, and unsubscribing removes exactly that `Arc`.
pub type EventCallback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

type Registry = HashMap<EventKind, Vec<EventCallback>>;

/// Socket manager options
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,

    /// Max consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Treat the connection as dead after this long without any event.
    /// Tuned to exceed the longest silent deployment step (EC2 boot plus
    /// Docker installation).
    pub inactivity_timeout: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            inactivity_timeout: Duration::from_secs(300),
        }
    }
}

/// Persistent connection to the deployment event stream
pub struct SocketManager {
    transport: Arc<dyn Transport>,
    options: SocketOptions,
    connected: Arc<AtomicBool>,
    registry: Arc<StdMutex<Registry>>,
    subscription_tx: watch::Sender<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl SocketManager {
    /// Create a manager over the given transport. No connection is opened
    /// until `connect` or the first `subscribe`.
    pub fn new(transport: Arc<dyn Transport>, options: SocketOptions) -> Self {
        let (subscription_tx, _) = watch::channel(None);
        Self {
            transport,
            options,
            connected: Arc::new(AtomicBool::new(false)),
            registry: Arc::new(StdMutex::new(HashMap::new())),
            subscription_tx,
            task: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Ensure the connection loop is running. Idempotent: when already
    /// running this returns without side effects. Does not wait for the
    /// handshake, so callers are never blocked by a mid-reconnect gap.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!("Already connected, reusing event stream");
                return Ok(());
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let transport = self.transport.clone();
        let options = self.options.clone();
        let connected = self.connected.clone();
        let registry = self.registry.clone();
        let subscription_rx = self.subscription_tx.subscribe();

        *task = Some(tokio::spawn(run_loop(
            transport,
            options,
            connected,
            registry,
            subscription_rx,
            shutdown_rx,
        )));

        Ok(())
    }

    /// Tear down the connection and release all registered listeners.
    /// No-op when not connected.
    pub async fn disconnect(&self) {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
            info!("Event stream disconnected");
        }
        self.connected.store(false, Ordering::SeqCst);
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Current liveness of the underlying connection
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether the connection loop is still running. `false` together with
    /// `is_connected() == false` means reconnect attempts were exhausted
    /// and no further events will arrive.
    pub async fn is_active(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Register a callback for one event kind, connecting lazily if needed.
    /// Subscribing the same callback twice is a no-op.
    pub async fn subscribe(
        &self,
        kind: EventKind,
        callback: EventCallback,
    ) -> Result<(), ClientError> {
        {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let callbacks = registry.entry(kind).or_default();
            if callbacks.iter().any(|cb| Arc::ptr_eq(cb, &callback)) {
                debug!("Callback already subscribed for {:?}", kind);
            } else {
                callbacks.push(callback);
            }
        }
        self.connect().await
    }

    /// Remove exactly the given callback for one event kind. Callbacks
    /// registered by other subscribers stay untouched.
    pub fn unsubscribe(&self, kind: EventKind, callback: &EventCallback) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(callbacks) = registry.get_mut(&kind) {
            callbacks.retain(|cb| !Arc::ptr_eq(cb, callback));
        }
    }

    /// Set the correlation hint for the active deployment. It is sent
    /// immediately when connected and re-sent after every reconnect.
    pub fn announce_deployment(&self, deployment_id: &str) {
        debug!("Announcing deployment subscription: {}", deployment_id);
        self.subscription_tx
            .send_replace(Some(deployment_id.to_string()));
    }
}

async fn run_loop(
    transport: Arc<dyn Transport>,
    options: SocketOptions,
    connected: Arc<AtomicBool>,
    registry: Arc<StdMutex<Registry>>,
    mut subscription_rx: watch::Receiver<Option<String>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempts: u32 = 0;

    loop {
        // A handshake against an unreachable host can hang for the full OS
        // connect timeout; shutdown must not wait on it.
        let attempt = tokio::select! {
            _ = shutdown_rx.changed() => return,
            attempt = transport.connect() => attempt,
        };

        match attempt {
            Ok((mut sink, mut source)) => {
                connected.store(true, Ordering::SeqCst);
                if attempts > 0 {
                    info!("Reconnected to event stream after {} attempt(s)", attempts);
                } else {
                    info!("Connected to event stream");
                }
                attempts = 0;

                // Announce the active deployment on every (re)connect; the
                // server does not replay events missed while disconnected.
                let current = subscription_rx.borrow_and_update().clone();
                if let Some(deployment_id) = current {
                    if let Err(e) = sink
                        .send(ClientMessage::SubscribeDeployment { deployment_id })
                        .await
                    {
                        warn!("Failed to send subscription: {}", e);
                    }
                }

                let reason = loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            let _ = sink.close().await;
                            connected.store(false, Ordering::SeqCst);
                            return;
                        }
                        changed = subscription_rx.changed() => {
                            if changed.is_err() {
                                // Manager dropped
                                connected.store(false, Ordering::SeqCst);
                                return;
                            }
                            let current = subscription_rx.borrow_and_update().clone();
                            if let Some(deployment_id) = current {
                                if let Err(e) = sink
                                    .send(ClientMessage::SubscribeDeployment { deployment_id })
                                    .await
                                {
                                    break format!("send failed: {}", e);
                                }
                            }
                        }
                        next = tokio::time::timeout(options.inactivity_timeout, source.next()) => {
                            match next {
                                Ok(Some(Ok(event))) => dispatch(&registry, &event),
                                Ok(Some(Err(e))) => break e.to_string(),
                                Ok(None) => break "stream ended".to_string(),
                                Err(_) => break format!(
                                    "no events within {:?}",
                                    options.inactivity_timeout
                                ),
                            }
                        }
                    }
                };

                connected.store(false, Ordering::SeqCst);
                warn!("Event stream dropped: {}", reason);
            }
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
            }
        }

        attempts += 1;
        if attempts >= options.max_reconnect_attempts {
            error!(
                "Giving up after {} reconnect attempts; no further events will arrive",
                attempts
            );
            return;
        }

        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            options.reconnect_delay, attempts, options.max_reconnect_attempts
        );
        tokio::select! {
            _ = shutdown_rx.changed() => return,
            _ = tokio::time::sleep(options.reconnect_delay) => {}
        }
    }
}

/// Deliver one event to every callback registered for its kind.
///
/// Callbacks are cloned out of the registry first so a callback may itself
/// subscribe or unsubscribe without deadlocking. Delivery is sequential:
/// handlers run one at a time on the connection task.
fn dispatch(registry: &StdMutex<Registry>, event: &ServerEvent) {
    let callbacks: Vec<EventCallback> = registry
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&event.kind())
        .cloned()
        .unwrap_or_default();

    debug!(
        "Dispatching {:?} to {} listener(s)",
        event.kind(),
        callbacks.len()
    );
    for callback in callbacks {
        callback(event);
    }
}
