//! Socket manager and lifecycle binder tests
//!
//! Uses a scripted in-memory transport in place of the WebSocket so
//! disconnects and reconnects can be driven deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, SinkExt, StreamExt};

use deployctl::deploy::binder::DeployBinder;
use deployctl::deploy::reconciler::{DeployStatus, DeploymentState};
use deployctl::errors::ClientError;
use deployctl::models::deployment::{StepEvent, StepStatus, TerminalResult};
use deployctl::socket::events::{EventKind, ServerEvent};
use deployctl::socket::manager::{EventCallback, SocketManager, SocketOptions};
use deployctl::socket::transport::{EventSink, EventSource, Transport};

type Segment = Vec<Result<ServerEvent, ClientError>>;

/// Transport that replays one scripted segment per connection attempt.
/// Each delivered item is slightly delayed so subscriptions made right
/// after activation are always in place before the first event.
struct ScriptedTransport {
    segments: Mutex<VecDeque<Segment>>,
}

impl ScriptedTransport {
    fn new(segments: Vec<Segment>) -> Arc<Self> {
        Arc::new(Self {
            segments: Mutex::new(segments.into()),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<(EventSink, EventSource), ClientError> {
        let segment = self
            .segments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let Some(events) = segment else {
            return Err(ClientError::SocketError(
                "no more scripted connections".to_string(),
            ));
        };

        let sink: EventSink = Box::pin(
            futures::sink::drain::<deployctl::socket::events::ClientMessage>()
                .sink_map_err(|never: std::convert::Infallible| -> ClientError { match never {} }),
        );
        let source: EventSource = Box::pin(
            stream::iter(events)
                .then(|event| async move {
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    event
                })
                .chain(stream::pending()),
        );
        Ok((sink, source))
    }
}

/// Transport whose handshake never completes, as against a black-holed host
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn connect(&self) -> Result<(EventSink, EventSource), ClientError> {
        std::future::pending().await
    }
}

fn test_options() -> SocketOptions {
    SocketOptions {
        reconnect_delay: Duration::from_millis(20),
        max_reconnect_attempts: 5,
        inactivity_timeout: Duration::from_secs(60),
    }
}

fn progress(name: &str, status: StepStatus) -> Result<ServerEvent, ClientError> {
    Ok(ServerEvent::DeploymentProgress(StepEvent {
        step: name.to_string(),
        status,
        message: None,
    }))
}

fn complete(success: bool, url: Option<&str>, error: Option<&str>) -> Result<ServerEvent, ClientError> {
    Ok(ServerEvent::DeploymentComplete(TerminalResult {
        success,
        url: url.map(|s| s.to_string()),
        error: error.map(|s| s.to_string()),
        ..TerminalResult::default()
    }))
}

fn dropped() -> Result<ServerEvent, ClientError> {
    Err(ClientError::SocketError("connection dropped".to_string()))
}

async fn wait_terminal(binder: &DeployBinder) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if binder.snapshot().is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("attempt did not reach a terminal state in time");
}

async fn run_scripted(segments: Vec<Segment>) -> DeploymentState {
    let socket = Arc::new(SocketManager::new(
        ScriptedTransport::new(segments),
        test_options(),
    ));
    let mut binder = DeployBinder::new(socket.clone());
    binder.activate().await.unwrap();
    wait_terminal(&binder).await;
    let state = binder.snapshot();
    binder.deactivate();
    socket.disconnect().await;
    state
}

#[tokio::test]
async fn test_reconnect_mid_stream_matches_uninterrupted_run() {
    let interrupted = run_scripted(vec![
        vec![
            progress("Validation", StepStatus::Success),
            progress("EC2 Creation", StepStatus::InProgress),
            dropped(),
        ],
        vec![
            progress("EC2 Creation", StepStatus::Success),
            complete(true, Some("http://1.2.3.4"), None),
        ],
    ])
    .await;

    let uninterrupted = run_scripted(vec![vec![
        progress("Validation", StepStatus::Success),
        progress("EC2 Creation", StepStatus::InProgress),
        progress("EC2 Creation", StepStatus::Success),
        complete(true, Some("http://1.2.3.4"), None),
    ]])
    .await;

    assert_eq!(interrupted, uninterrupted);
    assert_eq!(interrupted.status, DeployStatus::Success);
    assert_eq!(interrupted.steps.len(), 2);
}

#[tokio::test]
async fn test_redelivered_terminal_event_is_ignored() {
    let state = run_scripted(vec![vec![
        complete(true, Some("http://1.2.3.4"), None),
        complete(false, None, Some("late duplicate")),
    ]])
    .await;

    assert_eq!(state.status, DeployStatus::Success);
    assert_eq!(
        state.result.as_ref().unwrap().url.as_deref(),
        Some("http://1.2.3.4")
    );
    assert!(state.result.as_ref().unwrap().error.is_none());
}

#[tokio::test]
async fn test_duplicate_subscribe_delivers_once() {
    let socket = SocketManager::new(
        ScriptedTransport::new(vec![vec![progress("Validation", StepStatus::Success)]]),
        test_options(),
    );

    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let callback: EventCallback = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    socket
        .subscribe(EventKind::DeploymentProgress, callback.clone())
        .await
        .unwrap();
    socket
        .subscribe(EventKind::DeploymentProgress, callback.clone())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    socket.disconnect().await;
}

#[tokio::test]
async fn test_unsubscribe_removes_only_the_given_callback() {
    let socket = SocketManager::new(
        ScriptedTransport::new(vec![vec![progress("Validation", StepStatus::Success)]]),
        test_options(),
    );

    let first_count = Arc::new(AtomicUsize::new(0));
    let counter = first_count.clone();
    let first: EventCallback = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let second_count = Arc::new(AtomicUsize::new(0));
    let counter = second_count.clone();
    let second: EventCallback = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    socket
        .subscribe(EventKind::DeploymentProgress, first.clone())
        .await
        .unwrap();
    socket
        .subscribe(EventKind::DeploymentProgress, second.clone())
        .await
        .unwrap();
    socket.unsubscribe(EventKind::DeploymentProgress, &first);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(first_count.load(Ordering::SeqCst), 0);
    assert_eq!(second_count.load(Ordering::SeqCst), 1);

    socket.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_without_connect_is_noop() {
    let socket = SocketManager::new(ScriptedTransport::new(Vec::new()), test_options());
    assert!(!socket.is_connected());
    socket.disconnect().await;
    socket.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_does_not_wait_on_a_pending_handshake() {
    let socket = SocketManager::new(Arc::new(HangingTransport), test_options());
    socket.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), socket.disconnect())
        .await
        .expect("disconnect hung while the handshake was pending");
    assert!(!socket.is_connected());
    assert!(!socket.is_active().await);
}

#[tokio::test]
async fn test_silent_connection_is_dropped_and_reconnected() {
    let options = SocketOptions {
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_attempts: 5,
        inactivity_timeout: Duration::from_millis(100),
    };
    // First segment goes silent after one event; only the replayed second
    // segment carries the terminal.
    let socket = Arc::new(SocketManager::new(
        ScriptedTransport::new(vec![
            vec![progress("Validation", StepStatus::Success)],
            vec![complete(true, Some("http://1.2.3.4"), None)],
        ]),
        options,
    ));
    let mut binder = DeployBinder::new(socket.clone());
    binder.activate().await.unwrap();
    wait_terminal(&binder).await;

    let state = binder.snapshot();
    assert_eq!(state.status, DeployStatus::Success);
    assert_eq!(state.steps.len(), 1);
    assert_eq!(
        state.result.as_ref().unwrap().url.as_deref(),
        Some("http://1.2.3.4")
    );

    binder.deactivate();
    socket.disconnect().await;
}

#[tokio::test]
async fn test_exhausted_retries_leave_manager_inactive() {
    let options = SocketOptions {
        reconnect_delay: Duration::from_millis(5),
        max_reconnect_attempts: 2,
        inactivity_timeout: Duration::from_secs(60),
    };
    let socket = SocketManager::new(ScriptedTransport::new(Vec::new()), options);
    socket.connect().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!socket.is_connected());
    assert!(!socket.is_active().await);
}

#[tokio::test]
async fn test_rearm_starts_a_fresh_attempt() {
    let socket = Arc::new(SocketManager::new(
        ScriptedTransport::new(vec![vec![
            progress("Validation", StepStatus::Success),
            complete(false, None, Some("build failed")),
        ]]),
        test_options(),
    ));
    let mut binder = DeployBinder::new(socket.clone());

    binder.activate().await.unwrap();
    wait_terminal(&binder).await;
    assert_eq!(binder.snapshot().status, DeployStatus::Failed);
    assert_eq!(binder.snapshot().steps.len(), 1);

    // Deploy again: no carry-over from the failed attempt
    binder.activate().await.unwrap();
    let state = binder.snapshot();
    assert_eq!(state.status, DeployStatus::InProgress);
    assert!(state.steps.is_empty());
    assert!(state.result.is_none());

    binder.deactivate();
    socket.disconnect().await;
}

#[tokio::test]
async fn test_failed_submission_is_an_immediate_failure() {
    let socket = Arc::new(SocketManager::new(
        ScriptedTransport::new(vec![Vec::new()]),
        test_options(),
    ));
    let mut binder = DeployBinder::new(socket.clone());

    binder.activate().await.unwrap();
    binder.fail_submission("github_url is required".to_string());

    let state = binder.snapshot();
    assert_eq!(state.status, DeployStatus::Failed);
    assert!(state.steps.is_empty());
    assert_eq!(
        state.result.as_ref().unwrap().error.as_deref(),
        Some("github_url is required")
    );

    binder.deactivate();
    socket.disconnect().await;
}
