//! Transport seam for the event stream
//!
//! The connection manager only sees a sink/stream pair of typed messages,
//! so tests can swap the WebSocket for a scripted in-memory transport.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::warn;
use url::Url;

use crate::errors::ClientError;
use crate::socket::events::{ClientMessage, ServerEvent};

/// Outbound half of one established connection
pub type EventSink = Pin<Box<dyn Sink<ClientMessage, Error = ClientError> + Send>>;

/// Inbound half of one established connection
pub type EventSource = Pin<Box<dyn Stream<Item = Result<ServerEvent, ClientError>> + Send>>;

/// A factory for event-stream connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish one connection and hand back its two halves.
    /// Called again by the manager for every reconnect attempt.
    async fn connect(&self) -> Result<(EventSink, EventSource), ClientError>;
}

/// WebSocket transport to the deployment server
pub struct WsTransport {
    url: Url,
}

impl WsTransport {
    /// Derive the stream endpoint from the backend base URL
    pub fn new(backend_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            url: build_stream_url(backend_url)?,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(EventSink, EventSource), ClientError> {
        let request = http::Request::builder()
            .uri(self.url.as_str())
            .header("User-Agent", "deployctl")
            .body(())
            .map_err(|e| ClientError::SocketError(e.to_string()))?;

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| ClientError::SocketError(e.to_string()))?;
        let (sink, stream) = ws_stream.split();

        let sink = sink
            .sink_map_err(|e| ClientError::SocketError(e.to_string()))
            .with(|msg: ClientMessage| {
                futures::future::ready(
                    serde_json::to_string(&msg)
                        .map(|text| Message::Text(text.into()))
                        .map_err(ClientError::from),
                )
            });

        let source = stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        // Unknown event types and malformed frames are
                        // skipped, never fatal.
                        warn!("Dropping unparseable event: {}", e);
                        None
                    }
                },
                Ok(Message::Close(_)) => Some(Err(ClientError::SocketError(
                    "server closed the connection".to_string(),
                ))),
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::SocketError(e.to_string()))),
            }
        });

        Ok((Box::pin(sink), Box::pin(source)))
    }
}

fn build_stream_url(backend_url: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(backend_url).map_err(|e| ClientError::ConfigError(e.to_string()))?;

    // Change http/https to ws/wss
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(ClientError::ConfigError("Invalid backend URL scheme".to_string())),
    };

    url.set_scheme(scheme)
        .map_err(|_| ClientError::ConfigError("Failed to set scheme".to_string()))?;

    // Append /ws
    url.set_path(&format!("{}/ws", url.path().trim_end_matches('/')));

    Ok(url)
}
