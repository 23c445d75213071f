//! WebSocket client for a bridge sidecar.
//!
//! [`RemoteEndpoint`] implements [`ChatEndpoint`] against a bridge
//! process that owns the actual network session. One WebSocket carries
//! both directions: the bridge pushes link events, we push commands and
//! await their `command_result` frames by correlation id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::endpoint::{Attachment, ChatEndpoint, EndpointError, EndpointEvent};
use crate::wire::{parse_message, AttachmentRef, BridgeCommand, BridgeMessage, CommandResultData};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = HashMap<String, oneshot::Sender<CommandResultData>>;

/// Buffer for endpoint events towards the session coordinator.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long to wait for a `command_result` before giving up.
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Production [`ChatEndpoint`] backed by a bridge sidecar over WebSocket.
pub struct RemoteEndpoint {
    ws_url: String,
    rpc_timeout: Duration,
    events_tx: mpsc::Sender<EndpointEvent>,
    writer: Arc<Mutex<Option<WsSink>>>,
    pending: Arc<Mutex<PendingMap>>,
}

impl RemoteEndpoint {
    /// Create the endpoint and hand back its event stream.
    ///
    /// No connection is made yet; the session coordinator drives that via
    /// [`ChatEndpoint::connect`].
    pub fn new(ws_url: impl Into<String>) -> (Arc<Self>, mpsc::Receiver<EndpointEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let endpoint = Arc::new(Self {
            ws_url: ws_url.into(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            events_tx,
            writer: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        });
        (endpoint, events_rx)
    }

    /// Issue one command and await its `command_result`.
    async fn command(&self, id: String, command: BridgeCommand) -> Result<CommandResultData, EndpointError> {
        let frame = serde_json::to_string(&command)
            .map_err(|e| EndpointError::Connection(format!("Failed to encode command: {e}")))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        {
            let mut writer = self.writer.lock().await;
            let Some(sink) = writer.as_mut() else {
                self.pending.lock().await.remove(&id);
                return Err(EndpointError::NotConnected);
            };
            if let Err(e) = sink.send(Message::Text(frame)).await {
                self.pending.lock().await.remove(&id);
                return Err(EndpointError::Connection(e.to_string()));
            }
        }

        match tokio::time::timeout(self.rpc_timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            // The reader dropped the sender: connection went away mid-call.
            Ok(Err(_)) => Err(EndpointError::NotConnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(EndpointError::Timeout)
            }
        }
    }
}

#[async_trait]
impl ChatEndpoint for RemoteEndpoint {
    /// Connect to the bridge and start the reader task.
    ///
    /// A no-op when a connection is already live.
    async fn connect(&self) -> Result<(), EndpointError> {
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            return Ok(());
        }

        let (ws_stream, _response) = connect_async(&self.ws_url).await.map_err(|e| {
            EndpointError::Connection(format!("Failed to connect to bridge at {}: {e}", self.ws_url))
        })?;
        tracing::info!(url = %self.ws_url, "Connected to bridge");

        let (sink, stream) = ws_stream.split();
        *writer = Some(sink);
        drop(writer);

        tokio::spawn(read_loop(
            stream,
            self.events_tx.clone(),
            Arc::clone(&self.pending),
            Arc::clone(&self.writer),
        ));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EndpointError> {
        let mut writer = self.writer.lock().await;
        let Some(mut sink) = writer.take() else {
            return Ok(());
        };
        drop(writer);

        // Tell the bridge to invalidate the link, then close our side.
        let frame = serde_json::to_string(&BridgeCommand::Disconnect)
            .map_err(|e| EndpointError::Connection(format!("Failed to encode command: {e}")))?;
        if let Err(e) = sink.send(Message::Text(frame)).await {
            tracing::debug!(error = %e, "Disconnect frame not delivered");
        }
        let _ = sink.close().await;
        Ok(())
    }

    async fn send(
        &self,
        address: &str,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), EndpointError> {
        let id = uuid::Uuid::new_v4().to_string();
        let command = BridgeCommand::Send {
            id: id.clone(),
            address: address.to_string(),
            message: message.to_string(),
            attachment: attachment.map(|a| AttachmentRef {
                path: a.path.display().to_string(),
                file_name: a.file_name.clone(),
                mime_type: a.mime_type.clone(),
            }),
        };

        let result = self.command(id, command).await?;
        if result.ok {
            Ok(())
        } else {
            Err(EndpointError::Send(
                result.error.unwrap_or_else(|| "delivery failed".to_string()),
            ))
        }
    }

    async fn is_reachable(&self, address: &str) -> Result<bool, EndpointError> {
        let id = uuid::Uuid::new_v4().to_string();
        let command = BridgeCommand::IsReachable {
            id: id.clone(),
            address: address.to_string(),
        };

        let result = self.command(id, command).await?;
        if result.ok {
            Ok(result.reachable.unwrap_or(false))
        } else {
            Err(EndpointError::Send(
                result.error.unwrap_or_else(|| "reachability probe failed".to_string()),
            ))
        }
    }
}

/// Read frames until the socket drops, forwarding link events and
/// resolving pending commands.
async fn read_loop(
    mut stream: WsSource,
    events_tx: mpsc::Sender<EndpointEvent>,
    pending: Arc<Mutex<PendingMap>>,
    writer: Arc<Mutex<Option<WsSink>>>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_frame(&text, &events_tx, &pending).await;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Bridge WebSocket closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Bridge WebSocket receive error");
                break;
            }
        }
    }

    // Connection gone: drop the sink, fail in-flight commands, and make
    // sure the coordinator hears about it even if the bridge never said
    // goodbye. (A duplicate disconnected event is ignored by the state
    // machine.)
    writer.lock().await.take();
    pending.lock().await.clear();
    let _ = events_tx
        .send(EndpointEvent::Disconnected {
            reason: "bridge connection lost".to_string(),
        })
        .await;
}

/// Dispatch one parsed text frame.
async fn handle_frame(
    text: &str,
    events_tx: &mpsc::Sender<EndpointEvent>,
    pending: &Arc<Mutex<PendingMap>>,
) {
    let message = match parse_message(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, raw_frame = %text, "Failed to parse bridge frame");
            return;
        }
    };

    let event = match message {
        BridgeMessage::CommandResult(result) => {
            if let Some(tx) = pending.lock().await.remove(&result.id) {
                let _ = tx.send(result);
            } else {
                tracing::warn!(id = %result.id, "Command result with no pending command");
            }
            return;
        }
        BridgeMessage::LinkRequestIssued(data) => EndpointEvent::LinkRequestIssued {
            token: data.token,
        },
        BridgeMessage::Authenticated => EndpointEvent::Authenticated,
        BridgeMessage::Ready => EndpointEvent::Ready,
        BridgeMessage::Disconnected(data) => EndpointEvent::Disconnected {
            reason: data.reason.unwrap_or_else(|| "disconnected".to_string()),
        },
        BridgeMessage::AuthFailure(data) => EndpointEvent::AuthFailure {
            reason: data.reason.unwrap_or_else(|| "auth failure".to_string()),
        },
    };

    if events_tx.send(event).await.is_err() {
        tracing::warn!("Endpoint event receiver dropped");
    }
}
