//! Execution monitoring over the server's event stream
//!
//! The server pushes JSON events to a per-client WebSocket. A job is done
//! once a progress event names no active node after at least one event
//! named one. An error event fails the job.

use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::models::CorrelationId;
use crate::{Result, VidBenchError};

/// Live WebSocket connection to the server's event endpoint
pub type EventSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Message used when the server omits `exception_message`
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// A structured event relevant to job completion
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// `executing`: the node now running, or `None` when execution stopped
    Progress { node: Option<String> },
    /// `execution_error`
    Error { message: String },
    /// Any other event type (queue status, previews, cache hits)
    Other { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a text frame into an event
pub fn parse_event(text: &str) -> Result<EngineEvent> {
    let raw: RawEvent = serde_json::from_str(text)
        .map_err(|e| VidBenchError::ProtocolError(format!("Malformed event: {}", e)))?;

    let event = match raw.kind.as_str() {
        "executing" => EngineEvent::Progress {
            node: raw
                .data
                .get("node")
                .and_then(|n| n.as_str())
                .map(str::to_string),
        },
        "execution_error" => EngineEvent::Error {
            message: raw
                .data
                .get("exception_message")
                .and_then(|m| m.as_str())
                .unwrap_or(UNKNOWN_ERROR)
                .to_string(),
        },
        _ => EngineEvent::Other { kind: raw.kind },
    };

    Ok(event)
}

/// Monitor state for one job
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorState {
    Idle,
    Executing { node: String },
    Completed { elapsed: Duration },
    Failed { message: String },
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitorState::Completed { .. } | MonitorState::Failed { .. }
        )
    }
}

/// Progress notification for a running job
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub correlation_id: CorrelationId,
    /// Node currently executing, `None` once the job is finished
    pub active_node: Option<String>,
    /// Time since the event stream was opened
    pub elapsed: Duration,
}

/// Terminal-state detector for a single job's event stream
#[derive(Debug)]
pub struct ExecutionMonitor {
    correlation_id: CorrelationId,
    state: MonitorState,
    started: Instant,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ExecutionMonitor {
    /// Create a monitor; elapsed time is measured from this call
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            state: MonitorState::Idle,
            started: Instant::now(),
            progress_tx: None,
        }
    }

    /// Forward progress notifications to `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Apply one event to the state machine
    ///
    /// Terminal states absorb every later event.
    pub fn observe(&mut self, event: &EngineEvent) -> &MonitorState {
        if self.state.is_terminal() {
            return &self.state;
        }

        let next = match (&self.state, event) {
            (_, EngineEvent::Error { message }) => Some(MonitorState::Failed {
                message: message.clone(),
            }),
            (_, EngineEvent::Progress { node: Some(node) }) => Some(MonitorState::Executing {
                node: node.clone(),
            }),
            (MonitorState::Executing { .. }, EngineEvent::Progress { node: None }) => {
                Some(MonitorState::Completed {
                    elapsed: self.started.elapsed(),
                })
            }
            // A null node before anything ran is a queue-level notice
            (_, EngineEvent::Progress { node: None }) => None,
            (_, EngineEvent::Other { .. }) => None,
        };

        if let Some(next) = next {
            self.state = next;
            self.notify();
        }

        &self.state
    }

    fn notify(&self) {
        let Some(tx) = &self.progress_tx else {
            return;
        };
        let active_node = match &self.state {
            MonitorState::Executing { node } => Some(node.clone()),
            _ => None,
        };
        // Progress display is best effort; a full or closed channel is ignored
        let _ = tx.try_send(ProgressUpdate {
            correlation_id: self.correlation_id,
            active_node,
            elapsed: self.started.elapsed(),
        });
    }

    /// Consume events until a terminal state and return the elapsed time
    ///
    /// Malformed frames are skipped. Transport errors and a stream that ends
    /// early fail the job.
    pub async fn wait<S>(&mut self, mut events: S) -> Result<Duration>
    where
        S: Stream<Item = Result<EngineEvent>> + Unpin,
    {
        let correlation_id = self.correlation_id;
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(VidBenchError::ProtocolError(msg)) => {
                    warn!(correlation_id = %correlation_id, "skipping event: {}", msg);
                    continue;
                }
                Err(err) => return Err(err),
            };

            match self.observe(&event) {
                MonitorState::Completed { elapsed } => return Ok(*elapsed),
                MonitorState::Failed { message } => {
                    return Err(VidBenchError::ExecutionFailed(message.clone()))
                }
                MonitorState::Executing { node } => {
                    debug!(correlation_id = %correlation_id, node = %node, "executing");
                }
                MonitorState::Idle => {}
            }
        }

        Err(VidBenchError::ExecutionFailed(
            "event stream closed before completion".to_string(),
        ))
    }
}

/// Event stream URL for a server base URL: `ws(s)://host/ws?clientId=<id>`
pub fn event_stream_url(server: &str, correlation_id: CorrelationId) -> Result<Url> {
    let mut url = Url::parse(server)
        .map_err(|e| VidBenchError::ConfigError(format!("Invalid server URL '{}': {}", server, e)))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(VidBenchError::ConfigError(format!(
                "Unsupported server URL scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| VidBenchError::ConfigError(format!("Cannot derive event URL from {}", server)))?;

    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/ws", base_path));
    url.set_query(Some(&format!("clientId={}", correlation_id)));
    Ok(url)
}

/// Open the event stream for `correlation_id`
pub async fn connect_events(server: &str, correlation_id: CorrelationId) -> Result<EventSocket> {
    let url = event_stream_url(server, correlation_id)?;
    let (socket, _response) = connect_async(url.as_str()).await?;
    debug!(url = %url, "event stream opened");
    Ok(socket)
}

/// Map a raw WebSocket frame to an event; non-text frames carry nothing
fn frame_to_event(
    frame: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<EngineEvent>> {
    match frame {
        Ok(Message::Text(text)) => Some(parse_event(&text)),
        Ok(_) => None,
        Err(err) => Some(Err(err.into())),
    }
}

/// Adapt a WebSocket into a stream of engine events
pub fn socket_events<S>(socket: S) -> impl Stream<Item = Result<EngineEvent>> + Unpin
where
    S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    socket.filter_map(|frame| futures::future::ready(frame_to_event(frame)))
}

/// Wait for a job over an open socket, then close the socket
pub async fn monitor_socket(mut socket: EventSocket, monitor: &mut ExecutionMonitor) -> Result<Duration> {
    let outcome = monitor.wait(socket_events(&mut socket)).await;
    if let Err(err) = socket.close(None).await {
        debug!("event stream close: {}", err);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn progress(node: Option<&str>) -> Result<EngineEvent> {
        Ok(EngineEvent::Progress {
            node: node.map(str::to_string),
        })
    }

    #[test]
    fn test_parse_executing_event() {
        assert_eq!(
            parse_event(r#"{"type":"executing","data":{"node":"7","prompt_id":"p"}}"#).unwrap(),
            EngineEvent::Progress { node: Some("7".to_string()) }
        );
        assert_eq!(
            parse_event(r#"{"type":"executing","data":{"node":null}}"#).unwrap(),
            EngineEvent::Progress { node: None }
        );
    }

    #[test]
    fn test_parse_error_event() {
        assert_eq!(
            parse_event(r#"{"type":"execution_error","data":{"exception_message":"OOM"}}"#)
                .unwrap(),
            EngineEvent::Error { message: "OOM".to_string() }
        );
        assert_eq!(
            parse_event(r#"{"type":"execution_error","data":{}}"#).unwrap(),
            EngineEvent::Error { message: UNKNOWN_ERROR.to_string() }
        );
    }

    #[test]
    fn test_parse_other_and_malformed() {
        assert_eq!(
            parse_event(r#"{"type":"status","data":{"status":{}}}"#).unwrap(),
            EngineEvent::Other { kind: "status".to_string() }
        );
        assert!(matches!(
            parse_event("not json"),
            Err(VidBenchError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_null_node_while_idle_is_not_completion() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        let state = monitor.observe(&EngineEvent::Progress { node: None });
        assert_eq!(state, &MonitorState::Idle);
    }

    #[test]
    fn test_terminal_state_absorbs_events() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        monitor.observe(&EngineEvent::Error { message: "boom".to_string() });
        monitor.observe(&EngineEvent::Progress { node: Some("3".to_string()) });
        assert_eq!(
            monitor.state(),
            &MonitorState::Failed { message: "boom".to_string() }
        );
    }

    #[tokio::test]
    async fn test_null_event_alone_never_completes() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        let err = monitor
            .wait(stream::iter(vec![progress(None)]))
            .await
            .unwrap_err();
        assert!(matches!(err, VidBenchError::ExecutionFailed(ref m) if m.contains("closed")));
    }

    #[tokio::test]
    async fn test_progress_then_null_completes() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        let events = vec![
            progress(None),
            Ok(EngineEvent::Other { kind: "status".to_string() }),
            progress(Some("7")),
            progress(Some("10")),
            progress(None),
            progress(Some("never seen")),
        ];
        let elapsed = monitor.wait(stream::iter(events)).await.unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert!(matches!(monitor.state(), MonitorState::Completed { .. }));
    }

    #[tokio::test]
    async fn test_error_event_fails_job() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        let events = vec![
            progress(Some("7")),
            Ok(EngineEvent::Error { message: "CUDA out of memory".to_string() }),
        ];
        let err = monitor.wait(stream::iter(events)).await.unwrap_err();
        assert!(matches!(err, VidBenchError::ExecutionFailed(ref m) if m == "CUDA out of memory"));
    }

    #[tokio::test]
    async fn test_malformed_frames_are_skipped() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        let events = vec![
            progress(Some("7")),
            Err(VidBenchError::ProtocolError("bad frame".to_string())),
            progress(None),
        ];
        assert!(monitor.wait(stream::iter(events)).await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_error_fails_job() {
        let mut monitor = ExecutionMonitor::new(CorrelationId::new());
        let events = vec![
            progress(Some("7")),
            Err(VidBenchError::ConnectivityError("reset".to_string())),
        ];
        let err = monitor.wait(stream::iter(events)).await.unwrap_err();
        assert!(matches!(err, VidBenchError::ConnectivityError(_)));
    }

    #[tokio::test]
    async fn test_progress_updates_forwarded() {
        let (tx, mut rx) = mpsc::channel(16);
        let id = CorrelationId::new();
        let mut monitor = ExecutionMonitor::new(id).with_progress(tx);
        let events = vec![progress(Some("1")), progress(Some("10")), progress(None)];
        monitor.wait(stream::iter(events)).await.unwrap();
        drop(monitor);

        let mut nodes = Vec::new();
        while let Some(update) = rx.recv().await {
            assert_eq!(update.correlation_id, id);
            nodes.push(update.active_node);
        }
        assert_eq!(
            nodes,
            vec![Some("1".to_string()), Some("10".to_string()), None]
        );
    }

    #[test]
    fn test_frame_mapping() {
        assert!(frame_to_event(Ok(Message::Binary(vec![1, 2, 3]))).is_none());
        assert!(frame_to_event(Ok(Message::Ping(vec![]))).is_none());
        assert!(matches!(
            frame_to_event(Ok(Message::Text(r#"{"type":"executing","data":{"node":"5"}}"#.to_string()))),
            Some(Ok(EngineEvent::Progress { .. }))
        ));
    }

    #[test]
    fn test_event_stream_url() {
        let id = CorrelationId::new();
        let url = event_stream_url("http://localhost:8188", id).unwrap();
        assert_eq!(url.as_str(), format!("ws://localhost:8188/ws?clientId={}", id));

        let url = event_stream_url("https://gpu.example.com/comfy/", id).unwrap();
        assert_eq!(
            url.as_str(),
            format!("wss://gpu.example.com/comfy/ws?clientId={}", id)
        );
    }
}
