//! Wire protocol and WebSocket client for shared sessions.
//!
//! Messages are JSON text frames tagged by `type`:
//!
//! ```json
//! { "type": "join", "session": "3f2a..." }
//! { "type": "data", "event": { "name": "keepDrawingDot", "args": { ... } } }
//! { "type": "snapshot", "snapshot": { "width": 800, "height": 600, "data": "<base64 rle>" } }
//! ```

use crate::compression::{self, CompressionError};
use crate::event::DrawEvent;
use crate::raster::{MAX_DIMENSION, PixelCanvas, RasterError};
use crate::session::SessionId;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join an existing session
    Join { session: SessionId },
    /// Leave the current session
    Leave,
    /// Ask the relay for a new session and join it
    Share,
    /// A draw event to relay to the other participants
    Data { event: DrawEvent },
    /// Full canvas content for participants who join later
    Snapshot { snapshot: CanvasSnapshot },
}

/// Messages received from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms a join, with what the session already holds
    Joined {
        session: SessionId,
        peer_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<CanvasSnapshot>,
        /// Draw events since the snapshot, oldest first
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        history: Vec<DrawEvent>,
    },
    /// Another participant joined
    PeerJoined { peer_id: String },
    /// Another participant left
    PeerLeft { peer_id: String },
    /// A draw event from another participant
    Data { from: String, event: DrawEvent },
    /// The relay wants a fresh snapshot of this client's canvas
    SnapshotRequested,
    /// Error message
    Error { message: String },
}

/// Snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("snapshot payload is corrupt: {0}")]
    Compression(#[from] CompressionError),
    #[error("snapshot does not match its dimensions: {0}")]
    Raster(#[from] RasterError),
    #[error("snapshot dimensions {width}x{height} are out of range")]
    InvalidDimensions { width: u32, height: u32 },
}

/// A compressed copy of a canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub width: u32,
    pub height: u32,
    /// Base64 of the run-length compressed RGBA buffer.
    pub data: String,
}

impl CanvasSnapshot {
    /// Compress and encode a canvas.
    pub fn capture(canvas: &PixelCanvas) -> Self {
        let packed = compression::compress(canvas.data());
        log::debug!(
            "Captured {}x{} snapshot: {} -> {} bytes ({:.1}%)",
            canvas.width(),
            canvas.height(),
            canvas.data().len(),
            packed.len(),
            compression::ratio(canvas.data().len(), packed.len()) * 100.0
        );
        Self {
            width: canvas.width(),
            height: canvas.height(),
            data: BASE64.encode(packed),
        }
    }

    /// Size of the decoded RGBA buffer.
    ///
    /// Fails without touching the payload when a dimension is zero or
    /// above [`MAX_DIMENSION`].
    pub fn byte_len(&self) -> Result<usize, SnapshotError> {
        let invalid = SnapshotError::InvalidDimensions {
            width: self.width,
            height: self.height,
        };
        if !(1..=MAX_DIMENSION).contains(&self.width) || !(1..=MAX_DIMENSION).contains(&self.height)
        {
            return Err(invalid);
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(invalid)
    }

    /// Decode back into a canvas.
    pub fn restore(&self) -> Result<PixelCanvas, SnapshotError> {
        let expected = self.byte_len()?;
        let packed = BASE64.decode(&self.data)?;
        let data = compression::uncompress_with_limit(&packed, expected)?;
        Ok(PixelCanvas::from_rgba(self.width, self.height, data)?)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to the relay
    Connected,
    /// Disconnected from the relay
    Disconnected,
    /// Joined a session
    JoinedSession { session: SessionId, peer_count: usize },
    /// Another participant joined
    PeerJoined { peer_id: String },
    /// Another participant left
    PeerLeft { peer_id: String },
    /// A remote draw event was painted
    DrawReceived { from: String, event: DrawEvent },
    /// The relay asked for a snapshot
    SnapshotRequested,
    /// Error occurred
    Error { message: String },
}

/// Client transport errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid WebSocket URL scheme: {0}")]
    InvalidScheme(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// Parse a relay URL, accepting only `ws://` and `wss://`.
pub fn validate_url(url: &str) -> Result<url::Url, SyncError> {
    let parsed = url::Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(SyncError::InvalidScheme(other.to_string())),
    }
}

/// Leading `max` characters of a frame, for logs.
fn preview(msg: &str, max: usize) -> &str {
    match msg.char_indices().nth(max) {
        Some((end, _)) => &msg[..end],
        None => msg,
    }
}

mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Raw frames and connection changes from the socket thread.
    ///
    /// Text frames are handed over unparsed; interpreting them needs the
    /// drawing pad, which lives on the UI thread.
    #[derive(Debug, Clone, PartialEq)]
    pub enum SocketEvent {
        Opened,
        Closed,
        Text(String),
        Failed(String),
    }

    /// WebSocket client running a blocking socket on a background thread.
    pub struct NativeWebSocket {
        state: ConnectionState,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SocketEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to the relay.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }
            let url = validate_url(url)?.to_string();

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SocketEvent>();

            let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the relay.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Queue a text frame.
        pub fn send(&self, msg: &str) -> Result<(), SyncError> {
            let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotConnected)?;
            tx.send(WsCommand::Send(msg.to_string()))
                .map_err(|e| SyncError::Send(e.to_string()))
        }

        /// Drain pending socket events without blocking.
        pub fn poll_events(&mut self) -> Vec<SocketEvent> {
            let mut events = Vec::new();
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SocketEvent::Opened => self.state = ConnectionState::Connected,
                        SocketEvent::Closed => self.state = ConnectionState::Disconnected,
                        SocketEvent::Failed(_) => self.state = ConnectionState::Error,
                        SocketEvent::Text(_) => {}
                    }
                    events.push(event);
                }
            }
            events
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SocketEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let (mut socket, response) = match connect(url.as_str()) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(SocketEvent::Failed(format!("Connection failed: {}", e)));
                return;
            }
        };
        log::info!("WebSocket connected, status: {}", response.status());
        let _ = event_tx.send(SocketEvent::Opened);

        // Short read timeout so outgoing commands are serviced between reads.
        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(20)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }

        loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(msg)) => {
                        log::trace!("WebSocket sending: {}", preview(&msg, 100));
                        if let Err(e) = socket.send(Message::Text(msg)) {
                            log::error!("WebSocket send error: {}", e);
                            let _ = event_tx.send(SocketEvent::Closed);
                            return;
                        }
                    }
                    Ok(WsCommand::Close) => {
                        log::info!("WebSocket close requested");
                        let _ = socket.close(None);
                        let _ = event_tx.send(SocketEvent::Closed);
                        return;
                    }
                    Err(TryRecvError::Disconnected) => {
                        log::info!("WebSocket command channel disconnected");
                        let _ = socket.close(None);
                        return;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    if event_tx.send(SocketEvent::Text(txt)).is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                Ok(_) => {} // pings are answered by tungstenite on the next write/flush
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // Flush any queued pong before the next read.
                    let _ = socket.flush();
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(SocketEvent::Closed);
    }
}

pub use native_client::{NativeWebSocket, SocketEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{Brush, PALETTE};
    use kurbo::Point;

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Join {
            session: SessionId::parse("room-1").unwrap(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"join","session":"room-1"}"#);

        let share = serde_json::to_string(&ClientMessage::Share).unwrap();
        assert_eq!(share, r#"{"type":"share"}"#);
    }

    #[test]
    fn test_data_message_nests_draw_event() {
        let event = DrawEvent::dot(&Brush::new(9.0, PALETTE[1]), Point::new(1.0, 2.0));
        let value = serde_json::to_value(ClientMessage::Data { event }).unwrap();
        assert_eq!(value["type"], "data");
        assert_eq!(value["event"]["name"], "drawDot");
        assert_eq!(value["event"]["args"]["brushSize"], 9.0);
    }

    #[test]
    fn test_server_message_deserialize() {
        let json = r#"{"type":"joined","session":"abc","peer_count":2}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::Joined {
                session,
                peer_count,
                snapshot,
                history,
            } => {
                assert_eq!(session.as_str(), "abc");
                assert_eq!(peer_count, 2);
                assert!(snapshot.is_none());
                assert!(history.is_empty());
            }
            _ => panic!("Wrong message type"),
        }

        let requested: ServerMessage =
            serde_json::from_str(r#"{"type":"snapshot_requested"}"#).unwrap();
        assert_eq!(requested, ServerMessage::SnapshotRequested);
    }

    #[test]
    fn test_invalid_session_in_message_is_rejected() {
        let json = r#"{"type":"join","session":"../../x"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_snapshot_capture_restore() {
        let mut canvas = PixelCanvas::new(64, 48);
        canvas.fill_dab(Point::new(20.0, 20.0), 6.0, PALETTE[0]);

        let snapshot = CanvasSnapshot::capture(&canvas);
        assert_eq!((snapshot.width, snapshot.height), (64, 48));
        assert!(snapshot.data.len() < canvas.data().len());

        let restored = snapshot.restore().unwrap();
        assert_eq!(restored.data(), canvas.data());
    }

    #[test]
    fn test_snapshot_rejects_wrong_dimensions() {
        let mut snapshot = CanvasSnapshot::capture(&PixelCanvas::new(8, 8));
        snapshot.height = 4;
        assert!(matches!(
            snapshot.restore(),
            Err(SnapshotError::Compression(CompressionError::LimitExceeded { .. }))
        ));

        snapshot.height = 16;
        assert!(matches!(snapshot.restore(), Err(SnapshotError::Raster(_))));
    }

    #[test]
    fn test_snapshot_dimensions_checked_before_decoding() {
        let huge = CanvasSnapshot {
            width: u32::MAX,
            height: u32::MAX,
            data: String::new(),
        };
        assert!(matches!(
            huge.restore(),
            Err(SnapshotError::InvalidDimensions { .. })
        ));

        // Valid payload, but too wide: rejected before decompression.
        let mut wide = CanvasSnapshot::capture(&PixelCanvas::new(100, 1));
        wide.width = MAX_DIMENSION + 1;
        assert!(matches!(
            wide.byte_len(),
            Err(SnapshotError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            wide.restore(),
            Err(SnapshotError::InvalidDimensions { .. })
        ));

        let empty = CanvasSnapshot {
            width: 0,
            height: 10,
            data: String::new(),
        };
        assert!(empty.byte_len().is_err());

        let ok = CanvasSnapshot {
            width: 3,
            height: 2,
            data: String::new(),
        };
        assert_eq!(ok.byte_len().unwrap(), 24);
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("abcdef", 3), "abc");
        let text = "é".repeat(150);
        assert_eq!(preview(&text, 100).chars().count(), 100);
    }

    #[test]
    fn test_snapshot_rejects_bad_base64() {
        let snapshot = CanvasSnapshot {
            width: 1,
            height: 1,
            data: "not base64!".to_string(),
        };
        assert!(matches!(snapshot.restore(), Err(SnapshotError::Base64(_))));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("ws://localhost:3030/ws").is_ok());
        assert!(validate_url("wss://example.com/ws").is_ok());
        assert!(matches!(
            validate_url("http://localhost:3030"),
            Err(SyncError::InvalidScheme(_))
        ));
        assert!(matches!(validate_url("not a url"), Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn test_send_without_connection() {
        let ws = NativeWebSocket::new();
        assert!(matches!(ws.send("{}"), Err(SyncError::NotConnected)));
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }
}
