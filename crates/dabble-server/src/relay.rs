//! Per-connection relay loop.

use crate::rooms::{AppState, RoomMessage};
use axum::extract::ws::{Message, WebSocket};
use dabble_core::session::SessionId;
use dabble_core::sync::{ClientMessage, ServerMessage};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = SplitSink<WebSocket, Message>;

fn error_message(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

/// One connected client and the room it is in.
struct Peer {
    id: String,
    state: Arc<AppState>,
    session: Option<SessionId>,
    rx: Option<broadcast::Receiver<RoomMessage>>,
}

impl Peer {
    fn new(state: Arc<AppState>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state,
            session: None,
            rx: None,
        }
    }

    /// Join a room, leaving the current one first.
    ///
    /// Joining the room the peer is already in only resends its state.
    fn join(&mut self, session: SessionId) -> ServerMessage {
        let rejoin = self.session.as_ref() == Some(&session);
        if !rejoin {
            self.leave();
        }

        let joined = self.state.join_room(&session, &self.id);
        if !rejoin {
            self.state.broadcast(
                &session,
                &self.id,
                ServerMessage::PeerJoined {
                    peer_id: self.id.clone(),
                },
            );
        }
        info!(
            "Peer {} joined session {} ({} others, {} events replayed)",
            self.id,
            session,
            joined.peer_count,
            joined.history.len()
        );

        self.rx = Some(joined.rx);
        self.session = Some(session.clone());
        ServerMessage::Joined {
            session,
            peer_count: joined.peer_count,
            snapshot: joined.snapshot,
            history: joined.history,
        }
    }

    fn leave(&mut self) {
        if let Some(session) = self.session.take() {
            self.state.leave_room(&session, &self.id);
            self.state.broadcast(
                &session,
                &self.id,
                ServerMessage::PeerLeft {
                    peer_id: self.id.clone(),
                },
            );
            info!("Peer {} left session {}", self.id, session);
        }
        self.rx = None;
    }

    /// Handle a text frame, returning the reply for this peer if any.
    fn handle_text(&mut self, text: &str) -> Option<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle_client_message(msg),
            Err(e) => {
                warn!("Invalid message from {}: {}", self.id, e);
                Some(error_message(format!("Invalid message: {}", e)))
            }
        }
    }

    fn handle_client_message(&mut self, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Join { session } => Some(self.join(session)),
            ClientMessage::Share => {
                let session = SessionId::generate();
                info!("Peer {} shared a new session {}", self.id, session);
                Some(self.join(session))
            }
            ClientMessage::Leave => {
                self.leave();
                None
            }
            ClientMessage::Data { event } => {
                let Some(session) = &self.session else {
                    return Some(error_message("Not in a session"));
                };
                if !event.is_finite() {
                    return Some(error_message("Draw event has non-finite coordinates"));
                }
                self.state.broadcast(
                    session,
                    &self.id,
                    ServerMessage::Data {
                        from: self.id.clone(),
                        event,
                    },
                );
                if self.state.record_draw(session, &self.id, event) {
                    debug!("History full in {}, asking {} for a snapshot", session, self.id);
                    Some(ServerMessage::SnapshotRequested)
                } else {
                    None
                }
            }
            ClientMessage::Snapshot { snapshot } => {
                let Some(session) = &self.session else {
                    return Some(error_message("Not in a session"));
                };
                if let Err(e) = snapshot.byte_len() {
                    warn!("Rejected snapshot from {}: {}", self.id, e);
                    return Some(error_message(format!("Invalid snapshot: {}", e)));
                }
                debug!(
                    "Peer {} uploaded a {}x{} snapshot to {}",
                    self.id, snapshot.width, snapshot.height, session
                );
                self.state.store_snapshot(session, snapshot);
                None
            }
        }
    }
}

/// Wait for the next room message; never resolves outside a room.
async fn next_room_message(
    rx: &mut Option<broadcast::Receiver<RoomMessage>>,
) -> Option<RoomMessage> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Slow peer skipped {} room messages", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Send a message, returning `false` once the socket is gone.
async fn send(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to encode message: {}", e);
            true
        }
    }
}

/// Handle a WebSocket connection, optionally joining `initial` right away.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, initial: Option<SessionId>) {
    let mut peer = Peer::new(state);
    info!("New connection: {}", peer.id);

    let (mut sender, mut receiver) = socket.split();

    let mut open = true;
    if let Some(session) = initial {
        let joined = peer.join(session);
        open = send(&mut sender, &joined).await;
    }

    while open {
        tokio::select! {
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => peer.handle_text(&text),
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Binary frame from {}", peer.id);
                        Some(error_message("Binary frames are not supported"))
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None, // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer.id, e);
                        break;
                    }
                };
                if let Some(reply) = reply {
                    open = send(&mut sender, &reply).await;
                }
            }

            msg = next_room_message(&mut peer.rx) => {
                match msg {
                    // Don't echo back to sender
                    Some((from, server_msg)) if from != peer.id => {
                        open = send(&mut sender, &server_msg).await;
                    }
                    Some(_) => {}
                    None => peer.rx = None,
                }
            }
        }
    }

    // Cleanup on disconnect
    peer.leave();
    info!("Connection closed: {}", peer.id);
}
