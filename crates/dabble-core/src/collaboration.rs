//! Session membership and draw-event relay for a local pad.
//!
//! The manager never talks to the socket itself: outgoing frames are
//! queued as JSON strings and drained by the application, incoming frames
//! are handed to [`CollaborationManager::handle_message`].

use crate::event::DrawEvent;
use crate::pad::DrawingPad;
use crate::raster::PixelCanvas;
use crate::session::SessionId;
use crate::sync::{CanvasSnapshot, ClientMessage, ServerMessage, SyncEvent};

/// Tracks the current session and pending outgoing messages.
#[derive(Debug, Default)]
pub struct CollaborationManager {
    /// Session confirmed by the relay.
    current_session: Option<SessionId>,
    /// A share or join has been requested but not yet confirmed.
    pending: bool,
    /// Upload a snapshot as soon as the pending session is confirmed.
    snapshot_on_join: bool,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl CollaborationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_session(&self) -> Option<&SessionId> {
        self.current_session.as_ref()
    }

    pub fn is_in_session(&self) -> bool {
        self.current_session.is_some()
    }

    /// Whether a share/join request is awaiting confirmation.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Ask the relay for a new session.
    ///
    /// Returns `false` and queues nothing if the drawing is already shared
    /// or a request is in flight.
    pub fn share(&mut self) -> bool {
        if self.current_session.is_some() || self.pending {
            log::debug!("Ignoring share request: already shared");
            return false;
        }
        self.pending = true;
        self.snapshot_on_join = true;
        self.queue(&ClientMessage::Share);
        true
    }

    /// Join an existing session, leaving the current one first.
    pub fn join_session(&mut self, session: SessionId) {
        if self.current_session.as_ref() == Some(&session) {
            return;
        }
        self.leave_session();
        self.pending = true;
        self.snapshot_on_join = false;
        self.queue(&ClientMessage::Join { session });
    }

    /// Leave the current session.
    pub fn leave_session(&mut self) {
        if self.current_session.take().is_some() {
            self.queue(&ClientMessage::Leave);
        }
        self.pending = false;
    }

    /// Forget session state after the connection dropped.
    pub fn reset(&mut self) {
        self.current_session = None;
        self.pending = false;
        self.snapshot_on_join = false;
        self.outgoing.clear();
    }

    /// Queue a local draw event; dropped when not in a session.
    pub fn broadcast_draw(&mut self, event: &DrawEvent) {
        if self.current_session.is_some() {
            self.queue(&ClientMessage::Data { event: *event });
        }
    }

    /// Queue a compressed copy of the canvas.
    pub fn broadcast_snapshot(&mut self, canvas: &PixelCanvas) {
        if self.current_session.is_some() {
            self.queue(&ClientMessage::Snapshot {
                snapshot: CanvasSnapshot::capture(canvas),
            });
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Handle a frame from the relay, painting remote content onto `pad`.
    pub fn handle_message(&mut self, json: &str, pad: &mut DrawingPad) -> Option<SyncEvent> {
        let msg: ServerMessage = match serde_json::from_str(json) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Dropping malformed relay message: {}", e);
                return None;
            }
        };

        match msg {
            ServerMessage::Joined {
                session,
                peer_count,
                snapshot,
                history,
            } => {
                self.current_session = Some(session.clone());
                self.pending = false;

                if let Some(snapshot) = snapshot {
                    match snapshot.restore() {
                        Ok(canvas) => pad.restore(&canvas),
                        Err(e) => log::warn!("Ignoring session snapshot: {}", e),
                    }
                }
                for event in &history {
                    pad.apply_remote(event);
                }
                log::info!(
                    "Joined session {} ({} peers, {} replayed events)",
                    session,
                    peer_count,
                    history.len()
                );

                if std::mem::take(&mut self.snapshot_on_join) && !pad.canvas().is_blank() {
                    self.broadcast_snapshot(pad.canvas());
                }

                Some(SyncEvent::JoinedSession {
                    session,
                    peer_count,
                })
            }
            ServerMessage::PeerJoined { peer_id } => Some(SyncEvent::PeerJoined { peer_id }),
            ServerMessage::PeerLeft { peer_id } => Some(SyncEvent::PeerLeft { peer_id }),
            ServerMessage::Data { from, event } => {
                pad.apply_remote(&event);
                Some(SyncEvent::DrawReceived { from, event })
            }
            ServerMessage::SnapshotRequested => {
                self.broadcast_snapshot(pad.canvas());
                Some(SyncEvent::SnapshotRequested)
            }
            ServerMessage::Error { message } => {
                if self.pending {
                    self.pending = false;
                    self.snapshot_on_join = false;
                }
                Some(SyncEvent::Error { message })
            }
        }
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{Brush, PALETTE};
    use kurbo::Point;

    fn joined(session: &str, snapshot: Option<CanvasSnapshot>, history: Vec<DrawEvent>) -> String {
        serde_json::to_string(&ServerMessage::Joined {
            session: SessionId::parse(session).unwrap(),
            peer_count: 1,
            snapshot,
            history,
        })
        .unwrap()
    }

    #[test]
    fn test_unshared_drawing_emits_nothing() {
        let mut manager = CollaborationManager::new();
        let event = DrawEvent::dot(&Brush::default(), Point::new(1.0, 1.0));
        manager.broadcast_draw(&event);
        assert!(!manager.has_outgoing());
    }

    #[test]
    fn test_share_is_sent_once() {
        let mut manager = CollaborationManager::new();
        assert!(manager.share());
        assert!(!manager.share());
        assert_eq!(manager.take_outgoing(), vec![r#"{"type":"share"}"#.to_string()]);
    }

    #[test]
    fn test_share_uploads_existing_drawing() {
        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(32, 32);
        pad.start_drawing(Point::new(16.0, 16.0));

        manager.share();
        manager.take_outgoing();

        let event = manager.handle_message(&joined("fresh", None, Vec::new()), &mut pad);
        assert!(matches!(event, Some(SyncEvent::JoinedSession { .. })));
        assert!(manager.is_in_session());

        let outgoing = manager.take_outgoing();
        assert_eq!(outgoing.len(), 1);
        let msg: ClientMessage = serde_json::from_str(&outgoing[0]).unwrap();
        assert!(matches!(msg, ClientMessage::Snapshot { .. }));

        // Re-sharing while in a session does nothing.
        assert!(!manager.share());
    }

    #[test]
    fn test_join_restores_snapshot_then_history() {
        let mut source = DrawingPad::new(40, 40);
        source.start_drawing(Point::new(10.0, 10.0));
        let snapshot = CanvasSnapshot::capture(source.canvas());

        let later = DrawEvent::dot(&Brush::new(5.0, PALETTE[3]), Point::new(30.0, 30.0));

        let mut manager = CollaborationManager::new();
        manager.join_session(SessionId::parse("abc").unwrap());
        let mut pad = DrawingPad::new(40, 40);
        manager.handle_message(&joined("abc", Some(snapshot), vec![later]), &mut pad);

        assert_eq!(pad.canvas().pixel(10, 10), Some(PALETTE[0]));
        assert_eq!(pad.canvas().pixel(30, 30), Some(PALETTE[3]));
        // Joining someone else's session does not upload our canvas.
        let outgoing = manager.take_outgoing();
        assert_eq!(outgoing.len(), 1);
        assert!(outgoing[0].contains("\"join\""));
    }

    #[test]
    fn test_oversized_join_snapshot_is_ignored() {
        let snapshot = CanvasSnapshot {
            width: u32::MAX,
            height: u32::MAX,
            data: String::new(),
        };
        let later = DrawEvent::dot(&Brush::new(5.0, PALETTE[1]), Point::new(8.0, 8.0));

        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(16, 16);
        let event = manager.handle_message(&joined("abc", Some(snapshot), vec![later]), &mut pad);

        assert!(matches!(event, Some(SyncEvent::JoinedSession { .. })));
        assert!(manager.is_in_session());
        // History after the rejected snapshot still replays.
        assert_eq!(pad.canvas().pixel(8, 8), Some(PALETTE[1]));
    }

    #[test]
    fn test_remote_data_is_painted() {
        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(50, 50);
        let event = DrawEvent::segment(&Brush::new(5.0, PALETTE[2]), Point::new(5.0, 25.0), Point::new(45.0, 25.0));
        let json = serde_json::to_string(&ServerMessage::Data {
            from: "peer".to_string(),
            event,
        })
        .unwrap();

        let result = manager.handle_message(&json, &mut pad);
        assert_eq!(
            result,
            Some(SyncEvent::DrawReceived {
                from: "peer".to_string(),
                event
            })
        );
        assert_eq!(pad.canvas().pixel(25, 25), Some(PALETTE[2]));
    }

    #[test]
    fn test_local_events_are_relayed_in_session() {
        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(10, 10);
        manager.handle_message(&joined("abc", None, Vec::new()), &mut pad);

        let event = pad.start_drawing(Point::new(2.0, 2.0));
        manager.broadcast_draw(&event);

        let outgoing = manager.take_outgoing();
        assert_eq!(outgoing.len(), 1);
        let msg: ClientMessage = serde_json::from_str(&outgoing[0]).unwrap();
        assert_eq!(msg, ClientMessage::Data { event });
    }

    #[test]
    fn test_snapshot_request_is_answered() {
        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(10, 10);
        manager.handle_message(&joined("abc", None, Vec::new()), &mut pad);

        let result = manager.handle_message(r#"{"type":"snapshot_requested"}"#, &mut pad);
        assert_eq!(result, Some(SyncEvent::SnapshotRequested));
        assert_eq!(manager.take_outgoing().len(), 1);
    }

    #[test]
    fn test_malformed_message_is_dropped() {
        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(10, 10);
        assert!(manager.handle_message("{not json", &mut pad).is_none());
        assert!(manager
            .handle_message(r#"{"type":"data","from":"x","event":{"name":"eval","args":{}}}"#, &mut pad)
            .is_none());
    }

    #[test]
    fn test_leave_and_reset() {
        let mut manager = CollaborationManager::new();
        let mut pad = DrawingPad::new(10, 10);
        manager.handle_message(&joined("abc", None, Vec::new()), &mut pad);

        manager.leave_session();
        assert!(!manager.is_in_session());
        assert_eq!(manager.take_outgoing(), vec![r#"{"type":"leave"}"#.to_string()]);

        manager.share();
        manager.reset();
        assert!(!manager.is_pending());
        assert!(!manager.has_outgoing());
    }
}
