//! Shared session state.

use crate::config::ServerConfig;
use dabble_core::event::DrawEvent;
use dabble_core::session::SessionId;
use dabble_core::sync::{CanvasSnapshot, ServerMessage};
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use tokio::sync::broadcast;

/// A message on a room channel, tagged with the sending peer.
pub type RoomMessage = (String, ServerMessage);

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<RoomMessage>,
    /// Connected peer IDs
    peers: HashSet<String>,
    /// Latest canvas uploaded by a peer
    snapshot: Option<CanvasSnapshot>,
    /// Draw events since the snapshot, oldest first
    history: VecDeque<DrawEvent>,
    /// Outstanding request for a fresh snapshot
    snapshot_request: Option<SnapshotRequest>,
}

/// A peer asked for a snapshot that has not arrived yet.
struct SnapshotRequest {
    peer: String,
    /// Events dropped from history since the request went out
    dropped: usize,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            peers: HashSet::new(),
            snapshot: None,
            history: VecDeque::new(),
            snapshot_request: None,
        }
    }
}

/// What a peer receives when it joins.
pub struct Joined {
    pub rx: broadcast::Receiver<RoomMessage>,
    pub snapshot: Option<CanvasSnapshot>,
    pub history: Vec<DrawEvent>,
    /// Peers already in the room, not counting the one joining
    pub peer_count: usize,
}

/// Shared application state
pub struct AppState {
    rooms: DashMap<SessionId, Room>,
    config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Add a peer to a room, creating the room if needed.
    pub fn join_room(&self, session: &SessionId, peer_id: &str) -> Joined {
        let capacity = self.config.channel_capacity.max(1);
        let mut room = self
            .rooms
            .entry(session.clone())
            .or_insert_with(|| Room::new(capacity));
        room.peers.insert(peer_id.to_string());
        Joined {
            rx: room.tx.subscribe(),
            snapshot: room.snapshot.clone(),
            history: room.history.iter().copied().collect(),
            peer_count: room.peers.len() - 1,
        }
    }

    /// Remove a peer; empty rooms are dropped.
    ///
    /// A snapshot request held by the leaving peer is cancelled so the next
    /// overflow asks someone still present.
    pub fn leave_room(&self, session: &SessionId, peer_id: &str) {
        self.rooms.remove_if_mut(session, |_, room| {
            room.peers.remove(peer_id);
            if room
                .snapshot_request
                .as_ref()
                .is_some_and(|req| req.peer == peer_id)
            {
                room.snapshot_request = None;
            }
            room.peers.is_empty()
        });
    }

    /// Append a draw event to the room history.
    ///
    /// Returns `true` when the history overflowed and `peer_id` should be
    /// asked for a fresh snapshot. While a request is outstanding no one else
    /// is asked, unless another full history's worth of events is dropped
    /// without a snapshot arriving.
    pub fn record_draw(&self, session: &SessionId, peer_id: &str, event: DrawEvent) -> bool {
        let Some(mut room) = self.rooms.get_mut(session) else {
            return false;
        };
        let limit = self.config.history_limit.max(1);
        room.history.push_back(event);
        let mut dropped = 0;
        while room.history.len() > limit {
            room.history.pop_front();
            dropped += 1;
        }
        if dropped == 0 {
            return false;
        }
        if let Some(req) = room.snapshot_request.as_mut() {
            if req.dropped + dropped <= limit {
                req.dropped += dropped;
                return false;
            }
        }
        room.snapshot_request = Some(SnapshotRequest {
            peer: peer_id.to_string(),
            dropped: 0,
        });
        true
    }

    /// Replace the room snapshot and clear the history it covers.
    pub fn store_snapshot(&self, session: &SessionId, snapshot: CanvasSnapshot) {
        if let Some(mut room) = self.rooms.get_mut(session) {
            room.snapshot = Some(snapshot);
            room.history.clear();
            room.snapshot_request = None;
        }
    }

    /// Broadcast message to room
    pub fn broadcast(&self, session: &SessionId, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(session) {
            // No receivers is fine
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, session: &SessionId) -> usize {
        self.rooms.get(session).map_or(0, |room| room.peers.len())
    }
}
