//! Relay engine
//!
//! In-memory registry of open connections plus the fan-out routine that
//! forwards every inbound frame to all other members of the group.
//!
//! Concurrency and usage notes:
//! - The API is synchronous and meant to be held behind a lock
//!   (`Arc<Mutex<Relay>>`) by the transport layer. Delivery only pushes
//!   onto each recipient's unbounded queue, so the lock is never held
//!   across network I/O.
//! - Frames from one sender reach each recipient in the order `relay` was
//!   called, since every queue is FIFO and drained by a single send loop.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use tungstenite::Utf8Bytes;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::connection::{Connection, ConnectionId};
use crate::relay::group::{BroadcastGroup, GLOBAL_GROUP};

#[derive(Debug)]
pub struct Relay {
    pub connections: HashMap<ConnectionId, Connection>,
    pub group: BroadcastGroup,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            group: BroadcastGroup::new(GLOBAL_GROUP),
        }
    }

    /// Registers an upgraded connection and joins it to the group.
    ///
    /// Admission is unconditional: there is no capacity limit and no
    /// authentication step.
    pub fn connect(&mut self, conn: Connection) {
        let id = conn.id.clone();
        self.connections.insert(id.clone(), conn);
        self.group.join(id.clone());
        info!(client_id = %id, members = self.group.len(), "New client connected");
    }

    /// Forwards `msg` unmodified to every member except `from`.
    ///
    /// Only data frames (text or binary) from a current member are relayed;
    /// anything else is ignored. A failed enqueue for one recipient is
    /// logged and skipped. Returns how many recipients the frame was queued for.
    pub fn relay(&self, from: &ConnectionId, msg: WsMessage) -> usize {
        if !Self::is_relayable(&msg) {
            return 0;
        }
        if !self.is_member(from) {
            debug!(client_id = %from, "Dropping frame from departed client");
            return 0;
        }

        let len = msg.len();
        let mut delivered = 0;

        for id in self.group.recipients(from) {
            match self.connections.get(id) {
                Some(conn) => {
                    if conn.send(msg.clone()) {
                        delivered += 1;
                    } else {
                        warn!(client_id = %id, "Failed to queue relayed message");
                    }
                }
                None => warn!(client_id = %id, "No connection registered for member"),
            }
        }

        debug!(
            client_id = %from,
            bytes = len,
            recipients = delivered,
            "Encrypted packet received, relaying to the network"
        );
        delivered
    }

    /// Removes a connection from the registry and the group.
    ///
    /// Returns `false` when the connection was already gone, so calling
    /// this more than once for the same id is harmless.
    pub fn disconnect(&mut self, id: &ConnectionId, close: Option<&CloseFrame>) -> bool {
        let Some(conn) = self.connections.remove(id) else {
            return false;
        };
        self.group.leave(id);

        match close {
            Some(frame) => info!(
                client_id = %id,
                code = u16::from(frame.code),
                reason = frame.reason.as_str(),
                session_secs = conn.session_secs(),
                "Client disconnected"
            ),
            None => info!(
                client_id = %id,
                session_secs = conn.session_secs(),
                "Client disconnected"
            ),
        }
        true
    }

    /// Server shutdown: asks every client to close and empties the group.
    ///
    /// Each connection's queue receives a close frame; dropping the
    /// connection afterwards ends its send loop once that frame is written.
    pub fn close_all(&mut self) -> usize {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: Utf8Bytes::from_static("server shutting down"),
        };

        let count = self.connections.len();
        for (_, conn) in self.connections.drain() {
            let _ = conn.send(WsMessage::Close(Some(frame.clone())));
        }
        self.group.members.clear();

        info!(closed = count, "Closed all connections");
        count
    }

    pub fn is_relayable(msg: &WsMessage) -> bool {
        matches!(msg, WsMessage::Text(_) | WsMessage::Binary(_))
    }

    pub fn is_member(&self, id: &ConnectionId) -> bool {
        self.group.members.contains(id)
    }

    pub fn member_count(&self) -> usize {
        self.group.len()
    }

    pub fn group_name(&self) -> &str {
        &self.group.name
    }
}
