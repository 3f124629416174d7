use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ConnectionId = String;

/// A connected WebSocket client.
///
/// The relay owns each `Connection` for as long as the client is open.
/// Dropping it drops `sender`, which ends the client's send loop.
#[derive(Debug)]
pub struct Connection {
    /// Opaque identifier assigned at accept time.
    pub id: ConnectionId,

    /// Outbound queue drained by the connection's send loop.
    pub sender: UnboundedSender<WsMessage>,

    pub connected_at: DateTime<Utc>,
}

impl Connection {
    /// Create a new connection with a fresh UUID identity.
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Queue a frame for delivery. Fails only once the send loop is gone.
    pub fn send(&self, msg: WsMessage) -> bool {
        self.sender.send(msg).is_ok()
    }

    pub fn session_secs(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}
