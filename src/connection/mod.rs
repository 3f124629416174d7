//! The `connection` module defines the representation of a connected peer.
//!
//! It provides the `Connection` struct, which encapsulates the state of a
//! single upgraded WebSocket client: its opaque identifier and the channel
//! feeding its outbound send loop.

pub mod handle;
pub use handle::{Connection, ConnectionId};
