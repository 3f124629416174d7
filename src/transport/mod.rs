//! The `transport` module handles network communication with clients.
//!
//! It reads the HTTP request that opens every connection, upgrades valid
//! WebSocket requests, answers everything else with a plain-text status
//! page, and runs the per-connection read and send loops that connect a
//! socket to the relay.

pub mod handshake;
pub mod websocket;


pub use handshake::STATUS_BODY;
pub use websocket::{serve, start_websocket_server};
