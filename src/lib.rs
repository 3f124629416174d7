//! # p2p-relay
//!
//! `p2p_relay` is a minimal WebSocket relay. Every client that completes
//! the upgrade handshake joins one shared broadcast group, and each text
//! or binary frame a client sends is forwarded, untouched, to every other
//! member. Plain HTTP requests get a short plain-text status page.
//!
//! ## Core Modules
//!
//! - `config`: Loads server and logging settings from file and environment.
//! - `connection`: Represents one upgraded WebSocket client.
//! - `relay`: The connection registry, broadcast group and fan-out.
//! - `transport`: HTTP handshake, accept loop and per-connection I/O.
//! - `utils`: Error type and logging setup.

pub mod config;
pub mod connection;
pub mod relay;
pub mod transport;
pub mod utils;
