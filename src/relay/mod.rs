//! relay
//!
//! The relay owns the set of open connections and the single broadcast
//! group they all belong to. It is shared by the transport layer as
//! `Arc<Mutex<Relay>>`; every membership change and every fan-out happens
//! under that lock, so a fan-out never sees a half-removed connection.

pub mod engine;
pub mod group;

pub use engine::Relay;
pub use group::{BroadcastGroup, GLOBAL_GROUP};

#[cfg(test)]
mod tests;
