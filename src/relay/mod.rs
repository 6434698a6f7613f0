//! # Relay
//!
//! Fan-out of recorded clips between participants: the server side
//! ([`server`], [`hub`]) and the participant connection ([`client`]).

pub mod client;
pub mod hub;
pub mod server;

pub use client::RelayClient;
pub use hub::{ConnectionId, FanOut, RelayHub};
