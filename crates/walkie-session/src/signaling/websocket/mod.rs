//! Signaling link over a WebSocket relay.
//!
//! Frames are JSON envelopes `{"event": ..., "data": ...}`. The relay's first
//! frame on every connection is `welcome` carrying the identity it assigned;
//! the link only reports itself connected after that. Dropped connections
//! are retried a bounded number of times with exponential backoff.

mod client;
mod connection;
mod types;

#[cfg(test)]
mod tests;

pub use client::WebSocketLink;
pub use types::{Envelope, WebSocketLinkConfig};
