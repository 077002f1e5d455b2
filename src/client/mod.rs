//! Signaling client implementation
//!
//! Provides the client side of the relay protocol over either transport.

pub mod signaling;

pub use signaling::SignalingClient;
