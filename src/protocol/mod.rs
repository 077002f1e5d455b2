//! Signaling wire protocol
//!
//! Message types plus the binary codec that frames them. The codec is
//! transport-agnostic: each WebSocket binary message or length-delimited TCP
//! frame carries exactly one encoded [`SignalMessage`].

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{decode, encode, SignalDecoder, SignalEncoder};
pub use message::{ConnectionId, SessionName, SignalMessage};
