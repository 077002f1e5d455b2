//! Error types
//!
//! Errors fall into three groups:
//!
//! - [`CodecError`]: a frame could not be decoded. Answered with an error
//!   message; the connection stays open.
//! - [`ProtocolError`]: a well-formed message broke a protocol rule (not
//!   joined, joined twice, ...). Answered with an error message; the
//!   connection stays open.
//! - Transport failures ([`Error::Io`], [`Error::WebSocket`], ...): the
//!   connection is torn down and its sessions are left.

use std::fmt;
use std::io;

use tokio_tungstenite::tungstenite;

use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error on the underlying socket
    Io(io::Error),
    /// WebSocket protocol or transport error
    WebSocket(tungstenite::Error),
    /// Inbound frame could not be decoded
    Codec(CodecError),
    /// Message violated the signaling protocol
    Protocol(ProtocolError),
    /// Peer announced a frame larger than the configured limit
    FrameTooLarge { size: usize, max: usize },
    /// Operation did not complete in time
    Timeout,
    /// The connection was closed
    ConnectionClosed,
    /// Relay answered a client request with an error message
    Rejected(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Codec(e) => write!(f, "Decode error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol violation: {}", e),
            Error::FrameTooLarge { size, max } => {
                write!(f, "Frame too large: {} bytes (max {})", size, max)
            }
            Error::Timeout => write!(f, "Operation timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::Rejected(reason) => write!(f, "Rejected by relay: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Codec(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Error::ConnectionClosed
            }
            tungstenite::Error::Io(io) => Error::Io(io),
            tungstenite::Error::Capacity(tungstenite::error::CapacityError::MessageTooLong {
                size,
                max_size,
            }) => Error::FrameTooLarge {
                size,
                max: max_size,
            },
            other => Error::WebSocket(other),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

/// Errors produced while decoding a signaling frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame had no bytes at all
    EmptyFrame,
    /// Frame ended in the middle of a field
    UnexpectedEof,
    /// Leading tag byte does not name a message
    UnknownTag(u8),
    /// A string field was not valid UTF-8
    InvalidUtf8,
    /// Bytes left over after the message was fully decoded
    TrailingBytes(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::EmptyFrame => write!(f, "empty frame"),
            CodecError::UnexpectedEof => write!(f, "unexpected end of frame"),
            CodecError::UnknownTag(tag) => write!(f, "unknown message tag 0x{:02x}", tag),
            CodecError::InvalidUtf8 => write!(f, "string field is not valid UTF-8"),
            CodecError::TrailingBytes(n) => write!(f, "{} trailing bytes after message", n),
        }
    }
}

impl std::error::Error for CodecError {}

/// Protocol rules broken by a decodable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Message referenced a session the sender has not joined
    NotJoined(String),
    /// Sender is already a member of the session
    AlreadyJoined(String),
    /// Session reached its member limit
    SessionFull(String),
    /// Session name is empty or too long
    InvalidSessionName,
    /// Connection reached its session limit
    TooManySessions(usize),
    /// Client sent a message only the server may send
    UnexpectedMessage(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NotJoined(session) => {
                write!(f, "not a member of session `{}`", session)
            }
            ProtocolError::AlreadyJoined(session) => {
                write!(f, "already a member of session `{}`", session)
            }
            ProtocolError::SessionFull(session) => write!(f, "session `{}` is full", session),
            ProtocolError::InvalidSessionName => write!(f, "invalid session name"),
            ProtocolError::TooManySessions(max) => {
                write!(f, "too many sessions (max {})", max)
            }
            ProtocolError::UnexpectedMessage(kind) => {
                write!(f, "unexpected {} message from client", kind)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<RegistryError> for ProtocolError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotJoined(name) => ProtocolError::NotJoined(name.into_string()),
            RegistryError::AlreadyJoined(name) => ProtocolError::AlreadyJoined(name.into_string()),
            RegistryError::SessionFull(name) => ProtocolError::SessionFull(name.into_string()),
        }
    }
}
