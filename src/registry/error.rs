//! Registry error types
//!
//! Error types for session membership operations.

use crate::protocol::SessionName;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connection is not a member of the session
    NotJoined(SessionName),
    /// Connection is already a member of the session
    AlreadyJoined(SessionName),
    /// Session is at its member limit
    SessionFull(SessionName),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NotJoined(name) => write!(f, "Not a member of session: {}", name),
            RegistryError::AlreadyJoined(name) => {
                write!(f, "Already a member of session: {}", name)
            }
            RegistryError::SessionFull(name) => write!(f, "Session is full: {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}
