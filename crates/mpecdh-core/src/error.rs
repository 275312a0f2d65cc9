//! Error types for MPECDH ceremony operations

use crate::{ParticipantId, Status};
use thiserror::Error;

/// Result type alias for MPECDH operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a ceremony
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed element or scalar encoding
    #[error("Format error: {0}")]
    Format(String),

    /// Submission attempted while the participant's status forbids it
    #[error("Out of order: {participant} is {status}")]
    OutOfOrder {
        participant: ParticipantId,
        status: Status,
    },

    /// Privileged operation attempted without authorization
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Participants derived different secrets, the ceremony must be reset
    #[error("Poisoned ceremony: {0}")]
    PoisonedCeremony(String),

    /// Caller is not a roster member
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// Invalid ceremony configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Network/board error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Timeout waiting for a ceremony step
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Ceremony instance not found
    #[error("Ceremony not found: {0}")]
    NotFound(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Format(e.to_string())
    }
}
