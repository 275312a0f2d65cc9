//! Core types for the MPECDH ceremony

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identity of a ceremony participant
///
/// The 32-byte ed25519 verifying key of the participant's identity signer.
/// Ring order is the byte order of these identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    /// Create from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({}..)", &self.to_hex()[..8])
    }
}

impl FromStr for ParticipantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Format("participant id must be 32 bytes".into()))?;
        Ok(Self(array))
    }
}

impl Serialize for ParticipantId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Encoded group element
///
/// Width is fixed per ceremony instance by its [`Suite`](crate::Suite).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element(Vec<u8>);

impl Element {
    /// Wrap raw encoded bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse from hex, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(hex::decode(s.trim_start_matches("0x"))?))
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoding width in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the encoding is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Consume into the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        let head = &hex[..hex.len().min(16)];
        write!(f, "Element({}.., {} bytes)", head, self.0.len())
    }
}

impl From<[u8; 32]> for Element {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for Element {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Element::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Per-participant ceremony status, derived from round counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// All rounds done and the final relayed value is available
    Terminal,
    /// The predecessor's value for the next contribution is available
    Ready,
    /// Contributed for the current round, predecessor has not caught up
    Waiting,
    /// No round-0 contribution yet
    NotStarted,
}

impl Status {
    /// Wire code
    pub fn code(&self) -> u8 {
        match self {
            Status::Terminal => 0,
            Status::Ready => 1,
            Status::Waiting => 2,
            Status::NotStarted => 3,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Status::Terminal),
            1 => Ok(Status::Ready),
            2 => Ok(Status::Waiting),
            3 => Ok(Status::NotStarted),
            other => Err(Error::Format(format!("unknown status code {}", other))),
        }
    }

    /// Whether a submission is accepted in this status
    pub fn can_submit(&self) -> bool {
        matches!(self, Status::NotStarted | Status::Ready)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Terminal => "end",
            Status::Ready => "ok",
            Status::Waiting => "idle",
            Status::NotStarted => "fresh",
        };
        f.write_str(name)
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Status::from_code(code).map_err(serde::de::Error::custom)
    }
}
