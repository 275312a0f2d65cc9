//! Counterfactual ceremony instance addressing
//!
//! An instance id is predictable from its inputs alone, so participants can
//! agree on where a ceremony lives before it is created. The protocol version
//! byte is part of the preimage; bumping it lets the same roster redeploy at a
//! fresh address.

use crate::{Error, ParticipantId, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Protocol version mixed into every instance id
pub const PROTOCOL_VERSION: u8 = 0;

/// Stable handle of a ceremony instance
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub [u8; 32]);

impl InstanceId {
    /// Keccak-256(master || sorted roster || version)
    pub fn derive(master: &[u8], members: &[ParticipantId], version: u8) -> Self {
        let mut sorted = members.to_vec();
        sorted.sort();

        let mut hasher = Keccak256::new();
        hasher.update(master);
        for member in &sorted {
            hasher.update(member.as_bytes());
        }
        hasher.update([version]);
        Self(hasher.finalize().into())
    }

    /// Raw id bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({}..)", &self.to_hex()[..8])
    }
}

impl FromStr for InstanceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Format("instance id must be 32 bytes".into()))?;
        Ok(Self(array))
    }
}

impl Serialize for InstanceId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InstanceId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
