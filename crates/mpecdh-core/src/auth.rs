//! Authorization of privileged ceremony operations
//!
//! Resetting an instance discards every participant's progress, so it is gated
//! by a [`ResetAuthority`]. The decision itself belongs to whoever governs the
//! instance; [`ThresholdApproval`] is the co-signing variant where a threshold
//! of roster members sign the reset message for the current epoch. Creation
//! is co-signed the same way, over the instance, suite and reset threshold.

use crate::kdf::{verify_signature, IdentitySigner};
use crate::{Ceremony, CeremonyConfig, Element, InstanceId, ParticipantId, Result, Suite};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const SUBMIT_TAG: &[u8] = b"MPECDH_SUBMIT";
const RESET_TAG: &[u8] = b"MPECDH_RESET";
const CREATE_TAG: &[u8] = b"MPECDH_CREATE";

/// Message a participant signs to submit `element` for `round`
pub fn submit_message(instance: &InstanceId, epoch: u64, round: usize, element: &Element) -> Vec<u8> {
    let mut message = Vec::with_capacity(SUBMIT_TAG.len() + 48 + element.len());
    message.extend_from_slice(SUBMIT_TAG);
    message.extend_from_slice(instance.as_bytes());
    message.extend_from_slice(&epoch.to_be_bytes());
    message.extend_from_slice(&(round as u64).to_be_bytes());
    message.extend_from_slice(element.as_bytes());
    message
}

/// Message approvers sign to reset `instance` at `epoch`
pub fn reset_message(instance: &InstanceId, epoch: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(RESET_TAG.len() + 40);
    message.extend_from_slice(RESET_TAG);
    message.extend_from_slice(instance.as_bytes());
    message.extend_from_slice(&epoch.to_be_bytes());
    message
}

/// Message roster members sign to approve creating `instance`
pub fn create_message(instance: &InstanceId, suite: Suite, reset_threshold: usize) -> Vec<u8> {
    let suite = suite.to_string();
    let mut message = Vec::with_capacity(CREATE_TAG.len() + 40 + suite.len());
    message.extend_from_slice(CREATE_TAG);
    message.extend_from_slice(instance.as_bytes());
    message.extend_from_slice(suite.as_bytes());
    message.extend_from_slice(&(reset_threshold as u64).to_be_bytes());
    message
}

/// Decides whether a ceremony may be reset
pub trait ResetAuthority {
    /// Whether resetting `ceremony` in its current state is authorized
    fn authorizes_reset(&self, ceremony: &Ceremony) -> bool;
}

/// A decision already taken by an external authorization layer
impl ResetAuthority for bool {
    fn authorizes_reset(&self, _ceremony: &Ceremony) -> bool {
        *self
    }
}

/// One co-signature on a reset message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Approving roster member
    pub participant: ParticipantId,
    /// Ed25519 signature over the reset message
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

/// Threshold co-signed reset approval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdApproval {
    /// Collected co-signatures
    pub approvals: Vec<Approval>,
}

impl ThresholdApproval {
    /// Empty approval
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `signer`'s co-signature over `message`
    pub fn approve<S>(&mut self, signer: &S, message: &[u8]) -> Result<()>
    where
        S: IdentitySigner + ?Sized,
    {
        let participant = signer.participant_id();
        let signature = signer.sign(message)?;
        self.approvals.retain(|a| a.participant != participant);
        self.approvals.push(Approval {
            participant,
            signature,
        });
        Ok(())
    }

    /// Distinct roster members whose signature over `message` verifies
    pub fn approvers(&self, members: &[ParticipantId], message: &[u8]) -> BTreeSet<ParticipantId> {
        self.approvals
            .iter()
            .filter(|a| members.contains(&a.participant))
            .filter(|a| verify_signature(&a.participant, message, &a.signature).is_ok())
            .map(|a| a.participant)
            .collect()
    }

    /// Whether enough roster members co-signed creating `config`
    ///
    /// Needs a majority, and never fewer approvals than the reset threshold
    /// being configured.
    pub fn authorizes_creation(&self, config: &CeremonyConfig) -> bool {
        let quorum = config.reset_threshold.max(config.roster.majority());
        let approvers = self.approvers(config.roster.members(), &config.create_message());
        debug!(
            instance = %config.instance,
            approvals = approvers.len(),
            quorum,
            "Checked creation approval"
        );
        approvers.len() >= quorum
    }
}

impl ResetAuthority for ThresholdApproval {
    fn authorizes_reset(&self, ceremony: &Ceremony) -> bool {
        let approvers = self.approvers(ceremony.signers(), &ceremony.reset_message());
        debug!(
            instance = %ceremony.instance(),
            approvals = approvers.len(),
            threshold = ceremony.reset_threshold(),
            "Checked reset approval"
        );
        approvers.len() >= ceremony.reset_threshold()
    }
}

/// Serde adapter for byte strings as standard base64
pub mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
