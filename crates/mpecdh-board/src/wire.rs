//! JSON bodies exchanged with the board service

use mpecdh_core::auth::{self, b64};
use mpecdh_core::{
    CeremonyConfig, Element, IdentitySigner, InstanceId, ParticipantId, Result, Roster, Status,
    Suite, ThresholdApproval,
};
use serde::{Deserialize, Serialize};

/// Request to create a ceremony instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Hex encoded master address the instance is derived from
    pub master: String,
    /// Participants, in any order
    pub roster: Vec<ParticipantId>,
    /// Group backend
    pub suite: Suite,
    /// Approvals needed to reset, majority when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_threshold: Option<usize>,
    /// Roster co-signatures over the creation message
    #[serde(default)]
    pub approval: ThresholdApproval,
}

impl CreateRequest {
    /// Unsigned request
    pub fn new(
        master: impl Into<String>,
        roster: Vec<ParticipantId>,
        suite: Suite,
        reset_threshold: Option<usize>,
    ) -> Self {
        Self {
            master: master.into(),
            roster,
            suite,
            reset_threshold,
            approval: ThresholdApproval::new(),
        }
    }

    /// Ceremony configuration this request describes
    pub fn config(&self) -> Result<CeremonyConfig> {
        let master = hex::decode(self.master.trim_start_matches("0x"))?;
        let roster = Roster::new(self.roster.iter().copied())?;
        let config = CeremonyConfig::new(&master, roster, self.suite);
        Ok(match self.reset_threshold {
            Some(threshold) => config.with_reset_threshold(threshold),
            None => config,
        })
    }

    /// Add `signer`'s co-signature approving this creation
    pub fn approve(&mut self, signer: &dyn IdentitySigner) -> Result<()> {
        let message = self.config()?.create_message();
        self.approval.approve(signer, &message)
    }
}

/// Signed contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Submitting roster member
    pub participant: ParticipantId,
    /// Epoch the contribution was computed in
    pub epoch: u64,
    /// Round the contribution belongs to
    pub round: usize,
    /// Contributed element
    pub element: Element,
    /// Ed25519 signature over the submit message, base64
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

impl SubmitRequest {
    /// Sign `element` as the signer's contribution for `round` of `epoch`
    pub fn sign(
        signer: &dyn IdentitySigner,
        instance: &InstanceId,
        epoch: u64,
        round: usize,
        element: Element,
    ) -> Result<Self> {
        let message = auth::submit_message(instance, epoch, round, &element);
        Ok(Self {
            participant: signer.participant_id(),
            epoch,
            round,
            signature: signer.sign(&message)?,
            element,
        })
    }

    /// Message the signature covers
    pub fn message(&self, instance: &InstanceId) -> Vec<u8> {
        auth::submit_message(instance, self.epoch, self.round, &self.element)
    }
}

/// Accepted contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Round the contribution was recorded for
    pub round: usize,
    /// Submitter's status afterwards
    pub status: Status,
}

/// Participants holding up the current round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingResponse {
    pub blocking: Vec<ParticipantId>,
}

/// Contents of one mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    /// Ring index of the mailbox owner
    pub index: usize,
    pub elements: Vec<Element>,
}

/// Machine readable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Format,
    OutOfOrder,
    Unauthorized,
    UnknownParticipant,
    InvalidConfig,
    NotFound,
    Conflict,
    Internal,
}

/// Error payload returned with every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl ErrorBody {
    /// Rebuild the ceremony error this body describes
    pub fn into_error(self) -> mpecdh_core::Error {
        use mpecdh_core::Error;

        match (self.code, self.participant, self.status) {
            (ErrorCode::OutOfOrder, Some(participant), Some(status)) => {
                Error::OutOfOrder { participant, status }
            }
            (ErrorCode::UnknownParticipant, Some(participant), _) => {
                Error::UnknownParticipant(participant)
            }
            (ErrorCode::Format, ..) => Error::Format(self.error),
            (ErrorCode::Unauthorized, ..) => Error::Unauthorized(self.error),
            (ErrorCode::InvalidConfig, ..) => Error::InvalidConfig(self.error),
            (ErrorCode::NotFound, ..) => Error::NotFound(self.error),
            _ => Error::Relay(self.error),
        }
    }
}
