//! Ceremony channel abstraction
//!
//! A channel is the authenticated, append-only boundary a ceremony lives
//! behind. Every call is atomic with respect to every other call on the same
//! instance; submissions are attributed to the identity that signs them.

use crate::auth::ThresholdApproval;
use crate::ceremony::{CeremonyInfo, Prep};
use crate::kdf::IdentitySigner;
use crate::{Element, ParticipantId, Result, Status};

pub use ::async_trait::async_trait;

/// Access to one ceremony instance
#[async_trait]
pub trait Channel: Send + Sync {
    /// Public summary of the instance
    async fn info(&self) -> Result<CeremonyInfo>;

    /// One participant's snapshot
    async fn prep(&self, participant: &ParticipantId) -> Result<Prep>;

    /// Status of a participant
    async fn status(&self, participant: &ParticipantId) -> Result<Status> {
        Ok(self.prep(participant).await?.status)
    }

    /// Value a participant must mix in next
    async fn pending(&self, participant: &ParticipantId) -> Result<Option<Element>> {
        Ok(self.prep(participant).await?.pending)
    }

    /// Participants holding up the current round
    async fn blocking(&self) -> Result<Vec<ParticipantId>>;

    /// Submit `element` as the signer's contribution for `round` of `epoch`
    ///
    /// `epoch` and `round` come from the [`Prep`] the contribution was
    /// computed from. The channel rejects it as out of order once either has
    /// moved on.
    async fn submit(
        &self,
        signer: &dyn IdentitySigner,
        epoch: u64,
        round: usize,
        element: Element,
    ) -> Result<usize>;

    /// Reset the instance under a co-signed approval
    async fn reset(&self, approval: &ThresholdApproval) -> Result<()>;
}

/// In-memory channel for local ceremonies and tests
pub mod memory;

pub use memory::MemoryChannel;
