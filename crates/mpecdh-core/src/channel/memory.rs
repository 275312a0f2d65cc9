//! In-memory channel implementation

use super::{async_trait, Channel};
use crate::auth::ThresholdApproval;
use crate::ceremony::{CeremonyInfo, Prep};
use crate::kdf::IdentitySigner;
use crate::{Ceremony, Element, ParticipantId, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single ceremony behind an async mutex
///
/// The mutex is the serialization boundary: each call observes and mutates
/// the whole aggregate atomically. Submissions are attributed to the signer's
/// identity without a signature round-trip since nothing leaves the process.
#[derive(Clone)]
pub struct MemoryChannel {
    ceremony: Arc<Mutex<Ceremony>>,
}

impl MemoryChannel {
    /// Wrap a ceremony
    pub fn new(ceremony: Ceremony) -> Self {
        Self {
            ceremony: Arc::new(Mutex::new(ceremony)),
        }
    }

    /// Run a read-only closure against the ceremony
    pub async fn inspect<R>(&self, f: impl FnOnce(&Ceremony) -> R) -> R {
        let ceremony = self.ceremony.lock().await;
        f(&ceremony)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn info(&self) -> Result<CeremonyInfo> {
        Ok(self.ceremony.lock().await.info())
    }

    async fn prep(&self, participant: &ParticipantId) -> Result<Prep> {
        self.ceremony.lock().await.snapshot(participant)
    }

    async fn blocking(&self) -> Result<Vec<ParticipantId>> {
        Ok(self.ceremony.lock().await.blocking())
    }

    async fn submit(
        &self,
        signer: &dyn IdentitySigner,
        epoch: u64,
        round: usize,
        element: Element,
    ) -> Result<usize> {
        let participant = signer.participant_id();
        self.ceremony
            .lock()
            .await
            .submit_at(&participant, epoch, round, element)
    }

    async fn reset(&self, approval: &ThresholdApproval) -> Result<()> {
        self.ceremony.lock().await.reset(approval)
    }
}
