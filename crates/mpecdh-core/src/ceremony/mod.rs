//! Ceremony engine
//!
//! The round/queue state machine of a ring ceremony. Every participant owns
//! a round counter (how many values it has submitted) and a mailbox (values
//! received from its predecessor). A submission is always appended to the
//! submitter's successor's mailbox, never broadcast. Status is computed from
//! the counters and mailbox lengths on every read.
//!
//! ```text
//! NotStarted --submit(0)--> Waiting|Ready --submit(k)--> ... --submit(n-2)--> Waiting|Terminal
//! ```

mod roster;

pub use roster::{Roster, MIN_PARTICIPANTS};

use crate::auth::{self, ResetAuthority};
use crate::{Element, Error, InstanceId, ParticipantId, Result, Status, Suite};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Immutable parameters of a ceremony instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeremonyConfig {
    /// Instance handle
    pub instance: InstanceId,
    /// Group backend
    pub suite: Suite,
    /// Ring of participants
    pub roster: Roster,
    /// Approvals needed to reset
    pub reset_threshold: usize,
}

impl CeremonyConfig {
    /// Configure an instance at its counterfactual address
    pub fn new(master: &[u8], roster: Roster, suite: Suite) -> Self {
        let instance =
            InstanceId::derive(master, roster.members(), crate::instance::PROTOCOL_VERSION);
        let reset_threshold = roster.majority();
        Self {
            instance,
            suite,
            roster,
            reset_threshold,
        }
    }

    /// Override the reset threshold
    pub fn with_reset_threshold(mut self, threshold: usize) -> Self {
        self.reset_threshold = threshold;
        self
    }

    /// Message roster members co-sign to approve creating this instance
    pub fn create_message(&self) -> Vec<u8> {
        auth::create_message(&self.instance, self.suite, self.reset_threshold)
    }

    fn validate(&self) -> Result<()> {
        if self.reset_threshold == 0 || self.reset_threshold > self.roster.len() {
            return Err(Error::InvalidConfig(format!(
                "reset threshold must be in 1..={}, got {}",
                self.roster.len(),
                self.reset_threshold
            )));
        }
        Ok(())
    }
}

/// One participant's view of the ceremony, read atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prep {
    /// Derived status
    pub status: Status,
    /// Value to mix in next, if available
    pub pending: Option<Element>,
    /// Round of the participant's next submission
    pub round: usize,
    /// Number of resets so far
    pub epoch: u64,
}

/// Public summary of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyInfo {
    /// Instance handle
    pub instance: InstanceId,
    /// Group backend
    pub suite: Suite,
    /// Participants in ring order
    pub ring: Vec<ParticipantId>,
    /// Approvals needed to reset
    pub reset_threshold: usize,
    /// Number of resets so far
    pub epoch: u64,
    /// Round currently being drained
    pub round: usize,
    /// Whether every mailbox holds all relayed values
    pub complete: bool,
}

/// Ring ceremony state
#[derive(Debug, Clone)]
pub struct Ceremony {
    config: CeremonyConfig,
    epoch: u64,
    /// Values submitted per participant
    counters: Vec<usize>,
    /// Values received from the predecessor
    mailboxes: Vec<Vec<Element>>,
}

impl Ceremony {
    /// Create an instance with empty mailboxes
    pub fn new(config: CeremonyConfig) -> Result<Self> {
        config.validate()?;
        let n = config.roster.len();

        info!(
            instance = %config.instance,
            suite = %config.suite,
            participants = n,
            reset_threshold = config.reset_threshold,
            "Ceremony initialized"
        );

        Ok(Self {
            config,
            epoch: 0,
            counters: vec![0; n],
            mailboxes: vec![Vec::new(); n],
        })
    }

    /// Instance handle
    pub fn instance(&self) -> InstanceId {
        self.config.instance
    }

    /// Group backend
    pub fn suite(&self) -> Suite {
        self.config.suite
    }

    /// Ring of participants
    pub fn roster(&self) -> &Roster {
        &self.config.roster
    }

    /// Participants in ring order
    pub fn signers(&self) -> &[ParticipantId] {
        self.config.roster.members()
    }

    /// Approvals needed to reset
    pub fn reset_threshold(&self) -> usize {
        self.config.reset_threshold
    }

    /// Number of resets so far
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn index_of(&self, participant: &ParticipantId) -> Result<usize> {
        self.config
            .roster
            .position(participant)
            .ok_or(Error::UnknownParticipant(*participant))
    }

    fn status_at(&self, i: usize) -> Status {
        let submitted = self.counters[i];
        let received = self.mailboxes[i].len();
        let last = self.config.roster.rounds();

        if submitted == 0 {
            Status::NotStarted
        } else if received < submitted {
            Status::Waiting
        } else if submitted == last {
            Status::Terminal
        } else {
            Status::Ready
        }
    }

    fn pending_at(&self, i: usize) -> Option<&Element> {
        self.counters[i]
            .checked_sub(1)
            .and_then(|slot| self.mailboxes[i].get(slot))
    }

    /// Status of a participant
    pub fn status(&self, participant: &ParticipantId) -> Result<Status> {
        Ok(self.status_at(self.index_of(participant)?))
    }

    /// Predecessor value the participant must mix in next, if available
    pub fn pending(&self, participant: &ParticipantId) -> Result<Option<Element>> {
        Ok(self.pending_at(self.index_of(participant)?).cloned())
    }

    /// Status and pending value as one snapshot
    pub fn prep(&self, participant: &ParticipantId) -> Result<(Status, Option<Element>)> {
        let i = self.index_of(participant)?;
        Ok((self.status_at(i), self.pending_at(i).cloned()))
    }

    /// Status, pending value, next round and epoch as one snapshot
    pub fn snapshot(&self, participant: &ParticipantId) -> Result<Prep> {
        let i = self.index_of(participant)?;
        Ok(Prep {
            status: self.status_at(i),
            pending: self.pending_at(i).cloned(),
            round: self.counters[i],
            epoch: self.epoch,
        })
    }

    /// Round the next submission of `participant` belongs to
    pub fn next_round(&self, participant: &ParticipantId) -> Result<usize> {
        Ok(self.counters[self.index_of(participant)?])
    }

    /// Receiver of `participant`'s contributions
    pub fn successor(&self, participant: &ParticipantId) -> Result<ParticipantId> {
        let i = self.index_of(participant)?;
        Ok(self.config.roster.members()[self.config.roster.successor_of(i)])
    }

    /// Sender of `participant`'s mailbox values
    pub fn predecessor(&self, participant: &ParticipantId) -> Result<ParticipantId> {
        let i = self.index_of(participant)?;
        Ok(self.config.roster.members()[self.config.roster.predecessor_of(i)])
    }

    /// Submit `participant`'s contribution for its current round
    ///
    /// Validation precedes mutation, so a failed call has no effect. Returns
    /// the round the contribution was recorded for.
    pub fn submit(&mut self, participant: &ParticipantId, element: Element) -> Result<usize> {
        let i = self.index_of(participant)?;
        self.config.suite.validate(&element)?;

        let status = self.status_at(i);
        if !status.can_submit() {
            debug!(%participant, %status, "Rejected out of order submission");
            return Err(Error::OutOfOrder {
                participant: *participant,
                status,
            });
        }

        let round = self.counters[i];
        let to = self.config.roster.successor_of(i);
        self.mailboxes[to].push(element);
        self.counters[i] += 1;
        debug_assert_eq!(self.mailboxes[to].len(), self.counters[i]);

        debug!(
            instance = %self.config.instance,
            %participant,
            round,
            to = %self.config.roster.members()[to],
            "Contribution routed"
        );
        Ok(round)
    }

    /// Submit a contribution decided from the snapshot at `epoch` and `round`
    ///
    /// Rejected as out of order when a reset or another submission has moved
    /// the participant on since that snapshot was read.
    pub fn submit_at(
        &mut self,
        participant: &ParticipantId,
        epoch: u64,
        round: usize,
        element: Element,
    ) -> Result<usize> {
        let i = self.index_of(participant)?;
        if epoch != self.epoch || round != self.counters[i] {
            let status = self.status_at(i);
            debug!(
                %participant,
                epoch,
                round,
                current_epoch = self.epoch,
                current_round = self.counters[i],
                "Rejected stale submission"
            );
            return Err(Error::OutOfOrder {
                participant: *participant,
                status,
            });
        }
        self.submit(participant, element)
    }

    /// Round currently being drained, the lowest participant counter
    pub fn round(&self) -> usize {
        self.counters.iter().copied().min().unwrap_or(0)
    }

    /// Participants holding up the round currently being drained
    ///
    /// Empty when every participant has submitted the same number of values.
    /// This is a progress report; callers advance on `status` alone.
    pub fn blocking(&self) -> Vec<ParticipantId> {
        let min = self.round();
        if self.counters.iter().all(|c| *c == min) {
            return Vec::new();
        }
        self.config
            .roster
            .members()
            .iter()
            .zip(&self.counters)
            .filter(|(_, c)| **c == min)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Mailbox of the participant at ring index `index`
    pub fn queue(&self, index: usize) -> Option<&[Element]> {
        self.mailboxes.get(index).map(Vec::as_slice)
    }

    /// Whether every mailbox holds all relayed values
    pub fn is_complete(&self) -> bool {
        let rounds = self.config.roster.rounds();
        self.mailboxes.iter().all(|q| q.len() == rounds)
    }

    /// Message reset approvers sign for the current epoch
    pub fn reset_message(&self) -> Vec<u8> {
        auth::reset_message(&self.config.instance, self.epoch)
    }

    /// Clear every mailbox and counter, keeping the roster
    ///
    /// A relayed value cannot be retracted, so this is the only recovery from
    /// a poisoned ceremony.
    pub fn reset<A>(&mut self, authority: &A) -> Result<()>
    where
        A: ResetAuthority + ?Sized,
    {
        if !authority.authorizes_reset(self) {
            warn!(instance = %self.config.instance, epoch = self.epoch, "Reset refused");
            return Err(Error::Unauthorized(format!(
                "reset of {} needs {} approvals",
                self.config.instance, self.config.reset_threshold
            )));
        }

        self.counters.iter_mut().for_each(|c| *c = 0);
        self.mailboxes.iter_mut().for_each(Vec::clear);
        self.epoch += 1;

        info!(instance = %self.config.instance, epoch = self.epoch, "Ceremony reset");
        Ok(())
    }

    /// Public summary
    pub fn info(&self) -> CeremonyInfo {
        CeremonyInfo {
            instance: self.config.instance,
            suite: self.config.suite,
            ring: self.signers().to_vec(),
            reset_threshold: self.config.reset_threshold,
            epoch: self.epoch,
            round: self.round(),
            complete: self.is_complete(),
        }
    }
}
