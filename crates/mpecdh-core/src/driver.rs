//! Ceremony driver
//!
//! Runs one participant through the protocol over any [`Channel`]:
//!
//! | status       | action                                               |
//! |--------------|------------------------------------------------------|
//! | `NotStarted` | submit the public element                            |
//! | `Ready`      | apply the private scalar to `pending`, submit it     |
//! | `Waiting`    | nothing                                              |
//! | `Terminal`   | apply the private scalar to `pending`, keep it local |
//!
//! Ring order is enforced by the channel's routing, so drivers may be stepped
//! in any relative order and re-stepped freely.

use crate::channel::Channel;
use crate::group::{GroupOperation, KeyPair};
use crate::kdf::{self, IdentitySigner};
use crate::{Error, ParticipantId, Result, Status};
use futures_util::future::join_all;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

/// Final ceremony output, never transmitted
#[derive(Clone)]
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Secret bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_slice())
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({} bytes)", self.0.len())
    }
}

/// Outcome of a single driver step
#[derive(Debug)]
pub enum Step {
    /// A contribution was submitted for this round
    Submitted { round: usize },
    /// The predecessor has not relayed the next value yet
    Waiting,
    /// The ceremony finished for this participant
    Finished(SharedSecret),
}

/// Drives one participant over a channel
pub struct Driver<'a, G, C: ?Sized, S> {
    channel: &'a C,
    signer: &'a S,
    participant: ParticipantId,
    keys: KeyPair,
    _group: PhantomData<G>,
}

impl<'a, G, C, S> Driver<'a, G, C, S>
where
    G: GroupOperation,
    C: Channel + ?Sized,
    S: IdentitySigner,
{
    /// Check the instance matches this backend and derive the session keys
    #[instrument(skip(channel, signer))]
    pub async fn connect(channel: &'a C, signer: &'a S) -> Result<Self> {
        let info = channel.info().await?;
        if info.suite != G::SUITE {
            return Err(Error::InvalidConfig(format!(
                "instance {} runs {}, driver runs {}",
                info.instance,
                info.suite,
                G::SUITE
            )));
        }

        let participant = signer.participant_id();
        if !info.ring.contains(&participant) {
            return Err(Error::UnknownParticipant(participant));
        }

        let keys = kdf::derive::<G, S>(signer)?;
        debug!(%participant, instance = %info.instance, "Driver connected");

        Ok(Self {
            channel,
            signer,
            participant,
            keys,
            _group: PhantomData,
        })
    }

    /// Participant this driver acts for
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Take the action the current status calls for
    pub async fn step(&self) -> Result<Step> {
        let prep = self.channel.prep(&self.participant).await?;

        match prep.status {
            Status::NotStarted => {
                let round = self
                    .channel
                    .submit(self.signer, prep.epoch, prep.round, self.keys.public.clone())
                    .await?;
                debug!(participant = %self.participant, round, "Submitted public element");
                Ok(Step::Submitted { round })
            }
            Status::Ready => {
                let pending = prep.pending.ok_or_else(|| {
                    Error::Relay(format!("{} is ready without a pending value", self.participant))
                })?;
                let relayed = G::apply(&self.keys.secret, &pending)?;
                let round = self
                    .channel
                    .submit(self.signer, prep.epoch, prep.round, relayed)
                    .await?;
                debug!(participant = %self.participant, round, "Submitted relayed element");
                Ok(Step::Submitted { round })
            }
            Status::Waiting => Ok(Step::Waiting),
            Status::Terminal => {
                let pending = prep.pending.ok_or_else(|| {
                    Error::Relay(format!("{} is terminal without a pending value", self.participant))
                })?;
                let secret = G::apply(&self.keys.secret, &pending)?;
                Ok(Step::Finished(SharedSecret::new(secret.into_bytes())))
            }
        }
    }

    /// Step until the shared secret is available, sleeping while waiting
    pub async fn run(&self, poll_interval: Duration) -> Result<SharedSecret> {
        loop {
            match self.step().await? {
                Step::Finished(secret) => {
                    info!(participant = %self.participant, "Ceremony finished");
                    return Ok(secret);
                }
                Step::Submitted { .. } => continue,
                Step::Waiting => tokio::time::sleep(poll_interval).await,
            }
        }
    }

    /// Participants holding up the current round, for progress display only
    pub async fn progress(&self) -> Result<Vec<ParticipantId>> {
        self.channel.blocking().await
    }
}

/// Drive every signer concurrently until all hold the shared secret
pub async fn run_all<G, C, S>(
    channel: &C,
    signers: &[S],
    poll_interval: Duration,
) -> Result<Vec<SharedSecret>>
where
    G: GroupOperation,
    C: Channel + ?Sized,
    S: IdentitySigner,
{
    let mut drivers = Vec::with_capacity(signers.len());
    for signer in signers {
        drivers.push(Driver::<G, C, S>::connect(channel, signer).await?);
    }

    join_all(drivers.iter().map(|d| d.run(poll_interval)))
        .await
        .into_iter()
        .collect()
}

/// Check that locally derived secrets agree
///
/// The engine cannot tell a well-formed wrong element from a correct one, so
/// a poisoned ceremony only shows up here. The remedy is a reset.
pub fn verify_agreement(secrets: &[SharedSecret]) -> Result<()> {
    match secrets.split_first() {
        Some((first, rest)) if rest.iter().any(|s| s != first) => Err(Error::PoisonedCeremony(
            format!("{} participants disagree on the shared secret", secrets.len()),
        )),
        _ => Ok(()),
    }
}
