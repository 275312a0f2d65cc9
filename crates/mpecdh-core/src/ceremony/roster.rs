//! Ring-ordered participant roster

use crate::{Error, ParticipantId, Result};
use serde::{Deserialize, Serialize};

/// Smallest ring that needs relaying; two parties is plain Diffie-Hellman
pub const MIN_PARTICIPANTS: usize = 3;

/// Immutable ring of ceremony participants
///
/// Members are kept in ascending identifier order. Participant `i` forwards
/// to `(i + 1) % n` and receives from `(i + n - 1) % n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ParticipantId>", into = "Vec<ParticipantId>")]
pub struct Roster {
    ring: Vec<ParticipantId>,
}

impl Roster {
    /// Build the ring from an unordered member list
    pub fn new(members: impl IntoIterator<Item = ParticipantId>) -> Result<Self> {
        let mut ring: Vec<ParticipantId> = members.into_iter().collect();
        if ring.len() < MIN_PARTICIPANTS {
            return Err(Error::InvalidConfig(format!(
                "roster needs at least {} members, got {}",
                MIN_PARTICIPANTS,
                ring.len()
            )));
        }

        ring.sort();
        if let Some(pair) = ring.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::InvalidConfig(format!(
                "duplicate roster member: {}",
                pair[0]
            )));
        }

        Ok(Self { ring })
    }

    /// Number of participants
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Always false, a roster has at least three members
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Members in ring order
    pub fn members(&self) -> &[ParticipantId] {
        &self.ring
    }

    /// Ring index of a member
    pub fn position(&self, participant: &ParticipantId) -> Option<usize> {
        self.ring.binary_search(participant).ok()
    }

    /// Whether `participant` is a member
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.position(participant).is_some()
    }

    /// Ring index that receives index `i`'s contributions
    pub fn successor_of(&self, i: usize) -> usize {
        (i + 1) % self.ring.len()
    }

    /// Ring index whose contributions index `i` receives
    pub fn predecessor_of(&self, i: usize) -> usize {
        (i + self.ring.len() - 1) % self.ring.len()
    }

    /// Number of on-board rounds, one less than the ring size
    pub fn rounds(&self) -> usize {
        self.ring.len() - 1
    }

    /// Default reset threshold, a simple majority
    pub fn majority(&self) -> usize {
        self.ring.len() / 2 + 1
    }
}

impl TryFrom<Vec<ParticipantId>> for Roster {
    type Error = Error;

    fn try_from(members: Vec<ParticipantId>) -> Result<Self> {
        Roster::new(members)
    }
}

impl From<Roster> for Vec<ParticipantId> {
    fn from(roster: Roster) -> Self {
        roster.ring
    }
}
