//! Ceremony Board Library
//!
//! Hosts ring ceremony instances for participants that only share an
//! authenticated bulletin board. Every submission carries an ed25519
//! signature by the submitting roster member over the instance, epoch, round
//! and element, so the board attributes each value without trusting the
//! transport.

pub mod wire;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use mpecdh_core::kdf::verify_signature;
use mpecdh_core::{
    Ceremony, CeremonyInfo, Element, InstanceId, ParticipantId, Prep, Status, ThresholdApproval,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use wire::{CreateRequest, ErrorBody, ErrorCode, SubmitRequest, SubmitResponse};

/// Board error types
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Ceremony not found: {0}")]
    NotFound(InstanceId),
    #[error("Ceremony already exists: {0}")]
    Conflict(InstanceId),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Ceremony(#[from] mpecdh_core::Error),
}

pub type Result<T> = std::result::Result<T, BoardError>;

impl BoardError {
    /// Wire category of this error
    pub fn code(&self) -> ErrorCode {
        use mpecdh_core::Error;

        match self {
            BoardError::NotFound(_) => ErrorCode::NotFound,
            BoardError::Conflict(_) => ErrorCode::Conflict,
            BoardError::InvalidRequest(_) => ErrorCode::Format,
            BoardError::Ceremony(e) => match e {
                Error::Format(_) | Error::Deserialization(_) => ErrorCode::Format,
                Error::OutOfOrder { .. } => ErrorCode::OutOfOrder,
                Error::Unauthorized(_) => ErrorCode::Unauthorized,
                Error::UnknownParticipant(_) => ErrorCode::UnknownParticipant,
                Error::InvalidConfig(_) => ErrorCode::InvalidConfig,
                Error::NotFound(_) => ErrorCode::NotFound,
                _ => ErrorCode::Internal,
            },
        }
    }

    /// Response payload for this error
    pub fn body(&self) -> ErrorBody {
        let (participant, status) = match self {
            BoardError::Ceremony(mpecdh_core::Error::OutOfOrder {
                participant,
                status,
            }) => (Some(*participant), Some(*status)),
            BoardError::Ceremony(mpecdh_core::Error::UnknownParticipant(participant)) => {
                (Some(*participant), None)
            }
            _ => (None, None),
        };
        ErrorBody {
            error: self.to_string(),
            code: self.code(),
            participant,
            status,
        }
    }
}

/// Hosted instance
#[derive(Debug, Clone)]
pub struct Entry {
    /// Ceremony state
    pub ceremony: Ceremony,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last submission or reset
    pub updated_at: DateTime<Utc>,
}

/// Ceremony board store
///
/// Each instance sits behind its map shard lock, so a submission's signature
/// check and state transition happen under one write guard.
#[derive(Clone)]
pub struct Board {
    ceremonies: Arc<DashMap<InstanceId, Entry>>,
    /// Idle time after which an instance is dropped, in seconds
    ttl_seconds: i64,
}

impl Board {
    /// Create an empty board
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ceremonies: Arc::new(DashMap::new()),
            ttl_seconds,
        }
    }

    /// Number of hosted instances
    pub fn len(&self) -> usize {
        self.ceremonies.len()
    }

    /// Whether the board hosts no instance
    pub fn is_empty(&self) -> bool {
        self.ceremonies.is_empty()
    }

    /// Create an instance at its derived address
    ///
    /// The roster must have co-signed the creation, so nobody can squat an
    /// address with a different suite or reset threshold.
    pub fn create(&self, req: CreateRequest) -> Result<CeremonyInfo> {
        let config = req.config()?;
        let instance = config.instance;

        if !req.approval.authorizes_creation(&config) {
            warn!(%instance, "Rejected unapproved creation");
            return Err(mpecdh_core::Error::Unauthorized(format!(
                "creating {} needs roster approval",
                instance
            ))
            .into());
        }

        match self.ceremonies.entry(instance) {
            MapEntry::Occupied(_) => Err(BoardError::Conflict(instance)),
            MapEntry::Vacant(slot) => {
                let ceremony = Ceremony::new(config)?;
                let info = ceremony.info();
                let now = Utc::now();
                slot.insert(Entry {
                    ceremony,
                    created_at: now,
                    updated_at: now,
                });
                info!(%instance, suite = %info.suite, participants = info.ring.len(), "Ceremony created");
                Ok(info)
            }
        }
    }

    fn read<R>(&self, instance: &InstanceId, f: impl FnOnce(&Ceremony) -> R) -> Result<R> {
        self.ceremonies
            .get(instance)
            .map(|entry| f(&entry.ceremony))
            .ok_or(BoardError::NotFound(*instance))
    }

    /// Public summary of an instance
    pub fn info(&self, instance: &InstanceId) -> Result<CeremonyInfo> {
        self.read(instance, Ceremony::info)
    }

    /// One participant's snapshot
    pub fn prep(&self, instance: &InstanceId, participant: &ParticipantId) -> Result<Prep> {
        Ok(self.read(instance, |c| c.snapshot(participant))??)
    }

    /// Participants holding up the current round
    pub fn blocking(&self, instance: &InstanceId) -> Result<Vec<ParticipantId>> {
        self.read(instance, Ceremony::blocking)
    }

    /// Mailbox of the participant at ring index `index`
    pub fn queue(&self, instance: &InstanceId, index: usize) -> Result<Vec<Element>> {
        self.read(instance, |c| c.queue(index).map(<[Element]>::to_vec))?
            .ok_or_else(|| BoardError::InvalidRequest(format!("no ring index {}", index)))
    }

    /// Verify and apply a signed contribution
    pub fn submit(&self, instance: &InstanceId, req: SubmitRequest) -> Result<SubmitResponse> {
        let mut entry = self
            .ceremonies
            .get_mut(instance)
            .ok_or(BoardError::NotFound(*instance))?;

        // roster membership before the signature
        entry.ceremony.status(&req.participant)?;
        if let Err(e) = verify_signature(&req.participant, &req.message(instance), &req.signature) {
            warn!(%instance, participant = %req.participant, "Rejected submission signature");
            return Err(e.into());
        }

        let round =
            entry
                .ceremony
                .submit_at(&req.participant, req.epoch, req.round, req.element)?;
        let status: Status = entry.ceremony.status(&req.participant)?;
        entry.updated_at = Utc::now();

        debug!(%instance, participant = %req.participant, round, %status, "Submission accepted");
        Ok(SubmitResponse { round, status })
    }

    /// Reset an instance under a co-signed approval
    pub fn reset(&self, instance: &InstanceId, approval: &ThresholdApproval) -> Result<CeremonyInfo> {
        let mut entry = self
            .ceremonies
            .get_mut(instance)
            .ok_or(BoardError::NotFound(*instance))?;

        entry.ceremony.reset(approval)?;
        entry.updated_at = Utc::now();
        Ok(entry.ceremony.info())
    }

    /// Drop instances idle for longer than the TTL
    pub fn cleanup(&self) {
        let now = Utc::now();
        let ttl = chrono::Duration::seconds(self.ttl_seconds);
        let before = self.ceremonies.len();
        self.ceremonies.retain(|_, e| e.updated_at + ttl > now);

        let dropped = before.saturating_sub(self.ceremonies.len());
        if dropped > 0 {
            info!(dropped, "Expired idle ceremonies");
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(24 * 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpecdh_core::group::{GroupOperation, X25519};
    use mpecdh_core::{kdf, Ed25519Identity, IdentitySigner, Suite};

    fn signers() -> Vec<Ed25519Identity> {
        (1u8..=3).map(|i| Ed25519Identity::from_seed(&[i; 32])).collect()
    }

    fn request(master: &str, signers: &[Ed25519Identity]) -> CreateRequest {
        let mut req = CreateRequest::new(
            master,
            signers.iter().map(|s| s.participant_id()).collect(),
            Suite::X25519,
            None,
        );
        for signer in signers {
            req.approve(signer).unwrap();
        }
        req
    }

    fn create(board: &Board, signers: &[Ed25519Identity]) -> CeremonyInfo {
        board.create(request("0xabcdef", signers)).unwrap()
    }

    fn signed(
        board: &Board,
        instance: &InstanceId,
        signer: &Ed25519Identity,
        element: Element,
    ) -> SubmitRequest {
        let prep = board.prep(instance, &signer.participant_id()).unwrap();
        SubmitRequest::sign(signer, instance, prep.epoch, prep.round, element).unwrap()
    }

    #[test]
    fn test_create_conflict() {
        let board = Board::default();
        let signers = signers();
        let info = create(&board, &signers);
        assert_eq!(info.reset_threshold, 2);
        assert_eq!(board.len(), 1);

        let mut reversed = signers;
        reversed.reverse();
        let err = board.create(request("abcdef", &reversed)).unwrap_err();
        assert!(matches!(err, BoardError::Conflict(id) if id == info.instance));
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn test_create_needs_roster_approval() {
        let board = Board::default();
        let signers = signers();

        let mut req = request("0xabcdef", &signers);
        req.approval.approvals.truncate(1);
        let err = board.create(req).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);

        // approvals for one threshold do not authorize another
        let mut req = request("0xabcdef", &signers);
        req.reset_threshold = Some(3);
        assert_eq!(board.create(req).unwrap_err().code(), ErrorCode::Unauthorized);
        assert!(board.is_empty());
    }

    #[test]
    fn test_create_rejects_small_roster() {
        let board = Board::default();
        let roster = signers()[..2].iter().map(|s| s.participant_id()).collect();
        let err = board
            .create(CreateRequest::new("00", roster, Suite::X25519, None))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert!(board.is_empty());
    }

    #[test]
    fn test_signed_submit() {
        let board = Board::default();
        let signers = signers();
        let instance = create(&board, &signers).instance;
        let key = kdf::derive::<X25519, _>(&signers[0]).unwrap();

        let req = signed(&board, &instance, &signers[0], key.public.clone());
        let resp = board.submit(&instance, req.clone()).unwrap();
        assert_eq!(resp.round, 0);
        assert_eq!(resp.status, Status::Waiting);

        // the same signed request cannot be replayed into the next round
        let err = board.submit(&instance, req.clone()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfOrder);

        // nor relabelled with it
        let mut relabelled = req;
        relabelled.round = 1;
        let err = board.submit(&instance, relabelled).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_submit_computed_before_reset() {
        let board = Board::default();
        let signers = signers();
        let info = create(&board, &signers);
        let instance = info.instance;
        for signer in &signers {
            let req = signed(&board, &instance, signer, X25519::generator());
            board.submit(&instance, req).unwrap();
        }
        let stale = signed(&board, &instance, &signers[0], Element::from([7u8; 32]));
        assert_eq!((stale.epoch, stale.round), (0, 1));

        let message = mpecdh_core::auth::reset_message(&instance, 0);
        let mut approval = ThresholdApproval::new();
        for signer in &signers[1..] {
            approval.approve(signer, &message).unwrap();
        }
        board.reset(&instance, &approval).unwrap();

        let body = board.submit(&instance, stale).unwrap_err().body();
        assert_eq!(body.code, ErrorCode::OutOfOrder);
        assert_eq!(body.status, Some(Status::NotStarted));
        for index in 0..info.ring.len() {
            assert!(board.queue(&instance, index).unwrap().is_empty());
        }
    }

    #[test]
    fn test_submit_signed_by_someone_else() {
        let board = Board::default();
        let signers = signers();
        let instance = create(&board, &signers).instance;

        let mut req = signed(&board, &instance, &signers[1], X25519::generator());
        req.participant = signers[0].participant_id();
        let err = board.submit(&instance, req).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(
            board.prep(&instance, &signers[0].participant_id()).unwrap().status,
            Status::NotStarted
        );
    }

    #[test]
    fn test_out_of_order_body() {
        let board = Board::default();
        let signers = signers();
        let instance = create(&board, &signers).instance;

        let first = signed(&board, &instance, &signers[0], Element::from([9u8; 32]));
        board.submit(&instance, first).unwrap();
        let again = signed(&board, &instance, &signers[0], Element::from([9u8; 32]));
        let err = board.submit(&instance, again).unwrap_err();

        let body = err.body();
        assert_eq!(body.code, ErrorCode::OutOfOrder);
        assert_eq!(body.status, Some(Status::Waiting));
        assert_eq!(body.participant, Some(signers[0].participant_id()));
    }

    #[test]
    fn test_queue_follows_ring() {
        let board = Board::default();
        let signers = signers();
        let info = create(&board, &signers);
        let instance = info.instance;

        let first = signers
            .iter()
            .find(|s| s.participant_id() == info.ring[0])
            .unwrap();
        let req = signed(&board, &instance, first, Element::from([5u8; 32]));
        board.submit(&instance, req).unwrap();

        assert_eq!(board.queue(&instance, 1).unwrap(), vec![Element::from([5u8; 32])]);
        assert!(board.queue(&instance, 0).unwrap().is_empty());
        assert!(board.queue(&instance, 3).is_err());
        assert_eq!(board.blocking(&instance).unwrap(), info.ring[1..].to_vec());
    }

    #[test]
    fn test_reset_with_approval() {
        let board = Board::default();
        let signers = signers();
        let instance = create(&board, &signers).instance;
        let req = signed(&board, &instance, &signers[2], Element::from([9u8; 32]));
        board.submit(&instance, req).unwrap();

        let message = mpecdh_core::auth::reset_message(&instance, 0);
        let mut approval = ThresholdApproval::new();
        approval.approve(&signers[0], &message).unwrap();
        let err = board.reset(&instance, &approval).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);

        approval.approve(&signers[1], &message).unwrap();
        let info = board.reset(&instance, &approval).unwrap();
        assert_eq!(info.epoch, 1);
        assert_eq!(
            board.prep(&instance, &signers[2].participant_id()).unwrap().status,
            Status::NotStarted
        );
    }

    #[test]
    fn test_not_found() {
        let board = Board::default();
        let instance = InstanceId::derive(b"nowhere", &[], 0);
        assert!(matches!(board.info(&instance), Err(BoardError::NotFound(_))));
        assert_eq!(board.blocking(&instance).unwrap_err().code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_cleanup_drops_idle() {
        let board = Board::new(0);
        create(&board, &signers());
        board.cleanup();
        assert!(board.is_empty());

        let board = Board::new(3600);
        create(&board, &signers());
        board.cleanup();
        assert_eq!(board.len(), 1);
    }
}
