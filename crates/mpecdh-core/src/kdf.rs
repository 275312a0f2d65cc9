//! Identity-bound key derivation
//!
//! Session keys are never stored. Each session re-derives them by having the
//! participant's identity sign the suite's domain separation string, hashing
//! the signature with Keccak-256 and mapping the digest into a scalar. The
//! identity signer must therefore be deterministic.

use crate::group::{GroupOperation, KeyPair};
use crate::{Error, ParticipantId, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha3::{Digest, Keccak256};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

/// External signing capability of a participant
pub trait IdentitySigner: Send + Sync {
    /// Identity under which the signatures verify
    fn participant_id(&self) -> ParticipantId;

    /// Deterministically sign a message
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Ed25519 identity signer
pub struct Ed25519Identity {
    key: SigningKey,
}

impl Ed25519Identity {
    /// Create from a 32-byte secret seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a hex encoded seed
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = Zeroizing::new(hex::decode(s.trim().trim_start_matches("0x"))?);
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Format("identity seed must be 32 bytes".into()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Public half of the identity
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Identity")
            .field("participant_id", &self.participant_id())
            .finish()
    }
}

impl IdentitySigner for Ed25519Identity {
    fn participant_id(&self) -> ParticipantId {
        ParticipantId::new(self.key.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

/// Verify an ed25519 signature made by a participant identity
pub fn verify_signature(
    participant: &ParticipantId,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let key = VerifyingKey::from_bytes(participant.as_bytes())
        .map_err(|e| Error::Crypto(format!("invalid identity key: {}", e)))?;
    let signature =
        Signature::from_slice(signature).map_err(|e| Error::Format(e.to_string()))?;
    key.verify(message, &signature)
        .map_err(|_| Error::Unauthorized(format!("bad signature from {}", participant)))
}

/// Derive this session's key pair for backend `G`
#[instrument(skip(signer), fields(suite = %G::SUITE))]
pub fn derive<G, S>(signer: &S) -> Result<KeyPair>
where
    G: GroupOperation,
    S: IdentitySigner + ?Sized,
{
    let signature = Zeroizing::new(signer.sign(G::SUITE.kdf_domain())?);
    let digest: [u8; 32] = Keccak256::digest(signature.as_slice()).into();
    let digest = Zeroizing::new(digest);

    let secret = G::scalar_from_digest(*digest)?;
    let public = G::public_element(&secret)?;

    debug!(participant = %signer.participant_id(), "Derived session key pair");
    Ok(KeyPair { secret, public })
}
