//! # MPECDH Core
//!
//! Core primitives for a ring-based multi-party Diffie-Hellman ceremony.
//!
//! N participants agree on one shared secret using only an append-only,
//! authenticated channel. Each participant's contribution is routed to its
//! successor in a fixed ring; after N-1 on-channel rounds every participant
//! holds the other participants' combined value and applies its own scalar
//! locally.
//!
//! This crate provides:
//! - Group operations ([`group::X25519`], [`group::Modp2048`])
//! - Identity-bound key derivation ([`kdf`])
//! - The ceremony engine ([`Ceremony`])
//! - The [`Channel`] boundary with an in-memory implementation
//! - The participant [`Driver`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use mpecdh_core::{driver, group::X25519, Ceremony, CeremonyConfig, MemoryChannel, Roster, Suite};
//!
//! let roster = Roster::new(signers.iter().map(|s| s.participant_id()))?;
//! let ceremony = Ceremony::new(CeremonyConfig::new(b"master", roster, Suite::X25519))?;
//! let channel = MemoryChannel::new(ceremony);
//!
//! let secrets = driver::run_all::<X25519, _, _>(&channel, &signers, poll).await?;
//! driver::verify_agreement(&secrets)?;
//! ```

pub mod auth;
pub mod ceremony;
pub mod channel;
pub mod driver;
pub mod error;
pub mod group;
pub mod instance;
pub mod kdf;
pub mod types;

pub use auth::{ResetAuthority, ThresholdApproval};
pub use ceremony::{Ceremony, CeremonyConfig, CeremonyInfo, Prep, Roster};
pub use channel::{Channel, MemoryChannel};
pub use driver::{Driver, SharedSecret, Step};
pub use error::{Error, Result};
pub use group::{GroupOperation, Suite};
pub use instance::{InstanceId, PROTOCOL_VERSION};
pub use kdf::{Ed25519Identity, IdentitySigner};
pub use types::{Element, ParticipantId, Status};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
