//! Commutative group operations
//!
//! The ceremony only needs one primitive: a deterministic scalar action
//! `apply(s, e)` with `apply(s2, apply(s1, e)) == apply(s1, apply(s2, e))`.
//! Two interchangeable backends are provided:
//! - [`X25519`]: scalar multiplication on Curve25519
//! - [`Modp2048`]: modular exponentiation in the RFC 3526 2048-bit group

pub mod modp;
pub mod x25519;

pub use modp::Modp2048;
pub use x25519::X25519;

use crate::{Element, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Scalar action shared by every ceremony backend
pub trait GroupOperation: Send + Sync + 'static {
    /// Runtime tag of this backend
    const SUITE: Suite;

    /// Canonical base element
    fn generator() -> Element;

    /// Map a 32-byte digest into a valid private scalar
    fn scalar_from_digest(digest: [u8; 32]) -> Result<SecretScalar>;

    /// Check an element encoding (width and range, not content)
    fn validate(element: &Element) -> Result<()>;

    /// Apply `scalar` to `element`
    fn apply(scalar: &SecretScalar, element: &Element) -> Result<Element>;

    /// Public element for a private scalar
    fn public_element(scalar: &SecretScalar) -> Result<Element> {
        Self::apply(scalar, &Self::generator())
    }
}

/// Backend tag carried by every ceremony instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// Curve25519 Montgomery ladder
    X25519,
    /// RFC 3526 group 14 modular exponentiation
    Modp2048,
}

impl Suite {
    /// Encoded element width in bytes
    pub fn element_len(&self) -> usize {
        match self {
            Suite::X25519 => x25519::ELEMENT_LEN,
            Suite::Modp2048 => modp::ELEMENT_LEN,
        }
    }

    /// Domain separation string signed by the KDF
    pub fn kdf_domain(&self) -> &'static [u8] {
        match self {
            Suite::X25519 => b"MPECDH_X25519_KDF_SEED",
            Suite::Modp2048 => b"MPECDH_MODP2048_KDF_SEED",
        }
    }

    /// Validate an element encoding for this suite
    pub fn validate(&self, element: &Element) -> Result<()> {
        match self {
            Suite::X25519 => X25519::validate(element),
            Suite::Modp2048 => Modp2048::validate(element),
        }
    }

    /// Base element for this suite
    pub fn generator(&self) -> Element {
        match self {
            Suite::X25519 => X25519::generator(),
            Suite::Modp2048 => Modp2048::generator(),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suite::X25519 => f.write_str("x25519"),
            Suite::Modp2048 => f.write_str("modp2048"),
        }
    }
}

impl FromStr for Suite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x25519" => Ok(Suite::X25519),
            "modp2048" => Ok(Suite::Modp2048),
            other => Err(Error::InvalidConfig(format!("unknown suite: {}", other))),
        }
    }
}

/// Private scalar, wiped on drop
#[derive(Clone)]
pub struct SecretScalar(Zeroizing<[u8; 32]>);

impl SecretScalar {
    /// Wrap raw scalar bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse from a byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Format(format!("scalar must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self::new(array))
    }

    /// Scalar bytes
    pub fn expose(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

/// Session key pair derived by the KDF
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private scalar
    pub secret: SecretScalar,
    /// `apply(secret, generator)`
    pub public: Element,
}
