//! Curve25519 scalar multiplication backend

use super::{GroupOperation, SecretScalar, Suite};
use crate::{Element, Error, Result};
use x25519_dalek::{x25519, X25519_BASEPOINT_BYTES};

/// Width of a Montgomery u-coordinate
pub const ELEMENT_LEN: usize = 32;

/// X25519 group operation
///
/// Scalars are clamped by the ladder, so any 32 bytes form a valid scalar and
/// any 32 bytes form a valid u-coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519;

fn u_coordinate(element: &Element) -> Result<[u8; 32]> {
    element.as_bytes().try_into().map_err(|_| {
        Error::Format(format!(
            "x25519 element must be {} bytes, got {}",
            ELEMENT_LEN,
            element.len()
        ))
    })
}

impl GroupOperation for X25519 {
    const SUITE: Suite = Suite::X25519;

    fn generator() -> Element {
        Element::from(X25519_BASEPOINT_BYTES)
    }

    fn scalar_from_digest(digest: [u8; 32]) -> Result<SecretScalar> {
        Ok(SecretScalar::new(digest))
    }

    fn validate(element: &Element) -> Result<()> {
        u_coordinate(element).map(|_| ())
    }

    fn apply(scalar: &SecretScalar, element: &Element) -> Result<Element> {
        let u = u_coordinate(element)?;
        Ok(Element::from(x25519(*scalar.expose(), u)))
    }
}
