//! Modular exponentiation backend over the RFC 3526 2048-bit MODP group
//!
//! `p` is a safe prime (`p = 2q + 1`, `q` prime) and `2` generates the
//! subgroup of prime order `q`. Elements are 256-byte big-endian integers,
//! exponents are 256-bit.

use super::{GroupOperation, SecretScalar, Suite};
use crate::{Element, Error, Result};
use elliptic_curve::bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    Encoding, U2048, U256,
};

/// Width of an encoded group element
pub const ELEMENT_LEN: usize = 256;

const LIMBS: usize = U2048::LIMBS;

/// RFC 3526 group 14 prime
const MODULUS: U2048 = U2048::from_be_hex(concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
));

const GENERATOR: u8 = 2;

/// MODP-2048 group operation
#[derive(Debug, Clone, Copy, Default)]
pub struct Modp2048;

fn params() -> DynResidueParams<LIMBS> {
    DynResidueParams::new(&MODULUS)
}

/// Decode and range-check an element: `2 <= x <= p - 2`
fn decode(element: &Element) -> Result<U2048> {
    if element.len() != ELEMENT_LEN {
        return Err(Error::Format(format!(
            "modp2048 element must be {} bytes, got {}",
            ELEMENT_LEN,
            element.len()
        )));
    }
    let x = U2048::from_be_slice(element.as_bytes());
    let p_minus_one = MODULUS.wrapping_sub(&U2048::ONE);
    if x < U2048::from_u8(2) || x >= p_minus_one {
        return Err(Error::Format("modp2048 element out of range".into()));
    }
    Ok(x)
}

fn exponent(scalar: &SecretScalar) -> Result<U256> {
    let e = U256::from_be_slice(scalar.expose());
    if e == U256::ZERO {
        return Err(Error::Format("modp2048 exponent must be non-zero".into()));
    }
    Ok(e)
}

impl GroupOperation for Modp2048 {
    const SUITE: Suite = Suite::Modp2048;

    fn generator() -> Element {
        Element::new(U2048::from_u8(GENERATOR).to_be_bytes().to_vec())
    }

    fn scalar_from_digest(digest: [u8; 32]) -> Result<SecretScalar> {
        let scalar = SecretScalar::new(digest);
        exponent(&scalar)?;
        Ok(scalar)
    }

    fn validate(element: &Element) -> Result<()> {
        decode(element).map(|_| ())
    }

    fn apply(scalar: &SecretScalar, element: &Element) -> Result<Element> {
        let base = decode(element)?;
        let e = exponent(scalar)?;
        let result = DynResidue::new(&base, params()).pow(&e).retrieve();
        Ok(Element::new(result.to_be_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_encoding() {
        let g = Modp2048::generator();
        assert_eq!(g.len(), ELEMENT_LEN);
        assert_eq!(g.as_bytes()[ELEMENT_LEN - 1], 2);
        assert!(Modp2048::validate(&g).is_ok());
    }

    #[test]
    fn test_small_exponent() {
        let mut bytes = [0u8; 32];
        bytes[31] = 10;
        let scalar = Modp2048::scalar_from_digest(bytes).unwrap();
        let out = Modp2048::public_element(&scalar).unwrap();

        let mut expected = vec![0u8; ELEMENT_LEN];
        expected[ELEMENT_LEN - 2] = 0x04; // 2^10 = 0x0400
        assert_eq!(out.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let scalar = SecretScalar::new([1; 32]);

        let one = Element::new(U2048::ONE.to_be_bytes().to_vec());
        assert!(matches!(Modp2048::apply(&scalar, &one), Err(Error::Format(_))));

        let p_minus_one = Element::new(MODULUS.wrapping_sub(&U2048::ONE).to_be_bytes().to_vec());
        assert!(Modp2048::validate(&p_minus_one).is_err());

        let modulus = Element::new(MODULUS.to_be_bytes().to_vec());
        assert!(Modp2048::validate(&modulus).is_err());

        assert!(Modp2048::validate(&Element::new(vec![2; 32])).is_err());
    }

    #[test]
    fn test_rejects_zero_exponent() {
        assert!(matches!(
            Modp2048::scalar_from_digest([0; 32]),
            Err(Error::Format(_))
        ));
    }
}
