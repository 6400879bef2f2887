//! Poseidon-EdDSA over Baby-JubJub: the signature scheme L2 txs carry.
//!
//! A Schnorr-style construction on the twisted-Edwards curve, using Poseidon
//! (instead of SHA-512 as in classic EdDSA) to derive both the per-signature
//! nonce and the Fiat-Shamir challenge. This mirrors the construction used by
//! iden3/hermez-style circuits: the same hash family that authenticates
//! account leaves also authenticates transactions, so the whole signable
//! surface lives in one field.

use crate::bjj::Point;
use crate::{bjj, poseidon, Field};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::Fr as BjjScalar;
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Baby-JubJub private key: a scalar in the curve's prime-order subgroup.
#[derive(Clone, Copy)]
pub struct PrivateKey(pub BjjScalar);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r8: Point,
    pub s: BjjScalar,
}

/// Neither `ark_ed_on_bn254::EdwardsAffine` nor `Fr` carry `serde::Serialize`
/// (arkworks uses `CanonicalSerialize` instead, see `crate::field_serde`);
/// encoded here as the same 32-byte compressed point plus a 32-byte
/// little-endian scalar that the wire format and the pool's persisted
/// signatures use.
impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&bjj::compress(&self.r8));
        bytes[32..].copy_from_slice(&self.s.into_bigint().to_bytes_le());
        bytes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 64]>::deserialize(deserializer)?;
        let mut r8_bytes = [0u8; 32];
        r8_bytes.copy_from_slice(&bytes[..32]);
        let r8 = bjj::decompress(r8_bytes).map_err(serde::de::Error::custom)?;
        let s = BjjScalar::from_le_bytes_mod_order(&bytes[32..]);
        Ok(Signature { r8, s })
    }
}

impl PrivateKey {
    pub fn public(&self) -> Point {
        (Point::generator() * self.0).into_affine()
    }

    /// Signs `msg` (a field element — in practice the tx's Poseidon signable
    /// hash). The per-signature nonce is derived deterministically from the
    /// private key and the message, so signing is a pure function: no RNG,
    /// no nonce-reuse surface.
    pub fn sign(&self, msg: Field) -> Signature {
        let pk = self.public();
        let nonce_seed = poseidon::hash(&[scalar_to_field(self.0), msg])
            .expect("fixed arity 2 hash never fails");
        let r_scalar = field_to_scalar(nonce_seed);
        let r8 = (Point::generator() * r_scalar).into_affine();
        let h = challenge(&r8, &pk, msg);
        let s = r_scalar + field_to_scalar(h) * self.0;
        Signature { r8, s }
    }
}

/// Verifies `sig` over `msg` against the claimed public key `pk`. Any
/// mismatch — wrong key, wrong message, tampered signature — fails closed.
pub fn verify(pk: &Point, msg: Field, sig: &Signature) -> bool {
    let h = challenge(&sig.r8, pk, msg);
    let lhs = Point::generator() * sig.s;
    let rhs = sig.r8 + *pk * field_to_scalar(h);
    lhs.into_affine() == rhs.into_affine()
}

/// The Fiat-Shamir challenge `Poseidon(R8.x, R8.y, A.x, A.y, msg)`, binding
/// the nonce commitment, the signer's key, and the message into one scalar.
fn challenge(r8: &Point, pk: &Point, msg: Field) -> Field {
    poseidon::hash(&[
        crate::bjj::fq_to_bn254_fr(r8.x),
        crate::bjj::fq_to_bn254_fr(r8.y),
        crate::bjj::fq_to_bn254_fr(pk.x),
        crate::bjj::fq_to_bn254_fr(pk.y),
        msg,
    ])
    .expect("fixed arity 5 hash never fails")
}

fn scalar_to_field(s: BjjScalar) -> Field {
    Field::from_le_bytes_mod_order(&s.into_bigint().to_bytes_le())
}

fn field_to_scalar(f: Field) -> BjjScalar {
    BjjScalar::from_le_bytes_mod_order(&f.into_bigint().to_bytes_le())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::UniformRand;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_key(seed: u64) -> PrivateKey {
        let mut rng = StdRng::seed_from_u64(seed);
        PrivateKey(BjjScalar::rand(&mut rng))
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let sk = sample_key(1);
        let msg = Field::from(42u64);
        let sig = sk.sign(msg);
        assert!(verify(&sk.public(), msg, &sig));
    }

    #[test]
    fn verify_fails_on_tampered_message() {
        let sk = sample_key(2);
        let msg = Field::from(42u64);
        let sig = sk.sign(msg);
        assert!(!verify(&sk.public(), Field::from(43u64), &sig));
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sk = sample_key(3);
        let other = sample_key(4);
        let msg = Field::from(7u64);
        let sig = sk.sign(msg);
        assert!(!verify(&other.public(), msg, &sig));
    }

    #[test]
    fn signing_is_deterministic() {
        let sk = sample_key(5);
        let msg = Field::from(1000u64);
        assert_eq!(sk.sign(msg).s, sk.sign(msg).s);
    }
}
