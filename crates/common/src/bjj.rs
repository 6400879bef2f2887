//! Baby-JubJub: the twisted-Edwards curve embedded in BN254 used to
//! authenticate L2 txs (Poseidon-EdDSA). Keys are carried on the wire in
//! hermez's 32-byte compressed form: the `ay` coordinate little-endian, with
//! the top bit of the last byte repurposed as the sign of `ax`.

use ark_ec::twisted_edwards::{Affine, TECurveConfig};
use ark_ed_on_bn254::{EdwardsAffine, EdwardsConfig, Fq};
use ark_ff::{BigInteger, Field, PrimeField};
use thiserror::Error;

pub type Point = EdwardsAffine;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BjjError {
    #[error("compressed point does not lie on the Baby-JubJub curve")]
    NotOnCurve,
    #[error("ay coordinate {0:?} is not a valid field element")]
    InvalidCoordinate(Vec<u8>),
}

/// Compresses a point to hermez's 32-byte `(sign, ay)` wire form.
pub fn compress(point: &Point) -> [u8; 32] {
    let mut bytes = field_to_le_bytes(point.y);
    let half = Fq::from_bigint(Fq::MODULUS_MINUS_ONE_DIV_TWO).expect("valid field element");
    if point.x > half {
        bytes[31] |= 0x80;
    }
    bytes
}

/// Recovers the curve point from its compressed form, rejecting inputs that
/// don't correspond to a point on the curve.
pub fn decompress(bytes: [u8; 32]) -> Result<Point, BjjError> {
    let sign = bytes[31] & 0x80 != 0;
    let mut y_bytes = bytes;
    y_bytes[31] &= 0x7f;
    let y = Fq::from_random_bytes(&y_bytes).ok_or_else(|| {
        BjjError::InvalidCoordinate(y_bytes.to_vec())
    })?;

    let a = EdwardsConfig::COEFF_A;
    let d = EdwardsConfig::COEFF_D;
    let y2 = y * y;
    let numerator = Fq::from(1u64) - y2;
    let denominator = a - d * y2;
    let denominator_inv = denominator.inverse().ok_or(BjjError::NotOnCurve)?;
    let x2 = numerator * denominator_inv;
    let mut x = x2.sqrt().ok_or(BjjError::NotOnCurve)?;

    let half = Fq::from_bigint(Fq::MODULUS_MINUS_ONE_DIV_TWO).expect("valid field element");
    let x_is_high = x > half;
    if x_is_high != sign {
        x = -x;
    }

    let point = Affine::new(x, y);
    if !point.is_on_curve() {
        return Err(BjjError::NotOnCurve);
    }
    Ok(point)
}

fn field_to_le_bytes(f: Fq) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = f.into_bigint().to_bytes_le();
    out[..bytes.len().min(32)].copy_from_slice(&bytes[..bytes.len().min(32)]);
    out
}

/// Re-embeds a Baby-JubJub base-field element as a BN254 scalar-field
/// element. Both primes are identical by construction (that's what makes
/// Baby-JubJub "embedded" in BN254); only the Rust type differs.
pub fn fq_to_bn254_fr(f: Fq) -> ark_bn254::Fr {
    let bytes = f.into_bigint().to_bytes_le();
    ark_bn254::Fr::from_le_bytes_mod_order(&bytes)
}

/// The sign bit hermez's leaf/signature encodings carry alongside `ay`.
pub fn sign_bit(point: &Point) -> bool {
    let half = Fq::from_bigint(Fq::MODULUS_MINUS_ONE_DIV_TWO).expect("valid field element");
    point.x > half
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::CurveGroup;
    use ark_ed_on_bn254::EdwardsProjective;
    use ark_ff::UniformRand;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn compress_decompress_roundtrip() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..16 {
            let point = (EdwardsProjective::rand(&mut rng)).into_affine();
            let compressed = compress(&point);
            let decompressed = decompress(compressed).expect("valid point");
            assert_eq!(point, decompressed);
        }
    }

    #[test]
    fn rejects_non_curve_ay() {
        // An all-0xFF coordinate is extremely unlikely to satisfy the curve
        // equation; this input must be rejected rather than silently
        // producing a bogus point.
        let bytes = [0xFFu8; 32];
        assert!(matches!(
            decompress(bytes),
            Err(BjjError::InvalidCoordinate(_)) | Err(BjjError::NotOnCurve)
        ));
    }
}
