//! The circuit's 40-bit floating-point amount encoding: a 5-bit exponent and
//! a 35-bit mantissa, `value = mantissa * 10^exponent`. Used everywhere an
//! `amount`/`fee` crosses the L2-tx signing boundary, since the circuit only
//! ever sees this packed form.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use thiserror::Error;

/// Width of the mantissa field, in bits.
const MANTISSA_BITS: u32 = 35;
/// Width of the exponent field, in bits.
const EXPONENT_BITS: u32 = 5;
const MAX_MANTISSA: u64 = (1u64 << MANTISSA_BITS) - 1;
const MAX_EXPONENT: u32 = (1u32 << EXPONENT_BITS) - 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Float40Error {
    #[error("value {0} is not representable as a (5,35) float without loss of precision")]
    NotRepresentable(BigUint),
    #[error("packed float40 value {0:#x} uses bits outside the 40-bit range")]
    OutOfRange(u64),
}

/// A value already packed into the circuit's 40-bit float encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Float40(u64);

impl Float40 {
    pub const ZERO: Float40 = Float40(0);

    /// Wraps a raw 40-bit packed value (as carried on the wire), validating
    /// that no bit above position 39 is set.
    pub fn from_raw(raw: u64) -> Result<Self, Float40Error> {
        if raw >> 40 != 0 {
            return Err(Float40Error::OutOfRange(raw));
        }
        Ok(Float40(raw))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    fn pack(exponent: u32, mantissa: u64) -> Self {
        debug_assert!(exponent <= MAX_EXPONENT);
        debug_assert!(mantissa <= MAX_MANTISSA);
        Float40((mantissa << EXPONENT_BITS) | exponent as u64)
    }

    fn unpack(self) -> (u32, u64) {
        let exponent = (self.0 & MAX_EXPONENT as u64) as u32;
        let mantissa = self.0 >> EXPONENT_BITS;
        (exponent, mantissa)
    }

    /// Encodes `value` exactly, choosing the largest exponent (hence the
    /// smallest mantissa) that reproduces `value` without loss. Rejects
    /// values that cannot be represented exactly — amounts must be agreed
    /// byte-for-byte between coordinators, so lossy encoding is never
    /// acceptable on the hot path.
    pub fn encode(value: &BigUint) -> Result<Self, Float40Error> {
        if value.is_zero() {
            return Ok(Float40::ZERO);
        }
        let ten = BigUint::from(10u32);
        let mut exponent = 0u32;
        let mut mantissa = value.clone();
        while exponent < MAX_EXPONENT {
            let (q, r) = num_integer::Integer::div_rem(&mantissa, &ten);
            if !r.is_zero() {
                break;
            }
            mantissa = q;
            exponent += 1;
        }
        let mantissa = mantissa
            .to_u64()
            .filter(|m| *m <= MAX_MANTISSA)
            .ok_or_else(|| Float40Error::NotRepresentable(value.clone()))?;
        // Confirm the chosen (exponent, mantissa) reproduces `value` exactly;
        // guards against values whose trailing decimal zeros run out before
        // the mantissa fits into 35 bits.
        let roundtrip = BigUint::from(mantissa) * ten.pow(exponent);
        if &roundtrip != value {
            return Err(Float40Error::NotRepresentable(value.clone()));
        }
        Ok(Float40::pack(exponent, mantissa))
    }

    /// Decodes back to the represented integer value. Always exact: decoding
    /// is pure multiplication, never a source of loss.
    pub fn decode(self) -> BigUint {
        let (exponent, mantissa) = self.unpack();
        BigUint::from(mantissa) * BigUint::from(10u32).pow(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(100)]
    #[test_case(12345)]
    #[test_case(10_000_000_000u64)]
    #[test_case(340_000_000_000_000u64)]
    fn roundtrip_identity_on_representable_values(value: u64) {
        let value = BigUint::from(value);
        let encoded = Float40::encode(&value).expect("representable");
        assert_eq!(encoded.decode(), value);
    }

    #[test]
    fn rejects_values_that_lose_precision() {
        // 35-bit mantissa max is 34_359_738_367; one more non-zero digit of
        // precision than that, with no trailing zeros, cannot be packed.
        let value = BigUint::from(34_359_738_367u64 + 1);
        assert!(Float40::encode(&value).is_err());
    }

    #[test]
    fn from_raw_rejects_bits_above_39() {
        assert!(Float40::from_raw(1u64 << 40).is_err());
        assert!(Float40::from_raw((1u64 << 40) - 1).is_ok());
    }
}
