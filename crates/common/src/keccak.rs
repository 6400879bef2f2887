//! Keccak-256, truncated to 253 bits, used for `ZKInputs::global_chain_data_hash`
//! — the single public input the circuit exposes.

use tiny_keccak::{Hasher, Keccak};

/// Number of high bits to clear so the digest fits inside the BN254 scalar
/// field (254 bits wide; we additionally clear one more for headroom, giving
/// 253 usable bits).
const TRUNCATE_BITS: u32 = 3;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Hashes `data` and clears the top [`TRUNCATE_BITS`] bits of the digest so
/// the result is guaranteed to fit as a BN254 field element.
pub fn keccak256_truncated_253(data: &[u8]) -> [u8; 32] {
    let mut digest = keccak256(data);
    digest[0] &= 0xff >> TRUNCATE_BITS;
    digest
}
