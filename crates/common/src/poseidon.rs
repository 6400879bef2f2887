//! Poseidon hashing over the BN254 scalar field — the hash family the
//! circuit uses for account leaves, Merkle-tree nodes and L2 tx signables.

use ark_bn254::Fr;
use once_cell::sync::Lazy;
use poseidon_ark::Poseidon;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoseidonError {
    #[error("poseidon hash arity {0} is unsupported (must be 1..=6)")]
    UnsupportedArity(usize),
    #[error("poseidon-ark hash failed: {0}")]
    Backend(String),
}

static POSEIDON: Lazy<Poseidon> = Lazy::new(Poseidon::new);

/// Hashes between 1 and 6 field elements, the arity range the circuit's
/// Poseidon gadget supports.
pub fn hash(inputs: &[Fr]) -> Result<Fr, PoseidonError> {
    if inputs.is_empty() || inputs.len() > 6 {
        return Err(PoseidonError::UnsupportedArity(inputs.len()));
    }
    POSEIDON
        .hash(inputs.to_vec())
        .map_err(PoseidonError::Backend)
}

/// Hashes an arbitrary number of elements by chaining fixed-arity calls,
/// folding the running hash in as the first input of the next call. Used for
/// the account leaf hash and other wide records that exceed arity 6.
pub fn hash_many(inputs: &[Fr]) -> Result<Fr, PoseidonError> {
    if inputs.is_empty() {
        return Err(PoseidonError::UnsupportedArity(0));
    }
    let mut chunks = inputs.chunks(5);
    let mut acc = hash(chunks.next().unwrap())?;
    for chunk in chunks {
        let mut next = Vec::with_capacity(chunk.len() + 1);
        next.push(acc);
        next.extend_from_slice(chunk);
        acc = hash(&next)?;
    }
    Ok(acc)
}
