//! The fixed-depth sparse Merkle tree over account `idx` (`spec.md` §4.1).
//! Unlike a content-addressed trie, position is direct: `idx`'s low
//! `NLevels` bits (LSB-first) *are* the descent path, so there is never a
//! leaf-collision to resolve by pushing nodes down — every `idx` owns a
//! unique slot in a tree of depth `NLevels`. Empty subtrees are the literal
//! zero field element, never a hash of zeros, so an all-empty tree's root is
//! `0` without doing any hashing at all.

use crate::error::StateDbError;
use crate::statedb::kv::Kv;
use rollup_common::{poseidon, Field};

/// Marker prepended to a leaf's fields before hashing, distinguishing a leaf
/// node from an internal one (`spec.md` §4.1: `leaf: (1‖key‖valueHash)`).
const LEAF_MARKER: u64 = 1;

pub fn zero() -> Field {
    Field::from(0u64)
}

/// The Merkle leaf-node hash for an account occupying `idx`, wrapping its
/// value hash ([`rollup_types::Account::leaf_hash`]) with the leaf marker
/// and position so it can't be confused with an internal node or another
/// idx's leaf.
pub fn leaf_node_hash(idx: u64, value_hash: Field) -> Field {
    poseidon::hash(&[Field::from(LEAF_MARKER), Field::from(idx), value_hash])
        .expect("fixed arity 3 hash never fails")
}

fn internal_node_hash(left: Field, right: Field) -> Field {
    poseidon::hash(&[left, right]).expect("fixed arity 2 hash never fails")
}

fn field_to_key(f: Field) -> Vec<u8> {
    use ark_ff::PrimeField;
    f.into_bigint().to_bytes_be()
}

fn key_to_field(bytes: &[u8]) -> Field {
    use ark_ff::PrimeField;
    Field::from_be_bytes_mod_order(bytes)
}

/// `(left, right)` children of an internal node, content-addressed by the
/// node's own hash in the `mt` column family.
fn get_children(kv: &Kv, node: Field) -> Result<(Field, Field), StateDbError> {
    if node == zero() {
        return Ok((zero(), zero()));
    }
    let raw = kv
        .get_node(&field_to_key(node))?
        .ok_or_else(|| StateDbError::CheckpointCorrupt(format!("dangling mt node {node}")))?;
    if raw.len() != 64 {
        return Err(StateDbError::CheckpointCorrupt(format!(
            "mt node {node} has malformed encoding"
        )));
    }
    Ok((key_to_field(&raw[..32]), key_to_field(&raw[32..])))
}

fn put_children(kv: &Kv, node: Field, left: Field, right: Field) -> Result<(), StateDbError> {
    let mut raw = vec![0u8; 64];
    let left_bytes = field_to_key(left);
    let right_bytes = field_to_key(right);
    raw[32 - left_bytes.len()..32].copy_from_slice(&left_bytes);
    raw[64 - right_bytes.len()..64].copy_from_slice(&right_bytes);
    kv.put_node(&field_to_key(node), &raw)
}

/// Sets the leaf at `idx` to `value_hash` and returns the new root,
/// recursing from the root down to the leaf, flipping direction on the
/// `level`-th bit of `idx` (LSB-first) at each step, and rehashing every
/// internal node on the path back up.
pub fn update(
    kv: &Kv,
    root: Field,
    idx: u64,
    n_levels: u32,
    value_hash: Field,
) -> Result<Field, StateDbError> {
    let new_leaf = leaf_node_hash(idx, value_hash);
    update_recursive(kv, root, idx, 0, n_levels, new_leaf)
}

fn update_recursive(
    kv: &Kv,
    node: Field,
    idx: u64,
    level: u32,
    n_levels: u32,
    new_leaf: Field,
) -> Result<Field, StateDbError> {
    if level == n_levels {
        return Ok(new_leaf);
    }
    let (left, right) = get_children(kv, node)?;
    let bit = (idx >> level) & 1;
    let (new_left, new_right) = if bit == 0 {
        (
            update_recursive(kv, left, idx, level + 1, n_levels, new_leaf)?,
            right,
        )
    } else {
        (
            left,
            update_recursive(kv, right, idx, level + 1, n_levels, new_leaf)?,
        )
    };
    if new_left == zero() && new_right == zero() {
        return Ok(zero());
    }
    let hash = internal_node_hash(new_left, new_right);
    put_children(kv, hash, new_left, new_right)?;
    Ok(hash)
}

/// The raw value hash stored at `idx`'s leaf, or `None` if the slot is
/// empty. Used to tell "account doesn't exist" from "account exists with
/// this value" without unwrapping the leaf-marker encoding at call sites.
pub fn get_leaf_value(
    kv: &Kv,
    root: Field,
    idx: u64,
    n_levels: u32,
) -> Result<Option<(Field, Vec<Field>)>, StateDbError> {
    let mut node = root;
    let mut siblings = Vec::with_capacity(n_levels as usize);
    let mut path = Vec::with_capacity(n_levels as usize);
    for level in 0..n_levels {
        path.push(node);
        let (left, right) = get_children(kv, node)?;
        let bit = (idx >> level) & 1;
        if bit == 0 {
            siblings.push(right);
            node = left;
        } else {
            siblings.push(left);
            node = right;
        }
    }
    if node == zero() {
        Ok(None)
    } else {
        Ok(Some((node, siblings)))
    }
}

/// Siblings from leaf to root (index `0` = closest to the leaf), the shape
/// `ZKInputs`/circuit proofs expect; `None` when `idx`'s slot is empty, in
/// which case the proof still verifies as a non-membership witness.
pub fn proof(kv: &Kv, root: Field, idx: u64, n_levels: u32) -> Result<Vec<Field>, StateDbError> {
    Ok(get_leaf_value(kv, root, idx, n_levels)?
        .map(|(_, siblings)| siblings)
        .unwrap_or_else(|| vec![zero(); n_levels as usize]))
}

/// Recomputes the root along `idx`'s path from a claimed leaf node hash and
/// its siblings, verifying membership (or non-membership, when
/// `leaf_node` is `None`) without touching the store.
pub fn verify_proof(
    idx: u64,
    n_levels: u32,
    leaf_node: Option<Field>,
    siblings: &[Field],
    claimed_root: Field,
) -> bool {
    if siblings.len() != n_levels as usize {
        return false;
    }
    let mut node = leaf_node.unwrap_or_else(zero);
    for level in (0..n_levels).rev() {
        let bit = (idx >> level) & 1;
        let sibling = siblings[level as usize];
        node = if bit == 0 {
            internal_node_hash(node, sibling)
        } else {
            internal_node_hash(sibling, node)
        };
    }
    node == claimed_root
}
