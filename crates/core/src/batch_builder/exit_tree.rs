//! The per-batch exit tree: leaves are accounts that exited in this batch,
//! keyed by `idx`, used to generate on-chain withdrawal proofs (`spec.md`
//! §3, "ExitTree"). Unlike the account SMT it never outlives one batch
//! attempt, so it is held entirely in memory rather than in `rocksdb` —
//! same fixed-depth indexed construction as [`crate::statedb::smt`], just
//! backed by a plain map instead of a column family.

use ark_ff::PrimeField;
use rollup_common::{poseidon, Field};
use rollup_types::ids::{Idx, TokenId};
use rollup_types::zk_inputs::MerkleProof;
use rustc_hash::FxHashMap;

const LEAF_MARKER: u64 = 1;

fn zero() -> Field {
    Field::from(0u64)
}

fn leaf_node_hash(idx: u64, value_hash: Field) -> Field {
    poseidon::hash(&[Field::from(LEAF_MARKER), Field::from(idx), value_hash])
        .expect("fixed arity 3 hash never fails")
}

fn internal_node_hash(left: Field, right: Field) -> Field {
    poseidon::hash(&[left, right]).expect("fixed arity 2 hash never fails")
}

fn field_key(f: Field) -> Vec<u8> {
    f.into_bigint().to_bytes_be()
}

pub struct ExitTree {
    n_levels: u32,
    nodes: FxHashMap<Vec<u8>, (Field, Field)>,
    root: Field,
}

impl ExitTree {
    pub fn new(n_levels: u32) -> Self {
        ExitTree {
            n_levels,
            nodes: FxHashMap::default(),
            root: zero(),
        }
    }

    pub fn root(&self) -> Field {
        self.root
    }

    fn get_children(&self, node: Field) -> (Field, Field) {
        if node == zero() {
            return (zero(), zero());
        }
        *self
            .nodes
            .get(&field_key(node))
            .expect("exit tree node referenced by a known root must be present")
    }

    fn put_children(&mut self, node: Field, left: Field, right: Field) {
        self.nodes.insert(field_key(node), (left, right));
    }

    /// Credits an exit leaf for `idx`/`token_id` with `amount`, returning the
    /// Merkle proof of its new position. Exiting the same `idx` twice in one
    /// batch overwrites the prior leaf — the selector never admits two Exit
    /// txs from the same account in one batch, so this never happens in
    /// practice, but the tree itself doesn't forbid it.
    pub fn credit_exit(&mut self, idx: Idx, token_id: TokenId, amount: Field) -> MerkleProof {
        let value_hash = poseidon::hash(&[Field::from(token_id.0 as u64), amount])
            .expect("fixed arity 2 hash never fails");
        let leaf = leaf_node_hash(idx.get(), value_hash);
        self.root = self.update_recursive(self.root, idx.get(), 0, leaf);
        MerkleProof {
            siblings: self.proof(idx.get()),
        }
    }

    fn update_recursive(&mut self, node: Field, idx: u64, level: u32, new_leaf: Field) -> Field {
        if level == self.n_levels {
            return new_leaf;
        }
        let (left, right) = self.get_children(node);
        let bit = (idx >> level) & 1;
        let (new_left, new_right) = if bit == 0 {
            (self.update_recursive(left, idx, level + 1, new_leaf), right)
        } else {
            (left, self.update_recursive(right, idx, level + 1, new_leaf))
        };
        if new_left == zero() && new_right == zero() {
            return zero();
        }
        let hash = internal_node_hash(new_left, new_right);
        self.put_children(hash, new_left, new_right);
        hash
    }

    /// Siblings from leaf to root (index `0` = closest to the leaf) for
    /// `idx` against the current root.
    pub fn proof(&self, idx: u64) -> Vec<Field> {
        let mut node = self.root;
        let mut siblings = Vec::with_capacity(self.n_levels as usize);
        for level in 0..self.n_levels {
            let (left, right) = self.get_children(node);
            let bit = (idx >> level) & 1;
            if bit == 0 {
                siblings.push(right);
                node = left;
            } else {
                siblings.push(left);
                node = right;
            }
        }
        siblings
    }
}
