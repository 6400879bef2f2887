//! `ZKInputs`: the fixed-shape witness handed off to the proving circuit.
//! Shape never depends on how full the batch actually is — unused slots are
//! padded with an all-zero null entry, so the circuit's constraint count is
//! the same for an empty batch and a full one.

use crate::account::Balance;
use crate::ids::{BatchNum, EthAddr, Idx, Nonce, TokenId};
use rollup_common::Field;
use serde::{Deserialize, Serialize};

/// Merkle-proof siblings against a tree of depth `NLevels`. Index `0` is the
/// sibling closest to the leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    #[serde(with = "rollup_common::field_serde::vec")]
    pub siblings: Vec<Field>,
}

impl MerkleProof {
    pub fn empty(n_levels: u32) -> Self {
        MerkleProof {
            siblings: vec![Field::from(0u64); n_levels as usize],
        }
    }
}

/// The account fields as they appear in a witness snapshot — a copy, not a
/// live reference, since pre- and post-tx states of the same account differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub idx: Idx,
    pub token_id: TokenId,
    pub nonce: Nonce,
    pub balance: Balance,
    pub eth_addr: EthAddr,
}

impl AccountSnapshot {
    pub fn empty() -> Self {
        AccountSnapshot {
            idx: Idx::NULL,
            token_id: TokenId(0),
            nonce: Nonce::ZERO,
            balance: Balance::from(0u32),
            eth_addr: EthAddr::ZERO,
        }
    }
}

/// One account touched by a tx: its state and Merkle proof before and after
/// the tx was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWitness {
    pub pre_state: AccountSnapshot,
    pub pre_proof: MerkleProof,
    pub post_state: AccountSnapshot,
    pub post_proof: MerkleProof,
}

impl AccountWitness {
    pub fn null(n_levels: u32) -> Self {
        AccountWitness {
            pre_state: AccountSnapshot::empty(),
            pre_proof: MerkleProof::empty(n_levels),
            post_state: AccountSnapshot::empty(),
            post_proof: MerkleProof::empty(n_levels),
        }
    }
}

/// Selector bits encoding which operation a tx witness represents — enough
/// for the circuit to pick the right gate, without re-deriving it from the
/// account deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSelector {
    pub is_l1: bool,
    pub is_applied: bool,
    pub tx_type_code: u8,
}

impl TxSelector {
    pub fn null() -> Self {
        TxSelector {
            is_l1: false,
            is_applied: false,
            tx_type_code: 0,
        }
    }
}

/// One slot of the witness buffer: the Merkle-proof trail for every account
/// a single tx touched, plus the selector bits for that tx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxWitness {
    pub selector: TxSelector,
    pub touched: Vec<AccountWitness>,
}

impl TxWitness {
    pub fn null() -> Self {
        TxWitness {
            selector: TxSelector::null(),
            touched: Vec::new(),
        }
    }
}

/// One of the (at most `MaxFeeTx`) coordinator fee-receiver settlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeWitness {
    pub idx: Idx,
    pub token_id: TokenId,
    pub amount: Balance,
    pub proof: MerkleProof,
}

impl FeeWitness {
    pub fn null(n_levels: u32) -> Self {
        FeeWitness {
            idx: Idx::NULL,
            token_id: TokenId(0),
            amount: Balance::from(0u32),
            proof: MerkleProof::empty(n_levels),
        }
    }
}

/// The complete witness for one batch attempt: globals, `MaxTx` tx slots,
/// and `MaxFeeTx` fee slots. `globalChainDataHash` is the single public
/// input the circuit exposes — everything else is a private witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZKInputs {
    #[serde(with = "rollup_common::field_serde")]
    pub old_state_root: Field,
    #[serde(with = "rollup_common::field_serde")]
    pub new_state_root: Field,
    #[serde(with = "rollup_common::field_serde")]
    pub old_exit_root: Field,
    #[serde(with = "rollup_common::field_serde")]
    pub new_exit_root: Field,
    pub chain_id: u64,
    pub batch_num: BatchNum,
    pub tx_witnesses: Vec<TxWitness>,
    pub fee_witnesses: Vec<FeeWitness>,
    pub global_chain_data_hash: [u8; 32],
}

impl ZKInputs {
    /// Computes the public input: Keccak of a byte-concatenation of the
    /// scalar globals and every slot's selector/root encoding, truncated to
    /// 253 bits so it fits as a BN254 field element.
    pub fn compute_global_chain_data_hash(
        old_state_root: Field,
        new_state_root: Field,
        old_exit_root: Field,
        new_exit_root: Field,
        chain_id: u64,
        batch_num: BatchNum,
        tx_witnesses: &[TxWitness],
    ) -> [u8; 32] {
        use ark_ff::PrimeField;
        let mut bytes = Vec::new();
        for root in [old_state_root, new_state_root, old_exit_root, new_exit_root] {
            bytes.extend_from_slice(&root.into_bigint().to_bytes_be());
        }
        bytes.extend_from_slice(&chain_id.to_be_bytes());
        bytes.extend_from_slice(&batch_num.0.to_be_bytes());
        for tx in tx_witnesses {
            bytes.push(tx.selector.is_l1 as u8);
            bytes.push(tx.selector.is_applied as u8);
            bytes.push(tx.selector.tx_type_code);
        }
        rollup_common::keccak::keccak256_truncated_253(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_tx_witness_has_no_touched_accounts() {
        assert!(TxWitness::null().touched.is_empty());
    }

    #[test]
    fn global_hash_is_sensitive_to_new_root() {
        let zero = Field::from(0u64);
        let one = Field::from(1u64);
        let h1 = ZKInputs::compute_global_chain_data_hash(zero, zero, zero, zero, 1, BatchNum(1), &[]);
        let h2 = ZKInputs::compute_global_chain_data_hash(zero, one, zero, zero, 1, BatchNum(1), &[]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn global_hash_is_truncated_to_253_bits() {
        let one = Field::from(1u64);
        let h = ZKInputs::compute_global_chain_data_hash(one, one, one, one, 1, BatchNum(1), &[]);
        assert_eq!(h[0] & 0xE0, 0);
    }
}
