//! L2 pool transactions: user-signed transfers and exits, optionally bound
//! into an atomic group that must be forged as a unit or not at all.

use crate::ids::{AtomicGroupId, BjjCompressed, EthAddr, Idx, Nonce, TokenId};
use rollup_common::fee::FeeSelector;
use rollup_common::float40::Float40;
use rollup_common::Field;
use serde::{Deserialize, Serialize};
use strum::EnumIs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIs)]
pub enum L2TxType {
    Transfer,
    TransferToEthAddr,
    TransferToBJJ,
    Exit,
}

/// `rqOffset` is a signed index, -3..+4, into the enclosing atomic group,
/// relative to the tx that carries it.
pub type RqOffset = i8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicRequest {
    pub rq_from_idx: Idx,
    pub rq_to_idx: Idx,
    pub rq_to_eth_addr: EthAddr,
    pub rq_to_bjj: BjjCompressed,
    pub rq_token_id: TokenId,
    pub rq_amount: Float40,
    pub rq_fee: FeeSelector,
    pub rq_nonce: Nonce,
    pub rq_offset: RqOffset,
    pub atomic_group_id: AtomicGroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Tx {
    pub from_idx: Idx,
    pub to_idx: Idx,
    pub to_eth_addr: EthAddr,
    pub to_bjj: BjjCompressed,
    /// Implicit from `fromIdx`'s account, carried for convenience when
    /// txs are processed against a detached copy of the source account.
    pub token_id: TokenId,
    pub amount: Float40,
    pub fee: FeeSelector,
    pub nonce: Nonce,
    /// `0` means the tx never expires by batch number.
    pub max_num_batch: u64,
    pub tx_type: L2TxType,
    pub signature: rollup_common::eddsa::Signature,
    pub atomic: Option<AtomicRequest>,
}

impl L2Tx {
    pub fn max_num_batch_ok(&self, current_batch: u64) -> bool {
        self.max_num_batch == 0 || self.max_num_batch >= current_batch
    }

    pub fn atomic_group_id(&self) -> Option<AtomicGroupId> {
        self.atomic.map(|a| a.atomic_group_id)
    }

    /// `rqHash` contribution of this tx when it is the member *referenced*
    /// by another: the same signable hash, computed with this tx's own
    /// `rqHash` forced to zero so the recursion bottoms out after one level.
    pub fn rq_hash(&self, chain_id: u64) -> Field {
        self.signable_hash(chain_id, Field::from(0u64))
    }

    /// The canonical Poseidon signable hash: `chainID, fromIdx, toIdx,
    /// tokenId, amount, fee, nonce, toEthAddr, toBJJ, maxNumBatch, rqHash`.
    /// `rq_hash` is `0` for a standalone tx, or the referenced member's
    /// [`rq_hash`](Self::rq_hash) for an atomic-group member.
    pub fn signable_hash(&self, chain_id: u64, rq_hash: Field) -> Field {
        use ark_ff::PrimeField;
        let to_bjj_field = Field::from_le_bytes_mod_order(&self.to_bjj.0);
        let to_eth_field = Field::from_le_bytes_mod_order(&self.to_eth_addr.0);
        rollup_common::poseidon::hash_many(&[
            Field::from(chain_id),
            Field::from(self.from_idx.get()),
            Field::from(self.to_idx.get()),
            Field::from(self.token_id.0 as u64),
            Field::from(self.amount.raw()),
            Field::from(self.fee.0 as u64),
            Field::from(self.nonce.get()),
            to_eth_field,
            to_bjj_field,
            Field::from(self.max_num_batch),
            rq_hash,
        ])
        .expect("11-element chained hash never fails")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use rollup_common::eddsa::PrivateKey;
    use ark_ed_on_bn254::Fr as BjjScalar;
    use ark_std::UniformRand;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_tx() -> L2Tx {
        let mut rng = StdRng::seed_from_u64(99);
        let sk = PrivateKey(BjjScalar::rand(&mut rng));
        let dummy_sig = sk.sign(Field::from(0u64));
        L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::FIRST_USER.next().unwrap(),
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(100u32)).unwrap(),
            fee: FeeSelector(10),
            nonce: Nonce::ZERO,
            max_num_batch: 0,
            tx_type: L2TxType::Transfer,
            signature: dummy_sig,
            atomic: None,
        }
    }

    #[test]
    fn max_num_batch_zero_never_expires() {
        assert!(sample_tx().max_num_batch_ok(1_000_000));
    }

    #[test]
    fn max_num_batch_enforces_expiry() {
        let mut tx = sample_tx();
        tx.max_num_batch = 4;
        assert!(tx.max_num_batch_ok(4));
        assert!(!tx.max_num_batch_ok(5));
    }

    #[test]
    fn signable_hash_changes_with_amount() {
        let tx1 = sample_tx();
        let mut tx2 = tx1;
        tx2.amount = Float40::encode(&BigUint::from(200u32)).unwrap();
        assert_ne!(
            tx1.signable_hash(1, Field::from(0u64)),
            tx2.signable_hash(1, Field::from(0u64))
        );
    }

    #[test]
    fn signable_hash_changes_with_rq_hash() {
        let tx = sample_tx();
        let h1 = tx.signable_hash(1, Field::from(0u64));
        let h2 = tx.signable_hash(1, Field::from(7u64));
        assert_ne!(h1, h2);
    }
}
