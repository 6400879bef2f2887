//! The rollup account: the leaf record of the StateDB's sparse Merkle tree.

use crate::ids::{BjjCompressed, EthAddr, Idx, Nonce, TokenId};
use ark_ff::PrimeField;
use num_bigint::BigUint;
use rollup_common::{bjj, poseidon, Field};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Balances are non-negative and wide enough for any token amount the
/// circuit supports (up to 192 bits).
pub type Balance = BigUint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub idx: Idx,
    pub token_id: TokenId,
    pub bjj: BjjCompressed,
    pub eth_addr: EthAddr,
    pub nonce: Nonce,
    pub balance: Balance,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("balance {0} exceeds the 192-bit wire width")]
    BalanceTooWide(BigUint),
    #[error(transparent)]
    Bjj(#[from] rollup_common::bjj::BjjError),
}

const MAX_BALANCE_BITS: u64 = 192;

impl Account {
    pub fn new(
        idx: Idx,
        token_id: TokenId,
        bjj: BjjCompressed,
        eth_addr: EthAddr,
        nonce: Nonce,
        balance: Balance,
    ) -> Result<Self, AccountError> {
        if balance.bits() > MAX_BALANCE_BITS {
            return Err(AccountError::BalanceTooWide(balance));
        }
        Ok(Account {
            idx,
            token_id,
            bjj,
            eth_addr,
            nonce,
            balance,
        })
    }

    /// The Poseidon leaf hash the SMT stores for this account, encoding
    /// `tokenId‖nonce‖sign‖ay‖ethAddr‖balance` as field elements.
    pub fn leaf_hash(&self) -> Result<Field, AccountError> {
        let point = bjj::decompress(self.bjj.0)?;
        let sign = Field::from(bjj::sign_bit(&point) as u64);
        let ay = bjj::fq_to_bn254_fr(point.y);
        let eth_addr = Field::from_le_bytes_mod_order(&self.eth_addr.0);
        let balance = field_from_biguint(&self.balance);

        let e1 = poseidon::hash(&[
            Field::from(self.token_id.0 as u64),
            Field::from(self.nonce.get()),
            sign,
            ay,
        ])
        .expect("fixed arity 4 hash never fails");
        let leaf = poseidon::hash(&[e1, eth_addr, balance])
            .expect("fixed arity 3 hash never fails");
        Ok(leaf)
    }
}

fn field_from_biguint(value: &BigUint) -> Field {
    let bytes = value.to_bytes_le();
    Field::from_le_bytes_mod_order(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_common::bjj as bjj_mod;

    fn sample_bjj() -> BjjCompressed {
        // The neutral element (0, 1) is always on-curve and decompresses
        // cleanly, which is all this test needs.
        let point = bjj_mod::decompress([0u8; 32]).expect("identity point decompresses");
        BjjCompressed(bjj_mod::compress(&point))
    }

    #[test]
    fn leaf_hash_is_deterministic() {
        let acc = Account::new(
            Idx::FIRST_USER,
            TokenId(1),
            sample_bjj(),
            EthAddr::ZERO,
            Nonce::ZERO,
            Balance::from(500u32),
        )
        .unwrap();
        assert_eq!(acc.leaf_hash().unwrap(), acc.leaf_hash().unwrap());
    }

    #[test]
    fn leaf_hash_changes_with_balance() {
        let mut acc = Account::new(
            Idx::FIRST_USER,
            TokenId(1),
            sample_bjj(),
            EthAddr::ZERO,
            Nonce::ZERO,
            Balance::from(500u32),
        )
        .unwrap();
        let h1 = acc.leaf_hash().unwrap();
        acc.balance = Balance::from(501u32);
        let h2 = acc.leaf_hash().unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn rejects_balance_wider_than_192_bits() {
        let huge = Balance::from(1u32) << 192;
        let err = Account::new(
            Idx::FIRST_USER,
            TokenId(1),
            sample_bjj(),
            EthAddr::ZERO,
            Nonce::ZERO,
            huge,
        );
        assert!(err.is_err());
    }
}
