//! L1-originated transactions: deposits, forced L1-style operations, and
//! coordinator-synthesized account creations. Never signed — authenticated
//! by L1 inclusion (user origin) or an out-of-band creation authorization
//! (coordinator origin).

use crate::account::Balance;
use crate::ids::{BjjCompressed, EthAddr, Idx, TokenId};
use serde::{Deserialize, Serialize};
use strum::EnumIs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L1Origin {
    /// Mirrored in from a confirmed L1 contract call.
    User,
    /// Synthesized by this coordinator (e.g. a fee-receiver account).
    Coordinator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIs)]
pub enum L1TxType {
    CreateAccountDeposit,
    Deposit,
    DepositTransfer,
    CreateAccountDepositTransfer,
    ForceTransfer,
    ForceExit,
    CreateAccountCoordinator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Tx {
    pub origin: L1Origin,
    pub tx_type: L1TxType,
    pub from_eth_addr: EthAddr,
    pub from_bjj: BjjCompressed,
    /// `0` when the tx creates a new account.
    pub from_idx: Idx,
    /// `0` when the tx creates or targets no particular destination.
    pub to_idx: Idx,
    pub token_id: TokenId,
    /// The transfer amount for `*Transfer`/`*Exit` variants.
    pub amount: Balance,
    /// The deposited amount for `Deposit`/`*Deposit*` variants.
    pub deposit_amount: Balance,
}

impl L1Tx {
    /// Account-creation variants carry no pre-existing source account —
    /// `fromIdx` is populated only after the coordinator assigns one.
    pub fn creates_account(&self) -> bool {
        matches!(
            self.tx_type,
            L1TxType::CreateAccountDeposit
                | L1TxType::CreateAccountDepositTransfer
                | L1TxType::CreateAccountCoordinator
        )
    }

    /// Variants that move `amount` to `toIdx` in addition to any deposit.
    pub fn has_transfer(&self) -> bool {
        matches!(
            self.tx_type,
            L1TxType::DepositTransfer
                | L1TxType::CreateAccountDepositTransfer
                | L1TxType::ForceTransfer
        )
    }

    /// Signature checks never apply to L1 txs — they are authenticated by
    /// chain inclusion or creation authorization, not a Poseidon-EdDSA sig.
    pub fn requires_signature(&self) -> bool {
        false
    }
}
