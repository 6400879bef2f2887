//! `AccountCreationAuth`: an out-of-band authorization letting the
//! coordinator synthesize a `CreateAccountCoordinator` L1 tx for an
//! `ethAddr` that hasn't deposited yet, without forging a signature on its
//! behalf. Modelled as a first-class pool record, matching the original
//! `hermez-node` reference (`common/apitypes`).

use crate::ids::{BjjCompressed, EthAddr};
use serde::{Deserialize, Serialize};

/// An EIP-191-style signature over `(chainID, ethAddr, bjj)`, produced by
/// the account owner ahead of time and submitted to the pool. The
/// coordinator never constructs one itself — it only consumes those the
/// `PoolStore` surfaces via `GetAccountCreationAuth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreationAuth {
    pub eth_addr: EthAddr,
    pub bjj: BjjCompressed,
    pub chain_id: u64,
    /// Raw 65-byte `(r, s, v)` ECDSA signature bytes.
    pub signature: Vec<u8>,
}

impl AccountCreationAuth {
    /// The message this signature is expected to cover — callers verifying
    /// against an external ECDSA recovery routine (out of this core's
    /// scope) hash this with the chain's standard EIP-191 prefix.
    pub fn signed_message(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(8 + 20 + 32);
        msg.extend_from_slice(&self.chain_id.to_be_bytes());
        msg.extend_from_slice(&self.eth_addr.0);
        msg.extend_from_slice(&self.bjj.0);
        msg
    }
}
