//! Per-token coordinator policy: which account settles fees, and the USD
//! floor a candidate tx's fee must clear to be worth a batch slot. Kept
//! separate from [`crate::Config`] since it changes independently of the
//! circuit-fixed budgets — an operator can repoint fee receivers or tune
//! minimum fees without touching `NLevels`/`MaxTx`.

use rollup_types::ids::{Idx, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoordinatorConfig {
    pub fee_idx_by_token: HashMap<TokenId, Idx>,
    pub min_fee_usd_by_token: HashMap<TokenId, f64>,
}

impl CoordinatorConfig {
    pub fn min_fee_usd(&self, token: TokenId) -> f64 {
        self.min_fee_usd_by_token.get(&token).copied().unwrap_or(0.0)
    }

    pub fn fee_receiver(&self, token: TokenId) -> Option<Idx> {
        self.fee_idx_by_token.get(&token).copied()
    }
}
