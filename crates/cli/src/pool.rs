//! A minimal, process-local stand-in for the pool/auth/price services
//! `rollup_core::interfaces` expects (`spec.md` §6's "Consumed" interfaces).
//! The real coordinator backs these with a SQL pool and a synchronizer-fed
//! price cache; this CLI only ever drives a scripted scenario in memory, so
//! a `Vec`/`HashMap` is the whole implementation.

use rollup_core::error::DiscardReason;
use rollup_core::interfaces::{PoolStore, PoolTxId, TokenPrices};
use rollup_types::auth::AccountCreationAuth;
use rollup_types::ids::{EthAddr, TokenId};
use rollup_types::l2_tx::L2Tx;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolTxState {
    Pending,
    Forging,
    Forged,
    Failed(DiscardReason),
}

#[derive(Default)]
pub struct InMemoryPool {
    txs: Vec<(PoolTxId, L2Tx)>,
    states: HashMap<PoolTxId, PoolTxState>,
    auths: HashMap<EthAddr, AccountCreationAuth>,
}

impl InMemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tx` to the pool as `Pending`, keyed by `id`. The CLI's demo
    /// script is the only caller — a real coordinator's pool is fed by the
    /// HTTP API surface this core stays out of scope of.
    pub fn submit(&mut self, id: impl Into<String>, tx: L2Tx) {
        let id = id.into();
        self.states.insert(id.clone(), PoolTxState::Pending);
        self.txs.push((id, tx));
    }

    pub fn add_account_creation_auth(&mut self, auth: AccountCreationAuth) {
        self.auths.insert(auth.eth_addr, auth);
    }

    pub fn state_of(&self, id: &str) -> Option<&PoolTxState> {
        self.states.get(id)
    }

    /// Drops every tx that is `Forging` or `Forged` from the pending list —
    /// called once a batch has been selected so the next selection pass
    /// doesn't re-rank already-admitted txs.
    pub fn retain_pending(&mut self) {
        let states = &self.states;
        self.txs
            .retain(|(id, _)| matches!(states.get(id), Some(PoolTxState::Pending)));
    }
}

impl PoolStore for InMemoryPool {
    fn get_pending_txs(&self, limit: usize) -> Vec<(PoolTxId, L2Tx)> {
        self.txs.iter().take(limit).cloned().collect()
    }

    fn mark_forging(&mut self, tx_ids: &[PoolTxId], _batch_num: u64) {
        for id in tx_ids {
            self.states.insert(id.clone(), PoolTxState::Forging);
        }
    }

    fn mark_failed(&mut self, tx_id: &PoolTxId, reason: DiscardReason) {
        self.states.insert(tx_id.clone(), PoolTxState::Failed(reason));
    }

    fn get_account_creation_auth(&self, eth_addr: EthAddr) -> Option<AccountCreationAuth> {
        self.auths.get(&eth_addr).cloned()
    }
}

/// A flat per-token USD price table, refreshed by the synchronizer in a real
/// deployment (`spec.md` §5: "a shared, read-mostly token-price table").
/// Defaults every unlisted token to `1.0` so a demo script never needs to
/// populate prices just to exercise fee ranking.
pub struct StaticPrices(HashMap<TokenId, f64>);

impl StaticPrices {
    pub fn new() -> Self {
        StaticPrices(HashMap::new())
    }

    pub fn set(&mut self, token_id: TokenId, price_usd: f64) {
        self.0.insert(token_id, price_usd);
    }
}

impl Default for StaticPrices {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenPrices for StaticPrices {
    fn price_usd(&self, token_id: TokenId) -> Option<f64> {
        Some(self.0.get(&token_id).copied().unwrap_or(1.0))
    }
}
