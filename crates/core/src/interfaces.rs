//! The external interfaces `spec.md` §6 requires of the core's
//! collaborators — the L1-chain mirror, the tx/auth pool, and the
//! token-price cache. Each is a plain trait the core calls by reference
//! (`&dyn PoolStore`, generic `P: TokenPrices`), never a concrete
//! synchronizer/SQL/HTTP type: this core never depends on what sits behind
//! them (`spec.md` §1's explicit-out-of-scope list).

use crate::error::DiscardReason;
use rollup_types::auth::AccountCreationAuth;
use rollup_types::ids::{EthAddr, TokenId};
use rollup_types::l1_tx::L1Tx;
use rollup_types::l2_tx::L2Tx;

/// The ordered stream of confirmed L1 events the synchronizer mirrors in.
/// The core only ever consumes the subset relevant to batch-building: the
/// queue of not-yet-forged user L1 txs, delivered in L1 inclusion order.
pub trait L1EventFeed {
    /// Up to `limit` pending user-originated L1 txs, oldest-first. Never
    /// returns more than are currently queued; the selector drains this
    /// queue before touching the L2 pool (`spec.md` §4.3 policy 1).
    fn pending_l1_user_txs(&self, limit: usize) -> Vec<L1Tx>;
}

/// A stable identifier for a pool L2 tx, used by `PoolStore::mark_forging`/
/// `mark_failed` and echoed back in [`crate::batch_builder::BuiltBatch`].
/// The coordinator never invents its own identifier scheme — it is
/// whatever the pool layer hands back with each tx.
pub type PoolTxId = String;

/// The L2 tx pool plus its out-of-band account-creation authorizations.
/// `TxSelector` is the pool's only reader/writer among the core's
/// components (`spec.md` §5, "Pool access is by the selector only").
pub trait PoolStore {
    /// Up to `limit` pending L2 txs, already ranked by the pool layer's own
    /// policy; `TxSelector` re-ranks by fee-in-USD but preserves this
    /// ordering as the stable tie-break (`spec.md` §9, tie-break note).
    fn get_pending_txs(&self, limit: usize) -> Vec<(PoolTxId, L2Tx)>;

    /// Transitions the given txs `Pending -> Forging` once `TxSelector` has
    /// admitted them into `batch_num`'s candidate set.
    fn mark_forging(&mut self, tx_ids: &[PoolTxId], batch_num: u64);

    /// Annotates a discarded tx with why, so the pool layer can expire or
    /// retry it (`spec.md` §4.3, "Side-effects").
    fn mark_failed(&mut self, tx_id: &PoolTxId, reason: DiscardReason);

    /// An EIP-191-style authorization letting the coordinator synthesize a
    /// `CreateAccountCoordinator` L1 tx for `eth_addr` without a deposit,
    /// or `None` if the owner never submitted one.
    fn get_account_creation_auth(&self, eth_addr: EthAddr) -> Option<AccountCreationAuth>;
}

/// The read-mostly token-valuation table the synchronizer maintains under
/// single-writer discipline (`spec.md` §5). `TxSelector` is the only
/// consumer, used to rank candidates by fee-in-USD.
pub trait TokenPrices {
    /// USD price of one whole unit of `token_id`, or `None` if the token has
    /// no known price (candidates on such a token rank last, never error).
    fn price_usd(&self, token_id: TokenId) -> Option<f64>;
}
