//! `ConfirmedBatch`: the record the coordinator core hands to its callers
//! once a batch has been built (and, eventually, proven and confirmed on
//! L1 — that confirmation loop is outside this core's scope).

use crate::ids::{BatchNum, Idx};
use rollup_common::Field;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedBatch {
    pub batch_num: BatchNum,
    #[serde(with = "rollup_common::field_serde")]
    pub new_state_root: Field,
    #[serde(with = "rollup_common::field_serde")]
    pub new_exit_root: Field,
    /// Opaque identifiers of every L2 tx applied in this batch, in forging
    /// order — the pool layer uses these to mark `Forged`.
    pub applied_l2_tx_ids: Vec<String>,
    /// The coordinator-synthesized L1 txs forged alongside the user ones
    /// (fee-receiver/account-creation bootstrapping), in selection order.
    pub forged_l1_coord_idxs: Vec<Idx>,
}
