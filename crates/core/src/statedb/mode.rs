//! Which of the three StateDB variants this instance is — a mode enum
//! controlling which side-tables are active, not a trait hierarchy
//! (`spec.md` §9, "Dynamic dispatch for StateDB mode").

use rustc_hash::FxHashMap;
use rollup_common::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateDbModeKind {
    /// Keeps historical roots keyed by batch number; supports reverting
    /// when the L1 head reorgs.
    Synchronizer,
    /// Discardable working copy used to pre-check candidate selection.
    TxSelector,
    /// Discardable working copy used to produce the authoritative new
    /// root for a batch under construction.
    BatchBuilder,
}

/// The side-table a [`StateDbModeKind::Synchronizer`] instance keeps; the
/// other two variants carry `None` and pay nothing for it.
#[derive(Debug, Default)]
pub struct HistoricalRoots {
    by_batch: FxHashMap<u64, Field>,
}

impl HistoricalRoots {
    pub fn record(&mut self, batch_num: u64, root: Field) {
        self.by_batch.insert(batch_num, root);
    }

    pub fn get(&self, batch_num: u64) -> Option<Field> {
        self.by_batch.get(&batch_num).copied()
    }
}

#[derive(Debug)]
pub enum StateDbMode {
    Synchronizer(HistoricalRoots),
    TxSelector,
    BatchBuilder,
}

impl StateDbMode {
    pub fn kind(&self) -> StateDbModeKind {
        match self {
            StateDbMode::Synchronizer(_) => StateDbModeKind::Synchronizer,
            StateDbMode::TxSelector => StateDbModeKind::TxSelector,
            StateDbMode::BatchBuilder => StateDbModeKind::BatchBuilder,
        }
    }

    pub fn record_historical_root(&mut self, batch_num: u64, root: Field) {
        if let StateDbMode::Synchronizer(roots) = self {
            roots.record(batch_num, root);
        }
    }

    pub fn historical_root(&self, batch_num: u64) -> Option<Field> {
        match self {
            StateDbMode::Synchronizer(roots) => roots.get(batch_num),
            _ => None,
        }
    }
}
