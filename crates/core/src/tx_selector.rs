//! Chooses and orders the L1/L2 txs that go into the next batch
//! (`spec.md` §4.3). A synchronous pass over ranked candidates — this core
//! never suspends mid-selection; concurrency sits at the worker boundary,
//! one blocking task per `StateDB` mode (`spec.md` §9).

use crate::batch_builder::exit_tree::ExitTree;
use crate::error::{ConflictReason, DiscardReason, SelectorError, StructuralReason, TxProcessorError, TxRejection};
use crate::interfaces::{PoolStore, PoolTxId, TokenPrices};
use crate::statedb::StateDB;
use crate::tx_processor::{fee_on, FeeAccumulator, TxProcessor};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rollup_common::{bjj, eddsa, Field};
use rollup_config::{Config, CoordinatorConfig};
use rollup_types::account::Account;
use rollup_types::ids::{AtomicGroupId, BatchNum, EthAddr, Idx, Nonce, TokenId};
use rollup_types::l1_tx::{L1Origin, L1Tx, L1TxType};
use rollup_types::l2_tx::{L2Tx, L2TxType};
use rustc_hash::FxHashMap;
use tracing::instrument;

/// One admitted L2 tx, paired with the `rqHash` `BatchBuilder` must feed
/// back into `TxProcessor::process_l2` when it re-executes the batch (`0`
/// for a standalone tx, or the referenced atomic-group member's signable
/// hash otherwise). Resolved once here rather than re-derived by the
/// builder.
#[derive(Debug, Clone)]
pub struct SelectedL2 {
    pub pool_id: PoolTxId,
    pub tx: L2Tx,
    pub rq_hash: Field,
}

#[derive(Debug, Clone)]
pub struct DiscardedL2 {
    pub pool_id: PoolTxId,
    pub tx: L2Tx,
    pub reason: DiscardReason,
}

/// The output of one selection pass: everything `BatchBuilder` needs to
/// re-execute in canonical order (`spec.md` §4.4: L1 user, then L1
/// coordinator, then L2, each in selection order).
#[derive(Debug, Default)]
pub struct SelectedBatch {
    pub l1_user_txs: Vec<L1Tx>,
    /// Coordinator-synthesized L1 txs: account creations for
    /// `TransferToEthAddr`/`TransferToBJJ` destinations and fee-receiver
    /// bootstrapping (`spec.md` §4.3 policy 2b/2c).
    pub l1_coord_txs: Vec<L1Tx>,
    pub selected_l2: Vec<SelectedL2>,
    pub discarded: Vec<DiscardedL2>,
    /// Coordinator fee-receiver accounts synthesized *this batch* (policy
    /// 2c), keyed by token. `BatchBuilder::settle_fees` consults this
    /// before falling back to the statically configured `CoordinatorConfig`
    /// receiver, since a freshly synthesized receiver has no static entry.
    pub fresh_fee_idxs: FxHashMap<TokenId, Idx>,
}

impl SelectedBatch {
    fn total_l1(&self) -> usize {
        self.l1_user_txs.len() + self.l1_coord_txs.len()
    }

    fn total(&self) -> usize {
        self.total_l1() + self.selected_l2.len()
    }
}

pub struct TxSelector<'a> {
    state: &'a mut StateDB,
    config: &'a Config,
    coord_config: &'a CoordinatorConfig,
}

/// One pool L2 tx paired with the identifier the pool layer uses for it.
#[derive(Debug, Clone)]
struct Candidate {
    pool_id: PoolTxId,
    tx: L2Tx,
}

/// Tracks, per token, the `idx` of a coordinator fee-receiver account
/// synthesized *this batch* — a second fee-paying tx on the same token
/// reuses the slot instead of allocating a second one.
type FreshFeeIdxs = FxHashMap<TokenId, Idx>;

impl<'a> TxSelector<'a> {
    pub fn new(state: &'a mut StateDB, config: &'a Config, coord_config: &'a CoordinatorConfig) -> Self {
        TxSelector {
            state,
            config,
            coord_config,
        }
    }

    /// Runs one selection pass. `l1_user_queue` is consumed front-to-back up
    /// to `MaxL1UserTx`; `pool` supplies ranked L2 candidates and
    /// account-creation authorizations; `prices` supplies the USD valuation
    /// used to rank candidates by fee.
    #[instrument(skip_all, fields(batch_num = current_batch.0))]
    pub fn select(
        &mut self,
        current_batch: BatchNum,
        l1_user_queue: &[L1Tx],
        pool: &mut dyn PoolStore,
        prices: &dyn TokenPrices,
    ) -> Result<SelectedBatch, SelectorError> {
        let mut batch = SelectedBatch::default();
        let mut exit_tree = ExitTree::new(self.config.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut fresh_fee_idxs: FreshFeeIdxs = FxHashMap::default();
        let mut pending_nonce: FxHashMap<Idx, Nonce> = FxHashMap::default();
        let mut forged_ids = Vec::new();

        self.drain_l1_user_queue(l1_user_queue, current_batch, &mut batch, &mut exit_tree, &mut fees)?;

        let groups = rank_candidates(pool.get_pending_txs(usize::MAX), prices);

        // Candidates whose nonce doesn't match their sender's expected nonce
        // *yet* — the fee-ranked pass can easily visit a higher-nonce tx
        // before its own predecessor if the predecessor happens to carry a
        // lower fee. These aren't rejected outright: they're revisited once
        // the rest of this same pass has had a chance to admit the nonce
        // they're waiting on (`spec.md` §4.3's per-sender nonce guarantee).
        let mut deferred: Vec<Candidate> = Vec::new();

        for group in groups {
            if batch.total() >= self.config.max_tx as usize {
                for member in group {
                    batch.discarded.push(discard(member, DiscardReason::BudgetExhausted));
                }
                continue;
            }

            if group.len() > 1 {
                match self.try_admit_atomic_group(
                    &group,
                    current_batch,
                    &mut exit_tree,
                    &mut fees,
                    &mut pending_nonce,
                    &mut fresh_fee_idxs,
                    pool,
                    &mut batch,
                ) {
                    Ok(ids) => forged_ids.extend(ids),
                    Err(reason) => {
                        for member in group {
                            batch.discarded.push(discard(member, reason.clone()));
                        }
                    }
                }
                continue;
            }

            let candidate = group.into_iter().next().expect("non-empty group");
            match self.try_admit_one(
                &candidate,
                current_batch,
                Field::from(0u64),
                &mut exit_tree,
                &mut fees,
                &mut pending_nonce,
                &mut fresh_fee_idxs,
                pool,
                &mut batch,
            ) {
                Ok(()) => forged_ids.push(candidate.pool_id.clone()),
                Err(DiscardReason::InvalidNonce) => deferred.push(candidate),
                Err(reason) => batch.discarded.push(discard(candidate, reason)),
            }
        }

        // Sweep the deferred set to a fixpoint: each full pass may unblock a
        // sender whose predecessor just got admitted, so keep retrying as
        // long as at least one candidate makes progress. Whatever's still
        // stuck once a pass makes no progress genuinely has no predecessor
        // coming (it was itself discarded, or the gap was never going to
        // close), so it's discarded for real at that point.
        loop {
            let mut progressed = false;
            let mut still_deferred = Vec::new();
            for candidate in deferred {
                if batch.total() >= self.config.max_tx as usize {
                    batch.discarded.push(discard(candidate, DiscardReason::BudgetExhausted));
                    progressed = true;
                    continue;
                }
                match self.try_admit_one(
                    &candidate,
                    current_batch,
                    Field::from(0u64),
                    &mut exit_tree,
                    &mut fees,
                    &mut pending_nonce,
                    &mut fresh_fee_idxs,
                    pool,
                    &mut batch,
                ) {
                    Ok(()) => {
                        forged_ids.push(candidate.pool_id.clone());
                        progressed = true;
                    }
                    Err(DiscardReason::InvalidNonce) => still_deferred.push(candidate),
                    Err(reason) => {
                        batch.discarded.push(discard(candidate, reason));
                        progressed = true;
                    }
                }
            }
            deferred = still_deferred;
            if !progressed || deferred.is_empty() {
                break;
            }
        }
        for candidate in deferred {
            batch.discarded.push(discard(candidate, DiscardReason::InvalidNonce));
        }

        pool.mark_forging(&forged_ids, current_batch.0);
        for discarded in &batch.discarded {
            pool.mark_failed(&discarded.pool_id, discarded.reason.clone());
        }

        batch.fresh_fee_idxs = fresh_fee_idxs;
        Ok(batch)
    }

    fn drain_l1_user_queue(
        &mut self,
        queue: &[L1Tx],
        current_batch: BatchNum,
        batch: &mut SelectedBatch,
        exit_tree: &mut ExitTree,
        fees: &mut FeeAccumulator,
    ) -> Result<(), SelectorError> {
        let limit = (self.config.max_l1_user_tx as usize)
            .min(self.config.max_l1_tx as usize)
            .min(self.config.max_tx as usize);
        for tx in queue.iter().take(limit) {
            let mut processor = TxProcessor::new(self.state, self.config);
            processor.process_l1(tx, current_batch, exit_tree, fees)?;
            batch.l1_user_txs.push(tx.clone());
        }
        Ok(())
    }

    /// Resolves `candidate`'s destination and runs it against the working
    /// `StateDB`. Both `Applied` and `Failed` outcomes count as admitted —
    /// a `Failed` state-conflict still consumes a batch slot and still gets
    /// a witness (`spec.md` §7); only a genuine rejection (structural, or a
    /// selector-level policy skip) discards the candidate outright.
    #[allow(clippy::too_many_arguments)]
    fn try_admit_one(
        &mut self,
        candidate: &Candidate,
        current_batch: BatchNum,
        rq_hash: Field,
        exit_tree: &mut ExitTree,
        fees: &mut FeeAccumulator,
        pending_nonce: &mut FxHashMap<Idx, Nonce>,
        fresh_fee_idxs: &mut FreshFeeIdxs,
        pool: &dyn PoolStore,
        batch: &mut SelectedBatch,
    ) -> Result<(), DiscardReason> {
        if batch.total() >= self.config.max_tx as usize {
            return Err(DiscardReason::BudgetExhausted);
        }

        let from_idx = candidate.tx.from_idx;
        let expected_nonce = *pending_nonce
            .entry(from_idx)
            .or_insert_with(|| self.on_chain_nonce(from_idx));
        if candidate.tx.nonce != expected_nonce {
            return Err(DiscardReason::InvalidNonce);
        }

        let mut tx = candidate.tx;
        self.resolve_destination(&mut tx, pool, fresh_fee_idxs, batch)?;

        let mut processor = TxProcessor::new(self.state, self.config);
        let result = processor
            .process_l2(&tx, rq_hash, current_batch, exit_tree, fees)
            .map_err(map_rejection)?;

        // This candidate's nonce slot is spent either way: the pool never
        // resubmits the same (idx, nonce) pair twice, so the next expected
        // nonce for this sender always advances past it.
        if let Ok(next) = tx.nonce.next() {
            pending_nonce.insert(from_idx, next);
        }

        let _ = result.outcome;
        batch.selected_l2.push(SelectedL2 {
            pool_id: candidate.pool_id.clone(),
            tx,
            rq_hash,
        });
        Ok(())
    }

    /// Validates that `tx` would apply cleanly against `scratch` (a running
    /// per-idx view seeded from the real `StateDB`) without touching real
    /// state. Mirrors `TxProcessor::process_l2`'s own pre-mutation checks —
    /// used only to dry-run atomic groups, so a later member's failure never
    /// requires rolling back an earlier member's real mutation.
    fn dry_validate_l2(
        &self,
        tx: &L2Tx,
        rq_hash: Field,
        current_batch: BatchNum,
        scratch: &mut FxHashMap<Idx, (Nonce, BigUint, TokenId)>,
    ) -> Result<(), DiscardReason> {
        if !scratch.contains_key(&tx.from_idx) {
            let acc = self
                .state
                .get_account(tx.from_idx)
                .ok()
                .flatten()
                .ok_or(DiscardReason::NoRecipient)?;
            scratch.insert(tx.from_idx, (acc.nonce, acc.balance, acc.token_id));
        }
        let (nonce, balance, token_id) = scratch.get(&tx.from_idx).expect("just inserted").clone();

        if token_id != tx.token_id {
            return Err(DiscardReason::Structural(StructuralReason::Malformed(
                "token mismatch".into(),
            )));
        }
        if !tx.max_num_batch_ok(current_batch.0) {
            return Err(DiscardReason::MaxNumBatch);
        }
        let pk = bjj::decompress(
            self.state
                .get_account(tx.from_idx)
                .ok()
                .flatten()
                .ok_or(DiscardReason::NoRecipient)?
                .bjj
                .0,
        )
        .map_err(|_| DiscardReason::Structural(StructuralReason::InvalidSignature))?;
        let msg = tx.signable_hash(self.config.chain_id, rq_hash);
        if !eddsa::verify(&pk, msg, &tx.signature) {
            return Err(DiscardReason::Structural(StructuralReason::InvalidSignature));
        }
        if tx.nonce != nonce {
            return Err(DiscardReason::InvalidNonce);
        }

        let fee_amount = fee_on(&tx.amount.decode(), tx.fee.fraction());
        let total_debit = tx.amount.decode() + &fee_amount;
        if balance < total_debit {
            return Err(DiscardReason::InsufficientBalance);
        }

        let new_nonce = nonce.next().map_err(|_| DiscardReason::InvalidNonce)?;
        scratch.insert(tx.from_idx, (new_nonce, balance - total_debit, token_id));
        Ok(())
    }

    /// Atomic groups are all-or-nothing (`spec.md` §4.3 policy 3): every
    /// member is dry-validated against a scratch view of state before any
    /// of them touches the real `StateDB`, so a failing member never leaves
    /// a partial mutation behind.
    #[allow(clippy::too_many_arguments)]
    fn try_admit_atomic_group(
        &mut self,
        group: &[Candidate],
        current_batch: BatchNum,
        exit_tree: &mut ExitTree,
        fees: &mut FeeAccumulator,
        pending_nonce: &mut FxHashMap<Idx, Nonce>,
        fresh_fee_idxs: &mut FreshFeeIdxs,
        pool: &dyn PoolStore,
        batch: &mut SelectedBatch,
    ) -> Result<Vec<PoolTxId>, DiscardReason> {
        if !permutation_covers_group(group) {
            return Err(DiscardReason::AtomicGroupNotSelected);
        }

        let n = group.len();
        let rq_hashes: Vec<Field> = (0..n)
            .map(|i| {
                let atomic = group[i].tx.atomic.expect("grouped");
                let target = atomic_target_index(i, atomic.rq_offset, n);
                group[target].tx.rq_hash(self.config.chain_id)
            })
            .collect();

        for (i, member) in group.iter().enumerate() {
            let atomic = member.tx.atomic.expect("grouped");
            let target = atomic_target_index(i, atomic.rq_offset, n);
            if !rq_hash_matches(member, &group[target], self.config.chain_id) {
                return Err(DiscardReason::AtomicGroupNotSelected);
            }
        }

        if batch.total() + n > self.config.max_tx as usize {
            return Err(DiscardReason::BudgetExhausted);
        }

        let mut resolved = Vec::with_capacity(n);
        for member in group {
            let mut tx = member.tx;
            self.resolve_destination(&mut tx, pool, fresh_fee_idxs, batch)?;
            resolved.push(tx);
        }

        let mut scratch: FxHashMap<Idx, (Nonce, BigUint, TokenId)> = FxHashMap::default();
        for (i, tx) in resolved.iter().enumerate() {
            self.dry_validate_l2(tx, rq_hashes[i], current_batch, &mut scratch)?;
        }

        let mut admitted = Vec::with_capacity(n);
        for (i, member) in group.iter().enumerate() {
            let tx = resolved[i];
            let mut processor = TxProcessor::new(self.state, self.config);
            processor
                .process_l2(&tx, rq_hashes[i], current_batch, exit_tree, fees)
                .map_err(|_| DiscardReason::AtomicGroupNotSelected)?;
            if let Ok(next) = tx.nonce.next() {
                pending_nonce.insert(tx.from_idx, next);
            }
            batch.selected_l2.push(SelectedL2 {
                pool_id: member.pool_id.clone(),
                tx,
                rq_hash: rq_hashes[i],
            });
            admitted.push(member.pool_id.clone());
        }
        Ok(admitted)
    }

    fn on_chain_nonce(&self, idx: Idx) -> Nonce {
        self.state
            .get_account(idx)
            .ok()
            .flatten()
            .map(|acc| acc.nonce)
            .unwrap_or(Nonce::ZERO)
    }

    /// For `Transfer`, the destination must already exist. For
    /// `TransferToEthAddr`/`TransferToBJJ`, scan for a matching account; if
    /// none exists, synthesize a `CreateAccountCoordinator` L1 tx backed by
    /// a pool-supplied `AccountCreationAuth` (`spec.md` §4.3 policy 2b). For
    /// `Exit`, there is no destination to resolve. Every L2 tx whose fee is
    /// nonzero additionally needs a coordinator fee-receiver account for its
    /// token (`spec.md` §4.3 policy 2c).
    fn resolve_destination(
        &mut self,
        tx: &mut L2Tx,
        pool: &dyn PoolStore,
        fresh_fee_idxs: &mut FreshFeeIdxs,
        batch: &mut SelectedBatch,
    ) -> Result<(), DiscardReason> {
        match tx.tx_type {
            L2TxType::Transfer => {
                if self.state.get_account(tx.to_idx).ok().flatten().is_none() {
                    return Err(DiscardReason::NoRecipient);
                }
            }
            L2TxType::TransferToEthAddr | L2TxType::TransferToBJJ => {
                let idx = match self.find_account_by_destination(tx) {
                    Some(idx) => idx,
                    None => self.synthesize_account_creation(tx, pool, batch)?,
                };
                tx.to_idx = idx;
            }
            L2TxType::Exit => {}
        }

        if tx.fee.fraction() > 0.0
            && self.coord_config.fee_receiver(tx.token_id).is_none()
            && !fresh_fee_idxs.contains_key(&tx.token_id)
        {
            let idx = self.synthesize_fee_receiver(tx.token_id, batch)?;
            fresh_fee_idxs.insert(tx.token_id, idx);
        }
        Ok(())
    }

    /// Linear scan over the idx range the `StateDB` has allocated so far.
    /// Acceptable here: account creation is rare relative to transfers, and
    /// `spec.md` invariant 3 guarantees at most one match per token.
    fn find_account_by_destination(&self, tx: &L2Tx) -> Option<Idx> {
        let next = self.state.next_idx_hint();
        for raw in Idx::FIRST_USER.get()..next.get() {
            let idx = Idx::new(raw).ok()?;
            let Some(acc) = self.state.get_account(idx).ok().flatten() else {
                continue;
            };
            if acc.token_id != tx.token_id {
                continue;
            }
            let matches = match tx.tx_type {
                L2TxType::TransferToEthAddr => acc.eth_addr == tx.to_eth_addr,
                L2TxType::TransferToBJJ => acc.bjj == tx.to_bjj,
                _ => false,
            };
            if matches {
                return Some(idx);
            }
        }
        None
    }

    fn synthesize_account_creation(
        &mut self,
        tx: &L2Tx,
        pool: &dyn PoolStore,
        batch: &mut SelectedBatch,
    ) -> Result<Idx, DiscardReason> {
        if batch.total_l1() >= self.config.max_l1_tx as usize {
            return Err(DiscardReason::BudgetExhausted);
        }
        let auth = pool
            .get_account_creation_auth(tx.to_eth_addr)
            .ok_or(DiscardReason::NoRecipient)?;
        let idx = self
            .state
            .allocate_idx()
            .map_err(|_| DiscardReason::BudgetExhausted)?;
        let account = Account::new(idx, tx.token_id, auth.bjj, auth.eth_addr, Nonce::ZERO, BigUint::from(0u32))
            .map_err(|_| DiscardReason::NoRecipient)?;
        self.state
            .create_account(&account)
            .map_err(|_| DiscardReason::NoRecipient)?;
        batch.l1_coord_txs.push(L1Tx {
            origin: L1Origin::Coordinator,
            tx_type: L1TxType::CreateAccountCoordinator,
            from_eth_addr: auth.eth_addr,
            from_bjj: auth.bjj,
            from_idx: idx,
            to_idx: Idx::NULL,
            token_id: tx.token_id,
            amount: BigUint::from(0u32),
            deposit_amount: BigUint::from(0u32),
        });
        Ok(idx)
    }

    fn synthesize_fee_receiver(&mut self, token_id: TokenId, batch: &mut SelectedBatch) -> Result<Idx, DiscardReason> {
        if batch.total_l1() >= self.config.max_l1_tx as usize {
            return Err(DiscardReason::BudgetExhausted);
        }
        let idx = self
            .state
            .allocate_idx()
            .map_err(|_| DiscardReason::BudgetExhausted)?;
        let account = Account::new(
            idx,
            token_id,
            rollup_types::ids::BjjCompressed::ZERO,
            EthAddr::ZERO,
            Nonce::ZERO,
            BigUint::from(0u32),
        )
        .map_err(|_| DiscardReason::BudgetExhausted)?;
        self.state
            .create_account(&account)
            .map_err(|_| DiscardReason::BudgetExhausted)?;
        batch.l1_coord_txs.push(L1Tx {
            origin: L1Origin::Coordinator,
            tx_type: L1TxType::CreateAccountCoordinator,
            from_eth_addr: EthAddr::ZERO,
            from_bjj: rollup_types::ids::BjjCompressed::ZERO,
            from_idx: idx,
            to_idx: Idx::NULL,
            token_id,
            amount: BigUint::from(0u32),
            deposit_amount: BigUint::from(0u32),
        });
        Ok(idx)
    }
}

fn discard(candidate: Candidate, reason: DiscardReason) -> DiscardedL2 {
    DiscardedL2 {
        pool_id: candidate.pool_id,
        tx: candidate.tx,
        reason,
    }
}

fn map_rejection(err: TxProcessorError) -> DiscardReason {
    match err {
        TxProcessorError::Rejected(TxRejection::Structural(StructuralReason::MaxNumBatchExpired {
            ..
        })) => DiscardReason::MaxNumBatch,
        TxProcessorError::Rejected(TxRejection::Structural(s)) => DiscardReason::Structural(s),
        TxProcessorError::Rejected(TxRejection::StateConflict(ConflictReason::NoSuchDestination)) => {
            DiscardReason::NoRecipient
        }
        TxProcessorError::Rejected(TxRejection::StateConflict(ConflictReason::NonceMismatch { .. })) => {
            DiscardReason::InvalidNonce
        }
        TxProcessorError::Rejected(TxRejection::StateConflict(ConflictReason::InsufficientBalance { .. })) => {
            DiscardReason::InsufficientBalance
        }
        TxProcessorError::Rejected(TxRejection::StateConflict(ConflictReason::TokenMismatch { .. })) => {
            DiscardReason::Structural(StructuralReason::Malformed("token mismatch".into()))
        }
        TxProcessorError::StateDb(_) => DiscardReason::NoRecipient,
    }
}

/// Ranks pool candidates by fee-in-USD descending (ties broken by pool
/// insertion order, `spec.md` §9's tie-break note), then buckets them into
/// atomic groups — standalone txs form singleton groups — each internally
/// ordered by `rqOffset`-relative position.
fn rank_candidates(pool_txs: Vec<(PoolTxId, L2Tx)>, prices: &dyn TokenPrices) -> Vec<Vec<Candidate>> {
    struct Ranked {
        candidate: Candidate,
        fee_usd: f64,
        insertion_index: usize,
    }

    let mut refs: Vec<Ranked> = pool_txs
        .into_iter()
        .enumerate()
        .map(|(i, (pool_id, tx))| {
            let amount = tx.amount.decode().to_f64().unwrap_or(0.0);
            let price = prices.price_usd(tx.token_id).unwrap_or(0.0);
            let fee_usd = amount * tx.fee.fraction() * price;
            Ranked {
                candidate: Candidate { pool_id, tx },
                fee_usd,
                insertion_index: i,
            }
        })
        .collect();

    refs.sort_by(|a, b| {
        b.fee_usd
            .partial_cmp(&a.fee_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.insertion_index.cmp(&b.insertion_index))
    });

    let mut groups: Vec<Vec<Candidate>> = Vec::new();
    let mut group_index: FxHashMap<AtomicGroupId, usize> = FxHashMap::default();
    for r in refs {
        match r.candidate.tx.atomic_group_id() {
            Some(gid) => {
                if let Some(&idx) = group_index.get(&gid) {
                    groups[idx].push(r.candidate);
                } else {
                    group_index.insert(gid, groups.len());
                    groups.push(vec![r.candidate]);
                }
            }
            None => groups.push(vec![r.candidate]),
        }
    }

    for members in groups.iter_mut() {
        if members.len() > 1 {
            members.sort_by_key(|m| m.tx.atomic.map(|a| a.rq_offset).unwrap_or(0));
        }
    }

    groups
}

fn permutation_covers_group(group: &[Candidate]) -> bool {
    let n = group.len();
    let mut seen = vec![false; n];
    for (i, member) in group.iter().enumerate() {
        let Some(atomic) = member.tx.atomic else {
            return false;
        };
        let target = atomic_target_index(i, atomic.rq_offset, n);
        if seen[target] {
            return false;
        }
        seen[target] = true;
    }
    seen.into_iter().all(|x| x)
}

fn atomic_target_index(i: usize, offset: i8, n: usize) -> usize {
    (((i as i64) + offset as i64).rem_euclid(n as i64)) as usize
}

/// `true` iff `member`'s `rq_*` fields, replayed as a standalone tx with its
/// own `rqHash` forced to zero, hash to exactly what `referenced` (the tx
/// `member` claims to reference) reports as its own `rqHash`.
fn rq_hash_matches(member: &Candidate, referenced: &Candidate, chain_id: u64) -> bool {
    let Some(atomic) = member.tx.atomic else {
        return false;
    };
    let presumed = L2Tx {
        from_idx: atomic.rq_from_idx,
        to_idx: atomic.rq_to_idx,
        to_eth_addr: atomic.rq_to_eth_addr,
        to_bjj: atomic.rq_to_bjj,
        token_id: atomic.rq_token_id,
        amount: atomic.rq_amount,
        fee: atomic.rq_fee,
        nonce: atomic.rq_nonce,
        max_num_batch: 0,
        tx_type: referenced.tx.tx_type,
        signature: referenced.tx.signature,
        atomic: None,
    };
    presumed.signable_hash(chain_id, Field::from(0u64)) == referenced.tx.rq_hash(chain_id)
}
