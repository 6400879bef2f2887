//! Exercises `TxSelector` and `BatchBuilder` together across two batches,
//! the way a worker actually drives them: select against one `StateDB`
//! handle, build against another, checkpoint, then reset a stale handle
//! back onto the checkpointed root. A `#[cfg(test)]` unit module can only
//! ever poke one component at a time; this is the multi-component scenario
//! that needs its own process.

use ark_ed_on_bn254::Fr as BjjScalar;
use ark_std::UniformRand;
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rollup_common::eddsa::PrivateKey;
use rollup_common::fee::FeeSelector;
use rollup_common::float40::Float40;
use rollup_common::{bjj, Field};
use rollup_config::{Config, CoordinatorConfig};
use rollup_core::batch_builder::BatchBuilder;
use rollup_core::error::DiscardReason;
use rollup_core::interfaces::{PoolStore, PoolTxId, TokenPrices};
use rollup_core::statedb::mode::StateDbMode;
use rollup_core::statedb::StateDB;
use rollup_core::tx_selector::TxSelector;
use rollup_types::auth::AccountCreationAuth;
use rollup_types::ids::{BatchNum, BjjCompressed, EthAddr, Idx, Nonce, TokenId};
use rollup_types::l1_tx::{L1Origin, L1Tx, L1TxType};
use rollup_types::l2_tx::{L2Tx, L2TxType};
use std::collections::HashMap;

#[derive(Default)]
struct VecPool {
    txs: Vec<(PoolTxId, L2Tx)>,
}

impl PoolStore for VecPool {
    fn get_pending_txs(&self, limit: usize) -> Vec<(PoolTxId, L2Tx)> {
        self.txs.iter().take(limit).cloned().collect()
    }
    fn mark_forging(&mut self, _tx_ids: &[PoolTxId], _batch_num: u64) {}
    fn mark_failed(&mut self, _tx_id: &PoolTxId, _reason: DiscardReason) {}
    fn get_account_creation_auth(&self, _eth_addr: EthAddr) -> Option<AccountCreationAuth> {
        None
    }
}

struct FlatPrices(HashMap<TokenId, f64>);

impl TokenPrices for FlatPrices {
    fn price_usd(&self, token_id: TokenId) -> Option<f64> {
        Some(self.0.get(&token_id).copied().unwrap_or(1.0))
    }
}

fn config() -> Config {
    Config {
        n_levels: 16,
        max_tx: 16,
        max_l1_tx: 8,
        max_l1_user_tx: 4,
        max_fee_tx: 4,
        chain_id: 1000,
        checkpoints_to_keep: 10,
    }
}

fn keypair(seed: u64) -> (PrivateKey, BjjCompressed) {
    let mut rng = StdRng::seed_from_u64(seed);
    let sk = PrivateKey(BjjScalar::rand(&mut rng));
    let point = sk.public();
    (sk, BjjCompressed(bjj::compress(&point)))
}

fn deposit(eth: EthAddr, bjj_pub: BjjCompressed, token: TokenId, amount: u64) -> L1Tx {
    L1Tx {
        origin: L1Origin::User,
        tx_type: L1TxType::CreateAccountDeposit,
        from_eth_addr: eth,
        from_bjj: bjj_pub,
        from_idx: Idx::NULL,
        to_idx: Idx::NULL,
        token_id: token,
        amount: BigUint::from(0u32),
        deposit_amount: BigUint::from(amount),
    }
}

fn transfer(
    sk: &PrivateKey,
    chain_id: u64,
    from: Idx,
    to: Idx,
    token: TokenId,
    amount: u64,
    nonce: u64,
) -> L2Tx {
    let mut tx = L2Tx {
        from_idx: from,
        to_idx: to,
        to_eth_addr: EthAddr::ZERO,
        to_bjj: BjjCompressed::ZERO,
        token_id: token,
        amount: Float40::encode(&BigUint::from(amount)).unwrap(),
        fee: FeeSelector::ZERO,
        nonce: Nonce::new(nonce).unwrap(),
        max_num_batch: 0,
        tx_type: L2TxType::Transfer,
        signature: sk.sign(Field::from(0u64)),
        atomic: None,
    };
    let msg = tx.signable_hash(chain_id, Field::from(0u64));
    tx.signature = sk.sign(msg);
    tx
}

/// Two back-to-back batches over one on-disk `StateDB`: the first forges a
/// deposit-created pair of accounts, the second a transfer between them.
/// After each batch the handle is checkpointed; a fresh handle opened
/// against the same directory sees exactly the root the first handle
/// reports, confirming the checkpoint actually persisted the new tree.
#[test]
fn select_then_build_then_checkpoint_persists_across_handles() {
    let config = config();
    let coord_config = CoordinatorConfig::default();
    let dir = tempfile::tempdir().unwrap();

    let (sk_a, bjj_a) = keypair(1);
    let (_sk_b, bjj_b) = keypair(2);
    let eth_a = EthAddr([0xaa; 20]);
    let eth_b = EthAddr([0xbb; 20]);
    let token = TokenId(1);
    let idx_a = Idx::FIRST_USER;
    let idx_b = idx_a.next().unwrap();

    let l1_queue = vec![
        deposit(eth_a, bjj_a, token, 1_000),
        deposit(eth_b, bjj_b, token, 0),
    ];

    let mut db = StateDB::open(dir.path(), config.n_levels, StateDbMode::BatchBuilder).unwrap();
    let selected = {
        let mut selector_db =
            StateDB::open(dir.path(), config.n_levels, StateDbMode::TxSelector).unwrap();
        let mut selector = TxSelector::new(&mut selector_db, &config, &coord_config);
        selector
            .select(
                BatchNum::GENESIS,
                &l1_queue,
                &mut VecPool::default(),
                &FlatPrices(HashMap::new()),
            )
            .unwrap()
    };
    assert_eq!(selected.l1_user_txs.len(), 2);
    assert!(selected.discarded.is_empty());

    let built = {
        let mut builder = BatchBuilder::new(&mut db, &config, &coord_config);
        builder.build_batch(BatchNum::GENESIS, &selected).unwrap()
    };
    assert_eq!(built.confirmed.batch_num, BatchNum::GENESIS);
    let root_after_genesis = db.root();

    let batch_1 = BatchNum::GENESIS.next();
    let tx = transfer(&sk_a, config.chain_id, idx_a, idx_b, token, 100, 0);
    let selected_1 = {
        let mut selector_db =
            StateDB::open(dir.path(), config.n_levels, StateDbMode::TxSelector).unwrap();
        let mut selector = TxSelector::new(&mut selector_db, &config, &coord_config);
        let mut pool = VecPool {
            txs: vec![("transfer-a-to-b".to_string(), tx)],
        };
        selector
            .select(batch_1, &[], &mut pool, &FlatPrices(HashMap::new()))
            .unwrap()
    };
    assert_eq!(selected_1.selected_l2.len(), 1);

    let built_1 = {
        let mut builder = BatchBuilder::new(&mut db, &config, &coord_config);
        builder.build_batch(batch_1, &selected_1).unwrap()
    };
    assert_eq!(built_1.confirmed.applied_l2_tx_ids, vec!["transfer-a-to-b"]);
    assert_ne!(db.root(), root_after_genesis);

    // A second handle opened fresh against the same directory must see the
    // latest checkpointed root, not the pre-transfer one: the checkpoint
    // taken inside `build_batch` is what makes the new state durable.
    let reopened = StateDB::open(dir.path(), config.n_levels, StateDbMode::BatchBuilder).unwrap();
    assert_eq!(reopened.root(), db.root());

    let account_a = reopened.get_account(idx_a).unwrap().unwrap();
    let account_b = reopened.get_account(idx_b).unwrap().unwrap();
    assert_eq!(account_a.balance, BigUint::from(900u32));
    assert_eq!(account_b.balance, BigUint::from(100u32));
}

/// `StateDB::reset` rolls a stale working copy back onto an older
/// checkpoint, undoing mutations a failed `TxSelector`/`BatchBuilder`
/// attempt left behind (`spec.md` §4.1).
#[test]
fn reset_rolls_back_to_an_earlier_checkpoint() {
    let config = config();
    let coord_config = CoordinatorConfig::default();
    let dir = tempfile::tempdir().unwrap();

    let (sk_a, bjj_a) = keypair(10);
    let (_sk_b, bjj_b) = keypair(20);
    let eth_a = EthAddr([0xcc; 20]);
    let eth_b = EthAddr([0xdd; 20]);
    let token = TokenId(1);
    let idx_a = Idx::FIRST_USER;
    let idx_b = idx_a.next().unwrap();

    let l1_queue = vec![
        deposit(eth_a, bjj_a, token, 500),
        deposit(eth_b, bjj_b, token, 0),
    ];

    let mut db = StateDB::open(dir.path(), config.n_levels, StateDbMode::BatchBuilder).unwrap();
    let selected = {
        let mut selector_db =
            StateDB::open(dir.path(), config.n_levels, StateDbMode::TxSelector).unwrap();
        let mut selector = TxSelector::new(&mut selector_db, &config, &coord_config);
        selector
            .select(
                BatchNum::GENESIS,
                &l1_queue,
                &mut VecPool::default(),
                &FlatPrices(HashMap::new()),
            )
            .unwrap()
    };
    {
        let mut builder = BatchBuilder::new(&mut db, &config, &coord_config);
        builder.build_batch(BatchNum::GENESIS, &selected).unwrap();
    }
    let checkpointed_root = db.root();

    // Mutate the same handle directly, bypassing the selector/builder pair,
    // to simulate a failed in-flight attempt that left the working copy
    // dirty without ever checkpointing.
    let mut dirty = db.get_account(idx_a).unwrap().unwrap();
    dirty.balance = BigUint::from(999_999u32);
    db.update_account(&dirty).unwrap();
    assert_ne!(db.root(), checkpointed_root);

    let restored = db.reset(BatchNum::GENESIS.0).unwrap();
    assert_eq!(restored.root(), checkpointed_root);
    let account_a = restored.get_account(idx_a).unwrap().unwrap();
    assert_eq!(account_a.balance, BigUint::from(500u32));
}
