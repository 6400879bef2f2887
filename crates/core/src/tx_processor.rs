//! Pure state-transition function: apply one L1 or L2 tx to a `StateDB`,
//! producing a witness fragment (when the variant is wired for one) and fee
//! accounting (`spec.md` §4.2).

use crate::batch_builder::exit_tree::ExitTree;
use crate::error::{ConflictReason, StructuralReason, TxProcessorError, TxRejection};
use crate::statedb::mode::StateDbModeKind;
use crate::statedb::StateDB;
use ark_ff::PrimeField;
use num_bigint::BigUint;
use rollup_common::{bjj, eddsa, poseidon, Field};
use rollup_config::Config;
use rollup_types::account::Account;
use rollup_types::ids::{BatchNum, Idx, Nonce, TokenId};
use rollup_types::l1_tx::{L1Tx, L1TxType};
use rollup_types::l2_tx::{L2Tx, L2TxType};
use rollup_types::zk_inputs::{AccountSnapshot, AccountWitness, TxSelector as TxWitnessSelector, TxWitness};
use rustc_hash::FxHashMap;
use tracing::instrument;

/// Per-token fees accrued while processing a batch, settled by
/// `BatchBuilder` against the coordinator's configured fee-receiver
/// accounts once the batch is otherwise complete.
#[derive(Debug, Default)]
pub struct FeeAccumulator(FxHashMap<TokenId, BigUint>);

impl FeeAccumulator {
    pub fn new() -> Self {
        FeeAccumulator::default()
    }

    pub fn accrue(&mut self, token_id: TokenId, amount: BigUint) {
        self.0
            .entry(token_id)
            .and_modify(|total| *total += &amount)
            .or_insert(amount);
    }

    pub fn into_inner(self) -> FxHashMap<TokenId, BigUint> {
        self.0
    }
}

/// The per-tx outcome `spec.md` §4.2/§7's "Failure model" defines.
/// `Invalid` txs (`TxRejection::Structural`) never reach this far — they are
/// returned as an `Err` before any state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Applied,
    Failed,
}

#[derive(Debug)]
pub struct ProcessedTx {
    pub outcome: TxOutcome,
    /// `None` unless the underlying `StateDB` is in `BatchBuilder` mode —
    /// `Synchronizer`/`TxSelector` runs never need (or pay for) a witness.
    pub witness: Option<TxWitness>,
}

pub struct TxProcessor<'a> {
    state: &'a mut StateDB,
    config: &'a Config,
}

impl<'a> TxProcessor<'a> {
    pub fn new(state: &'a mut StateDB, config: &'a Config) -> Self {
        TxProcessor { state, config }
    }

    fn witnessing(&self) -> bool {
        self.state.mode().kind() == StateDbModeKind::BatchBuilder
    }

    fn snapshot(&self, idx: Idx) -> Result<AccountSnapshot, TxProcessorError> {
        match self.state.get_account(idx)? {
            Some(acc) => Ok(AccountSnapshot {
                idx: acc.idx,
                token_id: acc.token_id,
                nonce: acc.nonce,
                balance: acc.balance,
                eth_addr: acc.eth_addr,
            }),
            None => Ok(AccountSnapshot::empty()),
        }
    }

    fn witness_for(
        &self,
        idx: Idx,
        pre: AccountSnapshot,
    ) -> Result<AccountWitness, TxProcessorError> {
        let pre_proof = self.state.mt_get_proof(idx)?;
        let post = self.snapshot(idx)?;
        let post_proof = self.state.mt_get_proof(idx)?;
        Ok(AccountWitness {
            pre_state: pre,
            pre_proof,
            post_state: post,
            post_proof,
        })
    }

    /// Applies `tx` to the underlying `StateDB`, advancing `exit_tree` and
    /// `fees` as side effects. `Ok(Failed)` means the tx consumed a slot but
    /// changed no state (`spec.md` §7's "State-conflict" class); `Err` means
    /// it never should have reached the processor at all (structural, or an
    /// I/O fault).
    #[instrument(skip_all, fields(tx_type = ?tx.tx_type))]
    pub fn process_l1(
        &mut self,
        tx: &L1Tx,
        current_batch: BatchNum,
        exit_tree: &mut ExitTree,
        fees: &mut FeeAccumulator,
    ) -> Result<ProcessedTx, TxProcessorError> {
        let witnessing = self.witnessing();
        let mut touched = Vec::new();

        let outcome = match tx.tx_type {
            L1TxType::CreateAccountDeposit | L1TxType::CreateAccountCoordinator => {
                let idx = self.state.allocate_idx()?;
                let deposit = if tx.tx_type == L1TxType::CreateAccountCoordinator {
                    BigUint::from(0u32)
                } else {
                    tx.deposit_amount.clone()
                };
                let pre = AccountSnapshot::empty();
                let account = Account::new(
                    idx,
                    tx.token_id,
                    tx.from_bjj,
                    tx.from_eth_addr,
                    Nonce::ZERO,
                    deposit,
                )
                .map_err(|e| TxRejection::from(StructuralReason::Malformed(e.to_string())))?;
                self.state.create_account(&account)?;
                if witnessing {
                    touched.push(self.witness_for(idx, pre)?);
                }
                TxOutcome::Applied
            }
            L1TxType::Deposit => {
                self.credit_existing(tx.from_idx, &tx.deposit_amount, witnessing, &mut touched)?;
                TxOutcome::Applied
            }
            L1TxType::CreateAccountDepositTransfer => {
                let idx = self.state.allocate_idx()?;
                let pre = AccountSnapshot::empty();
                let account = Account::new(
                    idx,
                    tx.token_id,
                    tx.from_bjj,
                    tx.from_eth_addr,
                    Nonce::ZERO,
                    tx.deposit_amount.clone(),
                )
                .map_err(|e| TxRejection::from(StructuralReason::Malformed(e.to_string())))?;
                self.state.create_account(&account)?;
                if witnessing {
                    touched.push(self.witness_for(idx, pre)?);
                }
                self.transfer(idx, tx.to_idx, &tx.amount, witnessing, &mut touched)?
            }
            L1TxType::DepositTransfer => {
                self.credit_existing(tx.from_idx, &tx.deposit_amount, witnessing, &mut touched)?;
                self.transfer(tx.from_idx, tx.to_idx, &tx.amount, witnessing, &mut touched)?
            }
            L1TxType::ForceTransfer => {
                self.transfer(tx.from_idx, tx.to_idx, &tx.amount, witnessing, &mut touched)?
            }
            L1TxType::ForceExit => self.exit(
                tx.from_idx,
                tx.token_id,
                &tx.amount,
                current_batch,
                exit_tree,
                witnessing,
                &mut touched,
            )?,
        };

        let witness = witnessing.then(|| TxWitness {
            selector: TxWitnessSelector {
                is_l1: true,
                is_applied: matches!(outcome, TxOutcome::Applied),
                tx_type_code: l1_type_code(tx.tx_type),
            },
            touched,
        });

        let _ = fees; // L1 txs never carry a fee.
        Ok(ProcessedTx { outcome, witness })
    }

    /// As [`Self::process_l1`], but for a pool-originated L2 tx. `rq_hash` is
    /// `0` for a standalone tx, or the referenced atomic-group member's
    /// `rqHash` otherwise — callers resolve atomic-group wiring before
    /// calling this (`spec.md` §4.2, "Atomic groups").
    #[instrument(skip_all, fields(tx_type = ?tx.tx_type))]
    pub fn process_l2(
        &mut self,
        tx: &L2Tx,
        rq_hash: Field,
        current_batch: BatchNum,
        exit_tree: &mut ExitTree,
        fees: &mut FeeAccumulator,
    ) -> Result<ProcessedTx, TxProcessorError> {
        let witnessing = self.witnessing();

        let source = self
            .state
            .get_account(tx.from_idx)?
            .ok_or_else(|| TxRejection::from(ConflictReason::NoSuchDestination))?;

        if source.token_id != tx.token_id {
            return Err(TxRejection::from(StructuralReason::Malformed(format!(
                "tx carries token {:?}, account {} holds {:?}",
                tx.token_id, tx.from_idx, source.token_id
            )))
            .into());
        }
        if !tx.max_num_batch_ok(current_batch.0) {
            return Err(TxRejection::from(StructuralReason::MaxNumBatchExpired {
                max_num_batch: tx.max_num_batch,
                current_batch: current_batch.0,
            })
            .into());
        }
        let msg = tx.signable_hash(self.config.chain_id, rq_hash);
        let pk = bjj::decompress(source.bjj.0)
            .map_err(|e| TxRejection::from(StructuralReason::Malformed(e.to_string())))?;
        if !eddsa::verify(&pk, msg, &tx.signature) {
            return Err(TxRejection::from(StructuralReason::InvalidSignature).into());
        }
        if tx.nonce != source.nonce {
            let outcome = TxOutcome::Failed;
            let witness = witnessing.then(|| null_witness(tx));
            let _ = fees;
            return Ok(ProcessedTx { outcome, witness });
        }

        let fee_amount = fee_on(&tx.amount.decode(), tx.fee.fraction());
        let total_debit = tx.amount.decode() + &fee_amount;
        if source.balance < total_debit {
            let outcome = TxOutcome::Failed;
            let witness = witnessing.then(|| null_witness(tx));
            let _ = fees;
            return Ok(ProcessedTx { outcome, witness });
        }

        let mut touched = Vec::new();
        let pre_source = self.snapshot(tx.from_idx)?;
        let mut source = source;
        source.balance -= &total_debit;
        source.nonce = source.nonce.next().map_err(|_| {
            TxRejection::from(StructuralReason::Malformed("nonce overflow".into()))
        })?;
        self.state.update_account(&source)?;

        let outcome = match tx.tx_type {
            L2TxType::Exit => {
                exit_tree.credit_exit(tx.from_idx, tx.token_id, field_from_biguint(&tx.amount.decode()));
                TxOutcome::Applied
            }
            L2TxType::Transfer | L2TxType::TransferToEthAddr | L2TxType::TransferToBJJ => {
                let mut dest = self
                    .state
                    .get_account(tx.to_idx)?
                    .ok_or_else(|| TxRejection::from(ConflictReason::NoSuchDestination))?;
                let pre_dest = self.snapshot(tx.to_idx)?;
                dest.balance += tx.amount.decode();
                self.state.update_account(&dest)?;
                if witnessing {
                    touched.push(self.witness_for(tx.to_idx, pre_dest)?);
                }
                TxOutcome::Applied
            }
        };

        if witnessing {
            touched.insert(0, self.witness_for(tx.from_idx, pre_source)?);
        }
        if fee_amount > BigUint::from(0u32) {
            fees.accrue(tx.token_id, fee_amount);
        }

        let witness = witnessing.then(|| TxWitness {
            selector: TxWitnessSelector {
                is_l1: false,
                is_applied: matches!(outcome, TxOutcome::Applied),
                tx_type_code: l2_type_code(tx.tx_type),
            },
            touched,
        });
        Ok(ProcessedTx { outcome, witness })
    }

    fn credit_existing(
        &mut self,
        idx: Idx,
        amount: &BigUint,
        witnessing: bool,
        touched: &mut Vec<AccountWitness>,
    ) -> Result<(), TxProcessorError> {
        let pre = self.snapshot(idx)?;
        let mut account = self
            .state
            .get_account(idx)?
            .ok_or_else(|| TxRejection::from(ConflictReason::NoSuchDestination))?;
        account.balance += amount;
        self.state.update_account(&account)?;
        if witnessing {
            touched.push(self.witness_for(idx, pre)?);
        }
        Ok(())
    }

    fn transfer(
        &mut self,
        from: Idx,
        to: Idx,
        amount: &BigUint,
        witnessing: bool,
        touched: &mut Vec<AccountWitness>,
    ) -> Result<TxOutcome, TxProcessorError> {
        let pre_from = self.snapshot(from)?;
        let mut from_account = self
            .state
            .get_account(from)?
            .ok_or_else(|| TxRejection::from(ConflictReason::NoSuchDestination))?;
        if from_account.balance < *amount {
            return Ok(TxOutcome::Failed);
        }
        from_account.balance -= amount;
        self.state.update_account(&from_account)?;

        let pre_to = self.snapshot(to)?;
        let mut to_account = self
            .state
            .get_account(to)?
            .ok_or_else(|| TxRejection::from(ConflictReason::NoSuchDestination))?;
        to_account.balance += amount;
        self.state.update_account(&to_account)?;

        if witnessing {
            touched.push(self.witness_for(from, pre_from)?);
            touched.push(self.witness_for(to, pre_to)?);
        }
        Ok(TxOutcome::Applied)
    }

    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        from: Idx,
        token_id: TokenId,
        amount: &BigUint,
        _current_batch: BatchNum,
        exit_tree: &mut ExitTree,
        witnessing: bool,
        touched: &mut Vec<AccountWitness>,
    ) -> Result<TxOutcome, TxProcessorError> {
        let pre_from = self.snapshot(from)?;
        let mut from_account = self
            .state
            .get_account(from)?
            .ok_or_else(|| TxRejection::from(ConflictReason::NoSuchDestination))?;
        if from_account.balance < *amount {
            return Ok(TxOutcome::Failed);
        }
        from_account.balance -= amount;
        self.state.update_account(&from_account)?;
        exit_tree.credit_exit(from, token_id, field_from_biguint(amount));
        if witnessing {
            touched.push(self.witness_for(from, pre_from)?);
        }
        Ok(TxOutcome::Applied)
    }
}

fn null_witness(tx: &L2Tx) -> TxWitness {
    TxWitness {
        selector: TxWitnessSelector {
            is_l1: false,
            is_applied: false,
            tx_type_code: l2_type_code(tx.tx_type),
        },
        touched: Vec::new(),
    }
}

/// Shared with [`crate::tx_selector`], which needs the same arithmetic to
/// dry-run an atomic group's balance checks before committing any of its
/// members to the real `StateDB`.
pub(crate) fn fee_on(amount: &BigUint, fraction: f64) -> BigUint {
    if fraction == 0.0 {
        return BigUint::from(0u32);
    }
    // The fee table is a frozen f64 multiplier; scale by a fixed-point
    // factor before truncating so small fees on large amounts don't
    // collapse to zero from premature float rounding.
    const SCALE: u64 = 1_000_000;
    let scaled = (fraction * SCALE as f64).round() as u64;
    (amount * scaled) / BigUint::from(SCALE)
}

fn field_from_biguint(value: &BigUint) -> Field {
    Field::from_le_bytes_mod_order(&value.to_bytes_le())
}

fn l1_type_code(tx_type: L1TxType) -> u8 {
    match tx_type {
        L1TxType::CreateAccountDeposit => 0,
        L1TxType::Deposit => 1,
        L1TxType::DepositTransfer => 2,
        L1TxType::CreateAccountDepositTransfer => 3,
        L1TxType::ForceTransfer => 4,
        L1TxType::ForceExit => 5,
        L1TxType::CreateAccountCoordinator => 6,
    }
}

fn l2_type_code(tx_type: L2TxType) -> u8 {
    match tx_type {
        L2TxType::Transfer => 0,
        L2TxType::TransferToEthAddr => 1,
        L2TxType::TransferToBJJ => 2,
        L2TxType::Exit => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statedb::mode::StateDbMode;
    use ark_ed_on_bn254::Fr as BjjScalar;
    use ark_std::UniformRand;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rollup_common::eddsa::PrivateKey;
    use rollup_common::fee::FeeSelector;
    use rollup_common::float40::Float40;
    use rollup_types::ids::{BjjCompressed, EthAddr};

    fn config() -> Config {
        Config {
            n_levels: 16,
            max_tx: 100,
            max_l1_tx: 32,
            max_l1_user_tx: 16,
            max_fee_tx: 16,
            chain_id: 1000,
            checkpoints_to_keep: 10,
        }
    }

    fn keypair(seed: u64) -> (PrivateKey, BjjCompressed) {
        let mut rng = StdRng::seed_from_u64(seed);
        let sk = PrivateKey(BjjScalar::rand(&mut rng));
        let pk = sk.public();
        (sk, BjjCompressed(bjj::compress(&pk)))
    }

    fn open_db() -> (tempfile::TempDir, StateDB) {
        let dir = tempfile::tempdir().unwrap();
        let db = StateDB::open(dir.path(), 16, StateDbMode::BatchBuilder).unwrap();
        (dir, db)
    }

    #[test]
    fn create_account_deposit_allocates_and_funds_an_account() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let (_sk, bjj) = keypair(1);

        let tx = L1Tx {
            origin: rollup_types::L1Origin::User,
            tx_type: L1TxType::CreateAccountDeposit,
            from_eth_addr: EthAddr::ZERO,
            from_bjj: bjj,
            from_idx: Idx::NULL,
            to_idx: Idx::NULL,
            token_id: TokenId(1),
            amount: BigUint::from(0u32),
            deposit_amount: BigUint::from(500u32),
        };

        let mut processor = TxProcessor::new(&mut db, &cfg);
        let result = processor
            .process_l1(&tx, BatchNum(1), &mut exit_tree, &mut fees)
            .unwrap();
        assert_eq!(result.outcome, TxOutcome::Applied);
        let acc = db.get_account(Idx::FIRST_USER).unwrap().unwrap();
        assert_eq!(acc.balance, BigUint::from(500u32));
    }

    fn seed_account(db: &mut StateDB, idx: Idx, bjj: BjjCompressed, balance: u32) {
        let acc = Account::new(
            idx,
            TokenId(1),
            bjj,
            EthAddr::ZERO,
            Nonce::ZERO,
            BigUint::from(balance),
        )
        .unwrap();
        db.create_account(&acc).unwrap();
    }

    #[test]
    fn transfer_moves_balance_and_advances_nonce() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let (sk, bjj) = keypair(2);
        seed_account(&mut db, Idx::FIRST_USER, bjj, 500);
        seed_account(&mut db, Idx::FIRST_USER.next().unwrap(), keypair(3).1, 0);

        let mut tx = L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::FIRST_USER.next().unwrap(),
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(100u32)).unwrap(),
            fee: FeeSelector::ZERO,
            nonce: Nonce::ZERO,
            max_num_batch: 0,
            tx_type: L2TxType::Transfer,
            signature: sk.sign(Field::from(0u64)),
            atomic: None,
        };
        tx.signature = sk.sign(tx.signable_hash(cfg.chain_id, Field::from(0u64)));

        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut processor = TxProcessor::new(&mut db, &cfg);
        let result = processor
            .process_l2(&tx, Field::from(0u64), BatchNum(1), &mut exit_tree, &mut fees)
            .unwrap();
        assert_eq!(result.outcome, TxOutcome::Applied);

        let from = db.get_account(Idx::FIRST_USER).unwrap().unwrap();
        assert_eq!(from.balance, BigUint::from(400u32));
        assert_eq!(from.nonce, Nonce::ZERO.next().unwrap());
        let to = db.get_account(Idx::FIRST_USER.next().unwrap()).unwrap().unwrap();
        assert_eq!(to.balance, BigUint::from(100u32));
    }

    #[test]
    fn transfer_with_bad_signature_is_rejected() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let (sk, bjj) = keypair(4);
        seed_account(&mut db, Idx::FIRST_USER, bjj, 500);
        seed_account(&mut db, Idx::FIRST_USER.next().unwrap(), keypair(5).1, 0);

        let tx = L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::FIRST_USER.next().unwrap(),
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(100u32)).unwrap(),
            fee: FeeSelector::ZERO,
            nonce: Nonce::ZERO,
            max_num_batch: 0,
            tx_type: L2TxType::Transfer,
            signature: sk.sign(Field::from(999u64)), // wrong message
            atomic: None,
        };

        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut processor = TxProcessor::new(&mut db, &cfg);
        let err = processor
            .process_l2(&tx, Field::from(0u64), BatchNum(1), &mut exit_tree, &mut fees)
            .unwrap_err();
        assert!(matches!(
            err,
            TxProcessorError::Rejected(TxRejection::Structural(StructuralReason::InvalidSignature))
        ));
    }

    #[test]
    fn insufficient_balance_fails_without_mutating_state() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let (sk, bjj) = keypair(6);
        seed_account(&mut db, Idx::FIRST_USER, bjj, 10);
        seed_account(&mut db, Idx::FIRST_USER.next().unwrap(), keypair(7).1, 0);

        let mut tx = L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::FIRST_USER.next().unwrap(),
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(100u32)).unwrap(),
            fee: FeeSelector::ZERO,
            nonce: Nonce::ZERO,
            max_num_batch: 0,
            tx_type: L2TxType::Transfer,
            signature: sk.sign(Field::from(0u64)),
            atomic: None,
        };
        tx.signature = sk.sign(tx.signable_hash(cfg.chain_id, Field::from(0u64)));

        let root_before = db.root();
        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut processor = TxProcessor::new(&mut db, &cfg);
        let result = processor
            .process_l2(&tx, Field::from(0u64), BatchNum(1), &mut exit_tree, &mut fees)
            .unwrap();
        assert_eq!(result.outcome, TxOutcome::Failed);
        assert_eq!(db.root(), root_before);
    }

    #[test]
    fn exit_credits_the_exit_tree_and_debits_the_account() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let (sk, bjj) = keypair(8);
        seed_account(&mut db, Idx::FIRST_USER, bjj, 500);

        let mut tx = L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::NULL,
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(100u32)).unwrap(),
            fee: FeeSelector::ZERO,
            nonce: Nonce::ZERO,
            max_num_batch: 0,
            tx_type: L2TxType::Exit,
            signature: sk.sign(Field::from(0u64)),
            atomic: None,
        };
        tx.signature = sk.sign(tx.signable_hash(cfg.chain_id, Field::from(0u64)));

        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut processor = TxProcessor::new(&mut db, &cfg);
        let result = processor
            .process_l2(&tx, Field::from(0u64), BatchNum(1), &mut exit_tree, &mut fees)
            .unwrap();
        assert_eq!(result.outcome, TxOutcome::Applied);
        assert_ne!(exit_tree.root(), Field::from(0u64));
        let from = db.get_account(Idx::FIRST_USER).unwrap().unwrap();
        assert_eq!(from.balance, BigUint::from(400u32));
    }

    #[test]
    fn nonzero_fee_is_accrued() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let (sk, bjj) = keypair(9);
        seed_account(&mut db, Idx::FIRST_USER, bjj, 500);
        seed_account(&mut db, Idx::FIRST_USER.next().unwrap(), keypair(10).1, 0);

        let mut tx = L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::FIRST_USER.next().unwrap(),
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(1_000_000u32)).unwrap(),
            fee: FeeSelector(32), // 32e-6 fraction
            nonce: Nonce::ZERO,
            max_num_batch: 0,
            tx_type: L2TxType::Transfer,
            signature: sk.sign(Field::from(0u64)),
            atomic: None,
        };
        tx.signature = sk.sign(tx.signable_hash(cfg.chain_id, Field::from(0u64)));

        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut processor = TxProcessor::new(&mut db, &cfg);
        let result = processor
            .process_l2(&tx, Field::from(0u64), BatchNum(1), &mut exit_tree, &mut fees)
            .unwrap();
        assert_eq!(result.outcome, TxOutcome::Applied);
        assert!(fees.into_inner().get(&TokenId(1)).unwrap() > &BigUint::from(0u32));
    }

    #[test]
    fn max_num_batch_expiry_is_rejected_as_structural() {
        let (_dir, mut db) = open_db();
        let cfg = config();
        let (sk, bjj) = keypair(11);
        seed_account(&mut db, Idx::FIRST_USER, bjj, 500);
        seed_account(&mut db, Idx::FIRST_USER.next().unwrap(), keypair(12).1, 0);

        let mut tx = L2Tx {
            from_idx: Idx::FIRST_USER,
            to_idx: Idx::FIRST_USER.next().unwrap(),
            to_eth_addr: EthAddr::ZERO,
            to_bjj: BjjCompressed::ZERO,
            token_id: TokenId(1),
            amount: Float40::encode(&BigUint::from(1u32)).unwrap(),
            fee: FeeSelector::ZERO,
            nonce: Nonce::ZERO,
            max_num_batch: 4,
            tx_type: L2TxType::Transfer,
            signature: sk.sign(Field::from(0u64)),
            atomic: None,
        };
        tx.signature = sk.sign(tx.signable_hash(cfg.chain_id, Field::from(0u64)));

        let mut exit_tree = ExitTree::new(cfg.n_levels);
        let mut fees = FeeAccumulator::new();
        let mut processor = TxProcessor::new(&mut db, &cfg);
        let err = processor
            .process_l2(&tx, Field::from(0u64), BatchNum(5), &mut exit_tree, &mut fees)
            .unwrap_err();
        assert!(matches!(
            err,
            TxProcessorError::Rejected(TxRejection::Structural(
                StructuralReason::MaxNumBatchExpired { .. }
            ))
        ));
    }
}
