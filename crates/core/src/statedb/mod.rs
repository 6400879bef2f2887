//! Durable storage of accounts and the sparse Merkle tree over them:
//! deterministic Merkle proofs, and checkpoint/rollback (`spec.md` §4.1).

pub mod kv;
pub mod mode;
pub mod smt;

use crate::error::StateDbError;
use kv::Kv;
use mode::StateDbMode;
use rollup_common::Field;
use rollup_types::account::Account;
use rollup_types::ids::Idx;
use rollup_types::zk_inputs::MerkleProof;
use std::path::PathBuf;
use tracing::instrument;

pub struct StateDB {
    kv: Kv,
    root: Field,
    n_levels: u32,
    mode: StateDbMode,
    next_idx: Idx,
}

impl StateDB {
    #[instrument(skip_all, fields(n_levels))]
    pub fn open(
        base_dir: impl Into<PathBuf>,
        n_levels: u32,
        mode: StateDbMode,
    ) -> Result<Self, StateDbError> {
        let kv = Kv::open(base_dir)?;
        let root = match kv.get_root()? {
            Some(bytes) => decode_field(&bytes)?,
            None => smt::zero(),
        };
        let next_idx = match kv.get_next_idx()? {
            Some(raw) => Idx::new(raw).map_err(|_| StateDbError::KeyTooBig(raw))?,
            None => Idx::FIRST_USER,
        };
        Ok(StateDB {
            kv,
            root,
            n_levels,
            mode,
            next_idx,
        })
    }

    pub fn root(&self) -> Field {
        self.root
    }

    pub fn mode(&self) -> &StateDbMode {
        &self.mode
    }

    /// The next idx [`Self::allocate_idx`] will hand out. Lets callers scan
    /// the already-allocated range (e.g. to find an account by eth address)
    /// without maintaining a second index of their own.
    pub fn next_idx_hint(&self) -> Idx {
        self.next_idx
    }

    /// Hands out the next free account `idx` and advances the counter,
    /// implementing "allocate next idx" for `CreateAccountDeposit`/
    /// `CreateAccountCoordinator` (`spec.md` §4.2).
    pub fn allocate_idx(&mut self) -> Result<Idx, StateDbError> {
        let idx = self.next_idx;
        self.check_idx_in_range(idx)?;
        let next = idx.next().map_err(|_| StateDbError::KeyTooBig(idx.get() + 1))?;
        self.kv.put_next_idx(next.get())?;
        self.next_idx = next;
        Ok(idx)
    }

    fn check_idx_in_range(&self, idx: Idx) -> Result<(), StateDbError> {
        let max_idx = (1u64 << self.n_levels) - 1;
        if idx.get() > max_idx {
            return Err(StateDbError::KeyTooBig(idx.get()));
        }
        Ok(())
    }

    /// Creates a brand-new account at `idx`, failing if the slot is
    /// reserved (`idx < 256`) or already occupied.
    #[instrument(skip_all, fields(idx = acc.idx.get()))]
    pub fn create_account(&mut self, acc: &Account) -> Result<MerkleProof, StateDbError> {
        let idx = acc.idx;
        self.check_idx_in_range(idx)?;
        if idx.is_reserved() {
            return Err(StateDbError::ReservedIdx(idx.get()));
        }
        if self.get_account(idx)?.is_some() {
            return Err(StateDbError::AlreadyExists(idx.get()));
        }
        self.write_account(acc)?;
        self.mt_get_proof(idx)
    }

    /// Overwrites an existing account's leaf, failing if it doesn't exist.
    #[instrument(skip_all, fields(idx = acc.idx.get()))]
    pub fn update_account(&mut self, acc: &Account) -> Result<MerkleProof, StateDbError> {
        let idx = acc.idx;
        self.check_idx_in_range(idx)?;
        if self.get_account(idx)?.is_none() {
            return Err(StateDbError::NotFound(idx.get()));
        }
        self.write_account(acc)?;
        self.mt_get_proof(idx)
    }

    fn write_account(&mut self, acc: &Account) -> Result<(), StateDbError> {
        let bytes = serde_json::to_vec(acc)?;
        self.kv.put_account(acc.idx.get(), &bytes)?;
        let value_hash = acc
            .leaf_hash()
            .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?;
        self.root = smt::update(&self.kv, self.root, acc.idx.get(), self.n_levels, value_hash)?;
        self.kv.put_root(&encode_field(self.root))?;
        Ok(())
    }

    pub fn get_account(&self, idx: Idx) -> Result<Option<Account>, StateDbError> {
        match self.kv.get_account(idx.get())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Merkle proof (siblings, leaf-to-root) for `idx` against the current
    /// root, whether or not an account occupies that slot.
    pub fn mt_get_proof(&self, idx: Idx) -> Result<MerkleProof, StateDbError> {
        let siblings = smt::proof(&self.kv, self.root, idx.get(), self.n_levels)?;
        Ok(MerkleProof { siblings })
    }

    /// `true` iff an account exists at `idx` and its Merkle proof verifies
    /// against the current root (`spec.md` §8: existence iff proof holds).
    pub fn verify_account(&self, idx: Idx) -> Result<bool, StateDbError> {
        let leaf = self
            .get_account(idx)?
            .map(|acc| {
                acc.leaf_hash()
                    .map(|vh| smt::leaf_node_hash(idx.get(), vh))
                    .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))
            })
            .transpose()?;
        let proof = self.mt_get_proof(idx)?;
        Ok(smt::verify_proof(
            idx.get(),
            self.n_levels,
            leaf,
            &proof.siblings,
            self.root,
        ))
    }

    #[instrument(skip_all, fields(batch_num))]
    pub fn make_checkpoint(&mut self, batch_num: u64) -> Result<(), StateDbError> {
        self.kv.checkpoint(batch_num)?;
        self.mode.record_historical_root(batch_num, self.root);
        Ok(())
    }

    #[instrument(skip_all, fields(batch_num))]
    pub fn reset(self, batch_num: u64) -> Result<Self, StateDbError> {
        let n_levels = self.n_levels;
        let mode = match self.mode {
            StateDbMode::Synchronizer(roots) => StateDbMode::Synchronizer(roots),
            other => other,
        };
        let kv = self.kv.reset(batch_num)?;
        let root = match kv.get_root()? {
            Some(bytes) => decode_field(&bytes)?,
            None => smt::zero(),
        };
        let next_idx = match kv.get_next_idx()? {
            Some(raw) => Idx::new(raw).map_err(|_| StateDbError::KeyTooBig(raw))?,
            None => Idx::FIRST_USER,
        };
        Ok(StateDB {
            kv,
            root,
            n_levels,
            mode,
            next_idx,
        })
    }

    pub fn delete_old_checkpoints(&self, keep: u32) -> Result<(), StateDbError> {
        self.kv.delete_old_checkpoints(keep)
    }
}

fn encode_field(f: Field) -> Vec<u8> {
    use ark_ff::PrimeField;
    f.into_bigint().to_bytes_be()
}

fn decode_field(bytes: &[u8]) -> Result<Field, StateDbError> {
    use ark_ff::PrimeField;
    Ok(Field::from_be_bytes_mod_order(bytes))
}
