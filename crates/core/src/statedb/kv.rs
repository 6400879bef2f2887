//! The embedded key/value layer StateDB sits on: two column families
//! (`accounts`, `mt`) in one `rocksdb` instance, plus a `rocksdb` checkpoint
//! directory per retained batch (`spec.md` §4.1/§6).

use crate::error::StateDbError;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, DB};
use std::path::{Path, PathBuf};

const CF_ACCOUNTS: &str = "accounts";
const CF_MT: &str = "mt";
const ROOT_KEY: &[u8] = b"__root__";
const NEXT_IDX_KEY: &[u8] = b"__next_idx__";
const LIVE_DIR: &str = "live";
const CHECKPOINTS_DIR: &str = "checkpoints";

pub struct Kv {
    db: DB,
    base_dir: PathBuf,
}

impl Kv {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StateDbError> {
        let base_dir = base_dir.into();
        let live = base_dir.join(LIVE_DIR);
        std::fs::create_dir_all(&live).map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_MT, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&db_opts, &live, cfs)?;
        Ok(Kv { db, base_dir })
    }

    fn cf_accounts(&self) -> &ColumnFamily {
        self.db
            .cf_handle(CF_ACCOUNTS)
            .expect("accounts column family opened in Kv::open")
    }

    fn cf_mt(&self) -> &ColumnFamily {
        self.db
            .cf_handle(CF_MT)
            .expect("mt column family opened in Kv::open")
    }

    pub fn get_account(&self, idx: u64) -> Result<Option<Vec<u8>>, StateDbError> {
        Ok(self.db.get_cf(self.cf_accounts(), idx.to_be_bytes())?)
    }

    pub fn put_account(&self, idx: u64, bytes: &[u8]) -> Result<(), StateDbError> {
        Ok(self.db.put_cf(self.cf_accounts(), idx.to_be_bytes(), bytes)?)
    }

    pub fn get_node(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateDbError> {
        Ok(self.db.get_cf(self.cf_mt(), key)?)
    }

    pub fn put_node(&self, key: &[u8], bytes: &[u8]) -> Result<(), StateDbError> {
        Ok(self.db.put_cf(self.cf_mt(), key, bytes)?)
    }

    pub fn get_root(&self) -> Result<Option<Vec<u8>>, StateDbError> {
        Ok(self.db.get_cf(self.cf_mt(), ROOT_KEY)?)
    }

    pub fn put_root(&self, bytes: &[u8]) -> Result<(), StateDbError> {
        Ok(self.db.put_cf(self.cf_mt(), ROOT_KEY, bytes)?)
    }

    /// The next `idx` to hand out for account creation, or `None` if this
    /// variant has never created an account (caller should start from
    /// `Idx::FIRST_USER`).
    pub fn get_next_idx(&self) -> Result<Option<u64>, StateDbError> {
        Ok(self
            .db
            .get_cf(self.cf_accounts(), NEXT_IDX_KEY)?
            .map(|bytes| u64::from_be_bytes(bytes.try_into().unwrap_or([0; 8]))))
    }

    pub fn put_next_idx(&self, next_idx: u64) -> Result<(), StateDbError> {
        Ok(self
            .db
            .put_cf(self.cf_accounts(), NEXT_IDX_KEY, next_idx.to_be_bytes())?)
    }

    /// Materializes a consistent, hard-linked snapshot of the live store
    /// under `checkpoints/<batch_num>/`. Idempotent: re-checkpointing an
    /// already-materialized batch is a no-op, matching the "make checkpoint"
    /// call a variant issues once per successfully built batch.
    pub fn checkpoint(&self, batch_num: u64) -> Result<(), StateDbError> {
        let dir = self.checkpoint_dir(batch_num);
        if dir.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(dir.parent().expect("checkpoint dir has a parent"))
            .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?;
        let checkpoint = rocksdb::checkpoint::Checkpoint::new(&self.db)?;
        checkpoint
            .create_checkpoint(&dir)
            .map_err(StateDbError::from)?;
        Ok(())
    }

    /// Restores the live store to the snapshot taken at `batch_num`,
    /// discarding anything written since. Consumes `self` because the
    /// underlying `DB` handle must close before the directory it owns can
    /// be replaced.
    pub fn reset(self, batch_num: u64) -> Result<Self, StateDbError> {
        let dir = self.checkpoint_dir(batch_num);
        if !dir.exists() {
            return Err(StateDbError::CheckpointNotFound(batch_num));
        }
        let base_dir = self.base_dir.clone();
        drop(self);
        let live = base_dir.join(LIVE_DIR);
        if live.exists() {
            std::fs::remove_dir_all(&live)
                .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?;
        }
        copy_dir_recursive(&dir, &live)
            .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?;
        Kv::open(base_dir)
    }

    /// Retains only the `keep` most recent checkpoints, deleting the rest.
    /// The live tree and its working history stay rebuildable from whatever
    /// remains, per `spec.md` §4.1.
    pub fn delete_old_checkpoints(&self, keep: u32) -> Result<(), StateDbError> {
        let dir = self.base_dir.join(CHECKPOINTS_DIR);
        if !dir.exists() {
            return Ok(());
        }
        let mut batch_nums: Vec<u64> = std::fs::read_dir(&dir)
            .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect();
        batch_nums.sort_unstable_by(|a, b| b.cmp(a));
        for stale in batch_nums.into_iter().skip(keep as usize) {
            let stale_dir = dir.join(stale.to_string());
            std::fs::remove_dir_all(&stale_dir)
                .map_err(|e| StateDbError::CheckpointCorrupt(e.to_string()))?;
        }
        Ok(())
    }

    fn checkpoint_dir(&self, batch_num: u64) -> PathBuf {
        self.base_dir
            .join(CHECKPOINTS_DIR)
            .join(batch_num.to_string())
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_round_trips_through_kv() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Kv::open(dir.path()).unwrap();
        kv.put_account(256, b"payload").unwrap();
        assert_eq!(kv.get_account(256).unwrap(), Some(b"payload".to_vec()));
        assert_eq!(kv.get_account(257).unwrap(), None);
    }

    #[test]
    fn checkpoint_then_reset_restores_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Kv::open(dir.path()).unwrap();
        kv.put_account(256, b"v1").unwrap();
        kv.checkpoint(1).unwrap();
        kv.put_account(256, b"v2").unwrap();
        assert_eq!(kv.get_account(256).unwrap(), Some(b"v2".to_vec()));

        let kv = kv.reset(1).unwrap();
        assert_eq!(kv.get_account(256).unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn reset_to_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Kv::open(dir.path()).unwrap();
        assert!(matches!(
            kv.reset(99),
            Err(StateDbError::CheckpointNotFound(99))
        ));
    }

    #[test]
    fn delete_old_checkpoints_retains_only_the_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Kv::open(dir.path()).unwrap();
        for batch in 1..=5u64 {
            kv.put_account(256, batch.to_string().as_bytes()).unwrap();
            kv.checkpoint(batch).unwrap();
        }
        kv.delete_old_checkpoints(2).unwrap();
        let checkpoints_dir = dir.path().join(CHECKPOINTS_DIR);
        let mut remaining: Vec<u64> = std::fs::read_dir(&checkpoints_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect();
        remaining.sort_unstable();
        assert_eq!(remaining, vec![4, 5]);
    }
}
