//! An explicit, immutable configuration value threaded through every
//! component of the coordinator core — never a process-wide singleton (see
//! `spec.md` §9, "Global state"). Loaded from YAML/JSON via `serde` and
//! optionally overridden by `clap` flags at the CLI boundary: file first,
//! flags win.

mod coordinator;
mod validate;

#[cfg(feature = "cli")]
mod cli_overrides;

pub use coordinator::CoordinatorConfig;
pub use validate::ConfigError;

#[cfg(feature = "cli")]
pub use cli_overrides::ConfigOverrides;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Circuit-fixed parameters for one coordinator instance. Every field is
/// frozen for the lifetime of the process: changing `NLevels` or any budget
/// mid-run would silently desynchronize a coordinator from its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Depth of the account sparse Merkle tree; bounds the largest `idx`
    /// the StateDB can address to `2^n_levels - 1`.
    pub n_levels: u32,
    /// `#total` budget: every tx slot in a batch, L1 and L2 combined.
    pub max_tx: u32,
    /// `#L1` budget: user-originated plus coordinator-synthesized L1 txs.
    pub max_l1_tx: u32,
    /// `#L1UserTx` budget: the subset of `max_l1_tx` drawn from the user
    /// queue (must always be honoured up to this many per batch).
    pub max_l1_user_tx: u32,
    /// `#feeRecipients` budget: distinct coordinator fee-receiver accounts
    /// settled per batch.
    pub max_fee_tx: u32,
    pub chain_id: u64,
    /// How many historical `StateDB` checkpoints each variant retains.
    pub checkpoints_to_keep: u32,
}

impl Config {
    /// The highest `idx` this tree depth can address.
    pub fn max_idx(&self) -> u64 {
        (1u64 << self.n_levels) - 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::validate(self)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(s).map_err(ConfigError::Yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
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

    #[test]
    fn max_idx_matches_tree_depth() {
        assert_eq!(sample().max_idx(), (1u64 << 16) - 1);
    }

    #[test]
    fn yaml_round_trip() {
        let config = sample();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }
}
