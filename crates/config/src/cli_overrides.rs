//! CLI-flag overrides layered on top of a YAML-loaded [`Config`]: the file
//! is read first, then any flag set here wins. Only compiled when the `cli`
//! feature is enabled — library consumers that embed the core without a
//! CLI never pull in `clap`.

use crate::Config;
use clap::Args;

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    #[arg(long)]
    pub max_tx: Option<u32>,
    #[arg(long)]
    pub max_l1_tx: Option<u32>,
    #[arg(long)]
    pub max_l1_user_tx: Option<u32>,
    #[arg(long)]
    pub max_fee_tx: Option<u32>,
    #[arg(long)]
    pub chain_id: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(v) = self.max_tx {
            config.max_tx = v;
        }
        if let Some(v) = self.max_l1_tx {
            config.max_l1_tx = v;
        }
        if let Some(v) = self.max_l1_user_tx {
            config.max_l1_user_tx = v;
        }
        if let Some(v) = self.max_fee_tx {
            config.max_fee_tx = v;
        }
        if let Some(v) = self.chain_id {
            config.chain_id = v;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_overrides_leave_config_untouched() {
        let config = Config {
            n_levels: 16,
            max_tx: 100,
            max_l1_tx: 32,
            max_l1_user_tx: 16,
            max_fee_tx: 16,
            chain_id: 1000,
            checkpoints_to_keep: 10,
        };
        let overridden = ConfigOverrides::default().apply(config.clone());
        assert_eq!(config, overridden);
    }

    #[test]
    fn set_overrides_win() {
        let config = Config {
            n_levels: 16,
            max_tx: 100,
            max_l1_tx: 32,
            max_l1_user_tx: 16,
            max_fee_tx: 16,
            chain_id: 1000,
            checkpoints_to_keep: 10,
        };
        let overrides = ConfigOverrides {
            chain_id: Some(42),
            ..Default::default()
        };
        assert_eq!(overrides.apply(config).chain_id, 42);
    }
}
