use crate::Config;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to parse config YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Cross-field sanity checks the budgets in `spec.md` §3's invariant 6 rely
/// on: every per-class budget must fit inside the totals it's a subset of,
/// and `NLevels` must leave room for the reserved low `idx` range.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.n_levels == 0 || config.n_levels > 48 {
        return Err(ConfigError::Invalid(format!(
            "n_levels must be in 1..=48 (got {})",
            config.n_levels
        )));
    }
    if config.max_idx() < 256 {
        return Err(ConfigError::Invalid(
            "n_levels too small to address the reserved 0..255 idx range plus one user account"
                .into(),
        ));
    }
    if config.max_l1_user_tx > config.max_l1_tx {
        return Err(ConfigError::Invalid(format!(
            "max_l1_user_tx ({}) exceeds max_l1_tx ({})",
            config.max_l1_user_tx, config.max_l1_tx
        )));
    }
    if config.max_l1_tx > config.max_tx {
        return Err(ConfigError::Invalid(format!(
            "max_l1_tx ({}) exceeds max_tx ({})",
            config.max_l1_tx, config.max_tx
        )));
    }
    if config.max_fee_tx > config.max_tx {
        return Err(ConfigError::Invalid(format!(
            "max_fee_tx ({}) exceeds max_tx ({})",
            config.max_fee_tx, config.max_tx
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
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
    fn accepts_well_formed_config() {
        assert!(validate(&base()).is_ok());
    }

    #[test]
    fn rejects_l1_user_budget_exceeding_l1_budget() {
        let mut config = base();
        config.max_l1_user_tx = 64;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_l1_budget_exceeding_total() {
        let mut config = base();
        config.max_l1_tx = 200;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_too_shallow_a_tree() {
        let mut config = base();
        config.n_levels = 4;
        assert!(validate(&config).is_err());
    }
}
