//! CLI entry point for the coordinator core: drives `TxSelector` and
//! `BatchBuilder` over a scripted batch of L1/L2 transactions, the way an
//! operator would exercise this core outside of its real pool/synchronizer
//! integration (`spec.md` §1, "out of scope").

mod demo;
mod pool;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rollup_config::{Config, ConfigOverrides, CoordinatorConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollup-coordinator", about = "Coordinator-core CLI for the zk-rollup batch pipeline")]
struct Cli {
    /// Path to a YAML config file; falls back to a small built-in demo
    /// config when omitted.
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the scripted demo scenario: two account deposits, a transfer,
    /// an exit, and a rejected overdraft, printing a report per batch.
    Run,
    /// Prints the resolved configuration (file plus CLI overrides) as YAML.
    ShowConfig,
}

/// The built-in config used when `--config` is not given: small enough to
/// exercise every code path in a few batches without any external input.
fn demo_config() -> Config {
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

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => demo_config(),
    };
    let config = cli.overrides.apply(config);
    config.validate().context("validating resolved config")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let coord_config = CoordinatorConfig::default();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let final_root = demo::run(&config, &coord_config)?;
            println!("final confirmed state root: {final_root}");
        }
        Command::ShowConfig => {
            let yaml = serde_yaml::to_string(&config).context("serializing config")?;
            print!("{yaml}");
        }
    }

    Ok(())
}
