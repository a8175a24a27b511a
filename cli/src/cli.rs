//! # CLI Interface
//!
//! Command-line arguments for `loom`, defined with `clap` derive.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Loom transaction builder.
///
/// Turns JSON transaction drafts into unsigned EUTXO transactions against a
/// ledger fixture, and prints the resulting receipt as JSON on stdout.
#[derive(Parser, Debug)]
#[command(
    name = "loom",
    about = "Loom draft-to-transaction builder",
    version,
    propagate_version = true
)]
pub struct LoomCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "LOOM_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an unsigned transaction from a draft and print its receipt.
    Build(BuildArgs),
    /// Parse and validate a draft without building it.
    Validate(ValidateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the JSON draft document.
    #[arg(long, short = 'd')]
    pub draft: PathBuf,

    /// Path to a JSON ledger fixture holding owned UTXOs and the sponsor pool.
    ///
    /// Without it the ledger is empty: transfers and paymaster drafts fail.
    #[arg(long, short = 'l', env = "LOOM_LEDGER")]
    pub ledger: Option<PathBuf>,

    /// Builder configuration file (TOML).
    #[arg(long, short = 'c', env = "LOOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hex address of the executing contract. Needed for token outputs.
    #[arg(long)]
    pub contract: Option<String>,

    /// Hex address of the caller.
    #[arg(long, default_value = "0000000000000000000000000000000000000000")]
    pub caller: String,

    /// Block height of the execution.
    #[arg(long, default_value_t = 0)]
    pub height: u64,

    /// Block timestamp stamped on the transaction. Defaults to now.
    #[arg(long)]
    pub timestamp: Option<u64>,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the JSON draft document.
    #[arg(long, short = 'd')]
    pub draft: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        LoomCli::command().debug_assert();
    }

    #[test]
    fn build_args_parse() {
        let cli = LoomCli::parse_from([
            "loom",
            "--log-format",
            "json",
            "build",
            "--draft",
            "draft.json",
            "--contract",
            "11".repeat(20).as_str(),
            "--timestamp",
            "1700000000",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.draft, PathBuf::from("draft.json"));
                assert_eq!(args.timestamp, Some(1_700_000_000));
                assert_eq!(args.height, 0);
                assert!(args.ledger.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
