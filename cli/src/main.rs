// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Loom CLI
//!
//! Entry point for the `loom` binary. Runs JSON drafts through the
//! transaction builder against a ledger fixture, outside any contract host.
//!
//! - `build`: build a draft and print its receipt
//! - `validate`: check a draft without building it
//! - `version`: print build version information

mod cli;
mod fixtures;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use loom_core::codec::draft::decode_draft;
use loom_core::{Blake3HashService, DraftManager, ExecutionContext, TxHost, TxReceipt};

use cli::{BuildArgs, Commands, LoomCli, ValidateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = LoomCli::parse();
    logging::init_logging("loom=info,loom_core=info", cli.log_format);

    match cli.command {
        Commands::Build(args) => build(args).await,
        Commands::Validate(args) => validate(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds the draft and prints the receipt. A failed build still prints its
/// `error` receipt before exiting non-zero.
async fn build(args: BuildArgs) -> Result<()> {
    let draft = fixtures::read_draft(&args.draft)?;
    let config = fixtures::load_config(args.config.as_deref())?;
    let ledger = Arc::new(fixtures::load_ledger(args.ledger.as_deref())?);

    let caller = fixtures::parse_address("caller", &args.caller)?;
    let timestamp = args
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);
    let mut ctx = ExecutionContext::new(caller, args.height, timestamp);
    if let Some(contract) = args.contract.as_deref() {
        ctx = ctx.with_contract(fixtures::parse_address("contract", contract)?);
    }

    tracing::info!(
        draft = %args.draft.display(),
        execution = %ctx.execution_id,
        caller = %caller,
        height = args.height,
        "building draft"
    );

    let host = TxHost::new(
        Arc::new(DraftManager::new(config)),
        ledger.clone(),
        ledger,
        Arc::new(Blake3HashService),
    );

    match host.build_transaction_from_draft(ctx, &draft).await {
        Ok(receipt) => print_receipt(&receipt),
        Err(failure) => {
            print_receipt(&failure.receipt)?;
            Err(failure.into())
        }
    }
}

/// Parses and validates the draft, printing a short summary.
fn validate(args: ValidateArgs) -> Result<()> {
    let bytes = fixtures::read_draft(&args.draft)?;
    let draft = decode_draft(&bytes)
        .with_context(|| format!("draft {} is invalid", args.draft.display()))?;

    let summary = serde_json::json!({
        "sign_mode": draft.sign_mode.as_str(),
        "inputs": draft.inputs.len(),
        "outputs": draft.outputs.len(),
        "intents": draft.intents.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_receipt(receipt: &TxReceipt) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(receipt)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("loom {}", env!("CARGO_PKG_VERSION"));
    println!("rustc {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}
