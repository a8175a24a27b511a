//! Loading drafts, ledger fixtures and builder configuration from disk.

use std::path::Path;

use anyhow::{Context, Result};

use loom_core::codec::encoding::decode_address;
use loom_core::ledger::types::Address;
use loom_core::{BuilderConfig, InMemoryLedger};

/// Reads a draft document verbatim.
pub fn read_draft(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read draft {}", path.display()))
}

/// Loads a ledger fixture, or an empty ledger when no path is given.
pub fn load_ledger(path: Option<&Path>) -> Result<InMemoryLedger> {
    let Some(path) = path else {
        return Ok(InMemoryLedger::new());
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read ledger fixture {}", path.display()))?;
    let ledger = InMemoryLedger::from_json(&bytes)
        .with_context(|| format!("invalid ledger fixture {}", path.display()))?;
    let snapshot = ledger.snapshot();
    tracing::info!(
        path = %path.display(),
        utxos = snapshot.utxos.len(),
        sponsors = snapshot.sponsor_pool.len(),
        reserved = snapshot.reserved.len(),
        "ledger fixture loaded"
    );
    Ok(ledger)
}

/// Loads a TOML builder configuration. Missing keys keep their defaults.
pub fn load_config(path: Option<&Path>) -> Result<BuilderConfig> {
    let Some(path) = path else {
        return Ok(BuilderConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Parses a hex address given on the command line.
pub fn parse_address(flag: &'static str, value: &str) -> Result<Address> {
    decode_address(flag, value).with_context(|| format!("invalid --{}", flag))
}
