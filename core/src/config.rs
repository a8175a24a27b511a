//! # Builder Configuration & Constants
//!
//! Every fixed size and default limit used by the draft builder lives here.
//! The byte lengths are consensus rules: an owner that is not 20 bytes or a
//! hash that is not 32 bytes is rejected before it can reach a draft.
//!
//! [`BuilderConfig`] carries the tunable knobs. It deserializes from TOML or
//! JSON so the CLI (and any embedding node) can override the defaults without
//! a rebuild.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ledger Sizes
// ---------------------------------------------------------------------------

/// Length of an owner / contract / miner address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Length of every hash the builder handles (tx ids, content hashes,
/// execution-result hashes, parent-state hashes).
pub const HASH_LENGTH: usize = 32;

/// ZK public inputs are carried as concatenated 32-byte field elements.
pub const PUBLIC_INPUT_CHUNK: usize = 32;

/// The all-zero address. Fee outputs fall back to it when no miner is named.
pub const ZERO_ADDRESS: [u8; ADDRESS_LENGTH] = [0u8; ADDRESS_LENGTH];

/// Placeholder for a state output that carries no execution-result hash.
pub const ZERO_HASH: [u8; HASH_LENGTH] = [0u8; HASH_LENGTH];

// ---------------------------------------------------------------------------
// Transaction Format
// ---------------------------------------------------------------------------

/// Version stamped on every transaction this builder produces.
pub const TRANSACTION_VERSION: u32 = 1;

/// Asset key used for the native coin in selection requests.
pub const NATIVE_ASSET_KEY: &str = "native";

/// Proving scheme recorded on state outputs that carry public inputs.
pub const ZK_PROVING_SCHEME: &str = "groth16";

/// Curve recorded on state outputs that carry public inputs.
pub const ZK_CURVE: &str = "bn254";

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Default cap on simultaneously open drafts across all executions.
pub const DEFAULT_MAX_OPEN_DRAFTS: usize = 1000;

/// Default maximum number of inputs per transaction.
pub const DEFAULT_MAX_TX_INPUTS: usize = 256;

/// Default maximum number of outputs per transaction.
pub const DEFAULT_MAX_TX_OUTPUTS: usize = 256;

// ---------------------------------------------------------------------------
// BuilderConfig
// ---------------------------------------------------------------------------

/// Tunable parameters for draft construction.
///
/// Defaults match the behaviour contracts rely on today: a missing
/// execution-result hash is replaced by [`ZERO_HASH`], while misaligned ZK
/// public inputs are rejected instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Maximum number of drafts open at the same time.
    pub max_open_drafts: usize,

    /// Maximum inputs a single draft may accumulate.
    pub max_inputs: usize,

    /// Maximum outputs a single draft may accumulate.
    pub max_outputs: usize,

    /// Reject state outputs without an `execution_result_hash` instead of
    /// substituting the zero hash.
    pub require_execution_result_hash: bool,

    /// Reject `public_inputs` whose length is not a multiple of 32 bytes.
    /// When `false` they are dropped and no ZK proof is attached.
    pub reject_misaligned_public_inputs: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_open_drafts: DEFAULT_MAX_OPEN_DRAFTS,
            max_inputs: DEFAULT_MAX_TX_INPUTS,
            max_outputs: DEFAULT_MAX_TX_OUTPUTS,
            require_execution_result_hash: false,
            reject_misaligned_public_inputs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_constants_have_expected_sizes() {
        assert_eq!(ZERO_ADDRESS.len(), ADDRESS_LENGTH);
        assert_eq!(ZERO_HASH.len(), HASH_LENGTH);
        assert!(ZERO_HASH.iter().all(|b| *b == 0));
    }

    #[test]
    fn default_config_keeps_zero_hash_placeholder() {
        let config = BuilderConfig::default();
        assert!(!config.require_execution_result_hash);
        assert!(config.reject_misaligned_public_inputs);
        assert_eq!(config.max_open_drafts, DEFAULT_MAX_OPEN_DRAFTS);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: BuilderConfig = serde_json::from_str(r#"{"max_inputs": 4}"#).unwrap();
        assert_eq!(config.max_inputs, 4);
        assert_eq!(config.max_outputs, DEFAULT_MAX_TX_OUTPUTS);
    }
}
