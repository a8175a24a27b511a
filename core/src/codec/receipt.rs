//! The receipt returned to the calling contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::draft::SignMode;

/// Mode tag of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptMode {
    /// Built under `defer_sign`.
    Unsigned,
    /// Built under `delegated`.
    Delegated,
    /// Built under `threshold`.
    Threshold,
    /// Built under `paymaster`.
    Paymaster,
    /// The build failed.
    Error,
}

impl ReceiptMode {
    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Delegated => "delegated",
            Self::Threshold => "threshold",
            Self::Paymaster => "paymaster",
            Self::Error => "error",
        }
    }
}

impl From<SignMode> for ReceiptMode {
    fn from(mode: SignMode) -> Self {
        match mode {
            SignMode::DeferSign => Self::Unsigned,
            SignMode::Delegated => Self::Delegated,
            SignMode::Threshold => Self::Threshold,
            SignMode::Paymaster => Self::Paymaster,
        }
    }
}

impl fmt::Display for ReceiptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a build, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Mode tag.
    pub mode: ReceiptMode,

    /// Hex hash of the unsigned transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned_tx_hash: Option<String>,

    /// Hex hash of a signed transaction. Never set by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_tx_hash: Option<String>,

    /// Base64 of the canonical transaction bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_tx: Option<String>,

    /// Multi-party proposal id. Never set by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,

    /// Error message for `error` receipts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TxReceipt {
    /// A successful receipt.
    pub fn built(mode: SignMode, unsigned_tx_hash: String, serialized_tx: String) -> Self {
        Self {
            mode: mode.into(),
            unsigned_tx_hash: Some(unsigned_tx_hash),
            signed_tx_hash: None,
            serialized_tx: Some(serialized_tx),
            proposal_id: None,
            error: None,
        }
    }

    /// An `error` receipt carrying `message`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            mode: ReceiptMode::Error,
            unsigned_tx_hash: None,
            signed_tx_hash: None,
            serialized_tx: None,
            proposal_id: None,
            error: Some(message.into()),
        }
    }

    /// Returns `true` unless this is an `error` receipt.
    pub fn is_success(&self) -> bool {
        self.mode != ReceiptMode::Error
    }

    /// JSON encoding handed back to the contract.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
