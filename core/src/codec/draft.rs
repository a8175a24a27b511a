//! Draft wire document: parsing, defaulting and validation.
//!
//! A contract hands the host a JSON [`DraftDocument`]. Parsing only checks
//! that the JSON fits the schema and fills in the default sign mode;
//! [`validate_draft`] then turns it into a [`Draft`] with a typed
//! [`SignMode`] and rejects drafts that describe nothing at all. Field-level
//! decoding (hex, lengths, amounts) happens later, in the builders that
//! consume each spec.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BuildError;

// ---------------------------------------------------------------------------
// SignMode
// ---------------------------------------------------------------------------

/// How the built transaction will eventually be authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignMode {
    /// Return the transaction unsigned; the caller signs later.
    DeferSign,
    /// Asset outputs are locked to a delegation policy.
    Delegated,
    /// Asset outputs are locked to an m-of-n threshold key set.
    Threshold,
    /// A sponsor pool UTXO pays the fee.
    Paymaster,
}

impl SignMode {
    /// Every supported mode, in wire order.
    pub const ALL: [SignMode; 4] = [
        SignMode::DeferSign,
        SignMode::Delegated,
        SignMode::Threshold,
        SignMode::Paymaster,
    ];

    /// The wire name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeferSign => "defer_sign",
            Self::Delegated => "delegated",
            Self::Threshold => "threshold",
            Self::Paymaster => "paymaster",
        }
    }
}

impl Default for SignMode {
    fn default() -> Self {
        Self::DeferSign
    }
}

impl fmt::Display for SignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defer_sign" => Ok(Self::DeferSign),
            "delegated" => Ok(Self::Delegated),
            "threshold" => Ok(Self::Threshold),
            "paymaster" => Ok(Self::Paymaster),
            other => Err(BuildError::UnknownSignMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The raw draft document as sent by a contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftDocument {
    /// Explicit inputs, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputSpec>,

    /// Explicit outputs, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,

    /// Business intents, expanded before explicit inputs and outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<Intent>,

    /// Wire name of the sign mode. Missing or empty means `defer_sign`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_mode: Option<String>,

    /// Transaction metadata and mode parameters.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Reference to an existing UTXO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Hex-encoded 32-byte transaction id.
    pub tx_hash: String,
    /// Output index within that transaction.
    pub output_index: u32,
    /// `true` when the UTXO is only referenced, not spent.
    #[serde(default)]
    pub is_reference_only: bool,
}

/// Declarative description of an output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// `asset`, `resource` or `state`.
    #[serde(rename = "type")]
    pub output_type: String,
    /// Hex-encoded 20-byte owner address.
    pub owner: String,
    /// Decimal amount (asset outputs only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub amount: String,
    /// Hex token identifier; present means a contract token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Type-specific metadata object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A business intent to be expanded into inputs and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent tag. Only `transfer` is supported.
    #[serde(rename = "type")]
    pub intent_type: String,
    /// Type-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Parameters of a `transfer` intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    /// Hex sender address; pays inputs and receives change.
    pub from: String,
    /// Hex recipient address.
    pub to: String,
    /// Decimal amount to move.
    pub amount: String,
    /// Hex token identifier for contract tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

/// Transaction metadata plus the parameter block of the chosen mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Caller-chosen nonce stamped on the transaction.
    pub nonce: u64,
    /// Free-form memo stamped on the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Opaque tags; carried for the caller, not part of the transaction.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_tags: BTreeMap<String, String>,
    /// Gas limit hint; carried for the caller, not part of the transaction.
    pub gas_limit: u64,
    /// Gas price hint; carried for the caller, not part of the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    /// Required for `delegated`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_params: Option<DelegationParams>,
    /// Required for `threshold`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_params: Option<ThresholdParams>,
    /// Required for `paymaster`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_params: Option<PaymasterParams>,
}

/// Parameters of the delegated sign mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationParams {
    /// Hex address of the owner granting the delegation.
    pub original_owner: String,
    /// Hex addresses allowed to act for the owner.
    pub allowed_delegates: Vec<String>,
    /// Operation names the delegates may perform.
    pub authorized_operations: Vec<String>,
    /// Lifetime in blocks; 0 means no expiry.
    pub expiry_duration_blocks: u64,
    /// Decimal cap on the value moved by a single operation.
    pub max_value_per_operation: String,
    /// Opaque policy blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_policy: Option<String>,
}

/// Parameters of the threshold sign mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Minimum number of shares required.
    pub threshold: u32,
    /// Number of parties holding shares.
    pub total_parties: u32,
    /// Hex verification key per party.
    pub party_verification_keys: Vec<String>,
    /// Scheme name, e.g. `BLS_THRESHOLD`.
    pub signature_scheme: String,
    /// Security level in bits.
    pub security_level: u32,
    /// Opaque policy blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_policy: Option<String>,
}

/// Parameters of the paymaster sign mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymasterParams {
    /// Decimal fee amount in native coin.
    pub fee_amount: String,
    /// Fee token; absent means native coin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Hex miner address receiving the fee output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner_addr: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated draft
// ---------------------------------------------------------------------------

/// A draft that passed validation: the sign mode is typed and the draft is
/// known to describe at least one input, output or intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Explicit inputs.
    pub inputs: Vec<InputSpec>,
    /// Explicit outputs.
    pub outputs: Vec<OutputSpec>,
    /// Intents.
    pub intents: Vec<Intent>,
    /// Typed sign mode.
    pub sign_mode: SignMode,
    /// Metadata and mode parameters.
    pub metadata: Metadata,
}

/// Parses a draft document and applies the default sign mode.
pub fn parse_draft(bytes: &[u8]) -> Result<DraftDocument, BuildError> {
    let mut doc: DraftDocument = serde_json::from_slice(bytes).map_err(BuildError::Parse)?;
    if doc.sign_mode.as_deref().map_or(true, str::is_empty) {
        doc.sign_mode = Some(SignMode::DeferSign.as_str().to_string());
    }
    Ok(doc)
}

/// Validates a parsed document.
///
/// Checks, in order: the sign mode is known, and the draft is not empty.
pub fn validate_draft(doc: DraftDocument) -> Result<Draft, BuildError> {
    let sign_mode = match doc.sign_mode.as_deref() {
        None | Some("") => SignMode::DeferSign,
        Some(name) => name.parse()?,
    };

    if doc.inputs.is_empty() && doc.outputs.is_empty() && doc.intents.is_empty() {
        return Err(BuildError::EmptyDraft);
    }

    debug!(
        sign_mode = %sign_mode,
        inputs = doc.inputs.len(),
        outputs = doc.outputs.len(),
        intents = doc.intents.len(),
        "draft validated"
    );

    Ok(Draft {
        inputs: doc.inputs,
        outputs: doc.outputs,
        intents: doc.intents,
        sign_mode,
        metadata: doc.metadata,
    })
}

/// Parses and validates in one step.
pub fn decode_draft(bytes: &[u8]) -> Result<Draft, BuildError> {
    validate_draft(parse_draft(bytes)?)
}
