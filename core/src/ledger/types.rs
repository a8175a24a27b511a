//! Core value types of a Loom transaction.
//!
//! Outputs are a closed sum: every [`TxOutput`] carries exactly one
//! [`OutputContent`], and the builders match on it exhaustively. Addresses
//! and hashes are fixed-size arrays so a wrong length cannot be represented
//! once a value has been decoded.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::lock::LockingCondition;
use crate::config::ADDRESS_LENGTH;

/// A 32-byte hash.
pub type Hash32 = [u8; 32];

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract address.
///
/// Serializes as a hex string in human-readable formats (JSON fixtures) and
/// as raw bytes in binary formats, so the canonical encoding stays compact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero system address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(<[u8; ADDRESS_LENGTH]>::try_from(bytes)?))
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = crate::codec::encoding::decode_hex(&s).map_err(serde::de::Error::custom)?;
            Address::try_from(bytes.as_slice()).map_err(|_| {
                serde::de::Error::custom(format!(
                    "address must be {} bytes, got {}",
                    ADDRESS_LENGTH,
                    bytes.len()
                ))
            })
        } else {
            Ok(Address(<[u8; ADDRESS_LENGTH]>::deserialize(deserializer)?))
        }
    }
}

/// Serde adapters writing [`Hash32`] fields as hex in human-readable formats.
pub mod hash_hex {
    use super::Hash32;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash32, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(hash))
        } else {
            hash.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash32, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = crate::codec::encoding::decode_hex(&s).map_err(serde::de::Error::custom)?;
            Hash32::try_from(bytes.as_slice())
                .map_err(|_| serde::de::Error::custom("hash must be 32 bytes"))
        } else {
            Hash32::deserialize(deserializer)
        }
    }

    /// Same as the parent module for `Option<Hash32>`.
    pub mod option {
        use super::Hash32;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            hash: &Option<Hash32>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            #[derive(serde::Serialize)]
            struct Wrapped<'a>(#[serde(with = "super")] &'a Hash32);

            match hash {
                Some(h) => serializer.serialize_some(&Wrapped(h)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Hash32>, D::Error> {
            #[derive(serde::Deserialize)]
            struct Wrapped(#[serde(with = "super")] Hash32);

            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Id of the transaction that created the output.
    #[serde(with = "hash_hex")]
    pub tx_id: Hash32,
    /// Position of the output in that transaction.
    pub output_index: u32,
}

impl OutPoint {
    /// Creates an outpoint.
    pub fn new(tx_id: Hash32, output_index: u32) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.tx_id), self.output_index)
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The UTXO being consumed or referenced.
    pub previous_output: OutPoint,
    /// `true` when the UTXO is only proven to exist, not spent.
    pub is_reference_only: bool,
}

impl TxInput {
    /// An input that spends `outpoint`.
    pub fn spend(outpoint: OutPoint) -> Self {
        Self {
            previous_output: outpoint,
            is_reference_only: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A transaction output: an owner, its locks, and one kind of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Owning address.
    pub owner: Address,
    /// Spending conditions. Never empty for outputs built by this crate.
    pub locking_conditions: Vec<LockingCondition>,
    /// The value or data held by the output.
    pub content: OutputContent,
}

impl TxOutput {
    /// Returns the asset payload, if this is an asset output.
    pub fn as_asset(&self) -> Option<&AssetOutput> {
        match &self.content {
            OutputContent::Asset(asset) => Some(asset),
            OutputContent::Resource(_) | OutputContent::State(_) => None,
        }
    }

    /// Returns `true` for asset outputs.
    pub fn is_asset(&self) -> bool {
        self.as_asset().is_some()
    }
}

/// What an output holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputContent {
    /// Fungible value.
    Asset(AssetOutput),
    /// An immutable content-addressed resource.
    Resource(ResourceOutput),
    /// A contract state commitment.
    State(StateOutput),
}

/// Value carried by an asset output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetOutput {
    /// The chain's native coin.
    NativeCoin {
        /// Decimal amount in base units.
        amount: String,
    },
    /// A token issued by a contract.
    ContractToken {
        /// The issuing contract.
        contract_address: Address,
        /// Which token of that contract.
        token: TokenIdentifier,
        /// Decimal amount in base units.
        amount: String,
    },
}

impl AssetOutput {
    /// The decimal amount string.
    pub fn amount(&self) -> &str {
        match self {
            Self::NativeCoin { amount } | Self::ContractToken { amount, .. } => amount,
        }
    }

    /// Returns the amount if this is a native-coin output.
    pub fn native_amount(&self) -> Option<&str> {
        match self {
            Self::NativeCoin { amount } => Some(amount),
            Self::ContractToken { .. } => None,
        }
    }
}

/// Identifies a token within its issuing contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenIdentifier {
    /// A fungible token class.
    FungibleClass(Vec<u8>),
    /// A single non-fungible token.
    NonFungible(Vec<u8>),
}

impl TokenIdentifier {
    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::FungibleClass(id) | Self::NonFungible(id) => id,
        }
    }
}

/// Kind of executable a resource holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutableType {
    /// A WASM contract.
    Contract,
    /// An ONNX model.
    AiModel,
}

/// Resource category. Only executables carry an [`ExecutableType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    /// Code or a model that the chain can run.
    Executable(ExecutableType),
    /// Static data: documents, files.
    Static,
}

impl ResourceCategory {
    /// Maps a draft category name onto a category.
    ///
    /// Returns `None` for names outside the table.
    pub fn from_draft_name(name: &str) -> Option<Self> {
        match name {
            "wasm" | "contract" => Some(Self::Executable(ExecutableType::Contract)),
            "onnx" | "model" => Some(Self::Executable(ExecutableType::AiModel)),
            "document" | "file" | "static" => Some(Self::Static),
            _ => None,
        }
    }

    /// The executable type, for executable resources.
    pub fn executable_type(&self) -> Option<ExecutableType> {
        match self {
            Self::Executable(kind) => Some(*kind),
            Self::Static => None,
        }
    }
}

/// How resource content is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Addressed by its content hash.
    ContentAddressed,
}

/// A resource output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutput {
    /// Category and executable type.
    pub category: ResourceCategory,
    /// Hash of the resource content.
    #[serde(with = "hash_hex")]
    pub content_hash: Hash32,
    /// Optional MIME type.
    pub mime_type: Option<String>,
    /// Content size in bytes (0 when unknown).
    pub size: u64,
    /// Storage strategy.
    pub storage_strategy: StorageStrategy,
    /// Always `true`: resources cannot be modified after creation.
    pub is_immutable: bool,
}

/// ZK proof metadata attached to a state output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkStateProof {
    /// Public inputs as 32-byte field elements.
    pub public_inputs: Vec<Hash32>,
    /// Proving scheme name.
    pub proving_scheme: String,
    /// Curve name.
    pub curve: String,
}

/// A state output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOutput {
    /// Opaque state identifier.
    pub state_id: Vec<u8>,
    /// Monotonic state version.
    pub state_version: u64,
    /// Optional proof metadata.
    pub zk_proof: Option<ZkStateProof>,
    /// Hash of the execution that produced this state.
    #[serde(with = "hash_hex")]
    pub execution_result_hash: Hash32,
    /// Hash of the state this one supersedes.
    #[serde(with = "hash_hex::option", default)]
    pub parent_state_hash: Option<Hash32>,
    /// Time to live in seconds.
    pub ttl_duration_seconds: Option<u64>,
}
