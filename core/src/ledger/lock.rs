//! Locking conditions: who may spend an output and under what rules.

use serde::{Deserialize, Serialize};

use super::types::Address;

/// Signature algorithm expected by a [`SingleKeyLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    /// ECDSA over secp256k1.
    EcdsaSecp256k1,
    /// Ed25519.
    Ed25519,
}

/// Which parts of the transaction a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SighashType {
    /// Every input and output.
    All,
    /// Every input, no outputs.
    None,
    /// Every input and the output at the same index.
    Single,
}

/// Spendable by a single key holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleKeyLock {
    /// Address the signer must control.
    pub required_address: Address,
    /// Expected algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Expected sighash.
    pub sighash: SighashType,
}

/// Spendable only by the named contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLock {
    /// The controlling contract.
    pub contract_address: Address,
}

/// Spendable by delegates acting for the original owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationLock {
    pub original_owner: Address,
    pub allowed_delegates: Vec<Address>,
    pub authorized_operations: Vec<String>,
    /// `None` means the delegation never expires.
    pub expiry_duration_blocks: Option<u64>,
    pub max_value_per_operation: u64,
    pub delegation_policy: Option<Vec<u8>>,
}

/// Spendable with `threshold` of `total_parties` key shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdLock {
    pub threshold: u32,
    pub total_parties: u32,
    pub party_verification_keys: Vec<Vec<u8>>,
    pub signature_scheme: String,
    pub security_level: u32,
    pub threshold_policy: Option<Vec<u8>>,
}

/// A spending condition attached to an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockingCondition {
    SingleKey(SingleKeyLock),
    Contract(ContractLock),
    Delegation(DelegationLock),
    Threshold(ThresholdLock),
}

impl LockingCondition {
    /// The default lock: ECDSA signature by `owner` over the whole transaction.
    pub fn single_key(owner: Address) -> Self {
        Self::SingleKey(SingleKeyLock {
            required_address: owner,
            algorithm: SignatureAlgorithm::EcdsaSecp256k1,
            sighash: SighashType::All,
        })
    }

    /// A lock held by `contract_address`.
    pub fn contract(contract_address: Address) -> Self {
        Self::Contract(ContractLock { contract_address })
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SingleKey(_) => "single_key",
            Self::Contract(_) => "contract",
            Self::Delegation(_) => "delegation",
            Self::Threshold(_) => "threshold",
        }
    }

    /// Canonical binary encoding, as accepted by the `locking_conditions`
    /// output override.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decodes [`LockingCondition::encode`] output. Trailing bytes are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        use bincode::Options;

        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(bytes)
    }
}
