//! Output builders.
//!
//! Turns a declarative [`OutputSpec`] into a typed [`TxOutput`]. Each output
//! type reads its own fields from the spec's `metadata` object:
//!
//! - `asset`: optional `amount`, `token_id`
//! - `resource`: `content_hash` and `category`; optional `mime_type`, `size`
//! - `state`: `state_id`; optional `state_version`, `execution_result_hash`,
//!   `public_inputs`, `parent_state_hash`, `ttl_duration_seconds`
//!
//! Any type may carry `metadata.locking_conditions`: hex of an encoded
//! [`LockingCondition`]. It replaces the default single-key lock when it
//! decodes, and is ignored otherwise. Contract-token outputs always end up
//! with a single [`LockingCondition::Contract`] on the executing contract.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::codec::draft::OutputSpec;
use crate::codec::encoding::{
    checked_amount, decode_address, decode_hash, decode_hex, decode_hex_field, hash_from_slice,
};
use crate::config::{BuilderConfig, PUBLIC_INPUT_CHUNK, ZERO_HASH, ZK_CURVE, ZK_PROVING_SCHEME};
use crate::error::BuildError;
use crate::ledger::lock::LockingCondition;
use crate::ledger::types::{
    Address, AssetOutput, OutputContent, ResourceCategory, ResourceOutput, StateOutput,
    StorageStrategy, TokenIdentifier, TxOutput, ZkStateProof,
};

// ---------------------------------------------------------------------------
// Token references
// ---------------------------------------------------------------------------

/// A contract token: the issuing contract plus the token identifier bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef {
    pub contract_address: Address,
    pub token_id: Vec<u8>,
}

impl TokenRef {
    /// Resolves an optional hex `token_id` against the executing contract.
    ///
    /// `None`, an empty string or hex that decodes to nothing all mean the
    /// native coin. A real token id without a contract address is an error.
    pub fn resolve(
        token_id: Option<&str>,
        contract_address: Option<Address>,
    ) -> Result<Option<Self>, BuildError> {
        let token_id = match token_id {
            Some(hex) if !hex.is_empty() => decode_hex_field("token_id", hex)?,
            _ => return Ok(None),
        };
        if token_id.is_empty() {
            return Ok(None);
        }
        let contract_address = contract_address.ok_or(BuildError::MissingContractAddress)?;
        Ok(Some(Self {
            contract_address,
            token_id,
        }))
    }

    /// Selection key: `<contract_hex>:<token_hex>`.
    pub fn asset_key(&self) -> String {
        format!(
            "{}:{}",
            self.contract_address.to_hex(),
            hex::encode(&self.token_id)
        )
    }
}

/// Builds an asset output with the lock its kind requires: a contract lock
/// for tokens, otherwise a single-key lock on `owner`.
///
/// `amount` is stored as its `Display` text, so validated strings keep
/// their original form.
pub fn asset_output(
    owner: Address,
    amount: impl ToString,
    token: Option<&TokenRef>,
) -> TxOutput {
    let amount = amount.to_string();
    let (content, lock) = match token {
        None => (
            AssetOutput::NativeCoin { amount },
            LockingCondition::single_key(owner),
        ),
        Some(token) => (
            AssetOutput::ContractToken {
                contract_address: token.contract_address,
                token: TokenIdentifier::FungibleClass(token.token_id.clone()),
                amount,
            },
            LockingCondition::contract(token.contract_address),
        ),
    };
    TxOutput {
        owner,
        locking_conditions: vec![lock],
        content: OutputContent::Asset(content),
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builds a typed output from `spec`.
///
/// `contract_address` is the executing contract; it is only needed for
/// contract-token asset outputs.
pub fn build_output(
    spec: &OutputSpec,
    contract_address: Option<Address>,
    config: &BuilderConfig,
) -> Result<TxOutput, BuildError> {
    let owner = decode_address("owner", &spec.owner)?;
    let locks = vec![lock_override(spec).unwrap_or_else(|| LockingCondition::single_key(owner))];

    let output = match spec.output_type.as_str() {
        "asset" => build_asset(owner, spec, locks, contract_address)?,
        "resource" => build_resource(owner, spec, locks)?,
        "state" => build_state(owner, spec, locks, config)?,
        other => return Err(BuildError::UnsupportedOutputType(other.to_string())),
    };

    debug!(
        output_type = %spec.output_type,
        owner = %owner,
        lock = output.locking_conditions[0].kind(),
        "output built"
    );
    Ok(output)
}

/// Reads `metadata.locking_conditions`, if present and decodable.
fn lock_override(spec: &OutputSpec) -> Option<LockingCondition> {
    let encoded = spec
        .metadata
        .as_ref()?
        .get("locking_conditions")?
        .as_str()?;

    let bytes = match decode_hex(encoded) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return None,
        Err(e) => {
            warn!(error = %e, "locking_conditions override is not hex; using default lock");
            return None;
        }
    };
    match LockingCondition::decode(&bytes) {
        Ok(lock) => Some(lock),
        Err(e) => {
            warn!(error = %e, "locking_conditions override does not decode; using default lock");
            None
        }
    }
}

fn build_asset(
    owner: Address,
    spec: &OutputSpec,
    locks: Vec<LockingCondition>,
    contract_address: Option<Address>,
) -> Result<TxOutput, BuildError> {
    let (_, amount) = checked_amount("amount", &spec.amount)?;

    match TokenRef::resolve(spec.token_id.as_deref(), contract_address)? {
        // Contract tokens ignore any caller-supplied lock.
        Some(token) => Ok(asset_output(owner, amount, Some(&token))),
        None => Ok(TxOutput {
            owner,
            locking_conditions: locks,
            content: OutputContent::Asset(AssetOutput::NativeCoin {
                amount: amount.to_string(),
            }),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceFields {
    content_hash: String,
    category: String,
    mime_type: Option<String>,
    size: u64,
}

fn build_resource(
    owner: Address,
    spec: &OutputSpec,
    locks: Vec<LockingCondition>,
) -> Result<TxOutput, BuildError> {
    let fields: ResourceFields = read_fields("resource metadata", spec)?;

    if fields.content_hash.is_empty() {
        return Err(BuildError::invalid("content_hash", "is required"));
    }
    let content_hash = decode_hash("content_hash", &fields.content_hash)?;
    let category = ResourceCategory::from_draft_name(&fields.category)
        .ok_or_else(|| BuildError::UnsupportedCategory(fields.category.clone()))?;

    Ok(TxOutput {
        owner,
        locking_conditions: locks,
        content: OutputContent::Resource(ResourceOutput {
            category,
            content_hash,
            mime_type: fields.mime_type.filter(|m| !m.is_empty()),
            size: fields.size,
            storage_strategy: StorageStrategy::ContentAddressed,
            is_immutable: true,
        }),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StateFields {
    state_id: String,
    state_version: u64,
    execution_result_hash: String,
    public_inputs: String,
    parent_state_hash: String,
    ttl_duration_seconds: u64,
}

fn build_state(
    owner: Address,
    spec: &OutputSpec,
    locks: Vec<LockingCondition>,
    config: &BuilderConfig,
) -> Result<TxOutput, BuildError> {
    let fields: StateFields = read_fields("state metadata", spec)?;

    if fields.state_id.is_empty() {
        return Err(BuildError::invalid("state_id", "is required"));
    }
    let state_id = decode_hex_field("state_id", &fields.state_id)?;
    if state_id.is_empty() {
        return Err(BuildError::invalid("state_id", "decodes to no bytes"));
    }

    let execution_result_hash = if fields.execution_result_hash.is_empty() {
        if config.require_execution_result_hash {
            return Err(BuildError::invalid("execution_result_hash", "is required"));
        }
        ZERO_HASH
    } else {
        decode_hash("execution_result_hash", &fields.execution_result_hash)?
    };

    let zk_proof = public_inputs(&fields.public_inputs, config)?.map(|public_inputs| ZkStateProof {
        public_inputs,
        proving_scheme: ZK_PROVING_SCHEME.to_string(),
        curve: ZK_CURVE.to_string(),
    });

    let parent_state_hash = if fields.parent_state_hash.is_empty() {
        None
    } else {
        Some(decode_hash("parent_state_hash", &fields.parent_state_hash)?)
    };

    Ok(TxOutput {
        owner,
        locking_conditions: locks,
        content: OutputContent::State(StateOutput {
            state_id,
            state_version: fields.state_version,
            zk_proof,
            execution_result_hash,
            parent_state_hash,
            ttl_duration_seconds: (fields.ttl_duration_seconds > 0)
                .then_some(fields.ttl_duration_seconds),
        }),
    })
}

/// Splits hex public inputs into 32-byte chunks. `None` when there are none.
fn public_inputs(
    encoded: &str,
    config: &BuilderConfig,
) -> Result<Option<Vec<[u8; 32]>>, BuildError> {
    if encoded.is_empty() {
        return Ok(None);
    }
    let bytes = decode_hex_field("public_inputs", encoded)?;
    if bytes.len() % PUBLIC_INPUT_CHUNK != 0 {
        if config.reject_misaligned_public_inputs {
            return Err(BuildError::invalid(
                "public_inputs",
                format!(
                    "length {} is not a multiple of {}",
                    bytes.len(),
                    PUBLIC_INPUT_CHUNK
                ),
            ));
        }
        warn!(len = bytes.len(), "dropping misaligned public_inputs");
        return Ok(None);
    }
    if bytes.is_empty() {
        return Ok(None);
    }
    bytes
        .chunks(PUBLIC_INPUT_CHUNK)
        .map(|chunk| hash_from_slice("public_inputs", chunk))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn read_fields<T>(context: &'static str, spec: &OutputSpec) -> Result<T, BuildError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match &spec.metadata {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => T::deserialize(value)
            .map_err(|source| BuildError::MalformedPayload { context, source }),
    }
}
