//! Finalization and receipt routing.
//!
//! The canonical transaction hash is computed by an external
//! [`HashService`], never locally by the router, so every node agrees on the
//! same hashing rules. [`Blake3HashService`] is an in-process implementation
//! for tests and the CLI.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapter::{BuiltTransaction, TxAdapter};
use crate::codec::draft::SignMode;
use crate::codec::encoding::{encode_base64, encode_hex};
use crate::codec::receipt::TxReceipt;
use crate::draft::DraftHandle;
use crate::error::BuildError;
use crate::ledger::transaction::Transaction;

// ---------------------------------------------------------------------------
// HashService
// ---------------------------------------------------------------------------

/// Errors raised by a [`HashService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashServiceError {
    /// The service could not be reached.
    #[error("failed to compute transaction hash: {0}")]
    Unavailable(String),

    /// The service could not encode the transaction.
    #[error("failed to encode transaction for hashing: {0}")]
    Encoding(String),
}

/// Reply of a [`HashService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResponse {
    /// Canonical transaction hash.
    pub hash: Vec<u8>,
    /// `false` when the service judged the transaction malformed.
    pub is_valid: bool,
}

/// Computes canonical transaction hashes.
#[async_trait]
pub trait HashService: Send + Sync {
    async fn compute_hash(&self, tx: &Transaction) -> Result<HashResponse, HashServiceError>;
}

/// BLAKE3 over the canonical transaction bytes.
///
/// A transaction is valid when it has at least one input or output and
/// every output carries at least one locking condition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3HashService;

#[async_trait]
impl HashService for Blake3HashService {
    async fn compute_hash(&self, tx: &Transaction) -> Result<HashResponse, HashServiceError> {
        let bytes = tx
            .canonical_bytes()
            .map_err(|e| HashServiceError::Encoding(e.to_string()))?;
        let is_valid = !tx.is_empty()
            && tx
                .outputs
                .iter()
                .all(|output| !output.locking_conditions.is_empty());
        Ok(HashResponse {
            hash: blake3::hash(&bytes).as_bytes().to_vec(),
            is_valid,
        })
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Hashes a sealed transaction and builds the receipt for `mode`.
pub async fn route_by_sign_mode(
    hash_service: &dyn HashService,
    mode: SignMode,
    tx: &Transaction,
) -> Result<TxReceipt, BuildError> {
    let serialized = tx.canonical_bytes()?;
    let response = hash_service.compute_hash(tx).await?;
    if !response.is_valid {
        return Err(BuildError::InvalidTransactionStructure);
    }
    debug!(mode = %mode, bytes = serialized.len(), "transaction hashed");
    Ok(TxReceipt::built(
        mode,
        encode_hex(&response.hash),
        encode_base64(&serialized),
    ))
}

/// Seals the draft, routes it and records the result on the adapter.
pub async fn finalize_and_route<A>(
    adapter: &A,
    hash_service: &dyn HashService,
    handle: DraftHandle,
    mode: SignMode,
) -> Result<TxReceipt, BuildError>
where
    A: TxAdapter + ?Sized,
{
    let tx = adapter.finalize_transaction(handle)?;
    let receipt = route_by_sign_mode(hash_service, mode, &tx).await?;
    adapter.record_built(BuiltTransaction {
        draft: adapter.get_draft(handle)?,
        tx_hash: receipt.unsigned_tx_hash.clone(),
    });
    info!(
        handle = %handle,
        mode = %receipt.mode,
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        tx_hash = receipt.unsigned_tx_hash.as_deref().unwrap_or_default(),
        "transaction finalized"
    );
    Ok(receipt)
}
