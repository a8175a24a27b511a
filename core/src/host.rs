//! Draft-to-transaction orchestration.
//!
//! [`build_transaction_from_draft`] is the single entry point a contract
//! host function calls. It runs every stage in order:
//!
//! 1. decode and validate the draft document
//! 2. open a draft (guarded; removed on every exit path)
//! 3. apply metadata
//! 4. expand intents
//! 5. append explicit inputs, then explicit outputs
//! 6. apply the sign-mode policy
//! 7. seal, hash and route into a receipt
//!
//! Any failure yields a [`BuildFailure`] holding both the `error` receipt
//! handed back to the contract and the underlying [`BuildError`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::adapter::{DraftTxAdapter, TxAdapter};
use crate::codec::draft::{decode_draft, Draft};
use crate::codec::encoding::decode_hash;
use crate::codec::receipt::TxReceipt;
use crate::draft::{DraftHandle, DraftManager};
use crate::error::BuildError;
use crate::finalize::{finalize_and_route, HashService};
use crate::intent::ParsedIntent;
use crate::ledger::types::{OutPoint, TxInput};
use crate::outputs::build_output;
use crate::policy::apply_sign_mode;
use crate::selection::{SponsorPool, UtxoSelector};

pub use crate::adapter::ExecutionContext;

// ---------------------------------------------------------------------------
// BuildFailure
// ---------------------------------------------------------------------------

/// A failed build: the receipt for the caller plus the cause.
#[derive(Debug, Error)]
#[error("transaction build failed: {error}")]
pub struct BuildFailure {
    /// `error`-tagged receipt carrying the message.
    pub receipt: TxReceipt,
    /// What went wrong.
    #[source]
    pub error: BuildError,
}

impl BuildFailure {
    fn new(error: BuildError) -> Self {
        Self {
            receipt: TxReceipt::failed(error.to_string()),
            error,
        }
    }
}

impl From<BuildError> for BuildFailure {
    fn from(error: BuildError) -> Self {
        Self::new(error)
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Builds an unsigned transaction from a JSON draft document.
///
/// The execution context (caller, contract, block) is the adapter's. The
/// draft opened here never outlives the call, including when the returned
/// future is dropped before completion.
pub async fn build_transaction_from_draft<A>(
    adapter: &A,
    hash_service: &dyn HashService,
    sponsor_pool: &dyn SponsorPool,
    draft_bytes: &[u8],
) -> Result<TxReceipt, BuildFailure>
where
    A: TxAdapter + ?Sized,
{
    match build_guarded(adapter, hash_service, sponsor_pool, draft_bytes).await {
        Ok(receipt) => Ok(receipt),
        Err(error) => {
            let ctx = adapter.context();
            warn!(
                execution = %ctx.execution_id,
                caller = %ctx.caller,
                kind = %error.kind(),
                error = %error,
                "transaction build failed"
            );
            Err(BuildFailure::new(error))
        }
    }
}

async fn build_guarded<A>(
    adapter: &A,
    hash_service: &dyn HashService,
    sponsor_pool: &dyn SponsorPool,
    draft_bytes: &[u8],
) -> Result<TxReceipt, BuildError>
where
    A: TxAdapter + ?Sized,
{
    let draft = decode_draft(draft_bytes)?;
    let handle = adapter.begin_transaction()?;
    let _guard = adapter.guard(handle);
    build_into(adapter, hash_service, sponsor_pool, handle, &draft).await
}

async fn build_into<A>(
    adapter: &A,
    hash_service: &dyn HashService,
    sponsor_pool: &dyn SponsorPool,
    handle: DraftHandle,
    draft: &Draft,
) -> Result<TxReceipt, BuildError>
where
    A: TxAdapter + ?Sized,
{
    adapter.apply_metadata(handle, &draft.metadata)?;

    for intent in &draft.intents {
        match ParsedIntent::parse(intent)? {
            ParsedIntent::Transfer(transfer) => adapter.add_transfer(handle, &transfer).await?,
        }
    }

    for input in &draft.inputs {
        let tx_id = decode_hash("tx_hash", &input.tx_hash)?;
        adapter.add_custom_input(
            handle,
            TxInput {
                previous_output: OutPoint::new(tx_id, input.output_index),
                is_reference_only: input.is_reference_only,
            },
        )?;
    }

    let contract_address = adapter.context().contract_address;
    for spec in &draft.outputs {
        let output = build_output(spec, contract_address, adapter.config())?;
        adapter.add_custom_output(handle, output)?;
    }

    apply_sign_mode(adapter, sponsor_pool, handle, draft).await?;

    finalize_and_route(adapter, hash_service, handle, draft.sign_mode).await
}

// ---------------------------------------------------------------------------
// TxHost
// ---------------------------------------------------------------------------

/// Long-lived collaborators shared by every execution.
#[derive(Clone)]
pub struct TxHost {
    drafts: Arc<DraftManager>,
    selector: Arc<dyn UtxoSelector>,
    sponsor_pool: Arc<dyn SponsorPool>,
    hash_service: Arc<dyn HashService>,
}

impl fmt::Debug for TxHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHost")
            .field("drafts", &self.drafts)
            .finish_non_exhaustive()
    }
}

impl TxHost {
    pub fn new(
        drafts: Arc<DraftManager>,
        selector: Arc<dyn UtxoSelector>,
        sponsor_pool: Arc<dyn SponsorPool>,
        hash_service: Arc<dyn HashService>,
    ) -> Self {
        Self {
            drafts,
            selector,
            sponsor_pool,
            hash_service,
        }
    }

    /// The shared draft store.
    pub fn drafts(&self) -> &Arc<DraftManager> {
        &self.drafts
    }

    /// An adapter bound to `ctx`.
    pub fn adapter(&self, ctx: ExecutionContext) -> DraftTxAdapter {
        DraftTxAdapter::new(self.drafts.clone(), self.selector.clone(), ctx)
    }

    /// Builds `draft_bytes` on behalf of the execution described by `ctx`.
    pub async fn build_transaction_from_draft(
        &self,
        ctx: ExecutionContext,
        draft_bytes: &[u8],
    ) -> Result<TxReceipt, BuildFailure> {
        let adapter = self.adapter(ctx);
        let receipt = build_transaction_from_draft(
            &adapter,
            self.hash_service.as_ref(),
            self.sponsor_pool.as_ref(),
            draft_bytes,
        )
        .await?;
        info!(
            execution = %adapter.context().execution_id,
            mode = %receipt.mode,
            "draft built"
        );
        Ok(receipt)
    }
}
