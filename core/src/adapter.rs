//! The transaction adapter exposed to contract executions.
//!
//! [`TxAdapter`] is the surface a host function sees: open a draft, feed it
//! inputs, outputs and transfers, then finalize or discard it. Every call is
//! scoped to the execution the adapter was created for.
//! [`DraftTxAdapter`] implements it over a shared [`DraftManager`].

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::codec::draft::{Metadata, TransferIntent};
use crate::config::BuilderConfig;
use crate::draft::{DraftCheckpoint, DraftGuard, DraftHandle, DraftManager, DraftTx, ExecutionId};
use crate::error::BuildError;
use crate::intent::plan_transfer;
use crate::ledger::lock::LockingCondition;
use crate::ledger::transaction::Transaction;
use crate::ledger::types::{Address, OutPoint, TxInput, TxOutput};
use crate::selection::UtxoSelector;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Who is building, from which contract, at which block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    /// Account that invoked the contract.
    pub caller: Address,
    /// The executing contract. Required for contract-token outputs.
    pub contract_address: Option<Address>,
    pub block_height: u64,
    /// Stamped on every transaction opened in this execution.
    pub block_timestamp: u64,
}

impl ExecutionContext {
    /// A context with a fresh execution id.
    pub fn new(caller: Address, block_height: u64, block_timestamp: u64) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            caller,
            contract_address: None,
            block_height,
            block_timestamp,
        }
    }

    /// Sets the executing contract.
    pub fn with_contract(mut self, contract_address: Address) -> Self {
        self.contract_address = Some(contract_address);
        self
    }
}

/// A draft that was sealed and routed by this execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTransaction {
    /// The sealed draft, transaction included.
    pub draft: DraftTx,
    /// Hex hash from the receipt.
    pub tx_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// TxAdapter
// ---------------------------------------------------------------------------

/// Draft operations available to one execution.
#[async_trait]
pub trait TxAdapter: Send + Sync {
    /// The execution this adapter serves.
    fn context(&self) -> &ExecutionContext;

    /// Limits and output-building options.
    fn config(&self) -> &BuilderConfig;

    /// Opens an empty draft stamped with the block timestamp.
    fn begin_transaction(&self) -> Result<DraftHandle, BuildError>;

    /// A guard that discards the draft when dropped.
    fn guard(&self, handle: DraftHandle) -> DraftGuard<'_>;

    /// Copies nonce and memo onto the transaction.
    fn apply_metadata(&self, handle: DraftHandle, metadata: &Metadata) -> Result<(), BuildError>;

    /// Expands a transfer and applies it atomically.
    async fn add_transfer(
        &self,
        handle: DraftHandle,
        transfer: &TransferIntent,
    ) -> Result<(), BuildError>;

    /// Appends an input. Returns its index.
    fn add_custom_input(&self, handle: DraftHandle, input: TxInput) -> Result<usize, BuildError>;

    /// Appends an output. Returns its index.
    fn add_custom_output(&self, handle: DraftHandle, output: TxOutput)
        -> Result<usize, BuildError>;

    /// Replaces the locks of every asset output with `lock`. Returns how
    /// many outputs were rewritten.
    fn rewrite_asset_locks(
        &self,
        handle: DraftHandle,
        lock: LockingCondition,
    ) -> Result<usize, BuildError>;

    /// A copy of the draft.
    fn get_draft(&self, handle: DraftHandle) -> Result<DraftTx, BuildError>;

    fn checkpoint(&self, handle: DraftHandle) -> Result<DraftCheckpoint, BuildError>;

    fn rollback_to(&self, checkpoint: &DraftCheckpoint) -> Result<(), BuildError>;

    /// Seals the draft and returns the finished transaction.
    fn finalize_transaction(&self, handle: DraftHandle) -> Result<Transaction, BuildError>;

    /// Discards the draft. Unknown handles are ignored.
    fn cleanup_draft(&self, handle: DraftHandle);

    /// Keeps a finished transaction readable after its draft is discarded.
    fn record_built(&self, built: BuiltTransaction);

    /// Transactions built by this execution, oldest first.
    fn built_transactions(&self) -> Vec<BuiltTransaction>;
}

// ---------------------------------------------------------------------------
// DraftTxAdapter
// ---------------------------------------------------------------------------

/// [`TxAdapter`] over a shared [`DraftManager`] and a UTXO selector.
#[derive(Clone)]
pub struct DraftTxAdapter {
    drafts: Arc<DraftManager>,
    selector: Arc<dyn UtxoSelector>,
    context: ExecutionContext,
    built: Arc<Mutex<Vec<BuiltTransaction>>>,
}

impl std::fmt::Debug for DraftTxAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftTxAdapter")
            .field("context", &self.context)
            .field("drafts", &self.drafts)
            .field("built", &self.built.lock().len())
            .finish()
    }
}

impl DraftTxAdapter {
    /// An adapter for `context`.
    pub fn new(
        drafts: Arc<DraftManager>,
        selector: Arc<dyn UtxoSelector>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            drafts,
            selector,
            context,
            built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn execution(&self) -> ExecutionId {
        self.context.execution_id
    }
}

#[async_trait]
impl TxAdapter for DraftTxAdapter {
    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn config(&self) -> &BuilderConfig {
        self.drafts.config()
    }

    fn begin_transaction(&self) -> Result<DraftHandle, BuildError> {
        self.drafts.create_draft(
            self.execution(),
            self.context.block_height,
            self.context.block_timestamp,
        )
    }

    fn guard(&self, handle: DraftHandle) -> DraftGuard<'_> {
        self.drafts.guard(self.execution(), handle)
    }

    fn apply_metadata(&self, handle: DraftHandle, metadata: &Metadata) -> Result<(), BuildError> {
        self.drafts.with_draft_mut(self.execution(), handle, |tx| {
            tx.nonce = metadata.nonce;
            tx.memo = metadata.memo.clone().filter(|m| !m.is_empty());
            Ok(())
        })
    }

    async fn add_transfer(
        &self,
        handle: DraftHandle,
        transfer: &TransferIntent,
    ) -> Result<(), BuildError> {
        // Fail before touching the selector if the draft is gone or sealed.
        let spent: Vec<OutPoint> = self.drafts.with_draft_mut(self.execution(), handle, |tx| {
            Ok(tx.inputs.iter().map(|input| input.previous_output).collect())
        })?;

        let plan = plan_transfer(
            self.selector.as_ref(),
            self.context.contract_address,
            &spent,
            transfer,
        )
        .await?;
        self.drafts
            .append(self.execution(), handle, plan.inputs, plan.outputs)
    }

    fn add_custom_input(&self, handle: DraftHandle, input: TxInput) -> Result<usize, BuildError> {
        let index = self.checkpoint(handle)?.inputs;
        self.drafts
            .append(self.execution(), handle, vec![input], Vec::new())?;
        Ok(index)
    }

    fn add_custom_output(
        &self,
        handle: DraftHandle,
        output: TxOutput,
    ) -> Result<usize, BuildError> {
        let index = self.checkpoint(handle)?.outputs;
        self.drafts
            .append(self.execution(), handle, Vec::new(), vec![output])?;
        Ok(index)
    }

    fn rewrite_asset_locks(
        &self,
        handle: DraftHandle,
        lock: LockingCondition,
    ) -> Result<usize, BuildError> {
        self.drafts.with_draft_mut(self.execution(), handle, |tx| {
            let mut rewritten = 0;
            for output in tx.outputs.iter_mut().filter(|o| o.is_asset()) {
                output.locking_conditions = vec![lock.clone()];
                rewritten += 1;
            }
            debug!(handle = %handle, lock = lock.kind(), rewritten, "asset locks rewritten");
            Ok(rewritten)
        })
    }

    fn get_draft(&self, handle: DraftHandle) -> Result<DraftTx, BuildError> {
        self.drafts.get_draft(self.execution(), handle)
    }

    fn checkpoint(&self, handle: DraftHandle) -> Result<DraftCheckpoint, BuildError> {
        self.drafts.checkpoint(self.execution(), handle)
    }

    fn rollback_to(&self, checkpoint: &DraftCheckpoint) -> Result<(), BuildError> {
        self.drafts.rollback_to(self.execution(), checkpoint)
    }

    fn finalize_transaction(&self, handle: DraftHandle) -> Result<Transaction, BuildError> {
        self.drafts.seal_draft(self.execution(), handle)
    }

    fn cleanup_draft(&self, handle: DraftHandle) {
        let _ = self.drafts.remove_draft(self.execution(), handle);
    }

    fn record_built(&self, built: BuiltTransaction) {
        self.built.lock().push(built);
    }

    fn built_transactions(&self) -> Vec<BuiltTransaction> {
        self.built.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Batch helpers
// ---------------------------------------------------------------------------

/// Appends every input or none of them.
///
/// On failure the inputs already added are rolled back and the first error
/// is returned.
pub fn batch_add_inputs<A>(
    adapter: &A,
    handle: DraftHandle,
    inputs: Vec<TxInput>,
) -> Result<usize, BuildError>
where
    A: TxAdapter + ?Sized,
{
    let checkpoint = adapter.checkpoint(handle)?;
    let total = inputs.len();
    for (i, input) in inputs.into_iter().enumerate() {
        if let Err(e) = adapter.add_custom_input(handle, input) {
            warn!(
                handle = %handle,
                failed_at = i,
                total,
                error = %e,
                "batch input add failed; rolling back"
            );
            adapter.rollback_to(&checkpoint)?;
            return Err(e);
        }
    }
    Ok(total)
}

/// Appends every output or none of them.
pub fn batch_add_outputs<A>(
    adapter: &A,
    handle: DraftHandle,
    outputs: Vec<TxOutput>,
) -> Result<usize, BuildError>
where
    A: TxAdapter + ?Sized,
{
    let checkpoint = adapter.checkpoint(handle)?;
    let total = outputs.len();
    for (i, output) in outputs.into_iter().enumerate() {
        if let Err(e) = adapter.add_custom_output(handle, output) {
            warn!(
                handle = %handle,
                failed_at = i,
                total,
                error = %e,
                "batch output add failed; rolling back"
            );
            adapter.rollback_to(&checkpoint)?;
            return Err(e);
        }
    }
    Ok(total)
}
