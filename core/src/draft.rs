//! In-memory draft lifecycle.
//!
//! A draft is a transaction under construction. The [`DraftManager`] owns
//! every open draft, keyed by a small non-zero [`DraftHandle`], and scopes
//! each one to the [`ExecutionId`] that opened it: another execution asking
//! for the same handle gets [`BuildError::DraftNotFound`].
//!
//! ## Design
//!
//! - `DashMap` holds the drafts; each access locks a single shard, so
//!   concurrent executions working on different drafts do not contend.
//! - Handles come from an atomic counter. Zero and handles still in use are
//!   skipped, so a handle is unique among open drafts even after wrap-around.
//! - Once sealed, a draft rejects every mutation with
//!   [`BuildError::DraftSealed`].
//! - [`DraftGuard`] removes its draft when dropped, which covers early
//!   returns, panics and cancelled futures alike.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::ledger::transaction::Transaction;
use crate::ledger::types::{OutPoint, TxInput, TxOutput};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque handle of an open draft.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftHandle(NonZeroU32);

impl DraftHandle {
    /// Wraps a raw handle value. Zero is never a valid handle.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw handle value.
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for DraftHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for DraftHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DraftHandle({})", self.0)
    }
}

/// Identifies one contract execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an id assigned by the execution engine.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// DraftTx
// ---------------------------------------------------------------------------

/// A transaction under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTx {
    pub handle: DraftHandle,
    /// The execution allowed to see and mutate this draft.
    pub execution: ExecutionId,
    /// Wall-clock time the draft was opened.
    pub created_at: DateTime<Utc>,
    /// Block height the execution runs at.
    pub block_height: u64,
    pub tx: Transaction,
    pub is_sealed: bool,
}

/// Input and output counts of a draft at some point in time.
///
/// Rolling back truncates the draft to these counts. Fields set by
/// metadata (nonce, memo) and lock rewrites are not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftCheckpoint {
    pub handle: DraftHandle,
    pub inputs: usize,
    pub outputs: usize,
}

// ---------------------------------------------------------------------------
// DraftManager
// ---------------------------------------------------------------------------

/// Owner of all open drafts.
pub struct DraftManager {
    drafts: DashMap<DraftHandle, DraftTx>,
    next_handle: AtomicU32,
    open: AtomicUsize,
    config: BuilderConfig,
}

impl fmt::Debug for DraftManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftManager")
            .field("open", &self.drafts.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for DraftManager {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl DraftManager {
    /// Creates an empty manager.
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            drafts: DashMap::new(),
            next_handle: AtomicU32::new(1),
            open: AtomicUsize::new(0),
            config,
        }
    }

    /// The configuration this manager enforces.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Number of open drafts.
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    /// Returns `true` when no drafts are open.
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Opens a new draft for `execution`.
    ///
    /// Fails with [`BuildError::TooManyDrafts`] once `max_open_drafts` drafts
    /// are open.
    pub fn create_draft(
        &self,
        execution: ExecutionId,
        block_height: u64,
        block_timestamp: u64,
    ) -> Result<DraftHandle, BuildError> {
        let limit = self.config.max_open_drafts;
        self.open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| BuildError::TooManyDrafts { limit })?;

        loop {
            let Some(handle) =
                DraftHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
            else {
                continue;
            };
            if let Entry::Vacant(slot) = self.drafts.entry(handle) {
                slot.insert(DraftTx {
                    handle,
                    execution,
                    created_at: Utc::now(),
                    block_height,
                    tx: Transaction::new(block_timestamp),
                    is_sealed: false,
                });
                info!(handle = %handle, execution = %execution, block_height, "draft opened");
                return Ok(handle);
            }
        }
    }

    /// Returns a copy of the draft.
    pub fn get_draft(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
    ) -> Result<DraftTx, BuildError> {
        self.with_draft(execution, handle, DraftTx::clone)
    }

    /// Runs `f` against the draft without mutating it.
    pub fn with_draft<R>(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
        f: impl FnOnce(&DraftTx) -> R,
    ) -> Result<R, BuildError> {
        match self.drafts.get(&handle) {
            Some(draft) if draft.execution == execution => Ok(f(draft.value())),
            _ => Err(BuildError::DraftNotFound(handle)),
        }
    }

    /// Runs `f` against the draft's transaction.
    ///
    /// The draft's shard stays locked while `f` runs, so `f` must not call
    /// back into the manager.
    pub fn with_draft_mut<R>(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
        f: impl FnOnce(&mut Transaction) -> Result<R, BuildError>,
    ) -> Result<R, BuildError> {
        let mut draft = match self.drafts.get_mut(&handle) {
            Some(draft) if draft.execution == execution => draft,
            _ => return Err(BuildError::DraftNotFound(handle)),
        };
        if draft.is_sealed {
            return Err(BuildError::DraftSealed(handle));
        }
        f(&mut draft.tx)
    }

    /// Appends inputs and outputs together, or neither.
    ///
    /// Per-transaction limits are checked before anything is written. An
    /// outpoint may be spent once per draft; a repeat is rejected with
    /// [`BuildError::DuplicateInput`].
    pub fn append(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
    ) -> Result<(), BuildError> {
        let (max_inputs, max_outputs) = (self.config.max_inputs, self.config.max_outputs);
        self.with_draft_mut(execution, handle, |tx| {
            if tx.inputs.len() + inputs.len() > max_inputs {
                return Err(BuildError::TxLimitExceeded {
                    what: "inputs",
                    limit: max_inputs,
                });
            }
            if tx.outputs.len() + outputs.len() > max_outputs {
                return Err(BuildError::TxLimitExceeded {
                    what: "outputs",
                    limit: max_outputs,
                });
            }
            let mut spent: HashSet<OutPoint> =
                tx.inputs.iter().map(|input| input.previous_output).collect();
            for input in &inputs {
                if !spent.insert(input.previous_output) {
                    return Err(BuildError::DuplicateInput(input.previous_output));
                }
            }
            tx.inputs.extend(inputs);
            tx.outputs.extend(outputs);
            Ok(())
        })
    }

    /// Records the current input and output counts.
    pub fn checkpoint(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
    ) -> Result<DraftCheckpoint, BuildError> {
        self.with_draft(execution, handle, |draft| DraftCheckpoint {
            handle,
            inputs: draft.tx.inputs.len(),
            outputs: draft.tx.outputs.len(),
        })
    }

    /// Drops every input and output added after `checkpoint`.
    pub fn rollback_to(
        &self,
        execution: ExecutionId,
        checkpoint: &DraftCheckpoint,
    ) -> Result<(), BuildError> {
        self.with_draft_mut(execution, checkpoint.handle, |tx| {
            let dropped = (
                tx.inputs.len().saturating_sub(checkpoint.inputs),
                tx.outputs.len().saturating_sub(checkpoint.outputs),
            );
            tx.inputs.truncate(checkpoint.inputs);
            tx.outputs.truncate(checkpoint.outputs);
            debug!(
                handle = %checkpoint.handle,
                dropped_inputs = dropped.0,
                dropped_outputs = dropped.1,
                "draft rolled back"
            );
            Ok(())
        })
    }

    /// Seals the draft and returns its transaction.
    ///
    /// A transaction with neither inputs nor outputs cannot be sealed.
    pub fn seal_draft(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
    ) -> Result<Transaction, BuildError> {
        let mut draft = match self.drafts.get_mut(&handle) {
            Some(draft) if draft.execution == execution => draft,
            _ => return Err(BuildError::DraftNotFound(handle)),
        };
        if draft.is_sealed {
            return Err(BuildError::DraftSealed(handle));
        }
        if draft.tx.is_empty() {
            return Err(BuildError::EmptyTransaction);
        }
        draft.is_sealed = true;
        debug!(
            handle = %handle,
            inputs = draft.tx.inputs.len(),
            outputs = draft.tx.outputs.len(),
            "draft sealed"
        );
        Ok(draft.tx.clone())
    }

    /// Removes the draft, returning it.
    pub fn remove_draft(
        &self,
        execution: ExecutionId,
        handle: DraftHandle,
    ) -> Result<DraftTx, BuildError> {
        let (_, draft) = self
            .drafts
            .remove_if(&handle, |_, draft| draft.execution == execution)
            .ok_or(BuildError::DraftNotFound(handle))?;
        self.open.fetch_sub(1, Ordering::AcqRel);
        debug!(handle = %handle, execution = %execution, "draft removed");
        Ok(draft)
    }

    /// Removes every draft opened by `execution`. Returns how many.
    pub fn cleanup_execution(&self, execution: ExecutionId) -> usize {
        let mut removed = 0;
        self.drafts.retain(|_, draft| {
            let keep = draft.execution != execution;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.open.fetch_sub(removed, Ordering::AcqRel);
        removed
    }

    /// Removes every draft. Returns how many.
    pub fn cleanup_all(&self) -> usize {
        let mut removed = 0;
        self.drafts.retain(|_, _| {
            removed += 1;
            false
        });
        self.open.fetch_sub(removed, Ordering::AcqRel);
        if removed > 0 {
            info!(removed, "all drafts cleaned up");
        }
        removed
    }

    /// A guard that removes the draft when dropped.
    pub fn guard(&self, execution: ExecutionId, handle: DraftHandle) -> DraftGuard<'_> {
        DraftGuard {
            manager: self,
            execution,
            handle,
        }
    }
}

// ---------------------------------------------------------------------------
// DraftGuard
// ---------------------------------------------------------------------------

/// Removes a draft on drop.
#[must_use = "the draft is removed as soon as the guard is dropped"]
pub struct DraftGuard<'a> {
    manager: &'a DraftManager,
    execution: ExecutionId,
    handle: DraftHandle,
}

impl DraftGuard<'_> {
    /// The guarded handle.
    pub fn handle(&self) -> DraftHandle {
        self.handle
    }
}

impl Drop for DraftGuard<'_> {
    fn drop(&mut self) {
        // Already removed is fine.
        let _ = self.manager.remove_draft(self.execution, self.handle);
    }
}
