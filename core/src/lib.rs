// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Loom Core: Transaction Construction
//!
//! Contracts on Loom do not assemble transactions byte by byte. They hand
//! the host a declarative *draft* ("pay Bob 100, store this model, bump this
//! state") and the host turns it into an unsigned EUTXO transaction that
//! consensus can check.
//!
//! ## Architecture
//!
//! Leaf modules first:
//!
//! - **config**: Ledger sizes, defaults and [`BuilderConfig`].
//! - **error**: [`BuildError`] and its seven [`ErrorKind`]s.
//! - **codec**: The draft document in, the receipt out.
//! - **ledger**: Outputs, locks, transactions and UTXOs as closed enums.
//! - **outputs**: Typed outputs from declarative specs.
//! - **selection**: UTXO selector and sponsor pool collaborators.
//! - **intent**: Transfer expansion into inputs, payment and change.
//! - **policy**: Sign-mode rewriting: delegation, threshold, paymaster.
//! - **draft**: The in-memory draft store and its cleanup guard.
//! - **adapter**: The per-execution [`TxAdapter`] surface.
//! - **finalize**: Sealing, hashing and receipt routing.
//! - **host**: [`build_transaction_from_draft`], tying it all together.
//!
//! ## Ground Rules
//!
//! 1. Nothing here signs. Every transaction leaves unsigned.
//! 2. A failed build leaves no draft behind.
//! 3. Draft mutations are all-or-nothing per step.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod draft;
pub mod error;
pub mod finalize;
pub mod host;
pub mod intent;
pub mod ledger;
pub mod outputs;
pub mod policy;
pub mod selection;

pub use adapter::{BuiltTransaction, DraftTxAdapter, ExecutionContext, TxAdapter};
pub use codec::{Draft, DraftDocument, ReceiptMode, SignMode, TxReceipt};
pub use config::BuilderConfig;
pub use draft::{DraftHandle, DraftManager, ExecutionId};
pub use error::{BuildError, ErrorKind};
pub use finalize::{Blake3HashService, HashService};
pub use host::{build_transaction_from_draft, BuildFailure, TxHost};
pub use selection::{InMemoryLedger, SponsorPool, UtxoSelector};
