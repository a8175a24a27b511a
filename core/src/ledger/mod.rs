//! Ledger data model: outputs, locks, transactions and UTXOs.

pub mod lock;
pub mod transaction;
pub mod types;
pub mod utxo;

pub use lock::LockingCondition;
pub use transaction::Transaction;
pub use types::{
    Address, AssetOutput, Hash32, OutPoint, OutputContent, TokenIdentifier, TxInput, TxOutput,
};
pub use utxo::{Utxo, UtxoCategory};
