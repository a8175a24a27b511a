//! The unsigned transaction a draft accumulates into.

use serde::{Deserialize, Serialize};

use super::types::{TxInput, TxOutput};
use crate::config::TRANSACTION_VERSION;

/// An unsigned Loom transaction.
///
/// Field order is part of the canonical encoding; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub nonce: u64,
    /// Block timestamp at which the draft was opened.
    pub creation_timestamp: u64,
    pub memo: Option<String>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// An empty transaction stamped with the current format version.
    pub fn new(creation_timestamp: u64) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            nonce: 0,
            creation_timestamp,
            memo: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// `true` when there is nothing to finalize.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Number of asset outputs.
    pub fn asset_output_count(&self) -> usize {
        self.outputs.iter().filter(|o| o.is_asset()).count()
    }

    /// Deterministic byte encoding (bincode, fixed-width integers).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Inverse of [`Transaction::canonical_bytes`].
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::lock::LockingCondition;
    use crate::ledger::types::{Address, AssetOutput, OutPoint, OutputContent};

    fn sample() -> Transaction {
        let mut tx = Transaction::new(1_700_000_000);
        tx.nonce = 3;
        tx.inputs.push(TxInput::spend(OutPoint::new([7; 32], 0)));
        tx.outputs.push(TxOutput {
            owner: Address([0xaa; 20]),
            locking_conditions: vec![LockingCondition::single_key(Address([0xaa; 20]))],
            content: OutputContent::Asset(AssetOutput::NativeCoin {
                amount: "1000".into(),
            }),
        });
        tx
    }

    #[test]
    fn canonical_bytes_are_deterministic() {
        let a = sample().canonical_bytes().unwrap();
        let b = sample().canonical_bytes().unwrap();
        assert_eq!(a, b);
        assert_eq!(Transaction::from_canonical_bytes(&a).unwrap(), sample());
    }

    #[test]
    fn nonce_changes_encoding() {
        let mut other = sample();
        other.nonce = 4;
        assert_ne!(
            sample().canonical_bytes().unwrap(),
            other.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn new_transaction_is_empty() {
        let tx = Transaction::new(0);
        assert!(tx.is_empty());
        assert_eq!(tx.version, TRANSACTION_VERSION);
        assert_eq!(sample().asset_output_count(), 1);
    }
}
