//! UTXOs as reported by the selection and sponsor-pool services.

use serde::{Deserialize, Serialize};

use super::types::{Address, OutPoint, TxOutput};
use crate::codec::encoding::parse_amount;

/// Broad category of an unspent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxoCategory {
    Asset,
    Resource,
    State,
}

/// An unspent output known to the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub owner: Address,
    pub category: UtxoCategory,
    /// The output itself, when the service has it cached.
    #[serde(default)]
    pub cached_output: Option<TxOutput>,
}

impl Utxo {
    /// Native-coin amount of the cached output, if any.
    ///
    /// `None` for non-asset UTXOs, contract tokens, missing cache entries and
    /// amounts that do not parse.
    pub fn native_amount(&self) -> Option<u64> {
        if self.category != UtxoCategory::Asset {
            return None;
        }
        let amount = self.cached_output.as_ref()?.as_asset()?.native_amount()?;
        parse_amount("amount", amount).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::lock::LockingCondition;
    use crate::ledger::types::{AssetOutput, OutputContent};

    fn native(amount: &str, category: UtxoCategory) -> Utxo {
        let owner = Address([1; 20]);
        Utxo {
            outpoint: OutPoint::new([2; 32], 0),
            owner,
            category,
            cached_output: Some(TxOutput {
                owner,
                locking_conditions: vec![LockingCondition::single_key(owner)],
                content: OutputContent::Asset(AssetOutput::NativeCoin {
                    amount: amount.into(),
                }),
            }),
        }
    }

    #[test]
    fn native_amount_requires_asset_category() {
        assert_eq!(native("42", UtxoCategory::Asset).native_amount(), Some(42));
        assert_eq!(native("42", UtxoCategory::State).native_amount(), None);
    }

    #[test]
    fn unparseable_or_missing_amounts_are_none() {
        assert_eq!(native("lots", UtxoCategory::Asset).native_amount(), None);
        assert_eq!(native("+5", UtxoCategory::Asset).native_amount(), None);
        assert_eq!(native(" 5", UtxoCategory::Asset).native_amount(), None);
        let mut bare = native("1", UtxoCategory::Asset);
        bare.cached_output = None;
        assert_eq!(bare.native_amount(), None);
    }
}
