//! UTXO selection and sponsor-pool collaborators.
//!
//! The builder never picks coins itself. Transfers ask a [`UtxoSelector`]
//! for enough UTXOs to cover each asset, and paymaster drafts ask a
//! [`SponsorPool`] for fee candidates. Both are treated as blocking calls
//! with no retry.
//!
//! [`InMemoryLedger`] implements both traits over a fixed UTXO set. Its
//! selection is first-fit in stored order, so results are reproducible.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::codec::encoding::parse_amount;
use crate::config::NATIVE_ASSET_KEY;
use crate::ledger::types::{Address, AssetOutput, OutPoint};
use crate::ledger::utxo::{Utxo, UtxoCategory};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Errors reported by selection collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The owner does not hold enough of an asset.
    #[error("insufficient funds for {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: u64,
        available: u64,
    },

    /// The service could not answer.
    #[error("utxo service unavailable: {0}")]
    Unavailable(String),
}

/// One asset the caller needs to cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    /// `native` or `<contract_hex>:<token_hex>`.
    pub asset_key: String,
    /// Amount in base units.
    pub amount: u64,
    /// Outpoints the caller already spends; they must not be selected again.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<OutPoint>,
}

/// UTXOs chosen by the selector plus the change owed per asset key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionResult {
    /// Selected UTXOs, in selection order.
    pub selected: Vec<Utxo>,
    /// Change per asset key; zero-change keys may be absent.
    pub change: BTreeMap<String, u64>,
}

impl SelectionResult {
    /// Change owed for `asset_key`, zero when absent.
    pub fn change_for(&self, asset_key: &str) -> u64 {
        self.change.get(asset_key).copied().unwrap_or(0)
    }
}

/// Deterministic UTXO selection for an owner.
#[async_trait]
pub trait UtxoSelector: Send + Sync {
    async fn select_utxos(
        &self,
        owner: Address,
        requests: &[AssetRequest],
    ) -> Result<SelectionResult, SelectionError>;
}

/// Source of UTXOs that may pay fees on behalf of users.
#[async_trait]
pub trait SponsorPool: Send + Sync {
    /// Pool UTXOs in a stable order; `only_available` skips reserved ones.
    async fn sponsor_pool_utxos(&self, only_available: bool) -> Result<Vec<Utxo>, SelectionError>;
}

/// The selection key of an asset.
pub fn asset_key(asset: &AssetOutput) -> String {
    match asset {
        AssetOutput::NativeCoin { .. } => NATIVE_ASSET_KEY.to_string(),
        AssetOutput::ContractToken {
            contract_address,
            token,
            ..
        } => format!(
            "{}:{}",
            contract_address.to_hex(),
            hex::encode(token.as_bytes())
        ),
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

/// Serialized form of an [`InMemoryLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSnapshot {
    /// Spendable UTXOs of every owner.
    pub utxos: Vec<Utxo>,
    /// Sponsor pool, in query order.
    pub sponsor_pool: Vec<Utxo>,
    /// Sponsor UTXOs currently reserved by someone else.
    pub reserved: Vec<OutPoint>,
}

/// A fixed UTXO set implementing both [`UtxoSelector`] and [`SponsorPool`].
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerSnapshot>,
}

impl InMemoryLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger holding `snapshot`.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Loads a JSON snapshot.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(Self::from_snapshot(serde_json::from_slice(bytes)?))
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().clone()
    }

    /// Adds a spendable UTXO.
    pub fn add_utxo(&self, utxo: Utxo) {
        self.state.write().utxos.push(utxo);
    }

    /// Appends a UTXO to the sponsor pool.
    pub fn add_sponsor_utxo(&self, utxo: Utxo) {
        self.state.write().sponsor_pool.push(utxo);
    }

    /// Marks a sponsor UTXO as reserved.
    pub fn reserve_sponsor(&self, outpoint: OutPoint) {
        self.state.write().reserved.push(outpoint);
    }
}

#[async_trait]
impl UtxoSelector for InMemoryLedger {
    async fn select_utxos(
        &self,
        owner: Address,
        requests: &[AssetRequest],
    ) -> Result<SelectionResult, SelectionError> {
        let state = self.state.read();
        let mut result = SelectionResult::default();
        // Requests in one call never share a coin either.
        let mut taken: HashSet<OutPoint> = HashSet::new();

        for request in requests {
            let mut gathered: u64 = 0;
            let excluded: HashSet<&OutPoint> = request.exclude.iter().collect();
            let candidates: Vec<&Utxo> = state
                .utxos
                .iter()
                .filter(|u| {
                    u.owner == owner
                        && u.category == UtxoCategory::Asset
                        && !excluded.contains(&u.outpoint)
                        && !taken.contains(&u.outpoint)
                        && held_amount(u, &request.asset_key).is_some()
                })
                .collect();

            for utxo in candidates {
                if gathered >= request.amount {
                    break;
                }
                let amount = held_amount(utxo, &request.asset_key).unwrap_or(0);
                gathered = gathered.saturating_add(amount);
                taken.insert(utxo.outpoint);
                result.selected.push(utxo.clone());
            }

            if gathered < request.amount {
                return Err(SelectionError::InsufficientFunds {
                    asset: request.asset_key.clone(),
                    required: request.amount,
                    available: gathered,
                });
            }
            let change = gathered - request.amount;
            if change > 0 {
                result.change.insert(request.asset_key.clone(), change);
            }
        }

        debug!(
            owner = %owner,
            requests = requests.len(),
            selected = result.selected.len(),
            "utxos selected"
        );
        Ok(result)
    }
}

#[async_trait]
impl SponsorPool for InMemoryLedger {
    async fn sponsor_pool_utxos(&self, only_available: bool) -> Result<Vec<Utxo>, SelectionError> {
        let state = self.state.read();
        if !only_available {
            return Ok(state.sponsor_pool.clone());
        }
        let reserved: HashSet<&OutPoint> = state.reserved.iter().collect();
        Ok(state
            .sponsor_pool
            .iter()
            .filter(|u| !reserved.contains(&u.outpoint))
            .cloned()
            .collect())
    }
}

/// Amount of `asset_key` held by a UTXO's cached output.
fn held_amount(utxo: &Utxo, asset_key_wanted: &str) -> Option<u64> {
    let asset = utxo.cached_output.as_ref()?.as_asset()?;
    if asset_key(asset) != asset_key_wanted {
        return None;
    }
    parse_amount("amount", asset.amount()).ok()
}
