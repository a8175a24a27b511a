//! Intent expansion.
//!
//! Intents describe an effect ("move 100 coins from A to B") rather than the
//! concrete inputs and outputs that achieve it. Expansion asks the UTXO
//! selector for coins and returns a [`TransferPlan`]; the caller applies the
//! plan to a draft in one step.

use tracing::debug;

use crate::codec::draft::{Intent, TransferIntent};
use crate::codec::encoding::{checked_amount, decode_address};
use crate::config::NATIVE_ASSET_KEY;
use crate::error::BuildError;
use crate::ledger::types::{Address, OutPoint, TxInput, TxOutput};
use crate::outputs::{asset_output, TokenRef};
use crate::selection::{AssetRequest, UtxoSelector};

/// The only intent tag currently understood.
pub const TRANSFER_INTENT: &str = "transfer";

/// A decoded intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedIntent {
    Transfer(TransferIntent),
}

impl ParsedIntent {
    /// Decodes an intent's parameters according to its tag.
    pub fn parse(intent: &Intent) -> Result<Self, BuildError> {
        match intent.intent_type.as_str() {
            TRANSFER_INTENT => serde_json::from_value(intent.params.clone())
                .map(Self::Transfer)
                .map_err(|source| BuildError::MalformedPayload {
                    context: "transfer params",
                    source,
                }),
            other => Err(BuildError::UnsupportedIntent(other.to_string())),
        }
    }
}

/// Inputs and outputs realizing one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    /// Every selected UTXO, spent.
    pub inputs: Vec<TxInput>,
    /// Primary output first, then change if any.
    pub outputs: Vec<TxOutput>,
}

/// Expands a transfer into a [`TransferPlan`].
///
/// `contract_address` is the executing contract, needed when the transfer
/// names a token. `spent` lists the outpoints the draft already consumes;
/// the selector is told to leave them alone. Change goes back to `from`
/// only when the selector reports a non-zero amount for the transferred
/// asset.
pub async fn plan_transfer(
    selector: &dyn UtxoSelector,
    contract_address: Option<Address>,
    spent: &[OutPoint],
    transfer: &TransferIntent,
) -> Result<TransferPlan, BuildError> {
    let from = decode_address("from", &transfer.from)?;
    let to = decode_address("to", &transfer.to)?;
    let (amount, amount_text) = checked_amount("amount", &transfer.amount)?;
    let token = TokenRef::resolve(transfer.token_id.as_deref(), contract_address)?;

    let asset_key = token
        .as_ref()
        .map_or_else(|| NATIVE_ASSET_KEY.to_string(), TokenRef::asset_key);

    let selection = selector
        .select_utxos(
            from,
            &[AssetRequest {
                asset_key: asset_key.clone(),
                amount,
                exclude: spent.to_vec(),
            }],
        )
        .await?;

    let inputs: Vec<TxInput> = selection
        .selected
        .iter()
        .map(|utxo| TxInput::spend(utxo.outpoint))
        .collect();

    let mut outputs = vec![asset_output(to, amount_text, token.as_ref())];
    let change = selection.change_for(&asset_key);
    if change > 0 {
        outputs.push(asset_output(from, change, token.as_ref()));
    }

    debug!(
        from = %from,
        to = %to,
        amount,
        asset = %asset_key,
        inputs = inputs.len(),
        change,
        "transfer planned"
    );

    Ok(TransferPlan { inputs, outputs })
}
