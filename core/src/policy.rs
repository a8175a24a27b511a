//! Sign-mode policies.
//!
//! Runs once per build, after every intent, input and output has been
//! applied and before the draft is sealed:
//!
//! | mode         | effect                                                        |
//! |--------------|---------------------------------------------------------------|
//! | `defer_sign` | none                                                          |
//! | `delegated`  | every asset output is locked by one [`DelegationLock`]        |
//! | `threshold`  | every asset output is locked by one [`ThresholdLock`]         |
//! | `paymaster`  | a sponsor UTXO is spent and a native fee output is added      |

use std::collections::HashSet;

use tracing::{debug, info};

use crate::adapter::TxAdapter;
use crate::codec::draft::{DelegationParams, Draft, PaymasterParams, SignMode, ThresholdParams};
use crate::codec::encoding::{checked_amount, decode_address, decode_hex_field, parse_amount};
use crate::config::ZERO_ADDRESS;
use crate::draft::DraftHandle;
use crate::error::BuildError;
use crate::ledger::lock::{DelegationLock, LockingCondition, ThresholdLock};
use crate::ledger::types::{Address, OutPoint, TxInput};
use crate::ledger::utxo::Utxo;
use crate::outputs::asset_output;
use crate::selection::SponsorPool;

/// Applies the draft's sign mode to the open draft `handle`.
pub async fn apply_sign_mode<A>(
    adapter: &A,
    sponsor_pool: &dyn SponsorPool,
    handle: DraftHandle,
    draft: &Draft,
) -> Result<(), BuildError>
where
    A: TxAdapter + ?Sized,
{
    let mode = draft.sign_mode;
    let metadata = &draft.metadata;
    match mode {
        SignMode::DeferSign => Ok(()),
        SignMode::Delegated => {
            let params = required(mode, "delegation_params", &metadata.delegation_params)?;
            let rewritten = adapter.rewrite_asset_locks(handle, delegation_lock(params)?)?;
            debug!(handle = %handle, rewritten, "delegation lock applied");
            Ok(())
        }
        SignMode::Threshold => {
            let params = required(mode, "threshold_params", &metadata.threshold_params)?;
            let rewritten = adapter.rewrite_asset_locks(handle, threshold_lock(params)?)?;
            debug!(handle = %handle, rewritten, "threshold lock applied");
            Ok(())
        }
        SignMode::Paymaster => {
            let params = required(mode, "paymaster_params", &metadata.paymaster_params)?;
            apply_paymaster(adapter, sponsor_pool, handle, params).await
        }
    }
}

fn required<'a, T>(
    mode: SignMode,
    param: &'static str,
    value: &'a Option<T>,
) -> Result<&'a T, BuildError> {
    value
        .as_ref()
        .ok_or(BuildError::MissingPolicyParams { mode, param })
}

// ---------------------------------------------------------------------------
// Lock construction
// ---------------------------------------------------------------------------

/// Builds the delegation lock described by `params`.
pub fn delegation_lock(params: &DelegationParams) -> Result<LockingCondition, BuildError> {
    let original_owner = decode_address("original_owner", &params.original_owner)?;
    let allowed_delegates = params
        .allowed_delegates
        .iter()
        .map(|d| decode_address("allowed_delegates", d))
        .collect::<Result<Vec<_>, _>>()?;
    let max_value_per_operation =
        parse_amount("max_value_per_operation", &params.max_value_per_operation)?;

    Ok(LockingCondition::Delegation(DelegationLock {
        original_owner,
        allowed_delegates,
        authorized_operations: params.authorized_operations.clone(),
        expiry_duration_blocks: (params.expiry_duration_blocks > 0)
            .then_some(params.expiry_duration_blocks),
        max_value_per_operation,
        delegation_policy: opaque_blob(&params.delegation_policy),
    }))
}

/// Builds the threshold lock described by `params`.
pub fn threshold_lock(params: &ThresholdParams) -> Result<LockingCondition, BuildError> {
    if params.threshold == 0 || params.threshold > params.total_parties {
        return Err(BuildError::invalid(
            "threshold",
            format!(
                "{} is outside 1..={}",
                params.threshold, params.total_parties
            ),
        ));
    }
    if params.party_verification_keys.len() != params.total_parties as usize {
        return Err(BuildError::invalid(
            "party_verification_keys",
            format!(
                "expected {} keys, got {}",
                params.total_parties,
                params.party_verification_keys.len()
            ),
        ));
    }

    let party_verification_keys = params
        .party_verification_keys
        .iter()
        .map(|key| {
            let bytes = decode_hex_field("party_verification_keys", key)?;
            if bytes.is_empty() {
                return Err(BuildError::invalid("party_verification_keys", "empty key"));
            }
            Ok(bytes)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LockingCondition::Threshold(ThresholdLock {
        threshold: params.threshold,
        total_parties: params.total_parties,
        party_verification_keys,
        signature_scheme: params.signature_scheme.clone(),
        security_level: params.security_level,
        threshold_policy: opaque_blob(&params.threshold_policy),
    }))
}

/// Policy blobs are carried as the raw bytes of the supplied string.
fn opaque_blob(value: &Option<String>) -> Option<Vec<u8>> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.as_bytes().to_vec())
}

// ---------------------------------------------------------------------------
// Paymaster
// ---------------------------------------------------------------------------

/// Picks the first sponsor UTXO whose native-coin amount covers `fee`.
///
/// Candidates are scanned in the order given. Non-asset UTXOs, contract
/// tokens, missing cache entries and unparseable amounts are skipped.
pub fn select_sponsor_utxo<'a>(
    candidates: &'a [Utxo],
    fee: u64,
    fee_display: &str,
) -> Result<&'a Utxo, BuildError> {
    if candidates.is_empty() {
        return Err(BuildError::SponsorPoolEmpty);
    }
    candidates
        .iter()
        .find(|utxo| utxo.native_amount().is_some_and(|amount| amount >= fee))
        .ok_or_else(|| BuildError::NoSufficientSponsorUtxo {
            fee: fee_display.to_string(),
        })
}

/// Fee recipient: the miner address when it is 20 bytes, else the zero address.
fn fee_recipient(miner_addr: Option<&str>) -> Result<Address, BuildError> {
    let Some(miner) = miner_addr.filter(|m| !m.is_empty()) else {
        return Ok(Address(ZERO_ADDRESS));
    };
    let bytes = decode_hex_field("miner_addr", miner)?;
    Ok(Address::try_from(bytes.as_slice()).unwrap_or(Address(ZERO_ADDRESS)))
}

async fn apply_paymaster<A>(
    adapter: &A,
    sponsor_pool: &dyn SponsorPool,
    handle: DraftHandle,
    params: &PaymasterParams,
) -> Result<(), BuildError>
where
    A: TxAdapter + ?Sized,
{
    let candidates = sponsor_pool.sponsor_pool_utxos(true).await?;
    if candidates.is_empty() {
        return Err(BuildError::SponsorPoolEmpty);
    }
    let (fee, fee_text) = checked_amount("fee_amount", &params.fee_amount)?;

    // Coins the draft already spends cannot pay the fee as well.
    let spent: HashSet<OutPoint> = adapter
        .get_draft(handle)?
        .tx
        .inputs
        .iter()
        .map(|input| input.previous_output)
        .collect();
    let unspent: Vec<Utxo> = candidates
        .into_iter()
        .filter(|utxo| !spent.contains(&utxo.outpoint))
        .collect();
    if unspent.is_empty() {
        return Err(BuildError::NoSufficientSponsorUtxo {
            fee: fee_text.to_string(),
        });
    }
    let sponsor = select_sponsor_utxo(&unspent, fee, fee_text)?;
    let miner = fee_recipient(params.miner_addr.as_deref())?;

    let checkpoint = adapter.checkpoint(handle)?;
    adapter.add_custom_input(handle, TxInput::spend(sponsor.outpoint))?;
    if let Err(e) = adapter.add_custom_output(handle, asset_output(miner, fee_text, None)) {
        adapter.rollback_to(&checkpoint)?;
        return Err(e);
    }

    info!(
        handle = %handle,
        sponsor = %sponsor.outpoint,
        fee,
        miner = %miner,
        "paymaster fee attached"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapter::{DraftTxAdapter, ExecutionContext};
    use crate::draft::DraftManager;
    use crate::ledger::types::{AssetOutput, OutputContent, TokenIdentifier, TxOutput};
    use crate::ledger::utxo::UtxoCategory;
    use crate::selection::InMemoryLedger;

    fn sponsor(tag: u8, content: AssetOutput, category: UtxoCategory) -> Utxo {
        let owner = Address([0x55; 20]);
        Utxo {
            outpoint: OutPoint::new([tag; 32], 0),
            owner,
            category,
            cached_output: Some(TxOutput {
                owner,
                locking_conditions: vec![LockingCondition::single_key(owner)],
                content: OutputContent::Asset(content),
            }),
        }
    }

    fn coin(tag: u8, amount: &str) -> Utxo {
        sponsor(
            tag,
            AssetOutput::NativeCoin {
                amount: amount.into(),
            },
            UtxoCategory::Asset,
        )
    }

    #[test]
    fn first_fit_skips_ineligible_candidates() {
        let token = sponsor(
            1,
            AssetOutput::ContractToken {
                contract_address: Address([1; 20]),
                token: TokenIdentifier::FungibleClass(vec![1]),
                amount: "1000".into(),
            },
            UtxoCategory::Asset,
        );
        let wrong_category = sponsor(
            2,
            AssetOutput::NativeCoin {
                amount: "1000".into(),
            },
            UtxoCategory::Resource,
        );
        let mut uncached = coin(3, "1000");
        uncached.cached_output = None;
        let candidates = vec![
            token,
            wrong_category,
            uncached,
            coin(4, "junk"),
            coin(5, "99"),
            coin(6, "100"),
            coin(7, "500"),
        ];

        let picked = select_sponsor_utxo(&candidates, 100, "100").unwrap();
        assert_eq!(picked.outpoint.tx_id, [6; 32]);
        // Deterministic across calls.
        let again = select_sponsor_utxo(&candidates, 100, "100").unwrap();
        assert_eq!(again.outpoint, picked.outpoint);
    }

    #[test]
    fn empty_and_insufficient_pools_differ() {
        assert!(matches!(
            select_sponsor_utxo(&[], 1, "1"),
            Err(BuildError::SponsorPoolEmpty)
        ));
        let err = select_sponsor_utxo(&[coin(1, "5")], 10, "10").unwrap_err();
        assert!(matches!(err, BuildError::NoSufficientSponsorUtxo { ref fee } if fee == "10"));
    }

    #[test]
    fn fee_recipient_falls_back_to_zero() {
        assert_eq!(fee_recipient(None).unwrap(), Address(ZERO_ADDRESS));
        assert_eq!(fee_recipient(Some("abcd")).unwrap(), Address(ZERO_ADDRESS));
        assert_eq!(
            fee_recipient(Some(&"cc".repeat(20))).unwrap(),
            Address([0xcc; 20])
        );
        assert!(fee_recipient(Some("xyz")).is_err());
    }

    /// A draft whose only input is sponsor coin 1.
    fn draft_spending_sponsor(ledger: &Arc<InMemoryLedger>) -> (DraftTxAdapter, DraftHandle) {
        let adapter = DraftTxAdapter::new(
            Arc::new(DraftManager::default()),
            ledger.clone(),
            ExecutionContext::new(Address([1; 20]), 1, 1),
        );
        let handle = adapter.begin_transaction().unwrap();
        adapter
            .add_custom_input(handle, TxInput::spend(OutPoint::new([1; 32], 0)))
            .unwrap();
        (adapter, handle)
    }

    #[tokio::test]
    async fn paymaster_skips_sponsor_already_spent() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.add_sponsor_utxo(coin(1, "500"));
        ledger.add_sponsor_utxo(coin(2, "500"));
        let (adapter, handle) = draft_spending_sponsor(&ledger);

        let params = PaymasterParams {
            fee_amount: "0100".into(),
            token_id: None,
            miner_addr: None,
        };
        apply_paymaster(&adapter, ledger.as_ref(), handle, &params)
            .await
            .unwrap();

        let tx = adapter.get_draft(handle).unwrap().tx;
        assert_eq!(tx.inputs[1].previous_output, OutPoint::new([2; 32], 0));
        assert_eq!(
            tx.outputs[0].content,
            OutputContent::Asset(AssetOutput::NativeCoin {
                amount: "0100".into()
            })
        );
    }

    #[tokio::test]
    async fn paymaster_with_only_spent_sponsors_is_insufficient() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.add_sponsor_utxo(coin(1, "500"));
        let (adapter, handle) = draft_spending_sponsor(&ledger);

        let params = PaymasterParams {
            fee_amount: "10".into(),
            token_id: None,
            miner_addr: None,
        };
        let err = apply_paymaster(&adapter, ledger.as_ref(), handle, &params)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::NoSufficientSponsorUtxo { ref fee } if fee == "10"));
        assert_eq!(adapter.get_draft(handle).unwrap().tx.inputs.len(), 1);
    }

    fn delegation_params() -> DelegationParams {
        DelegationParams {
            original_owner: "aa".repeat(20),
            allowed_delegates: vec!["bb".repeat(20), format!("0x{}", "cc".repeat(20))],
            authorized_operations: vec!["transfer".into()],
            expiry_duration_blocks: 0,
            max_value_per_operation: "5000".into(),
            delegation_policy: Some("daily-cap".into()),
        }
    }

    #[test]
    fn delegation_lock_from_params() {
        match delegation_lock(&delegation_params()).unwrap() {
            LockingCondition::Delegation(lock) => {
                assert_eq!(lock.original_owner, Address([0xaa; 20]));
                assert_eq!(lock.allowed_delegates.len(), 2);
                assert_eq!(lock.expiry_duration_blocks, None);
                assert_eq!(lock.max_value_per_operation, 5000);
                assert_eq!(lock.delegation_policy.as_deref(), Some(&b"daily-cap"[..]));
            }
            other => panic!("unexpected lock {:?}", other),
        }
    }

    #[test]
    fn delegation_params_validated() {
        let mut bad_delegate = delegation_params();
        bad_delegate.allowed_delegates.push("bb".into());
        assert!(delegation_lock(&bad_delegate).is_err());

        let mut bad_value = delegation_params();
        bad_value.max_value_per_operation = "lots".into();
        assert!(delegation_lock(&bad_value).is_err());

        let mut expiring = delegation_params();
        expiring.expiry_duration_blocks = 100;
        match delegation_lock(&expiring).unwrap() {
            LockingCondition::Delegation(lock) => {
                assert_eq!(lock.expiry_duration_blocks, Some(100))
            }
            other => panic!("unexpected lock {:?}", other),
        }
    }

    fn threshold_params() -> ThresholdParams {
        ThresholdParams {
            threshold: 2,
            total_parties: 3,
            party_verification_keys: vec!["01".into(), "02".into(), "03".into()],
            signature_scheme: "BLS_THRESHOLD".into(),
            security_level: 128,
            threshold_policy: None,
        }
    }

    #[test]
    fn threshold_lock_from_params() {
        match threshold_lock(&threshold_params()).unwrap() {
            LockingCondition::Threshold(lock) => {
                assert_eq!(lock.party_verification_keys, vec![vec![1], vec![2], vec![3]]);
                assert_eq!(lock.signature_scheme, "BLS_THRESHOLD");
                assert!(lock.threshold_policy.is_none());
            }
            other => panic!("unexpected lock {:?}", other),
        }
    }

    #[test]
    fn threshold_bounds_enforced() {
        let mut zero = threshold_params();
        zero.threshold = 0;
        assert!(threshold_lock(&zero).is_err());

        let mut too_high = threshold_params();
        too_high.threshold = 4;
        assert!(threshold_lock(&too_high).is_err());

        let mut key_count = threshold_params();
        key_count.party_verification_keys.pop();
        assert!(threshold_lock(&key_count).is_err());

        let mut empty_key = threshold_params();
        empty_key.party_verification_keys[1] = "0x".into();
        assert!(threshold_lock(&empty_key).is_err());
    }
}
