//! End-to-end tests for draft-to-transaction construction.
//!
//! Each test builds its own host over a fresh in-memory ledger, runs a JSON
//! draft through `build_transaction_from_draft`, and inspects the receipt and
//! the decoded transaction. After every build, success or failure, the draft
//! store must be empty.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use loom_core::codec::receipt::{ReceiptMode, TxReceipt};
use loom_core::error::{BuildError, ErrorKind};
use loom_core::finalize::Blake3HashService;
use loom_core::host::{BuildFailure, ExecutionContext, TxHost};
use loom_core::ledger::lock::LockingCondition;
use loom_core::ledger::transaction::Transaction;
use loom_core::ledger::types::{
    Address, AssetOutput, OutPoint, OutputContent, TokenIdentifier, TxOutput,
};
use loom_core::ledger::utxo::{Utxo, UtxoCategory};
use loom_core::selection::{
    AssetRequest, InMemoryLedger, SelectionError, SelectionResult, UtxoSelector,
};
use loom_core::{BuilderConfig, DraftManager};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const OWNER: [u8; 20] = [0xaa; 20];
const BOB: [u8; 20] = [0xbb; 20];
const CONTRACT: [u8; 20] = [0x11; 20];
const SPONSOR: [u8; 20] = [0x55; 20];

fn setup() -> (TxHost, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let host = TxHost::new(
        Arc::new(DraftManager::new(BuilderConfig::default())),
        ledger.clone(),
        ledger.clone(),
        Arc::new(Blake3HashService),
    );
    (host, ledger)
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new(Address(OWNER), 1_000, 1_700_000_000)
}

fn native_utxo(owner: [u8; 20], tag: u8, amount: &str) -> Utxo {
    let owner = Address(owner);
    Utxo {
        outpoint: OutPoint::new([tag; 32], 0),
        owner,
        category: UtxoCategory::Asset,
        cached_output: Some(TxOutput {
            owner,
            locking_conditions: vec![LockingCondition::single_key(owner)],
            content: OutputContent::Asset(AssetOutput::NativeCoin {
                amount: amount.into(),
            }),
        }),
    }
}

fn asset_out(owner: [u8; 20], amount: &str) -> Value {
    json!({"type": "asset", "owner": hex::encode(owner), "amount": amount})
}

async fn build(
    host: &TxHost,
    ctx: ExecutionContext,
    draft: Value,
) -> Result<TxReceipt, BuildFailure> {
    let bytes = serde_json::to_vec(&draft).unwrap();
    let result = host.build_transaction_from_draft(ctx, &bytes).await;
    assert!(host.drafts().is_empty(), "draft leaked after build");
    result
}

fn decode_tx(receipt: &TxReceipt) -> Transaction {
    let bytes = STANDARD
        .decode(receipt.serialized_tx.as_ref().expect("serialized tx"))
        .unwrap();
    Transaction::from_canonical_bytes(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Example scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn defer_sign_single_asset_output() {
    let (host, _) = setup();
    let receipt = build(
        &host,
        ctx(),
        json!({"sign_mode": "defer_sign", "outputs": [asset_out(OWNER, "1000")]}),
    )
    .await
    .unwrap();

    assert_eq!(receipt.mode, ReceiptMode::Unsigned);
    let hash = receipt.unsigned_tx_hash.clone().unwrap();
    assert_eq!(hex::decode(&hash).unwrap().len(), 32);

    let tx = decode_tx(&receipt);
    assert_eq!(tx.creation_timestamp, 1_700_000_000);
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(
        tx.outputs[0].content,
        OutputContent::Asset(AssetOutput::NativeCoin {
            amount: "1000".into()
        })
    );
    assert_eq!(
        tx.outputs[0].locking_conditions,
        vec![LockingCondition::single_key(Address(OWNER))]
    );
}

#[tokio::test]
async fn paymaster_with_empty_pool_fails() {
    let (host, _) = setup();
    let failure = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "paymaster",
            "outputs": [asset_out(OWNER, "1000")],
            "metadata": {"paymaster_params": {"fee_amount": "100"}}
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.error, BuildError::SponsorPoolEmpty));
    assert_eq!(failure.receipt.mode, ReceiptMode::Error);
    assert_eq!(
        failure.receipt.error.as_deref(),
        Some("no available UTXO in sponsor pool")
    );
}

#[tokio::test]
async fn contract_token_output_locked_to_contract() {
    let (host, _) = setup();
    let receipt = build(
        &host,
        ctx().with_contract(Address(CONTRACT)),
        json!({
            "outputs": [{
                "type": "asset",
                "owner": hex::encode(OWNER),
                "amount": "7",
                "token_id": hex::encode("token")
            }]
        }),
    )
    .await
    .unwrap();

    let tx = decode_tx(&receipt);
    assert_eq!(
        tx.outputs[0].locking_conditions,
        vec![LockingCondition::contract(Address(CONTRACT))]
    );
    match &tx.outputs[0].content {
        OutputContent::Asset(AssetOutput::ContractToken {
            contract_address,
            token,
            ..
        }) => {
            assert_eq!(*contract_address, Address(CONTRACT));
            assert_eq!(*token, TokenIdentifier::FungibleClass(b"token".to_vec()));
        }
        other => panic!("unexpected content {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Sign modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn paymaster_attaches_first_sufficient_sponsor() {
    let (host, ledger) = setup();
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 1, "50"));
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 2, "150"));
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 3, "900"));

    let miner = [0xcc; 20];
    let receipt = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "paymaster",
            "outputs": [asset_out(BOB, "10")],
            "metadata": {"paymaster_params": {
                "fee_amount": "100",
                "miner_addr": hex::encode(miner)
            }}
        }),
    )
    .await
    .unwrap();

    assert_eq!(receipt.mode, ReceiptMode::Paymaster);
    let tx = decode_tx(&receipt);
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.inputs[0].previous_output, OutPoint::new([2; 32], 0));
    assert!(!tx.inputs[0].is_reference_only);

    let fee = tx.outputs.last().unwrap();
    assert_eq!(fee.owner, Address(miner));
    assert_eq!(
        fee.content,
        OutputContent::Asset(AssetOutput::NativeCoin { amount: "100".into() })
    );
    assert_eq!(fee.locking_conditions, vec![LockingCondition::single_key(Address(miner))]);
}

#[tokio::test]
async fn paymaster_without_miner_pays_zero_address() {
    let (host, ledger) = setup();
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 1, "100"));

    let receipt = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "paymaster",
            "outputs": [asset_out(BOB, "10")],
            "metadata": {"paymaster_params": {"fee_amount": "100"}}
        }),
    )
    .await
    .unwrap();
    assert_eq!(decode_tx(&receipt).outputs[1].owner, Address::ZERO);
}

#[tokio::test]
async fn paymaster_with_only_small_sponsors_fails_distinctly() {
    let (host, ledger) = setup();
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 1, "99"));

    let failure = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "paymaster",
            "outputs": [asset_out(BOB, "10")],
            "metadata": {"paymaster_params": {"fee_amount": "100"}}
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(failure.error, BuildError::NoSufficientSponsorUtxo { .. }));
    assert_eq!(failure.error.kind(), ErrorKind::Selection);
    assert!(failure
        .receipt
        .error
        .unwrap()
        .contains("no UTXO with sufficient amount"));
}

#[tokio::test]
async fn delegated_rewrites_every_asset_output() {
    let (host, _) = setup();
    let receipt = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "delegated",
            "outputs": [
                asset_out(OWNER, "1"),
                asset_out(BOB, "2"),
                {"type": "state", "owner": hex::encode(OWNER), "metadata": {"state_id": "0a"}}
            ],
            "metadata": {"delegation_params": {
                "original_owner": hex::encode(OWNER),
                "allowed_delegates": [hex::encode(BOB)],
                "authorized_operations": ["transfer"],
                "expiry_duration_blocks": 100,
                "max_value_per_operation": "1000"
            }}
        }),
    )
    .await
    .unwrap();

    assert_eq!(receipt.mode, ReceiptMode::Delegated);
    let tx = decode_tx(&receipt);
    let first = &tx.outputs[0].locking_conditions;
    assert_eq!(first.len(), 1);
    assert!(matches!(first[0], LockingCondition::Delegation(_)));
    assert_eq!(&tx.outputs[1].locking_conditions, first);
    assert_eq!(
        tx.outputs[2].locking_conditions,
        vec![LockingCondition::single_key(Address(OWNER))]
    );
}

#[tokio::test]
async fn threshold_without_asset_outputs_is_noop() {
    let (host, _) = setup();
    let receipt = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "threshold",
            "outputs": [{
                "type": "resource",
                "owner": hex::encode(OWNER),
                "metadata": {"content_hash": "ee".repeat(32), "category": "wasm"}
            }],
            "metadata": {"threshold_params": {
                "threshold": 1,
                "total_parties": 2,
                "party_verification_keys": ["01", "02"],
                "signature_scheme": "BLS_THRESHOLD",
                "security_level": 128
            }}
        }),
    )
    .await
    .unwrap();

    assert_eq!(receipt.mode, ReceiptMode::Threshold);
    let tx = decode_tx(&receipt);
    assert_eq!(
        tx.outputs[0].locking_conditions,
        vec![LockingCondition::single_key(Address(OWNER))]
    );
}

#[tokio::test]
async fn missing_mode_params_is_policy_error() {
    let (host, _) = setup();
    for mode in ["delegated", "threshold", "paymaster"] {
        let failure = build(
            &host,
            ctx(),
            json!({"sign_mode": mode, "outputs": [asset_out(OWNER, "1")]}),
        )
        .await
        .unwrap_err();
        assert_eq!(failure.error.kind(), ErrorKind::Policy, "mode {}", mode);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_draft_fails_in_every_mode() {
    let (host, _) = setup();
    for mode in ["defer_sign", "delegated", "threshold", "paymaster"] {
        let failure = build(&host, ctx(), json!({"sign_mode": mode}))
            .await
            .unwrap_err();
        assert!(failure.receipt.error.unwrap().contains("empty transaction"));
    }
}

#[tokio::test]
async fn unknown_sign_mode_fails() {
    let (host, _) = setup();
    let failure = build(
        &host,
        ctx(),
        json!({"sign_mode": "multisig", "outputs": [asset_out(OWNER, "1")]}),
    )
    .await
    .unwrap_err();
    assert!(matches!(failure.error, BuildError::UnknownSignMode(_)));
}

#[tokio::test]
async fn output_error_mid_draft_discards_everything() {
    let (host, _) = setup();
    let failure = build(
        &host,
        ctx(),
        json!({
            "outputs": [
                asset_out(OWNER, "1"),
                {
                    "type": "resource",
                    "owner": hex::encode(OWNER),
                    "metadata": {"content_hash": "00", "category": "wasm"}
                }
            ]
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Validation);
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

fn transfer(amount: &str) -> Value {
    json!({"type": "transfer", "params": {
        "from": hex::encode(OWNER),
        "to": hex::encode(BOB),
        "amount": amount
    }})
}

#[tokio::test]
async fn transfer_intent_expands_with_change() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "60"));
    ledger.add_utxo(native_utxo(OWNER, 2, "60"));

    let receipt = build(&host, ctx(), json!({"intents": [transfer("100")]}))
        .await
        .unwrap();
    let tx = decode_tx(&receipt);
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(tx.outputs.len(), 2);
    assert_eq!(tx.outputs[0].owner, Address(BOB));
    assert_eq!(tx.outputs[1].owner, Address(OWNER));
    assert_eq!(
        tx.outputs[1].content,
        OutputContent::Asset(AssetOutput::NativeCoin { amount: "20".into() })
    );
}

#[tokio::test]
async fn intents_precede_explicit_entries() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "5"));

    let receipt = build(
        &host,
        ctx(),
        json!({
            "inputs": [{
                "tx_hash": "09".repeat(32),
                "output_index": 3,
                "is_reference_only": true
            }],
            "outputs": [asset_out(OWNER, "1")],
            "intents": [transfer("5")],
            "metadata": {"nonce": 12, "memo": "rent"}
        }),
    )
    .await
    .unwrap();
    let tx = decode_tx(&receipt);
    assert_eq!(tx.nonce, 12);
    assert_eq!(tx.memo.as_deref(), Some("rent"));
    assert_eq!(tx.inputs[0].previous_output, OutPoint::new([1; 32], 0));
    assert_eq!(tx.inputs[1].previous_output, OutPoint::new([9; 32], 3));
    assert!(tx.inputs[1].is_reference_only);
    assert_eq!(tx.outputs[0].owner, Address(BOB));
    assert_eq!(tx.outputs[1].owner, Address(OWNER));
}

#[tokio::test]
async fn insufficient_transfer_fails_with_selection_error() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "5"));
    let failure = build(&host, ctx(), json!({"intents": [transfer("6")]}))
        .await
        .unwrap_err();
    assert!(matches!(
        failure.error,
        BuildError::Selection(SelectionError::InsufficientFunds { .. })
    ));
}

#[tokio::test]
async fn transfers_from_one_owner_spend_distinct_coins() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "10"));
    ledger.add_utxo(native_utxo(OWNER, 2, "10"));

    let receipt = build(&host, ctx(), json!({"intents": [transfer("5"), transfer("5")]}))
        .await
        .unwrap();
    let tx = decode_tx(&receipt);
    let spent: Vec<OutPoint> = tx.inputs.iter().map(|i| i.previous_output).collect();
    assert_eq!(spent, vec![OutPoint::new([1; 32], 0), OutPoint::new([2; 32], 0)]);
    // Payment and change for each transfer.
    assert_eq!(tx.outputs.len(), 4);
}

#[tokio::test]
async fn second_transfer_cannot_reuse_the_only_coin() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "10"));

    let failure = build(&host, ctx(), json!({"intents": [transfer("5"), transfer("5")]}))
        .await
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Selection);
    assert!(matches!(
        failure.error,
        BuildError::Selection(SelectionError::InsufficientFunds { available: 0, .. })
    ));
}

#[tokio::test]
async fn explicit_input_repeating_a_transfer_coin_is_rejected() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "10"));

    let failure = build(
        &host,
        ctx(),
        json!({
            "inputs": [{"tx_hash": "01".repeat(32), "output_index": 0}],
            "intents": [transfer("5")]
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Validation);
    assert!(matches!(
        failure.error,
        BuildError::DuplicateInput(op) if op == OutPoint::new([1; 32], 0)
    ));
    assert_eq!(failure.receipt.mode, ReceiptMode::Error);
}

#[tokio::test]
async fn paymaster_does_not_pay_with_a_coin_the_draft_spends() {
    let (host, ledger) = setup();
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 7, "500"));

    let failure = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "paymaster",
            "inputs": [{"tx_hash": "07".repeat(32), "output_index": 0}],
            "metadata": {"paymaster_params": {"fee_amount": "100"}}
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        failure.error,
        BuildError::NoSufficientSponsorUtxo { ref fee } if fee == "100"
    ));
}

#[tokio::test]
async fn amounts_keep_their_written_form() {
    let (host, ledger) = setup();
    ledger.add_utxo(native_utxo(OWNER, 1, "200"));
    ledger.add_sponsor_utxo(native_utxo(SPONSOR, 2, "500"));

    let receipt = build(
        &host,
        ctx(),
        json!({
            "sign_mode": "paymaster",
            "outputs": [asset_out(BOB, "0100")],
            "intents": [transfer("0050")],
            "metadata": {"paymaster_params": {"fee_amount": "007"}}
        }),
    )
    .await
    .unwrap();
    let tx = decode_tx(&receipt);
    let amounts: Vec<&str> = tx
        .outputs
        .iter()
        .filter_map(|o| o.as_asset().and_then(AssetOutput::native_amount))
        .collect();
    // Transfer payment and change, explicit output, then the fee.
    assert_eq!(amounts, vec!["0050", "150", "0100", "007"]);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// A selector that never answers.
struct StalledSelector;

#[async_trait]
impl UtxoSelector for StalledSelector {
    async fn select_utxos(
        &self,
        _owner: Address,
        _requests: &[AssetRequest],
    ) -> Result<SelectionResult, SelectionError> {
        futures::future::pending().await
    }
}

#[tokio::test]
async fn cancelled_build_leaves_no_draft() {
    let drafts = Arc::new(DraftManager::default());
    let ledger = Arc::new(InMemoryLedger::new());
    let host = TxHost::new(
        drafts.clone(),
        Arc::new(StalledSelector),
        ledger,
        Arc::new(Blake3HashService),
    );
    let bytes = serde_json::to_vec(&json!({"intents": [transfer("1")]})).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        host.build_transaction_from_draft(ctx(), &bytes),
    )
    .await;
    assert!(outcome.is_err(), "stalled build should time out");
    assert!(drafts.is_empty());
}

#[tokio::test]
async fn concurrent_executions_do_not_interfere() {
    let (host, _) = setup();
    let drafts: Vec<Vec<u8>> = (0..32)
        .map(|i| {
            serde_json::to_vec(&json!({
                "outputs": [asset_out(OWNER, &i.to_string())],
                "metadata": {"nonce": i}
            }))
            .unwrap()
        })
        .collect();

    let builds = drafts
        .iter()
        .map(|bytes| host.build_transaction_from_draft(ctx(), bytes));
    let receipts = futures::future::join_all(builds).await;

    for (i, receipt) in receipts.into_iter().enumerate() {
        let tx = decode_tx(&receipt.unwrap());
        assert_eq!(tx.nonce, i as u64);
    }
    assert!(host.drafts().is_empty());
}

#[tokio::test]
async fn draft_cap_surfaces_as_validation_error() {
    let drafts = Arc::new(DraftManager::new(BuilderConfig {
        max_open_drafts: 1,
        ..BuilderConfig::default()
    }));
    let ledger = Arc::new(InMemoryLedger::new());
    let host = TxHost::new(drafts.clone(), ledger.clone(), ledger, Arc::new(Blake3HashService));

    // Occupy the only slot from another execution.
    let other = ctx();
    let _held = drafts.create_draft(other.execution_id, 0, 0).unwrap();

    let bytes = serde_json::to_vec(&json!({"outputs": [asset_out(OWNER, "1")]})).unwrap();
    let failure = host
        .build_transaction_from_draft(ctx(), &bytes)
        .await
        .unwrap_err();
    assert!(matches!(failure.error, BuildError::TooManyDrafts { limit: 1 }));
    assert_eq!(drafts.len(), 1);
}
