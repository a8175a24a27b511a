// Draft construction benchmarks for Loom.
//
// Covers single-output building, draft decoding, and full builds through
// the host for a plain payment, a transfer with change, and a paymaster
// draft against a populated sponsor pool.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use loom_core::codec::draft::{decode_draft, OutputSpec};
use loom_core::ledger::lock::LockingCondition;
use loom_core::ledger::types::{Address, AssetOutput, OutPoint, OutputContent, TxOutput};
use loom_core::ledger::utxo::{Utxo, UtxoCategory};
use loom_core::outputs::build_output;
use loom_core::{
    Blake3HashService, BuilderConfig, DraftManager, ExecutionContext, InMemoryLedger, TxHost,
};

const OWNER: [u8; 20] = [0xaa; 20];

fn coin(owner: [u8; 20], tag: u32, amount: u64) -> Utxo {
    let owner = Address(owner);
    let mut tx_id = [0u8; 32];
    tx_id[..4].copy_from_slice(&tag.to_be_bytes());
    Utxo {
        outpoint: OutPoint::new(tx_id, 0),
        owner,
        category: UtxoCategory::Asset,
        cached_output: Some(TxOutput {
            owner,
            locking_conditions: vec![LockingCondition::single_key(owner)],
            content: OutputContent::Asset(AssetOutput::NativeCoin {
                amount: amount.to_string(),
            }),
        }),
    }
}

fn host(ledger: InMemoryLedger) -> TxHost {
    let ledger = Arc::new(ledger);
    TxHost::new(
        Arc::new(DraftManager::default()),
        ledger.clone(),
        ledger,
        Arc::new(Blake3HashService),
    )
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new(Address(OWNER), 1, 1_700_000_000)
}

fn payment_draft(outputs: usize) -> Vec<u8> {
    let outputs: Vec<_> = (0..outputs)
        .map(|i| {
            json!({"type": "asset", "owner": hex::encode(OWNER), "amount": (i + 1).to_string()})
        })
        .collect();
    serde_json::to_vec(&json!({"outputs": outputs})).unwrap()
}

fn bench_build_output(c: &mut Criterion) {
    let config = BuilderConfig::default();
    let state = OutputSpec {
        output_type: "state".into(),
        owner: hex::encode(OWNER),
        amount: String::new(),
        token_id: None,
        metadata: Some(json!({
            "state_id": "01",
            "execution_result_hash": "ab".repeat(32),
            "public_inputs": "cd".repeat(128)
        })),
    };

    c.bench_function("outputs/build_state", |b| {
        b.iter(|| build_output(&state, None, &config).unwrap());
    });
}

fn bench_decode_draft(c: &mut Criterion) {
    let bytes = payment_draft(16);
    c.bench_function("codec/decode_draft_16_outputs", |b| {
        b.iter(|| decode_draft(&bytes).unwrap());
    });
}

fn bench_full_build(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let host = host(InMemoryLedger::new());

    let mut group = c.benchmark_group("host/build_payment");
    for size in [1usize, 16, 128] {
        let bytes = payment_draft(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| rt.block_on(host.build_transaction_from_draft(ctx(), bytes)).unwrap());
        });
    }
    group.finish();
}

fn bench_transfer_and_paymaster(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();
    for i in 0..64 {
        ledger.add_utxo(coin(OWNER, i, 10));
        ledger.add_sponsor_utxo(coin([0x55; 20], 1_000 + i, u64::from(i) * 10));
    }
    let host = host(ledger);

    let transfer = serde_json::to_vec(&json!({
        "intents": [{"type": "transfer", "params": {
            "from": hex::encode(OWNER),
            "to": hex::encode([0xbb; 20]),
            "amount": "255"
        }}]
    }))
    .unwrap();
    c.bench_function("host/build_transfer_26_inputs", |b| {
        b.iter(|| rt.block_on(host.build_transaction_from_draft(ctx(), &transfer)).unwrap());
    });

    let paymaster = serde_json::to_vec(&json!({
        "sign_mode": "paymaster",
        "outputs": [{"type": "asset", "owner": hex::encode(OWNER), "amount": "1"}],
        "metadata": {"paymaster_params": {"fee_amount": "500"}}
    }))
    .unwrap();
    c.bench_function("host/build_paymaster_64_sponsors", |b| {
        b.iter(|| rt.block_on(host.build_transaction_from_draft(ctx(), &paymaster)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_build_output,
    bench_decode_draft,
    bench_full_build,
    bench_transfer_and_paymaster
);
criterion_main!(benches);
