use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use supplyhub_audit::{AuditFilter, Pagination};
use supplyhub_auth::{Actor, Role};
use supplyhub_core::{ItemId, UserId};
use supplyhub_engine::{DirectEdit, WorkflowEngine};
use supplyhub_inventory::{InventoryItem, ItemDraft};
use supplyhub_ledger::InMemoryLedger;
use supplyhub_workflows::{
    LineItem, Submission, SubmissionDetail, SupplyTransition, TransitionPayload,
    WorkflowTransition,
};

/// Naive CRUD simulation: direct key-value writes, no gate, no lifecycle, no
/// audit trail. Baseline for measuring what the full pipeline costs.
#[derive(Debug, Clone)]
struct NaiveStockStore {
    inner: Arc<RwLock<HashMap<ItemId, i64>>>,
}

impl NaiveStockStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn create(&self, item_id: ItemId, quantity: i64) {
        let mut map = self.inner.write().unwrap();
        map.insert(item_id, quantity);
    }

    fn adjust(&self, item_id: ItemId, delta: i64) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        if let Some(quantity) = map.get_mut(&item_id) {
            let new_quantity = *quantity + delta;
            if new_quantity < 0 {
                return Err(());
            }
            *quantity = new_quantity;
            Ok(())
        } else {
            Err(())
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn admin() -> Actor {
    Actor::new(UserId::new(), Role::Admin)
}

fn draft(name: &str, quantity: i64) -> ItemDraft {
    ItemDraft {
        name: name.to_string(),
        quantity,
        unit: "piece".to_string(),
        unit_price: 10.0,
        min_stock_level: 5,
        expiry_date: None,
    }
}

fn setup_engine() -> WorkflowEngine<Arc<InMemoryLedger>> {
    WorkflowEngine::new(Arc::new(InMemoryLedger::new()))
}

fn seed_item(engine: &WorkflowEngine<Arc<InMemoryLedger>>, quantity: i64) -> InventoryItem {
    engine
        .apply_direct_edit(&admin(), DirectEdit::Add(draft("Bench item", quantity)), now())
        .unwrap()
        .items
        .remove(0)
}

fn supply_submission(item_id: ItemId, quantity: i64) -> Submission {
    Submission {
        lines: vec![LineItem::new(item_id, quantity)],
        detail: SubmissionDetail::Supply {
            justification: "benchmark".to_string(),
        },
        occurred_at: now(),
    }
}

fn bench_transition_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition_latency");
    group.sample_size(1000);

    // Benchmark: submission (one request insert + one audit record)
    group.bench_function("submit_supply_request", |b| {
        let engine = setup_engine();
        let item = seed_item(&engine, i64::MAX / 2);
        let actor = admin();

        b.iter(|| {
            engine
                .submit(&actor, black_box(supply_submission(item.id, 1)))
                .unwrap();
        });
    });

    // Benchmark: full approve pipeline (gate + machine + floor check + commit)
    group.bench_function("approve_supply_request", |b| {
        let engine = setup_engine();
        let item = seed_item(&engine, i64::MAX / 2);
        let actor = admin();

        b.iter_batched(
            || engine.submit(&actor, supply_submission(item.id, 1)).unwrap(),
            |request| {
                engine
                    .apply_transition(
                        &actor,
                        black_box(request.id),
                        WorkflowTransition::Supply(SupplyTransition::Approve),
                        TransitionPayload::at(now()),
                    )
                    .unwrap();
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_engine_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_vs_naive_crud");
    group.sample_size(1000);

    // Benchmark: full pipeline (submit + approve, audited)
    group.bench_function("engine_submit_and_approve", |b| {
        let engine = setup_engine();
        let item = seed_item(&engine, i64::MAX / 2);
        let actor = admin();

        b.iter(|| {
            let request = engine
                .submit(&actor, supply_submission(item.id, 1))
                .unwrap();
            engine
                .apply_transition(
                    &actor,
                    request.id,
                    WorkflowTransition::Supply(SupplyTransition::Approve),
                    TransitionPayload::at(now()),
                )
                .unwrap();
        });
    });

    // Benchmark: naive direct decrement (no gate, no lifecycle, no trail)
    group.bench_function("naive_direct_decrement", |b| {
        let store = NaiveStockStore::new();
        let item_id = ItemId::new();
        store.create(item_id, i64::MAX / 2);

        b.iter(|| {
            store.adjust(black_box(item_id), -1).unwrap();
        });
    });

    group.finish();
}

fn bench_direct_import_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("direct_import_throughput");

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("bulk_import", batch_size),
            batch_size,
            |b, &size| {
                let actor = admin();

                b.iter_batched(
                    || {
                        let drafts: Vec<ItemDraft> = (0..size)
                            .map(|i| draft(&format!("Imported item {i}"), i as i64))
                            .collect();
                        (setup_engine(), drafts)
                    },
                    |(engine, drafts)| {
                        black_box(
                            engine
                                .apply_direct_edit(&actor, DirectEdit::Import(drafts), now())
                                .unwrap(),
                        );
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_audit_trail_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit_trail_query");

    for trail_size in [100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("filtered_page", trail_size),
            trail_size,
            |b, &size| {
                let engine = setup_engine();
                let actor = admin();
                let item = seed_item(&engine, i64::MAX / 2);

                // Pre-populate the trail with submit+approve pairs.
                for _ in 0..(size / 3) {
                    let request = engine
                        .submit(&actor, supply_submission(item.id, 1))
                        .unwrap();
                    engine
                        .apply_transition(
                            &actor,
                            request.id,
                            WorkflowTransition::Supply(SupplyTransition::Approve),
                            TransitionPayload::at(now()),
                        )
                        .unwrap();
                }

                let filter = AuditFilter {
                    actor_id: Some(actor.user_id),
                    ..Default::default()
                };

                b.iter(|| {
                    black_box(
                        engine
                            .list_audit_trail(black_box(&filter), Pagination::new(Some(50), None))
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_transition_latency,
    bench_engine_vs_naive_crud,
    bench_direct_import_throughput,
    bench_audit_trail_query
);
criterion_main!(benches);
