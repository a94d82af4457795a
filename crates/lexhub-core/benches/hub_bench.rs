//! # Hub Benchmarks
//!
//! Performance benchmarks for the read paths of the data hub.
//!
//! Run with: `cargo bench -p lexhub-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lexhub_core::{
    DataHub, DataMutation, DataQuery, EntityRegistry, FieldValue, Fields, HubConfig, MemoryStore,
};
use std::hint::black_box;
use std::sync::Arc;

/// Hub with `size` clients, each owning two cases.
fn seeded_hub(size: usize) -> DataHub {
    let hub = DataHub::new(
        HubConfig::default(),
        EntityRegistry::legal_defaults(),
        Arc::new(MemoryStore::new()),
    );
    for i in 0..size {
        let client_id = format!("c{:05}", i);
        let mut client = Fields::new();
        let status = if i % 2 == 0 { "ACTIVE" } else { "INACTIVE" };
        client.insert("status".into(), FieldValue::text(status));
        hub.mutate(&DataMutation::create("Client", client).with_id(client_id.as_str()))
            .expect("client");
        for _ in 0..2 {
            let mut case = Fields::new();
            case.insert("clientId".into(), FieldValue::text(client_id.as_str()));
            hub.mutate(&DataMutation::create("Case", case))
                .expect("case");
        }
    }
    hub
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_uncached_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncached_query");

    for size in [100, 1000].iter() {
        let hub = seeded_hub(*size);
        let query = DataQuery::new("Client")
            .eq("status", "ACTIVE")
            .limit(25)
            .cached(false);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(hub.query(&query).expect("query")));
        });
    }

    group.finish();
}

fn bench_cached_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_query");

    for size in [100, 1000].iter() {
        let hub = seeded_hub(*size);
        let query = DataQuery::new("Client").eq("status", "ACTIVE").limit(25);
        hub.query(&query).expect("warm");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(hub.query(&query).expect("query")));
        });
    }

    group.finish();
}

fn bench_joined_query(c: &mut Criterion) {
    let hub = seeded_hub(500);
    let query = DataQuery::new("Client")
        .relation("cases")
        .limit(25)
        .cached(false);
    c.bench_function("joined_query_500", |b| {
        b.iter(|| black_box(hub.query(&query).expect("query")));
    });
}

fn bench_cache_key(c: &mut Criterion) {
    let hub = seeded_hub(1);
    let touched = std::collections::BTreeSet::from(["Client".to_string(), "Case".to_string()]);
    let query = DataQuery::new("Client")
        .eq("status", "ACTIVE")
        .relation("cases")
        .limit(25);
    c.bench_function("cache_key_derivation", |b| {
        b.iter(|| black_box(hub.keys().query(&query, &touched)));
    });
}

criterion_group!(
    benches,
    bench_uncached_query,
    bench_cached_query,
    bench_joined_query,
    bench_cache_key
);
criterion_main!(benches);
