//! Benchmarks for snapshot parsing and book analytics

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use l2_feed_core::orderbook::{BookSnapshot, Level, TradeSide};
use l2_feed_core::parser::parse_snapshot;

fn create_message(levels: usize) -> String {
    let asks: Vec<[String; 2]> = (0..levels)
        .map(|i| [format!("{}", 50001 + i), "1.5".to_string()])
        .collect();
    let bids: Vec<[String; 2]> = (0..levels)
        .map(|i| [format!("{}", 50000 - i), "1.5".to_string()])
        .collect();

    serde_json::json!({
        "exchange": "okx",
        "symbol": "BTC-USDT-SWAP",
        "timestamp": "2025-05-04T10:39:13Z",
        "asks": asks,
        "bids": bids,
    })
    .to_string()
}

fn create_snapshot(levels: usize) -> BookSnapshot {
    let asks = (0..levels)
        .map(|i| Level::new(50001.0 + i as f64, 1.5))
        .collect();
    let bids = (0..levels)
        .map(|i| Level::new(50000.0 - i as f64, 1.5))
        .collect();

    BookSnapshot::new("okx", "BTC-USDT-SWAP", Utc::now(), asks, bids)
        .expect("benchmark levels are valid")
}

fn benchmark_parse_snapshot(c: &mut Criterion) {
    let message = create_message(100);

    c.bench_function("parse_snapshot_100_levels", |b| {
        b.iter(|| {
            black_box(parse_snapshot(black_box(&message)).ok());
        })
    });
}

fn benchmark_metrics_calculation(c: &mut Criterion) {
    let snapshot = create_snapshot(100);
    let view = snapshot.view();

    c.bench_function("calculate_metrics", |b| {
        b.iter(|| {
            black_box(view.metrics());
        })
    });

    c.bench_function("calculate_imbalance", |b| {
        b.iter(|| {
            black_box(view.imbalance(10));
        })
    });

    c.bench_function("depth_profile", |b| {
        b.iter(|| {
            black_box(view.depth(l2_feed_core::orderbook::Side::Bid));
        })
    });
}

fn benchmark_price_for_quantity(c: &mut Criterion) {
    let snapshot = create_snapshot(100);
    let view = snapshot.view();

    c.bench_function("price_for_quantity_buy_50", |b| {
        b.iter(|| {
            black_box(view.price_for_quantity(black_box(50.0), TradeSide::Buy).ok());
        })
    });
}

criterion_group!(
    benches,
    benchmark_parse_snapshot,
    benchmark_metrics_calculation,
    benchmark_price_for_quantity
);
criterion_main!(benches);
