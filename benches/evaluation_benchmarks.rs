//! Бенчмарки для queryeval

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use queryeval::equivalence::EquivalenceChecker;
use queryeval::metrics;
use queryeval::report::{BottleneckReport, Selection};
use queryeval::scoring::Scorer;
use queryeval::{ColumnDesc, PlanNode, ResultSet, Value};
use std::hint::black_box;

/// Левостороннее дерево соединений с `joins` сканированиями
fn join_chain(joins: usize) -> PlanNode {
    let mut node = PlanNode::new("Seq Scan")
        .with_relation("t0")
        .with_cost(100.0)
        .with_shared_read(50)
        .with_rows_removed(1000.0)
        .with_filter("(flag = true)");
    for i in 1..=joins {
        let scan = PlanNode::new("Index Scan")
            .with_relation(format!("t{}", i))
            .with_cost(20.0 * i as f64)
            .with_shared_read(10 * i as u64);
        let cost = node.total_cost.unwrap_or(0.0) + scan.total_cost.unwrap_or(0.0) + 5.0;
        let reads = node.shared_read_blocks.unwrap_or(0) + scan.shared_read_blocks.unwrap_or(0);
        node = PlanNode::new("Nested Loop")
            .with_cost(cost)
            .with_shared_read(reads)
            .with_child(node)
            .with_child(scan);
    }
    node
}

fn rows(count: usize) -> ResultSet {
    ResultSet::new(
        vec![
            ColumnDesc::new("id", "bigint"),
            ColumnDesc::new("amount", "double precision"),
            ColumnDesc::new("holder", "text"),
        ],
        (0..count)
            .map(|i| {
                vec![
                    Value::Integer(i as i64),
                    Value::Float(i as f64 * 0.1),
                    Value::Text(format!("holder-{}", i)),
                ]
            })
            .collect(),
    )
}

fn metrics_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics_extract");
    for joins in [4usize, 32, 256] {
        let plan = join_chain(joins);
        group.bench_with_input(BenchmarkId::from_parameter(joins), &plan, |b, plan| {
            b.iter(|| metrics::extract(black_box(plan)));
        });
    }
    group.finish();
}

fn bottleneck_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("bottleneck_report");
    for joins in [4usize, 32, 256] {
        let plan = join_chain(joins);
        group.bench_with_input(BenchmarkId::new("pareto", joins), &plan, |b, plan| {
            b.iter(|| BottleneckReport::build(black_box(plan), Selection::default()));
        });
        group.bench_with_input(BenchmarkId::new("top5", joins), &plan, |b, plan| {
            b.iter(|| BottleneckReport::build(black_box(plan), Selection::TopK { k: 5 }));
        });
    }
    group.finish();
}

fn equivalence_benchmark(c: &mut Criterion) {
    let checker = EquivalenceChecker::default();
    let mut group = c.benchmark_group("equivalence_compare");
    for count in [100usize, 10_000] {
        let baseline = rows(count);
        let same = baseline.clone();
        let mut swapped = baseline.clone();
        swapped.rows.swap(0, count - 1);

        group.bench_with_input(BenchmarkId::new("equal", count), &same, |b, candidate| {
            b.iter(|| checker.compare(black_box(&baseline), black_box(candidate)));
        });
        group.bench_with_input(
            BenchmarkId::new("order_only", count),
            &swapped,
            |b, candidate| {
                b.iter(|| checker.compare(black_box(&baseline), black_box(candidate)));
            },
        );
    }
    group.finish();
}

fn scoring_benchmark(c: &mut Criterion) {
    let scorer = Scorer::default();
    let metrics = metrics::extract(&join_chain(32));
    c.bench_function("score_no_time", |b| {
        b.iter(|| scorer.score(black_box(&metrics), None));
    });
    c.bench_function("score_with_time", |b| {
        b.iter(|| scorer.score(black_box(&metrics), Some(black_box(12.5))));
    });
}

criterion_group!(
    benches,
    metrics_benchmark,
    bottleneck_benchmark,
    equivalence_benchmark,
    scoring_benchmark
);
criterion_main!(benches);
