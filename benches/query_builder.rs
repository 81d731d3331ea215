//! Benchmarks for dataset compilation, rendering and prepared statements.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use strata::query::render::{literal, quote_identifier};
use strata::query::{col, lit, placeholder, qualified, render, Dataset, Dialect, StatementKind, Value};

const DIALECTS: [(&str, Dialect); 6] = [
    ("generic", Dialect::GENERIC),
    ("postgres", Dialect::POSTGRES),
    ("mysql", Dialect::MYSQL),
    ("sqlite", Dialect::SQLITE),
    ("mssql", Dialect::MSSQL),
    ("oracle", Dialect::ORACLE),
];

fn report_query() -> Dataset {
    Dataset::table("orders")
        .join("items", qualified("orders", "item_id").eq(qualified("items", "id")))
        .filter(col("orders.status").in_list(vec!["paid", "shipped"]))
        .filter(col("items.price").between(10, 500))
        .group(["items.category"])
        .select([col("items.category")])
        .order(["items.category"])
}

/// Benchmark building datasets without compiling them.
fn bench_dataset_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataset_construction");

    group.bench_function("simple_filter", |b| {
        b.iter(|| black_box(Dataset::table("items").filter([("status", "active")])))
    });

    group.bench_function("chained_filters_5", |b| {
        b.iter(|| {
            let mut ds = Dataset::table("items");
            for i in 0..5 {
                ds = ds.filter(col(format!("c{i}")).gt(i));
            }
            black_box(ds)
        })
    });

    group.bench_function("report_query", |b| b.iter(|| black_box(report_query())));

    group.finish();
}

/// Benchmark compiling SELECT statements per dialect.
fn bench_select_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_compile");
    let paged = report_query().limit_offset(50, 100).unwrap_or_else(|_| report_query());

    for (name, dialect) in DIALECTS {
        let ds = paged.with_dialect(dialect);
        group.bench_with_input(BenchmarkId::from_parameter(name), &ds, |b, ds| {
            b.iter(|| black_box(ds.select_sql()))
        });
    }

    group.finish();
}

/// Benchmark IN lists of growing size.
fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_list");

    for size in [10, 100, 1000] {
        let ds = Dataset::table("items").filter(col("id").in_list((0..size).collect::<Vec<i64>>()));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ds, |b, ds| {
            b.iter(|| black_box(ds.select_sql()))
        });
    }

    group.finish();
}

/// Benchmark literal and identifier rendering.
fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");
    let text = Value::from("O'Brien \\ co");
    let expr = col("name").eq(lit("it's")).and(col("age").gt_eq(21)).or(col("vip").eq(true));

    for (name, dialect) in DIALECTS {
        group.bench_function(BenchmarkId::new("string_literal", name), |b| {
            b.iter(|| black_box(literal(&text, &dialect)))
        });
        group.bench_function(BenchmarkId::new("identifier", name), |b| {
            b.iter(|| black_box(quote_identifier("order", &dialect)))
        });
        group.bench_function(BenchmarkId::new("expression", name), |b| {
            b.iter(|| black_box(render(&expr, &dialect)))
        });
    }

    group.finish();
}

/// Benchmark prepared statements: rendering once against binding repeatedly.
fn bench_prepared(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepared");
    let ds = Dataset::table("items")
        .with_dialect(Dialect::POSTGRES)
        .filter(col("category").eq(placeholder("category")))
        .filter(col("price").lt(placeholder("max")));

    group.bench_function("prepare", |b| {
        b.iter(|| black_box(ds.prepare(StatementKind::Select)))
    });

    if let Ok(stmt) = ds.prepare(StatementKind::Select) {
        group.bench_function("bind", |b| {
            b.iter(|| {
                black_box(stmt.bind([
                    ("category", Value::from("tools")),
                    ("max", Value::from(100)),
                ]))
            })
        });
    }

    group.bench_function("compile_with_literals", |b| {
        b.iter(|| {
            black_box(
                Dataset::table("items")
                    .with_dialect(Dialect::POSTGRES)
                    .filter(col("category").eq("tools"))
                    .filter(col("price").lt(100))
                    .select_sql(),
            )
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_dataset_construction,
    bench_select_compile,
    bench_in_list,
    bench_rendering,
    bench_prepared,
);

criterion_main!(benches);
