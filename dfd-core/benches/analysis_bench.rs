//! Benchmarks for column analysis and datasheet compilation.

use std::fmt::Write as _;
use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dfd_core::prelude::*;
use dfd_core::test_fixtures::{mixed_types_table, people_table, write_file};
use tempfile::TempDir;

/// CSV with a numeric, a categorical, a boolean-like and a date column.
fn synthetic_csv(rows: usize) -> String {
    let mut csv = String::from("id,price,region,flag,day\n");
    let regions = ["north", "south", "east", "west", ""];
    for i in 0..rows {
        let price = if i % 17 == 0 {
            String::new()
        } else {
            format!("{:.2}", (i % 1000) as f64 * 1.25)
        };
        let _ = writeln!(
            csv,
            "{i},{price},{},{},2024-{:02}-{:02}",
            regions[i % regions.len()],
            if i % 3 == 0 { "yes" } else { "no" },
            i % 12 + 1,
            i % 28 + 1,
        );
    }
    csv
}

fn bench_in_memory_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_memory_analysis");
    let config = DatasheetConfig::default().with_backend(BackendKind::Arrow);

    group.bench_function("people", |b| {
        b.iter(|| analyse_source(black_box(&config), DataSource::arrow(people_table())))
    });
    group.bench_function("mixed_types", |b| {
        b.iter(|| analyse_source(black_box(&config), DataSource::arrow(mixed_types_table())))
    });

    group.finish();
}

fn bench_csv_by_engine(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("csv_analysis");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for rows in [1_000, 10_000, 100_000] {
        let path = write_file(dir.path(), &format!("synthetic_{rows}.csv"), &synthetic_csv(rows));
        for kind in [BackendKind::Arrow, BackendKind::DataFusion] {
            let config = DatasheetConfig::default().with_backend(kind);
            group.bench_with_input(BenchmarkId::new(kind.to_string(), rows), &path, |b, path| {
                b.iter(|| analyse_source(&config, DataSource::path(black_box(path))).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_sample_size(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "synthetic.csv", &synthetic_csv(20_000));
    let mut group = c.benchmark_group("sample_size");

    for sample_size in [10, 100, 1000, 10_000] {
        let config = DatasheetConfig::default()
            .with_backend(BackendKind::Arrow)
            .with_sample_size(sample_size);
        group.bench_with_input(
            BenchmarkId::new("arrow", sample_size),
            &config,
            |b, config| b.iter(|| analyse_source(config, DataSource::path(&path)).unwrap()),
        );
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let compiler = TemplateCompiler::default();
    let template = compiler.generate().unwrap();
    let config = DatasheetConfig::default().with_backend(BackendKind::Arrow);
    let statistics = analyse_source(&config, DataSource::arrow(mixed_types_table()))
        .unwrap()
        .statistics;
    let metadata = DatasetMetadata::default();
    let compiled = compiler.compile(&template, &statistics, &metadata).unwrap();

    let mut group = c.benchmark_group("template");
    group.bench_function("generate", |b| b.iter(|| compiler.generate().unwrap()));
    group.bench_function("parse", |b| {
        b.iter(|| TemplateDocument::parse(black_box(&compiled.document)).unwrap())
    });
    group.bench_function("compile_blank", |b| {
        b.iter(|| compiler.compile(black_box(&template), &statistics, &metadata).unwrap())
    });
    group.bench_function("recompile", |b| {
        b.iter(|| {
            compiler
                .compile(black_box(&compiled.document), &statistics, &metadata)
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_in_memory_analysis,
    bench_csv_by_engine,
    bench_sample_size,
    bench_compile
);
criterion_main!(benches);
