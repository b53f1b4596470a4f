use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rephase::data::{PhasedPair, SequenceRecord};
use rephase::model::{IupacEngine, PhaseParameters};
use rephase::pipelines::reconcile::{assemble, reconcile, PhasedIndex};
use rephase::utils::telemetry::TelemetryBlackboard;
use std::hint::black_box;

const SEQ_LEN: usize = 600;

fn synthetic_records(n: usize) -> Vec<SequenceRecord> {
    let alphabet = ['A', 'C', 'G', 'T', 'R', 'Y'];
    (0..n)
        .map(|i| {
            let sequence: String = (0..SEQ_LEN).map(|j| alphabet[(i + j * 7) % alphabet.len()]).collect();
            SequenceRecord::new(format!("sample{}|group{}", i, i % 10), sequence)
                .with_field("species", format!("sp{}", i % 10))
                .with_field("site", "north")
        })
        .collect()
}

/// Benchmark assembly of output records from a materialized index
fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_assemble");

    for n_records in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n_records as u64));

        group.bench_with_input(
            BenchmarkId::new("records", n_records),
            &n_records,
            |b, &n_records| {
                let records = synthetic_records(n_records);
                let pairs = records.iter().rev().map(|r| {
                    let id = r.identifier.split('|').next().unwrap_or_default();
                    Ok(PhasedPair::new(id, r.sequence.clone(), r.sequence.clone()))
                });
                let index = PhasedIndex::collect(pairs).unwrap();

                b.iter(|| {
                    let out = assemble(black_box(&records), black_box(&index), '|').unwrap();
                    black_box(out)
                })
            },
        );
    }

    group.finish();
}

/// Benchmark the full engine round trip with the IUPAC engine
fn bench_reconcile_iupac(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_iupac");
    let engine = IupacEngine::new();
    let params = PhaseParameters::default();

    for n_records in [100, 1_000] {
        group.throughput(Throughput::Elements(n_records as u64));

        group.bench_with_input(
            BenchmarkId::new("records", n_records),
            &n_records,
            |b, &n_records| {
                let records = synthetic_records(n_records);

                b.iter(|| {
                    let telemetry = TelemetryBlackboard::new();
                    let out = reconcile(black_box(&records), &engine, &params, &telemetry, '|')
                        .unwrap();
                    black_box(out)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_assemble, bench_reconcile_iupac);
criterion_main!(benches);
