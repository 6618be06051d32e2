//! Sealing cost: proof-of-work mining against proof-of-stake forging

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ledger_core::{Chain, ConsensusSeal, StdRandom, Transaction};
use rust_decimal::Decimal;

fn batch() -> Vec<Transaction> {
    vec![
        Transaction::new("11", "Alice", "Bob", Decimal::from(10)),
        Transaction::new("12", "Bob", "Charlie", Decimal::from(5)),
    ]
}

fn bench_pow(c: &mut Criterion) {
    let mut group = c.benchmark_group("proof_of_work_append");
    group.sample_size(20);

    for difficulty in [1u32, 2, 3] {
        group.bench_with_input(
            BenchmarkId::from_parameter(difficulty),
            &difficulty,
            |b, &difficulty| {
                let mut chain = Chain::new(ConsensusSeal::proof_of_work(difficulty)).unwrap();
                b.iter(|| {
                    chain.append(black_box(batch())).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_pos(c: &mut Criterion) {
    let consensus = ConsensusSeal::proof_of_stake([
        ("Validator1", 100),
        ("Validator2", 200),
        ("Validator3", 150),
    ]);
    let mut chain = Chain::with_random_source(consensus, StdRandom::seeded(1)).unwrap();

    c.bench_function("proof_of_stake_append", |b| {
        b.iter(|| {
            chain.append(black_box(batch())).unwrap();
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    let mut chain = Chain::new(ConsensusSeal::proof_of_work(1)).unwrap();
    for _ in 0..100 {
        chain.append(batch()).unwrap();
    }

    c.bench_function("validate_100_blocks", |b| {
        b.iter(|| black_box(chain.validate()));
    });
}

criterion_group!(benches, bench_pow, bench_pos, bench_validate);
criterion_main!(benches);
