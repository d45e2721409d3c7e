use std::sync::atomic::AtomicBool;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use primes_core::io::MemIo;
use primes_core::shard::PrimeStore;
use primes_core::sieve::{Sieve, is_prime_against};

const BOUNDS: [u64; 3] = [10_000, 100_000, 1_000_000];

fn search_from_empty(bound: u64) -> usize {
    let store = PrimeStore::new("primes", MemIo::new());
    let mut sieve = Sieve::resume(store, 4096).expect("resume");
    sieve
        .run(bound, &AtomicBool::new(false), |_| {})
        .expect("run")
        .total
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search.from_empty");
    group.sample_size(10);

    for bound in BOUNDS {
        group.throughput(Throughput::Elements(bound / 2));
        group.bench_with_input(BenchmarkId::from_parameter(bound), &bound, |b, &bound| {
            b.iter(|| black_box(search_from_empty(bound)));
        });
    }

    group.finish();
}

fn bench_trial_division(c: &mut Criterion) {
    let store = PrimeStore::new("primes", MemIo::new());
    let mut sieve = Sieve::resume(store, usize::MAX).expect("resume");
    sieve
        .run(1 << 17, &AtomicBool::new(false), |_| {})
        .expect("run");
    let known = sieve.into_primes();

    let mut group = c.benchmark_group("trial_division");
    // Largest prime below 2^32 and a semiprime of two 16-bit primes.
    for candidate in [4_294_967_291_u64, 65_521 * 65_519] {
        group.bench_with_input(
            BenchmarkId::from_parameter(candidate),
            &candidate,
            |b, &candidate| b.iter(|| black_box(is_prime_against(candidate, &known))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_search, bench_trial_division);
criterion_main!(benches);
