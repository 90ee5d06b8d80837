// Threshold sharing benchmarks for RaSe.
//
// Covers prime search for a 256-bit key, a full 3-of-5 split (which includes
// the prime search), and Lagrange reconstruction at several thresholds.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use rase_protocol::config::KEY_BITS;
use rase_protocol::sharing::{generate_key, next_prime, reconstruct, split, SharingConfig};

fn bench_next_prime(c: &mut Criterion) {
    let key = generate_key(KEY_BITS);
    c.bench_function("sharing/next_prime_256", |b| {
        b.iter(|| next_prime(&key));
    });
}

fn bench_split(c: &mut Criterion) {
    let key = generate_key(KEY_BITS);
    let config = SharingConfig::new(3, 5).unwrap();
    c.bench_function("sharing/split_3_of_5", |b| {
        b.iter(|| split(&key, &config).unwrap());
    });
}

fn bench_reconstruct(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharing/reconstruct");
    let key = generate_key(KEY_BITS);

    for (threshold, total) in [(3usize, 5usize), (5, 9), (10, 16)] {
        let config = SharingConfig::new(threshold, total).unwrap();
        let set = split(&key, &config).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{threshold}_of_{total}")),
            &set,
            |b, set| {
                b.iter(|| reconstruct(&set.shares, &set.prime, set.threshold).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_next_prime, bench_split, bench_reconstruct);
criterion_main!(benches);
