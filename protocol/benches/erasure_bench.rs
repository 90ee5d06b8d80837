// Erasure coding benchmarks for RaSe.
//
// Covers payload encoding, decoding with every data shard present, and
// reconstruction through matrix inversion after losing the maximum number of
// shards the default 4+2 layout tolerates.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rase_protocol::erasure::ErasureCoder;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

fn bench_encode(c: &mut Criterion) {
    let coder = ErasureCoder::new(4, 2).unwrap();
    let mut group = c.benchmark_group("erasure/encode_4_2");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| coder.encode(data).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let coder = ErasureCoder::new(4, 2).unwrap();
    let mut group = c.benchmark_group("erasure/decode_4_2");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let intact = coder.encode(&payload(size)).unwrap();
        let mut degraded = intact.clone();
        degraded.mark_missing(0);
        degraded.mark_missing(3);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("intact", size), &intact, |b, set| {
            b.iter(|| coder.decode(set).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("two_lost", size), &degraded, |b, set| {
            b.iter(|| coder.decode(set).unwrap());
        });
    }

    group.finish();
}

fn bench_layout_check(c: &mut Criterion) {
    c.bench_function("erasure/layout_check_8_4", |b| {
        b.iter(|| ErasureCoder::new(8, 4).unwrap());
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_layout_check);
criterion_main!(benches);
