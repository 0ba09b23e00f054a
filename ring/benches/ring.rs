//! Benchmarks for the ring buffer hot path.
//!
//! Run with: cargo bench -p spmc-ring --bench ring

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spmc_ring::RingBuffer;

/// Single-threaded enqueue/dequeue pairs, the upper bound for one record.
fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring/roundtrip");

    for payload_len in [64usize, 256, 1500] {
        let (mut tx, ring) = RingBuffer::with_capacity(1 << 20);
        let payload = vec![0xA5u8; payload_len];
        let mut buf = Vec::with_capacity(payload_len);

        group.throughput(Throughput::Bytes(payload_len as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(payload_len),
            &payload_len,
            |b, _| {
                b.iter(|| {
                    assert!(tx.prepare(payload.len()));
                    tx.write_some(&payload);
                    tx.commit();
                    assert!(ring.try_read(&mut buf));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
