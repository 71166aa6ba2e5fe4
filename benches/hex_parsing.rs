//! Benchmark for byte-pattern and offset-chain text parsing.
//!
//! Grounded on `WilliamRagstad-memscan/benches/hex_parsing.rs`'s throughput
//! groups, adapted to `memcave::address`'s actual grammar (single-space
//! separated one-or-two-digit tokens, not the teacher's whitespace-stripped
//! compact-hex grammar).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use memcave::address::{parse_hex_bytes, parse_offsets};

fn benchmark_hex_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hex_parsing");

    let patterns = [
        ("short", "4D 5A"),
        ("medium", "48 8B 05 A3 01 00 00"),
        ("with_wildcards", "48 8B 05 00 00 00 00"),
        (
            "long",
            "4D 5A 90 00 03 00 00 00 04 00 00 00 FF FF 00 00 08 00 00 00 00 00 00 00",
        ),
    ];

    for (name, pattern) in patterns.iter() {
        group.throughput(Throughput::Bytes(pattern.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), pattern, |b, &pattern| {
            b.iter(|| parse_hex_bytes(black_box(pattern)));
        });
    }

    group.finish();
}

fn benchmark_offset_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("offset_parsing");

    let chains = [
        ("single", "10"),
        ("pointer_chain", "10 -8 1C 4"),
        ("deep_chain", "10 -8 1C 4 28 -C 38 18"),
    ];

    for (name, chain) in chains.iter() {
        group.throughput(Throughput::Bytes(chain.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), chain, |b, &chain| {
            b.iter(|| parse_offsets(black_box(chain)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_hex_parsing, benchmark_offset_parsing);
criterion_main!(benches);
