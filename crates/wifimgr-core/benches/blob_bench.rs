//! Criterion benchmarks for the persisted-record codec.
//!
//! Every credential mutation re-serializes and re-tags the whole record
//! before the store considers the mutation committed, so encode latency sits
//! directly on the provisioning path.
//!
//! Run with:
//! ```bash
//! cargo bench --package wifimgr-core --bench blob_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wifimgr_core::blob::{decode_store, encode_store};
use wifimgr_core::domain::credential::CredentialSet;

fn make_set(entries: usize) -> CredentialSet {
    let mut set = CredentialSet::new();
    for i in 0..entries {
        set.upsert(&format!("network-{i}"), "a-sixty-three-byte-ish-passphrase")
            .expect("fixture upsert");
    }
    set
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_store");
    for entries in [0usize, 1, 3] {
        let set = make_set(entries);
        group.bench_with_input(BenchmarkId::new("entries", entries), &set, |b, set| {
            b.iter(|| encode_store(black_box(set)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_store");
    for entries in [0usize, 1, 3] {
        let bytes = encode_store(&make_set(entries));
        group.bench_with_input(BenchmarkId::new("entries", entries), &bytes, |b, bytes| {
            b.iter(|| decode_store(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
