use std::sync::Arc;

use bloom_gate::{
    BlockStorage, BloomCollection, BloomFilterBuilder, ContentFingerprinter, FileTable, Fingerprinter,
    GatedCollection, MemoryTable, Options, Shape,
};
use bloom_gate::hash::Xxh3Digest;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

fn words(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("word-{i:06}")).collect()
}

fn fingerprinter() -> Arc<dyn Fingerprinter<String>> {
    Arc::new(ContentFingerprinter::default())
}

fn bench_collection(c: &mut Criterion) {
    let shape = Shape::new(10_000, 1000).unwrap();
    let items = words(10_000);

    c.bench_function("collection_add_10k", |b| {
        b.iter_batched(
            || BloomCollection::<String>::content(shape),
            |mut collection| {
                for item in &items {
                    collection.add(item.clone()).unwrap();
                }
                collection
            },
            BatchSize::LargeInput,
        )
    });

    let mut collection = BloomCollection::<String>::content(shape);
    for item in &items {
        collection.add(item.clone()).unwrap();
    }
    let absent = words(20_000).split_off(10_000);

    c.bench_function("collection_gate_hit", |b| {
        b.iter(|| {
            for item in items.iter().take(1000) {
                black_box(collection.might_contain(item));
            }
        })
    });
    c.bench_function("collection_gate_miss", |b| {
        b.iter(|| {
            for item in absent.iter().take(1000) {
                black_box(collection.might_contain(item));
            }
        })
    });

    let query = BloomFilterBuilder::new(shape)
        .add_content(items[0].as_bytes(), &Xxh3Digest)
        .add_content(items[1].as_bytes(), &Xxh3Digest)
        .build();
    c.bench_function("collection_candidates", |b| {
        b.iter(|| black_box(collection.candidates(&query).unwrap()))
    });
}

fn bench_table(c: &mut Criterion) {
    let shape = Shape::new(500, 100).unwrap();
    let items = words(5_000);
    let options = Options::default();

    c.bench_function("memory_table_put_5k", |b| {
        b.iter_batched(
            || MemoryTable::in_memory(shape, fingerprinter(), &options).unwrap(),
            |mut table| {
                for item in &items {
                    table.put(item.clone()).unwrap();
                }
                table
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_file_table(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let shape = Shape::new(100, 100).unwrap();
    let items = words(500);
    // Deferred writes: the bench measures storage, not fsync
    let options = Options::default()
        .with_sync_policy(bloom_gate::SyncPolicy::Manual)
        .with_write_through(false);

    let mut run = 0;
    c.bench_function("file_table_put_500_and_save", |b| {
        b.iter(|| {
            run += 1;
            let path = dir.path().join(format!("bench-{run}.db"));
            let storage = BlockStorage::create(&path, &options).unwrap().into_shared();
            let mut table = FileTable::create(Arc::clone(&storage), shape, fingerprinter(), &options).unwrap();
            for item in &items {
                table.put(item.clone()).unwrap();
            }
            black_box(table.save_directory(&storage, None).unwrap())
        })
    });
}

criterion_group!(benches, bench_collection, bench_table, bench_file_table);
criterion_main!(benches);
