// Partitioned table tests: placement, growth, fan-out queries, persistence.

use std::sync::Arc;

use bloom_gate::{
    BlockStorage, ContentFingerprinter, Error, FileTable, Fingerprint, Fingerprinter, MemoryTable, Options,
    PlacementPolicy, Shape,
};

type Pair = (u64, u64);

/// Items are their own seeds, so activated bits are easy to predict.
fn seeds() -> Arc<dyn Fingerprinter<Pair>> {
    Arc::new(|p: &Pair| Fingerprint::new(p.0, p.1))
}

/// Two items per bucket, 100 bits, 3 hashes.
fn shape() -> Shape {
    Shape::from_parts(2, 10, 100, 3).unwrap()
}

fn table(options: Options) -> MemoryTable<Pair> {
    MemoryTable::in_memory(shape(), seeds(), &options).unwrap()
}

// =============================================================================
// Test 1: Minimum hamming distance groups similar items
// =============================================================================
#[test]
fn min_hamming_places_near_similar_gates() {
    let options = Options::default()
        .with_initial_buckets(2)
        .with_auto_grow(false)
        .with_placement(PlacementPolicy::MinHammingDistance);
    let mut table = table(options);

    assert_eq!(table.put((7, 5)).unwrap(), 0); // tie between empty buckets: first wins
    assert_eq!(table.put((50, 1)).unwrap(), 1); // 6 bits from bucket 0, 3 from bucket 1
    assert_eq!(table.put((7, 6)).unwrap(), 0); // shares bit 7 with bucket 0
    assert_eq!(table.put((51, 1)).unwrap(), 1); // shares 51, 52 with bucket 1
}

#[test]
fn least_loaded_spreads_items() {
    let options = Options::default()
        .with_initial_buckets(3)
        .with_placement(PlacementPolicy::LeastLoaded);
    let mut table = table(options);

    let placed: Vec<usize> = (0..4).map(|i| table.put((i, 1)).unwrap()).collect();
    assert_eq!(placed, vec![0, 1, 2, 0]);
}

// =============================================================================
// Test 2: Auto-grow appends a bucket once one fills up
// =============================================================================
#[test]
fn auto_grow_spawns_buckets() {
    let options = Options::default().with_placement(PlacementPolicy::FirstAvailable);
    let mut table = table(options);
    assert_eq!(table.bucket_count(), 1);

    assert_eq!(table.put((1, 1)).unwrap(), 0);
    assert_eq!(table.bucket_count(), 1);
    assert_eq!(table.put((2, 1)).unwrap(), 0);
    assert_eq!(table.bucket_count(), 2, "full bucket should spawn a spare");
    assert_eq!(table.put((3, 1)).unwrap(), 1);
    assert_eq!(table.len(), 3);
}

#[test]
fn auto_grow_from_zero_buckets() {
    let options = Options::default().with_initial_buckets(0);
    let mut table = table(options);
    assert_eq!(table.bucket_count(), 0);
    assert_eq!(table.put((1, 1)).unwrap(), 0);
    assert_eq!(table.bucket_count(), 1);
}

// =============================================================================
// Test 3: Without auto-grow the table runs out of room
// =============================================================================
#[test]
fn exhausted_without_auto_grow() {
    let options = Options::default().with_initial_buckets(2).with_auto_grow(false);
    let mut table = table(options);
    for i in 0..4 {
        table.put((i, 1)).unwrap();
    }
    assert!(matches!(table.put((9, 1)), Err(Error::CapacityExhausted { buckets: 2 })));
    assert_eq!(table.len(), 4);
}

#[test]
fn no_buckets_and_no_growth_is_exhausted() {
    let options = Options::default().with_initial_buckets(0).with_auto_grow(false);
    let mut table = table(options);
    assert!(matches!(table.put((1, 1)), Err(Error::CapacityExhausted { buckets: 0 })));
}

// =============================================================================
// Test 4: Queries fan out to every bucket without deduplication
// =============================================================================
#[test]
fn queries_concatenate_bucket_results() {
    let options = Options::default().with_placement(PlacementPolicy::FirstAvailable);
    let mut table = table(options);
    for _ in 0..3 {
        table.put((7, 5)).unwrap();
    }
    table.put((50, 1)).unwrap();
    assert_eq!(table.bucket_count(), 3);

    assert_eq!(table.candidates(&(7, 5)).unwrap(), vec![(7, 5); 3]);
    assert_eq!(table.exact_matches(&(7, 5)).unwrap(), vec![(7, 5); 3]);
    assert_eq!(table.exact_matches(&(50, 1)).unwrap(), vec![(50, 1)]);
    assert!(table.might_contain(&(50, 1)));
    assert!(!table.might_contain(&(80, 1)));
}

#[test]
fn remove_takes_one_copy() {
    let mut table = table(Options::default());
    table.put((7, 5)).unwrap();
    table.put((7, 5)).unwrap();

    assert!(table.remove(&(7, 5)).unwrap());
    assert_eq!(table.exact_matches(&(7, 5)).unwrap().len(), 1);
    assert!(table.remove(&(7, 5)).unwrap());
    assert!(!table.remove(&(7, 5)).unwrap());
    assert!(table.is_empty());
}

#[test]
fn clear_keeps_buckets() {
    let mut table = table(Options::default());
    for i in 0..5 {
        table.put((i, 1)).unwrap();
    }
    let buckets = table.bucket_count();
    table.clear().unwrap();
    assert!(table.is_empty());
    assert_eq!(table.bucket_count(), buckets);
    assert!(table.buckets().iter().all(|b| b.gate().is_empty()));
}

// =============================================================================
// Test 5: Storage-backed tables reopen from their directory
// =============================================================================
#[test]
fn file_table_reopens_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.blooms");
    let options = Options::default().with_block_size(128);
    let fingerprinter: Arc<dyn Fingerprinter<String>> = Arc::new(ContentFingerprinter::default());
    let shape = Shape::new(3, 10).unwrap();

    let directory = {
        let storage = BlockStorage::create(&path, &options).unwrap().into_shared();
        let mut table = FileTable::create(Arc::clone(&storage), shape, Arc::clone(&fingerprinter), &options).unwrap();
        for word in ["ant", "bee", "cow", "doe", "elk", "fox", "gnu"] {
            table.put(word.to_string()).unwrap();
        }
        assert_eq!(table.bucket_count(), 3);
        table.save_directory(&storage, None).unwrap()
    };

    let storage = BlockStorage::open(&path, &options).unwrap().into_shared();
    let mut table = FileTable::open(Arc::clone(&storage), directory, shape, Arc::clone(&fingerprinter), &options).unwrap();
    assert_eq!(table.bucket_count(), 3);
    assert_eq!(table.len(), 7);
    assert_eq!(table.exact_matches(&"fox".to_string()).unwrap(), vec!["fox".to_string()]);

    // Grow further and rewrite the same directory record
    table.put("hen".to_string()).unwrap();
    table.put("ibis".to_string()).unwrap();
    assert_eq!(table.bucket_count(), 4);
    assert_eq!(table.save_directory(&storage, Some(directory)).unwrap(), directory);

    let reopened = FileTable::open(Arc::clone(&storage), directory, shape, fingerprinter, &options).unwrap();
    assert_eq!(reopened.bucket_count(), 4);
    assert_eq!(reopened.len(), 9);
}

#[test]
fn file_table_rejects_other_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.blooms");
    let options = Options::default();
    let fingerprinter: Arc<dyn Fingerprinter<String>> = Arc::new(ContentFingerprinter::default());
    let storage = BlockStorage::create(&path, &options).unwrap().into_shared();

    let stored = Shape::new(3, 10).unwrap();
    let mut table = FileTable::create(Arc::clone(&storage), stored, Arc::clone(&fingerprinter), &options).unwrap();
    table.put("ant".to_string()).unwrap();
    let directory = table.save_directory(&storage, None).unwrap();

    let wanted = Shape::new(4, 10).unwrap();
    match FileTable::open(storage, directory, wanted, fingerprinter, &options) {
        Err(Error::ShapeMismatch { expected, actual }) => {
            assert_eq!(expected, wanted);
            assert_eq!(actual, stored);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("shape mismatch not detected"),
    }
}
