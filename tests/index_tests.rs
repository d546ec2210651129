// Bucket index tests: collision buckets, ordering, candidate queries.

use bloom_gate::index::BucketIndex;
use bloom_gate::{BloomFilter, BloomFilterBuilder, FilterKind, Fingerprint, InsertOutcome, Shape};

fn shape() -> Shape {
    Shape::from_parts(10, 10, 100, 3).unwrap()
}

// =============================================================================
// Test 1: Colliding items share one bucket
// =============================================================================
#[test]
fn collisions_share_a_bucket() {
    let mut index = BucketIndex::new(FilterKind::BitSet, 2);
    let fp = Fingerprint::new(7, 5);

    assert_eq!(index.insert(fp, "cat"), InsertOutcome::NewBucket);
    assert_eq!(index.insert(fp, "dog"), InsertOutcome::AppendedToExisting);
    assert_eq!(index.insert(Fingerprint::new(8, 5), "emu"), InsertOutcome::NewBucket);

    assert_eq!(index.len(), 3);
    assert_eq!(index.bucket_count(), 2);
    let found: Vec<&&str> = index.exact_matches(&fp).collect();
    assert_eq!(found, vec![&"cat", &"dog"]);
}

#[test]
fn duplicates_are_kept() {
    let mut index = BucketIndex::default();
    let fp = Fingerprint::new(1, 1);
    index.insert(fp, "x");
    index.insert(fp, "x");
    assert_eq!(index.exact_matches(&fp).count(), 2);

    assert!(index.remove(&fp, &"x"));
    assert_eq!(index.exact_matches(&fp).count(), 1);
}

// =============================================================================
// Test 2: Removal drops empty buckets
// =============================================================================
#[test]
fn removing_last_item_drops_bucket() {
    let mut index = BucketIndex::default();
    let fp = Fingerprint::new(7, 5);
    index.insert(fp, "cat");
    index.insert(fp, "dog");

    assert!(index.remove(&fp, &"cat"));
    assert_eq!(index.bucket_count(), 1);
    assert!(index.remove(&fp, &"dog"));
    assert_eq!(index.bucket_count(), 0);
    assert!(index.is_empty());

    assert!(!index.remove(&fp, &"dog"));
    assert!(!index.remove(&Fingerprint::new(9, 9), &"cat"));
}

// =============================================================================
// Test 3: Buckets iterate in fingerprint order
// =============================================================================
#[test]
fn buckets_are_sorted_by_fingerprint() {
    let mut index = BucketIndex::default();
    index.insert(Fingerprint::new(3, 0), 'c');
    index.insert(Fingerprint::new(1, 9), 'a');
    index.insert(Fingerprint::new(1, 10), 'b');

    let order: Vec<Fingerprint> = index.buckets().map(|b| *b.fingerprint()).collect();
    assert_eq!(
        order,
        vec![Fingerprint::new(1, 9), Fingerprint::new(1, 10), Fingerprint::new(3, 0)]
    );
    assert_eq!(index.ceiling(&Fingerprint::new(1, 10)).unwrap().items(), &['b']);
    assert_eq!(index.get(&Fingerprint::new(3, 0)).unwrap().items(), &['c']);
}

// =============================================================================
// Test 4: Candidates are buckets whose filter the query covers
// =============================================================================
#[test]
fn candidates_cover_query_subsets() {
    let mut index = BucketIndex::new(FilterKind::BitSet, 2);
    let a = Fingerprint::new(7, 5); // 7, 12, 17
    let b = Fingerprint::new(7, 6); // 7, 13, 19
    let c = Fingerprint::new(50, 1); // 50, 51, 52
    index.insert(a, "a");
    index.insert(b, "b");
    index.insert(c, "c");

    let query = BloomFilterBuilder::new(shape()).add_fingerprint(&a).add_fingerprint(&c).build();
    let found: Vec<&&str> = index.candidates(&query).collect();
    assert_eq!(found, vec![&"a", &"c"]);

    // A query holding one fingerprint finds at least its exact matches
    let single = BloomFilter::from_fingerprint(FilterKind::BitSet, shape(), &b);
    let found: Vec<&&str> = index.candidates(&single).collect();
    assert_eq!(found, vec![&"b"]);
}

#[test]
fn derived_filters_are_cached_per_shape() {
    let mut index = BucketIndex::new(FilterKind::BitSet, 1);
    let fp = Fingerprint::new(7, 5);
    index.insert(fp, 1u32);

    let small = BloomFilter::from_fingerprint(FilterKind::BitSet, shape(), &fp);
    let big_shape = Shape::from_parts(10, 10, 200, 3).unwrap();
    let big = BloomFilter::from_fingerprint(FilterKind::BitSet, big_shape, &fp);

    assert_eq!(index.candidates(&small).count(), 1);
    assert_eq!(index.candidates(&big).count(), 1);
    // Capacity 1: the second shape evicted the first
    assert_eq!(index.get(&fp).unwrap().cached_filters(), 1);
}

#[test]
fn clear_empties_everything() {
    let mut index = BucketIndex::default();
    index.insert(Fingerprint::new(1, 1), 1u8);
    index.insert(Fingerprint::new(2, 2), 2u8);
    index.clear();
    assert!(index.is_empty());
    assert_eq!(index.bucket_count(), 0);
}
