// Shared storage tests: several threads appending through one handle.

use std::sync::Arc;
use std::thread;

use bloom_gate::{BlockStorage, BloomFile, ContentFingerprinter, Fingerprinter, GatedCollection, Options, Shape};

// =============================================================================
// Test 1: Concurrent appends get distinct positions and read back intact
// =============================================================================
#[test]
fn concurrent_appends_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options::default().with_block_size(64);
    let storage = BlockStorage::create(&dir.path().join("s.db"), &options).unwrap().into_shared();

    let mut handles = vec![];
    for t in 0..4u8 {
        let storage = Arc::clone(&storage);
        handles.push(thread::spawn(move || {
            let mut written = Vec::new();
            for i in 0..50u8 {
                let data = vec![t.wrapping_mul(50).wrapping_add(i); (i as usize % 7) * 13];
                let position = storage.lock().append(&data).unwrap();
                written.push((position, data));
            }
            written
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.join().unwrap());
    }

    let mut positions: Vec<_> = all.iter().map(|(p, _)| *p).collect();
    positions.sort();
    positions.dedup();
    assert_eq!(positions.len(), 200);

    let storage = storage.lock();
    for (position, data) in &all {
        assert_eq!(&storage.read(*position).unwrap(), data);
    }
}

// =============================================================================
// Test 2: Deletes and appends interleave without losing free space
// =============================================================================
#[test]
fn concurrent_delete_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options::default().with_block_size(64);
    let storage = BlockStorage::create(&dir.path().join("s.db"), &options).unwrap().into_shared();

    let doomed: Vec<_> = (0..20u8).map(|i| storage.lock().append(&[i; 30]).unwrap()).collect();

    let deleter = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            for position in doomed {
                storage.lock().delete(position).unwrap();
            }
        })
    };
    let appender = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            (0..20u8)
                .map(|i| {
                    let position = storage.lock().append(&[100 + i; 30]).unwrap();
                    (position, i)
                })
                .collect::<Vec<_>>()
        })
    };

    deleter.join().unwrap();
    let appended = appender.join().unwrap();

    let storage = storage.lock();
    for (position, i) in appended {
        assert_eq!(storage.read(position).unwrap(), vec![100 + i; 30]);
    }
}

// =============================================================================
// Test 3: Several collections share one file
// =============================================================================
#[test]
fn collections_on_shared_storage_in_threads() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options::default().with_block_size(128);
    let storage = BlockStorage::create(&dir.path().join("s.db"), &options).unwrap().into_shared();
    let shape = Shape::new(50, 100).unwrap();

    let mut handles = vec![];
    for t in 0..3 {
        let storage = Arc::clone(&storage);
        let options = options.clone();
        handles.push(thread::spawn(move || {
            let fingerprinter: Arc<dyn Fingerprinter<String>> = Arc::new(ContentFingerprinter::default());
            let mut file = BloomFile::create(storage, shape, fingerprinter, &options).unwrap();
            for i in 0..20 {
                file.add(format!("t{t}-item{i}")).unwrap();
            }
            file.root()
        }));
    }
    let roots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for (t, root) in roots.into_iter().enumerate() {
        let fingerprinter: Arc<dyn Fingerprinter<String>> = Arc::new(ContentFingerprinter::default());
        let file = BloomFile::open(Arc::clone(&storage), root, fingerprinter, &options).unwrap();
        assert_eq!(file.len(), 20);
        assert!(file.might_contain(&format!("t{t}-item7")));
    }
}
