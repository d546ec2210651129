pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::config::Options;
use crate::shape::Shape;

pub use registry::{Crc32Digest, DEFAULT_DIGEST, Digest, HashRegistry, Xxh3Digest};

/// Deterministic 128-bit summary of an item's content, kept as two 64-bit
/// seeds for double hashing.
///
/// Ordering is lexicographic on `(h1, h2)`, which is what the bucket
/// index orders its buckets by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint {
    h1: u64,
    h2: u64,
}

impl Fingerprint {
    pub fn new(h1: u64, h2: u64) -> Self {
        Fingerprint { h1, h2 }
    }

    /// Digest raw content into a fingerprint.
    pub fn from_content(content: &[u8], digest: &dyn Digest) -> Self {
        let (h1, h2) = digest.digest(content);
        Fingerprint { h1, h2 }
    }

    pub fn h1(&self) -> u64 {
        self.h1
    }

    pub fn h2(&self) -> u64 {
        self.h2
    }

    /// Bit positions this fingerprint turns on in a filter of `shape`.
    ///
    /// Double hashing: `position_i = |h1 + i * h2| mod m`, with the sum
    /// taken as wrapping signed 64-bit arithmetic. Yields exactly `k`
    /// values; duplicates are possible.
    pub fn activated_bits(&self, shape: &Shape) -> impl Iterator<Item = u32> + use<> {
        let h1 = self.h1 as i64;
        let h2 = self.h2 as i64;
        let m = shape.number_of_bits() as u64;
        (0..shape.number_of_hash_functions()).map(move |i| {
            let combined = h1.wrapping_add((i as i64).wrapping_mul(h2));
            (combined.unsigned_abs() % m) as u32
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.h1, self.h2)
    }
}

/// Turns a caller's item into its fingerprint.
///
/// Any `Fn(&T) -> Fingerprint` closure qualifies, which is how tests plug
/// in deliberately weak hashes.
pub trait Fingerprinter<T>: Send + Sync {
    fn fingerprint(&self, item: &T) -> Fingerprint;
}

impl<T, F> Fingerprinter<T> for F
where
    F: Fn(&T) -> Fingerprint + Send + Sync,
{
    fn fingerprint(&self, item: &T) -> Fingerprint {
        self(item)
    }
}

/// Fingerprints byte-like items with a registry digest.
#[derive(Clone)]
pub struct ContentFingerprinter {
    digest: Arc<dyn Digest>,
}

impl ContentFingerprinter {
    pub fn new(digest: Arc<dyn Digest>) -> Self {
        ContentFingerprinter { digest }
    }

    /// Look the digest up by name, e.g. `Options::digest`.
    pub fn from_registry(registry: &HashRegistry, name: &str) -> crate::error::Result<Self> {
        Ok(ContentFingerprinter { digest: registry.get(name)? })
    }

    /// Fingerprinter for the digest named by `options.digest`, resolved
    /// against the built-in registry.
    pub fn for_options(options: &Options) -> crate::error::Result<Self> {
        Self::from_registry(&HashRegistry::default(), &options.digest)
    }

    pub fn digest_name(&self) -> &str {
        self.digest.name()
    }
}

impl Default for ContentFingerprinter {
    fn default() -> Self {
        ContentFingerprinter { digest: Arc::new(Xxh3Digest) }
    }
}

impl<T: AsRef<[u8]>> Fingerprinter<T> for ContentFingerprinter {
    fn fingerprint(&self, item: &T) -> Fingerprint {
        Fingerprint::from_content(item.as_ref(), self.digest.as_ref())
    }
}
