use std::collections::HashMap;
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_128;

use crate::error::{Error, Result};

/// Registry name of the digest used when nothing else is configured.
pub const DEFAULT_DIGEST: &str = "xxh3-128";

/// Seed for the second crc32 pass, so `h2` differs from `h1`.
const CRC_SECOND_SEED: u32 = 0x9E37_79B9;

/// Produces the two 64-bit seeds of a fingerprint from raw content.
pub trait Digest: Send + Sync {
    /// Stable name under which the digest is registered.
    fn name(&self) -> &str;

    /// Hash `content` into `(h1, h2)`.
    fn digest(&self, content: &[u8]) -> (u64, u64);
}

/// xxh3 128-bit hash split into two 64-bit halves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Digest;

impl Digest for Xxh3Digest {
    fn name(&self) -> &str {
        DEFAULT_DIGEST
    }

    fn digest(&self, content: &[u8]) -> (u64, u64) {
        let hash128 = xxh3_128(content);

        // Split 128-bit hash into two 64-bit halves
        let h1 = hash128 as u64;
        let h2 = (hash128 >> 64) as u64;

        (h1, h2)
    }
}

/// Two crc32 passes widened to 64 bits.
///
/// Only 32 bits of entropy per half, so collisions show up quickly.
/// Useful for exercising collision chains; not for production gates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Digest;

impl Digest for Crc32Digest {
    fn name(&self) -> &str {
        "crc32"
    }

    fn digest(&self, content: &[u8]) -> (u64, u64) {
        let h1 = crc32fast::hash(content) as u64;
        let mut hasher = crc32fast::Hasher::new_with_initial(CRC_SECOND_SEED);
        hasher.update(content);
        (h1, hasher.finalize() as u64)
    }
}

/// Named digests available to content fingerprinters.
///
/// Passed around as a value: there is no process-wide registry.
#[derive(Clone)]
pub struct HashRegistry {
    digests: HashMap<String, Arc<dyn Digest>>,
}

impl HashRegistry {
    /// A registry with no digests at all.
    pub fn empty() -> Self {
        HashRegistry { digests: HashMap::new() }
    }

    /// Add or replace a digest under its own name.
    pub fn register(&mut self, digest: Arc<dyn Digest>) {
        self.digests.insert(digest.name().to_string(), digest);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Digest>> {
        self.digests
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDigest(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.digests.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for HashRegistry {
    fn default() -> Self {
        let mut registry = HashRegistry::empty();
        registry.register(Arc::new(Xxh3Digest));
        registry.register(Arc::new(Crc32Digest));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set() {
        let registry = HashRegistry::default();
        assert_eq!(registry.names(), vec!["crc32", "xxh3-128"]);
        assert!(matches!(registry.get("md5"), Err(Error::UnknownDigest(_))));
    }

    #[test]
    fn digests_are_deterministic() {
        let d = Xxh3Digest;
        assert_eq!(d.digest(b"hello"), d.digest(b"hello"));
        assert_ne!(d.digest(b"hello"), d.digest(b"world"));
    }
}
