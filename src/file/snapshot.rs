use crate::codec::{Codec, get_i32, get_i64, take_slice};
use crate::error::{Error, Result};
use crate::hash::Fingerprint;
use crate::index::BucketIndex;
use crate::shape::Shape;

/// Decoded form of one persisted collection.
pub struct Snapshot<T> {
    pub shape: Shape,
    pub size: usize,
    pub buckets: Vec<(Fingerprint, Vec<T>)>,
}

/// Serialize a collection.
///
/// Format (big-endian):
/// ```text
/// [items(4B)][p(4B)][bits(4B)][k(4B)]      shape
/// [size(4B)]                               live items
/// [bucket_count(4B)]
/// per bucket:
///   [hash_pairs(4B)=1][objects(4B)][payload_len(4B)]
///   [h1(8B)][h2(8B)]
///   [payload: objects items back to back]
/// ```
pub fn encode<T: Codec>(shape: &Shape, index: &BucketIndex<T>) -> Result<Vec<u8>> {
    let mut buf = header(shape, index.len(), index.bucket_count())?;

    let mut payload = Vec::new();
    for bucket in index.buckets() {
        payload.clear();
        for item in bucket.items() {
            item.encode(&mut payload)?;
        }
        put_i32(&mut buf, 1);
        put_i32(&mut buf, field(bucket.len(), "bucket object count")?);
        put_i32(&mut buf, field(payload.len(), "bucket payload length")?);
        buf.extend_from_slice(&(bucket.fingerprint().h1() as i64).to_be_bytes());
        buf.extend_from_slice(&(bucket.fingerprint().h2() as i64).to_be_bytes());
        buf.extend_from_slice(&payload);
    }
    Ok(buf)
}

/// Snapshot of a collection with no items.
pub fn encode_empty(shape: &Shape) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    put_shape(&mut buf, shape);
    put_i32(&mut buf, 0);
    put_i32(&mut buf, 0);
    buf
}

fn header(shape: &Shape, size: usize, bucket_count: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    put_shape(&mut buf, shape);
    put_i32(&mut buf, field(size, "size")?);
    put_i32(&mut buf, field(bucket_count, "bucket count")?);
    Ok(buf)
}

// Shape parts are validated to fit an i32 on construction
fn put_shape(buf: &mut Vec<u8>, shape: &Shape) {
    put_i32(buf, shape.number_of_items() as i32);
    put_i32(buf, shape.probability_denominator() as i32);
    put_i32(buf, shape.number_of_bits() as i32);
    put_i32(buf, shape.number_of_hash_functions() as i32);
}

/// Count or length that must fit a non-negative i32 field.
fn field(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Config(format!("{what} {value} does not fit the snapshot format")))
}

/// Parse a record written by [`encode`].
pub fn decode<T: Codec>(data: &[u8]) -> Result<Snapshot<T>> {
    let mut cursor = data;

    let items = count(&mut cursor, "shape items")?;
    let p = count(&mut cursor, "shape probability")?;
    let bits = count(&mut cursor, "shape bits")?;
    let hashes = count(&mut cursor, "shape hash count")?;
    let shape = Shape::from_parts(items as u32, p as u32, bits as u32, hashes as u32)
        .map_err(|e| Error::Corruption(format!("persisted shape rejected: {e}")))?;

    let size = count(&mut cursor, "size")?;
    let bucket_count = count(&mut cursor, "bucket count")?;

    let mut buckets = Vec::with_capacity(bucket_count.min(cursor.len() / 28));
    let mut total = 0usize;
    for _ in 0..bucket_count {
        let pairs = count(&mut cursor, "hash pair count")?;
        if pairs != 1 {
            return Err(Error::Corruption(format!("bucket with {pairs} hash pairs, expected 1")));
        }
        let objects = count(&mut cursor, "object count")?;
        let payload_len = count(&mut cursor, "payload length")?;
        let h1 = get_i64(&mut cursor, "fingerprint h1")? as u64;
        let h2 = get_i64(&mut cursor, "fingerprint h2")? as u64;

        let mut payload = take_slice(&mut cursor, payload_len, "bucket payload")?;
        let mut bucket_items = Vec::with_capacity(objects.min(payload_len));
        for _ in 0..objects {
            bucket_items.push(T::decode(&mut payload)?);
        }
        if !payload.is_empty() {
            return Err(Error::Corruption(format!(
                "{} unread payload bytes after {objects} objects",
                payload.len()
            )));
        }
        if objects == 0 {
            return Err(Error::Corruption("empty bucket persisted".into()));
        }
        total += objects;
        buckets.push((Fingerprint::new(h1, h2), bucket_items));
    }

    if !cursor.is_empty() {
        return Err(Error::Corruption(format!("{} trailing bytes after buckets", cursor.len())));
    }
    if total != size {
        return Err(Error::Corruption(format!("size {size} but buckets hold {total} items")));
    }

    Ok(Snapshot { shape, size, buckets })
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Non-negative i32 field.
fn count(cursor: &mut &[u8], what: &str) -> Result<usize> {
    let v = get_i32(cursor, what)?;
    if v < 0 {
        return Err(Error::Corruption(format!("negative {what}: {v}")));
    }
    Ok(v as usize)
}
