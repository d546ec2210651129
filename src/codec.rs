use crate::error::{Error, Result};

/// Serialization for items held by storage-backed collections.
///
/// Items are written back to back inside a bucket payload, so every
/// encoding must be self-delimiting: `decode` consumes exactly the bytes
/// `encode` produced and advances `buf` past them.
pub trait Codec: Sized {
    /// Append the encoding of `self`. Fails with `Error::Config` when the
    /// item is too large for its length prefix.
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()>;

    fn decode(buf: &mut &[u8]) -> Result<Self>;
}

/// Split `N` bytes off the front of `buf`.
pub(crate) fn take<const N: usize>(buf: &mut &[u8], what: &str) -> Result<[u8; N]> {
    if buf.len() < N {
        return Err(Error::Corruption(format!(
            "truncated {what}: need {N} bytes, have {}",
            buf.len()
        )));
    }
    let (head, rest) = buf.split_at(N);
    *buf = rest;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok(out)
}

pub(crate) fn take_slice<'a>(buf: &mut &'a [u8], len: usize, what: &str) -> Result<&'a [u8]> {
    if buf.len() < len {
        return Err(Error::Corruption(format!(
            "truncated {what}: need {len} bytes, have {}",
            buf.len()
        )));
    }
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

/// Write a u32 length prefix, refusing lengths that would wrap.
pub(crate) fn put_len(buf: &mut Vec<u8>, len: usize, what: &str) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Config(format!("{what} of {len} bytes exceeds a u32 length prefix")))?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

pub(crate) fn get_i32(buf: &mut &[u8], what: &str) -> Result<i32> {
    Ok(i32::from_be_bytes(take::<4>(buf, what)?))
}

pub(crate) fn get_i64(buf: &mut &[u8], what: &str) -> Result<i64> {
    Ok(i64::from_be_bytes(take::<8>(buf, what)?))
}

impl Codec for Vec<u8> {
    /// Format: [len(4B)][bytes]
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        put_len(buf, self.len(), "byte string")?;
        buf.extend_from_slice(self);
        Ok(())
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let len = u32::from_be_bytes(take::<4>(buf, "byte string length")?) as usize;
        Ok(take_slice(buf, len, "byte string")?.to_vec())
    }
}

impl Codec for String {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        put_len(buf, self.len(), "string")?;
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        let bytes = Vec::<u8>::decode(buf)?;
        String::from_utf8(bytes).map_err(|e| Error::Corruption(format!("invalid utf-8 item: {e}")))
    }
}

impl Codec for u64 {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        Ok(u64::from_be_bytes(take::<8>(buf, "u64 item")?))
    }
}

impl Codec for i64 {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        get_i64(buf, "i64 item")
    }
}

impl Codec for u32 {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.to_be_bytes());
        Ok(())
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        Ok(u32::from_be_bytes(take::<4>(buf, "u32 item")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_self_delimiting() {
        let mut buf = Vec::new();
        "one".to_string().encode(&mut buf).unwrap();
        String::new().encode(&mut buf).unwrap();
        "three".to_string().encode(&mut buf).unwrap();

        let mut cursor = buf.as_slice();
        assert_eq!(String::decode(&mut cursor).unwrap(), "one");
        assert_eq!(String::decode(&mut cursor).unwrap(), "");
        assert_eq!(String::decode(&mut cursor).unwrap(), "three");
        assert!(cursor.is_empty());
    }

    #[test]
    fn truncated_item_is_corruption() {
        let mut buf = Vec::new();
        b"hello".to_vec().encode(&mut buf).unwrap();
        buf.truncate(6);
        assert!(matches!(Vec::<u8>::decode(&mut buf.as_slice()), Err(Error::Corruption(_))));
    }

    #[test]
    fn oversized_length_prefix_is_refused() {
        let mut buf = Vec::new();
        let result = put_len(&mut buf, u32::MAX as usize + 1, "string");
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(buf.is_empty());

        put_len(&mut buf, u32::MAX as usize, "string").unwrap();
        assert_eq!(buf, u32::MAX.to_be_bytes());
    }
}
