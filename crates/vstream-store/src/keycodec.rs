//! Packs and unpacks the two on-disk key encodings.
//!
//! Both encodings share one byte namespace, discriminated by a leading tag
//! byte and separated with `':'` (0x3A):
//!
//!   primary:   `s:<stream>[:<version>]`
//!   secondary: `t:<event id, 16 bytes>:<stream>:<version>`

use ulid::Ulid;

use crate::error::{StoreError, StoreResult};

const SEP: u8 = b':';
const STREAM_TAG: u8 = b's';
const INDEX_TAG: u8 = b't';

pub type StreamId = Vec<u8>;
pub type Version = Vec<u8>;

/// A logical key: the server-assigned event id plus the caller-supplied
/// stream and version. `id` is all-zero for keys that only ever live in the
/// primary namespace (it is not carried by the primary encoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub id: Ulid,
    pub stream: StreamId,
    pub version: Version,
}

impl Key {
    pub fn new(id: Ulid, stream: StreamId, version: Version) -> Self {
        Self { id, stream, version }
    }

    /// A key that names only a stream, for prefix scans and deletes.
    pub fn stream_only(stream: StreamId) -> Self {
        Self {
            id: Ulid::nil(),
            stream,
            version: Vec::new(),
        }
    }
}

fn stream_scan_identifier() -> [u8; 2] {
    [STREAM_TAG, SEP]
}

fn index_scan_identifier() -> [u8; 2] {
    [INDEX_TAG, SEP]
}

/// Packs the primary stream key. `key.version` may be empty, in which case
/// the result is a prefix naming the whole stream.
pub fn pack_stream(key: &Key) -> StoreResult<Vec<u8>> {
    if key.stream.is_empty() {
        return Err(StoreError::EmptyStream);
    }
    let mut buf = Vec::with_capacity(2 + key.stream.len() + 1 + key.version.len());
    buf.extend_from_slice(&stream_scan_identifier());
    buf.extend_from_slice(&key.stream);
    if !key.version.is_empty() {
        buf.push(SEP);
        buf.extend_from_slice(&key.version);
    }
    Ok(buf)
}

/// Derives a stream-prefix scan key. An empty `prefix` scans every stream.
pub fn stream_scan_prefix(prefix: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + prefix.len());
    buf.extend_from_slice(&stream_scan_identifier());
    buf.extend_from_slice(prefix);
    buf
}

pub fn unpack_stream(key: &[u8]) -> StoreResult<Key> {
    let parts: Vec<&[u8]> = key.splitn(3, |&b| b == SEP).collect();
    if parts.len() < 3 || parts[1].is_empty() || parts[2].is_empty() {
        return Err(StoreError::InvalidKeyFormat(key.to_vec()));
    }
    Ok(Key {
        id: Ulid::nil(),
        stream: parts[1].to_vec(),
        version: parts[2].to_vec(),
    })
}

/// Packs a secondary index row: `t:<id>:<stream>:<version>`.
pub fn pack_index(id: &Ulid, stream: &[u8], version: &[u8]) -> Vec<u8> {
    let id_bytes = id.to_bytes();
    let mut buf = Vec::with_capacity(2 + 16 + 1 + stream.len() + 1 + version.len());
    buf.extend_from_slice(&index_scan_identifier());
    buf.extend_from_slice(&id_bytes);
    buf.push(SEP);
    buf.extend_from_slice(stream);
    buf.push(SEP);
    buf.extend_from_slice(version);
    buf
}

/// Derives an index-prefix scan key from (up to) the first 6 bytes of a
/// ULID's millisecond timestamp component. An empty `time_prefix` scans the
/// whole index.
pub fn index_scan_prefix(time_prefix: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + 6);
    buf.extend_from_slice(&index_scan_identifier());
    if time_prefix.is_empty() {
        return buf;
    }
    let n = time_prefix.len().min(6);
    buf.extend_from_slice(&time_prefix[..n]);
    buf
}

pub fn unpack_index(key: &[u8]) -> StoreResult<Key> {
    let parts: Vec<&[u8]> = key.splitn(4, |&b| b == SEP).collect();
    if parts.len() != 4 || parts[1].len() != 16 || parts[2].is_empty() || parts[3].is_empty() {
        return Err(StoreError::InvalidKeyFormat(key.to_vec()));
    }
    let mut id_bytes = [0u8; 16];
    id_bytes.copy_from_slice(parts[1]);
    Ok(Key {
        id: Ulid::from_bytes(id_bytes),
        stream: parts[2].to_vec(),
        version: parts[3].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_roundtrip() {
        let key = Key::new(Ulid::nil(), b"orders".to_vec(), b"42".to_vec());
        let packed = pack_stream(&key).unwrap();
        assert_eq!(packed, b"s:orders:42");
        let unpacked = unpack_stream(&packed).unwrap();
        assert_eq!(unpacked.stream, key.stream);
        assert_eq!(unpacked.version, key.version);
    }

    #[test]
    fn stream_prefix_has_no_version() {
        let key = Key::stream_only(b"orders".to_vec());
        let packed = pack_stream(&key).unwrap();
        assert_eq!(packed, b"s:orders");
    }

    #[test]
    fn empty_stream_is_rejected() {
        let key = Key::new(Ulid::nil(), Vec::new(), b"1".to_vec());
        assert!(matches!(pack_stream(&key), Err(StoreError::EmptyStream)));
    }

    #[test]
    fn index_roundtrip() {
        let id = Ulid::new();
        let packed = pack_index(&id, b"orders", b"42");
        let unpacked = unpack_index(&packed).unwrap();
        assert_eq!(unpacked.id, id);
        assert_eq!(unpacked.stream, b"orders");
        assert_eq!(unpacked.version, b"42");
    }

    #[test]
    fn index_scan_prefix_takes_first_six_bytes() {
        let id = Ulid::new();
        let ts = &id.to_bytes()[..];
        let prefix = index_scan_prefix(ts);
        assert_eq!(prefix.len(), 2 + 6);
        assert_eq!(&prefix[2..], &ts[..6]);
    }

    #[test]
    fn invalid_index_key_is_rejected() {
        assert!(unpack_index(b"t:short:orders:1").is_err());
    }
}
