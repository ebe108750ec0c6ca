use crate::error::StoreResult;
use crate::keycodec::{Key, StreamId};

/// Parameters for a single prefix scan. See the field docs for exact cursor
/// semantics — they are unusual (suffix-matched offsets) and backend drivers
/// must all agree on them.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Restricts iteration to keys with this prefix. Empty scans the whole
    /// namespace (primary or index, per `index`).
    pub prefix: Vec<u8>,
    /// Skip every key until one whose *trailing* bytes equal `offset`. An
    /// empty offset matches immediately (every key ends with the empty
    /// slice), so callers that want to start at the beginning must also set
    /// `include_offset = true` or the very first key is dropped.
    pub offset: Vec<u8>,
    /// Whether the offset-matching key itself is emitted.
    pub include_offset: bool,
    /// Whether the handler receives the stored value or an empty one.
    pub fetch_values: bool,
    /// Scan the secondary time index instead of the primary namespace.
    pub index: bool,
}

/// `(key, value) -> keep going`. Returning `false` stops the scan early.
pub type ScanHandler<'a> = &'a mut dyn FnMut(Key, Vec<u8>) -> bool;

/// The ordered key/value contract every backend implements.
///
/// Implementations must make `set` atomic across the primary row and (where
/// supported) the secondary index row: either both land or neither does.
pub trait StoreDriver: Send + Sync {
    fn set(&self, key: &Key, value: &[u8]) -> StoreResult<()>;
    fn get(&self, key: &Key) -> StoreResult<Vec<u8>>;
    fn del(&self, streams: &[StreamId]) -> StoreResult<()>;
    fn scan(&self, opts: ScanOptions, handler: ScanHandler<'_>) -> StoreResult<()>;
    fn size(&self) -> i64;
    fn gc(&self) -> StoreResult<()>;
    fn close(&self) -> StoreResult<()>;
}
