//! B+tree-backed driver, grounded on `store/bolt/store.go`.
//!
//! No secondary index: this backend only ever serves `SUBSCRIBEALL`-style
//! index scans with zero rows. Offsets are still version suffixes, matching
//! the shared key codec, rather than bolt's original little-endian integer
//! offset encoding, since every backend must agree on one scan contract
//! (§4.3).

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::driver::{ScanHandler, ScanOptions, StoreDriver};
use crate::error::{StoreError, StoreResult};
use crate::keycodec::{self, Key, StreamId};
use crate::scan_util;

const PRIMARY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("primary");

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        let txn = db.begin_write().map_err(|e| StoreError::Backend(e.to_string()))?;
        {
            // Ensure the table exists even if nothing has been written yet,
            // so `scan`/`get` on a fresh store don't have to special-case a
            // missing table.
            txn.open_table(PRIMARY)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

impl StoreDriver for RedbStore {
    fn set(&self, key: &Key, value: &[u8]) -> StoreResult<()> {
        let stream_key = keycodec::pack_stream(key)?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        {
            let mut table = txn
                .open_table(PRIMARY)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            if table
                .get(stream_key.as_slice())
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .is_some()
            {
                return Err(StoreError::KeyExists {
                    stream: key.stream.clone(),
                    version: key.version.clone(),
                });
            }
            table
                .insert(stream_key.as_slice(), value)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        let stream_key = keycodec::pack_stream(key)?;
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let table = txn
            .open_table(PRIMARY)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        table
            .get(stream_key.as_slice())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(|v| v.value().to_vec())
            .ok_or(StoreError::NotFound)
    }

    fn del(&self, streams: &[StreamId]) -> StoreResult<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        {
            let mut table = txn
                .open_table(PRIMARY)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            for stream in streams {
                let prefix = keycodec::stream_scan_prefix(stream);
                let upper = upper_bound(&prefix);
                let keys: Vec<Vec<u8>> = table
                    .range(prefix.as_slice()..upper.as_slice())
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .filter_map(|r| r.ok())
                    .map(|(k, _)| k.value().to_vec())
                    .collect();
                for k in keys {
                    table
                        .remove(k.as_slice())
                        .map_err(|e| StoreError::Backend(e.to_string()))?;
                }
            }
        }
        txn.commit().map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn scan(&self, opts: ScanOptions, handler: ScanHandler<'_>) -> StoreResult<()> {
        if opts.index {
            // No secondary index on this backend; a SUBSCRIBEALL-style scan
            // is always empty here, never an error.
            return Ok(());
        }

        let prefix = keycodec::stream_scan_prefix(&opts.prefix);
        let upper = upper_bound(&prefix);

        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let table = txn
            .open_table(PRIMARY)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let rows: Vec<StoreResult<(Vec<u8>, Vec<u8>)>> = table
            .range(prefix.as_slice()..upper.as_slice())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(|r| {
                r.map(|(k, v)| (k.value().to_vec(), v.value().to_vec()))
                    .map_err(|e| StoreError::Backend(e.to_string()))
            })
            .collect();

        scan_util::drive(rows.into_iter(), &opts, keycodec::unpack_stream, handler)
    }

    fn size(&self) -> i64 {
        -1
    }

    fn gc(&self) -> StoreResult<()> {
        self.db
            .compact()
            .map(|_| ())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Smallest byte string that is strictly greater than every key carrying
/// `prefix`; used as the exclusive end of a redb range scan. Empty prefix
/// (scan everything) maps to no upper bound, represented here by `0xff`
/// repeated, which is safe because no valid key is all `0xff` bytes as long
/// as it starts with the 2-byte `s:` tag.
fn upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xff {
            bound[i] += 1;
            bound.truncate(i + 1);
            return bound;
        }
    }
    vec![0xff; prefix.len() + 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn open_tmp() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        let store = RedbStore::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn set_then_duplicate_version_conflicts() {
        let (_dir, store) = open_tmp();
        let key = Key::new(Ulid::nil(), b"orders".to_vec(), b"1".to_vec());
        store.set(&key, b"a").unwrap();
        let err = store.set(&key, b"b").unwrap_err();
        assert!(matches!(err, StoreError::KeyExists { .. }));
    }

    #[test]
    fn index_scan_is_always_empty() {
        let (_dir, store) = open_tmp();
        let key = Key::new(Ulid::nil(), b"orders".to_vec(), b"1".to_vec());
        store.set(&key, b"a").unwrap();

        let mut rows = 0;
        store
            .scan(
                ScanOptions {
                    index: true,
                    include_offset: true,
                    ..Default::default()
                },
                &mut |_k, _v| {
                    rows += 1;
                    true
                },
            )
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn scan_is_prefix_scoped() {
        let (_dir, store) = open_tmp();
        store
            .set(
                &Key::new(Ulid::nil(), b"orders".to_vec(), b"1".to_vec()),
                b"a",
            )
            .unwrap();
        store
            .set(
                &Key::new(Ulid::nil(), b"other".to_vec(), b"1".to_vec()),
                b"b",
            )
            .unwrap();

        let mut seen = Vec::new();
        store
            .scan(
                ScanOptions {
                    prefix: b"orders".to_vec(),
                    include_offset: true,
                    fetch_values: true,
                    ..Default::default()
                },
                &mut |k, _v| {
                    seen.push(k.stream);
                    true
                },
            )
            .unwrap();
        assert_eq!(seen, vec![b"orders".to_vec()]);
    }
}
