//! Second LSM-backed driver, grounded on `store/pebble/store.go`.
//!
//! Bytewise key ordering and bounded-prefix iteration (an explicit upper
//! bound derived from the prefix, rather than `ValidForPrefix`-style
//! checking per step) mirror Pebble's `IterOptions.UpperBound` usage in the
//! original.

use std::path::Path;

use rocksdb::{IteratorMode, Options, WriteBatch, DB};

use crate::driver::{ScanHandler, ScanOptions, StoreDriver};
use crate::error::{StoreError, StoreResult};
use crate::keycodec::{self, Key, StreamId};
use crate::scan_util;

pub struct RocksdbStore {
    db: DB,
}

impl RocksdbStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

impl StoreDriver for RocksdbStore {
    fn set(&self, key: &Key, value: &[u8]) -> StoreResult<()> {
        let stream_key = keycodec::pack_stream(key)?;

        let existing = self
            .db
            .get(&stream_key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if existing.is_some() {
            return Err(StoreError::KeyExists {
                stream: key.stream.clone(),
                version: key.version.clone(),
            });
        }

        let index_key = keycodec::pack_index(&key.id, &key.stream, &key.version);

        let mut batch = WriteBatch::default();
        batch.put(&stream_key, value);
        batch.put(&index_key, value);
        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        let stream_key = keycodec::pack_stream(key)?;
        self.db
            .get(&stream_key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound)
    }

    fn del(&self, streams: &[StreamId]) -> StoreResult<()> {
        let mut batch = WriteBatch::default();

        for stream in streams {
            let prefix = keycodec::stream_scan_prefix(stream);
            for item in self.db.prefix_iterator(&prefix) {
                let (k, _) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
                if !k.starts_with(&prefix) {
                    break;
                }
                batch.delete(&k);
            }
        }

        let streams: std::collections::HashSet<&StreamId> = streams.iter().collect();
        let index_prefix = keycodec::index_scan_prefix(&[]);
        for item in self.db.prefix_iterator(&index_prefix) {
            let (k, _) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if let Ok(unpacked) = keycodec::unpack_index(&k) {
                if streams.contains(&unpacked.stream) {
                    batch.delete(&k);
                }
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn scan(&self, opts: ScanOptions, handler: ScanHandler<'_>) -> StoreResult<()> {
        let prefix = if opts.index {
            keycodec::index_scan_prefix(&opts.prefix)
        } else {
            keycodec::stream_scan_prefix(&opts.prefix)
        };

        let prefix_for_filter = prefix.clone();
        let iter = self
            .db
            .iterator(IteratorMode::From(&prefix, rocksdb::Direction::Forward))
            .take_while(move |item| match item {
                Ok((k, _)) => k.starts_with(&prefix_for_filter),
                Err(_) => true,
            })
            .map(|item| {
                item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(|e| StoreError::Backend(e.to_string()))
            });

        let unpack = |k: &[u8]| {
            if opts.index {
                keycodec::unpack_index(k)
            } else {
                keycodec::unpack_stream(k)
            }
        };

        scan_util::drive(iter, &opts, unpack, handler)
    }

    fn size(&self) -> i64 {
        self.db
            .property_int_value("rocksdb.total-sst-files-size")
            .ok()
            .flatten()
            .map(|v| v as i64)
            .unwrap_or(-1)
    }

    fn gc(&self) -> StoreResult<()> {
        self.db.compact_range(None::<&[u8]>, None::<&[u8]>);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn open_tmp() -> (tempfile::TempDir, RocksdbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksdbStore::open(dir.path()).unwrap();
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
    fn index_scan_sees_every_published_event() {
        let (_dir, store) = open_tmp();
        store
            .set(
                &Key::new(Ulid::nil(), b"orders".to_vec(), b"1".to_vec()),
                b"a",
            )
            .unwrap();
        store
            .set(
                &Key::new(Ulid::nil(), b"orders".to_vec(), b"2".to_vec()),
                b"b",
            )
            .unwrap();

        let mut seen = Vec::new();
        store
            .scan(
                ScanOptions {
                    index: true,
                    include_offset: true,
                    fetch_values: true,
                    ..Default::default()
                },
                &mut |k, v| {
                    seen.push((k.version, v));
                    true
                },
            )
            .unwrap();
        assert_eq!(
            seen,
            vec![(b"1".to_vec(), b"a".to_vec()), (b"2".to_vec(), b"b".to_vec())]
        );
    }

    #[test]
    fn del_removes_primary_and_index_rows() {
        let (_dir, store) = open_tmp();
        store
            .set(
                &Key::new(Ulid::nil(), b"orders".to_vec(), b"1".to_vec()),
                b"a",
            )
            .unwrap();

        store.del(&[b"orders".to_vec()]).unwrap();

        let mut rows = 0;
        store
            .scan(
                ScanOptions {
                    prefix: b"orders".to_vec(),
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
}
