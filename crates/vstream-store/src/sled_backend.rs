//! LSM-backed driver (primary), grounded on `store/badger/store.go`.
//!
//! Maintains both the primary and secondary-index rows on every `set`, and
//! supports prefix iteration directly via `sled::Tree::scan_prefix`.

use std::path::Path;

use crate::driver::{ScanHandler, ScanOptions, StoreDriver};
use crate::error::{StoreError, StoreResult};
use crate::keycodec::{self, Key, StreamId};
use crate::scan_util;

pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

impl StoreDriver for SledStore {
    fn set(&self, key: &Key, value: &[u8]) -> StoreResult<()> {
        let stream_key = keycodec::pack_stream(key)?;
        let index_key = keycodec::pack_index(&key.id, &key.stream, &key.version);

        // Both rows commit in one `sled` transaction, so a failure partway
        // through never leaves a primary row without its index row (or
        // vice versa).
        let result = self.db.transaction(|tx| {
            if tx.get(&stream_key)?.is_some() {
                return Err(sled::transaction::ConflictableTransactionError::Abort(()));
            }
            tx.insert(&stream_key, value)?;
            tx.insert(&index_key, value)?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(sled::transaction::TransactionError::Abort(())) => Err(StoreError::KeyExists {
                stream: key.stream.clone(),
                version: key.version.clone(),
            }),
            Err(sled::transaction::TransactionError::Storage(e)) => {
                Err(StoreError::Backend(e.to_string()))
            }
        }
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        let stream_key = keycodec::pack_stream(key)?;
        self.db
            .get(&stream_key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(|v| v.to_vec())
            .ok_or(StoreError::NotFound)
    }

    fn del(&self, streams: &[StreamId]) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        for stream in streams {
            let prefix = keycodec::stream_scan_prefix(stream);
            for item in self.db.scan_prefix(&prefix) {
                let (k, _) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
                batch.remove(k);
            }
        }

        // Index rows carry the stream as their third `:`-separated field,
        // not as a prefix, so they can't be range-deleted; scan the whole
        // index once and drop rows for any of the requested streams.
        let streams: std::collections::HashSet<&StreamId> = streams.iter().collect();
        for item in self.db.scan_prefix(keycodec::index_scan_prefix(&[])) {
            let (k, _) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if let Ok(unpacked) = keycodec::unpack_index(&k) {
                if streams.contains(&unpacked.stream) {
                    batch.remove(k);
                }
            }
        }

        self.db
            .apply_batch(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn scan(&self, opts: ScanOptions, handler: ScanHandler<'_>) -> StoreResult<()> {
        let prefix = if opts.index {
            keycodec::index_scan_prefix(&opts.prefix)
        } else {
            keycodec::stream_scan_prefix(&opts.prefix)
        };

        let iter = self.db.scan_prefix(&prefix).map(|item| {
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
        self.db.size_on_disk().map(|s| s as i64).unwrap_or(-1)
    }

    fn gc(&self) -> StoreResult<()> {
        // sled's LSM compaction is automatic; there is nothing to drive by
        // hand the way Badger's `RunValueLogGC` requires.
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycodec::Key;
    use ulid::Ulid;

    fn open_tmp() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
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
    fn scan_returns_published_events_in_order() {
        let (_dir, store) = open_tmp();
        for v in [b"1".to_vec(), b"2".to_vec(), b"3".to_vec()] {
            let key = Key::new(Ulid::nil(), b"orders".to_vec(), v.clone());
            store.set(&key, format!("v{v:?}").as_bytes()).unwrap();
        }

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
                    seen.push(k.version);
                    true
                },
            )
            .unwrap();
        assert_eq!(seen, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn del_removes_primary_and_index_rows() {
        let (_dir, store) = open_tmp();
        let key = Key::new(Ulid::nil(), b"orders".to_vec(), b"1".to_vec());
        store.set(&key, b"a").unwrap();

        store.del(&[b"orders".to_vec()]).unwrap();

        let mut primary_rows = 0;
        store
            .scan(
                ScanOptions {
                    prefix: b"orders".to_vec(),
                    include_offset: true,
                    ..Default::default()
                },
                &mut |_k, _v| {
                    primary_rows += 1;
                    true
                },
            )
            .unwrap();
        assert_eq!(primary_rows, 0);

        let mut index_rows = 0;
        store
            .scan(
                ScanOptions {
                    index: true,
                    include_offset: true,
                    ..Default::default()
                },
                &mut |_k, _v| {
                    index_rows += 1;
                    true
                },
            )
            .unwrap();
        assert_eq!(index_rows, 0);
    }
}
