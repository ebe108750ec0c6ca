//! The ordered key/value store contract plus its three backend drivers.
//!
//! Every backend packs two namespaces into one flat keyspace (see
//! [`keycodec`]): a primary namespace ordered by `(stream, version)` and,
//! where the backend supports it, a secondary time index ordered by
//! `(event id, stream, version)`. [`driver::StoreDriver`] is the contract
//! handlers in `services/server` depend on; they never touch a concrete
//! backend type directly.

pub mod driver;
pub mod error;
pub mod keycodec;
pub mod scan_util;
pub mod ulid_gen;

#[cfg(feature = "sled-backend")]
pub mod sled_backend;

#[cfg(feature = "redb-backend")]
pub mod redb_backend;

#[cfg(feature = "rocksdb-backend")]
pub mod rocksdb_backend;

pub use driver::{ScanHandler, ScanOptions, StoreDriver};
pub use error::{StoreError, StoreResult};
pub use keycodec::{Key, StreamId, Version};
pub use ulid_gen::gen_ulid;

/// Which backend a deployment selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sled,
    Redb,
    Rocksdb,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sled" => Ok(BackendKind::Sled),
            "redb" => Ok(BackendKind::Redb),
            "rocksdb" => Ok(BackendKind::Rocksdb),
            other => Err(format!("unknown backend type {other:?}")),
        }
    }
}

/// Opens the requested backend at `path`, boxed behind the [`StoreDriver`]
/// trait so callers never need to know which concrete type they hold.
pub fn open(kind: BackendKind, path: &std::path::Path) -> StoreResult<Box<dyn StoreDriver>> {
    match kind {
        #[cfg(feature = "sled-backend")]
        BackendKind::Sled => Ok(Box::new(sled_backend::SledStore::open(path)?)),
        #[cfg(not(feature = "sled-backend"))]
        BackendKind::Sled => Err(StoreError::Backend("sled backend not compiled in".into())),

        #[cfg(feature = "redb-backend")]
        BackendKind::Redb => Ok(Box::new(redb_backend::RedbStore::open(path)?)),
        #[cfg(not(feature = "redb-backend"))]
        BackendKind::Redb => Err(StoreError::Backend("redb backend not compiled in".into())),

        #[cfg(feature = "rocksdb-backend")]
        BackendKind::Rocksdb => Ok(Box::new(rocksdb_backend::RocksdbStore::open(path)?)),
        #[cfg(not(feature = "rocksdb-backend"))]
        BackendKind::Rocksdb => {
            Err(StoreError::Backend("rocksdb backend not compiled in".into()))
        }
    }
}
