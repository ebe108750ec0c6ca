use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event for key exists: stream={stream:?} version={version:?}")]
    KeyExists { stream: Vec<u8>, version: Vec<u8> },

    #[error("unable to pack key: empty stream id")]
    EmptyStream,

    #[error("invalid key format: {0:?}")]
    InvalidKeyFormat(Vec<u8>),

    #[error("key not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
