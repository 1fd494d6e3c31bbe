use thiserror::Error;

/// Persistence-layer errors raised by the RocksDB-backed store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("key not found")]
    NotFound,

    #[error("rocksdb error: {0}")]
    Rocksdb(String),

    #[error("transaction conflict, retries exhausted after {0} attempts")]
    ConflictRetriesExhausted(u32),

    #[error("other error: {0}")]
    Other(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Rocksdb(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
