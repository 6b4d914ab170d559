//! Port traits describing the adapters the tracker depends on.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::barcode::BarCode;
use crate::domain::product::ProductRecord;

/// Logical partitions of the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Every product fetched from upstream, keyed by bar code.
    Cache,
    /// Products whose energy could not be resolved, kept for diagnosis.
    Reject,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Cache, Partition::Reject];

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Cache => "cache",
            Partition::Reject => "reject",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key `{key}`")]
    InvalidKey { key: String },
    #[error("stored record `{key}` in `{partition}` is corrupt: {reason}")]
    Corrupt {
        partition: Partition,
        key: String,
        reason: String,
    },
    #[error("failed to encode record `{key}`: {reason}")]
    Encode { key: String, reason: String },
    #[error("storage io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Key-value persistence for product documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create every partition that does not exist yet.
    async fn ensure_partitions(&self) -> Result<(), StorageError>;

    /// Read a record. Missing keys are `Ok(None)`.
    async fn get(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<ProductRecord>, StorageError>;

    /// Write a record, replacing any previous value under `key`.
    async fn put(
        &self,
        partition: Partition,
        key: &str,
        record: &ProductRecord,
    ) -> Result<(), StorageError>;
}

/// Failure of a single product lookup. Callers treat every variant alike;
/// the distinction only feeds the logs.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup timed out")]
    Timeout,
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("upstream answered with status {status}")]
    Status { status: u16 },
    #[error("malformed response body: {0}")]
    Body(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote product database.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Perform exactly one request for `bar_code`.
    async fn fetch(&self, bar_code: &BarCode) -> Result<ProductRecord, LookupError>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// The downstream consumer is gone; nothing published later can arrive.
    #[error("publisher is closed")]
    Closed,
    #[error("publish failed: {0}")]
    Failed(String),
}

/// Outbound side of the message bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}
