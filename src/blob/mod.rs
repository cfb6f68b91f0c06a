mod fs;

pub use fs::FsBlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found")]
    NotFound,
    #[error("invalid blob handle")]
    InvalidHandle,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Content-addressed-by-handle byte storage for version content.
///
/// Handles are opaque to callers; they are minted by `put` and stored on
/// the version row.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, data: Bytes) -> Result<String, BlobError>;

    /// Opens a blob for streaming and returns its size in bytes.
    async fn open(&self, handle: &str) -> Result<(BlobReader, u64), BlobError>;

    /// Returns `false` if the blob was already absent.
    async fn delete(&self, handle: &str) -> Result<bool, BlobError>;

    async fn get(&self, handle: &str) -> Result<Bytes, BlobError> {
        let (mut reader, size) = self.open(handle).await?;
        let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}
