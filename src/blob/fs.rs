use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

use super::{BlobError, BlobReader, BlobStore};

impl BlobError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Stores blobs as files under `<data_dir>/blobs`, sharded by the first
/// two byte pairs of the handle.
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("blobs"),
        }
    }

    fn object_path(&self, handle: &str) -> PathBuf {
        self.base_path
            .join("objects")
            .join(&handle[0..2])
            .join(&handle[2..4])
            .join(handle)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join("tmp")
            .join(Uuid::new_v4().simple().to_string())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, data: Bytes) -> Result<String, BlobError> {
        let handle = Uuid::new_v4().simple().to_string();

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_file = File::create(&temp_path).await?;
        let final_path = self.object_path(&handle);
        if let Err(e) = persist(temp_file, &data, &temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(BlobError::Io(e));
        }

        Ok(handle)
    }

    async fn open(&self, handle: &str) -> Result<(BlobReader, u64), BlobError> {
        validate_handle(handle)?;
        let file = File::open(self.object_path(handle))
            .await
            .map_err(BlobError::from_io)?;
        let size = file.metadata().await?.len();
        let reader: BlobReader = Box::new(BufReader::new(file));
        Ok((reader, size))
    }

    async fn delete(&self, handle: &str) -> Result<bool, BlobError> {
        validate_handle(handle)?;
        match fs::remove_file(self.object_path(handle)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::Io(e)),
        }
    }
}

/// Writes and syncs `data` into the temp file, then moves it into place.
async fn persist(
    mut temp_file: File,
    data: &[u8],
    temp_path: &Path,
    final_path: &Path,
) -> std::io::Result<()> {
    temp_file.write_all(data).await?;
    temp_file.sync_all().await?;
    drop(temp_file);

    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(temp_path, final_path).await
}

fn validate_handle(handle: &str) -> Result<(), BlobError> {
    if handle.len() != 32 {
        return Err(BlobError::InvalidHandle);
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(BlobError::InvalidHandle);
    }
    Ok(())
}
