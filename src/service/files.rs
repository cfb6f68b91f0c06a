use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use super::{SharingLedger, blob_call};
use crate::blob::{BlobReader, BlobStore};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::store::path::{normalize_path, validate_name};
use crate::types::*;

pub const INITIAL_VERSION_NAME: &str = "1.0";
pub const DEFAULT_VERSION_NAME: &str = "version";
const MAX_NAME_PROBES: usize = 1000;
const NAME_RACE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub full_path: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub name: Option<String>,
    pub full_path: Option<String>,
}

/// An open blob ready to be streamed to a client.
pub struct ContentStream {
    pub file_name: String,
    pub size: u64,
    pub reader: BlobReader,
}

/// Picks the first free name among `base`, `base_2`, `base_3`, ...
///
/// Gives up with `Conflict` after a bounded number of probes.
pub fn resolve_version_name(
    base: &str,
    mut is_taken: impl FnMut(&str) -> Result<bool>,
) -> Result<String> {
    if !is_taken(base)? {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_NAME_PROBES {
        let candidate = format!("{base}_{n}");
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(Error::Conflict(format!(
        "no free version name for '{base}' after {MAX_NAME_PROBES} attempts"
    )))
}

fn blob_size(data: &Bytes) -> i64 {
    i64::try_from(data.len()).unwrap_or(i64::MAX)
}

/// Owns the file entity and its blob-backed version chain.
pub struct FileCoordinator {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    sharing: SharingLedger,
    blob_timeout: Duration,
}

impl FileCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        sharing: SharingLedger,
        blob_timeout: Duration,
    ) -> Self {
        Self {
            store,
            blobs,
            sharing,
            blob_timeout,
        }
    }

    async fn put_blob(&self, data: Bytes) -> Result<String> {
        blob_call(self.blob_timeout, self.blobs.put(data)).await
    }

    /// Best-effort blob removal. A failure leaves an orphan for out-of-band GC.
    async fn discard_blob(&self, handle: &str) {
        match blob_call(self.blob_timeout, self.blobs.delete(handle)).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Blob {handle} was already gone"),
            Err(e) => tracing::warn!("Leaked blob {handle}: {e}"),
        }
    }

    async fn open_blob(&self, file_name: String, handle: &str) -> Result<ContentStream> {
        let (reader, size) = blob_call(self.blob_timeout, self.blobs.open(handle)).await?;
        Ok(ContentStream {
            file_name,
            size,
            reader,
        })
    }

    pub async fn create_file(&self, owner: &User, new: NewFile, content: Bytes) -> Result<File> {
        let name = new.name.trim().to_string();
        validate_name(&name)?;
        let full_path = normalize_path(&new.full_path)?;

        let size_bytes = blob_size(&content);
        let blob_handle = self.put_blob(content).await?;

        let now = Utc::now();
        let file_id = Uuid::new_v4().to_string();
        let version = FileVersion {
            id: Uuid::new_v4().to_string(),
            file_id: file_id.clone(),
            creator_id: Some(owner.id.clone()),
            name: INITIAL_VERSION_NAME.to_string(),
            blob_handle,
            size_bytes,
            created_at: now,
            edited_at: now,
        };
        let file = File {
            id: file_id,
            owner_id: owner.id.clone(),
            name,
            full_path,
            kind: new.kind,
            current_version_id: version.id.clone(),
            created_at: now,
            edited_at: now,
        };

        if let Err(e) = self.store.create_file(&file, &version) {
            self.discard_blob(&version.blob_handle).await;
            return Err(e);
        }

        tracing::info!("Created file {} ({}) for {}", file.name, file.id, owner.login);
        Ok(file)
    }

    pub fn get_file(&self, actor: &User, file_id: &str) -> Result<File> {
        self.sharing.require_access(&actor.id, file_id, AccessLevel::READ)
    }

    /// Files owned by the actor. An empty result is not an error.
    pub fn list_owned(&self, actor: &User, search: Option<&str>) -> Result<Vec<File>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.store.list_owned_files(&actor.id, search)
    }

    /// Renames or moves a file. Needs write access.
    pub fn update_file(&self, actor: &User, file_id: &str, update: FileUpdate) -> Result<File> {
        let mut file = self
            .sharing
            .require_access(&actor.id, file_id, AccessLevel::WRITE)?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            validate_name(&name)?;
            file.name = name;
        }
        if let Some(full_path) = update.full_path {
            file.full_path = normalize_path(&full_path)?;
        }
        file.edited_at = Utc::now();

        self.store.update_file(&file)?;
        Ok(file)
    }

    /// Deletes a file with all its versions and shares. Blobs are released
    /// after the commit.
    pub async fn delete_file(&self, actor: &User, file_id: &str) -> Result<()> {
        self.sharing.require_owner(&actor.id, file_id)?;

        let handles = self
            .store
            .delete_file(file_id)?
            .ok_or(Error::NotFound("file"))?;
        for handle in &handles {
            self.discard_blob(handle).await;
        }

        tracing::info!("Deleted file {file_id} and {} version(s)", handles.len());
        Ok(())
    }

    pub async fn open_content(&self, actor: &User, file_id: &str) -> Result<ContentStream> {
        let file = self
            .sharing
            .require_access(&actor.id, file_id, AccessLevel::READ)?;
        let version = self
            .store
            .get_version(&file.current_version_id)?
            .ok_or(Error::NotFound("version"))?;
        self.open_blob(file.name, &version.blob_handle).await
    }

    pub async fn open_version_content(
        &self,
        actor: &User,
        version_id: &str,
    ) -> Result<ContentStream> {
        let (file, version) = self.owned_version(actor, version_id)?;
        self.open_blob(file.name, &version.blob_handle).await
    }

    fn owned_version(&self, actor: &User, version_id: &str) -> Result<(File, FileVersion)> {
        let version = self
            .store
            .get_version(version_id)?
            .ok_or(Error::NotFound("version"))?;
        let file = self.sharing.require_owner(&actor.id, &version.file_id)?;
        Ok((file, version))
    }

    /// Versions of a file, newest first. Owner only.
    pub fn list_versions(&self, actor: &User, file_id: &str) -> Result<Vec<FileVersion>> {
        self.sharing.require_owner(&actor.id, file_id)?;
        self.store.list_versions(file_id)
    }

    /// Inserts a new current version over an already-written blob,
    /// re-resolving the name if a concurrent writer takes it first.
    async fn commit_version(
        &self,
        actor: &User,
        file_id: &str,
        requested: Option<String>,
        blob_handle: String,
        size_bytes: i64,
    ) -> Result<FileVersion> {
        let base = requested
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION_NAME.to_string());
        if let Err(e) = validate_name(&base) {
            self.discard_blob(&blob_handle).await;
            return Err(e);
        }

        let now = Utc::now();
        let mut version = FileVersion {
            id: Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            creator_id: Some(actor.id.clone()),
            name: base.clone(),
            blob_handle,
            size_bytes,
            created_at: now,
            edited_at: now,
        };

        for attempt in 1..=NAME_RACE_ATTEMPTS {
            let inserted = resolve_version_name(&base, |candidate| {
                self.store.version_name_exists(file_id, candidate)
            })
            .and_then(|name| {
                version.name = name;
                self.store.insert_version_as_current(&version)
            });

            match inserted {
                Ok(true) => {
                    tracing::info!(
                        "Added version {} ({}) to file {file_id}",
                        version.name,
                        version.id
                    );
                    return Ok(version);
                }
                Ok(false) => {
                    tracing::debug!(
                        "Version name {} taken concurrently (attempt {attempt})",
                        version.name
                    );
                }
                Err(e) => {
                    self.discard_blob(&version.blob_handle).await;
                    return Err(e);
                }
            }
        }

        self.discard_blob(&version.blob_handle).await;
        Err(Error::Conflict(format!(
            "version name '{base}' kept colliding, retry the request"
        )))
    }

    /// Copies the current version's content into a new current version.
    pub async fn create_new_version(
        &self,
        actor: &User,
        file_id: &str,
        name: Option<String>,
    ) -> Result<FileVersion> {
        let file = self.sharing.require_owner(&actor.id, file_id)?;
        let current = self
            .store
            .get_version(&file.current_version_id)?
            .ok_or(Error::NotFound("version"))?;

        let content = blob_call(self.blob_timeout, self.blobs.get(&current.blob_handle)).await?;
        let size_bytes = blob_size(&content);
        let handle = self.put_blob(content).await?;

        self.commit_version(actor, file_id, name, handle, size_bytes)
            .await
    }

    /// Stores uploaded content as the new current version. Needs write access.
    pub async fn upload_version(
        &self,
        actor: &User,
        file_id: &str,
        name: Option<String>,
        content: Bytes,
    ) -> Result<FileVersion> {
        self.sharing
            .require_access(&actor.id, file_id, AccessLevel::WRITE)?;

        let size_bytes = blob_size(&content);
        let handle = self.put_blob(content).await?;

        self.commit_version(actor, file_id, name, handle, size_bytes)
            .await
    }

    pub fn rename_version(
        &self,
        actor: &User,
        version_id: &str,
        name: &str,
    ) -> Result<FileVersion> {
        let (_, mut version) = self.owned_version(actor, version_id)?;
        let name = name.trim();
        validate_name(name)?;

        let now = Utc::now();
        if !self.store.rename_version(version_id, name, now)? {
            return Err(Error::NotFound("version"));
        }
        version.name = name.to_string();
        version.edited_at = now;
        Ok(version)
    }

    /// Deletes a non-current version and then its blob.
    pub async fn delete_version(&self, actor: &User, version_id: &str) -> Result<()> {
        self.owned_version(actor, version_id)?;

        match self.store.delete_version(version_id)? {
            VersionDeletion::Deleted { blob_handle } => {
                self.discard_blob(&blob_handle).await;
                tracing::info!("Deleted version {version_id}");
                Ok(())
            }
            VersionDeletion::IsCurrent => Err(Error::Conflict(
                "cannot delete the current version".to_string(),
            )),
            VersionDeletion::NotFound => Err(Error::NotFound("version")),
        }
    }

    pub fn set_current_version(
        &self,
        actor: &User,
        file_id: &str,
        version_id: &str,
    ) -> Result<File> {
        let mut file = self.sharing.require_owner(&actor.id, file_id)?;
        let version = self
            .store
            .get_version(version_id)?
            .ok_or(Error::NotFound("version"))?;
        if version.file_id != file.id {
            return Err(Error::BadRequest(
                "version belongs to another file".to_string(),
            ));
        }

        let now = Utc::now();
        if !self.store.set_current_version(file_id, version_id, now)? {
            return Err(Error::NotFound("version"));
        }
        file.current_version_id = version.id;
        file.edited_at = now;
        Ok(file)
    }
}
