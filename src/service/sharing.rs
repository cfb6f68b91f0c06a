use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::*;

/// Per-file grants to users and groups, and the access they resolve to.
#[derive(Clone)]
pub struct SharingLedger {
    store: Arc<dyn Store>,
}

impl SharingLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn load_file(&self, file_id: &str) -> Result<File> {
        self.store.get_file(file_id)?.ok_or(Error::NotFound("file"))
    }

    fn access_for(&self, file: &File, user_id: &str) -> Result<Option<Access>> {
        if file.owner_id == user_id {
            return Ok(Some(Access::Owner));
        }

        let direct = self.store.get_user_share_level(&file.id, user_id)?;
        let via_group = self.store.max_group_share_level(&file.id, user_id)?;

        Ok(direct.max(via_group).map(Access::Granted))
    }

    /// Resolves the user's access to a file, or `None` without any grant.
    pub fn effective_access(&self, user_id: &str, file_id: &str) -> Result<Option<Access>> {
        let file = self.load_file(file_id)?;
        self.access_for(&file, user_id)
    }

    /// Loads the file if the user holds at least `level` on it.
    pub fn require_access(&self, user_id: &str, file_id: &str, level: AccessLevel) -> Result<File> {
        let file = self.load_file(file_id)?;
        match self.access_for(&file, user_id)? {
            Some(access) if access.allows(level) => Ok(file),
            _ => Err(Error::Forbidden("insufficient access to file")),
        }
    }

    /// Loads the file if the user owns it.
    pub fn require_owner(&self, user_id: &str, file_id: &str) -> Result<File> {
        let file = self.load_file(file_id)?;
        if file.owner_id != user_id {
            return Err(Error::Forbidden("only the file owner can do this"));
        }
        Ok(file)
    }

    pub fn share_with_user(
        &self,
        actor: &User,
        file_id: &str,
        user_id: &str,
        level: i64,
    ) -> Result<UserShare> {
        let file = self.require_owner(&actor.id, file_id)?;
        let access_level = AccessLevel::new(level)?;

        if user_id == file.owner_id {
            return Err(Error::BadRequest(
                "cannot share a file with its owner".to_string(),
            ));
        }
        if self.store.get_user(user_id)?.is_none() {
            return Err(Error::NotFound("user"));
        }

        let share = UserShare {
            file_id: file.id,
            user_id: user_id.to_string(),
            access_level,
            updated_at: Utc::now(),
        };
        self.store.upsert_user_share(&share)?;

        tracing::info!(
            "Shared file {} with user {} at {}",
            share.file_id,
            share.user_id,
            share.access_level
        );
        Ok(share)
    }

    pub fn share_with_group(
        &self,
        actor: &User,
        file_id: &str,
        group_id: &str,
        level: i64,
    ) -> Result<GroupShare> {
        let file = self.require_owner(&actor.id, file_id)?;
        let access_level = AccessLevel::new(level)?;

        if self.store.get_group(group_id)?.is_none() {
            return Err(Error::NotFound("group"));
        }

        let share = GroupShare {
            file_id: file.id,
            group_id: group_id.to_string(),
            access_level,
            updated_at: Utc::now(),
        };
        self.store.upsert_group_share(&share)?;

        tracing::info!(
            "Shared file {} with group {} at {}",
            share.file_id,
            share.group_id,
            share.access_level
        );
        Ok(share)
    }

    /// Removes a direct grant. Revoking a grant that does not exist succeeds.
    pub fn revoke_user_access(&self, actor: &User, file_id: &str, user_id: &str) -> Result<()> {
        self.require_owner(&actor.id, file_id)?;
        if !self.store.delete_user_share(file_id, user_id)? {
            tracing::debug!("No share for user {user_id} on file {file_id}");
        }
        Ok(())
    }

    pub fn revoke_group_access(&self, actor: &User, file_id: &str, group_id: &str) -> Result<()> {
        self.require_owner(&actor.id, file_id)?;
        if !self.store.delete_group_share(file_id, group_id)? {
            tracing::debug!("No share for group {group_id} on file {file_id}");
        }
        Ok(())
    }

    pub fn file_permissions(&self, actor: &User, file_id: &str) -> Result<FilePermissions> {
        self.require_owner(&actor.id, file_id)?;

        let users = self
            .store
            .list_file_user_shares(file_id)?
            .into_iter()
            .map(|s| UserAccessEntry {
                user_id: s.user_id,
                access_level: s.access_level,
            })
            .collect();
        let groups = self
            .store
            .list_file_group_shares(file_id)?
            .into_iter()
            .map(|s| GroupAccessEntry {
                group_id: s.group_id,
                access_level: s.access_level,
            })
            .collect();

        Ok(FilePermissions { users, groups })
    }

    /// Files shared with the user directly or through their groups.
    pub fn shared_files(&self, user_id: &str, search: Option<&str>) -> Result<Vec<SharedFile>> {
        let direct = self.store.list_direct_shared_files(user_id, search)?;
        let via_groups = self.store.list_group_shared_files(user_id, search)?;
        Ok(merge_shared_files(direct, via_groups))
    }
}

/// Merges direct and group-derived rows into one entry per file, keeping
/// the highest level and every contributing group id.
#[must_use]
pub fn merge_shared_files(
    direct: Vec<DirectShareRow>,
    via_groups: Vec<GroupShareRow>,
) -> Vec<SharedFile> {
    let mut merged: HashMap<String, SharedFile> = HashMap::new();

    for row in direct {
        merged
            .entry(row.file.id.clone())
            .and_modify(|entry| entry.access_level = entry.access_level.max(row.access_level))
            .or_insert_with(|| SharedFile {
                file: row.file.clone(),
                access_level: row.access_level,
                group_ids: Vec::new(),
            });
    }

    for row in via_groups {
        match merged.get_mut(&row.file.id) {
            Some(entry) => {
                entry.access_level = entry.access_level.max(row.access_level);
                if !entry.group_ids.contains(&row.group_id) {
                    entry.group_ids.push(row.group_id);
                }
            }
            None => {
                merged.insert(
                    row.file.id.clone(),
                    SharedFile {
                        file: row.file,
                        access_level: row.access_level,
                        group_ids: vec![row.group_id],
                    },
                );
            }
        }
    }

    let mut files: Vec<SharedFile> = merged.into_values().collect();
    for entry in &mut files {
        entry.group_ids.sort();
    }
    files.sort_by(|a, b| {
        a.file
            .name
            .cmp(&b.file.name)
            .then_with(|| a.file.id.cmp(&b.file.id))
    });
    files
}
