pub mod path;
mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Methods that enforce a read-check-write guard run the whole guard inside
/// one write-locking transaction.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_login(&self, login: &str) -> Result<Option<User>>;
    fn list_users(&self, group_id: Option<&str>, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    /// Deletes a user unless they still own files (`Conflict`).
    fn delete_user(&self, id: &str) -> Result<bool>;
    fn has_admin(&self) -> Result<bool>;

    // Permission and role operations
    fn list_permissions(&self) -> Result<Vec<Permission>>;
    fn get_permission(&self, id: i64) -> Result<Option<Permission>>;
    fn user_has_permission(&self, user_id: &str, permission: &str) -> Result<bool>;
    fn list_user_permissions(&self, user_id: &str) -> Result<Vec<String>>;
    fn create_role(&self, role: &Role) -> Result<()>;
    fn get_role(&self, id: &str) -> Result<Option<Role>>;
    fn list_roles(&self) -> Result<Vec<Role>>;
    /// Replaces the role's fields and its full permission set.
    fn update_role(&self, role: &Role) -> Result<()>;
    fn delete_role(&self, id: &str) -> Result<bool>;

    // Group operations
    fn create_group(&self, group: &Group) -> Result<()>;
    fn get_group(&self, id: &str) -> Result<Option<Group>>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    /// Flat traversal rows from `root`, or from every root group when `None`.
    fn group_tree(&self, root: Option<&str>) -> Result<Vec<GroupTreeRow>>;
    /// Rejects re-parenting that would introduce a cycle.
    fn update_group(&self, group: &Group) -> Result<()>;
    /// Deletes a group unless it has child groups or members (`Conflict`).
    fn delete_group(&self, id: &str) -> Result<bool>;
    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<()>;
    fn remove_group_member(&self, group_id: &str, user_id: &str) -> Result<bool>;

    // File operations
    /// Inserts a file together with its initial current version.
    fn create_file(&self, file: &File, version: &FileVersion) -> Result<()>;
    fn get_file(&self, id: &str) -> Result<Option<File>>;
    fn list_owned_files(&self, owner_id: &str, search: Option<&str>) -> Result<Vec<File>>;
    fn update_file(&self, file: &File) -> Result<()>;
    /// Deletes the file with its versions and shares, returning the blob
    /// handles to release. `None` if the file did not exist.
    fn delete_file(&self, id: &str) -> Result<Option<Vec<String>>>;

    // Version operations
    fn get_version(&self, id: &str) -> Result<Option<FileVersion>>;
    fn list_versions(&self, file_id: &str) -> Result<Vec<FileVersion>>;
    fn version_name_exists(&self, file_id: &str, name: &str) -> Result<bool>;
    /// Inserts a version and makes it current. Returns `false` without
    /// writing anything if the name is already taken for that file.
    fn insert_version_as_current(&self, version: &FileVersion) -> Result<bool>;
    fn rename_version(&self, id: &str, name: &str, edited_at: DateTime<Utc>) -> Result<bool>;
    fn delete_version(&self, id: &str) -> Result<VersionDeletion>;
    /// Points the file at `version_id` only if that version belongs to it.
    fn set_current_version(
        &self,
        file_id: &str,
        version_id: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool>;

    // Share operations
    fn upsert_user_share(&self, share: &UserShare) -> Result<()>;
    fn upsert_group_share(&self, share: &GroupShare) -> Result<()>;
    fn delete_user_share(&self, file_id: &str, user_id: &str) -> Result<bool>;
    fn delete_group_share(&self, file_id: &str, group_id: &str) -> Result<bool>;
    fn get_user_share_level(&self, file_id: &str, user_id: &str) -> Result<Option<AccessLevel>>;
    /// Highest level granted on the file to any group the user belongs to.
    fn max_group_share_level(&self, file_id: &str, user_id: &str)
    -> Result<Option<AccessLevel>>;
    fn list_file_user_shares(&self, file_id: &str) -> Result<Vec<UserShare>>;
    fn list_file_group_shares(&self, file_id: &str) -> Result<Vec<GroupShare>>;
    fn list_direct_shared_files(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<DirectShareRow>>;
    fn list_group_shared_files(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<GroupShareRow>>;
}
