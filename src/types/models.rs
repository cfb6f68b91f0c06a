use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AccessLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Admin,
    User,
}

impl AccountType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AccountType::Admin => "admin",
            AccountType::User => "user",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AccountType::Admin),
            "user" => Ok(AccountType::User),
            other => Err(format!("unknown account type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub mail: String,
    #[serde(skip)]
    pub password_hash: String,
    pub display_name: String,
    pub account_type: AccountType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.account_type == AccountType::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Permission names granted by this role.
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One flat row of a group-tree traversal.
#[derive(Debug, Clone)]
pub struct GroupTreeRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub depth: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupNode {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub depth: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GroupNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    File,
    Folder,
}

impl FileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Folder => "folder",
        }
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(FileKind::File),
            "folder" | "dir" | "directory" => Ok(FileKind::Folder),
            other => Err(format!("unknown file type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub full_path: String,
    pub kind: FileKind,
    pub current_version_id: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: String,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    pub name: String,
    #[serde(skip)]
    pub blob_handle: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

/// Outcome of a guarded version delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDeletion {
    /// The row was removed; carries the blob handle to release.
    Deleted { blob_handle: String },
    /// The version is the file's current version and was kept.
    IsCurrent,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserShare {
    pub file_id: String,
    pub user_id: String,
    pub access_level: AccessLevel,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupShare {
    pub file_id: String,
    pub group_id: String,
    pub access_level: AccessLevel,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserAccessEntry {
    pub user_id: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupAccessEntry {
    pub group_id: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FilePermissions {
    pub users: Vec<UserAccessEntry>,
    pub groups: Vec<GroupAccessEntry>,
}

/// A file reached through a direct user share.
#[derive(Debug, Clone)]
pub struct DirectShareRow {
    pub file: File,
    pub access_level: AccessLevel,
}

/// A file reached through one of the user's groups.
#[derive(Debug, Clone)]
pub struct GroupShareRow {
    pub file: File,
    pub group_id: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedFile {
    #[serde(flatten)]
    pub file: File,
    pub access_level: AccessLevel,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
}
