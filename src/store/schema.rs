pub const SCHEMA: &str = r#"
-- Global permission catalog, seeded below and never edited at runtime
CREATE TABLE IF NOT EXISTS permissions (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
    PRIMARY KEY (role_id, permission_id)
);

-- Group forest; a parent cannot be removed while it has children
CREATE TABLE IF NOT EXISTS user_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    parent_id TEXT REFERENCES user_groups(id) ON DELETE RESTRICT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    mail TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    display_name TEXT NOT NULL DEFAULT '',
    account_type TEXT NOT NULL DEFAULT 'user' CHECK (account_type IN ('admin', 'user')),
    role_id TEXT REFERENCES roles(id) ON DELETE SET NULL,
    group_id TEXT REFERENCES user_groups(id) ON DELETE RESTRICT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Secondary memberships; the primary group lives on users.group_id
CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE RESTRICT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (group_id, user_id)
);

-- files and file_versions reference each other; both keys are deferred so
-- a file and its first version can be written in one transaction
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
    name TEXT NOT NULL,
    full_path TEXT NOT NULL DEFAULT '/',
    kind TEXT NOT NULL DEFAULT 'file' CHECK (kind IN ('file', 'folder')),
    current_version_id TEXT NOT NULL
        REFERENCES file_versions(id) DEFERRABLE INITIALLY DEFERRED,
    created_at TEXT DEFAULT (datetime('now')),
    edited_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS file_versions (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL
        REFERENCES files(id) ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
    creator_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    blob_handle TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    edited_at TEXT DEFAULT (datetime('now')),

    UNIQUE(file_id, name)
);

CREATE TABLE IF NOT EXISTS file_user_shares (
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    access_level INTEGER NOT NULL CHECK (access_level > 0),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (file_id, user_id)
);

CREATE TABLE IF NOT EXISTS file_group_shares (
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
    access_level INTEGER NOT NULL CHECK (access_level > 0),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (file_id, group_id)
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role_id);
CREATE INDEX IF NOT EXISTS idx_users_group ON users(group_id);
CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);
CREATE INDEX IF NOT EXISTS idx_user_groups_parent ON user_groups(parent_id);
CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id);
CREATE INDEX IF NOT EXISTS idx_file_versions_file ON file_versions(file_id);
CREATE INDEX IF NOT EXISTS idx_file_user_shares_user ON file_user_shares(user_id);
CREATE INDEX IF NOT EXISTS idx_file_group_shares_group ON file_group_shares(group_id);
"#;

pub const SEED_PERMISSION: &str =
    "INSERT OR IGNORE INTO permissions (name, description) VALUES (?1, ?2)";
