use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use super::Store;
use super::path::like_pattern;
use super::schema::{SCHEMA, SEED_PERMISSION};
use crate::error::{Error, Result};
use crate::types::*;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const USER_COLUMNS: &str = "u.id, u.login, u.mail, u.password_hash, u.display_name, \
     u.account_type, u.role_id, u.group_id, u.created_at, u.updated_at";

const FILE_COLUMNS: &str = "f.id, f.owner_id, f.name, f.full_path, f.kind, \
     f.current_version_id, f.created_at, f.edited_at";

const VERSION_COLUMNS: &str = "v.id, v.file_id, v.creator_id, v.name, v.blob_handle, \
     v.size_bytes, v.created_at, v.edited_at";

/// Direct group ids of the user bound to `?1`.
const USER_GROUPS_SUBQUERY: &str =
    "SELECT group_id FROM users WHERE id = ?1 AND group_id IS NOT NULL \
     UNION SELECT group_id FROM group_members WHERE user_id = ?1";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Each call is a fresh database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `op` inside a `BEGIN IMMEDIATE` transaction, which takes the
    /// write lock up front. A busy database is retried once and then
    /// reported as a conflict.
    fn immediate<T>(&self, op: impl Fn(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn();
        let mut retried = false;

        loop {
            let attempt = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(Error::from)
                .and_then(|tx| {
                    let value = op(&tx)?;
                    tx.commit()?;
                    Ok(value)
                });

            match attempt {
                Err(e) if e.is_retryable() && !retried => {
                    tracing::debug!("Database busy, retrying transaction: {e}");
                    retried = true;
                }
                Err(e) if e.is_retryable() => {
                    return Err(Error::Conflict(
                        "database is busy, retry the request".to_string(),
                    ));
                }
                other => return other,
            }
        }
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

fn access_level_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<AccessLevel> {
    let raw: i64 = row.get(idx)?;
    AccessLevel::new(raw).map_err(|e| conversion_error(idx, Type::Integer, e.to_string()))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let account_type: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        login: row.get(1)?,
        mail: row.get(2)?,
        password_hash: row.get(3)?,
        display_name: row.get(4)?,
        account_type: account_type
            .parse()
            .map_err(|e| conversion_error(5, Type::Text, e))?,
        role_id: row.get(6)?,
        group_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        parent_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<File> {
    let kind: String = row.get(4)?;
    Ok(File {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        full_path: row.get(3)?,
        kind: kind.parse().map_err(|e| conversion_error(4, Type::Text, e))?,
        current_version_id: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        edited_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<FileVersion> {
    Ok(FileVersion {
        id: row.get(0)?,
        file_id: row.get(1)?,
        creator_id: row.get(2)?,
        name: row.get(3)?,
        blob_handle: row.get(4)?,
        size_bytes: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        edited_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// Maps a unique-constraint failure to `Conflict`, leaving other errors as is.
fn unique_as_conflict(e: rusqlite::Error, message: impl FnOnce() -> String) -> Error {
    let err = Error::from(e);
    if err.is_unique_violation() {
        Error::Conflict(message())
    } else {
        err
    }
}

fn role_permission_names(conn: &Connection, role_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT p.name FROM role_permissions rp
         JOIN permissions p ON p.id = rp.permission_id
         WHERE rp.role_id = ?1 ORDER BY p.name",
    )?;
    let rows = stmt.query_map(params![role_id], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn attach_permissions(conn: &Connection, role_id: &str, names: &[String]) -> Result<()> {
    for name in names {
        let permission_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM permissions WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(permission_id) = permission_id else {
            return Err(Error::InvalidPermission(name.clone()));
        };
        conn.execute(
            "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?1, ?2)",
            params![role_id, permission_id],
        )?;
    }
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        for (name, description) in PermissionName::CATALOG {
            conn.execute(SEED_PERMISSION, params![name, description])?;
        }
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, login, mail, password_hash, display_name, account_type,
                                    role_id, group_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    user.id,
                    user.login,
                    user.mail,
                    user.password_hash,
                    user.display_name,
                    user.account_type.as_str(),
                    user.role_id,
                    user.group_id,
                    format_datetime(&user.created_at),
                    format_datetime(&user.updated_at),
                ],
            )
            .map_err(|e| unique_as_conflict(e, || "login or mail already in use".to_string()))?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.login = ?1"),
            params![login],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, group_id: Option<&str>, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.id > ?1
               AND (?2 IS NULL OR u.group_id = ?2 OR EXISTS (
                    SELECT 1 FROM group_members m WHERE m.user_id = u.id AND m.group_id = ?2))
             ORDER BY u.id LIMIT ?3"
        ))?;

        let rows = stmt.query_map(params![cursor, group_id, limit], user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE users SET login = ?1, mail = ?2, password_hash = ?3, display_name = ?4,
                                  role_id = ?5, group_id = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    user.login,
                    user.mail,
                    user.password_hash,
                    user.display_name,
                    user.role_id,
                    user.group_id,
                    format_datetime(&user.updated_at),
                    user.id,
                ],
            )
            .map_err(|e| unique_as_conflict(e, || "login or mail already in use".to_string()))?;

        if rows == 0 {
            return Err(Error::NotFound("user"));
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        self.immediate(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }

            let owned: i64 = tx.query_row(
                "SELECT COUNT(*) FROM files WHERE owner_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if owned > 0 {
                return Err(Error::Conflict(format!(
                    "user still owns {owned} file(s)"
                )));
            }

            tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
            Ok(true)
        })
    }

    fn has_admin(&self) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE account_type = 'admin')",
            [],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // Permission and role operations

    fn list_permissions(&self) -> Result<Vec<Permission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, description FROM permissions ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Permission {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_permission(&self, id: i64) -> Result<Option<Permission>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description FROM permissions WHERE id = ?1",
            params![id],
            |row| {
                Ok(Permission {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn user_has_permission(&self, user_id: &str, permission: &str) -> Result<bool> {
        let conn = self.conn();
        let granted: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM users u
                JOIN role_permissions rp ON rp.role_id = u.role_id
                JOIN permissions p ON p.id = rp.permission_id
                WHERE u.id = ?1 AND p.name = ?2)",
            params![user_id, permission],
            |row| row.get(0),
        )?;
        Ok(granted)
    }

    fn list_user_permissions(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.name FROM users u
             JOIN role_permissions rp ON rp.role_id = u.role_id
             JOIN permissions p ON p.id = rp.permission_id
             WHERE u.id = ?1 ORDER BY p.name",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn create_role(&self, role: &Role) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO roles (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                role.id,
                role.name,
                role.description,
                format_datetime(&role.created_at)
            ],
        )
        .map_err(|e| unique_as_conflict(e, || format!("role '{}' already exists", role.name)))?;
        attach_permissions(&tx, &role.id, &role.permissions)?;

        tx.commit()?;
        Ok(())
    }

    fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        let role = conn
            .query_row(
                "SELECT id, name, description, created_at FROM roles WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Role {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        permissions: Vec::new(),
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;

        match role {
            Some(mut role) => {
                role.permissions = role_permission_names(&conn, &role.id)?;
                Ok(Some(role))
            }
            None => Ok(None),
        }
    }

    fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, description, created_at FROM roles ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Role {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                permissions: Vec::new(),
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;
        let mut roles = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        for role in &mut roles {
            role.permissions = role_permission_names(&conn, &role.id)?;
        }
        Ok(roles)
    }

    fn update_role(&self, role: &Role) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx
            .execute(
                "UPDATE roles SET name = ?1, description = ?2 WHERE id = ?3",
                params![role.name, role.description, role.id],
            )
            .map_err(|e| {
                unique_as_conflict(e, || format!("role '{}' already exists", role.name))
            })?;
        if rows == 0 {
            return Err(Error::NotFound("role"));
        }

        tx.execute(
            "DELETE FROM role_permissions WHERE role_id = ?1",
            params![role.id],
        )?;
        attach_permissions(&tx, &role.id, &role.permissions)?;

        tx.commit()?;
        Ok(())
    }

    fn delete_role(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM roles WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Group operations

    fn create_group(&self, group: &Group) -> Result<()> {
        self.conn().execute(
            "INSERT INTO user_groups (id, name, description, parent_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id,
                group.name,
                group.description,
                group.parent_id,
                format_datetime(&group.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, parent_id, created_at FROM user_groups WHERE id = ?1",
            params![id],
            group_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, parent_id, created_at FROM user_groups
             ORDER BY name, id",
        )?;
        let rows = stmt.query_map([], group_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn group_tree(&self, root: Option<&str>) -> Result<Vec<GroupTreeRow>> {
        let conn = self.conn();
        // char(31) separates a name from its id and char(30) separates
        // levels, so ordering by path yields a name-ordered preorder walk.
        let mut stmt = conn.prepare(
            "WITH RECURSIVE tree(id, name, description, parent_id, depth, path) AS (
                SELECT id, name, description, parent_id, 0, name || char(31) || id
                FROM user_groups
                WHERE (?1 IS NULL AND parent_id IS NULL) OR id = ?1
                UNION ALL
                SELECT g.id, g.name, g.description, g.parent_id, t.depth + 1,
                       t.path || char(30) || g.name || char(31) || g.id
                FROM user_groups g
                JOIN tree t ON g.parent_id = t.id
             )
             SELECT id, name, description, parent_id, depth FROM tree ORDER BY path",
        )?;

        let rows = stmt.query_map(params![root], |row| {
            Ok(GroupTreeRow {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                parent_id: row.get(3)?,
                depth: row.get(4)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_group(&self, group: &Group) -> Result<()> {
        self.immediate(|tx| {
            if let Some(parent_id) = group.parent_id.as_deref() {
                if parent_id == group.id {
                    return Err(Error::BadRequest(
                        "group cannot be its own parent".to_string(),
                    ));
                }

                let parent_exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM user_groups WHERE id = ?1)",
                    params![parent_id],
                    |row| row.get(0),
                )?;
                if !parent_exists {
                    return Err(Error::NotFound("parent group"));
                }

                let creates_cycle: bool = tx.query_row(
                    "WITH RECURSIVE ancestors(id) AS (
                        SELECT ?1
                        UNION
                        SELECT g.parent_id FROM user_groups g
                        JOIN ancestors a ON g.id = a.id
                        WHERE g.parent_id IS NOT NULL
                     )
                     SELECT EXISTS(SELECT 1 FROM ancestors WHERE id = ?2)",
                    params![parent_id, group.id],
                    |row| row.get(0),
                )?;
                if creates_cycle {
                    return Err(Error::BadRequest(
                        "group cannot be moved under its own descendant".to_string(),
                    ));
                }
            }

            let rows = tx.execute(
                "UPDATE user_groups SET name = ?1, description = ?2, parent_id = ?3 WHERE id = ?4",
                params![group.name, group.description, group.parent_id, group.id],
            )?;
            if rows == 0 {
                return Err(Error::NotFound("group"));
            }
            Ok(())
        })
    }

    fn delete_group(&self, id: &str) -> Result<bool> {
        self.immediate(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM user_groups WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(false);
            }

            let children: i64 = tx.query_row(
                "SELECT COUNT(*) FROM user_groups WHERE parent_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if children > 0 {
                return Err(Error::Conflict(format!(
                    "group has {children} child group(s)"
                )));
            }

            let members: i64 = tx.query_row(
                "SELECT (SELECT COUNT(*) FROM users WHERE group_id = ?1)
                      + (SELECT COUNT(*) FROM group_members WHERE group_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if members > 0 {
                return Err(Error::Conflict(format!("group has {members} member(s)")));
            }

            tx.execute("DELETE FROM user_groups WHERE id = ?1", params![id])?;
            Ok(true)
        })
    }

    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO group_members (group_id, user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (group_id, user_id) DO NOTHING",
            params![group_id, user_id, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn remove_group_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        Ok(rows > 0)
    }

    // File operations

    fn create_file(&self, file: &File, version: &FileVersion) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO files (id, owner_id, name, full_path, kind, current_version_id,
                                created_at, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                file.id,
                file.owner_id,
                file.name,
                file.full_path,
                file.kind.as_str(),
                version.id,
                format_datetime(&file.created_at),
                format_datetime(&file.edited_at),
            ],
        )?;
        tx.execute(
            "INSERT INTO file_versions (id, file_id, creator_id, name, blob_handle, size_bytes,
                                        created_at, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                version.id,
                file.id,
                version.creator_id,
                version.name,
                version.blob_handle,
                version.size_bytes,
                format_datetime(&version.created_at),
                format_datetime(&version.edited_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_file(&self, id: &str) -> Result<Option<File>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {FILE_COLUMNS} FROM files f WHERE f.id = ?1"),
            params![id],
            file_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_owned_files(&self, owner_id: &str, search: Option<&str>) -> Result<Vec<File>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files f
             WHERE f.owner_id = ?1 AND (?2 IS NULL OR f.name LIKE ?2 ESCAPE '\\')
             ORDER BY f.full_path, f.name, f.id"
        ))?;
        let rows = stmt.query_map(params![owner_id, search.map(like_pattern)], file_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_file(&self, file: &File) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE files SET name = ?1, full_path = ?2, edited_at = ?3 WHERE id = ?4",
            params![
                file.name,
                file.full_path,
                format_datetime(&file.edited_at),
                file.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound("file"));
        }
        Ok(())
    }

    fn delete_file(&self, id: &str) -> Result<Option<Vec<String>>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }

        let handles = {
            let mut stmt =
                tx.prepare("SELECT blob_handle FROM file_versions WHERE file_id = ?1")?;
            let rows = stmt.query_map(params![id], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<String>, _>>()?
        };

        tx.execute("DELETE FROM file_user_shares WHERE file_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM file_group_shares WHERE file_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM file_versions WHERE file_id = ?1", params![id])?;
        tx.execute("DELETE FROM files WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(Some(handles))
    }

    // Version operations

    fn get_version(&self, id: &str) -> Result<Option<FileVersion>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM file_versions v WHERE v.id = ?1"),
            params![id],
            version_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_versions(&self, file_id: &str) -> Result<Vec<FileVersion>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM file_versions v
             WHERE v.file_id = ?1 ORDER BY v.created_at DESC, v.rowid DESC"
        ))?;
        let rows = stmt.query_map(params![file_id], version_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn version_name_exists(&self, file_id: &str, name: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM file_versions WHERE file_id = ?1 AND name = ?2)",
            params![file_id, name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_version_as_current(&self, version: &FileVersion) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO file_versions (id, file_id, creator_id, name, blob_handle, size_bytes,
                                        created_at, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                version.id,
                version.file_id,
                version.creator_id,
                version.name,
                version.blob_handle,
                version.size_bytes,
                format_datetime(&version.created_at),
                format_datetime(&version.edited_at),
            ],
        );
        match inserted.map_err(Error::from) {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => return Ok(false),
            Err(e) => return Err(e),
        }

        let rows = tx.execute(
            "UPDATE files SET current_version_id = ?1, edited_at = ?2 WHERE id = ?3",
            params![
                version.id,
                format_datetime(&version.created_at),
                version.file_id
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound("file"));
        }

        tx.commit()?;
        Ok(true)
    }

    fn rename_version(&self, id: &str, name: &str, edited_at: DateTime<Utc>) -> Result<bool> {
        let rows = self
            .conn()
            .execute(
                "UPDATE file_versions SET name = ?1, edited_at = ?2 WHERE id = ?3",
                params![name, format_datetime(&edited_at), id],
            )
            .map_err(|e| {
                unique_as_conflict(e, || format!("version name '{name}' already exists"))
            })?;
        Ok(rows > 0)
    }

    fn delete_version(&self, id: &str) -> Result<VersionDeletion> {
        self.immediate(|tx| {
            let found: Option<(String, String)> = tx
                .query_row(
                    "SELECT v.blob_handle, f.current_version_id
                     FROM file_versions v JOIN files f ON f.id = v.file_id
                     WHERE v.id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((blob_handle, current_version_id)) = found else {
                return Ok(VersionDeletion::NotFound);
            };
            if current_version_id == id {
                return Ok(VersionDeletion::IsCurrent);
            }

            tx.execute("DELETE FROM file_versions WHERE id = ?1", params![id])?;
            Ok(VersionDeletion::Deleted { blob_handle })
        })
    }

    fn set_current_version(
        &self,
        file_id: &str,
        version_id: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE files SET current_version_id = ?2, edited_at = ?3
             WHERE id = ?1
               AND EXISTS (SELECT 1 FROM file_versions WHERE id = ?2 AND file_id = ?1)",
            params![file_id, version_id, format_datetime(&edited_at)],
        )?;
        Ok(rows > 0)
    }

    // Share operations

    fn upsert_user_share(&self, share: &UserShare) -> Result<()> {
        self.conn().execute(
            "INSERT INTO file_user_shares (file_id, user_id, access_level, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (file_id, user_id) DO UPDATE SET
                access_level = excluded.access_level,
                updated_at = excluded.updated_at",
            params![
                share.file_id,
                share.user_id,
                share.access_level.value(),
                format_datetime(&share.updated_at),
            ],
        )?;
        Ok(())
    }

    fn upsert_group_share(&self, share: &GroupShare) -> Result<()> {
        self.conn().execute(
            "INSERT INTO file_group_shares (file_id, group_id, access_level, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (file_id, group_id) DO UPDATE SET
                access_level = excluded.access_level,
                updated_at = excluded.updated_at",
            params![
                share.file_id,
                share.group_id,
                share.access_level.value(),
                format_datetime(&share.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete_user_share(&self, file_id: &str, user_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM file_user_shares WHERE file_id = ?1 AND user_id = ?2",
            params![file_id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn delete_group_share(&self, file_id: &str, group_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM file_group_shares WHERE file_id = ?1 AND group_id = ?2",
            params![file_id, group_id],
        )?;
        Ok(rows > 0)
    }

    fn get_user_share_level(&self, file_id: &str, user_id: &str) -> Result<Option<AccessLevel>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT access_level FROM file_user_shares WHERE file_id = ?1 AND user_id = ?2",
            params![file_id, user_id],
            |row| access_level_at(row, 0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn max_group_share_level(
        &self,
        file_id: &str,
        user_id: &str,
    ) -> Result<Option<AccessLevel>> {
        let conn = self.conn();
        let level: Option<i64> = conn.query_row(
            &format!(
                "SELECT MAX(s.access_level) FROM file_group_shares s
                 WHERE s.file_id = ?2 AND s.group_id IN ({USER_GROUPS_SUBQUERY})"
            ),
            params![user_id, file_id],
            |row| row.get(0),
        )?;
        level.map(AccessLevel::new).transpose()
    }

    fn list_file_user_shares(&self, file_id: &str) -> Result<Vec<UserShare>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT file_id, user_id, access_level, updated_at FROM file_user_shares
             WHERE file_id = ?1 ORDER BY user_id",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            Ok(UserShare {
                file_id: row.get(0)?,
                user_id: row.get(1)?,
                access_level: access_level_at(row, 2)?,
                updated_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_file_group_shares(&self, file_id: &str) -> Result<Vec<GroupShare>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT file_id, group_id, access_level, updated_at FROM file_group_shares
             WHERE file_id = ?1 ORDER BY group_id",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            Ok(GroupShare {
                file_id: row.get(0)?,
                group_id: row.get(1)?,
                access_level: access_level_at(row, 2)?,
                updated_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_direct_shared_files(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<DirectShareRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS}, s.access_level
             FROM file_user_shares s JOIN files f ON f.id = s.file_id
             WHERE s.user_id = ?1 AND f.owner_id != ?1
               AND (?2 IS NULL OR f.name LIKE ?2 ESCAPE '\\')"
        ))?;
        let rows = stmt.query_map(params![user_id, search.map(like_pattern)], |row| {
            Ok(DirectShareRow {
                file: file_from_row(row)?,
                access_level: access_level_at(row, 8)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_group_shared_files(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<GroupShareRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS}, s.group_id, s.access_level
             FROM file_group_shares s JOIN files f ON f.id = s.file_id
             WHERE s.group_id IN ({USER_GROUPS_SUBQUERY}) AND f.owner_id != ?1
               AND (?2 IS NULL OR f.name LIKE ?2 ESCAPE '\\')"
        ))?;
        let rows = stmt.query_map(params![user_id, search.map(like_pattern)], |row| {
            Ok(GroupShareRow {
                file: file_from_row(row)?,
                group_id: row.get(8)?,
                access_level: access_level_at(row, 9)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn user(id: &str, account_type: AccountType) -> User {
        User {
            id: id.to_string(),
            login: id.to_string(),
            mail: format!("{id}@example.com"),
            password_hash: "hash".to_string(),
            display_name: id.to_string(),
            account_type,
            role_id: None,
            group_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn group(id: &str, parent_id: Option<&str>) -> Group {
        Group {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            parent_id: parent_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn version(id: &str, file_id: &str, name: &str) -> FileVersion {
        FileVersion {
            id: id.to_string(),
            file_id: file_id.to_string(),
            creator_id: None,
            name: name.to_string(),
            blob_handle: format!("{id:0>32}"),
            size_bytes: 3,
            created_at: Utc::now(),
            edited_at: Utc::now(),
        }
    }

    fn seed_file(store: &SqliteStore, file_id: &str, owner_id: &str) {
        let file = File {
            id: file_id.to_string(),
            owner_id: owner_id.to_string(),
            name: format!("{file_id}.txt"),
            full_path: "/".to_string(),
            kind: FileKind::File,
            current_version_id: format!("{file_id}-v1"),
            created_at: Utc::now(),
            edited_at: Utc::now(),
        };
        store
            .create_file(&file, &version(&format!("{file_id}-v1"), file_id, "1.0"))
            .unwrap();
    }

    #[test]
    fn test_initialize_creates_tables_and_seeds_permissions() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        // Initializing twice must not duplicate the catalog.
        store.initialize().unwrap();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        drop(conn);

        for table in [
            "users",
            "roles",
            "permissions",
            "role_permissions",
            "user_groups",
            "group_members",
            "files",
            "file_versions",
            "file_user_shares",
            "file_group_shares",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }

        let names: Vec<String> = store
            .list_permissions()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["manage_users", "manage_roles", "manage_groups"]);
    }

    #[test]
    fn test_user_crud_and_unique_login() {
        let store = store();
        store.create_user(&user("alice", AccountType::User)).unwrap();

        let fetched = store.get_user_by_login("alice").unwrap().unwrap();
        assert_eq!(fetched.mail, "alice@example.com");
        assert_eq!(fetched.account_type, AccountType::User);

        let mut dup = user("alice2", AccountType::User);
        dup.login = "alice".to_string();
        assert!(matches!(store.create_user(&dup), Err(Error::Conflict(_))));

        let mut updated = fetched.clone();
        updated.display_name = "Alice A.".to_string();
        store.update_user(&updated).unwrap();
        assert_eq!(
            store.get_user("alice").unwrap().unwrap().display_name,
            "Alice A."
        );

        assert!(store.delete_user("alice").unwrap());
        assert!(!store.delete_user("alice").unwrap());
        assert!(store.get_user("alice").unwrap().is_none());
    }

    #[test]
    fn test_delete_user_refused_while_owning_files() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");

        assert!(matches!(store.delete_user("owner"), Err(Error::Conflict(_))));

        store.delete_file("f1").unwrap();
        assert!(store.delete_user("owner").unwrap());
    }

    #[test]
    fn test_role_permissions_resolve_by_name() {
        let store = store();
        let role = Role {
            id: "role-1".to_string(),
            name: "editors".to_string(),
            description: String::new(),
            permissions: vec!["manage_groups".to_string()],
            created_at: Utc::now(),
        };
        store.create_role(&role).unwrap();

        let mut u = user("bob", AccountType::User);
        u.role_id = Some("role-1".to_string());
        store.create_user(&u).unwrap();

        assert!(store.user_has_permission("bob", "manage_groups").unwrap());
        assert!(!store.user_has_permission("bob", "manage_users").unwrap());
        assert_eq!(
            store.list_user_permissions("bob").unwrap(),
            vec!["manage_groups"]
        );

        let mut bad = role.clone();
        bad.permissions = vec!["fly".to_string()];
        assert!(matches!(
            store.update_role(&bad),
            Err(Error::InvalidPermission(_))
        ));
        // The failed update rolled back and kept the old grant.
        assert_eq!(
            store.get_role("role-1").unwrap().unwrap().permissions,
            vec!["manage_groups"]
        );

        assert!(store.delete_role("role-1").unwrap());
        assert!(store.get_user("bob").unwrap().unwrap().role_id.is_none());
    }

    #[test]
    fn test_group_tree_rows_in_name_order() {
        let store = store();
        store.create_group(&group("root", None)).unwrap();
        store.create_group(&group("zeta", Some("root"))).unwrap();
        store.create_group(&group("alpha", Some("root"))).unwrap();
        store.create_group(&group("leaf", Some("alpha"))).unwrap();
        store.create_group(&group("other", None)).unwrap();

        let rows = store.group_tree(None).unwrap();
        let order: Vec<(&str, i64)> = rows.iter().map(|r| (r.id.as_str(), r.depth)).collect();
        assert_eq!(
            order,
            vec![
                ("other", 0),
                ("root", 0),
                ("alpha", 1),
                ("leaf", 2),
                ("zeta", 1)
            ]
        );

        let subtree = store.group_tree(Some("alpha")).unwrap();
        assert_eq!(subtree.len(), 2);
        assert_eq!(subtree[0].depth, 0);
        assert_eq!(subtree[1].id, "leaf");
    }

    #[test]
    fn test_update_group_rejects_cycles() {
        let store = store();
        store.create_group(&group("a", None)).unwrap();
        store.create_group(&group("b", Some("a"))).unwrap();
        store.create_group(&group("c", Some("b"))).unwrap();

        let mut a = store.get_group("a").unwrap().unwrap();
        a.parent_id = Some("c".to_string());
        assert!(matches!(store.update_group(&a), Err(Error::BadRequest(_))));

        a.parent_id = Some("a".to_string());
        assert!(matches!(store.update_group(&a), Err(Error::BadRequest(_))));

        let mut c = store.get_group("c").unwrap().unwrap();
        c.parent_id = Some("a".to_string());
        store.update_group(&c).unwrap();
        assert_eq!(
            store.get_group("c").unwrap().unwrap().parent_id.as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_delete_group_guarded_by_children_and_members() {
        let store = store();
        store.create_group(&group("parent", None)).unwrap();
        store.create_group(&group("child", Some("parent"))).unwrap();

        assert!(matches!(store.delete_group("parent"), Err(Error::Conflict(_))));

        let mut child = store.get_group("child").unwrap().unwrap();
        child.parent_id = None;
        store.update_group(&child).unwrap();
        assert!(store.delete_group("parent").unwrap());

        store.create_user(&user("m", AccountType::User)).unwrap();
        store.add_group_member("child", "m").unwrap();
        store.add_group_member("child", "m").unwrap();
        assert!(matches!(store.delete_group("child"), Err(Error::Conflict(_))));

        assert!(store.remove_group_member("child", "m").unwrap());
        assert!(!store.remove_group_member("child", "m").unwrap());
        assert!(store.delete_group("child").unwrap());
        assert!(!store.delete_group("child").unwrap());
    }

    #[test]
    fn test_file_created_with_current_version() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");

        let file = store.get_file("f1").unwrap().unwrap();
        assert_eq!(file.current_version_id, "f1-v1");

        let versions = store.list_versions("f1").unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].name, "1.0");
        assert!(store.version_name_exists("f1", "1.0").unwrap());
    }

    #[test]
    fn test_insert_version_as_current_rejects_duplicate_name() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");

        assert!(store
            .insert_version_as_current(&version("v2", "f1", "draft"))
            .unwrap());
        assert_eq!(store.get_file("f1").unwrap().unwrap().current_version_id, "v2");

        assert!(!store
            .insert_version_as_current(&version("v3", "f1", "draft"))
            .unwrap());
        assert!(store.get_version("v3").unwrap().is_none());
        assert_eq!(store.get_file("f1").unwrap().unwrap().current_version_id, "v2");
    }

    #[test]
    fn test_delete_version_keeps_current() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");
        store
            .insert_version_as_current(&version("v2", "f1", "second"))
            .unwrap();

        assert_eq!(
            store.delete_version("v2").unwrap(),
            VersionDeletion::IsCurrent
        );
        assert!(matches!(
            store.delete_version("f1-v1").unwrap(),
            VersionDeletion::Deleted { .. }
        ));
        assert_eq!(
            store.delete_version("f1-v1").unwrap(),
            VersionDeletion::NotFound
        );
        assert_eq!(store.list_versions("f1").unwrap().len(), 1);
    }

    #[test]
    fn test_busy_database_reports_conflict() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("test.db");

        let holder = SqliteStore::new(&db_path).unwrap();
        holder.initialize().unwrap();
        holder.create_user(&user("owner", AccountType::User)).unwrap();
        seed_file(&holder, "f1", "owner");
        holder
            .insert_version_as_current(&version("v2", "f1", "second"))
            .unwrap();

        let contender = SqliteStore::new(&db_path).unwrap();
        contender
            .conn()
            .busy_timeout(Duration::from_millis(50))
            .unwrap();

        let lock = holder.conn();
        lock.execute_batch("BEGIN IMMEDIATE").unwrap();

        let result = contender.delete_version("f1-v1");
        assert!(matches!(result, Err(Error::Conflict(_))), "got {result:?}");

        lock.execute_batch("ROLLBACK").unwrap();
        drop(lock);

        assert!(matches!(
            contender.delete_version("f1-v1").unwrap(),
            VersionDeletion::Deleted { .. }
        ));
    }

    #[test]
    fn test_set_current_version_requires_same_file() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");
        seed_file(&store, "f2", "owner");
        store
            .insert_version_as_current(&version("v2", "f1", "second"))
            .unwrap();

        assert!(!store.set_current_version("f1", "f2-v1", Utc::now()).unwrap());
        assert!(store.set_current_version("f1", "f1-v1", Utc::now()).unwrap());
        assert_eq!(
            store.get_file("f1").unwrap().unwrap().current_version_id,
            "f1-v1"
        );
    }

    #[test]
    fn test_share_upsert_keeps_single_row() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        store.create_user(&user("reader", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");

        for level in [1, 3] {
            store
                .upsert_user_share(&UserShare {
                    file_id: "f1".to_string(),
                    user_id: "reader".to_string(),
                    access_level: AccessLevel::new(level).unwrap(),
                    updated_at: Utc::now(),
                })
                .unwrap();
        }

        let shares = store.list_file_user_shares("f1").unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].access_level.value(), 3);
        assert_eq!(
            store.get_user_share_level("f1", "reader").unwrap(),
            Some(AccessLevel::new(3).unwrap())
        );
    }

    #[test]
    fn test_max_group_share_level_uses_direct_membership() {
        let store = store();
        store.create_group(&group("parent", None)).unwrap();
        store.create_group(&group("team", Some("parent"))).unwrap();
        store.create_group(&group("ops", None)).unwrap();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        let mut member = user("member", AccountType::User);
        member.group_id = Some("team".to_string());
        store.create_user(&member).unwrap();
        store.add_group_member("ops", "member").unwrap();
        seed_file(&store, "f1", "owner");

        assert_eq!(store.max_group_share_level("f1", "member").unwrap(), None);

        for (group_id, level) in [("team", 1), ("ops", 2), ("parent", 4)] {
            store
                .upsert_group_share(&GroupShare {
                    file_id: "f1".to_string(),
                    group_id: group_id.to_string(),
                    access_level: AccessLevel::new(level).unwrap(),
                    updated_at: Utc::now(),
                })
                .unwrap();
        }

        // The parent's grant does not flow down to members of the child.
        assert_eq!(
            store.max_group_share_level("f1", "member").unwrap(),
            Some(AccessLevel::WRITE)
        );

        let rows = store.list_group_shared_files("member", None).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_shared_file_search_filters_by_name() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        store.create_user(&user("reader", AccountType::User)).unwrap();
        seed_file(&store, "report", "owner");
        seed_file(&store, "notes", "owner");
        for file_id in ["report", "notes"] {
            store
                .upsert_user_share(&UserShare {
                    file_id: file_id.to_string(),
                    user_id: "reader".to_string(),
                    access_level: AccessLevel::READ,
                    updated_at: Utc::now(),
                })
                .unwrap();
        }

        assert_eq!(
            store.list_direct_shared_files("reader", None).unwrap().len(),
            2
        );
        let found = store
            .list_direct_shared_files("reader", Some("REP"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file.id, "report");

        assert!(store.list_direct_shared_files("owner", None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_file_returns_handles_and_cascades() {
        let store = store();
        store.create_user(&user("owner", AccountType::User)).unwrap();
        store.create_user(&user("reader", AccountType::User)).unwrap();
        seed_file(&store, "f1", "owner");
        store
            .insert_version_as_current(&version("v2", "f1", "second"))
            .unwrap();
        store
            .upsert_user_share(&UserShare {
                file_id: "f1".to_string(),
                user_id: "reader".to_string(),
                access_level: AccessLevel::READ,
                updated_at: Utc::now(),
            })
            .unwrap();

        let mut handles = store.delete_file("f1").unwrap().unwrap();
        handles.sort();
        assert_eq!(handles.len(), 2);

        assert!(store.get_file("f1").unwrap().is_none());
        assert!(store.get_version("v2").unwrap().is_none());
        assert!(store.list_file_user_shares("f1").unwrap().is_empty());
        assert!(store.delete_file("f1").unwrap().is_none());
    }
}
