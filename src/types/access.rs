use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An ordinal file access level carried by a share grant. Higher values
/// confer more capability; any value >= 1 is a valid grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLevel(i64);

impl AccessLevel {
    pub const READ: AccessLevel = AccessLevel(1);
    pub const WRITE: AccessLevel = AccessLevel(2);

    /// Validates a raw level from a request or a database row.
    pub fn new(level: i64) -> Result<Self> {
        if level < 1 {
            return Err(Error::BadRequest(format!(
                "access level must be at least 1, got {level}"
            )));
        }
        Ok(Self(level))
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns true if this level covers the required one.
    #[must_use]
    pub const fn allows(self, required: AccessLevel) -> bool {
        self.0 >= required.0
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::READ => write!(f, "read"),
            Self::WRITE => write!(f, "write"),
            AccessLevel(n) => write!(f, "level {n}"),
        }
    }
}

impl From<AccessLevel> for i64 {
    fn from(level: AccessLevel) -> Self {
        level.0
    }
}

/// The resolved access a principal holds on a file.
///
/// Ownership is implicit and ranks above every stored grant, so the derived
/// ordering places `Owner` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "level")]
pub enum Access {
    Granted(AccessLevel),
    Owner,
}

impl Access {
    #[must_use]
    pub fn allows(self, required: AccessLevel) -> bool {
        match self {
            Access::Owner => true,
            Access::Granted(level) => level.allows(required),
        }
    }
}
