mod access;
mod models;
mod permission;

pub use access::{Access, AccessLevel};
pub use models::*;
pub use permission::PermissionName;
